use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, info};

use crate::bus::{Event, EventBus, Subscription, Topic};
use crate::catalog::{pick_random, Catalog, CatalogError};
use crate::celebration::Celebration;
use crate::config::Config;
use crate::editor::{Editor, EditorAction};
use crate::runtime::keystroke;
use crate::session::{Keystroke, Status, Submission, TypingSession};
use crate::stats::{StatsRecorder, Summary};
use crate::store::{Snippet, SnippetId, SnippetStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Typing,
    Stats,
    Editor,
}

/// Topics the app reacts to; deliveries are queued and handled in
/// [`App::process_inbox`] once the triggering event has finished.
const WATCHED: [Topic; 5] = [
    Topic::Completed,
    Topic::Deleted,
    Topic::Updated,
    Topic::Added,
    Topic::PickRandom,
];

const EDIT_REFUSED: &str = "finish or restart (^r) this snippet before changing it";

/// Everything the TUI shows, and the controller that drives the session.
pub struct App {
    pub config: Config,
    pub screen: Screen,
    pub snippets: Vec<Snippet>,
    /// Highlighted row on the home screen
    pub cursor: usize,
    pub selected: Option<Snippet>,
    pub session: Option<TypingSession>,
    pub editor: Option<Editor>,
    /// Snippet awaiting a `y` before it is deleted
    pub pending_delete: Option<SnippetId>,
    pub celebration: Celebration,
    /// Last failure or refusal, shown until the next key press
    pub notice: Option<String>,
    pub should_quit: bool,
    store: Rc<dyn SnippetStore>,
    bus: EventBus,
    status: Rc<Cell<Status>>,
    completions: Rc<Cell<u32>>,
    inbox: Rc<RefCell<VecDeque<Event>>>,
    editor_return: Screen,
    viewport: (u16, u16),
    recorder: Option<StatsRecorder>,
    subscriptions: Vec<Subscription>,
}

impl App {
    pub fn new(store: Rc<dyn SnippetStore>, config: Config) -> Result<Self, StoreError> {
        let bus = EventBus::new();
        // registered first so counters are persisted before the list refreshes
        let recorder = StatsRecorder::attach(Rc::clone(&store), &bus);

        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let subscriptions = WATCHED
            .into_iter()
            .map(|topic| {
                let inbox = Rc::clone(&inbox);
                bus.subscribe(topic, move |event| inbox.borrow_mut().push_back(event.clone()))
            })
            .collect();

        let mut app = Self {
            config,
            screen: Screen::Home,
            snippets: Vec::new(),
            cursor: 0,
            selected: None,
            session: None,
            editor: None,
            pending_delete: None,
            celebration: Celebration::new(),
            notice: None,
            should_quit: false,
            store,
            bus,
            status: Rc::new(Cell::new(Status::default())),
            completions: Rc::new(Cell::new(0)),
            inbox,
            editor_return: Screen::Home,
            viewport: (80, 24),
            recorder: Some(recorder),
            subscriptions,
        };
        app.refresh()?;
        Ok(app)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &dyn SnippetStore {
        self.store.as_ref()
    }

    fn catalog(&self) -> Catalog<dyn SnippetStore> {
        Catalog::new(Rc::clone(&self.store), self.bus.clone())
    }

    /// `{started, completed}` as last reported by the session
    pub fn status(&self) -> Status {
        self.status.get()
    }

    /// Snippets can only be changed while no run is in progress
    pub fn editing_allowed(&self) -> bool {
        !self.status().started
    }

    pub fn selected_id(&self) -> Option<SnippetId> {
        self.selected.as_ref().map(|s| s.id)
    }

    pub fn highlighted(&self) -> Option<&Snippet> {
        self.snippets.get(self.cursor)
    }

    pub fn summary(&self) -> Summary {
        Summary::from_snippets(&self.snippets)
    }

    pub fn set_viewport(&mut self, width: u16, height: u16) {
        self.viewport = (width, height);
    }

    /// Reload the snippet list from the store
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.snippets = self.store.get_all()?;
        self.cursor = self.cursor.min(self.snippets.len().saturating_sub(1));

        if let Some(id) = self.selected_id() {
            if let Some(fresh) = self.snippets.iter().find(|s| s.id == id) {
                self.selected = Some(fresh.clone());
            }
        }
        Ok(())
    }

    /// Start practicing `id`. A different snippet, or a changed one, starts a
    /// fresh session; an unknown id deselects.
    pub fn select(&mut self, id: SnippetId) -> Result<(), StoreError> {
        let Some(snippet) = self.store.get(id)? else {
            debug!(id, "selected snippet no longer exists");
            self.deselect();
            return Ok(());
        };

        match self.session.as_mut() {
            Some(session) => session.load(snippet.id, snippet.code.clone()),
            None => self.session = Some(self.new_session(&snippet)),
        }
        if let Some(session) = self.session.as_ref() {
            self.status.set(session.status());
        }

        if let Some(pos) = self.snippets.iter().position(|s| s.id == id) {
            self.cursor = pos;
        }
        info!(id, title = %snippet.title, "practicing snippet");
        self.selected = Some(snippet);
        self.screen = Screen::Typing;
        Ok(())
    }

    /// Drop the session (cancelling its timer) and go back to the list
    pub fn deselect(&mut self) {
        self.session = None;
        self.selected = None;
        self.status.set(Status::default());
        self.screen = Screen::Home;
    }

    fn new_session(&self, snippet: &Snippet) -> TypingSession {
        let mut session = TypingSession::new(snippet.id, snippet.code.clone(), self.bus.clone());

        let status = Rc::clone(&self.status);
        session.on_status_change(move |s| status.set(s));
        let completions = Rc::clone(&self.completions);
        session.on_complete(move || completions.set(completions.get() + 1));
        session
    }

    /// Ask for a different snippet at random
    pub fn request_random(&mut self) {
        self.bus.publish(Event::PickRandom);
    }

    /// Feed one keystroke to the active session. Ticks that came due since
    /// the last poll are applied first, so the keystroke is judged at the
    /// right elapsed time even when keys arrive faster than the refresh.
    pub fn submit(&mut self, key: Keystroke) -> Option<Submission> {
        let now = Instant::now();
        let outcome = self.session.as_mut().map(|s| {
            s.poll(now);
            s.submit_at(key, now)
        });

        if self.completions.replace(0) > 0 && self.config.celebrate {
            let (width, height) = self.viewport;
            self.celebration.start(width, height);
        }
        outcome
    }

    /// Open the form for a new snippet
    pub fn start_add(&mut self) {
        self.editor = Some(Editor::new());
        self.editor_return = self.screen;
        self.screen = Screen::Editor;
    }

    /// Open the form for `id`, unless a run is in progress
    pub fn start_edit(&mut self, id: SnippetId) {
        if !self.editing_allowed() {
            self.notice = Some(EDIT_REFUSED.to_string());
            return;
        }
        let Some(snippet) = self.snippets.iter().find(|s| s.id == id) else {
            return;
        };
        self.editor = Some(Editor::for_snippet(snippet));
        self.editor_return = self.screen;
        self.screen = Screen::Editor;
    }

    /// Ask for confirmation before deleting `id`, unless a run is in progress
    pub fn start_delete(&mut self, id: SnippetId) {
        if !self.editing_allowed() {
            self.notice = Some(EDIT_REFUSED.to_string());
            return;
        }
        if let Some(snippet) = self.snippets.iter().find(|s| s.id == id) {
            self.notice = Some(format!("delete \"{}\"? press y to confirm", snippet.title));
            self.pending_delete = Some(id);
        }
    }

    fn close_editor(&mut self) {
        self.editor = None;
        self.screen = self.editor_return;
    }

    /// Store the editor form. Validation failures keep the form open.
    fn save_editor(&mut self) -> Result<(), StoreError> {
        let Some(editor) = self.editor.as_ref() else {
            return Ok(());
        };

        let catalog = self.catalog();
        let saved = match editor.target() {
            Some(id) => catalog.edit(id, &editor.title, &editor.code).map(|()| id),
            None => catalog.add(&editor.title, &editor.code),
        };

        match saved {
            Ok(id) => {
                self.close_editor();
                self.refresh()?;
                if let Some(pos) = self.snippets.iter().position(|s| s.id == id) {
                    self.cursor = pos;
                }
                Ok(())
            }
            Err(CatalogError::Store(e)) => Err(e),
            Err(e) => {
                self.notice = Some(e.to_string());
                Ok(())
            }
        }
    }

    fn confirm_delete(&mut self, id: SnippetId) -> Result<(), StoreError> {
        match self.catalog().remove(id) {
            Ok(()) => Ok(()),
            Err(CatalogError::Store(e)) => Err(e),
            Err(e) => {
                self.notice = Some(e.to_string());
                Ok(())
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<(), StoreError> {
        self.notice = None;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if let Some(id) = self.pending_delete.take() {
            if key.code == KeyCode::Char('y') {
                self.confirm_delete(id)?;
            }
            return self.process_inbox();
        }

        match self.screen {
            Screen::Home => match key.code {
                KeyCode::Char('c') if ctrl => self.should_quit = true,
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.cursor + 1 < self.snippets.len() {
                        self.cursor += 1;
                    }
                }
                KeyCode::Enter => {
                    if let Some(id) = self.highlighted().map(|s| s.id) {
                        self.select(id)?;
                    }
                }
                KeyCode::Char('r') => self.request_random(),
                KeyCode::Char('s') => self.screen = Screen::Stats,
                KeyCode::Char('a') => self.start_add(),
                KeyCode::Char('e') => {
                    if let Some(id) = self.highlighted().map(|s| s.id) {
                        self.start_edit(id);
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(id) = self.highlighted().map(|s| s.id) {
                        self.start_delete(id);
                    }
                }
                _ => {}
            },
            Screen::Typing => match key.code {
                KeyCode::Esc => self.deselect(),
                KeyCode::Char('c') if ctrl => self.should_quit = true,
                KeyCode::Char('r') if ctrl => {
                    if let Some(session) = self.session.as_mut() {
                        session.reset();
                    }
                }
                KeyCode::Char('n') if ctrl => self.request_random(),
                KeyCode::Char('e') if ctrl => {
                    if let Some(session) = self.session.as_mut() {
                        session.toggle_reveal();
                    }
                }
                KeyCode::Char('o') if ctrl => {
                    if let Some(id) = self.selected_id() {
                        self.start_edit(id);
                    }
                }
                KeyCode::Char('d') if ctrl => {
                    if let Some(id) = self.selected_id() {
                        self.start_delete(id);
                    }
                }
                _ => {
                    self.submit(keystroke(&key));
                }
            },
            Screen::Stats => match key.code {
                KeyCode::Char('c') if ctrl => self.should_quit = true,
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('s') => self.screen = Screen::Home,
                _ => {}
            },
            Screen::Editor => {
                let action = match self.editor.as_mut() {
                    Some(editor) => editor.handle_key(&key),
                    None => EditorAction::Cancel,
                };
                match action {
                    EditorAction::None => {}
                    EditorAction::Cancel => self.close_editor(),
                    EditorAction::Save => self.save_editor()?,
                }
            }
        }

        self.process_inbox()
    }

    /// Advance timers and animation to `now`
    pub fn on_tick(&mut self, now: Instant) -> Result<(), StoreError> {
        if let Some(session) = self.session.as_mut() {
            session.poll(now);
        }
        self.celebration.update_at(now);
        self.process_inbox()
    }

    /// Handle every queued bus delivery, including ones queued while handling
    pub fn process_inbox(&mut self) -> Result<(), StoreError> {
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(event) = next else {
                return Ok(());
            };

            match event {
                Event::Completed { .. } | Event::Added => self.refresh()?,
                Event::Deleted(id) => {
                    if self.selected_id() == Some(id) {
                        self.deselect();
                    }
                    self.refresh()?;
                }
                Event::Updated(id) => {
                    self.refresh()?;
                    if self.selected_id() == Some(id) {
                        self.select(id)?;
                    }
                }
                Event::PickRandom => {
                    if let Some(id) = pick_random(&self.snippets, self.selected_id()) {
                        self.select(id)?;
                    }
                }
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // bus clones may outlive the app
        for subscription in &self.subscriptions {
            subscription.cancel();
        }
        if let Some(recorder) = self.recorder.take() {
            recorder.detach();
        }
    }
}
