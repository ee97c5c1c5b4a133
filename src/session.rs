//! The typing session engine.
//!
//! A [`TypingSession`] tracks keystroke-by-keystroke progress against one
//! snippet. Typed text is only ever a prefix of the target: insertions that
//! would break that are dropped, backspace always succeeds. The session moves
//! `Idle -> Running -> Completed`, and [`TypingSession::reset`] returns it to
//! `Idle` from anywhere.
//!
//! Elapsed time advances in whole ticks of the session's own [`Timer`] while
//! running. Completion publishes [`Event::Completed`] on the bus and fires the
//! completion hook exactly once.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::bus::{Event, EventBus};
use crate::store::SnippetId;
use crate::timer::Timer;
use crate::util;

/// Default tick length; each tick adds this much to the elapsed time.
pub const TICK_MS: u64 = 500;

/// Spaces a Tab proposes before greedy matching.
const TAB_WIDTH: usize = 2;

/// A keystroke as the engine classifies it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Tab,
    Enter,
    Backspace,
    /// Any key the engine has no use for
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Completed,
}

/// The `{started, completed}` pair reported to observers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub started: bool,
    pub completed: bool,
}

/// What `submit` did with a keystroke
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// Wrong input; nothing changed
    Rejected,
    /// The keystroke finished the snippet
    Completed { elapsed_ms: u64 },
    /// The session already completed; reset to type again
    Locked,
}

type StatusObserver = Box<dyn FnMut(Status)>;
type CompletionHook = Box<dyn FnMut()>;

pub struct TypingSession {
    id: SnippetId,
    target: String,
    typed: String,
    elapsed_ms: u64,
    phase: Phase,
    revealed: bool,
    timer: Timer,
    bus: EventBus,
    observers: Vec<StatusObserver>,
    on_complete: Option<CompletionHook>,
    last_status: Status,
}

impl std::fmt::Debug for TypingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingSession")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("typed", &self.typed.len())
            .field("target", &self.target.len())
            .field("elapsed_ms", &self.elapsed_ms)
            .field("revealed", &self.revealed)
            .finish_non_exhaustive()
    }
}

impl TypingSession {
    pub fn new(id: SnippetId, target: impl Into<String>, bus: EventBus) -> Self {
        Self::with_tick(id, target, bus, Duration::from_millis(TICK_MS))
    }

    pub fn with_tick(
        id: SnippetId,
        target: impl Into<String>,
        bus: EventBus,
        tick: Duration,
    ) -> Self {
        Self {
            id,
            target: target.into(),
            typed: String::new(),
            elapsed_ms: 0,
            phase: Phase::Idle,
            revealed: false,
            timer: Timer::new(tick),
            bus,
            observers: Vec::new(),
            on_complete: None,
            last_status: Status::default(),
        }
    }

    /// Called with the new `{started, completed}` pair whenever it changes.
    pub fn on_status_change(&mut self, observer: impl FnMut(Status) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Called once per transition into `Completed`.
    pub fn on_complete(&mut self, hook: impl FnMut() + 'static) {
        self.on_complete = Some(Box::new(hook));
    }

    pub fn id(&self) -> SnippetId {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> Status {
        Status {
            started: self.phase == Phase::Running,
            completed: self.phase == Phase::Completed,
        }
    }

    pub fn is_started(&self) -> bool {
        self.status().started
    }

    pub fn is_completed(&self) -> bool {
        self.status().completed
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn set_revealed(&mut self, revealed: bool) {
        self.revealed = revealed;
    }

    pub fn toggle_reveal(&mut self) {
        self.revealed = !self.revealed;
    }

    pub fn minutes_elapsed(&self) -> f64 {
        util::minutes(self.elapsed_ms)
    }

    pub fn chars_per_minute(&self) -> f64 {
        util::chars_per_minute(self.typed.chars().count(), self.elapsed_ms)
    }

    /// Feed one keystroke, arming the timer at the current instant if this
    /// starts the run.
    pub fn submit(&mut self, key: Keystroke) -> Submission {
        self.submit_at(key, Instant::now())
    }

    pub fn submit_at(&mut self, key: Keystroke, now: Instant) -> Submission {
        if self.phase == Phase::Completed {
            return Submission::Locked;
        }

        if self.phase == Phase::Idle {
            self.phase = Phase::Running;
            self.timer.start(now);
            debug!(id = self.id, "session running");
            self.notify();
        }

        match key {
            Keystroke::Char(c) => {
                let mut next = self.typed.clone();
                next.push(c);
                self.propose(next)
            }
            Keystroke::Tab => {
                let mut next = self.typed.clone();
                next.push_str(&" ".repeat(TAB_WIDTH));
                // swallow the rest of the indentation in one go
                if let Some(rest) = self.target.get(next.len()..) {
                    let spaces = rest.len() - rest.trim_start_matches(' ').len();
                    next.push_str(&rest[..spaces]);
                }
                self.propose(next)
            }
            Keystroke::Enter => {
                let mut next = self.typed.clone();
                next.push('\n');
                self.propose(next)
            }
            Keystroke::Backspace => {
                self.typed.pop();
                Submission::Accepted
            }
            Keystroke::Other => Submission::Rejected,
        }
    }

    fn propose(&mut self, next: String) -> Submission {
        if !self.target.starts_with(&next) {
            return Submission::Rejected;
        }

        self.typed = next;
        if self.typed == self.target {
            self.complete();
            return Submission::Completed {
                elapsed_ms: self.elapsed_ms,
            };
        }
        Submission::Accepted
    }

    fn complete(&mut self) {
        self.timer.cancel();
        self.phase = Phase::Completed;
        info!(
            id = self.id,
            elapsed_ms = self.elapsed_ms,
            cpm = self.chars_per_minute(),
            "session completed"
        );

        self.bus.publish(Event::Completed {
            id: self.id,
            elapsed_ms: self.elapsed_ms,
        });
        if let Some(hook) = self.on_complete.as_mut() {
            hook();
        }
        self.notify();
    }

    /// Apply one timer tick. Ticks only count while running; anything else,
    /// including a tick arriving after a reset or completion, is ignored.
    pub fn tick(&mut self) -> bool {
        if self.phase != Phase::Running || !self.timer.is_active() {
            return false;
        }
        self.elapsed_ms += self.timer.period().as_millis() as u64;
        true
    }

    /// Apply every tick that has come due by `now` and return how many
    /// were applied.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let due = self.timer.fire_due(now);
        let mut applied = 0;
        for _ in 0..due {
            if self.tick() {
                applied += 1;
            }
        }
        applied
    }

    /// Back to `Idle`: typed text, elapsed time and flags cleared, timer
    /// cancelled.
    pub fn reset(&mut self) {
        self.timer.cancel();
        self.typed.clear();
        self.elapsed_ms = 0;
        self.phase = Phase::Idle;
        debug!(id = self.id, "session reset");
        self.notify();
    }

    /// Point the session at a (possibly) different snippet. Any change of
    /// identity or text discards progress.
    pub fn load(&mut self, id: SnippetId, target: impl Into<String>) {
        let target = target.into();
        if id == self.id && target == self.target {
            return;
        }
        self.id = id;
        self.target = target;
        self.reset();
    }

    fn notify(&mut self) {
        let status = self.status();
        if status == self.last_status {
            return;
        }
        self.last_status = status;
        for observer in self.observers.iter_mut() {
            observer(status);
        }
    }
}
