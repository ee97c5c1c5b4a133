use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::store::{Snippet, SnippetId};

/// Which input of the form has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Code,
}

/// Result of feeding a key to the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    /// Still editing
    None,
    /// Ctrl+S: validate and store the form
    Save,
    /// Esc: drop the form
    Cancel,
}

/// Title and code form for adding a snippet or changing an existing one.
#[derive(Debug, Clone)]
pub struct Editor {
    target: Option<SnippetId>,
    pub title: String,
    pub code: String,
    pub field: Field,
}

impl Editor {
    /// Empty form for a new snippet
    pub fn new() -> Self {
        Self {
            target: None,
            title: String::new(),
            code: String::new(),
            field: Field::Title,
        }
    }

    /// Form prefilled from `snippet`; saving edits it in place
    pub fn for_snippet(snippet: &Snippet) -> Self {
        Self {
            target: Some(snippet.id),
            title: snippet.title.clone(),
            code: snippet.code.clone(),
            field: Field::Title,
        }
    }

    /// The snippet being edited, `None` when adding
    pub fn target(&self) -> Option<SnippetId> {
        self.target
    }

    fn focused(&mut self) -> &mut String {
        match self.field {
            Field::Title => &mut self.title,
            Field::Code => &mut self.code,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            Field::Title => Field::Code,
            Field::Code => Field::Title,
        };
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> EditorAction {
        let chorded = key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);

        match key.code {
            KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return EditorAction::Save
            }
            KeyCode::Esc => return EditorAction::Cancel,
            KeyCode::Char(_) if chorded => {}
            KeyCode::Char(c) => self.focused().push(c),
            KeyCode::Backspace => {
                self.focused().pop();
            }
            KeyCode::BackTab => self.toggle_field(),
            KeyCode::Tab => match self.field {
                Field::Title => self.field = Field::Code,
                Field::Code => self.code.push_str("  "),
            },
            KeyCode::Enter => match self.field {
                Field::Title => self.field = Field::Code,
                Field::Code => self.code.push('\n'),
            },
            _ => {}
        }
        EditorAction::None
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(editor: &mut Editor, code: KeyCode) -> EditorAction {
        editor.handle_key(&KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(editor: &mut Editor, text: &str) {
        for c in text.chars() {
            press(editor, KeyCode::Char(c));
        }
    }

    #[test]
    fn enter_moves_from_title_to_code() {
        let mut editor = Editor::new();
        type_str(&mut editor, "heap push");
        press(&mut editor, KeyCode::Enter);
        type_str(&mut editor, "if x:");
        press(&mut editor, KeyCode::Enter);
        press(&mut editor, KeyCode::Tab);
        type_str(&mut editor, "push(x)");

        assert_eq!(editor.title, "heap push");
        assert_eq!(editor.code, "if x:\n  push(x)");
        assert_eq!(editor.target(), None);
    }

    #[test]
    fn backspace_edits_focused_field_only() {
        let mut snippet = Snippet::new("binary search", "lo, hi = 0, n");
        snippet.id = 7;
        let mut editor = Editor::for_snippet(&snippet);
        press(&mut editor, KeyCode::Backspace);
        assert_eq!(editor.title, "binary searc");

        press(&mut editor, KeyCode::BackTab);
        press(&mut editor, KeyCode::Backspace);
        assert_eq!(editor.code, "lo, hi = 0, ");
        assert_eq!(editor.title, "binary searc");
        assert_eq!(editor.target(), Some(7));
    }

    #[test]
    fn save_and_cancel_keys() {
        let mut editor = Editor::new();
        assert_eq!(
            editor.handle_key(&KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)),
            EditorAction::Save
        );
        assert_eq!(press(&mut editor, KeyCode::Esc), EditorAction::Cancel);
        assert!(editor.title.is_empty());
    }

    #[test]
    fn chorded_chars_are_not_inserted() {
        let mut editor = Editor::new();
        editor.handle_key(&KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT));
        editor.handle_key(&KeyEvent::new(KeyCode::Char('k'), KeyModifiers::CONTROL));
        assert!(editor.title.is_empty());
    }
}
