//! Text input buffer - decoded codepoints, a utf8 shadow, and a cursor.

/// The editable input line of one navigation level.
///
/// Editing operates on decoded codepoints so the cursor always sits on a
/// character boundary; the utf8 shadow is re-synthesized after every edit
/// for filtering and template binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    chars: Vec<char>,
    utf8: String,
    /// Cursor offset in codepoints.
    cursor: usize,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.utf8
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Insert a character at the cursor.
    pub fn insert(&mut self, ch: char) {
        self.chars.insert(self.cursor, ch);
        self.cursor += 1;
        self.resync();
    }

    /// Delete the character before the cursor (backspace).
    pub fn delete_back(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        self.resync();
    }

    /// Delete the word before the cursor: trailing whitespace first, then
    /// the word itself.
    pub fn delete_word(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let mut new_cursor = self.cursor;
        while new_cursor > 0 && self.chars[new_cursor - 1].is_whitespace() {
            new_cursor -= 1;
        }
        while new_cursor > 0 && !self.chars[new_cursor - 1].is_whitespace() {
            new_cursor -= 1;
        }
        self.chars.drain(new_cursor..self.cursor);
        self.cursor = new_cursor;
        self.resync();
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.cursor = 0;
        self.resync();
    }

    /// Replace the whole buffer, placing the cursor at the end.
    pub fn set(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
        self.resync();
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        if self.cursor < self.chars.len() {
            self.cursor += 1;
        }
    }

    fn resync(&mut self) {
        self.utf8 = self.chars.iter().collect();
    }
}
