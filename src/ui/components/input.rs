use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputKind {
  /// Any printable text
  #[default]
  Text,
  /// Digits only (the sign is chosen by the add/subtract action, not typed)
  Numeric,
}

/// Result of handling a key event in an input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, stay in the field
  Consumed,
  /// Enter pressed
  Submitted,
  /// Escape pressed
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Single-line text input with cursor editing.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
  kind: InputKind,
}

impl TextInput {
  pub fn new(kind: InputKind) -> Self {
    Self {
      kind,
      ..Self::default()
    }
  }

  /// Get the current input value
  pub fn value(&self) -> &str {
    &self.buffer
  }

  /// Check if the input is empty
  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  /// Clear the input
  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  fn accepts(&self, c: char) -> bool {
    match self.kind {
      InputKind::Text => !c.is_control(),
      InputKind::Numeric => c.is_ascii_digit(),
    }
  }

  /// Byte offset of the char boundary preceding the cursor.
  fn prev_boundary(&self) -> Option<usize> {
    self.buffer[..self.cursor]
      .char_indices()
      .next_back()
      .map(|(idx, _)| idx)
  }

  /// Handle a key event, returning the result.
  ///
  /// `cursor` is a byte offset into `buffer` and always sits on a char
  /// boundary: every move steps over a whole char, so multi-byte input is
  /// safe.
  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    match key.code {
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter => InputResult::Submitted,
      KeyCode::Backspace => {
        if let Some(idx) = self.prev_boundary() {
          self.buffer.remove(idx);
          self.cursor = idx;
        }
        InputResult::Consumed
      }
      KeyCode::Delete => {
        if self.cursor < self.buffer.len() {
          self.buffer.remove(self.cursor);
        }
        InputResult::Consumed
      }
      KeyCode::Left => {
        if let Some(idx) = self.prev_boundary() {
          self.cursor = idx;
        }
        InputResult::Consumed
      }
      KeyCode::Right => {
        if let Some(c) = self.buffer[self.cursor..].chars().next() {
          self.cursor += c.len_utf8();
        }
        InputResult::Consumed
      }
      KeyCode::Home => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End => {
        self.cursor = self.buffer.len();
        InputResult::Consumed
      }
      KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        // Clear line before cursor
        self.buffer = self.buffer[self.cursor..].to_string();
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char(c) if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT => {
        if self.accepts(c) {
          self.buffer.insert(self.cursor, c);
          self.cursor += c.len_utf8();
        }
        InputResult::Consumed
      }
      _ => InputResult::NotHandled,
    }
  }

  /// Cursor position for rendering, in display columns (chars, not bytes)
  pub fn cursor_position(&self) -> usize {
    self.buffer[..self.cursor].chars().count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_str(input: &mut TextInput, s: &str) {
    for c in s.chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_basic_input() {
    let mut input = TextInput::new(InputKind::Text);
    assert!(input.is_empty());

    type_str(&mut input, "rent");
    assert_eq!(input.value(), "rent");
  }

  #[test]
  fn test_numeric_rejects_letters() {
    let mut input = TextInput::new(InputKind::Numeric);
    type_str(&mut input, "1a2b3");
    assert_eq!(input.value(), "123");
  }

  #[test]
  fn test_numeric_rejects_sign() {
    // Sign is chosen by the add/subtract action, never typed
    let mut input = TextInput::new(InputKind::Numeric);
    type_str(&mut input, "-45");
    assert_eq!(input.value(), "45");
  }

  #[test]
  fn test_submit_and_cancel() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "x");

    assert_eq!(input.handle_key(key(KeyCode::Enter)), InputResult::Submitted);
    assert_eq!(input.handle_key(key(KeyCode::Esc)), InputResult::Cancelled);
  }

  #[test]
  fn test_backspace() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "abc");
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "ab");
  }

  #[test]
  fn test_cursor_insert_mid_string() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "ac");
    input.handle_key(key(KeyCode::Left));
    type_str(&mut input, "b");
    assert_eq!(input.value(), "abc");
  }

  #[test]
  fn test_multibyte_input() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "café!");
    assert_eq!(input.value(), "café!");
    assert_eq!(input.cursor_position(), 5);
  }

  #[test]
  fn test_backspace_over_multibyte_char() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "café");
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "caf");
    type_str(&mut input, "e");
    assert_eq!(input.value(), "cafe");
  }

  #[test]
  fn test_cursor_moves_over_whole_chars() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "café");
    // Step left over the accent, insert, step right past it again
    input.handle_key(key(KeyCode::Left));
    type_str(&mut input, "f");
    assert_eq!(input.value(), "caffé");
    input.handle_key(key(KeyCode::Right));
    type_str(&mut input, "!");
    assert_eq!(input.value(), "caffé!");
  }

  #[test]
  fn test_delete_at_multibyte_char() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "café");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Delete));
    assert_eq!(input.value(), "caf");
  }

  #[test]
  fn test_ctrl_u_clears_before_cursor() {
    let mut input = TextInput::new(InputKind::Text);
    type_str(&mut input, "groceries");
    input.handle_key(key(KeyCode::Home));
    // Nothing before the cursor: buffer untouched
    input.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    assert_eq!(input.value(), "groceries");

    input.handle_key(key(KeyCode::End));
    input.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    assert_eq!(input.value(), "");
  }
}
