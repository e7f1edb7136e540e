use crate::core::history::{HistoryStore, SearchDirection};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a keystroke produced once the editor consumed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Keystroke was absorbed into the edit state; redraw the prompt line.
    Pending,
    /// The user submitted a completed line.
    Line(String),
    /// Quit request (Ctrl-C anywhere, Ctrl-D on an empty line).
    Quit,
    /// Clear the screen, keeping the current input line.
    ClearScreen,
}

/// History walk in progress: where we are, what was typed before it started,
/// and the prefix the walk filters on (empty for plain up/down).
struct HistoryWalk {
    index: usize,
    saved_line: String,
    prefix: String,
}

/// Single-line editor fed one key event at a time.
///
/// Owns the mutable edit state (buffer, cursor, history walk) and the
/// per-profile history store. Never touches the terminal; the renderer draws
/// the prompt from `buffer()`/`cursor()` after every consumed event.
pub struct LineEditor {
    buffer: String,
    /// Cursor position in characters, 0..=buffer character count.
    cursor: usize,
    history: HistoryStore,
    walk: Option<HistoryWalk>,
}

impl LineEditor {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            history,
            walk: None,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Cursor offset in characters from the start of the buffer.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Consume one key event and report what it amounted to.
    pub fn feed(&mut self, key: KeyEvent) -> EditorAction {
        if key.kind == KeyEventKind::Release {
            return EditorAction::Pending;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return self.feed_control(key.code);
        }

        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Char(c) => {
                self.insert(c);
                EditorAction::Pending
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.remove_at_cursor();
                }
                EditorAction::Pending
            }
            KeyCode::Delete => {
                self.remove_at_cursor();
                EditorAction::Pending
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                EditorAction::Pending
            }
            KeyCode::Right => {
                if self.cursor < self.char_count() {
                    self.cursor += 1;
                }
                EditorAction::Pending
            }
            KeyCode::Home => {
                self.cursor = 0;
                EditorAction::Pending
            }
            KeyCode::End => {
                self.cursor = self.char_count();
                EditorAction::Pending
            }
            KeyCode::Up => self.walk_history(SearchDirection::Older, false),
            KeyCode::Down => self.walk_history(SearchDirection::Newer, false),
            KeyCode::PageUp => self.walk_history(SearchDirection::Older, true),
            KeyCode::PageDown => self.walk_history(SearchDirection::Newer, true),
            _ => EditorAction::Pending,
        }
    }

    fn feed_control(&mut self, code: KeyCode) -> EditorAction {
        match code {
            KeyCode::Char('c') => EditorAction::Quit,
            KeyCode::Char('d') => {
                if self.buffer.is_empty() {
                    EditorAction::Quit
                } else {
                    self.remove_at_cursor();
                    EditorAction::Pending
                }
            }
            KeyCode::Char('l') => EditorAction::ClearScreen,
            KeyCode::Char('a') => {
                self.cursor = 0;
                EditorAction::Pending
            }
            KeyCode::Char('e') => {
                self.cursor = self.char_count();
                EditorAction::Pending
            }
            KeyCode::Char('b') => {
                self.cursor = self.cursor.saturating_sub(1);
                EditorAction::Pending
            }
            KeyCode::Char('f') => {
                if self.cursor < self.char_count() {
                    self.cursor += 1;
                }
                EditorAction::Pending
            }
            KeyCode::Char('k') => {
                let at = self.byte_index(self.cursor);
                self.buffer.truncate(at);
                self.walk = None;
                EditorAction::Pending
            }
            KeyCode::Char('u') => {
                let at = self.byte_index(self.cursor);
                self.buffer.replace_range(..at, "");
                self.cursor = 0;
                self.walk = None;
                EditorAction::Pending
            }
            KeyCode::Char('w') => {
                self.kill_previous_word();
                EditorAction::Pending
            }
            _ => EditorAction::Pending,
        }
    }

    fn submit(&mut self) -> EditorAction {
        let line = std::mem::take(&mut self.buffer);
        self.cursor = 0;
        self.walk = None;
        self.history.append(&line);
        EditorAction::Line(line)
    }

    fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
        self.walk = None;
    }

    fn remove_at_cursor(&mut self) {
        let at = self.byte_index(self.cursor);
        if at < self.buffer.len() {
            self.buffer.remove(at);
            self.walk = None;
        }
    }

    fn kill_previous_word(&mut self) {
        let end = self.byte_index(self.cursor);
        let head = &self.buffer[..end];
        let trimmed = head.trim_end();
        let start = trimmed.rfind(' ').map(|i| i + 1).unwrap_or(0);
        self.buffer.replace_range(start..end, "");
        self.cursor = self.buffer[..start].chars().count();
        self.walk = None;
    }

    /// Step through history. `prefixed` filters on the text left of the
    /// cursor at the moment the walk starts.
    fn walk_history(&mut self, direction: SearchDirection, prefixed: bool) -> EditorAction {
        let (from, prefix) = match &self.walk {
            Some(walk) => (Some(walk.index), walk.prefix.clone()),
            None => {
                if direction == SearchDirection::Newer {
                    // Nothing newer than the line being typed.
                    return EditorAction::Pending;
                }
                let prefix = if prefixed {
                    self.buffer[..self.byte_index(self.cursor)].to_string()
                } else {
                    String::new()
                };
                (None, prefix)
            }
        };

        match self.history.search(&prefix, from, direction) {
            Some(index) => {
                let Some(entry) = self.history.get(index).map(str::to_string) else {
                    return EditorAction::Pending;
                };
                let saved_line = match self.walk.take() {
                    Some(walk) => walk.saved_line,
                    None => std::mem::take(&mut self.buffer),
                };
                self.buffer = entry;
                self.cursor = self.char_count();
                self.walk = Some(HistoryWalk {
                    index,
                    saved_line,
                    prefix,
                });
            }
            None => {
                if direction == SearchDirection::Newer {
                    // Walked past the newest entry: restore the typed line.
                    if let Some(walk) = self.walk.take() {
                        self.buffer = walk.saved_line;
                        self.cursor = self.char_count();
                    }
                }
                // Older with no match: stay put.
            }
        }
        EditorAction::Pending
    }

    fn char_count(&self) -> usize {
        self.buffer.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.buffer
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.buffer.len())
    }
}
