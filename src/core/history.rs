use crate::domain::config::history_dir;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// Direction of a history search relative to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Older,
    Newer,
}

/// Command history persisted per profile.
///
/// Entries live in `~/.termlink/history/<profile>.txt`, one per line, oldest
/// first. Submitted lines are appended to the file as they happen so a crash
/// never loses the session's commands. Consecutive duplicates are dropped,
/// matching the usual shell history expectation.
pub struct HistoryStore {
    entries: Vec<String>,
    path: PathBuf,
}

impl HistoryStore {
    /// Load the history for a profile, starting empty if the file does not
    /// exist or cannot be read.
    pub fn load(profile: &str) -> Self {
        Self::load_from(history_dir().join(format!("{}.txt", profile)))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => contents
                .lines()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("could not read history {}: {}", path.display(), e);
                Vec::new()
            }
        };
        Self { entries, path }
    }

    /// Append a submitted line. Empty lines and immediate repeats of the
    /// latest entry are ignored. Returns whether the entry was added.
    pub fn append(&mut self, line: &str) -> bool {
        if line.is_empty() || self.entries.last().map(String::as_str) == Some(line) {
            return false;
        }
        self.entries.push(line.to_string());
        if let Err(e) = self.persist(line) {
            warn!("could not append to history {}: {}", self.path.display(), e);
        }
        true
    }

    fn persist(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Find the next entry matching `prefix`, walking from `from`
    /// (exclusive) in the given direction. `from = None` starts past the
    /// newest entry when searching older, before the oldest when searching
    /// newer. An empty prefix matches everything, which makes plain
    /// up/down navigation a special case of search.
    pub fn search(
        &self,
        prefix: &str,
        from: Option<usize>,
        direction: SearchDirection,
    ) -> Option<usize> {
        match direction {
            SearchDirection::Older => {
                let end = from.unwrap_or(self.entries.len());
                self.entries[..end]
                    .iter()
                    .rposition(|e| e.starts_with(prefix))
            }
            SearchDirection::Newer => {
                let start = from.map(|i| i + 1).unwrap_or(0);
                if start >= self.entries.len() {
                    return None;
                }
                self.entries[start..]
                    .iter()
                    .position(|e| e.starts_with(prefix))
                    .map(|i| start + i)
            }
        }
    }
}
