//! Bounded command-line history, grounded in `original_source/history.c`
//! (a doubly-linked list capped at 128 entries, newest last) re-expressed as
//! an owned ring buffer with a transient navigation cursor, per spec.md §9's
//! "Pointer-heavy linked lists" note.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use crate::errors::{PshError, PshResult};

pub const HISTORY_CAP: usize = 128;

/// A bounded log of committed command lines.
#[derive(Debug, Default)]
pub struct HistoryStore {
    entries: VecDeque<String>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load history from `path`, newest-last, one line per entry.
    /// Missing files are not an error — a fresh shell has empty history.
    pub fn load(path: &Path) -> PshResult<Self> {
        let mut store = Self::new();
        match fs::read_to_string(path) {
            Ok(contents) => {
                for line in contents.lines() {
                    if !line.is_empty() {
                        store.push(line.to_string());
                    }
                }
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(store),
            Err(e) => Err(PshError::io(format!("{}", path.display()), e)),
        }
    }

    /// Overwrite `path` with the current history, one line per entry.
    pub fn save(&self, path: &Path) -> PshResult<()> {
        let mut contents = String::new();
        for entry in &self.entries {
            contents.push_str(entry);
            contents.push('\n');
        }
        fs::write(path, contents).map_err(|e| PshError::io(format!("{}", path.display()), e))
    }

    /// Append a line, evicting the oldest entry if the cap is exceeded.
    pub fn push(&mut self, line: String) {
        self.entries.push_back(line);
        while self.entries.len() > HISTORY_CAP {
            self.entries.pop_front();
        }
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

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn push_caps_at_128_evicting_oldest() {
        let mut store = HistoryStore::new();
        for i in 0..HISTORY_CAP + 10 {
            store.push(format!("cmd-{i}"));
        }
        assert_eq!(store.len(), HISTORY_CAP);
        assert_eq!(store.get(0), Some(format!("cmd-{}", 10).as_str()));
        assert_eq!(
            store.get(HISTORY_CAP - 1),
            Some(format!("cmd-{}", HISTORY_CAP + 9).as_str())
        );
    }

    #[test]
    fn load_missing_file_is_empty_not_error() {
        let store = HistoryStore::load(Path::new("/nonexistent/.psh_history_xyz")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("psh_hist_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".psh_history");

        let mut store = HistoryStore::new();
        store.push("echo one".to_string());
        store.push("echo two".to_string());
        store.save(&path).unwrap();

        let loaded = HistoryStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0), Some("echo one"));
        assert_eq!(loaded.get(1), Some("echo two"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn blank_lines_in_file_are_skipped_on_load() {
        let dir = std::env::temp_dir().join(format!("psh_hist_test2_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".psh_history");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "echo one").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "echo two").unwrap();

        let loaded = HistoryStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
