//! Line Editor — raw-mode input with cursor movement, Emacs keybindings,
//! history navigation and Tab completion (spec.md §4.3). Keeps the
//! teacher's `RawModeGuard`/buffer/cursor design, swaps the teacher's inline
//! `Vec<String>` history for the shared [`crate::history::HistoryStore`],
//! and adds the Tab-completion state machine grounded in
//! `original_source/autocompletion.c`'s `autocomplete` (tab-press counter,
//! cached pattern/candidates, cycling via `% completion_count`).

use std::io::{self, BufRead, Write};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, ClearType},
    tty::IsTty,
};

use crate::history::HistoryStore;

/// `true` while the line editor holds the terminal in raw mode.
pub static EDITOR_ACTIVE: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        EDITOR_ACTIVE.store(true, std::sync::atomic::Ordering::Relaxed);
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        EDITOR_ACTIVE.store(false, std::sync::atomic::Ordering::Relaxed);
    }
}

/// Cached Tab-completion state, alive across repeated Tab presses on the
/// same token. Any other key press drops it. Grounded in `autocomplete`'s
/// `token_to_complete`/`possible_completions`/`tab_count`.
struct TabState {
    word_start: usize,
    word_len: usize,
    candidates: Vec<String>,
    index: usize,
}

pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
    history_idx: usize,
    saved_buffer: String,
    tab_state: Option<TabState>,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    pub fn new() -> Self {
        LineEditor {
            buffer: Vec::new(),
            cursor: 0,
            history_idx: 0,
            saved_buffer: String::new(),
            tab_state: None,
        }
    }

    /// Read one line of input against `history` for Up/Down navigation.
    ///
    /// - `Ok(Some(line))` — the user submitted a line (may be empty)
    /// - `Ok(None)` — EOF (Ctrl-D on an empty buffer, or stdin closed)
    /// - `Err(_)` — I/O error
    pub fn read_line(&mut self, prompt: &str, history: &HistoryStore) -> io::Result<Option<String>> {
        if !io::stdin().is_tty() {
            return self.read_line_fallback(prompt);
        }

        self.reset_state(history);
        let _guard = RawModeGuard::enter()?;

        print!("{prompt}");
        io::stdout().flush()?;

        loop {
            let ev = match event::read() {
                Ok(ev) => ev,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let Event::Key(key) = ev else {
                continue;
            };
            if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
                continue;
            }

            if key.code != KeyCode::Tab {
                self.tab_state = None;
            }

            match self.handle_key(key, prompt, history)? {
                KeyAction::Submit(line) => return Ok(Some(line)),
                KeyAction::Eof => return Ok(None),
                KeyAction::Continue => {}
            }
        }
    }

    fn reset_state(&mut self, history: &HistoryStore) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_idx = history.len();
        self.saved_buffer.clear();
        self.tab_state = None;
    }

    fn read_line_fallback(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        let stdin = io::stdin();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(line)),
            Err(e) => Err(e),
        }
    }

    fn handle_key(
        &mut self,
        key: crossterm::event::KeyEvent,
        prompt: &str,
        history: &HistoryStore,
    ) -> io::Result<KeyAction> {
        use KeyCode::*;
        use KeyModifiers as Mod;

        match (key.code, key.modifiers) {
            (Enter, _) => {
                print!("\r\n");
                io::stdout().flush()?;
                let line: String = self.buffer.iter().collect();
                return Ok(KeyAction::Submit(line));
            }

            (Char('d'), Mod::CONTROL) => {
                if self.buffer.is_empty() {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(KeyAction::Eof);
                }
                self.delete_at_cursor();
                self.redraw(prompt)?;
            }

            (Char('c'), Mod::CONTROL) => {
                print!("^C\r\n{prompt}");
                io::stdout().flush()?;
                self.buffer.clear();
                self.cursor = 0;
                self.history_idx = history.len();
                self.saved_buffer.clear();
            }

            (Char('l'), Mod::CONTROL) => {
                execute!(
                    io::stdout(),
                    terminal::Clear(ClearType::All),
                    cursor::MoveTo(0, 0),
                )?;
                self.redraw(prompt)?;
            }

            (Char('a'), Mod::CONTROL) | (Home, _) => {
                self.cursor = 0;
                self.sync_cursor(prompt)?;
            }

            (Char('e'), Mod::CONTROL) | (End, _) => {
                self.cursor = self.buffer.len();
                self.sync_cursor(prompt)?;
            }

            (Char('k'), Mod::CONTROL) => {
                self.buffer.truncate(self.cursor);
                self.redraw(prompt)?;
            }

            (Char('u'), Mod::CONTROL) => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                self.redraw(prompt)?;
            }

            (Char('w'), Mod::CONTROL) => {
                self.delete_word_before_cursor();
                self.redraw(prompt)?;
            }

            (Left, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.sync_cursor(prompt)?;
                }
            }
            (Right, _) => {
                if self.cursor < self.buffer.len() {
                    self.cursor += 1;
                    self.sync_cursor(prompt)?;
                }
            }

            (Up, _) => {
                self.history_prev(history);
                self.redraw(prompt)?;
            }
            (Down, _) => {
                self.history_next(history);
                self.redraw(prompt)?;
            }

            (Backspace, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                    self.redraw(prompt)?;
                }
            }
            (Delete, _) => {
                self.delete_at_cursor();
                self.redraw(prompt)?;
            }

            (Tab, _) => {
                self.tab_complete();
                self.redraw(prompt)?;
            }

            (Char(c), Mod::NONE) | (Char(c), Mod::SHIFT) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
                self.redraw(prompt)?;
            }

            _ => {}
        }

        Ok(KeyAction::Continue)
    }

    /// Complete the token under the cursor, cycling through candidates on
    /// repeated presses. Grounded in `autocomplete`: first Tab computes the
    /// token and candidate list (PATH basenames for the first token on the
    /// line, glob matches otherwise per SPEC_FULL.md §9(a)); later Tabs
    /// (while `tab_state` survives) cycle `index % candidates.len()`.
    fn tab_complete(&mut self) {
        if self.tab_state.is_none() {
            let (word_start, word_len) = self.current_word_bounds();
            let word: String = self.buffer[word_start..word_start + word_len]
                .iter()
                .collect();
            let prefix: String = self.buffer[..word_start].iter().collect();
            let is_cmd_position =
                crate::tokenizer::expects_clause_start(&crate::tokenizer::tokenize(&prefix));

            let candidates = if is_cmd_position {
                complete_command(&word)
            } else {
                complete_path(&word)
            };
            if candidates.is_empty() {
                return;
            }
            self.tab_state = Some(TabState {
                word_start,
                word_len,
                candidates,
                index: 0,
            });
        } else if let Some(state) = &mut self.tab_state {
            state.index = (state.index + 1) % state.candidates.len();
        }

        let Some(state) = &self.tab_state else { return };
        let replacement: Vec<char> = state.candidates[state.index].chars().collect();
        let end = state.word_start + state.word_len;
        self.buffer.splice(state.word_start..end, replacement.iter().copied());
        self.cursor = state.word_start + replacement.len();

        if let Some(state) = &mut self.tab_state {
            state.word_len = replacement.len();
        }
    }

    /// The `[start, start+len)` char range of the token containing (or
    /// immediately before) the cursor.
    fn current_word_bounds(&self) -> (usize, usize) {
        let mut start = self.cursor;
        while start > 0 && self.buffer[start - 1] != ' ' {
            start -= 1;
        }
        let mut end = self.cursor;
        while end < self.buffer.len() && self.buffer[end] != ' ' {
            end += 1;
        }
        (start, end - start)
    }

    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let line: String = self.buffer.iter().collect();
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
        )?;
        print!("{prompt}{line}");
        io::stdout().flush()?;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    fn sync_cursor(&self, prompt: &str) -> io::Result<()> {
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    fn delete_at_cursor(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    fn delete_word_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let mut end = self.cursor;
        while end > 0 && self.buffer[end - 1] == ' ' {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && self.buffer[start - 1] != ' ' {
            start -= 1;
        }
        self.buffer.drain(start..self.cursor);
        self.cursor = start;
    }

    fn history_prev(&mut self, history: &HistoryStore) {
        if history.is_empty() {
            return;
        }
        if self.history_idx == history.len() {
            self.saved_buffer = self.buffer.iter().collect();
        }
        if self.history_idx > 0 {
            self.history_idx -= 1;
            self.buffer = history.get(self.history_idx).unwrap_or("").chars().collect();
            self.cursor = self.buffer.len();
        }
    }

    fn history_next(&mut self, history: &HistoryStore) {
        if self.history_idx >= history.len() {
            return;
        }
        self.history_idx += 1;
        if self.history_idx == history.len() {
            self.buffer = self.saved_buffer.chars().collect();
        } else {
            self.buffer = history.get(self.history_idx).unwrap_or("").chars().collect();
        }
        self.cursor = self.buffer.len();
    }
}

enum KeyAction {
    Continue,
    Submit(String),
    Eof,
}

/// PATH-basename completion for the first token of a clause. Grounded in
/// `create_cmd_argv` (glob every `PATH` directory for `pattern*`, keep
/// basenames only — never builtin names, per SPEC_FULL.md §9(a)), with a
/// `./`-prefixed pattern instead globbed in the current directory and
/// filtered to executables, re-prefixed `./`, per `create_exec_list`.
fn complete_command(prefix: &str) -> Vec<String> {
    if let Some(rest) = prefix.strip_prefix("./") {
        let pattern = format!("./{rest}*");
        let Ok(paths) = glob::glob(&pattern) else {
            return Vec::new();
        };
        return paths
            .flatten()
            .filter(|p| crate::builtins::is_executable(p))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(|n| format!("./{n}")))
            .collect();
    }

    let Ok(path_var) = std::env::var("PATH") else {
        return Vec::new();
    };
    let mut results = Vec::new();
    for dir in path_var.split(':') {
        let pattern = format!("{}/{}*", dir.trim_end_matches('/'), prefix);
        let Ok(paths) = glob::glob(&pattern) else {
            continue;
        };
        for entry in paths.flatten() {
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                if !results.contains(&name.to_string()) {
                    results.push(name.to_string());
                }
            }
        }
    }
    results
}

/// Filesystem-glob completion for a non-first token. Grounded in
/// `create_argv` (`glob(token*, GLOB_TILDE | GLOB_MARK)`): `~` is expanded
/// before globbing, and directory matches are marked with a trailing `/`.
fn complete_path(prefix: &str) -> Vec<String> {
    let expanded = crate::expander::expand_tilde(prefix);
    let pattern = format!("{expanded}*");
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };
    paths
        .flatten()
        .map(|p| {
            let mut s = p.to_string_lossy().into_owned();
            if p.is_dir() {
                s.push('/');
            }
            s
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn editor() -> LineEditor {
        LineEditor::new()
    }

    fn history_with(entries: &[&str]) -> HistoryStore {
        let mut h = HistoryStore::new();
        for e in entries {
            h.push(e.to_string());
        }
        h
    }

    #[test]
    fn history_navigation_saves_and_restores_buffer() {
        let mut e = editor();
        let history = history_with(&["echo hello", "ls -la"]);
        e.history_idx = history.len();
        e.buffer = "pwd".chars().collect();
        e.cursor = 3;

        e.history_prev(&history);
        assert_eq!(e.buffer.iter().collect::<String>(), "ls -la");
        assert_eq!(e.saved_buffer, "pwd");

        e.history_prev(&history);
        assert_eq!(e.buffer.iter().collect::<String>(), "echo hello");

        e.history_prev(&history);
        assert_eq!(e.buffer.iter().collect::<String>(), "echo hello");

        e.history_next(&history);
        assert_eq!(e.buffer.iter().collect::<String>(), "ls -la");

        e.history_next(&history);
        assert_eq!(e.buffer.iter().collect::<String>(), "pwd");

        e.history_next(&history);
        assert_eq!(e.buffer.iter().collect::<String>(), "pwd");
    }

    #[test]
    fn ctrl_w_deletes_previous_word() {
        let mut e = editor();
        e.buffer = "echo hello world".chars().collect();
        e.cursor = e.buffer.len();
        e.delete_word_before_cursor();
        assert_eq!(e.buffer.iter().collect::<String>(), "echo hello ");
        assert_eq!(e.cursor, "echo hello ".len());
    }

    #[test]
    fn ctrl_w_skips_trailing_spaces() {
        let mut e = editor();
        e.buffer = "echo hello   ".chars().collect();
        e.cursor = e.buffer.len();
        e.delete_word_before_cursor();
        assert_eq!(e.buffer.iter().collect::<String>(), "echo ");
        assert_eq!(e.cursor, "echo ".len());
    }

    #[test]
    fn ctrl_w_at_start_is_noop() {
        let mut e = editor();
        e.buffer = "hello".chars().collect();
        e.cursor = 0;
        e.delete_word_before_cursor();
        assert_eq!(e.buffer.iter().collect::<String>(), "hello");
        assert_eq!(e.cursor, 0);
    }

    #[test]
    fn key_events_edit_buffer_like_terminal() {
        let mut e = editor();
        let history = HistoryStore::new();
        let prompt = "$ ";
        let k = |code: KeyCode, mods: KeyModifiers| KeyEvent::new(code, mods);

        e.handle_key(k(KeyCode::Char('h'), KeyModifiers::NONE), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::Char('i'), KeyModifiers::NONE), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::Left, KeyModifiers::NONE), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::Char('i'), KeyModifiers::NONE), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::Right, KeyModifiers::NONE), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::Backspace, KeyModifiers::NONE), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::Home, KeyModifiers::NONE), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::Char('H'), KeyModifiers::SHIFT), prompt, &history)
            .unwrap();
        e.handle_key(k(KeyCode::End, KeyModifiers::NONE), prompt, &history)
            .unwrap();

        assert_eq!(e.buffer.iter().collect::<String>(), "Hhi");
        assert_eq!(e.cursor, e.buffer.len());
    }

    #[test]
    fn current_word_bounds_finds_token_under_cursor() {
        let mut e = editor();
        e.buffer = "echo hello".chars().collect();
        e.cursor = e.buffer.len();
        assert_eq!(e.current_word_bounds(), (5, 5));
    }
}
