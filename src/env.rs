//! Ordered shell-variable store layered over the process environment.
//!
//! Grounded in `original_source/env.c`'s `Env` linked list
//! (`psh_getenv`/`psh_setenv`/`psh_unsetenv`): a name is unique, `set` on an
//! existing name overwrites in place, and a lookup miss falls back to the
//! real process environment rather than failing.

/// One name/value pair tracked by the shell, independent of `std::env`.
#[derive(Debug, Clone)]
pub struct EnvEntry {
    pub name: String,
    pub value: String,
}

/// The shell's variable store. Entries set with [`EnvStore::set`] shadow the
/// process environment for [`EnvStore::get`] but are never written back to
/// `std::env` — callers needing real process-environment visibility (for
/// child processes) must do so explicitly via `export`.
#[derive(Debug, Default)]
pub struct EnvStore {
    entries: Vec<EnvEntry>,
}

impl EnvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, falling back to the process environment.
    pub fn get(&self, name: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.clone())
            .or_else(|| std::env::var(name).ok())
    }

    /// Set `name` to `value`, overwriting any existing entry in place.
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.value = value.to_string();
        } else {
            self.entries.push(EnvEntry {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    /// Remove `name` from the local store (the process environment, if it
    /// defines the same name, is left untouched).
    pub fn unset(&mut self, name: &str) {
        self.entries.retain(|e| e.name != name);
    }

    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }
}
