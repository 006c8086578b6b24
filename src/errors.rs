use std::io;

/// Structured error type for the shell's internal fallible operations.
///
/// User-visible rendering always goes through [`PshError::report`], which
/// applies the `psh: <context>: <reason>` format from the shell's error
/// handling design and appends a trailing `\r` when the terminal is in raw
/// mode (so the next line stays aligned on terminals without ONLCR-style
/// normalization).
#[derive(Debug, thiserror::Error)]
pub enum PshError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Signal {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Terminal {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Exec(String),

    #[error("{0}")]
    Syntax(String),
}

impl PshError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PshError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn signal(context: impl Into<String>, source: io::Error) -> Self {
        PshError::Signal {
            context: context.into(),
            source,
        }
    }

    pub fn terminal(context: impl Into<String>, source: io::Error) -> Self {
        PshError::Terminal {
            context: context.into(),
            source,
        }
    }

    /// Render to stderr in the shell's diagnostic format, honoring raw mode.
    pub fn report(&self, raw_mode: bool) {
        if raw_mode {
            eprint!("psh: {self}\r\n");
        } else {
            eprintln!("psh: {self}");
        }
    }
}

pub type PshResult<T> = Result<T, PshError>;
