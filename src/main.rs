//! Entry point: install logging and signal discipline, then hand off to
//! [`shell::Shell`]. Grounded in `original_source/main.c`'s `main()`
//! (init_shell → loop → save_history).

mod ast;
mod builtins;
mod config;
mod editor;
mod env;
mod errors;
mod executor;
mod expander;
mod history;
mod job_control;
mod jobs;
mod plan;
mod shell;
mod signals;
mod terminal;
mod tokenizer;
mod validator;

use std::io::{self, Write};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    // In raw mode ISIG is off, so Ctrl-C arrives at the line editor as a key
    // event; this only guards the narrow windows outside raw mode (prompt
    // print, builtin execution) where a stray SIGINT could otherwise leave
    // the cursor mid-line, since the shell process itself ignores SIGINT
    // (signals::install_shell_handlers).
    let _ = ctrlc::set_handler(|| {
        if !editor::EDITOR_ACTIVE.load(std::sync::atomic::Ordering::Relaxed) {
            println!();
            let _ = io::stdout().flush();
        }
    });

    if let Err(e) = signals::install_shell_handlers() {
        e.report(false);
    }

    let code = match shell::Shell::new() {
        Ok(mut shell) => shell.run(),
        Err(e) => {
            e.report(false);
            1
        }
    };

    std::process::exit(code);
}
