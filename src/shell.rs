//! Shell — the top-level state object and the read → validate → expand →
//! plan → execute loop (spec.md §2/§6). Grounded in
//! `original_source/main.c`'s `main`/`launch_jobs` (75–125, 527–589):
//! the inner loop reads a line, validates it, and on success walks the
//! resulting `Vec<Wrapper>` applying `;`/`&&`/`||`/`&` sequencing against
//! the last exit status.
//!
//! One deviation from `launch_jobs`: the original's `&&`/`||` failure path
//! does `return 1`, which aborts the *entire remaining line* rather than
//! just the next clause — that contradicts spec.md §8 scenario 3
//! (`false && echo A || echo B` must still print `B`). This implementation
//! skips only the next clause, matching the documented scenario
//! (DESIGN.md Open Question).

use std::io::Write;
use std::path::PathBuf;

use crate::ast::{Operator, Wrapper};
use crate::builtins::{self, BuiltinContext, BuiltinOutcome};
use crate::config;
use crate::editor::LineEditor;
use crate::env::EnvStore;
use crate::errors::PshResult;
use crate::executor;
use crate::expander::ExpansionContext;
use crate::history::HistoryStore;
use crate::jobs::JobTable;
use crate::plan;
use crate::terminal::TerminalController;
use crate::tokenizer::{categorize, tokenize};
use crate::validator::{self, Validation};

const HISTORY_FILE: &str = ".psh_history";

/// Owns every long-lived subsystem and drives the main loop.
pub struct Shell {
    term: TerminalController,
    env: EnvStore,
    history: HistoryStore,
    history_path: PathBuf,
    jobs: JobTable,
    editor: LineEditor,
    last_status: i32,
    last_bg_pid: Option<i32>,
    config_path: PathBuf,
}

impl Shell {
    pub fn new() -> PshResult<Self> {
        let term = TerminalController::init()?;
        let config_path = PathBuf::from(config::CONFIG_FILE);
        let mut env = EnvStore::new();
        if let Ok(cfg) = config::load(&config_path) {
            for (name, value) in cfg.vars {
                env.set(&name, &value);
            }
        }

        let history_path = PathBuf::from(HISTORY_FILE);
        let history = HistoryStore::load(&history_path).unwrap_or_default();

        Ok(Shell {
            term,
            env,
            history,
            history_path,
            jobs: JobTable::new(),
            editor: LineEditor::new(),
            last_status: 0,
            last_bg_pid: None,
            config_path,
        })
    }

    /// Run until `exit` or EOF, returning the shell's own exit code.
    pub fn run(&mut self) -> i32 {
        let mut pending = String::new();

        loop {
            executor::notification_sweep(&mut self.jobs);

            let prompt = if pending.is_empty() {
                config::resolve_prompt(self.env.get("PS1").as_deref(), false)
            } else {
                config::resolve_prompt(self.env.get("PS2").as_deref(), true)
            };

            let line = match self.editor.read_line(&prompt, &self.history) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.shutdown();
                    return self.last_status;
                }
                Err(_) => {
                    self.shutdown();
                    return self.last_status;
                }
            };

            pending.push_str(&line);
            let source = pending.clone();

            let tokens = tokenize(&source);
            let categorized = categorize(&tokens);

            match validator::validate(&categorized) {
                Validation::NeedsContinuation => {
                    pending.push('\n');
                    continue;
                }
                Validation::SyntaxError(msg) => {
                    eprintln!("psh: {msg}");
                    pending.clear();
                    continue;
                }
                Validation::Ok => {}
            }

            pending.clear();
            if !source.trim().is_empty() {
                self.history.push(source.trim().to_string());
                let _ = self.history.save(&self.history_path);
            }

            let ctx = ExpansionContext {
                env: &self.env,
                last_status: self.last_status,
                last_bg_pid: self.last_bg_pid,
            };
            let next_id = self.jobs.next_id();
            let wrappers = plan::build_plan(&categorized, &ctx, next_id);

            if let Some(code) = self.run_plan(wrappers) {
                self.shutdown();
                return code;
            }
        }
    }

    /// Walk one line's plan applying `;`/`&&`/`||`/`&` sequencing.
    /// Returns `Some(code)` if a builtin requested shell termination.
    fn run_plan(&mut self, wrappers: Vec<Wrapper>) -> Option<i32> {
        let mut pending_operator: Option<Operator> = None;

        for wrapper in wrappers {
            match wrapper {
                Wrapper::Operator(op) => pending_operator = Some(op),
                Wrapper::Job(job) => {
                    let op = pending_operator.take();
                    let should_run = match op {
                        None | Some(Operator::Sequence) | Some(Operator::Background) => true,
                        Some(Operator::And) => self.last_status == 0,
                        Some(Operator::Or) => self.last_status != 0,
                    };
                    if !should_run {
                        continue;
                    }

                    if let Some(code) = self.run_job(job) {
                        return Some(code);
                    }

                    // A job launched unconditionally after `&` always reports
                    // status 0, matching `launch_jobs`'s `& == 0` branch,
                    // regardless of what it actually exited with. A trailing
                    // `&` with nothing after it (no following Job wrapper)
                    // never reaches this arm, so that case is untouched.
                    if op == Some(Operator::Background) {
                        self.last_status = 0;
                    }
                }
            }
        }
        None
    }

    /// Dispatch a single job: in-process for a sole builtin process
    /// (grounded in `execute`'s builtin-without-fork path), otherwise
    /// through the Job Control Engine.
    fn run_job(&mut self, mut job: crate::ast::Job) -> Option<i32> {
        if job.processes.len() == 1 && builtins::is_builtin(job.processes[0].program()) {
            let program = job.processes[0].program().to_string();
            let args = job.processes[0].argv[1..].to_vec();
            let redirects = job.processes[0].redirects.clone();

            if let Some(path) = &redirects.stdin_path {
                if let Err(e) = std::fs::File::open(path) {
                    eprintln!("psh: {}: {e}", path.display());
                    self.last_status = 1;
                    return None;
                }
            }

            let mut stdout =
                match open_redirect(redirects.stdout_path.as_deref(), redirects.append, false) {
                    Ok(w) => w,
                    Err(e) => {
                        eprintln!("psh: {e}");
                        self.last_status = 1;
                        return None;
                    }
                };
            let mut stderr = match open_redirect(redirects.stderr_path.as_deref(), false, true) {
                Ok(w) => w,
                Err(e) => {
                    eprintln!("psh: {e}");
                    self.last_status = 1;
                    return None;
                }
            };

            let mut ctx = BuiltinContext {
                env: &mut self.env,
                jobs: &mut self.jobs,
                term: &self.term,
                config_path: &self.config_path,
            };
            match builtins::execute(&program, &args, &mut ctx, stdout.as_mut(), stderr.as_mut()) {
                BuiltinOutcome::Ran(code) => {
                    let _ = stdout.flush();
                    self.last_status = if job.inverted {
                        i32::from(code == 0)
                    } else {
                        code
                    };
                }
                BuiltinOutcome::Exit(code) => return Some(code),
            }
            return None;
        }

        if let Err(e) = executor::launch_job(&mut job, &self.term, &mut self.jobs) {
            e.report(!self.term.interactive);
            self.last_status = 1;
            return None;
        }

        if job.background {
            self.last_bg_pid = job.pgid;
            self.jobs.insert(job);
        } else {
            self.last_status = job.exit_status();
            if job.is_stopped() {
                // Ctrl-Z suspended a foreground job; keep it around for a
                // later `fg`/`bg` (spec.md §4.8 STOPPED state).
                self.jobs.insert(job);
            }
        }
        None
    }

    fn shutdown(&mut self) {
        for job in self.jobs.iter() {
            if let Some(pgid) = job.pgid {
                crate::signals::hangup_job(pgid);
            }
        }
        let _ = self.history.save(&self.history_path);
    }
}

/// Open a builtin's redirected stdout/stderr target, matching the
/// `O_TRUNC`/`O_APPEND` choice `executor.rs::spawn_process` makes for
/// external processes. Falls back to the shell's own stdout/stderr when
/// `path` is `None`, so a builtin with no redirect behaves exactly like
/// before.
fn open_redirect(
    path: Option<&std::path::Path>,
    append: bool,
    is_stderr: bool,
) -> std::io::Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(append)
                .truncate(!append)
                .open(path)?;
            Ok(Box::new(file))
        }
        None if is_stderr => Ok(Box::new(std::io::stderr())),
        None => Ok(Box::new(std::io::stdout())),
    }
}
