//! Core data model: [`Process`], [`Job`], [`Wrapper`], [`Operator`] and
//! [`TokenCategory`] — the Rust re-expression of `original_source/data_structs.h`
//! and `main.h`'s `process`/`job`/`wrapper`/`Token_Type` structs (spec.md §3).

use std::path::PathBuf;

#[cfg(unix)]
use libc::pid_t;
#[cfg(not(unix))]
type pid_t = i32;

/// A redirect recorded on a [`Process`] at plan-build time.
#[derive(Debug, Clone, Default)]
pub struct ProcessRedirects {
    pub stdin_path: Option<PathBuf>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    /// `true` if stdout should be opened `O_APPEND` rather than `O_TRUNC`.
    pub append: bool,
}

/// One child in a pipeline (spec.md §3 "Process").
#[derive(Debug, Clone)]
pub struct Process {
    pub argv: Vec<String>,
    pub pid: Option<pid_t>,
    pub completed: bool,
    pub stopped: bool,
    pub raw_status: i32,
    pub exit_status: Option<i32>,
    pub redirects: ProcessRedirects,
}

impl Process {
    pub fn new(argv: Vec<String>) -> Self {
        Process {
            argv,
            pid: None,
            completed: false,
            stopped: false,
            raw_status: 0,
            exit_status: None,
            redirects: ProcessRedirects::default(),
        }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// A pipeline plus control state (spec.md §3 "Job").
#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    pub command_text: String,
    pub processes: Vec<Process>,
    pub pgid: Option<pid_t>,
    pub notified: bool,
    #[cfg(unix)]
    pub saved_termios: Option<nix::sys::termios::Termios>,
    pub inverted: bool,
    pub background: bool,
    pub foreground: bool,
}

impl Job {
    pub fn new(id: usize, command_text: String, processes: Vec<Process>) -> Self {
        Job {
            id,
            command_text,
            processes,
            pgid: None,
            notified: false,
            #[cfg(unix)]
            saved_termios: None,
            inverted: false,
            background: false,
            foreground: true,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.processes.iter().all(|p| p.completed)
    }

    pub fn is_stopped(&self) -> bool {
        self.processes.iter().all(|p| p.completed || p.stopped)
            && self.processes.iter().any(|p| p.stopped)
    }

    /// Exit status of the job's last process, with inversion applied.
    pub fn exit_status(&self) -> i32 {
        let raw = self
            .processes
            .last()
            .and_then(|p| p.exit_status)
            .unwrap_or(0);
        if self.inverted {
            i32::from(raw == 0)
        } else {
            raw
        }
    }
}

/// A control operator joining two pipelines in a line (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Sequence,
    And,
    Or,
    Background,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Sequence => ";",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Background => "&",
        }
    }
}

/// A tagged element of the execution plan (spec.md §3 "Wrapper").
#[derive(Debug, Clone)]
pub enum Wrapper {
    Job(Job),
    Operator(Operator),
}

/// Token categories used by the Tokenizer/Categorizer/Validator (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Cmd,
    Arg,
    Redirection,
    Pipe,
    Oper,
    LineContinuation,
    Inversion,
    Quote,
    QuoteEnd,
    BgOper,
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc_with_status(code: i32) -> Process {
        let mut p = Process::new(vec!["true".into()]);
        p.completed = true;
        p.exit_status = Some(code);
        p
    }

    #[test]
    fn job_is_completed_iff_all_processes_completed() {
        let job = Job::new(1, "true".into(), vec![proc_with_status(0)]);
        assert!(job.is_completed());
    }

    #[test]
    fn job_is_stopped_requires_at_least_one_stopped() {
        let mut p1 = proc_with_status(0);
        p1.completed = false;
        p1.stopped = true;
        let job = Job::new(1, "cmd".into(), vec![p1]);
        assert!(job.is_stopped());
        assert!(!job.is_completed());
    }

    #[test]
    fn exit_status_inverts_when_job_inverted() {
        let mut job = Job::new(1, "false".into(), vec![proc_with_status(1)]);
        assert_eq!(job.exit_status(), 1);
        job.inverted = true;
        assert_eq!(job.exit_status(), 0);
    }

    #[test]
    fn exit_status_inversion_of_success_is_one() {
        let mut job = Job::new(1, "true".into(), vec![proc_with_status(0)]);
        job.inverted = true;
        assert_eq!(job.exit_status(), 1);
    }
}
