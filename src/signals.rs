//! Signal Discipline — the shell-wide signal posture (spec.md §4.2).
//! Grounded in `original_source/main.c`'s `init_shell()`/`handle_sigwinch`
//! and the teacher's `pre_exec` signal resets, using `nix::sys::signal`
//! (a safe `sigaction` wrapper) in place of the teacher's raw `libc::signal`
//! calls, since child-side restoration needs `sigaction` semantics.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::Pid;

use crate::errors::PshResult;

/// Set by the `SIGWINCH` handler; polled by the line editor, never blocked on.
pub static WINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigwinch(_: libc::c_int) {
    WINCH_RECEIVED.store(true, Ordering::SeqCst);
}

/// Interactive/job-control signals the shell itself ignores, per
/// `init_shell()`. `SIGCHLD` is left at its default disposition; children are
/// reaped synchronously by the notification sweep, not from a handler.
const SHELL_IGNORED: &[Signal] = &[
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// Signals reset to `SIG_DFL` in a child immediately after `setpgid`, before
/// `execvp` (via `pre_exec`), so the child doesn't inherit the shell's
/// ignore-set across `exec`. `SIGPIPE` is included because Rust's runtime
/// sets it to `SIG_IGN` for the whole process, and `SIG_IGN` survives
/// `execve` — without resetting it here, every pipeline stage would ignore
/// a closed read end instead of dying from it like a real shell's children.
const CHILD_RESET: &[Signal] = &[
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    Signal::SIGHUP,
    Signal::SIGTERM,
    Signal::SIGPIPE,
];

/// Install the shell's startup signal posture and the `SIGWINCH` handler.
pub fn install_shell_handlers() -> PshResult<()> {
    for &sig in SHELL_IGNORED {
        unsafe {
            signal::signal(sig, SigHandler::SigIgn)
                .map_err(|e| crate::errors::PshError::signal(sig.as_str(), std::io::Error::from(e)))?;
        }
    }
    unsafe {
        signal::signal(Signal::SIGWINCH, SigHandler::Handler(on_sigwinch))
            .map_err(|e| crate::errors::PshError::signal("SIGWINCH", std::io::Error::from(e)))?;
    }
    Ok(())
}

/// Reset a freshly-forked child's signal disposition to default, called
/// from `pre_exec` after `setpgid` and before `execvp`.
pub fn reset_child_signals() -> std::io::Result<()> {
    for &sig in CHILD_RESET {
        unsafe {
            signal::signal(sig, SigHandler::SigDfl).map_err(std::io::Error::from)?;
        }
    }
    Ok(())
}

/// `killpg(job.pgid, SIGHUP)` for every tracked job, called on shell exit
/// (`psh_exit` in `original_source/builtin.c`).
pub fn hangup_job(pgid: libc::pid_t) {
    let _ = signal::killpg(Pid::from_raw(pgid), Signal::SIGHUP);
}
