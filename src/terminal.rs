//! Terminal Controller — owns the controlling terminal and the shell's own
//! process group (spec.md §4.1). Grounded in `original_source/main.c`'s
//! `init_shell()` (1118–1158) and the teacher's terminal-foreground RAII
//! guard, generalized into a long-lived object owned by
//! [`crate::shell::Shell`] instead of a per-call guard.

use std::io;

#[cfg(unix)]
use nix::sys::termios::Termios;

use crate::errors::{PshError, PshResult};

#[cfg(unix)]
pub struct TerminalController {
    pub interactive: bool,
    shell_pgid: libc::pid_t,
    cooked_mode: Option<Termios>,
}

#[cfg(unix)]
impl TerminalController {
    /// Claim the controlling terminal for the shell's own process group, or
    /// mark the shell non-interactive if stdin isn't a tty (or
    /// `PSH_NON_INTERACTIVE` is set, mirroring the original's test hook).
    pub fn init() -> PshResult<Self> {
        if std::env::var_os("PSH_NON_INTERACTIVE").is_some()
            || unsafe { libc::isatty(libc::STDIN_FILENO) } != 1
        {
            return Ok(TerminalController {
                interactive: false,
                shell_pgid: unsafe { libc::getpid() },
                cooked_mode: None,
            });
        }

        unsafe {
            let mut shell_pgid = libc::getpgrp();
            while libc::tcgetpgrp(libc::STDIN_FILENO) != shell_pgid {
                libc::kill(-shell_pgid, libc::SIGTTIN);
                shell_pgid = libc::getpgrp();
            }

            libc::signal(libc::SIGINT, libc::SIG_IGN);
            libc::signal(libc::SIGQUIT, libc::SIG_IGN);
            libc::signal(libc::SIGTSTP, libc::SIG_IGN);
            libc::signal(libc::SIGTTIN, libc::SIG_IGN);
            libc::signal(libc::SIGTTOU, libc::SIG_IGN);

            let shell_pgid = libc::getpid();
            if libc::setpgid(shell_pgid, shell_pgid) < 0 {
                return Err(PshError::terminal(
                    "couldn't put the shell in its own process group",
                    io::Error::last_os_error(),
                ));
            }

            if libc::tcsetpgrp(libc::STDIN_FILENO, shell_pgid) < 0 {
                return Err(PshError::terminal(
                    "couldn't grab control of the terminal",
                    io::Error::last_os_error(),
                ));
            }

            let cooked_mode = nix::sys::termios::tcgetattr(std::io::stdin())
                .map_err(|e| PshError::terminal("tcgetattr on shell startup", io::Error::from(e)))?;

            Ok(TerminalController {
                interactive: true,
                shell_pgid,
                cooked_mode: Some(cooked_mode),
            })
        }
    }

    pub fn shell_pgid(&self) -> libc::pid_t {
        self.shell_pgid
    }

    /// Switch stdin into raw mode (`VMIN=1, VTIME=0`, echo/canon/signal/extended
    /// processing disabled) for the line editor.
    pub fn enable_raw(&self) -> PshResult<()> {
        let Some(cooked) = &self.cooked_mode else {
            return Ok(());
        };
        let mut raw = cooked.clone();
        use nix::sys::termios::{InputFlags, LocalFlags, SetArg};
        raw.local_flags.remove(
            LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::IEXTEN,
        );
        raw.input_flags.remove(InputFlags::IXON);
        raw.control_chars[nix::libc::VMIN as usize] = 1;
        raw.control_chars[nix::libc::VTIME as usize] = 0;
        nix::sys::termios::tcsetattr(std::io::stdin(), SetArg::TCSANOW, &raw)
            .map_err(|e| PshError::terminal("enabling raw mode", io::Error::from(e)))
    }

    pub fn disable_raw(&self) -> PshResult<()> {
        let Some(cooked) = &self.cooked_mode else {
            return Ok(());
        };
        nix::sys::termios::tcsetattr(std::io::stdin(), nix::sys::termios::SetArg::TCSANOW, cooked)
            .map_err(|e| PshError::terminal("restoring cooked mode", io::Error::from(e)))
    }

    /// Hand the controlling terminal to a job's process group, ignoring
    /// `SIGTTOU` around the call (grounded in
    /// `job_control.rs::set_terminal_foreground`).
    pub fn hand_to_job(&self, pgid: libc::pid_t) -> PshResult<()> {
        if !self.interactive {
            return Ok(());
        }
        unsafe {
            let previous = libc::signal(libc::SIGTTOU, libc::SIG_IGN);
            let rc = libc::tcsetpgrp(libc::STDIN_FILENO, pgid);
            libc::signal(libc::SIGTTOU, previous);
            if rc < 0 {
                return Err(PshError::terminal(
                    format!("handing terminal to job group {pgid}"),
                    io::Error::last_os_error(),
                ));
            }
        }
        Ok(())
    }

    /// Reclaim the terminal after a foreground job stops or exits: save the
    /// job's `Termios` (so a later `fg`/`bg` continuation restores exactly
    /// what the job left behind), reclaim the terminal for the shell, and
    /// restore the shell's own mode.
    pub fn reclaim(&self, job: &mut crate::ast::Job) -> PshResult<()> {
        if !self.interactive {
            return Ok(());
        }
        let saved = nix::sys::termios::tcgetattr(std::io::stdin())
            .map_err(|e| PshError::terminal("tcgetattr after job exit", io::Error::from(e)))?;
        job.saved_termios = Some(saved);

        unsafe {
            if libc::tcsetpgrp(libc::STDIN_FILENO, self.shell_pgid) < 0 {
                return Err(PshError::terminal(
                    "reclaiming terminal for the shell",
                    io::Error::last_os_error(),
                ));
            }
        }

        if let Some(cooked) = &self.cooked_mode {
            nix::sys::termios::tcsetattr(
                std::io::stdin(),
                nix::sys::termios::SetArg::TCSADRAIN,
                cooked,
            )
            .map_err(|e| PshError::terminal("restoring shell terminal mode", io::Error::from(e)))?;
        }
        Ok(())
    }

    /// Apply a job's saved `Termios` before continuing it in the foreground
    /// (`fg` on a stopped job), matching `original_source/main.c`'s use of
    /// `j->tmodes` in `put_job_in_foreground`.
    pub fn restore_job_mode(&self, job: &crate::ast::Job) -> PshResult<()> {
        if !self.interactive {
            return Ok(());
        }
        if let Some(tmodes) = &job.saved_termios {
            nix::sys::termios::tcsetattr(
                std::io::stdin(),
                nix::sys::termios::SetArg::TCSADRAIN,
                tmodes,
            )
            .map_err(|e| PshError::terminal("restoring job terminal mode", io::Error::from(e)))?;
        }
        Ok(())
    }
}

#[cfg(not(unix))]
pub struct TerminalController {
    pub interactive: bool,
}

#[cfg(not(unix))]
impl TerminalController {
    pub fn init() -> PshResult<Self> {
        Ok(TerminalController { interactive: false })
    }

    pub fn enable_raw(&self) -> PshResult<()> {
        Ok(())
    }

    pub fn disable_raw(&self) -> PshResult<()> {
        Ok(())
    }
}
