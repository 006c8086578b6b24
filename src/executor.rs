//! Job Control Engine — forks, pipes, and waits for jobs, and drives the
//! foreground/background transitions of spec.md §4.8/§5. Generalizes the
//! teacher's "one pipeline, fire and forget" `execute_pipeline` into the
//! full job-table state machine, grounded line-for-line in
//! `original_source/main.c`'s `launch_process`/`launch_job`/
//! `put_job_in_foreground`/`put_job_in_background`/`mark_process_status`/
//! `update_status`/`wait_for_job`/`continue_job` (1164–1587).

use std::io;

use crate::ast::{Job, Process};
use crate::errors::{PshError, PshResult};
use crate::jobs::JobTable;
use crate::signals;
use crate::terminal::TerminalController;

/// What the caller should do after a plan element has run.
pub enum Outcome {
    Continue(i32),
    Exit(i32),
}

/// Fork every process in `job`, wiring up pipes and redirects, and either
/// wait for it (foreground) or hand it to the job table (background).
/// Grounded in `launch_job`.
pub fn launch_job(
    job: &mut Job,
    term: &TerminalController,
    table: &mut JobTable,
) -> PshResult<()> {
    let n = job.processes.len();
    let mut prev_read: Option<os_pipe::PipeReader> = None;

    for i in 0..n {
        let is_last = i + 1 == n;
        let (write_end, next_read) = if is_last {
            (None, None)
        } else {
            let (reader, writer) = os_pipe::pipe().map_err(|e| PshError::io("creating pipe", e))?;
            (Some(writer), Some(reader))
        };

        let stdin_handle = prev_read.take();
        let stdout_handle = write_end;

        let pid = spawn_process(&job.processes[i], job.pgid, stdin_handle, stdout_handle)?;
        job.processes[i].pid = Some(pid);
        if job.pgid.is_none() {
            job.pgid = Some(pid);
        }
        if term.interactive {
            let _ = crate::job_control::set_process_group(pid, job.pgid.unwrap());
        }

        prev_read = next_read;
    }

    if term.interactive {
        if let Some(pgid) = job.pgid {
            if job.foreground {
                term.hand_to_job(pgid)?;
            }
        }
    }

    if !term.interactive {
        wait_for_job(job)?;
    } else if job.foreground {
        foreground_job(job, term, table, false)?;
        if job.is_stopped() {
            println!("[{}]  Stopped  {}", job.id, job.command_text);
            job.notified = true;
        }
    } else {
        background_job(job, false);
        println!("[{}] {}", job.id, job.pgid.unwrap_or(0));
    }

    Ok(())
}

/// Spawn one process of a pipeline, wiring stdio to the pipe ends or to the
/// process's own redirects. Grounded in `launch_process`.
fn spawn_process(
    process: &Process,
    pgid: Option<libc::pid_t>,
    stdin_pipe: Option<os_pipe::PipeReader>,
    stdout_pipe: Option<os_pipe::PipeWriter>,
) -> PshResult<libc::pid_t> {
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};

    let mut cmd = Command::new(process.program());
    cmd.args(&process.argv[1..]);

    match (&process.redirects.stdin_path, stdin_pipe) {
        (Some(path), _) => {
            let file = std::fs::File::open(path)
                .map_err(|e| PshError::io(format!("{}", path.display()), e))?;
            cmd.stdin(Stdio::from(file));
        }
        (None, Some(reader)) => cmd.stdin(Stdio::from(reader)),
        (None, None) => {}
    }

    match (&process.redirects.stdout_path, stdout_pipe) {
        (Some(path), _) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .append(process.redirects.append)
                .truncate(!process.redirects.append)
                .open(path)
                .map_err(|e| PshError::io(format!("{}", path.display()), e))?;
            cmd.stdout(Stdio::from(file));
        }
        (None, Some(writer)) => cmd.stdout(Stdio::from(writer)),
        (None, None) => {}
    }

    if let Some(path) = &process.redirects.stderr_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| PshError::io(format!("{}", path.display()), e))?;
        cmd.stderr(Stdio::from(file));
    }

    let target_pgid = pgid.unwrap_or(0);
    unsafe {
        cmd.pre_exec(move || {
            let pid = libc::getpid();
            let group = if target_pgid == 0 { pid } else { target_pgid };
            if libc::setpgid(pid, group) < 0 {
                return Err(io::Error::last_os_error());
            }
            signals::reset_child_signals()?;
            Ok(())
        });
    }

    let child = cmd
        .spawn()
        .map_err(|e| spawn_error(process.program(), e))?;
    Ok(child.id() as libc::pid_t)
}

fn spawn_error(program: &str, e: io::Error) -> PshError {
    if e.kind() == io::ErrorKind::NotFound {
        PshError::Exec(format!("command not found: {program}"))
    } else {
        PshError::Exec(format!("{program}: {e}"))
    }
}

/// Put `job` in the foreground: claim the terminal, optionally send
/// `SIGCONT`, block until it exits or stops, then reclaim the terminal.
/// Grounded in `put_job_in_foreground`.
pub fn foreground_job(
    job: &mut Job,
    term: &TerminalController,
    table: &mut JobTable,
    send_cont: bool,
) -> PshResult<()> {
    job.foreground = true;
    job.background = false;

    if let Some(pgid) = job.pgid {
        term.hand_to_job(pgid)?;
        term.disable_raw()?;
        if send_cont {
            term.restore_job_mode(job)?;
            unsafe {
                libc::kill(-pgid, libc::SIGCONT);
            }
        }
    }

    wait_for_job(job)?;

    term.reclaim(job)?;
    Ok(())
}

/// Put `job` in the background, optionally sending it `SIGCONT` first.
/// Grounded in `put_job_in_background`.
pub fn background_job(job: &mut Job, send_cont: bool) {
    job.foreground = false;
    job.background = true;
    if send_cont {
        if let Some(pgid) = job.pgid {
            unsafe {
                libc::kill(-pgid, libc::SIGCONT);
            }
        }
    }
}

/// Block until every process in `job` has either completed or stopped.
/// Grounded in `wait_for_job`.
pub fn wait_for_job(job: &mut Job) -> PshResult<()> {
    loop {
        if job.is_completed() || job.is_stopped() {
            return Ok(());
        }
        let (pid, raw_status) = wait_any_child(job.pgid)?;
        if pid == 0 {
            // No child left to report (ECHILD) — nothing more to wait for.
            return Ok(());
        }
        // waitpid is scoped to this job's own process group, so the pid it
        // reports always belongs to one of this job's processes.
        if let Some(p) = job.processes.iter_mut().find(|p| p.pid == Some(pid)) {
            mark_process_status(p, raw_status);
        }
    }
}

/// `waitpid(-pgid, WUNTRACED)`, restarting on `EINTR`. Returns `(0, _)` when
/// no child is ready to report (`ECHILD`).
fn wait_any_child(pgid: Option<libc::pid_t>) -> PshResult<(libc::pid_t, libc::c_int)> {
    let target = -pgid.unwrap_or(1);
    loop {
        let mut status: libc::c_int = 0;
        let pid = unsafe { libc::waitpid(target, &mut status, libc::WUNTRACED) };
        if pid > 0 {
            return Ok((pid, status));
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::ECHILD => return Ok((0, 0)),
            _ => return Err(PshError::signal("waitpid", err)),
        }
    }
}

/// Record a wait-status update against one process. Grounded in
/// `mark_process_status`.
fn mark_process_status(process: &mut Process, raw_status: libc::c_int) {
    process.raw_status = raw_status;
    if unsafe { libc::WIFSTOPPED(raw_status) } {
        process.stopped = true;
        return;
    }
    process.completed = true;
    if unsafe { libc::WIFEXITED(raw_status) } {
        process.exit_status = Some(unsafe { libc::WEXITSTATUS(raw_status) });
    } else if unsafe { libc::WIFSIGNALED(raw_status) } {
        let signal = unsafe { libc::WTERMSIG(raw_status) };
        eprintln!(
            "{}: Terminated by signal {}",
            process.pid.unwrap_or(0),
            signal
        );
        process.exit_status = Some(128 + signal);
    }
}

/// Non-blocking drain of all reportable children, updating whichever
/// tracked job owns each pid. Grounded in `update_status`.
pub fn update_status(table: &mut JobTable) {
    loop {
        let mut status: libc::c_int = 0;
        let pid = unsafe { libc::waitpid(-1, &mut status, libc::WUNTRACED | libc::WNOHANG) };
        if pid <= 0 {
            return;
        }
        if let Some(job) = table.find_by_pid_mut(pid) {
            if let Some(p) = job.processes.iter_mut().find(|p| p.pid == Some(pid)) {
                mark_process_status(p, status);
            }
        }
    }
}

/// Sweep the job table: report and drop completed jobs, report
/// newly-stopped jobs once. Grounded in `do_job_notification`.
pub fn notification_sweep(table: &mut JobTable) {
    update_status(table);

    for job in table.iter_mut() {
        if job.is_stopped() && !job.notified {
            println!("[{}]  Stopped  {}", job.id, job.command_text);
            job.notified = true;
        }
    }

    for job in table.remove_completed() {
        let status = job.exit_status();
        println!("[{}]  Done({status})  {}", job.id, job.command_text);
    }
}

/// Resume a stopped or backgrounded job. Grounded in `continue_job`.
pub fn continue_job(
    job: &mut Job,
    foreground: bool,
    send_cont: bool,
    term: &TerminalController,
    table: &mut JobTable,
) -> PshResult<()> {
    for p in &mut job.processes {
        p.stopped = false;
    }
    job.notified = false;

    if foreground {
        foreground_job(job, term, table, send_cont)
    } else {
        background_job(job, send_cont);
        Ok(())
    }
}
