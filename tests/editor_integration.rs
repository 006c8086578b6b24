/// Integration tests for the Line Editor & History (spec.md §4.3/§6).
///
/// Each test runs in its own isolated temp directory (`.psh_history` is
/// relative to the shell's current working directory, not `$HOME`), so
/// concurrent test runs cannot race on a shared history file.
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

fn run_shell_in(lines: &[&str], cwd: &Path) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_psh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(cwd)
        .env("PSH_NON_INTERACTIVE", "1")
        .spawn()
        .expect("spawn psh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

struct TempCwd(PathBuf);

impl TempCwd {
    fn new(label: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("psh_test_cwd_{label}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp cwd");
        TempCwd(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }

    fn history_path(&self) -> PathBuf {
        self.0.join(".psh_history")
    }
}

impl Drop for TempCwd {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[test]
fn history_file_written_after_command() {
    let cwd = TempCwd::new("written");
    let marker = "echo HISTORY_WRITTEN_MARKER";

    let output = run_shell_in(&[marker], cwd.path());
    assert!(output.status.success(), "shell did not exit cleanly");

    let path = cwd.history_path();
    assert!(path.exists(), ".psh_history was not created");

    let contents = std::fs::read_to_string(&path).expect("read .psh_history");
    assert!(
        contents.contains(marker),
        "expected marker in history; contents:\n{contents}"
    );
}

#[test]
fn history_persists_across_sessions() {
    let cwd = TempCwd::new("persists");
    let marker = "echo HISTORY_PERSISTENT_MARKER";

    let _ = run_shell_in(&[marker], cwd.path());

    let contents = std::fs::read_to_string(cwd.history_path())
        .expect("read .psh_history after second session");
    assert!(
        contents.contains(marker),
        "history should persist across sessions; contents:\n{contents}"
    );
}

#[test]
fn empty_commands_not_written_to_history() {
    let cwd = TempCwd::new("empty");
    let _ = run_shell_in(&["echo sentinel", "", "   "], cwd.path());

    let contents = std::fs::read_to_string(cwd.history_path()).expect("read .psh_history");
    assert!(
        !contents.lines().any(|l| l.trim().is_empty()),
        "blank line found in history file:\n{contents}"
    );
}

#[test]
fn history_capped_at_128_entries() {
    let cwd = TempCwd::new("capped");
    let lines: Vec<String> = (0..150).map(|i| format!("echo cmd-{i}")).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let _ = run_shell_in(&refs, cwd.path());

    let contents = std::fs::read_to_string(cwd.history_path()).expect("read .psh_history");
    assert_eq!(contents.lines().count(), 128);
    assert!(contents.contains("cmd-149"));
    assert!(!contents.contains("cmd-0\n"));
}
