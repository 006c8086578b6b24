//! Config file and prompt escapes (spec.md §6). Grounded in
//! `original_source/env.c`'s `read_config_file`/`_get_current_dir`/
//! `_get_current_git_branch`/`_parse_ps_var`/`configure_prompt`, with one
//! recorded deviation: the original `exit(1)`s when `.pshrc` is missing,
//! but a missing dotfile is not fatal here (SPEC_FULL.md §6, DESIGN.md
//! Open Question).

use std::path::Path;
use std::process::Command;

use crate::errors::{PshError, PshResult};

pub const CONFIG_FILE: &str = ".pshrc";
const DEFAULT_PS1: &str = "$ ";
const DEFAULT_PS2: &str = "> ";

/// The `NAME=VALUE` pairs read from a config file, in file order.
#[derive(Debug, Default)]
pub struct Config {
    pub vars: Vec<(String, String)>,
}

/// Parse `.pshrc`-style lines: `#`-prefixed comments are skipped, and a
/// surrounding pair of double quotes around VALUE is stripped. Missing
/// files yield an empty [`Config`] rather than an error.
pub fn load(path: &Path) -> PshResult<Config> {
    let mut config = Config::default();
    let contents = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
        Err(e) => return Err(PshError::io(format!("{}", path.display()), e)),
    };

    for line in contents.lines() {
        if line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        config.vars.push((name.trim().to_string(), value.to_string()));
    }
    Ok(config)
}

/// Expand `PS1`/`PS2`-style prompt escapes: `-b` → current git branch
/// (empty on failure), `-p` → basename of the current directory, any other
/// `-X` silently drops both characters. Grounded in `_parse_ps_var`.
pub fn expand_prompt_escapes(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '-' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => out.push_str(&current_git_branch()),
            Some('p') => out.push_str(&current_dir_basename()),
            Some(_) | None => {}
        }
    }
    out
}

/// Resolve a configured `PS1`/`PS2` value, falling back to the spec's
/// defaults when unset. Grounded in `configure_prompt`.
pub fn resolve_prompt(configured: Option<&str>, is_ps2: bool) -> String {
    let template = configured.unwrap_or(if is_ps2 { DEFAULT_PS2 } else { DEFAULT_PS1 });
    expand_prompt_escapes(template)
}

fn current_dir_basename() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

fn current_git_branch() -> String {
    Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_default()
}
