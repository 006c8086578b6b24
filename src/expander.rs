//! Expander — tilde, variable, brace, and glob expansion over tokenizer
//! output (spec.md §4.6). Teacher's tilde/variable/glob pipeline, extended
//! with brace expansion grounded in
//! `original_source/env.c::_find_curly_brace_expansion`/`_handle_curly_brace_expansion`,
//! and `$$`/`$!`/`$0` special variables.

use crate::env::EnvStore;
use crate::tokenizer::RawToken;

/// Ambient values the Expander needs beyond the raw token text, grounded in
/// `original_source/env.c`'s `shell_pgid`/`last_status` globals.
pub struct ExpansionContext<'a> {
    pub env: &'a EnvStore,
    pub last_status: i32,
    pub last_bg_pid: Option<i32>,
}

/// Expand a whole categorized command (its `Cmd`/`Arg`/`Quote`/`QuoteEnd`
/// tokens, in order) into final argv strings.
pub fn expand_tokens(tokens: &[RawToken], ctx: &ExpansionContext) -> Vec<String> {
    let mut result = Vec::new();
    for tok in tokens {
        result.extend(expand_token(tok, ctx));
    }
    result
}

/// Expand one token (possibly containing a quoted region) into one or more
/// final strings — more than one only when brace or glob expansion applies.
fn expand_token(tok: &RawToken, ctx: &ExpansionContext) -> Vec<String> {
    let (combined, is_globbable) = expand_quotes_and_variables(&tok.text, ctx);
    let braced = expand_braces(&combined);
    braced
        .into_iter()
        .flat_map(|piece| {
            if is_globbable && contains_glob_chars(&piece) {
                expand_globs(&piece)
            } else {
                vec![piece]
            }
        })
        .collect()
}

/// Walk `text`, toggling quote state on `"`, applying tilde expansion only
/// to unquoted runs and variable expansion to both. Returns the combined
/// string plus whether any unquoted run contained glob metacharacters.
fn expand_quotes_and_variables(text: &str, ctx: &ExpansionContext) -> (String, bool) {
    let mut combined = String::new();
    let mut is_globbable = false;
    let mut in_quotes = false;
    let mut run = String::new();

    let flush_unquoted = |run: &mut String, combined: &mut String, is_globbable: &mut bool| {
        if run.is_empty() {
            return;
        }
        let expanded = expand_tilde(run);
        let expanded = expand_variables(&expanded, ctx);
        if contains_glob_chars(&expanded) {
            *is_globbable = true;
        }
        combined.push_str(&expanded);
        run.clear();
    };

    for c in text.chars() {
        if c == '"' {
            if in_quotes {
                // closing a quoted run: variable-expand only, no tilde/glob.
                let expanded = expand_variables(&run, ctx);
                combined.push_str(&expanded);
                run.clear();
            } else {
                flush_unquoted(&mut run, &mut combined, &mut is_globbable);
            }
            in_quotes = !in_quotes;
        } else {
            run.push(c);
        }
    }

    if in_quotes {
        // Unterminated quote (should not reach the expander in practice,
        // since the validator requests continuation first) — treat as
        // an unquoted run rather than dropping the content.
        flush_unquoted(&mut run, &mut combined, &mut is_globbable);
    } else {
        flush_unquoted(&mut run, &mut combined, &mut is_globbable);
    }

    (combined, is_globbable)
}

// ── Tilde Expansion ──

pub(crate) fn expand_tilde(token: &str) -> String {
    if !token.starts_with('~') {
        return token.to_string();
    }

    let home = get_home_dir();

    if token == "~" {
        return home;
    }

    if token.starts_with("~/") || token.starts_with("~\\") {
        return format!("{home}{}", &token[1..]);
    }

    // ~username not supported — returned as-is, matching the original C
    // `_handle_wave`, which only ever strips a leading `~`.
    token.to_string()
}

fn get_home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| "~".to_string())
}

/// Characters that end a variable name mid-token, matching
/// `original_source/env.c`'s `arr[]`/`is_special_symbol`. `${...}` is
/// reserved (not expanded) because `{` is itself in this set: the `$`
/// branch below never gets to treat it as a name start.
const NAME_BOUNDARY: &[char] = &[
    '$', '{', '[', '(', '\\', '/', '*', '?', '&', '|', '!', '~', '<', '>', '%', ':', ';', '"', '\'',
];

/// `arr[]` assumes it is scanning a single already-whitespace-split token
/// (the original C tokenizer splits on whitespace before expansion runs),
/// so it never needs whitespace in its boundary set. Our quoted runs can
/// carry embedded spaces (`"$VAR *.rs"`), so whitespace has to end a name
/// here too, or scanning would swallow everything up to the next symbol.
fn is_name_boundary(c: char) -> bool {
    NAME_BOUNDARY.contains(&c) || c.is_whitespace()
}

fn expand_variables(input: &str, ctx: &ExpansionContext) -> String {
    let mut result = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        match chars.peek() {
            None => result.push('$'),
            Some(&'?') => {
                chars.next();
                result.push_str(&ctx.last_status.to_string());
            }
            Some(&'$') => {
                chars.next();
                result.push_str(&std::process::id().to_string());
            }
            Some(&'!') => {
                chars.next();
                match ctx.last_bg_pid {
                    Some(pid) => result.push_str(&pid.to_string()),
                    None => result.push('0'),
                }
            }
            Some(&'0') => {
                chars.next();
                result.push_str("psh");
            }
            Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                name.push(chars.next().unwrap());
                while let Some(&c) = chars.peek() {
                    if is_name_boundary(c) {
                        break;
                    }
                    name.push(chars.next().unwrap());
                }
                result.push_str(&ctx.env.get(&name).unwrap_or_default());
            }
            Some(_) => result.push('$'),
        }
    }

    result
}

// ── Brace Expansion ──

/// Expand the first `{a,b,c}` or `{M..N}` group in `token`, repeating on
/// each result until no group remains. Grounded in
/// `original_source/env.c`'s `_find_curly_brace_expansion` (detection) and
/// `_handle_curly_brace_expansion` (substitution).
fn expand_braces(token: &str) -> Vec<String> {
    match find_brace_group(token) {
        None => vec![token.to_string()],
        Some((prefix, content, suffix)) => {
            let parts = brace_group_parts(&content);
            if parts.is_empty() {
                return vec![token.to_string()];
            }
            parts
                .into_iter()
                .flat_map(|part| expand_braces(&format!("{prefix}{part}{suffix}")))
                .collect()
        }
    }
}

/// Locate the first `{...}` group that is either comma-separated
/// alphanumerics or a `M..N` numeric range; anything else is left literal.
fn find_brace_group(token: &str) -> Option<(String, String, String)> {
    let open = token.find('{')?;
    let close = token[open..].find('}').map(|i| i + open)?;
    if close <= open + 1 {
        return None;
    }
    let content = &token[open + 1..close];
    if !is_valid_brace_content(content) {
        return None;
    }
    Some((
        token[..open].to_string(),
        content.to_string(),
        token[close + 1..].to_string(),
    ))
}

fn is_valid_brace_content(content: &str) -> bool {
    let is_comma_separated =
        content.contains(',') && content.chars().all(|c| c.is_alphanumeric() || c == ',');
    let is_numeric_range = match content.split_once("..") {
        Some((a, b)) => {
            !a.is_empty()
                && !b.is_empty()
                && a.chars().all(|c| c.is_ascii_digit())
                && b.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    };
    is_comma_separated || is_numeric_range
}

fn brace_group_parts(content: &str) -> Vec<String> {
    if content.contains(',') {
        content.split(',').map(str::to_string).collect()
    } else if let Some((a, b)) = content.split_once("..") {
        let start: i64 = a.parse().unwrap_or(0);
        let end: i64 = b.parse().unwrap_or(0);
        let step: i64 = if start <= end { 1 } else { -1 };
        let mut out = Vec::new();
        let mut i = start;
        loop {
            out.push(i.to_string());
            if i == end {
                break;
            }
            i += step;
        }
        out
    } else {
        Vec::new()
    }
}

// ── Glob Expansion ──

fn contains_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

fn expand_globs(pattern: &str) -> Vec<String> {
    if !contains_glob_chars(pattern) {
        return vec![pattern.to_string()];
    }

    match glob::glob(pattern) {
        Ok(paths) => {
            let mut matches: Vec<String> = paths
                .filter_map(|entry| entry.ok())
                .map(|path| path.to_string_lossy().into_owned())
                .collect();

            if matches.is_empty() {
                vec![pattern.to_string()]
            } else {
                matches.sort();
                matches
            }
        }
        Err(_) => vec![pattern.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(env: &EnvStore) -> ExpansionContext<'_> {
        ExpansionContext {
            env,
            last_status: 0,
            last_bg_pid: None,
        }
    }

    #[test]
    fn tilde_alone() {
        let expanded = expand_tilde("~");
        assert!(!expanded.is_empty());
        assert_ne!(expanded, "~");
    }

    #[test]
    fn tilde_with_path() {
        let expanded = expand_tilde("~/projects");
        assert!(expanded.ends_with("/projects") || expanded.ends_with("\\projects"));
        assert!(!expanded.starts_with('~'));
    }

    #[test]
    fn tilde_in_middle_not_expanded() {
        assert_eq!(expand_tilde("foo~bar"), "foo~bar");
    }

    #[test]
    fn variable_simple() {
        let mut env = EnvStore::new();
        env.set("PSH_TEST_VAR", "hello");
        let c = ctx(&env);
        assert_eq!(expand_variables("$PSH_TEST_VAR", &c), "hello");
    }

    #[test]
    fn variable_braced_is_reserved_not_expanded() {
        let mut env = EnvStore::new();
        env.set("PSH_TEST_VAR2", "world");
        let c = ctx(&env);
        assert_eq!(
            expand_variables("${PSH_TEST_VAR2}!", &c),
            "${PSH_TEST_VAR2}!"
        );
    }

    #[test]
    fn variable_name_runs_past_hyphen() {
        let mut env = EnvStore::new();
        env.set("VAR-NAME", "hit");
        let c = ctx(&env);
        assert_eq!(expand_variables("$VAR-NAME", &c), "hit");
    }

    #[test]
    fn variable_exit_code() {
        let env = EnvStore::new();
        let mut c = ctx(&env);
        c.last_status = 42;
        assert_eq!(expand_variables("$?", &c), "42");
    }

    #[test]
    fn variable_pid() {
        let env = EnvStore::new();
        let c = ctx(&env);
        let result = expand_variables("$$", &c);
        let pid: u32 = result.parse().expect("$$ should be a number");
        assert!(pid > 0);
    }

    #[test]
    fn variable_last_bg_pid() {
        let env = EnvStore::new();
        let mut c = ctx(&env);
        c.last_bg_pid = Some(4242);
        assert_eq!(expand_variables("$!", &c), "4242");
    }

    #[test]
    fn variable_last_bg_pid_with_no_job_is_zero() {
        let env = EnvStore::new();
        let c = ctx(&env);
        assert_eq!(expand_variables("$!", &c), "0");
    }

    #[test]
    fn variable_shell_name() {
        let env = EnvStore::new();
        let c = ctx(&env);
        assert_eq!(expand_variables("$0", &c), "psh");
    }

    #[test]
    fn variable_undefined_is_empty() {
        let env = EnvStore::new();
        let c = ctx(&env);
        assert_eq!(expand_variables("$DEFINITELY_NOT_SET_XYZ123", &c), "");
    }

    #[test]
    fn trailing_dollar_literal() {
        let env = EnvStore::new();
        let c = ctx(&env);
        assert_eq!(expand_variables("price$", &c), "price$");
    }

    #[test]
    fn quoted_text_expands_vars_but_not_tilde_or_glob() {
        let mut env = EnvStore::new();
        env.set("PSH_DQ_TEST", "expanded");
        let c = ctx(&env);
        let tok = RawToken {
            text: "\"$PSH_DQ_TEST *.rs\"".to_string(),
            quoted: true,
            unterminated: false,
        };
        assert_eq!(expand_token(&tok, &c), vec!["expanded *.rs"]);
    }

    #[test]
    fn brace_expansion_comma_list() {
        let env = EnvStore::new();
        let c = ctx(&env);
        let tok = RawToken {
            text: "file{a,b,c}.txt".to_string(),
            quoted: false,
            unterminated: false,
        };
        assert_eq!(
            expand_token(&tok, &c),
            vec!["filea.txt", "fileb.txt", "filec.txt"]
        );
    }

    #[test]
    fn brace_expansion_numeric_range() {
        let env = EnvStore::new();
        let c = ctx(&env);
        let tok = RawToken {
            text: "img{1..3}.png".to_string(),
            quoted: false,
            unterminated: false,
        };
        assert_eq!(
            expand_token(&tok, &c),
            vec!["img1.png", "img2.png", "img3.png"]
        );
    }

    #[test]
    fn brace_expansion_descending_range() {
        let env = EnvStore::new();
        let c = ctx(&env);
        let tok = RawToken {
            text: "{3..1}".to_string(),
            quoted: false,
            unterminated: false,
        };
        assert_eq!(expand_token(&tok, &c), vec!["3", "2", "1"]);
    }

    #[test]
    fn no_glob_matches_keeps_literal() {
        let result = expand_globs("*.definitely_not_a_real_extension_xyz");
        assert_eq!(result, vec!["*.definitely_not_a_real_extension_xyz"]);
    }

    #[test]
    fn non_brace_curlies_left_alone() {
        let env = EnvStore::new();
        let c = ctx(&env);
        let tok = RawToken {
            text: "{not valid}".to_string(),
            quoted: false,
            unterminated: false,
        };
        assert_eq!(expand_token(&tok, &c), vec!["{not valid}"]);
    }
}
