//! Tokenizer — splits a raw input line into whitespace-delimited tokens,
//! honoring double-quoting (spec.md §4.4). Grounded in the teacher's
//! `parser::tokenize` state machine, trimmed to double quotes only (the
//! original `original_source/main.c::tokenize` has no backslash-escape
//! support either) with quote characters retained on the token text so the
//! Plan Builder can strip them later, per spec.md.

use crate::ast::TokenCategory;

/// One token as produced by the tokenizer, before categorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    /// Token text with any surrounding/embedded `"` characters retained.
    pub text: String,
    /// `true` if this token contains any quoted segment.
    pub quoted: bool,
    /// `true` if the line ended while still inside an open quote.
    pub unterminated: bool,
}

/// Split `line` into tokens on unquoted whitespace.
pub fn tokenize(line: &str) -> Vec<RawToken> {
    let chars: Vec<char> = line.chars().collect();
    let n = chars.len();

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut building = false;

    let mut i = 0;
    while i < n {
        let c = chars[i];
        if c == '"' {
            in_quotes = !in_quotes;
            quoted = true;
            current.push('"');
            building = true;
        } else if c.is_whitespace() && !in_quotes {
            if building {
                tokens.push(RawToken {
                    text: std::mem::take(&mut current),
                    quoted,
                    unterminated: false,
                });
                quoted = false;
                building = false;
            }
        } else if c == '\\' && !in_quotes && !building && trailing_backslash(&chars, i) {
            tokens.push(RawToken {
                text: "\\".to_string(),
                quoted: false,
                unterminated: false,
            });
        } else {
            current.push(c);
            building = true;
        }
        i += 1;
    }

    if building {
        tokens.push(RawToken {
            text: current,
            quoted,
            unterminated: in_quotes,
        });
    }

    tokens
}

/// A `\` only starts a line continuation when every character after it on
/// the line is whitespace — otherwise it is just a literal backslash inside
/// a word (e.g. a Windows-style path argument).
fn trailing_backslash(chars: &[char], i: usize) -> bool {
    chars[i + 1..].iter().all(|c| c.is_whitespace())
}

const REDIRECTION_TOKENS: &[&str] = &["<", ">", ">>", "2>"];

/// Whether a token coming right after `tokens` would start a new clause —
/// i.e. be a `Cmd`, not an `Arg` — per the same `;`/`&&`/`||`/`|`/`&`/`!`
/// clause-boundary rules [`categorize`] tracks as `expect_clause_start`.
/// Used by the Line Editor's Tab completion to classify the word under the
/// cursor without re-categorizing the whole line.
pub fn expects_clause_start(tokens: &[RawToken]) -> bool {
    let mut expect_clause_start = true;
    for tok in tokens {
        if tok.unterminated || tok.quoted {
            expect_clause_start = false;
        } else if tok.text == ";" || tok.text == "&&" || tok.text == "||" {
            expect_clause_start = true;
        } else if tok.text == "|" || tok.text == "&" {
            expect_clause_start = true;
        } else if tok.text == "!" && expect_clause_start {
            // stays true: the next token is still a clause start
        } else {
            expect_clause_start = false;
        }
    }
    expect_clause_start
}

/// Label each token with its [`TokenCategory`], tracking clause boundaries
/// so the first token of the line (or of the clause after `|`, an operator,
/// or `&`) is recognized as `Cmd` rather than `Arg`. Grounded in
/// `original_source/main.c::categorize_tokens`.
pub fn categorize(tokens: &[RawToken]) -> Vec<(TokenCategory, RawToken)> {
    let mut result = Vec::with_capacity(tokens.len());
    let mut expect_clause_start = true;
    let mut expect_redirection_path = false;

    for (idx, tok) in tokens.iter().enumerate() {
        let is_last = idx == tokens.len() - 1;

        let category = if tok.text == "\\" && is_last {
            TokenCategory::LineContinuation
        } else if expect_redirection_path {
            expect_redirection_path = false;
            if tok.quoted {
                TokenCategory::QuoteEnd
            } else {
                TokenCategory::Arg
            }
        } else if tok.unterminated {
            TokenCategory::Quote
        } else if tok.text == ";" || tok.text == "&&" || tok.text == "||" {
            expect_clause_start = true;
            TokenCategory::Oper
        } else if tok.text == "|" {
            expect_clause_start = true;
            TokenCategory::Pipe
        } else if tok.text == "&" {
            expect_clause_start = true;
            TokenCategory::BgOper
        } else if tok.text == "!" && expect_clause_start {
            TokenCategory::Inversion
        } else if REDIRECTION_TOKENS.contains(&tok.text.as_str()) {
            expect_redirection_path = true;
            TokenCategory::Redirection
        } else if tok.quoted {
            expect_clause_start = false;
            TokenCategory::QuoteEnd
        } else if expect_clause_start {
            expect_clause_start = false;
            TokenCategory::Cmd
        } else {
            TokenCategory::Arg
        };

        result.push((category, tok.clone()));
    }

    result.push((
        TokenCategory::End,
        RawToken {
            text: String::new(),
            quoted: false,
            unterminated: false,
        },
    ));

    result
}
