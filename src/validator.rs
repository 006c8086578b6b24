//! Categorizer & Validator — table-driven grammar check over a
//! [`TokenCategory`] sequence (spec.md §4.5), grounded in
//! `original_source/main.c::check_tokens`.

use crate::ast::TokenCategory;
use crate::tokenizer::RawToken;

/// Outcome of validating one categorized line.
#[derive(Debug, PartialEq, Eq)]
pub enum Validation {
    Ok,
    NeedsContinuation,
    SyntaxError(String),
}

/// `true` for any category that may legally open a new clause, or that
/// signals the clause is still being typed (continuation).
fn opens_clause_or_continues(cat: TokenCategory) -> Option<bool> {
    use TokenCategory::*;
    match cat {
        Cmd | Inversion => Some(false),
        LineContinuation | End | Quote => Some(true),
        _ => None,
    }
}

/// Validate a categorized token sequence (as produced by
/// [`crate::tokenizer::categorize`], which always appends a trailing `End`).
pub fn validate(categorized: &[(TokenCategory, RawToken)]) -> Validation {
    use TokenCategory::*;

    let mut expect_clause_start = true;
    let mut needs_continuation = false;

    for (i, (cat, tok)) in categorized.iter().enumerate() {
        match cat {
            Quote => {
                needs_continuation = true;
            }
            Cmd => {
                if !expect_clause_start {
                    return Validation::SyntaxError(format!(
                        "syntax error near unexpected token `{}'",
                        tok.text
                    ));
                }
                expect_clause_start = false;
            }
            Inversion => {
                if !expect_clause_start {
                    return Validation::SyntaxError(
                        "syntax error near unexpected token `!'".to_string(),
                    );
                }
                // expect_clause_start stays true: the next token must be Cmd.
            }
            Arg | QuoteEnd => {
                if expect_clause_start {
                    return Validation::SyntaxError(format!(
                        "syntax error near unexpected token `{}'",
                        tok.text
                    ));
                }
            }
            Redirection => {
                if expect_clause_start {
                    return Validation::SyntaxError(
                        "syntax error: redirection with no preceding command".to_string(),
                    );
                }
                match categorized.get(i + 1).map(|(c, _)| *c) {
                    Some(Arg) | Some(QuoteEnd) => {}
                    _ => {
                        return Validation::SyntaxError(format!(
                            "syntax error: expected filename after `{}'",
                            tok.text
                        ));
                    }
                }
            }
            Pipe | Oper => {
                if expect_clause_start {
                    return Validation::SyntaxError(format!(
                        "syntax error near unexpected token `{}'",
                        tok.text
                    ));
                }
                expect_clause_start = true;
                match categorized.get(i + 1).map(|(c, _)| *c) {
                    Some(next) => match opens_clause_or_continues(next) {
                        Some(true) => needs_continuation = true,
                        Some(false) => {}
                        None => {
                            return Validation::SyntaxError(format!(
                                "syntax error: expected command after `{}'",
                                tok.text
                            ));
                        }
                    },
                    None => {
                        return Validation::SyntaxError(format!(
                            "syntax error: expected command after `{}'",
                            tok.text
                        ));
                    }
                }
            }
            BgOper => {
                if expect_clause_start {
                    return Validation::SyntaxError(
                        "syntax error near unexpected token `&'".to_string(),
                    );
                }
                expect_clause_start = true;
                match categorized.get(i + 1).map(|(c, _)| *c) {
                    Some(End) => {}
                    Some(next) => match opens_clause_or_continues(next) {
                        Some(true) => needs_continuation = true,
                        Some(false) => {}
                        None => {
                            return Validation::SyntaxError(
                                "syntax error: unexpected token after `&'".to_string(),
                            );
                        }
                    },
                    None => {}
                }
            }
            LineContinuation => {
                if categorized.get(i + 1).map(|(c, _)| *c) != Some(End) {
                    return Validation::SyntaxError(
                        "syntax error: line continuation must end the line".to_string(),
                    );
                }
                needs_continuation = true;
            }
            End => {}
        }
    }

    if let Some((Inversion, _)) = categorized.iter().rev().nth(1) {
        return Validation::SyntaxError("syntax error: expected command after `!'".to_string());
    }

    if needs_continuation {
        Validation::NeedsContinuation
    } else {
        Validation::Ok
    }
}
