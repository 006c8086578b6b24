//! Plan Builder — turns a validated, categorized token sequence into the
//! `Vec<Wrapper>` execution plan (spec.md §4.7). Replaces the teacher's
//! `script_parser::parse_chain`, which only split on `&&`/`||`/`;`; this
//! also splits on `&`, splits each chain entry on `|` into per-process
//! pipelines, consumes `Redirection` tokens into `Process` redirect fields,
//! and strips a leading `!`/trailing `&` into `Job::inverted`/`background`.
//! Grounded in `original_source/main.c`'s `create_jobs`/`create_job_wrapper`/
//! `create_job` (496–813).

use std::path::PathBuf;

use crate::ast::{Job, Operator, Process, TokenCategory, Wrapper};
use crate::expander::{expand_tokens, ExpansionContext};
use crate::tokenizer::RawToken;

type Token = (TokenCategory, RawToken);

/// Build the execution plan from a categorized, already-validated line.
/// `next_id` is the job id to assign to the first job built; callers pass
/// the shell's running job-id counter and use the returned value to advance
/// it for the next line.
pub fn build_plan(categorized: &[Token], ctx: &ExpansionContext, next_id: usize) -> Vec<Wrapper> {
    let mut plan = Vec::new();
    let mut job_id = next_id;
    let mut clause_start = 0;
    let mut i = 0;

    while i < categorized.len() {
        match categorized[i].0 {
            TokenCategory::Oper => {
                let op = operator_from_text(&categorized[i].1.text);
                let job = build_job(&categorized[clause_start..i], ctx, job_id);
                job_id += 1;
                plan.push(Wrapper::Job(job));
                plan.push(Wrapper::Operator(op));
                clause_start = i + 1;
            }
            TokenCategory::BgOper => {
                let mut job = build_job(&categorized[clause_start..i], ctx, job_id);
                job_id += 1;
                job.background = true;
                job.foreground = false;
                plan.push(Wrapper::Job(job));
                plan.push(Wrapper::Operator(Operator::Background));
                clause_start = i + 1;
            }
            TokenCategory::End => {
                if i > clause_start {
                    let job = build_job(&categorized[clause_start..i], ctx, job_id);
                    job_id += 1;
                    plan.push(Wrapper::Job(job));
                }
            }
            _ => {}
        }
        i += 1;
    }

    plan
}

fn operator_from_text(text: &str) -> Operator {
    match text {
        "&&" => Operator::And,
        "||" => Operator::Or,
        _ => Operator::Sequence,
    }
}

/// Build one [`Job`] from the categorized tokens of a single clause (the
/// tokens between two operators, with no `Oper`/`BgOper`/`End` inside).
fn build_job(tokens: &[Token], ctx: &ExpansionContext, id: usize) -> Job {
    let (inverted, rest) = match tokens.first() {
        Some((TokenCategory::Inversion, _)) => (true, &tokens[1..]),
        _ => (false, tokens),
    };

    let command_text = rest
        .iter()
        .map(|(_, tok)| tok.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let processes = rest
        .split(|(cat, _)| *cat == TokenCategory::Pipe)
        .map(|group| build_process(group, ctx))
        .collect();

    let mut job = Job::new(id, command_text, processes);
    job.inverted = inverted;
    strip_glued_background(&mut job);
    job
}

/// A trailing `&` glued onto the last argv word (`sleep 1&`, no whitespace
/// before it) never becomes its own `BgOper` token, so the tokenizer hands
/// it to us as part of an ordinary `Arg`/`Cmd` token. Grounded in
/// `original_source/main.c::create_job` (~lines 780-792): check the last
/// process's last argv entry for a trailing `&` and strip it.
fn strip_glued_background(job: &mut Job) {
    let Some(last_process) = job.processes.last_mut() else {
        return;
    };
    let Some(last_arg) = last_process.argv.last_mut() else {
        return;
    };
    if last_arg.len() > 1 && last_arg.ends_with('&') {
        last_arg.pop();
        job.background = true;
        job.foreground = false;
    }
}

fn build_process(group: &[Token], ctx: &ExpansionContext) -> Process {
    let mut argv = Vec::new();
    let mut process = Process::new(Vec::new());

    let mut i = 0;
    while i < group.len() {
        let (cat, tok) = &group[i];
        if *cat == TokenCategory::Redirection {
            let target = group.get(i + 1).map(|(_, t)| t);
            let path = target
                .map(|t| expand_redirect_path(t, ctx))
                .unwrap_or_default();
            match tok.text.as_str() {
                "<" => process.redirects.stdin_path = Some(path),
                ">" => {
                    process.redirects.stdout_path = Some(path);
                    process.redirects.append = false;
                }
                ">>" => {
                    process.redirects.stdout_path = Some(path);
                    process.redirects.append = true;
                }
                "2>" => process.redirects.stderr_path = Some(path),
                _ => {}
            }
            i += 2;
            continue;
        }
        argv.extend(expand_tokens(std::slice::from_ref(tok), ctx));
        i += 1;
    }

    process.argv = argv;
    process
}

fn expand_redirect_path(tok: &RawToken, ctx: &ExpansionContext) -> PathBuf {
    expand_tokens(std::slice::from_ref(tok), ctx)
        .into_iter()
        .next()
        .map(PathBuf::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvStore;
    use crate::tokenizer::{categorize, tokenize};

    fn plan_for(line: &str) -> Vec<Wrapper> {
        let env = EnvStore::new();
        let ctx = ExpansionContext {
            env: &env,
            last_status: 0,
            last_bg_pid: None,
        };
        let tokens = tokenize(line);
        let categorized = categorize(&tokens);
        build_plan(&categorized, &ctx, 1)
    }

    fn job_argvs(job: &Job) -> Vec<Vec<String>> {
        job.processes.iter().map(|p| p.argv.clone()).collect()
    }

    #[test]
    fn single_command() {
        let plan = plan_for("echo hello");
        assert_eq!(plan.len(), 1);
        match &plan[0] {
            Wrapper::Job(j) => assert_eq!(job_argvs(j), vec![vec!["echo", "hello"]]),
            _ => panic!("expected job"),
        }
    }

    #[test]
    fn pipeline_splits_into_two_processes() {
        let plan = plan_for("ls -la | grep foo");
        assert_eq!(plan.len(), 1);
        match &plan[0] {
            Wrapper::Job(j) => {
                assert_eq!(
                    job_argvs(j),
                    vec![
                        vec!["ls".to_string(), "-la".to_string()],
                        vec!["grep".to_string(), "foo".to_string()]
                    ]
                );
            }
            _ => panic!("expected job"),
        }
    }

    #[test]
    fn sequence_operator_splits_two_jobs() {
        let plan = plan_for("echo a ; echo b");
        assert_eq!(plan.len(), 3);
        assert!(matches!(plan[1], Wrapper::Operator(Operator::Sequence)));
    }

    #[test]
    fn and_or_chain() {
        let plan = plan_for("false && echo skipped || echo ran");
        assert_eq!(plan.len(), 5);
        assert!(matches!(plan[1], Wrapper::Operator(Operator::And)));
        assert!(matches!(plan[3], Wrapper::Operator(Operator::Or)));
    }

    #[test]
    fn trailing_background_marks_job() {
        let plan = plan_for("sleep 1 &");
        assert_eq!(plan.len(), 2);
        match &plan[0] {
            Wrapper::Job(j) => {
                assert!(j.background);
                assert!(!j.foreground);
            }
            _ => panic!("expected job"),
        }
        assert!(matches!(plan[1], Wrapper::Operator(Operator::Background)));
    }

    #[test]
    fn glued_trailing_ampersand_marks_job_background() {
        let plan = plan_for("sleep 1&");
        assert_eq!(plan.len(), 1);
        match &plan[0] {
            Wrapper::Job(j) => {
                assert!(j.background);
                assert!(!j.foreground);
                assert_eq!(job_argvs(j), vec![vec!["sleep".to_string(), "1".to_string()]]);
            }
            _ => panic!("expected job"),
        }
    }

    #[test]
    fn leading_inversion_marks_job_inverted() {
        let plan = plan_for("! true");
        match &plan[0] {
            Wrapper::Job(j) => {
                assert!(j.inverted);
                assert_eq!(job_argvs(j), vec![vec!["true".to_string()]]);
            }
            _ => panic!("expected job"),
        }
    }

    #[test]
    fn redirection_consumed_into_process_redirects() {
        let plan = plan_for("echo hi > out.txt");
        match &plan[0] {
            Wrapper::Job(j) => {
                assert_eq!(job_argvs(j), vec![vec!["echo".to_string(), "hi".to_string()]]);
                assert_eq!(
                    j.processes[0].redirects.stdout_path,
                    Some(PathBuf::from("out.txt"))
                );
                assert!(!j.processes[0].redirects.append);
            }
            _ => panic!("expected job"),
        }
    }

    #[test]
    fn append_redirection_sets_append_flag() {
        let plan = plan_for("echo hi >> out.txt");
        match &plan[0] {
            Wrapper::Job(j) => assert!(j.processes[0].redirects.append),
            _ => panic!("expected job"),
        }
    }

    #[test]
    fn job_ids_increase_across_clauses() {
        let plan = plan_for("echo a ; echo b");
        let ids: Vec<usize> = plan
            .iter()
            .filter_map(|w| match w {
                Wrapper::Job(j) => Some(j.id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
