//! DIMACS CNF and grouped CNF readers.
//!
//! - Comments start with `c`.
//! - `p cnf <nvars> <nclauses>`: every clause is its own constraint.
//! - `p gcnf <nvars> <nclauses> <ngroups>`: each clause is prefixed by `{g}`;
//!   `{0}` clauses are hard, `{g}` clauses belong to constraint `g - 1`.

use std::io::BufRead;

use tracing::debug;

use crate::errors::{ErrorInfo, MarcoError};
use crate::store::{Clause, ConstraintStore, HARD_GROUP};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Cnf,
    Gcnf { groups: usize },
}

fn input_error(code: &str, message: impl Into<String>, line_no: usize) -> MarcoError {
    MarcoError::Input(ErrorInfo::new(code, message).with_context("line", line_no.to_string()))
}

/// Parses a DIMACS CNF or grouped CNF document into a [`ConstraintStore`].
pub fn read_store<R: BufRead>(reader: R) -> Result<ConstraintStore, MarcoError> {
    let mut format = None;
    let mut num_vars = 0u32;
    let mut hard = Vec::new();
    let mut groups: Vec<Vec<Clause>> = Vec::new();
    let mut pending: Vec<i32> = Vec::new();
    let mut pending_group: Option<usize> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') || trimmed.starts_with('%') {
            continue;
        }

        if trimmed.starts_with('p') {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            let parsed = match parts.as_slice() {
                ["p", "cnf", vars, _clauses] => vars.parse::<u32>().map(|v| (v, Format::Cnf)),
                ["p", "gcnf", vars, _clauses, ngroups] => vars.parse::<u32>().and_then(|v| {
                    ngroups
                        .parse::<usize>()
                        .map(|groups| (v, Format::Gcnf { groups }))
                }),
                _ => {
                    return Err(input_error(
                        "bad-problem-line",
                        format!("unrecognised problem line: {trimmed}"),
                        line_no,
                    ))
                }
            };
            let (vars, detected) = parsed.map_err(|err| {
                input_error("bad-problem-line", format!("{err}: {trimmed}"), line_no)
            })?;
            num_vars = vars;
            if let Format::Gcnf { groups: count } = detected {
                groups.resize_with(count, Vec::new);
            }
            format = Some(detected);
            continue;
        }

        let Some(format) = format else {
            return Err(input_error(
                "missing-problem-line",
                "clause found before the problem line",
                line_no,
            ));
        };

        for token in trimmed.split_whitespace() {
            if let Some(tag) = token.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
                if format == Format::Cnf {
                    return Err(input_error(
                        "unexpected-group-tag",
                        "group tags are only valid in gcnf input",
                        line_no,
                    ));
                }
                if !pending.is_empty() || pending_group.is_some() {
                    return Err(input_error(
                        "unterminated-clause",
                        "group tag found inside an unterminated clause",
                        line_no,
                    ));
                }
                let tag: usize = tag.parse().map_err(|_| {
                    input_error("bad-group-tag", format!("invalid group tag {token}"), line_no)
                })?;
                pending_group = Some(tag);
                continue;
            }

            let lit: i32 = token.parse().map_err(|_| {
                input_error("bad-literal", format!("invalid literal {token}"), line_no)
            })?;
            if lit != 0 {
                pending.push(lit);
                continue;
            }

            let clause = Clause::new(std::mem::take(&mut pending))?;
            match format {
                Format::Cnf => groups.push(vec![clause]),
                Format::Gcnf { .. } => {
                    let tag = pending_group.take().ok_or_else(|| {
                        input_error("missing-group-tag", "gcnf clause without group tag", line_no)
                    })?;
                    if tag == HARD_GROUP {
                        hard.push(clause);
                    } else {
                        if groups.len() < tag {
                            groups.resize_with(tag, Vec::new);
                        }
                        groups[tag - 1].push(clause);
                    }
                }
            }
        }
    }

    if format.is_none() {
        return Err(MarcoError::Input(ErrorInfo::new(
            "missing-problem-line",
            "no problem line found",
        )));
    }
    if !pending.is_empty() {
        return Err(MarcoError::Input(
            ErrorInfo::new("unterminated-clause", "last clause is missing its terminating 0")
                .with_context("literals", format!("{pending:?}")),
        ));
    }

    debug!(
        num_vars,
        constraints = groups.len(),
        hard = hard.len(),
        "parsed formula"
    );
    Ok(ConstraintStore::new(num_vars, hard, groups))
}

/// Parses a document held in memory.
pub fn parse_str(input: &str) -> Result<ConstraintStore, MarcoError> {
    read_store(input.as_bytes())
}
