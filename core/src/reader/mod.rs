//! Reader - PEST-based s-expression parser
//!
//! Turns surface text into `Cell` trees. Numbers are `-`? followed by digits,
//! `"..."` is a string with `\` escapes, `;` comments run to end of line and
//! everything else between delimiters is a symbol.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::cell::Cell;

#[cfg(test)]
mod tests;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "reader/sexpr.pest"]
struct SexprParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadError {
    #[error("unbalanced parenthesis: {0}")]
    UnbalancedParens(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("no expression to read")]
    Empty,

    #[error("number out of range: {0}")]
    NumberOutOfRange(String),
}

impl From<pest::error::Error<Rule>> for ReadError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ReadError::Syntax(err.to_string())
    }
}

pub type ReadResult<T> = Result<T, ReadError>;

/* ===================== Public API ===================== */

/// Read the first expression in `source`
pub fn read(source: &str) -> ReadResult<Cell> {
    read_program(source)?
        .into_iter()
        .next()
        .ok_or(ReadError::Empty)
}

/// Read every top-level expression in `source`, in order
pub fn read_program(source: &str) -> ReadResult<Vec<Cell>> {
    check_balance(source)?;

    let program = SexprParser::parse(Rule::program, source)?
        .next()
        .ok_or(ReadError::Empty)?;

    program
        .into_inner()
        .filter(|pair| pair.as_rule() != Rule::EOI)
        .map(build_cell)
        .collect()
}

/* ===================== Builders ===================== */

fn build_cell(pair: Pair<Rule>) -> ReadResult<Cell> {
    match pair.as_rule() {
        Rule::list => {
            let items = pair.into_inner().map(build_cell).collect::<ReadResult<_>>()?;
            Ok(Cell::list(items))
        }
        Rule::number => {
            let text = pair.as_str();
            text.parse::<i64>()
                .map(Cell::number)
                .map_err(|_| ReadError::NumberOutOfRange(text.to_string()))
        }
        Rule::string => {
            let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Cell::string(&unescape(raw)))
        }
        Rule::symbol => Ok(Cell::symbol(pair.as_str())),
        other => Err(ReadError::Syntax(format!("unexpected {:?}", other))),
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Reject unmatched `(` or `)` before parsing so the failure is named
fn check_balance(source: &str) -> ReadResult<()> {
    let mut depth: usize = 0;
    let mut chars = source.chars();
    let mut line = 1;
    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '"' => {
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        '\n' => line += 1,
                        _ => {}
                    }
                }
            }
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ReadError::UnbalancedParens(format!("unexpected ')' on line {}", line))
                })?;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(ReadError::UnbalancedParens(format!(
            "{} unclosed '('",
            depth
        )));
    }
    Ok(())
}
