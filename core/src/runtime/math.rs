//! Arithmetic and comparison procedures

use crate::cell::ops::{self, Comparison};
use crate::cell::Cell;
use crate::error::{EvalError, EvalResult};

use super::expect_arity;

/// Left fold of a binary operator over one or more arguments
fn fold(args: &[Cell], op: fn(&Cell, &Cell) -> EvalResult<Cell>) -> EvalResult<Cell> {
    let (first, rest) = args
        .split_first()
        .ok_or(EvalError::ArityMismatch { expected: 1, got: 0 })?;
    rest.iter().try_fold(first.clone(), |acc, x| op(&acc, x))
}

fn compare(args: &[Cell], op: Comparison) -> EvalResult<Cell> {
    expect_arity(args, 2)?;
    Ok(Cell::truth(ops::compare(op, &args[0], &args[1])?))
}

pub fn plus(args: &[Cell]) -> EvalResult<Cell> {
    fold(args, ops::add)
}

pub fn minus(args: &[Cell]) -> EvalResult<Cell> {
    fold(args, ops::sub)
}

pub fn multiply(args: &[Cell]) -> EvalResult<Cell> {
    fold(args, ops::mul)
}

pub fn divide(args: &[Cell]) -> EvalResult<Cell> {
    fold(args, ops::div)
}

pub fn less_than(args: &[Cell]) -> EvalResult<Cell> {
    compare(args, Comparison::Lt)
}

pub fn less_equal(args: &[Cell]) -> EvalResult<Cell> {
    compare(args, Comparison::Le)
}

pub fn greater_than(args: &[Cell]) -> EvalResult<Cell> {
    compare(args, Comparison::Gt)
}

pub fn greater_equal(args: &[Cell]) -> EvalResult<Cell> {
    compare(args, Comparison::Ge)
}

pub fn num_equal(args: &[Cell]) -> EvalResult<Cell> {
    compare(args, Comparison::Eq)
}

/// `==`: cell equality on any two values
pub fn equal(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 2)?;
    Ok(Cell::truth(args[0] == args[1]))
}
