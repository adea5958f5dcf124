//! List procedures
//!
//! None of these mutate their arguments; every result is a fresh list.

use crate::cell::Cell;
use crate::error::EvalResult;

use super::{expect_arity, expect_list};

pub fn head(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 1)?;
    Ok(expect_list("head", &args[0])?.head())
}

pub fn tail(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 1)?;
    Ok(expect_list("tail", &args[0])?.tail())
}

pub fn nullp(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 1)?;
    Ok(Cell::truth(args[0].is_nil()))
}

pub fn list(args: &[Cell]) -> EvalResult<Cell> {
    Ok(Cell::list(args.to_vec()))
}

pub fn cons(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 2)?;
    let rest = expect_list("cons", &args[1])?;
    let mut items = Vec::with_capacity(rest.len() + 1);
    items.push(args[0].clone());
    items.extend(rest.items());
    Ok(Cell::list(items))
}

pub fn append(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 2)?;
    let mut items = expect_list("append", &args[0])?.items();
    items.extend(expect_list("append", &args[1])?.items());
    Ok(Cell::list(items))
}

pub fn length(args: &[Cell]) -> EvalResult<Cell> {
    expect_arity(args, 1)?;
    Ok(Cell::number(expect_list("length", &args[0])?.len() as i64))
}
