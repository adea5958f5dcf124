//! Arithmetic and comparison on cells
//!
//! Shared by the native library and the machine's SUB/MUL/compare opcodes so
//! every engine applies the same overloading rules.

use super::Cell;
use crate::error::{EvalError, EvalResult};

/// Numeric comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "=",
        }
    }
}

fn numbers(op: &str, a: &Cell, b: &Cell) -> EvalResult<(i64, i64)> {
    match (a, b) {
        (Cell::Number(x), Cell::Number(y)) => Ok((*x, *y)),
        _ => Err(EvalError::type_mismatch(
            op,
            format!(
                "expected numbers, got {} '{}' and {} '{}'",
                a.type_name(),
                a,
                b.type_name(),
                b
            ),
        )),
    }
}

/// `+`: numbers add, text concatenates, lists append
pub fn add(a: &Cell, b: &Cell) -> EvalResult<Cell> {
    match a {
        Cell::Number(x) => {
            let (_, y) = numbers("+", a, b)?;
            Ok(Cell::Number(x.wrapping_add(y)))
        }
        Cell::Str(x) | Cell::Symbol(x) => {
            let rhs = b.atom_text().ok_or_else(|| {
                EvalError::type_mismatch("+", format!("cannot concatenate {}", b.type_name()))
            })?;
            let joined = format!("{}{}", x, rhs);
            Ok(match a {
                Cell::Str(_) => Cell::string(&joined),
                _ => Cell::symbol(&joined),
            })
        }
        Cell::List(_) => match b {
            Cell::List(_) => {
                let mut items = a.items();
                items.extend(b.items());
                Ok(Cell::list(items))
            }
            _ => Err(EvalError::type_mismatch(
                "+",
                format!("cannot append {} to list", b.type_name()),
            )),
        },
        _ => Err(EvalError::type_mismatch(
            "+",
            format!("unsupported operand {}", a.type_name()),
        )),
    }
}

pub fn sub(a: &Cell, b: &Cell) -> EvalResult<Cell> {
    let (x, y) = numbers("-", a, b)?;
    Ok(Cell::Number(x.wrapping_sub(y)))
}

pub fn mul(a: &Cell, b: &Cell) -> EvalResult<Cell> {
    let (x, y) = numbers("*", a, b)?;
    Ok(Cell::Number(x.wrapping_mul(y)))
}

pub fn div(a: &Cell, b: &Cell) -> EvalResult<Cell> {
    let (x, y) = numbers("/", a, b)?;
    if y == 0 {
        return Err(EvalError::DivideByZero);
    }
    Ok(Cell::Number(x.wrapping_div(y)))
}

pub fn compare(op: Comparison, a: &Cell, b: &Cell) -> EvalResult<bool> {
    let (x, y) = numbers(op.symbol(), a, b)?;
    Ok(match op {
        Comparison::Lt => x < y,
        Comparison::Le => x <= y,
        Comparison::Gt => x > y,
        Comparison::Ge => x >= y,
        Comparison::Eq => x == y,
    })
}
