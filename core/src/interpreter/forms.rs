//! Special forms shared by the tree-walking evaluators

use crate::cell::env::key_text;
use crate::cell::{Cell, Env};
use crate::error::{EvalError, EvalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    If,
    Define,
    Set,
    Lambda,
    Macro,
    Begin,
}

impl SpecialForm {
    pub fn from_symbol(name: &str) -> Option<SpecialForm> {
        Some(match name {
            "quote" => SpecialForm::Quote,
            "if" => SpecialForm::If,
            "define" => SpecialForm::Define,
            "set!" => SpecialForm::Set,
            "lambda" => SpecialForm::Lambda,
            "macro" => SpecialForm::Macro,
            "begin" => SpecialForm::Begin,
            _ => return None,
        })
    }

    /// Special form named by the head of `expr`, if any
    pub fn of(expr: &Cell) -> Option<SpecialForm> {
        expr.get(0)
            .and_then(|head| head.as_symbol().and_then(SpecialForm::from_symbol))
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::If => "if",
            SpecialForm::Define => "define",
            SpecialForm::Set => "set!",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Macro => "macro",
            SpecialForm::Begin => "begin",
        }
    }
}

/// Operand `idx` of a special form
pub fn operand(items: &[Cell], idx: usize, form: SpecialForm) -> EvalResult<Cell> {
    items.get(idx).cloned().ok_or_else(|| {
        EvalError::MalformedForm(format!("'{}' is missing operand {}", form.keyword(), idx))
    })
}

/// Name bound by `define`/`set!`
pub fn binding_name(items: &[Cell], form: SpecialForm) -> EvalResult<String> {
    key_text(&operand(items, 1, form)?)
}

/// `(if test conseq [alt])` branch for an evaluated test
pub fn if_branch(items: &[Cell], test: &Cell) -> EvalResult<Cell> {
    if test.is_truthy() {
        operand(items, 2, SpecialForm::If)
    } else {
        Ok(items.get(3).cloned().unwrap_or_else(Cell::nil))
    }
}

/// Apply an evaluated `define`/`set!`, returning the value
pub fn assign(form: SpecialForm, name: &str, value: Cell, env: &Env) -> EvalResult<Cell> {
    if form == SpecialForm::Set {
        env.set(name, value.clone())?;
    } else {
        env.define(name, value.clone());
    }
    Ok(value)
}

/// Turn a `(lambda params body)` / `(macro params body)` list into a closure over `env`
pub fn make_closure(form: SpecialForm, expr: &Cell, env: &Env) -> EvalResult<Cell> {
    let Cell::List(items) = expr else {
        return Err(EvalError::MalformedForm(format!("{} is not a list", expr)));
    };
    if items.borrow().len() < 3 {
        return Err(EvalError::MalformedForm(format!(
            "'{}' needs parameters and a body",
            form.keyword()
        )));
    }
    Ok(match form {
        SpecialForm::Macro => Cell::macro_(items.clone(), env.clone()),
        _ => Cell::lambda(items.clone(), env.clone()),
    })
}
