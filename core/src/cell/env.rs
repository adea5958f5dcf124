//! Lexical environments
//!
//! An `Env` is a cheap handle to one scope. Scopes are shared by every closure
//! captured inside them and by every frame still evaluating in them, and live
//! as long as the longest holder.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::Cell;
use crate::error::{EvalError, EvalResult};

struct Scope {
    vars: RefCell<HashMap<String, Cell>>,
    parent: Option<Env>,
}

#[derive(Clone)]
pub struct Env(Rc<Scope>);

impl Env {
    /// New root scope
    pub fn new() -> Self {
        Env(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// New empty scope whose lookups fall back to `parent`
    pub fn with_parent(parent: &Env) -> Self {
        Env(Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&Env> {
        self.0.parent.as_ref()
    }

    /// Insert into this scope, shadowing any outer binding
    pub fn define(&self, key: impl Into<String>, value: Cell) {
        self.0.vars.borrow_mut().insert(key.into(), value);
    }

    /// Overwrite the nearest existing binding of `key`
    pub fn set(&self, key: &str, value: Cell) -> EvalResult<()> {
        let scope = self
            .find(key)
            .ok_or_else(|| EvalError::SetOnUndefined(key.to_string()))?;
        scope.0.vars.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }

    pub fn lookup(&self, key: &str) -> EvalResult<Cell> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(value) = env.0.vars.borrow().get(key) {
                return Ok(value.clone());
            }
            scope = env.parent();
        }
        Err(EvalError::UnboundSymbol(key.to_string()))
    }

    /// Nearest scope (innermost first) that binds `key`
    pub fn find(&self, key: &str) -> Option<Env> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if env.contains_local(key) {
                return Some(env.clone());
            }
            scope = env.parent();
        }
        None
    }

    pub fn contains_local(&self, key: &str) -> bool {
        self.0.vars.borrow().contains_key(key)
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Keys bound directly in this scope, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.vars.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Bind closure parameters to arguments in a fresh child of `parent`
    ///
    /// A bare symbol collects every argument into one list; a list binds
    /// positionally and must match the argument count exactly.
    pub fn bind(params: &Cell, args: Vec<Cell>, parent: &Env) -> EvalResult<Env> {
        let env = Env::with_parent(parent);
        match params {
            Cell::Symbol(name) => {
                env.define(name.to_string(), Cell::list(args));
            }
            Cell::List(_) => {
                let names = params.items();
                if names.len() != args.len() {
                    return Err(EvalError::ArityMismatch {
                        expected: names.len(),
                        got: args.len(),
                    });
                }
                for (name, value) in names.iter().zip(args) {
                    env.define(key_text(name)?, value);
                }
            }
            other => {
                return Err(EvalError::MalformedForm(format!(
                    "parameter list must be a symbol or list, got {}",
                    other
                )))
            }
        }
        Ok(env)
    }

    /// Bindings of this scope rendered as `{key: value, ...}`
    pub fn describe(&self) -> String {
        let vars = self.0.vars.borrow();
        let body: Vec<String> = self
            .keys()
            .into_iter()
            .filter_map(|k| vars.get(&k).map(|v| format!("{}: {}", k, v)))
            .collect();
        let parent = if self.parent().is_some() { " ^" } else { "" };
        format!("{{{}}}{}", body.join(", "), parent)
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("keys", &self.keys())
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}

/// Text used as an environment key
pub fn key_text(cell: &Cell) -> EvalResult<String> {
    match cell {
        Cell::Symbol(s) | Cell::Str(s) => Ok(s.to_string()),
        other => Err(EvalError::type_mismatch(
            "bind",
            format!("expected symbol, got {} '{}'", other.type_name(), other),
        )),
    }
}
