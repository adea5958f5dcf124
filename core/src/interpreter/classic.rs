//! Recursive reference evaluator
//!
//! Plain tree walking on the host stack. Tail positions (`if` branches, the
//! last `begin` form, closure bodies and macro expansions) loop instead of
//! recursing. Nesting is capped by `max_depth`, and the host stack grows on
//! demand below that cap, so runaway recursion fails with `RecursionLimit`
//! on any thread rather than overflowing the host stack.

use tracing::debug;

use super::forms::{self, SpecialForm};
use super::{Evaluator, Strategy};
use crate::cell::{Cell, Env};
use crate::error::{EvalError, EvalResult};

/// Remaining stack below which a nested evaluation grows the stack
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each new stack segment
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

pub struct ClassicEval {
    max_depth: usize,
    debug: bool,
    depth: usize,
    steps: u64,
}

impl ClassicEval {
    pub fn new(max_depth: usize, debug: bool) -> Self {
        ClassicEval {
            max_depth,
            debug,
            depth: 0,
            steps: 0,
        }
    }

    fn eval_nested(&mut self, x: &Cell, env: &Env) -> EvalResult<Cell> {
        if self.depth >= self.max_depth {
            return Err(EvalError::RecursionLimit(self.max_depth));
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_loop(x.clone(), env.clone())
        });
        self.depth -= 1;

        if self.debug {
            if let Ok(value) = &result {
                debug!(depth = self.depth, expr = %x, result = %value, "eval");
            }
        }
        result
    }

    fn eval_loop(&mut self, mut x: Cell, mut env: Env) -> EvalResult<Cell> {
        loop {
            self.steps += 1;

            if let Cell::Symbol(name) = &x {
                return env.lookup(name);
            }
            if !matches!(x, Cell::List(_)) {
                return Ok(x);
            }
            if x.is_empty() {
                return Ok(Cell::nil());
            }

            let items = x.items();

            if let Some(form) = SpecialForm::of(&x) {
                match form {
                    SpecialForm::Quote => return forms::operand(&items, 1, form),
                    SpecialForm::If => {
                        let test = forms::operand(&items, 1, form)?;
                        let test = self.eval_nested(&test, &env)?;
                        x = forms::if_branch(&items, &test)?;
                        continue;
                    }
                    SpecialForm::Define | SpecialForm::Set => {
                        let name = forms::binding_name(&items, form)?;
                        let value = forms::operand(&items, 2, form)?;
                        let value = self.eval_nested(&value, &env)?;
                        return forms::assign(form, &name, value, &env);
                    }
                    SpecialForm::Lambda | SpecialForm::Macro => {
                        return forms::make_closure(form, &x, &env)
                    }
                    SpecialForm::Begin => {
                        let Some((last, body)) = items[1..].split_last() else {
                            return Ok(Cell::nil());
                        };
                        for expr in body {
                            self.eval_nested(expr, &env)?;
                        }
                        x = last.clone();
                        continue;
                    }
                }
            }

            let proc = self.eval_nested(&items[0], &env)?;
            let operands = &items[1..];

            if let Cell::Macro(closure) = &proc {
                let scope = Env::bind(&closure.params(), operands.to_vec(), closure.env())?;
                x = self.eval_nested(&closure.body(), &scope)?;
                continue;
            }

            let args = operands
                .iter()
                .map(|arg| self.eval_nested(arg, &env))
                .collect::<EvalResult<Vec<_>>>()?;

            match proc {
                Cell::Lambda(closure) => {
                    env = Env::bind(&closure.params(), args, closure.env())?;
                    x = closure.body();
                }
                Cell::Proc(p) => return p.call(&args),
                Cell::ProcEnv(p) => return p.call(&args, &env),
                other => return Err(EvalError::NotCallable(other.to_string())),
            }
        }
    }
}

impl Evaluator for ClassicEval {
    fn strategy(&self) -> Strategy {
        Strategy::Classic
    }

    fn eval(&mut self, expr: &Cell, env: &Env) -> EvalResult<Cell> {
        self.depth = 0;
        self.eval_nested(expr, env)
    }

    fn steps(&self) -> u64 {
        self.steps
    }
}
