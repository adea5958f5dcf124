//! Test helpers for scheduler tests

use std::cell::RefCell;
use std::rc::Rc;

use crate::cell::Cell;
use crate::config::SchedulerConfig;
use crate::error::{EvalError, EvalResult};
use crate::scheduler::{Scheduler, Task, TaskKind};

/// Shared record of which task ran, one entry per quantum
pub type RunLog = Rc<RefCell<Vec<&'static str>>>;

pub fn run_log() -> RunLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Runs for a fixed number of quanta, logging its name each time
pub struct Spin {
    name: &'static str,
    remaining: u32,
    ran: u64,
    log: RunLog,
}

impl Spin {
    pub fn boxed(name: &'static str, quanta: u32, log: &RunLog) -> Box<dyn Task> {
        Box::new(Spin {
            name,
            remaining: quanta,
            ran: 0,
            log: log.clone(),
        })
    }
}

impl Task for Spin {
    fn kind(&self) -> TaskKind {
        TaskKind::Frame
    }

    fn run_quantum(&mut self, _budget: usize) -> EvalResult<()> {
        self.log.borrow_mut().push(self.name);
        self.remaining = self.remaining.saturating_sub(1);
        self.ran += 1;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    fn result(&self) -> Option<Cell> {
        self.is_finished().then(|| Cell::symbol(self.name))
    }

    fn steps(&self) -> u64 {
        self.ran
    }
}

/// Fails on its first quantum
pub struct Boom;

impl Task for Boom {
    fn kind(&self) -> TaskKind {
        TaskKind::Classic
    }

    fn run_quantum(&mut self, _budget: usize) -> EvalResult<()> {
        Err(EvalError::DivideByZero)
    }

    fn is_finished(&self) -> bool {
        false
    }

    fn result(&self) -> Option<Cell> {
        None
    }

    fn steps(&self) -> u64 {
        0
    }
}

/// Scheduler that never sleeps for real
pub fn scheduler() -> Scheduler {
    let config = SchedulerConfig {
        idle_sleep_ms: 0,
        ..SchedulerConfig::default()
    };
    Scheduler::new(&config)
}

/// Occurrences of `name` among the first `n` runs
pub fn counts(log: &RunLog, n: usize, name: &str) -> usize {
    log.borrow().iter().take(n).filter(|r| **r == name).count()
}
