//! Cooperative two-queue scheduler.
//!
//! The scheduler owns two FIFO queues:
//!
//! - the *deferred* queue, where deferred channel listeners land. It behaves
//!   like a microtask queue: it is drained completely before anything else
//!   runs.
//! - the *scheduled* queue, where [`Events`](crate::Events) puts its work. One
//!   scheduled task runs per turn, after the deferred queue is empty.
//!
//! Nothing runs until the host drives the scheduler with
//! [`Scheduler::run_until_idle`] or one of the finer-grained methods.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::config::SchedulerConfig;
use crate::error::ReactiveError;

type Task = Box<dyn FnOnce()>;

struct SchedulerInner {
    deferred: RefCell<VecDeque<Task>>,
    scheduled: RefCell<VecDeque<Task>>,
    executed: Cell<u64>,
    config: SchedulerConfig,
}

/// Cloneable handle to a single-threaded task scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (deferred, scheduled) = self.pending_tasks();
        f.debug_struct("Scheduler")
            .field("deferred", &deferred)
            .field("scheduled", &scheduled)
            .field("executed", &self.inner.executed.get())
            .finish()
    }
}

impl Scheduler {
    /// Creates a scheduler with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates a scheduler with an explicit configuration.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                deferred: RefCell::new(VecDeque::new()),
                scheduled: RefCell::new(VecDeque::new()),
                executed: Cell::new(0),
                config,
            }),
        }
    }

    /// Returns the configuration this scheduler was built with.
    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Enqueues a task on the deferred queue.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.inner.deferred.borrow_mut().push_back(Box::new(task));
    }

    /// Enqueues a task on the scheduled queue.
    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.inner.scheduled.borrow_mut().push_back(Box::new(task));
    }

    /// Returns `(deferred, scheduled)` queue lengths.
    #[must_use]
    pub fn pending_tasks(&self) -> (usize, usize) {
        (
            self.inner.deferred.borrow().len(),
            self.inner.scheduled.borrow().len(),
        )
    }

    /// Returns true when both queues are empty.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_tasks() == (0, 0)
    }

    /// Total number of tasks executed over the scheduler's lifetime.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.inner.executed.get()
    }

    /// Drains the deferred queue, including tasks enqueued while draining.
    /// Returns the number of tasks run.
    pub fn run_deferred(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = Self::pop(&self.inner.deferred) {
            self.run(task);
            ran += 1;
        }
        ran
    }

    /// Runs one full turn: drains deferred tasks, runs at most one scheduled
    /// task, then drains the deferred tasks it produced.
    ///
    /// Returns whether a scheduled task ran.
    pub fn run_next_turn(&self) -> bool {
        self.run_deferred();
        let Some(task) = Self::pop(&self.inner.scheduled) else {
            return false;
        };
        trace!("running scheduled task");
        self.run(task);
        self.run_deferred();
        true
    }

    /// Runs turns until both queues are empty.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::TurnLimitExceeded` once more than
    /// `config.max_turns` tasks have run in this call. Remaining tasks stay
    /// queued.
    pub fn run_until_idle(&self) -> Result<usize, ReactiveError> {
        let limit = self.inner.config.max_turns;
        let mut ran = 0usize;
        loop {
            let queue = if self.inner.deferred.borrow().is_empty() {
                &self.inner.scheduled
            } else {
                &self.inner.deferred
            };
            if queue.borrow().is_empty() {
                return Ok(ran);
            }
            if ran >= limit {
                return Err(ReactiveError::TurnLimitExceeded { limit });
            }
            if let Some(task) = Self::pop(queue) {
                self.run(task);
                ran += 1;
            }
        }
    }

    fn pop(queue: &RefCell<VecDeque<Task>>) -> Option<Task> {
        queue.borrow_mut().pop_front()
    }

    fn run(&self, task: Task) {
        self.inner.executed.set(self.inner.executed.get() + 1);
        task();
    }
}
