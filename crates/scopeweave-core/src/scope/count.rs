//! A scope that is used up after a fixed number of increments.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::channel::EventStream;
use crate::error::ReactiveError;
use crate::scheduler::Scheduler;

use super::{Channels, Scope, SharedScope};

/// Entered while fewer than `max` increments have happened.
///
/// The increment that reaches `max` emits an exit and closes both channels
/// in the same step; the scope never re-enters. A scope built with
/// `max == 0` starts exited and closed.
pub struct CountScope<P = ()> {
    inner: Rc<CountInner<P>>,
}

struct CountInner<P> {
    max: u32,
    current: Cell<u32>,
    disposed: Cell<bool>,
    channels: Channels<P>,
}

impl<P> Clone for CountScope<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for CountScope<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountScope")
            .field("current", &self.inner.current.get())
            .field("max", &self.inner.max)
            .finish()
    }
}

impl<P: Clone + Default + 'static> CountScope<P> {
    /// Creates a counter allowing `max` increments.
    #[must_use]
    pub fn new(scheduler: &Scheduler, max: u32) -> Self {
        let scope = Self {
            inner: Rc::new(CountInner {
                max,
                current: Cell::new(0),
                disposed: Cell::new(false),
                channels: Channels::new(scheduler, "count.enter", "count.exit"),
            }),
        };
        if max == 0 {
            scope.inner.channels.close();
        }
        scope
    }

    /// Records one use and returns how many remain.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::MaxUsesExceeded` if the bound was already
    /// reached, or `ReactiveError::ScopeClosed` if the scope was disposed.
    pub fn increment(&self) -> Result<u32, ReactiveError> {
        let max = self.inner.max;
        let current = self.inner.current.get();
        if current >= max {
            return Err(ReactiveError::MaxUsesExceeded { max });
        }
        if self.inner.disposed.get() {
            return Err(ReactiveError::ScopeClosed);
        }
        let current = current + 1;
        self.inner.current.set(current);
        if current == max {
            debug!(max, "count scope used up");
            self.inner.channels.emit_exit(P::default());
            self.inner.channels.close();
        }
        Ok(max - current)
    }

    /// Increments applied so far.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.inner.current.get()
    }

    /// Increments still allowed.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.inner.max - self.inner.current.get()
    }

    /// The configured bound.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.inner.max
    }

    /// A type-erased handle to this scope.
    #[must_use]
    pub fn shared(&self) -> SharedScope<P> {
        SharedScope::new(self.clone())
    }
}

impl<P: Clone + 'static> Scope<P> for CountScope<P> {
    fn is_entered(&self) -> bool {
        self.inner.current.get() < self.inner.max
    }

    fn on_enter(&self) -> EventStream<P> {
        self.inner.channels.enter.stream()
    }

    fn on_exit(&self) -> EventStream<P> {
        self.inner.channels.exit.stream()
    }

    fn scheduler(&self) -> &Scheduler {
        self.inner.channels.enter.scheduler()
    }

    fn dispose(&self) {
        self.inner.disposed.set(true);
        self.inner.channels.close();
    }
}
