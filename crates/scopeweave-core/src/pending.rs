//! Results of work that has been scheduled but not yet run.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::ReactiveError;

struct PendingInner<T> {
    outcome: RefCell<Option<Result<T, ReactiveError>>>,
    waker: RefCell<Option<Waker>>,
}

/// The outcome of a scheduled operation, known only once it has run.
///
/// A `Pending` settles exactly once. It can be inspected with
/// [`peek`](Self::peek) after the scheduler has run, or awaited from async
/// code; awaiting does not drive the scheduler.
pub struct Pending<T> {
    inner: Rc<PendingInner<T>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> Pending<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(PendingInner {
                outcome: RefCell::new(None),
                waker: RefCell::new(None),
            }),
        }
    }

    /// Settles the result. Later calls are ignored.
    pub(crate) fn settle(&self, outcome: Result<T, ReactiveError>) {
        {
            let mut slot = self.inner.outcome.borrow_mut();
            if slot.is_some() {
                return;
            }
            *slot = Some(outcome);
        }
        if let Some(waker) = self.inner.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    /// Whether the scheduled operation has run.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.outcome.borrow().is_some()
    }
}

impl<T: Clone> Pending<T> {
    /// A copy of the outcome, or `None` while still pending.
    #[must_use]
    pub fn peek(&self) -> Option<Result<T, ReactiveError>> {
        self.inner.outcome.borrow().clone()
    }
}

impl<T: Clone> Future for Pending<T> {
    type Output = Result<T, ReactiveError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.peek() {
            return Poll::Ready(outcome);
        }
        *self.inner.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}
