//! Versioned value cells with change notification.
//!
//! Every `set` emits a [`Change`], even when the new value equals the old
//! one. The stored value is replaced before any listener runs.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::channel::{EventChannel, EventStream};
use crate::scheduler::Scheduler;

/// A replaced value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<T> {
    /// The value before the update.
    pub old: T,
    /// The value after the update.
    pub new: T,
}

struct ObservableInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    changes: EventChannel<Change<T>>,
}

/// A shared, mutable value that announces every update.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Creates an observable holding `value`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                changes: EventChannel::named(scheduler, "observable.change"),
            }),
        }
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Reads the current value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replaces the value and emits a change record.
    pub fn set(&self, value: T) {
        let old = self.inner.value.replace(value.clone());
        self.inner.version.set(self.inner.version.get() + 1);
        if let Err(err) = self.inner.changes.publish(Change { old, new: value }) {
            warn!(%err, "observable change not delivered");
        }
    }

    /// Replaces the value with `f(current)` and emits a change record.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.with(f);
        self.set(next);
    }

    /// Stream of change records.
    #[must_use]
    pub fn on_change(&self) -> EventStream<Change<T>> {
        self.inner.changes.stream()
    }

    /// A read-only view sharing this observable's state.
    #[must_use]
    pub fn observed(&self) -> Observed<T> {
        Observed {
            source: self.clone(),
        }
    }

    /// Number of updates applied so far.
    pub(crate) fn version(&self) -> u64 {
        self.inner.version.get()
    }
}

/// Read-only view of an [`Observable`].
pub struct Observed<T> {
    source: Observable<T>,
}

impl<T> Clone for Observed<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observed").field(&self.source).finish()
    }
}

impl<T: Clone + 'static> Observed<T> {
    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.source.get()
    }

    /// Reads the current value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.source.with(f)
    }

    /// Stream of change records.
    #[must_use]
    pub fn on_change(&self) -> EventStream<Change<T>> {
        self.source.on_change()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_emits_even_when_value_is_unchanged() {
        // Arrange
        let scheduler = Scheduler::new();
        let mood = Observable::new(&scheduler, "calm");
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        let _sub = mood
            .on_change()
            .listen(move |change| sink.borrow_mut().push(change.clone()))
            .unwrap();

        // Act
        mood.set("calm");
        mood.set("angry");

        // Assert
        assert_eq!(
            *changes.borrow(),
            vec![
                Change {
                    old: "calm",
                    new: "calm"
                },
                Change {
                    old: "calm",
                    new: "angry"
                },
            ]
        );
        assert_eq!(mood.version(), 2);
    }

    #[test]
    fn test_listener_reads_new_value_during_notification() {
        let scheduler = Scheduler::new();
        let gold = Observable::new(&scheduler, 10);
        let seen = Rc::new(Cell::new(0));
        let (reader, sink) = (gold.observed(), Rc::clone(&seen));
        let _sub = gold
            .on_change()
            .listen(move |_| sink.set(reader.get()))
            .unwrap();

        gold.update(|g| g + 5);

        assert_eq!(seen.get(), 15);
        assert_eq!(gold.get(), 15);
    }

    #[test]
    fn test_observed_shares_state() {
        let scheduler = Scheduler::new();
        let name = Observable::new(&scheduler, String::from("Ada"));
        let view = name.observed();

        name.set(String::from("Grace"));

        assert_eq!(view.get(), "Grace");
        assert_eq!(view.with(String::len), 5);
    }
}
