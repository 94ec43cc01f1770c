//! Recorder: captures values delivered to a listener.

use std::cell::RefCell;
use std::rc::Rc;

/// Collects every value handed to its sink, in delivery order.
///
/// Clones share the same buffer, so a clone can be moved into a listener
/// while the original is kept for assertions.
#[derive(Debug)]
pub struct Recorder<T> {
    values: Rc<RefCell<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            values: Rc::clone(&self.values),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            values: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: Clone + 'static> Recorder<T> {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener callback that appends each value it receives.
    pub fn sink(&self) -> impl Fn(&T) + use<T> {
        let values = Rc::clone(&self.values);
        move |value: &T| values.borrow_mut().push(value.clone())
    }

    /// Returns a snapshot of the recorded values.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.values.borrow().clone()
    }

    /// Number of values recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Discards every recorded value.
    pub fn clear(&self) {
        self.values.borrow_mut().clear();
    }
}
