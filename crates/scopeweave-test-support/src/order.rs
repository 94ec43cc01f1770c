//! Order log: labelled deliveries across several listeners.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

/// A shared log of labels, used to assert the interleaving of deliveries
/// made to different listeners.
#[derive(Debug, Clone, Default)]
pub struct OrderLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl OrderLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Returns a snapshot of the entries in the order they were pushed.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// A listener callback that logs `label` and ignores the value.
    pub fn tap<T>(&self, label: &'static str) -> impl Fn(&T) + use<T> {
        let log = self.clone();
        move |_: &T| log.push(label)
    }

    /// A listener callback that logs `label` followed by the value.
    pub fn tap_value<T: Debug>(&self, label: &'static str) -> impl Fn(&T) + use<T> {
        let log = self.clone();
        move |value: &T| log.push(format!("{label} {value:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taps_interleave_in_call_order() {
        // Arrange
        let log = OrderLog::new();
        let first = log.tap::<u8>("first");
        let second = log.tap_value::<u8>("second");

        // Act
        second(&7);
        first(&1);
        log.push("done");

        // Assert
        assert_eq!(log.entries(), vec!["second 7", "first", "done"]);
    }
}
