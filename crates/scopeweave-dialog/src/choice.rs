//! Choices offered while a dialog window is open.

use scopeweave_core::{CountScope, Events, Pending, SharedScope};
use uuid::Uuid;

/// Published when a pick runs while its choice is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picked {
    /// Identifier of the picked choice.
    pub choice_id: Uuid,
    /// Label of the picked choice.
    pub label: String,
    /// Picks still allowed after this one.
    pub remaining: u32,
}

/// A labelled choice, available while the dialog window is open and asks
/// remain.
#[derive(Debug, Clone)]
pub struct Choice {
    id: Uuid,
    label: String,
    uses: CountScope,
    available: SharedScope,
    picks: Events<Picked>,
}

impl Choice {
    /// Creates a choice gated by `window` that can be picked `max_asks`
    /// times. Successful picks are published on `picks`.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        window: &SharedScope,
        max_asks: u32,
        picks: &Events<Picked>,
    ) -> Self {
        let uses = CountScope::new(window.scheduler(), max_asks);
        let available = window.and(&uses.shared());
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            uses,
            available,
            picks: picks.clone(),
        }
    }

    /// Identifier assigned when the choice was created.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Label the choice is picked by.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether a pick would currently succeed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.is_entered()
    }

    /// The availability scope (window AND remaining asks).
    #[must_use]
    pub fn available(&self) -> SharedScope {
        self.available.clone()
    }

    /// Picks still allowed.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.uses.remaining()
    }

    /// Schedules a pick. Availability is checked when the pick runs; the
    /// result fails with `ReactiveError::Unavailable` if the window closed or
    /// the asks ran out in the meantime.
    pub fn pick(&self) -> Pending<Picked> {
        let (uses, id, label) = (self.uses.clone(), self.id, self.label.clone());
        self.picks.event_when(&self.available, move || {
            let remaining = uses.increment()?;
            Ok(Picked {
                choice_id: id,
                label,
                remaining,
            })
        })
    }
}
