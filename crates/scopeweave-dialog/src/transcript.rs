//! Transcript of what happened during a dialog.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use scopeweave_core::Clock;
use uuid::Uuid;

/// Something that happened during a dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// The choice window opened.
    WindowOpened,
    /// The choice window closed.
    WindowClosed,
    /// A pick ran while its choice was available.
    ChoicePicked {
        /// Identifier of the picked choice.
        choice_id: Uuid,
        /// Label of the picked choice.
        label: String,
        /// Picks still allowed for that choice.
        remaining: u32,
    },
    /// A pick ran after its choice became unavailable.
    PickRejected {
        /// Label of the rejected choice.
        label: String,
        /// Why the pick failed.
        reason: String,
    },
    /// The dialog was ended.
    DialogEnded,
}

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Unique entry identifier.
    pub entry_id: Uuid,
    /// Dialog this entry belongs to.
    pub dialog_id: Uuid,
    /// Position within the transcript, starting at 1.
    pub sequence_number: u64,
    /// When the entry was recorded, per the dialog's clock.
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// Append-only log of dialog entries. Clones share the same log.
#[derive(Clone)]
pub struct Transcript {
    dialog_id: Uuid,
    clock: Rc<dyn Clock>,
    next_sequence: Rc<Cell<u64>>,
    entries: Rc<RefCell<Vec<TranscriptEntry>>>,
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("dialog_id", &self.dialog_id)
            .field("entries", &self.entries.borrow().len())
            .finish_non_exhaustive()
    }
}

impl Transcript {
    /// Creates an empty transcript for `dialog_id`, stamped by `clock`.
    #[must_use]
    pub fn new(dialog_id: Uuid, clock: Rc<dyn Clock>) -> Self {
        Self {
            dialog_id,
            clock,
            next_sequence: Rc::new(Cell::new(1)),
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Appends an entry stamped with the clock's current time.
    pub fn record(&self, kind: EntryKind) {
        let sequence_number = self.next_sequence.replace(self.next_sequence.get() + 1);
        tracing::debug!(sequence_number, ?kind, "transcript entry recorded");
        self.entries.borrow_mut().push(TranscriptEntry {
            entry_id: Uuid::now_v7(),
            dialog_id: self.dialog_id,
            sequence_number,
            occurred_at: self.clock.now(),
            kind,
        });
    }

    /// Returns a snapshot of all entries in recording order.
    #[must_use]
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.borrow().clone()
    }

    /// Kinds of all entries, in recording order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EntryKind> {
        self.entries.borrow().iter().map(|e| e.kind.clone()).collect()
    }

    /// Serializes the transcript as one JSON object per line.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if an entry cannot be encoded.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for entry in self.entries.borrow().iter() {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use scopeweave_test_support::FixedClock;

    use super::*;

    #[test]
    fn test_entries_are_numbered_and_stamped() {
        // Arrange
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let dialog_id = Uuid::new_v4();
        let transcript = Transcript::new(dialog_id, Rc::new(FixedClock(fixed_now)));

        // Act
        transcript.record(EntryKind::WindowOpened);
        transcript.record(EntryKind::WindowClosed);

        // Assert
        let entries = transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence_number, 1);
        assert_eq!(entries[1].sequence_number, 2);
        assert_eq!(entries[1].occurred_at, fixed_now);
        assert_eq!(entries[1].dialog_id, dialog_id);
    }

    #[test]
    fn test_json_lines_flatten_entry_kind() {
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let transcript = Transcript::new(Uuid::new_v4(), Rc::new(FixedClock(fixed_now)));
        transcript.record(EntryKind::PickRejected {
            label: "bargain".to_owned(),
            reason: "unavailable".to_owned(),
        });

        let lines = transcript.to_json_lines().unwrap();
        let json: serde_json::Value = serde_json::from_str(lines.trim_end()).unwrap();

        assert_eq!(lines.lines().count(), 1);
        assert_eq!(json["type"], "pick_rejected");
        assert_eq!(json["label"], "bargain");
        assert_eq!(json["sequence_number"], 1);
    }
}
