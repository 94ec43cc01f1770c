//! Error types for the reactive core.

use thiserror::Error;

/// Errors surfaced by scopes, channels, the scheduler and pending results.
///
/// All of these are local and synchronous from the point of view of the
/// operation that failed. Nothing in the core retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A closed `SettableScope` was asked to enter or exit.
    #[error("scope is closed")]
    ScopeClosed,

    /// A value was published to, or a listener registered on, a closed channel.
    #[error("channel is closed")]
    ChannelClosed,

    /// A `CountScope` was incremented after reaching its bound.
    #[error("maximum uses exceeded: {max}")]
    MaxUsesExceeded {
        /// The bound that was already reached.
        max: u32,
    },

    /// The gate of a scheduled event was not entered when the event ran.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// `Scheduler::run_until_idle` executed more tasks than allowed.
    #[error("scheduler turn limit of {limit} exceeded")]
    TurnLimitExceeded {
        /// The configured limit.
        limit: usize,
    },
}
