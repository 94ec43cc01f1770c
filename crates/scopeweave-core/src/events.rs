//! Domain event publication on the scheduled queue.
//!
//! Work submitted through [`Events`] runs on a later scheduler turn than any
//! deferred listener queued before it, so listeners always observe a
//! settled world:
//!
//! ```text
//! synchronous listeners < deferred listener turns < scheduled events
//! ```
//!
//! Each submission returns a [`Pending`] that settles when the work runs.
//! Preconditions are checked at that moment, not at submission time.

use tracing::{debug, trace};

use crate::channel::{EventChannel, EventStream};
use crate::error::ReactiveError;
use crate::pending::Pending;
use crate::scheduler::Scheduler;
use crate::scope::SharedScope;

/// An ordered stream of domain events produced by scheduled work.
pub struct Events<T> {
    channel: EventChannel<T>,
}

impl<T> Clone for Events<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T: Clone + 'static> std::fmt::Debug for Events<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events")
            .field("channel", &self.channel)
            .finish()
    }
}

impl<T: Clone + 'static> Events<T> {
    /// Creates an open event stream on `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::named(scheduler, "events")
    }

    /// Creates an event stream whose channel carries `name` in logs.
    #[must_use]
    pub fn named(scheduler: &Scheduler, name: &'static str) -> Self {
        Self {
            channel: EventChannel::named(scheduler, name),
        }
    }

    /// Schedules `produce` and publishes its value.
    ///
    /// The returned result fails with `ReactiveError::ChannelClosed` if
    /// [`done`](Self::done) was called before the turn runs, or with
    /// whatever error `produce` returns. Nothing is published on failure.
    pub fn event(
        &self,
        produce: impl FnOnce() -> Result<T, ReactiveError> + 'static,
    ) -> Pending<T> {
        let pending = Pending::new();
        let (settle, channel) = (pending.clone(), self.channel.clone());
        trace!(channel = ?self.channel, "event scheduled");
        self.channel.scheduler().schedule(move || {
            let outcome = run(&channel, produce);
            if let Err(err) = &outcome {
                debug!(%err, "scheduled event failed");
            }
            settle.settle(outcome);
        });
        pending
    }

    /// Schedules publication of a ready value.
    pub fn event_value(&self, value: T) -> Pending<T> {
        self.event(move || Ok(value))
    }

    /// Like [`event`](Self::event), gated by `gate`.
    ///
    /// If the gate is not entered when the turn runs, `produce` is not
    /// called and the result fails with `ReactiveError::Unavailable`.
    pub fn event_when<P: Clone + 'static>(
        &self,
        gate: &SharedScope<P>,
        produce: impl FnOnce() -> Result<T, ReactiveError> + 'static,
    ) -> Pending<T> {
        let gate = gate.clone();
        self.event(move || {
            if gate.is_entered() {
                produce()
            } else {
                Err(ReactiveError::Unavailable(String::from(
                    "gate scope is not entered",
                )))
            }
        })
    }

    /// Subscribe view of the published events.
    #[must_use]
    pub fn stream(&self) -> EventStream<T> {
        self.channel.stream()
    }

    /// Closes the stream. Work still queued fails when it runs.
    pub fn done(&self) {
        self.channel.close();
    }

    /// Whether [`done`](Self::done) has been called.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.channel.is_closed()
    }

    /// Derives an event stream that also carries every value published here.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            channel: self.channel.child(),
        }
    }

    /// The scheduler events run on.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        self.channel.scheduler()
    }
}

fn run<T: Clone + 'static>(
    channel: &EventChannel<T>,
    produce: impl FnOnce() -> Result<T, ReactiveError>,
) -> Result<T, ReactiveError> {
    if channel.is_closed() {
        return Err(ReactiveError::ChannelClosed);
    }
    let value = produce()?;
    channel.publish(value.clone())?;
    Ok(value)
}
