//! Scopeweave Core: reactive primitives for time-bounded availability.
//!
//! Everything here runs on a single-threaded cooperative [`Scheduler`].
//! Two primitives carry the weight: [`Scope`] (a boolean state with
//! enter/exit notifications) and [`EventChannel`] (an ordered multicast
//! channel with synchronous and deferred listeners). The remaining types
//! are built from those two.
//!
//! Delivery order is always: synchronous listeners, then deferred listener
//! turns, then events scheduled through [`Events`].

pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod observable;
pub mod pending;
pub mod scheduler;
pub mod scope;
pub mod scoped;

pub use channel::{Delivery, EventChannel, EventStream, Listener, Subscription};
pub use clock::{Clock, SystemClock};
pub use config::SchedulerConfig;
pub use error::ReactiveError;
pub use events::Events;
pub use observable::{Change, Observable, Observed};
pub use pending::Pending;
pub use scheduler::Scheduler;
pub use scope::{
    AndScope, ConstantScope, CountScope, ForwardingScope, ListeningScope, PredicatedScope, Scope,
    SettableScope, SharedScope,
};
pub use scoped::Scoped;
