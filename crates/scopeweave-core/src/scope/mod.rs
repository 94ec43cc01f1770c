//! Scopes: boolean states with enter/exit notification streams.
//!
//! Every variant implements [`Scope`]. Combinators hold their operands as
//! [`SharedScope`] handles and never assume a concrete variant.
//!
//! # Invariants
//!
//! 1. A synchronous listener reading `is_entered` while handling an enter
//!    notification sees `true`; while handling an exit it sees `false`.
//! 2. A scope's state only changes together with a notification, except where
//!    a variant documents otherwise (`PredicatedScope`).
//! 3. Combinators register on their operands with weak back-references and
//!    release those registrations on `dispose` or when the last handle drops.

mod and;
mod constant;
mod count;
mod forwarding;
mod listening;
mod predicated;
mod settable;

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::channel::{EventChannel, EventStream, Listener, Subscription};
use crate::scheduler::Scheduler;

pub use and::AndScope;
pub use constant::ConstantScope;
pub use count::CountScope;
pub use forwarding::ForwardingScope;
pub use listening::ListeningScope;
pub use predicated::PredicatedScope;
pub use settable::SettableScope;

/// Capability shared by every scope variant.
///
/// `P` is the payload carried by enter/exit notifications.
pub trait Scope<P = ()> {
    /// Whether the scope is currently entered.
    fn is_entered(&self) -> bool;

    /// Stream of enter notifications.
    fn on_enter(&self) -> EventStream<P>;

    /// Stream of exit notifications.
    fn on_exit(&self) -> EventStream<P>;

    /// Scheduler the scope's channels deliver on.
    fn scheduler(&self) -> &Scheduler;

    /// Releases upstream registrations and closes both notification channels.
    fn dispose(&self);

    /// `Some(entered)` for scopes whose state can never change.
    fn constant(&self) -> Option<bool> {
        None
    }
}

/// Reference-counted, type-erased scope handle.
pub struct SharedScope<P = ()> {
    inner: Rc<dyn Scope<P>>,
}

impl<P> Clone for SharedScope<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: Clone + 'static> fmt::Debug for SharedScope<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedScope")
            .field("entered", &self.is_entered())
            .finish()
    }
}

impl<P: Clone + 'static> SharedScope<P> {
    /// Wraps a concrete scope.
    pub fn new(scope: impl Scope<P> + 'static) -> Self {
        Self {
            inner: Rc::new(scope),
        }
    }

    /// Whether the scope is currently entered.
    #[must_use]
    pub fn is_entered(&self) -> bool {
        self.inner.is_entered()
    }

    /// Stream of enter notifications.
    #[must_use]
    pub fn on_enter(&self) -> EventStream<P> {
        self.inner.on_enter()
    }

    /// Stream of exit notifications.
    #[must_use]
    pub fn on_exit(&self) -> EventStream<P> {
        self.inner.on_exit()
    }

    /// Scheduler the scope's channels deliver on.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        self.inner.scheduler()
    }

    /// Releases upstream registrations and closes both channels.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Conjunction with `other`.
    #[must_use]
    pub fn and(&self, other: &SharedScope<P>) -> SharedScope<P> {
        SharedScope::new(AndScope::new(self.clone(), other.clone()))
    }

    /// Gates this scope by `predicate`.
    ///
    /// Constant scopes evaluate the predicate once, right away: an always
    /// entered scope yields itself or a never entered scope, and a never
    /// entered scope yields itself.
    #[must_use]
    pub fn when(&self, predicate: impl Fn() -> bool + 'static) -> SharedScope<P> {
        match self.inner.constant() {
            Some(true) if predicate() => self.clone(),
            Some(true) => SharedScope::new(ConstantScope::never(self.scheduler())),
            Some(false) => self.clone(),
            None => SharedScope::new(PredicatedScope::new(predicate, self.clone())),
        }
    }

    /// Whether both handles point at the same scope.
    #[must_use]
    pub fn ptr_eq(&self, other: &SharedScope<P>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Enter/exit channel pair owned by a scope.
pub(crate) struct Channels<P> {
    pub(crate) enter: EventChannel<P>,
    pub(crate) exit: EventChannel<P>,
}

impl<P: Clone + 'static> Channels<P> {
    pub(crate) fn new(scheduler: &Scheduler, enter: &'static str, exit: &'static str) -> Self {
        Self {
            enter: EventChannel::named(scheduler, enter),
            exit: EventChannel::named(scheduler, exit),
        }
    }

    pub(crate) fn emit_enter(&self, payload: P) {
        emit(&self.enter, payload);
    }

    pub(crate) fn emit_exit(&self, payload: P) {
        emit(&self.exit, payload);
    }

    pub(crate) fn close(&self) {
        self.enter.close();
        self.exit.close();
    }
}

fn emit<P: Clone + 'static>(channel: &EventChannel<P>, payload: P) {
    if channel.publish(payload).is_err() {
        debug!(channel = ?channel, "transition on closed channel ignored");
    }
}

/// Registers a synchronous listener on an operand stream. A stream that is
/// already closed reports completion immediately and yields no registration.
pub(crate) fn watch<P: Clone + 'static>(
    stream: &EventStream<P>,
    on_value: impl Fn(&P) + 'static,
    on_close: impl Fn() + 'static,
) -> Option<Subscription> {
    let on_close = Rc::new(on_close);
    let completion = Rc::clone(&on_close);
    if let Ok(subscription) =
        stream.subscribe(Listener::sync(on_value).on_close(move || completion()))
    {
        Some(subscription)
    } else {
        on_close();
        None
    }
}
