//! Ordered multicast channels with synchronous and deferred listeners.
//!
//! Publishing a value happens in two phases:
//!
//! 1. every deferred listener is *scheduled* on the scheduler's deferred
//!    queue, in registration order;
//! 2. every synchronous listener is *invoked* inline, in registration order.
//!
//! Because phase 1 completes before phase 2 starts, any deferred work a
//! synchronous listener enqueues (for example a nested publish) lands behind
//! the deferred deliveries of the outer publish.
//!
//! Derived children receive the value between the two phases, so a nested
//! publish from a synchronous listener reaches them after the outer value.
//!
//! Listener lists are snapshotted before dispatch, so a listener may cancel
//! itself or a sibling from inside its own callback. Closing a channel from a
//! synchronous listener lets the value in flight reach the rest of the
//! snapshot; their completions fire once the outermost publish returns.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::error::ReactiveError;
use crate::scheduler::Scheduler;

/// How a listener is invoked when a value is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Runs inline, before `publish` returns.
    Sync,
    /// Runs on a later deferred turn of the scheduler.
    Deferred,
}

/// A listener waiting to be registered on a channel.
pub struct Listener<T> {
    delivery: Delivery,
    on_value: Rc<dyn Fn(&T)>,
    on_close: Option<Rc<dyn Fn()>>,
}

impl<T> Listener<T> {
    /// A listener invoked inline during `publish`.
    pub fn sync(on_value: impl Fn(&T) + 'static) -> Self {
        Self {
            delivery: Delivery::Sync,
            on_value: Rc::new(on_value),
            on_close: None,
        }
    }

    /// A listener invoked on a later deferred turn.
    pub fn deferred(on_value: impl Fn(&T) + 'static) -> Self {
        Self {
            delivery: Delivery::Deferred,
            on_value: Rc::new(on_value),
            on_close: None,
        }
    }

    /// Adds a completion callback, fired once when the channel closes.
    #[must_use]
    pub fn on_close(mut self, on_close: impl Fn() + 'static) -> Self {
        self.on_close = Some(Rc::new(on_close));
        self
    }

    /// The delivery mode of this listener.
    #[must_use]
    pub fn delivery(&self) -> Delivery {
        self.delivery
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("delivery", &self.delivery)
            .field("on_close", &self.on_close.is_some())
            .finish_non_exhaustive()
    }
}

struct SlotState<T> {
    paused: bool,
    cancelled: bool,
    completed: bool,
    close_pending: bool,
    buffer: VecDeque<T>,
}

struct Slot<T> {
    id: u64,
    delivery: Delivery,
    on_value: Rc<dyn Fn(&T)>,
    on_close: Option<Rc<dyn Fn()>>,
    state: RefCell<SlotState<T>>,
    channel: Weak<ChannelInner<T>>,
}

impl<T: Clone + 'static> Slot<T> {
    fn deliver(&self, value: &T) {
        {
            let mut state = self.state.borrow_mut();
            if state.cancelled || state.completed {
                return;
            }
            if state.paused {
                state.buffer.push_back(value.clone());
                return;
            }
        }
        (self.on_value)(value);
    }

    fn complete(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.cancelled || state.completed {
                return;
            }
            if state.paused {
                state.close_pending = true;
                return;
            }
            state.completed = true;
        }
        if let Some(on_close) = &self.on_close {
            on_close();
        }
    }
}

/// Control surface shared by every slot regardless of payload type.
trait SubscriptionControl {
    fn pause(&self);
    fn resume(&self);
    fn cancel(&self);
    fn is_paused(&self) -> bool;
    fn is_active(&self) -> bool;
}

impl<T: Clone + 'static> SubscriptionControl for Slot<T> {
    fn pause(&self) {
        let mut state = self.state.borrow_mut();
        if !state.cancelled && !state.completed {
            state.paused = true;
        }
    }

    fn resume(&self) {
        self.state.borrow_mut().paused = false;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                if state.paused || state.cancelled {
                    return;
                }
                state.buffer.pop_front()
            };
            match next {
                Some(value) => (self.on_value)(&value),
                None => break,
            }
        }
        let close_pending = std::mem::take(&mut self.state.borrow_mut().close_pending);
        if close_pending {
            self.complete();
        }
    }

    fn cancel(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            state.buffer.clear();
        }
        if let Some(channel) = self.channel.upgrade() {
            channel.remove(self.id, self.delivery);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn is_active(&self) -> bool {
        let state = self.state.borrow();
        !state.cancelled && !state.completed
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle cancels the listener. Use [`detach`](Self::detach) to
/// keep the listener registered for as long as the channel lives.
#[must_use = "dropping a Subscription cancels the listener"]
pub struct Subscription {
    control: Option<Rc<dyn SubscriptionControl>>,
}

impl Subscription {
    /// Buffers incoming values instead of invoking the listener.
    pub fn pause(&self) {
        if let Some(control) = &self.control {
            control.pause();
        }
    }

    /// Delivers buffered values oldest first, then resumes live delivery.
    pub fn resume(&self) {
        if let Some(control) = &self.control {
            control.resume();
        }
    }

    /// Stops delivery immediately and discards buffered values.
    pub fn cancel(&self) {
        if let Some(control) = &self.control {
            control.cancel();
        }
    }

    /// Whether the listener is currently buffering.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.control.as_ref().is_some_and(|c| c.is_paused())
    }

    /// Whether the listener can still receive values or a completion.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.control.as_ref().is_some_and(|c| c.is_active())
    }

    /// Releases the handle without cancelling the listener.
    pub fn detach(mut self) {
        self.control = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(control) = self.control.take() {
            control.cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .field("paused", &self.is_paused())
            .finish()
    }
}

struct ChildLink<T> {
    channel: Weak<ChannelInner<T>>,
    linked: bool,
}

struct ChannelInner<T> {
    name: &'static str,
    scheduler: Scheduler,
    sync_listeners: RefCell<Vec<Rc<Slot<T>>>>,
    deferred_listeners: RefCell<Vec<Rc<Slot<T>>>>,
    children: RefCell<Vec<ChildLink<T>>>,
    closed: Cell<bool>,
    next_id: Cell<u64>,
    dispatch_depth: Cell<usize>,
    held_completions: RefCell<Vec<Rc<Slot<T>>>>,
}

impl<T> ChannelInner<T> {
    fn remove(&self, id: u64, delivery: Delivery) {
        let list = match delivery {
            Delivery::Sync => &self.sync_listeners,
            Delivery::Deferred => &self.deferred_listeners,
        };
        list.borrow_mut().retain(|slot| slot.id != id);
    }
}

/// Owner handle of an ordered multicast channel.
///
/// Cloning the handle shares the channel. Consumers that should only listen
/// get an [`EventStream`] from [`stream`](Self::stream).
pub struct EventChannel<T> {
    inner: Rc<ChannelInner<T>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.inner.name)
            .field("closed", &self.inner.closed.get())
            .field("sync_listeners", &self.inner.sync_listeners.borrow().len())
            .field(
                "deferred_listeners",
                &self.inner.deferred_listeners.borrow().len(),
            )
            .finish()
    }
}

impl<T: Clone + 'static> EventChannel<T> {
    /// Creates an open channel bound to `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::named(scheduler, "channel")
    }

    /// Creates an open channel with a name used in log output.
    #[must_use]
    pub fn named(scheduler: &Scheduler, name: &'static str) -> Self {
        Self {
            inner: Rc::new(ChannelInner {
                name,
                scheduler: scheduler.clone(),
                sync_listeners: RefCell::new(Vec::new()),
                deferred_listeners: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                closed: Cell::new(false),
                next_id: Cell::new(0),
                dispatch_depth: Cell::new(0),
                held_completions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Returns a subscribe-only view of this channel.
    #[must_use]
    pub fn stream(&self) -> EventStream<T> {
        EventStream {
            inner: Rc::clone(&self.inner),
        }
    }

    /// The scheduler deferred listeners are queued on.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Number of registered listeners of both modes.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.stream().listener_count()
    }

    /// Registers a synchronous listener.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ChannelClosed` if the channel is closed.
    pub fn listen(&self, on_value: impl Fn(&T) + 'static) -> Result<Subscription, ReactiveError> {
        self.stream().listen(on_value)
    }

    /// Registers a listener.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ChannelClosed` if the channel is closed.
    pub fn subscribe(&self, listener: Listener<T>) -> Result<Subscription, ReactiveError> {
        self.stream().subscribe(listener)
    }

    /// Publishes `value` to every registered listener and to derived
    /// children.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ChannelClosed` if the channel is closed.
    pub fn publish(&self, value: T) -> Result<(), ReactiveError> {
        if self.inner.closed.get() {
            return Err(ReactiveError::ChannelClosed);
        }

        let deferred = self.inner.deferred_listeners.borrow().clone();
        let sync = self.inner.sync_listeners.borrow().clone();
        trace!(
            channel = self.inner.name,
            sync = sync.len(),
            deferred = deferred.len(),
            "publish"
        );

        for slot in deferred {
            let value = value.clone();
            self.inner.scheduler.defer(move || slot.deliver(&value));
        }
        self.forward_to_children(&value);

        let depth = &self.inner.dispatch_depth;
        depth.set(depth.get() + 1);
        for slot in sync {
            slot.deliver(&value);
        }
        depth.set(depth.get() - 1);
        if depth.get() == 0 {
            let held = std::mem::take(&mut *self.inner.held_completions.borrow_mut());
            for slot in held {
                slot.complete();
            }
        }
        Ok(())
    }

    fn forward_to_children(&self, value: &T) {
        let children: Vec<Rc<ChannelInner<T>>> = {
            let mut links = self.inner.children.borrow_mut();
            links.retain(|link| link.channel.strong_count() > 0);
            links.iter().filter_map(|link| link.channel.upgrade()).collect()
        };
        for inner in children {
            let child = EventChannel { inner };
            if child.publish(value.clone()).is_err() {
                warn!(
                    channel = self.inner.name,
                    child = child.inner.name,
                    "child channel closed; value not forwarded"
                );
            }
        }
    }

    /// Closes the channel. Every listener's completion callback fires once;
    /// later calls are no-ops.
    pub fn close(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        debug!(channel = self.inner.name, "channel closed");

        let deferred = std::mem::take(&mut *self.inner.deferred_listeners.borrow_mut());
        let sync = std::mem::take(&mut *self.inner.sync_listeners.borrow_mut());
        for slot in deferred {
            self.inner.scheduler.defer(move || slot.complete());
        }
        if self.inner.dispatch_depth.get() > 0 {
            self.inner.held_completions.borrow_mut().extend(sync);
        } else {
            for slot in sync {
                slot.complete();
            }
        }

        let linked: Vec<Rc<ChannelInner<T>>> = self
            .inner
            .children
            .borrow()
            .iter()
            .filter(|link| link.linked)
            .filter_map(|link| link.channel.upgrade())
            .collect();
        for inner in linked {
            EventChannel { inner }.close();
        }
    }

    /// Derives a child channel. Values published here are also published to
    /// the child; the child accepts its own values and closes independently.
    #[must_use]
    pub fn child(&self) -> Self {
        self.derive(false)
    }

    /// Like [`child`](Self::child), but the child is closed when this
    /// channel closes.
    #[must_use]
    pub fn linked_child(&self) -> Self {
        self.derive(true)
    }

    fn derive(&self, linked: bool) -> Self {
        let child = Self::named(&self.inner.scheduler, self.inner.name);
        if linked && self.is_closed() {
            child.close();
        }
        self.inner.children.borrow_mut().push(ChildLink {
            channel: Rc::downgrade(&child.inner),
            linked,
        });
        child
    }
}

/// Subscribe-only view of an [`EventChannel`].
pub struct EventStream<T> {
    inner: Rc<ChannelInner<T>>,
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("name", &self.inner.name)
            .field("closed", &self.inner.closed.get())
            .finish()
    }
}

impl<T: Clone + 'static> EventStream<T> {
    /// Registers a synchronous listener.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ChannelClosed` if the channel is closed.
    pub fn listen(&self, on_value: impl Fn(&T) + 'static) -> Result<Subscription, ReactiveError> {
        self.subscribe(Listener::sync(on_value))
    }

    /// Registers a deferred listener.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ChannelClosed` if the channel is closed.
    pub fn listen_deferred(
        &self,
        on_value: impl Fn(&T) + 'static,
    ) -> Result<Subscription, ReactiveError> {
        self.subscribe(Listener::deferred(on_value))
    }

    /// Registers a listener.
    ///
    /// # Errors
    ///
    /// Returns `ReactiveError::ChannelClosed` if the channel is closed.
    pub fn subscribe(&self, listener: Listener<T>) -> Result<Subscription, ReactiveError> {
        if self.inner.closed.get() {
            return Err(ReactiveError::ChannelClosed);
        }
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let slot = Rc::new(Slot {
            id,
            delivery: listener.delivery,
            on_value: listener.on_value,
            on_close: listener.on_close,
            state: RefCell::new(SlotState {
                paused: false,
                cancelled: false,
                completed: false,
                close_pending: false,
                buffer: VecDeque::new(),
            }),
            channel: Rc::downgrade(&self.inner),
        });
        match slot.delivery {
            Delivery::Sync => self.inner.sync_listeners.borrow_mut().push(Rc::clone(&slot)),
            Delivery::Deferred => self
                .inner
                .deferred_listeners
                .borrow_mut()
                .push(Rc::clone(&slot)),
        }

        let control: Rc<dyn SubscriptionControl> = slot;
        Ok(Subscription {
            control: Some(control),
        })
    }

    /// The scheduler deferred listeners are queued on.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Whether the channel has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Number of registered listeners of both modes.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.sync_listeners.borrow().len() + self.inner.deferred_listeners.borrow().len()
    }
}
