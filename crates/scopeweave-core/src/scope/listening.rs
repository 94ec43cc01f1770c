//! A scope derived from an arbitrary event stream.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::channel::{EventStream, Subscription};
use crate::scheduler::Scheduler;

use super::{Channels, Scope, SharedScope, watch};

type Rule<E> = Box<dyn Fn(&E) -> bool>;

/// Derives scope state from an upstream stream of events.
///
/// Each event is tested against `enter_when`, `exit_when` and `close_when`.
/// An exit wins over an enter for the same event. A close is applied after
/// the transition. The scope also closes when the upstream stream closes.
///
/// Notifications carry the event that caused them.
pub struct ListeningScope<E> {
    inner: Rc<ListeningInner<E>>,
}

struct ListeningInner<E> {
    entered: Cell<bool>,
    enter_when: Rule<E>,
    exit_when: Rule<E>,
    close_when: Rule<E>,
    channels: Channels<E>,
    upstream: RefCell<Option<Subscription>>,
}

impl<E> Clone for ListeningScope<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Clone + 'static> ListeningScope<E> {
    /// Listens to `events`, starting not entered.
    #[must_use]
    pub fn new(
        events: &EventStream<E>,
        enter_when: impl Fn(&E) -> bool + 'static,
        exit_when: impl Fn(&E) -> bool + 'static,
        close_when: impl Fn(&E) -> bool + 'static,
    ) -> Self {
        let inner = Rc::new(ListeningInner {
            entered: Cell::new(false),
            enter_when: Box::new(enter_when),
            exit_when: Box::new(exit_when),
            close_when: Box::new(close_when),
            channels: Channels::new(events.scheduler(), "listening.enter", "listening.exit"),
            upstream: RefCell::new(None),
        });

        let (on_value, on_close) = (Rc::downgrade(&inner), Rc::downgrade(&inner));
        let upstream = watch(
            events,
            move |event| with(&on_value, |scope| scope.observe(event)),
            move || with(&on_close, ListeningInner::close),
        );
        *inner.upstream.borrow_mut() = upstream;

        Self { inner }
    }

    /// Sets the state before any event has been seen.
    #[must_use]
    pub fn initially_entered(self, entered: bool) -> Self {
        self.inner.entered.set(entered);
        self
    }

    /// A type-erased handle to this scope.
    #[must_use]
    pub fn shared(&self) -> SharedScope<E> {
        SharedScope::new(self.clone())
    }
}

fn with<E>(inner: &Weak<ListeningInner<E>>, f: impl FnOnce(&ListeningInner<E>)) {
    if let Some(inner) = inner.upgrade() {
        f(&inner);
    }
}

impl<E: Clone + 'static> ListeningInner<E> {
    fn observe(&self, event: &E) {
        let enter = (self.enter_when)(event);
        let exit = (self.exit_when)(event);
        let close = (self.close_when)(event);

        if exit {
            if self.entered.replace(false) {
                debug!("listening scope exited");
                self.channels.emit_exit(event.clone());
            }
        } else if enter && !self.entered.replace(true) {
            debug!("listening scope entered");
            self.channels.emit_enter(event.clone());
        }

        if close {
            self.close();
        }
    }

    fn close(&self) {
        let upstream = self.upstream.borrow_mut().take();
        drop(upstream);
        self.channels.close();
    }
}

impl<E: Clone + 'static> Scope<E> for ListeningScope<E> {
    fn is_entered(&self) -> bool {
        self.inner.entered.get()
    }

    fn on_enter(&self) -> EventStream<E> {
        self.inner.channels.enter.stream()
    }

    fn on_exit(&self) -> EventStream<E> {
        self.inner.channels.exit.stream()
    }

    fn scheduler(&self) -> &Scheduler {
        self.inner.channels.enter.scheduler()
    }

    fn dispose(&self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::EventChannel;

    #[derive(Debug, Clone, PartialEq)]
    enum Weather {
        Sun,
        Rain,
        Storm,
        Apocalypse,
    }

    fn fair_weather(weather: &EventChannel<Weather>) -> ListeningScope<Weather> {
        ListeningScope::new(
            &weather.stream(),
            |w| matches!(w, Weather::Sun | Weather::Storm),
            |w| matches!(w, Weather::Rain | Weather::Storm),
            |w| *w == Weather::Apocalypse,
        )
    }

    fn log(scope: &ListeningScope<Weather>) -> (Rc<RefCell<Vec<String>>>, Vec<Subscription>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let on_enter = scope
            .on_enter()
            .listen(move |w| sink.borrow_mut().push(format!("enter {w:?}")))
            .unwrap();
        let sink = Rc::clone(&seen);
        let on_exit = scope
            .on_exit()
            .listen(move |w| sink.borrow_mut().push(format!("exit {w:?}")))
            .unwrap();
        (seen, vec![on_enter, on_exit])
    }

    #[test]
    fn test_enters_and_exits_on_matching_events() {
        // Arrange
        let scheduler = Scheduler::new();
        let weather = EventChannel::new(&scheduler);
        let scope = fair_weather(&weather);
        let (seen, _subs) = log(&scope);

        // Act
        weather.publish(Weather::Sun).unwrap();
        weather.publish(Weather::Sun).unwrap();
        weather.publish(Weather::Rain).unwrap();

        // Assert
        assert_eq!(*seen.borrow(), vec!["enter Sun", "exit Rain"]);
        assert!(!scope.is_entered());
    }

    #[test]
    fn test_exit_takes_precedence_over_enter() {
        let scheduler = Scheduler::new();
        let weather = EventChannel::new(&scheduler);
        let scope = fair_weather(&weather).initially_entered(true);
        let (seen, _subs) = log(&scope);

        weather.publish(Weather::Storm).unwrap();

        assert_eq!(*seen.borrow(), vec!["exit Storm"]);
        assert!(!scope.is_entered());
    }

    #[test]
    fn test_close_event_closes_after_transition() {
        // Arrange
        let scheduler = Scheduler::new();
        let weather = EventChannel::new(&scheduler);
        let scope = fair_weather(&weather);

        // Act
        weather.publish(Weather::Apocalypse).unwrap();

        // Assert
        assert!(scope.on_enter().is_closed());
        assert!(scope.on_exit().is_closed());
        assert_eq!(weather.listener_count(), 0);
    }

    #[test]
    fn test_upstream_close_closes_scope() {
        let scheduler = Scheduler::new();
        let weather = EventChannel::<Weather>::new(&scheduler);
        let scope = fair_weather(&weather);

        weather.close();

        assert!(scope.on_enter().is_closed());
    }

    #[test]
    fn test_dispose_releases_upstream_listener() {
        let scheduler = Scheduler::new();
        let weather = EventChannel::new(&scheduler);
        let scope = fair_weather(&weather);
        assert_eq!(weather.listener_count(), 1);

        scope.dispose();

        assert_eq!(weather.listener_count(), 0);
        assert!(scope.on_enter().is_closed());
        weather.publish(Weather::Sun).unwrap();
        assert!(!scope.is_entered());
    }
}
