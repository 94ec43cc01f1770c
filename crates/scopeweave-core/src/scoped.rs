//! Values bound to whichever scope currently backs them.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::channel::Subscription;
use crate::observable::{Observable, Observed};
use crate::scheduler::Scheduler;
use crate::scope::{ForwardingScope, Scope, SharedScope, watch};

/// An observable value driven by the transitions of a backing scope.
///
/// [`within`](Self::within) re-binds the value: previous bindings are
/// dropped, the value is recomputed from the new scope's current state and
/// future transitions re-apply the matching transform. The scope exposed by
/// [`scope`](Self::scope) is a forwarding mirror, so listeners attached to it
/// survive re-binding.
pub struct Scoped<T, P = ()> {
    inner: Rc<ScopedInner<T, P>>,
}

struct ScopedInner<T, P> {
    value: Observable<T>,
    mirror: ForwardingScope<P>,
    bindings: RefCell<Vec<Subscription>>,
}

impl<T, P> Clone for Scoped<T, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug, P> fmt::Debug for Scoped<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("value", &self.inner.value)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static, P: Clone + Default + 'static> Scoped<T, P> {
    /// Creates an unbound value holding `initial`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, initial: T) -> Self {
        Self::from_observable(scheduler, Observable::new(scheduler, initial))
    }

    /// Drives an existing observable.
    #[must_use]
    pub fn from_observable(scheduler: &Scheduler, value: Observable<T>) -> Self {
        Self {
            inner: Rc::new(ScopedInner {
                value,
                mirror: ForwardingScope::new(scheduler),
                bindings: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Binds to `scope` with identity transforms.
    pub fn within(&self, scope: &SharedScope<P>) {
        self.within_mapped(scope, T::clone, T::clone);
    }

    /// Binds to `scope`, applying `enter_value` on enter and `exit_value` on
    /// exit.
    pub fn within_mapped(
        &self,
        scope: &SharedScope<P>,
        enter_value: impl Fn(&T) -> T + 'static,
        exit_value: impl Fn(&T) -> T + 'static,
    ) {
        self.inner.bindings.borrow_mut().clear();

        let entered = scope.is_entered();
        debug!(entered, "scoped value re-bound");
        if entered {
            self.inner.value.update(&enter_value);
        } else {
            self.inner.value.update(&exit_value);
        }

        let mut bindings = Vec::with_capacity(2);
        let weak = Rc::downgrade(&self.inner);
        bindings.extend(watch(
            &scope.on_enter(),
            move |_| with(&weak, |scoped| scoped.apply("enter", &enter_value)),
            || {},
        ));
        let weak = Rc::downgrade(&self.inner);
        bindings.extend(watch(
            &scope.on_exit(),
            move |_| with(&weak, |scoped| scoped.apply("exit", &exit_value)),
            || {},
        ));
        *self.inner.bindings.borrow_mut() = bindings;

        // The value is updated before mirror listeners observe the transition.
        self.inner.mirror.set_delegate(scope);
    }

    /// Read-only view of the value.
    #[must_use]
    pub fn value(&self) -> Observed<T> {
        self.inner.value.observed()
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    /// The mirror of the backing scope.
    #[must_use]
    pub fn scope(&self) -> SharedScope<P> {
        self.inner.mirror.shared()
    }

    /// The scope currently backing the value, if bound.
    #[must_use]
    pub fn backing(&self) -> Option<SharedScope<P>> {
        self.inner.mirror.delegate()
    }

    /// Drops the bindings and closes the mirror's channels.
    pub fn dispose(&self) {
        self.inner.bindings.borrow_mut().clear();
        self.inner.mirror.dispose();
    }
}

fn with<T, P>(inner: &Weak<ScopedInner<T, P>>, f: impl FnOnce(&ScopedInner<T, P>)) {
    if let Some(inner) = inner.upgrade() {
        f(&inner);
    }
}

impl<T: Clone + 'static, P> ScopedInner<T, P> {
    fn apply(&self, edge: &'static str, transform: &dyn Fn(&T) -> T) {
        self.value.update(transform);
        trace!(edge, version = self.value.version(), "scoped value re-applied");
    }
}
