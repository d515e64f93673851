//! Debounced state: rapid updates coalesce into one commit.
//!
//! Each [`DebouncedState::debounced_set_state`] call computes its candidate
//! right away against the last *committed* value (never against an earlier
//! pending candidate), then restarts the delay timer. When the timer expires
//! the most recent candidate is committed; earlier ones are never observed.
//!
//! The committed value lives in a spark-signals [`Signal`], so effects
//! reading [`DebouncedState::state`] re-run on each commit.
//!
//! # Example
//!
//! ```ignore
//! let search = use_debounced_state(&instance, String::new(), Duration::from_millis(300));
//!
//! search.debounced_set_state("r".to_string());
//! search.debounced_set_state("ru".to_string());
//! search.debounced_set_state("rust".to_string());
//!
//! host.advance(Duration::from_millis(300));
//! assert_eq!(search.state(), "rust");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use spark_signals::{signal, untrack, Signal};
use tracing::trace;

use crate::engine::{Instance, WeakInstance};
use crate::platform::{Host, TimerId};

// =============================================================================
// Update
// =============================================================================

/// A literal next value, or a function of the committed value.
pub enum Update<T> {
    Value(T),
    With(Box<dyn FnOnce(&T) -> T>),
}

impl<T> Update<T> {
    pub fn with(f: impl FnOnce(&T) -> T + 'static) -> Self {
        Update::With(Box::new(f))
    }

    fn apply(self, committed: &T) -> T {
        match self {
            Update::Value(value) => value,
            Update::With(f) => f(committed),
        }
    }
}

impl<T> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Update::Value(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Update::With(_) => f.write_str("With(..)"),
        }
    }
}

// =============================================================================
// DebouncedState
// =============================================================================

struct Pending<T> {
    timer: TimerId,
    candidate: T,
}

struct DebounceInner<T: Clone + PartialEq + 'static> {
    committed: Signal<T>,
    delay: Duration,
    pending: RefCell<Option<Pending<T>>>,
    torn_down: Cell<bool>,
    host: Rc<dyn Host>,
    owner: WeakInstance,
}

/// Handle returned by [`use_debounced_state`]. Clones share state.
pub struct DebouncedState<T: Clone + PartialEq + 'static> {
    inner: Rc<DebounceInner<T>>,
}

/// Create a debounced state container committing after `delay` of quiet.
///
/// A zero delay commits on the host's next tick.
pub fn use_debounced_state<T>(instance: &Instance, initial: T, delay: Duration) -> DebouncedState<T>
where
    T: Clone + PartialEq + 'static,
{
    let inner = Rc::new(DebounceInner {
        committed: signal(initial),
        delay,
        pending: RefCell::new(None),
        torn_down: Cell::new(false),
        host: instance.host().clone(),
        owner: instance.downgrade(),
    });

    let teardown = inner.clone();
    instance.on_destroy(move || {
        teardown.torn_down.set(true);
        teardown.cancel_pending();
    });

    DebouncedState { inner }
}

impl<T: Clone + PartialEq + 'static> DebouncedState<T> {
    /// Last committed value (tracked when read inside an effect).
    pub fn state(&self) -> T {
        self.inner.committed.get()
    }

    pub fn signal(&self) -> Signal<T> {
        self.inner.committed.clone()
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Request an update; only the last request in a quiet window commits.
    ///
    /// Ignored after teardown.
    pub fn debounced_set_state(&self, update: impl Into<Update<T>>) {
        let inner = &self.inner;
        if inner.torn_down.get() || !inner.owner.is_alive() {
            trace!("debounced update after teardown, ignored");
            return;
        }

        // Untracked: a caller inside an effect must not subscribe to commits.
        let candidate = untrack(|| update.into().apply(&inner.committed.get()));

        inner.cancel_pending();

        let weak = Rc::downgrade(inner);
        let timer = inner.host.set_timeout(
            inner.delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.commit_pending();
                }
            }),
        );
        trace!(timer = %timer, delay = ?inner.delay, "debounce timer restarted");

        *inner.pending.borrow_mut() = Some(Pending { timer, candidate });
    }

    /// Shorthand for `debounced_set_state(Update::with(f))`.
    pub fn update_with(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.debounced_set_state(Update::with(f));
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    /// Commit the pending candidate now. Returns whether there was one.
    pub fn flush(&self) -> bool {
        let Some(timer) = self.inner.pending.borrow().as_ref().map(|pending| pending.timer) else {
            return false;
        };
        self.inner.host.clear_timeout(timer);
        self.inner.commit_pending();
        true
    }

    /// Drop the pending candidate. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        self.inner.cancel_pending()
    }
}

impl<T: Clone + PartialEq + 'static> Clone for DebouncedState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + PartialEq + 'static> DebounceInner<T> {
    fn commit_pending(&self) {
        if self.torn_down.get() || !self.owner.is_alive() {
            return;
        }
        let pending = self.pending.borrow_mut().take();
        if let Some(pending) = pending {
            trace!(timer = %pending.timer, "debounced value committed");
            self.committed.set(pending.candidate);
        }
    }

    fn cancel_pending(&self) -> bool {
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(pending) => {
                self.host.clear_timeout(pending.timer);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{mount_instance, reset_registry};
    use crate::platform::EventLoop;
    use spark_signals::effect;

    fn setup() -> (Rc<EventLoop>, Instance) {
        reset_registry();
        let host = Rc::new(EventLoop::new());
        let instance = mount_instance(None, host.clone());
        (host, instance)
    }

    #[test]
    fn test_updates_read_committed_value() {
        let (host, instance) = setup();
        let counter = use_debounced_state(&instance, 0, Duration::from_millis(500));

        for _ in 0..5 {
            counter.update_with(|v| v + 1);
        }

        host.advance(Duration::from_millis(499));
        assert_eq!(counter.state(), 0, "nothing commits inside the window");

        host.advance(Duration::from_millis(1));
        assert_eq!(counter.state(), 1, "one commit, derived from committed 0");
        assert!(!counter.is_pending());
    }

    #[test]
    fn test_each_call_restarts_window() {
        let (host, instance) = setup();
        let text = use_debounced_state(&instance, String::new(), Duration::from_millis(100));

        text.debounced_set_state("a".to_string());
        host.advance(Duration::from_millis(80));
        text.debounced_set_state("ab".to_string());
        host.advance(Duration::from_millis(80));
        assert_eq!(text.state(), "");

        host.advance(Duration::from_millis(20));
        assert_eq!(text.state(), "ab");
        assert_eq!(host.pending_timers(), 0);
    }

    #[test]
    fn test_intermediate_values_never_observed() {
        let (host, instance) = setup();
        let value = use_debounced_state(&instance, 0, Duration::from_millis(50));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let tracked = value.clone();
        let _effect = effect(move || {
            seen_clone.borrow_mut().push(tracked.state());
        });

        for v in 1..=4 {
            value.debounced_set_state(v);
        }
        host.advance(Duration::from_millis(50));

        assert_eq!(*seen.borrow(), vec![0, 4]);
    }

    #[test]
    fn test_update_inside_effect_does_not_subscribe() {
        let (host, instance) = setup();
        let counter = use_debounced_state(&instance, 0, Duration::from_millis(10));
        let source = signal(0);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let source_clone = source.clone();
        let writer = counter.clone();
        let _effect = effect(move || {
            let _ = source_clone.get();
            runs_clone.set(runs_clone.get() + 1);
            writer.update_with(|v| v + 1);
        });

        for _ in 0..5 {
            host.advance(Duration::from_millis(10));
        }

        assert_eq!(runs.get(), 1, "commits must not re-run the writing effect");
        assert_eq!(counter.state(), 1);
        assert!(!counter.is_pending());
    }

    #[test]
    fn test_zero_delay_applies_on_next_tick() {
        let (host, instance) = setup();
        let value = use_debounced_state(&instance, 'a', Duration::ZERO);

        value.debounced_set_state('b');
        assert_eq!(value.state(), 'a');

        host.tick();
        assert_eq!(value.state(), 'b');
    }

    #[test]
    fn test_teardown_cancels_pending_commit() {
        let (host, instance) = setup();
        let value = use_debounced_state(&instance, 1, Duration::from_millis(10));

        value.debounced_set_state(2);
        instance.unmount();
        assert_eq!(host.pending_timers(), 0);

        value.debounced_set_state(3);
        host.advance(Duration::from_millis(100));
        assert_eq!(value.state(), 1);
    }

    #[test]
    fn test_flush_and_cancel() {
        let (host, instance) = setup();
        let value = use_debounced_state(&instance, 0, Duration::from_millis(10));

        value.debounced_set_state(5);
        assert!(value.flush());
        assert_eq!(value.state(), 5);
        assert!(!value.flush());

        value.debounced_set_state(6);
        assert!(value.cancel());
        host.advance(Duration::from_millis(10));
        assert_eq!(value.state(), 5);
    }
}
