//! Timeout and interval hooks.
//!
//! Both wrap [`TimerHost::set_timeout`](crate::platform::TimerHost::set_timeout)
//! and cancel on teardown. An interval is a chain of one-shot timeouts, each
//! re-armed before the callback runs, so the callback may call
//! [`Interval::stop`] to end the chain.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use crate::engine::{Instance, WeakInstance};
use crate::error::{HookError, Result};
use crate::platform::{Host, TimerId};

// =============================================================================
// Timeout
// =============================================================================

struct TimeoutState {
    pending: Cell<Option<TimerId>>,
    torn_down: Cell<bool>,
    host: Rc<dyn Host>,
    owner: WeakInstance,
}

impl TimeoutState {
    fn clear(&self) -> bool {
        match self.pending.take() {
            Some(id) => {
                self.host.clear_timeout(id);
                trace!(timer = %id, "timeout cleared");
                true
            }
            None => false,
        }
    }
}

/// Handle returned by [`use_timeout`]. At most one timeout pending.
#[derive(Clone)]
pub struct Timeout {
    state: Rc<TimeoutState>,
}

pub fn use_timeout(instance: &Instance) -> Timeout {
    let state = Rc::new(TimeoutState {
        pending: Cell::new(None),
        torn_down: Cell::new(false),
        host: instance.host().clone(),
        owner: instance.downgrade(),
    });

    let teardown = state.clone();
    instance.on_destroy(move || {
        teardown.torn_down.set(true);
        teardown.clear();
    });

    Timeout { state }
}

impl Timeout {
    /// Run `callback` after `delay`, replacing any pending timeout.
    ///
    /// Ignored after teardown.
    pub fn set<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + 'static,
    {
        let state = &self.state;
        if state.torn_down.get() || !state.owner.is_alive() {
            trace!("timeout set after teardown, ignored");
            return;
        }
        state.clear();

        let weak = Rc::downgrade(state);
        let id = state.host.set_timeout(
            delay,
            Box::new(move || {
                let Some(state) = weak.upgrade() else {
                    return;
                };
                state.pending.set(None);
                if !state.torn_down.get() && state.owner.is_alive() {
                    callback();
                }
            }),
        );
        state.pending.set(Some(id));
    }

    pub fn clear(&self) -> bool {
        self.state.clear()
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.get().is_some()
    }
}

// =============================================================================
// Interval
// =============================================================================

struct IntervalState {
    period: Duration,
    callback: RefCell<Box<dyn FnMut()>>,
    timer: Cell<Option<TimerId>>,
    torn_down: Cell<bool>,
    host: Rc<dyn Host>,
    owner: WeakInstance,
}

/// Handle returned by [`use_interval`].
#[derive(Clone)]
pub struct Interval {
    state: Rc<IntervalState>,
}

/// Call `callback` every `period` until stopped or torn down.
///
/// The interval starts running immediately.
///
/// # Errors
///
/// [`HookError::ZeroInterval`] when `period` is zero.
pub fn use_interval<F>(instance: &Instance, period: Duration, callback: F) -> Result<Interval>
where
    F: FnMut() + 'static,
{
    if period.is_zero() {
        return Err(HookError::ZeroInterval);
    }

    let state = Rc::new(IntervalState {
        period,
        callback: RefCell::new(Box::new(callback)),
        timer: Cell::new(None),
        torn_down: Cell::new(false),
        host: instance.host().clone(),
        owner: instance.downgrade(),
    });

    let teardown = state.clone();
    instance.on_destroy(move || {
        teardown.torn_down.set(true);
        stop_interval(&teardown);
    });

    let interval = Interval { state };
    interval.start();
    Ok(interval)
}

impl Interval {
    /// Resume ticking. A no-op while running or after teardown.
    pub fn start(&self) {
        let state = &self.state;
        if state.torn_down.get() || !state.owner.is_alive() || state.timer.get().is_some() {
            return;
        }
        debug!(period = ?state.period, "interval started");
        arm(state);
    }

    pub fn stop(&self) {
        stop_interval(&self.state);
    }

    pub fn is_running(&self) -> bool {
        self.state.timer.get().is_some()
    }

    pub fn period(&self) -> Duration {
        self.state.period
    }
}

fn arm(state: &Rc<IntervalState>) {
    let weak: Weak<IntervalState> = Rc::downgrade(state);
    let id = state.host.set_timeout(state.period, Box::new(move || fire(&weak)));
    state.timer.set(Some(id));
}

fn fire(weak: &Weak<IntervalState>) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    state.timer.set(None);
    if state.torn_down.get() || !state.owner.is_alive() {
        return;
    }

    arm(&state);

    // A callback that re-enters this interval while it runs is skipped.
    let Ok(mut callback) = state.callback.try_borrow_mut() else {
        return;
    };
    (*callback)();
}

fn stop_interval(state: &IntervalState) {
    if let Some(id) = state.timer.take() {
        state.host.clear_timeout(id);
        debug!(timer = %id, "interval stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{mount_instance, reset_registry};
    use crate::platform::EventLoop;

    fn setup() -> (Rc<EventLoop>, Instance) {
        reset_registry();
        let host = Rc::new(EventLoop::new());
        let instance = mount_instance(None, host.clone());
        (host, instance)
    }

    #[test]
    fn test_timeout_fires_once() {
        let (host, instance) = setup();
        let timeout = use_timeout(&instance);
        let count = Rc::new(Cell::new(0));

        let count_clone = count.clone();
        timeout.set(Duration::from_millis(10), move || count_clone.set(count_clone.get() + 1));
        assert!(timeout.is_pending());

        host.advance(Duration::from_millis(50));
        assert_eq!(count.get(), 1);
        assert!(!timeout.is_pending());
    }

    #[test]
    fn test_timeout_set_replaces_pending() {
        let (host, instance) = setup();
        let timeout = use_timeout(&instance);
        let log = Rc::new(RefCell::new(Vec::new()));

        let log_clone = log.clone();
        timeout.set(Duration::from_millis(10), move || log_clone.borrow_mut().push("a"));
        let log_clone = log.clone();
        timeout.set(Duration::from_millis(20), move || log_clone.borrow_mut().push("b"));

        host.advance(Duration::from_millis(30));
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn test_timeout_cleared_on_teardown() {
        let (host, instance) = setup();
        let timeout = use_timeout(&instance);
        let fired = Rc::new(Cell::new(false));

        let fired_clone = fired.clone();
        timeout.set(Duration::from_millis(10), move || fired_clone.set(true));
        instance.unmount();

        assert_eq!(host.pending_timers(), 0);
        host.advance(Duration::from_millis(10));
        assert!(!fired.get());
        assert!(!timeout.clear());
    }

    #[test]
    fn test_interval_ticks_each_period() {
        let (host, instance) = setup();
        let count = Rc::new(Cell::new(0));

        let count_clone = count.clone();
        let interval = use_interval(&instance, Duration::from_millis(100), move || {
            count_clone.set(count_clone.get() + 1);
        })
        .unwrap();

        host.advance(Duration::from_millis(350));
        assert_eq!(count.get(), 3);
        assert!(interval.is_running());
    }

    #[test]
    fn test_interval_stop_and_restart() {
        let (host, instance) = setup();
        let count = Rc::new(Cell::new(0));

        let count_clone = count.clone();
        let interval = use_interval(&instance, Duration::from_millis(10), move || {
            count_clone.set(count_clone.get() + 1);
        })
        .unwrap();

        host.advance(Duration::from_millis(10));
        interval.stop();
        host.advance(Duration::from_millis(100));
        assert_eq!(count.get(), 1);

        interval.start();
        interval.start();
        host.advance(Duration::from_millis(10));
        assert_eq!(count.get(), 2);
        assert_eq!(host.pending_timers(), 1);
    }

    #[test]
    fn test_interval_stopped_from_callback() {
        let (host, instance) = setup();
        let handle: Rc<RefCell<Option<Interval>>> = Rc::new(RefCell::new(None));
        let count = Rc::new(Cell::new(0));

        let handle_clone = handle.clone();
        let count_clone = count.clone();
        let interval = use_interval(&instance, Duration::from_millis(5), move || {
            count_clone.set(count_clone.get() + 1);
            if count_clone.get() == 2 {
                if let Some(interval) = handle_clone.borrow().as_ref() {
                    interval.stop();
                }
            }
        })
        .unwrap();
        *handle.borrow_mut() = Some(interval.clone());

        host.advance(Duration::from_millis(100));
        assert_eq!(count.get(), 2);
        assert!(!interval.is_running());

        // Break the handle cycle
        handle.borrow_mut().take();
    }

    #[test]
    fn test_zero_interval_rejected() {
        let (_host, instance) = setup();
        let result = use_interval(&instance, Duration::ZERO, || {});
        assert_eq!(result.err(), Some(HookError::ZeroInterval));
    }

    #[test]
    fn test_interval_never_fires_after_teardown() {
        let (host, instance) = setup();
        let count = Rc::new(Cell::new(0));

        let count_clone = count.clone();
        let interval = use_interval(&instance, Duration::from_millis(10), move || {
            count_clone.set(count_clone.get() + 1);
        })
        .unwrap();

        instance.unmount();
        interval.start();
        host.advance(Duration::from_millis(100));

        assert_eq!(count.get(), 0);
        assert!(!interval.is_running());
        assert_eq!(host.pending_timers(), 0);
    }
}
