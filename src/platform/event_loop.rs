//! EventLoop - Deterministic single-threaded host.
//!
//! Time is virtual: nothing happens until the owner drives the loop.
//!
//! - [`EventLoop::advance`] moves the clock forward, firing due timeouts in
//!   deadline order (FIFO for equal deadlines)
//! - [`EventLoop::tick`] fires zero-delay timeouts
//! - [`EventLoop::run_frame`] runs queued animation-frame callbacks, then
//!   intersection checks
//!
//! Intersection observation is geometry driven. Lay elements out with
//! [`EventLoop::set_element_rect`], move the viewport with
//! [`EventLoop::scroll_to`], and the next frame delivers an entry to every
//! observer whose crossed threshold changed. [`EventLoop::deliver_entries`]
//! pushes hand-made entries for tests that don't care about geometry.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use std::time::Duration;
//! use reblend_hooks::platform::{EventLoop, TimerHost};
//!
//! let host = Rc::new(EventLoop::new());
//! host.set_timeout(Duration::from_millis(100), Box::new(|| println!("tick")));
//!
//! host.advance(Duration::from_millis(99)); // nothing yet
//! host.advance(Duration::from_millis(1));  // prints "tick"
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::trace;

use super::{
    ElementId, FrameCallback, FrameHost, FrameId, IntersectionCallback, IntersectionEntry,
    IntersectionHost, ObserverId, ObserverInit, Rect, TimerCallback, TimerHost, TimerId,
};

// =============================================================================
// Internal State
// =============================================================================

struct ObserverRecord {
    target: ElementId,
    init: ObserverInit,
    callback: IntersectionCallback,
    /// (threshold index, is_intersecting) of the last delivered entry.
    /// `None` until the first check, which always delivers.
    last: Option<(usize, bool)>,
}

struct LoopState {
    now: Duration,
    next_handle: u64,
    /// Keyed by (deadline, handle) so equal deadlines fire in request order.
    timers: BTreeMap<(Duration, u64), TimerCallback>,
    timer_deadlines: HashMap<u64, Duration>,
    /// Keyed by handle, which is request order.
    frames: BTreeMap<u64, FrameCallback>,
    frame_count: u64,
    observers: BTreeMap<u64, ObserverRecord>,
    viewport: Rect,
    elements: HashMap<ElementId, Rect>,
}

impl LoopState {
    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

/// Default viewport size for a fresh loop.
pub const DEFAULT_VIEWPORT: Rect = Rect {
    left: 0.0,
    top: 0.0,
    width: 1024.0,
    height: 768.0,
};

// =============================================================================
// EventLoop
// =============================================================================

/// Virtual-time implementation of [`Host`](super::Host).
///
/// Interior mutability throughout: hooks hold it as `Rc<dyn Host>` and the
/// owner drives it through a shared reference. Callbacks always run with no
/// internal borrow held, so they may schedule or cancel freely.
pub struct EventLoop {
    state: RefCell<LoopState>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::with_viewport(DEFAULT_VIEWPORT)
    }

    pub fn with_viewport(viewport: Rect) -> Self {
        Self {
            state: RefCell::new(LoopState {
                now: Duration::ZERO,
                next_handle: 1,
                timers: BTreeMap::new(),
                timer_deadlines: HashMap::new(),
                frames: BTreeMap::new(),
                frame_count: 0,
                observers: BTreeMap::new(),
                viewport,
                elements: HashMap::new(),
            }),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Current virtual time in milliseconds (frame/entry timestamp format).
    pub fn now_ms(&self) -> f64 {
        self.now().as_secs_f64() * 1000.0
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Move the clock forward by `by`, firing every timeout that comes due.
    ///
    /// Timeouts scheduled by a callback fire in the same call if their
    /// deadline falls inside the window. Returns how many fired.
    pub fn advance(&self, by: Duration) -> usize {
        let until = self.now() + by;
        let fired = self.fire_timers_until(until);
        self.state.borrow_mut().now = until;
        fired
    }

    /// Fire zero-delay timeouts without moving the clock.
    pub fn tick(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Fire every timeout queued right now, moving the clock to the last
    /// deadline. Timeouts re-armed beyond that deadline stay queued, so
    /// intervals cannot spin this forever.
    pub fn run_until_idle(&self) -> usize {
        let last = {
            let state = self.state.borrow();
            state.timers.last_key_value().map(|(&(deadline, _), _)| deadline)
        };
        match last {
            Some(deadline) => {
                let fired = self.fire_timers_until(deadline);
                let mut state = self.state.borrow_mut();
                state.now = state.now.max(deadline);
                fired
            }
            None => 0,
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    fn fire_timers_until(&self, until: Duration) -> usize {
        let mut fired = 0;
        while let Some(callback) = self.pop_due_timer(until) {
            callback();
            fired += 1;
        }
        fired
    }

    fn pop_due_timer(&self, until: Duration) -> Option<TimerCallback> {
        let mut state = self.state.borrow_mut();
        let (&(deadline, handle), _) = state.timers.first_key_value()?;
        if deadline > until {
            return None;
        }
        let callback = state.timers.remove(&(deadline, handle))?;
        state.timer_deadlines.remove(&handle);
        state.now = state.now.max(deadline);
        trace!(timer = handle, ?deadline, "timeout fired");
        Some(callback)
    }

    // -------------------------------------------------------------------------
    // Frames
    // -------------------------------------------------------------------------

    /// Run one animation frame.
    ///
    /// Only callbacks queued before the frame started run; callbacks they
    /// request wait for the next frame. A callback cancelled by an earlier
    /// callback in the same frame is skipped. Intersection checks run after
    /// the callbacks. Returns how many frame callbacks ran.
    pub fn run_frame(&self) -> usize {
        let (batch, timestamp) = {
            let mut state = self.state.borrow_mut();
            state.frame_count += 1;
            let batch: Vec<u64> = state.frames.keys().copied().collect();
            (batch, state.now.as_secs_f64() * 1000.0)
        };

        let mut ran = 0;
        for handle in batch {
            let callback = self.state.borrow_mut().frames.remove(&handle);
            if let Some(callback) = callback {
                callback(timestamp);
                ran += 1;
            }
        }

        self.check_intersections();
        ran
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// Frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.state.borrow().frame_count
    }

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    pub fn viewport(&self) -> Rect {
        self.state.borrow().viewport
    }

    pub fn set_viewport(&self, viewport: Rect) {
        self.state.borrow_mut().viewport = viewport;
    }

    /// Move the viewport's top-left corner, keeping its size.
    pub fn scroll_to(&self, left: f64, top: f64) {
        let mut state = self.state.borrow_mut();
        state.viewport = Rect::new(left, top, state.viewport.width, state.viewport.height);
    }

    pub fn set_element_rect(&self, element: ElementId, rect: Rect) {
        self.state.borrow_mut().elements.insert(element, rect);
    }

    /// Forget an element's layout. Observers of it are skipped until it is
    /// laid out again.
    pub fn remove_element(&self, element: ElementId) {
        self.state.borrow_mut().elements.remove(&element);
    }

    pub fn element_rect(&self, element: ElementId) -> Option<Rect> {
        self.state.borrow().elements.get(&element).copied()
    }

    // -------------------------------------------------------------------------
    // Intersection
    // -------------------------------------------------------------------------

    /// Active observers, across all targets.
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Active observers watching `target`.
    pub fn observers_of(&self, target: ElementId) -> usize {
        self.state
            .borrow()
            .observers
            .values()
            .filter(|record| record.target == target)
            .count()
    }

    /// Hand entries straight to the observers of each entry's target,
    /// bypassing geometry. Returns how many observer callbacks ran.
    pub fn deliver_entries(&self, entries: &[IntersectionEntry]) -> usize {
        let deliveries: Vec<(u64, IntersectionCallback, Vec<IntersectionEntry>)> = {
            let state = self.state.borrow();
            state
                .observers
                .iter()
                .filter_map(|(&handle, record)| {
                    let matching: Vec<IntersectionEntry> = entries
                        .iter()
                        .filter(|entry| entry.target == record.target)
                        .cloned()
                        .collect();
                    (!matching.is_empty()).then(|| (handle, record.callback.clone(), matching))
                })
                .collect()
        };

        let mut count = 0;
        for (handle, callback, batch) in deliveries {
            if self.is_observing(handle) {
                callback(batch.as_slice());
                count += 1;
            }
        }
        count
    }

    /// Compute entries for every observer and deliver the ones whose crossed
    /// threshold changed since their last delivery.
    fn check_intersections(&self) {
        let deliveries: Vec<(u64, IntersectionCallback, IntersectionEntry)> = {
            let mut state = self.state.borrow_mut();
            let time = state.now.as_secs_f64() * 1000.0;
            let LoopState {
                observers,
                elements,
                viewport,
                ..
            } = &mut *state;

            let mut deliveries = Vec::new();
            for (&handle, record) in observers.iter_mut() {
                let Some(&target_rect) = elements.get(&record.target) else {
                    continue;
                };
                let root_rect = match record.init.root {
                    Some(root) => match elements.get(&root) {
                        Some(&rect) => rect,
                        None => continue,
                    },
                    None => *viewport,
                };

                let entry = compute_entry(record.target, target_rect, root_rect, &record.init, time);
                let state_key = (
                    threshold_index(&record.init.thresholds, entry.intersection_ratio),
                    entry.is_intersecting,
                );
                if record.last == Some(state_key) {
                    continue;
                }
                record.last = Some(state_key);
                trace!(
                    observer = handle,
                    target = %record.target,
                    intersecting = entry.is_intersecting,
                    ratio = entry.intersection_ratio,
                    "intersection changed"
                );
                deliveries.push((handle, record.callback.clone(), entry));
            }
            deliveries
        };

        for (handle, callback, entry) in deliveries {
            // An earlier callback in this batch may have disconnected it.
            if self.is_observing(handle) {
                callback(std::slice::from_ref(&entry));
            }
        }
    }

    fn is_observing(&self, handle: u64) -> bool {
        self.state.borrow().observers.contains_key(&handle)
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Host Implementations
// =============================================================================

impl TimerHost for EventLoop {
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let mut state = self.state.borrow_mut();
        let handle = state.next_handle();
        let deadline = state.now + delay;
        state.timers.insert((deadline, handle), callback);
        state.timer_deadlines.insert(handle, deadline);
        TimerId(handle)
    }

    fn clear_timeout(&self, id: TimerId) {
        let mut state = self.state.borrow_mut();
        if let Some(deadline) = state.timer_deadlines.remove(&id.0) {
            state.timers.remove(&(deadline, id.0));
        }
    }
}

impl FrameHost for EventLoop {
    fn request_animation_frame(&self, callback: FrameCallback) -> FrameId {
        let mut state = self.state.borrow_mut();
        let handle = state.next_handle();
        state.frames.insert(handle, callback);
        FrameId(handle)
    }

    fn cancel_animation_frame(&self, id: FrameId) {
        self.state.borrow_mut().frames.remove(&id.0);
    }
}

impl IntersectionHost for EventLoop {
    fn observe(
        &self,
        target: ElementId,
        init: ObserverInit,
        callback: IntersectionCallback,
    ) -> ObserverId {
        let mut state = self.state.borrow_mut();
        let handle = state.next_handle();
        state.observers.insert(
            handle,
            ObserverRecord {
                target,
                init,
                callback,
                last: None,
            },
        );
        ObserverId(handle)
    }

    fn disconnect(&self, id: ObserverId) {
        self.state.borrow_mut().observers.remove(&id.0);
    }
}

// =============================================================================
// Intersection Math
// =============================================================================

fn compute_entry(
    target: ElementId,
    target_rect: Rect,
    root_rect: Rect,
    init: &ObserverInit,
    time: f64,
) -> IntersectionEntry {
    let root_bounds = root_rect.expand(&init.root_margin);
    let overlap = target_rect.intersection(&root_bounds);
    let is_intersecting = overlap.is_some();

    let target_area = target_rect.area();
    let intersection_ratio = match overlap {
        Some(rect) if target_area > 0.0 => (rect.area() / target_area).min(1.0),
        Some(_) => 1.0,
        None => 0.0,
    };

    IntersectionEntry {
        target,
        time,
        is_intersecting,
        intersection_ratio,
        bounding_client_rect: target_rect,
        intersection_rect: overlap.unwrap_or_default(),
        root_bounds: Some(root_bounds),
    }
}

/// Index of the first threshold strictly greater than `ratio`, or the
/// threshold count when `ratio` reaches the last one.
fn threshold_index(thresholds: &[f64], ratio: f64) -> usize {
    if thresholds.is_empty() {
        return usize::from(ratio >= 0.0);
    }
    thresholds
        .iter()
        .position(|&threshold| threshold > ratio)
        .unwrap_or(thresholds.len())
}
