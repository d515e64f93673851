//! Waypoint - reports where an element sits relative to a scroll root.
//!
//! The hook observes one element through the host's
//! [`IntersectionHost`](crate::platform::IntersectionHost) and turns raw
//! entries into a [`Position`]. The callback only runs when the position
//! changes:
//!
//! ```text
//!            ┌──────────┐
//!   Above    │          │   element fully before the root's start edge
//!            ├──────────┤
//!   Inside   │   root   │   any intersection (edges touching count)
//!            ├──────────┤
//!   Below    │          │   element fully past the root's end edge
//!            └──────────┘
//! ```
//!
//! With [`ScrollDirection::Horizontal`] the same test runs on the left and
//! right edges, yielding [`Position::Left`] and [`Position::Right`].
//!
//! # Example
//!
//! ```ignore
//! let waypoint = use_waypoint(
//!     &instance,
//!     Some(element),
//!     |event| println!("{:?} -> {:?}", event.previous_position, event.position),
//!     WaypointOptions::default().with_root_margin("0px 0px 100px"),
//! )?;
//!
//! // Element or options changed: the old observer is disconnected first.
//! waypoint.update(Some(other_element), WaypointOptions::default())?;
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::engine::{Cleanup, Instance, WeakInstance};
use crate::error::{HookError, Result};
use crate::hooks::effect::{use_effect_with_deps, DepsEffect};
use crate::platform::{
    ElementId, Host, IntersectionEntry, ObserverId, ObserverInit, RootMargin,
};

// =============================================================================
// Types
// =============================================================================

/// Element position relative to the root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Position {
    /// The host reported no root bounds.
    Unknown,
    Inside,
    Above,
    Below,
    Left,
    Right,
}

/// Axis the root scrolls along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    #[default]
    Vertical,
    Horizontal,
}

/// Visible-ratio threshold(s) at which the host re-reports.
#[derive(Clone, Debug, PartialEq)]
pub enum Threshold {
    Single(f64),
    Multiple(Vec<f64>),
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::Single(0.0)
    }
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Threshold::Single(value)
    }
}

impl From<Vec<f64>> for Threshold {
    fn from(values: Vec<f64>) -> Self {
        Threshold::Multiple(values)
    }
}

impl Threshold {
    /// Validated thresholds, sorted ascending without duplicates.
    ///
    /// # Errors
    ///
    /// [`HookError::InvalidThreshold`] for any value outside `[0, 1]` (NaN
    /// included).
    pub fn to_sorted(&self) -> Result<Vec<f64>> {
        let mut values = match self {
            Threshold::Single(value) => vec![*value],
            Threshold::Multiple(values) => values.clone(),
        };
        if let Some(bad) = values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(HookError::InvalidThreshold(*bad));
        }
        values.sort_by(f64::total_cmp);
        values.dedup();
        Ok(values)
    }
}

/// Waypoint configuration.
///
/// ```ignore
/// let options = WaypointOptions {
///     threshold: Threshold::Multiple(vec![0.0, 0.5, 1.0]),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WaypointOptions {
    pub threshold: Threshold,
    /// Scroll container. `None` is the viewport.
    pub root: Option<ElementId>,
    /// CSS-style margin, e.g. `"0px 0px 100px"`.
    pub root_margin: String,
    pub scroll_direction: ScrollDirection,
}

impl WaypointOptions {
    pub fn with_threshold(mut self, threshold: impl Into<Threshold>) -> Self {
        self.threshold = threshold.into();
        self
    }

    pub fn with_root(mut self, root: ElementId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_root_margin(mut self, root_margin: impl Into<String>) -> Self {
        self.root_margin = root_margin.into();
        self
    }

    pub fn with_scroll_direction(mut self, scroll_direction: ScrollDirection) -> Self {
        self.scroll_direction = scroll_direction;
        self
    }

    /// Validate and convert to the host's observer configuration.
    pub fn to_observer_init(&self) -> Result<ObserverInit> {
        Ok(ObserverInit {
            root: self.root,
            root_margin: RootMargin::parse(&self.root_margin)?,
            thresholds: self.threshold.to_sorted()?,
        })
    }
}

/// Delivered to the position callback on every transition.
#[derive(Clone, Debug, PartialEq)]
pub struct WaypointEvent {
    pub position: Position,
    /// `None` on the first report.
    pub previous_position: Option<Position>,
    pub entry: IntersectionEntry,
}

/// Classify an entry along `direction`.
pub fn get_position(entry: &IntersectionEntry, direction: ScrollDirection) -> Position {
    if entry.is_intersecting {
        return Position::Inside;
    }
    let Some(root) = entry.root_bounds else {
        return Position::Unknown;
    };
    let rect = &entry.bounding_client_rect;

    let (start, end, child_start, child_end, before, after) = match direction {
        ScrollDirection::Vertical => (
            root.top,
            root.bottom(),
            rect.top,
            rect.bottom(),
            Position::Above,
            Position::Below,
        ),
        ScrollDirection::Horizontal => (
            root.left,
            root.right(),
            rect.left,
            rect.right(),
            Position::Left,
            Position::Right,
        ),
    };

    if child_start < start && child_end <= start {
        before
    } else if child_start >= end && child_end > end {
        after
    } else {
        Position::Unknown
    }
}

// =============================================================================
// Waypoint
// =============================================================================

type PositionCallback = Rc<dyn Fn(&WaypointEvent)>;

struct WaypointShared {
    callback: RefCell<PositionCallback>,
    previous: Cell<Option<Position>>,
    direction: Cell<ScrollDirection>,
    /// Element of the last setup run, `None` while unavailable.
    element: Cell<Option<ElementId>>,
    observer: Cell<Option<ObserverId>>,
    host: Rc<dyn Host>,
    owner: WeakInstance,
}

impl WaypointShared {
    /// Entries from an observer other than the current one are stale.
    fn handle_entries(&self, observer: ObserverId, entries: &[IntersectionEntry]) {
        for entry in entries {
            if !self.owner.is_alive() || self.observer.get() != Some(observer) {
                return;
            }
            let position = get_position(entry, self.direction.get());
            let previous = self.previous.get();
            if previous == Some(position) {
                continue;
            }
            self.previous.set(Some(position));

            let event = WaypointEvent {
                position,
                previous_position: previous,
                entry: entry.clone(),
            };
            let callback = self.callback.borrow().clone();
            callback(&event);
        }
    }
}

type WaypointDeps = (Option<ElementId>, WaypointOptions);

/// Handle returned by [`use_waypoint`].
pub struct Waypoint {
    effect: DepsEffect<WaypointDeps>,
    shared: Rc<WaypointShared>,
}

/// Watch `element` and report position transitions to `on_position_change`.
///
/// `element: None` means the element is not available yet; nothing is
/// observed until [`Waypoint::update`] supplies one.
///
/// # Errors
///
/// [`HookError::InvalidThreshold`] or [`HookError::InvalidRootMargin`] when
/// `options` do not validate. Nothing is observed in that case.
pub fn use_waypoint<F>(
    instance: &Instance,
    element: Option<ElementId>,
    on_position_change: F,
    options: WaypointOptions,
) -> Result<Waypoint>
where
    F: Fn(&WaypointEvent) + 'static,
{
    let init = options.to_observer_init()?;

    let shared = Rc::new(WaypointShared {
        callback: RefCell::new(Rc::new(on_position_change)),
        previous: Cell::new(None),
        direction: Cell::new(options.scroll_direction),
        element: Cell::new(element),
        observer: Cell::new(None),
        host: instance.host().clone(),
        owner: instance.downgrade(),
    });

    let setup = observe_setup(shared.clone(), init, options.scroll_direction);
    let effect = use_effect_with_deps(instance, (element, options), setup);

    Ok(Waypoint { effect, shared })
}

impl Waypoint {
    /// Re-observe if `element` or `options` changed by value.
    ///
    /// Returns whether the observation was re-created.
    pub fn update(&self, element: Option<ElementId>, options: WaypointOptions) -> Result<bool> {
        let init = options.to_observer_init()?;
        let direction = options.scroll_direction;
        let setup = observe_setup(self.shared.clone(), init, direction);
        Ok(self.effect.update((element, options), setup))
    }

    /// Swap the callback without re-observing.
    pub fn set_on_position_change<F>(&self, on_position_change: F)
    where
        F: Fn(&WaypointEvent) + 'static,
    {
        *self.shared.callback.borrow_mut() = Rc::new(on_position_change);
    }

    pub fn is_observing(&self) -> bool {
        self.shared.observer.get().is_some()
    }

    /// Last reported position.
    pub fn position(&self) -> Option<Position> {
        self.shared.previous.get()
    }
}

fn observe_setup(
    shared: Rc<WaypointShared>,
    init: ObserverInit,
    direction: ScrollDirection,
) -> impl FnOnce(&WaypointDeps) -> Option<Cleanup> {
    move |(element, _options): &WaypointDeps| {
        // A different element starts a fresh position history.
        if shared.element.replace(*element) != *element {
            shared.previous.set(None);
        }
        let element = (*element)?;
        shared.direction.set(direction);

        let weak: Weak<WaypointShared> = Rc::downgrade(&shared);
        let slot: Rc<Cell<Option<ObserverId>>> = Rc::new(Cell::new(None));
        let delivered_to = slot.clone();
        let id = shared.host.observe(
            element,
            init,
            Rc::new(move |entries: &[IntersectionEntry]| {
                if let (Some(shared), Some(id)) = (weak.upgrade(), delivered_to.get()) {
                    shared.handle_entries(id, entries);
                }
            }),
        );
        slot.set(Some(id));
        shared.observer.set(Some(id));
        debug!(observer = %id, element = %element, "waypoint observing");

        let weak = Rc::downgrade(&shared);
        Some(Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if let Some(id) = shared.observer.take() {
                shared.host.disconnect(id);
                debug!(observer = %id, "waypoint disconnected");
            }
        }) as Cleanup)
    }
}
