//! Host primitives - timers, animation frames, intersection observation.
//!
//! Hooks never talk to a browser or terminal directly. They schedule work
//! through the traits in this module, implemented by whatever owns time:
//!
//! - [`TimerHost`] - one-shot timeouts
//! - [`FrameHost`] - animation-frame callbacks
//! - [`IntersectionHost`] - element visibility observation
//!
//! [`Host`] bundles all three and is what a component instance carries.
//! [`EventLoop`] is the deterministic single-threaded implementation shipped
//! with the crate.
//!
//! Host methods never return errors. A host that cannot schedule should
//! panic; the panic propagates to whoever drove the host.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

mod event_loop;
mod geometry;

pub use event_loop::{DEFAULT_VIEWPORT, EventLoop};
pub use geometry::{Length, Rect, RootMargin};

// =============================================================================
// Handles
// =============================================================================

macro_rules! handle_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle_id!(
    /// Pending timeout handle.
    TimerId
);
handle_id!(
    /// Pending animation-frame handle.
    FrameId
);
handle_id!(
    /// Active intersection observer handle.
    ObserverId
);
handle_id!(
    /// Host-side element identity (a DOM node, a layout box, ...).
    ElementId
);

// =============================================================================
// Callback Types
// =============================================================================

pub type TimerCallback = Box<dyn FnOnce()>;

/// Receives the frame timestamp in milliseconds.
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Receives every entry delivered in one batch.
pub type IntersectionCallback = Rc<dyn Fn(&[IntersectionEntry])>;

// =============================================================================
// Intersection Types
// =============================================================================

/// Observer configuration handed to the host.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObserverInit {
    /// `None` observes against the viewport.
    pub root: Option<ElementId>,
    pub root_margin: RootMargin,
    /// Sorted ascending, each in `[0, 1]`. Empty means `[0.0]`.
    pub thresholds: Vec<f64>,
}

/// One intersection observation record.
#[derive(Clone, Debug, PartialEq)]
pub struct IntersectionEntry {
    pub target: ElementId,
    /// Host time in milliseconds.
    pub time: f64,
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
    pub bounding_client_rect: Rect,
    pub intersection_rect: Rect,
    /// `None` when the host cannot report root bounds.
    pub root_bounds: Option<Rect>,
}

// =============================================================================
// Host Traits
// =============================================================================

pub trait TimerHost {
    fn set_timeout(&self, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Unknown or already-fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);
}

pub trait FrameHost {
    fn request_animation_frame(&self, callback: FrameCallback) -> FrameId;

    /// Unknown or already-fired ids are ignored.
    fn cancel_animation_frame(&self, id: FrameId);
}

pub trait IntersectionHost {
    fn observe(
        &self,
        target: ElementId,
        init: ObserverInit,
        callback: IntersectionCallback,
    ) -> ObserverId;

    /// Unknown ids are ignored.
    fn disconnect(&self, id: ObserverId);
}

/// Everything a component instance needs from its host.
pub trait Host: TimerHost + FrameHost + IntersectionHost {}

impl<T> Host for T where T: TimerHost + FrameHost + IntersectionHost + ?Sized {}
