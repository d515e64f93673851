//! Hooks - Lifecycle-bound helpers for component instances.
//!
//! Every hook takes the owning [`Instance`](crate::engine::Instance)
//! explicitly and registers its teardown with
//! [`Instance::on_destroy`](crate::engine::Instance::on_destroy):
//! - [`use_mounted`] - query whether the instance is still attached
//! - [`merge_refs`] / [`use_merged_refs`] - fan one element out to many refs
//! - [`use_callback_ref`] - an element ref stored in a signal
//! - [`use_animation_frame`] - frame callbacks cancelled on teardown
//! - [`use_debounced_state`] - state that commits after a quiet period
//! - [`use_waypoint`] - element position relative to a scroll root
//! - [`use_timeout`] / [`use_interval`] - timers cancelled on teardown
//! - [`use_effect_with_deps`] - setup/disposer slot the others build on
//!
//! # Teardown
//!
//! Hooks hold only a weak reference to their instance. After teardown no
//! scheduled callback runs, and new requests are ignored:
//!
//! ```ignore
//! let frame = use_animation_frame(&instance);
//! frame.request(|ts| draw(ts));
//!
//! instance.unmount();   // pending frame cancelled
//! frame.request(|_| {}); // ignored
//! ```

mod animation_frame;
mod debounced_state;
mod effect;
mod mounted;
mod refs;
mod timers;
mod waypoint;

pub use animation_frame::{use_animation_frame, AnimationFrame};
pub use debounced_state::{use_debounced_state, DebouncedState, Update};
pub use effect::{use_effect_with_deps, DepsEffect};
pub use mounted::{use_mounted, MountedQuery};
pub use refs::{
    merge_refs, use_callback_ref, use_merged_refs, CallbackRef, MergedRef, MutableRef, RefSink,
};
pub use timers::{use_interval, use_timeout, Interval, Timeout};
pub use waypoint::{
    get_position, use_waypoint, Position, ScrollDirection, Threshold, Waypoint, WaypointEvent,
    WaypointOptions,
};
