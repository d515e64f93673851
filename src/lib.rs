//! # reblend-hooks
//!
//! Lifecycle-bound hooks for component instances.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! fine-grained reactivity: debounced state and callback refs live in signals,
//! so effects reading them re-run on change.
//!
//! ## Architecture
//!
//! A component is an [`Instance`] mounted in a thread-local registry. Hooks
//! take the instance explicitly, schedule work through the instance's
//! [`Host`](platform::Host), and register a disposer with
//! [`Instance::on_destroy`]. Unmounting tears hooks down children first:
//!
//! ```text
//! mount_instance() → use_*(&instance) → host timers/frames/observers
//!                                                │
//! unmount_instance() → destroy callbacks ────────┘ cancel / disconnect
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - Instances, the registry, parent context
//! - [`hooks`] - The hooks themselves
//! - [`platform`] - Host traits, geometry, and the deterministic [`EventLoop`]
//! - [`error`] - [`HookError`]

pub mod engine;
pub mod error;
pub mod hooks;
pub mod platform;

pub use error::{HookError, Result};

pub use engine::{
    get_current_parent_index, get_index, get_instance, get_mounted_count, get_mounted_indices,
    is_mounted_index, mount_instance, pop_parent_context, push_parent_context, reset_registry,
    unmount_instance, with_parent, Cleanup, Instance, WeakInstance,
};

pub use hooks::{
    get_position, merge_refs, use_animation_frame, use_callback_ref, use_debounced_state,
    use_effect_with_deps, use_interval, use_merged_refs, use_mounted, use_timeout, use_waypoint,
    AnimationFrame, CallbackRef, DebouncedState, DepsEffect, Interval, MergedRef, MountedQuery,
    MutableRef, Position, RefSink, ScrollDirection, Threshold, Timeout, Update, Waypoint,
    WaypointEvent, WaypointOptions,
};

pub use platform::{
    ElementId, EventLoop, FrameHost, FrameId, Host, IntersectionEntry, IntersectionHost,
    ObserverId, ObserverInit, Rect, RootMargin, TimerHost, TimerId,
};
