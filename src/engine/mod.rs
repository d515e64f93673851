//! Hook Engine - Component instances and their registry.
//!
//! The engine manages:
//! - Instance: mount flag, destroy callbacks, host handle
//! - Registry: index allocation, ID mapping, parent context, recursive unmount
//!
//! # Lifecycle
//!
//! ```text
//! mount_instance() ──► hooks register on_destroy() ──► unmount_instance()
//!                                                        │
//!                          children first ◄──────────────┤
//!                          mount flag = false ◄──────────┤
//!                          destroy callbacks (in order) ◄┘
//! ```

mod instance;
mod registry;

pub use instance::*;
pub use registry::*;
