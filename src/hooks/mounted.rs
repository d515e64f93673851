//! Mounted-flag tracker.
//!
//! Async callbacks consult the query before committing state:
//!
//! ```ignore
//! let mounted = use_mounted(&instance);
//! host.set_timeout(delay, Box::new(move || {
//!     if mounted.get() == Ok(true) {
//!         commit();
//!     }
//! }));
//! ```

use crate::engine::{Instance, WeakInstance};
use crate::error::Result;

/// Query handle returned by [`use_mounted`].
///
/// Holds only a weak reference, so it never keeps a destroyed instance alive.
#[derive(Clone, Debug)]
pub struct MountedQuery {
    instance: WeakInstance,
}

impl MountedQuery {
    /// `Ok(true)` while attached, `Ok(false)` after teardown.
    ///
    /// # Errors
    ///
    /// [`HookError::InstanceReclaimed`](crate::HookError::InstanceReclaimed)
    /// once the instance is gone and every handle to it has been dropped.
    /// Callers holding the query past destruction must handle this.
    pub fn get(&self) -> Result<bool> {
        self.instance.is_mounted()
    }
}

pub fn use_mounted(instance: &Instance) -> MountedQuery {
    MountedQuery {
        instance: instance.downgrade(),
    }
}
