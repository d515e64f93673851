//! Hook errors.
//!
//! Only usage errors live here. Host primitives that fail are not caught:
//! a panicking timer or observer unwinds to whoever drove the host.

use thiserror::Error;

/// Usage errors raised by hooks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HookError {
    /// A mount query outlived the instance storage it points at.
    #[error("component instance was destroyed and its storage reclaimed")]
    InstanceReclaimed,

    /// Intersection thresholds must lie in `[0, 1]`.
    #[error("intersection threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    /// Root margin must be one to four `px` or `%` lengths.
    #[error("invalid root margin {0:?}")]
    InvalidRootMargin(String),

    /// Intervals need a non-zero period.
    #[error("interval period must be greater than zero")]
    ZeroInterval,
}

/// Result alias for hook operations.
pub type Result<T> = std::result::Result<T, HookError>;
