//! Instance - one mounted component, its mount flag and teardown list.
//!
//! Hooks take the instance explicitly. Nothing reads an ambient "current
//! component": the instance handle is threaded through every hook call, and
//! the hook registers its own teardown with [`Instance::on_destroy`].
//!
//! Hooks that schedule host work keep a [`WeakInstance`] so a pending timer
//! or frame never keeps a destroyed component's storage alive.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::error::{HookError, Result};
use crate::platform::Host;

/// Disposer returned by setup functions and registered for teardown.
pub type Cleanup = Box<dyn FnOnce()>;

pub(crate) struct InstanceInner {
    index: usize,
    id: String,
    parent: Option<usize>,
    /// True from creation until teardown; never flips back.
    mounted: Cell<bool>,
    destroy_callbacks: RefCell<Vec<Cleanup>>,
    host: Rc<dyn Host>,
}

// =============================================================================
// Instance
// =============================================================================

/// Shared handle to a mounted component instance.
///
/// Cloning is cheap. The registry holds one handle until the instance is
/// unmounted; once every handle is dropped the storage is reclaimed and weak
/// queries report [`HookError::InstanceReclaimed`].
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    pub(crate) fn new(index: usize, id: String, parent: Option<usize>, host: Rc<dyn Host>) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                index,
                id,
                parent,
                mounted: Cell::new(true),
                destroy_callbacks: RefCell::new(Vec::new()),
                host,
            }),
        }
    }

    pub fn index(&self) -> usize {
        self.inner.index
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn parent(&self) -> Option<usize> {
        self.inner.parent
    }

    /// Host that timers, frames and observers are scheduled on.
    pub fn host(&self) -> &Rc<dyn Host> {
        &self.inner.host
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Register a callback to run when this instance is torn down.
    ///
    /// Callbacks run once, in registration order. Registering on an instance
    /// that is already torn down runs the callback immediately so the
    /// resource it releases cannot leak.
    pub fn on_destroy(&self, callback: impl FnOnce() + 'static) {
        if !self.is_mounted() {
            warn!(index = self.index(), "on_destroy after teardown, running now");
            callback();
            return;
        }
        self.inner
            .destroy_callbacks
            .borrow_mut()
            .push(Box::new(callback));
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Unmount through the registry (children first).
    ///
    /// A no-op if this instance was already unmounted, even when its index
    /// has since been reused by another instance.
    pub fn unmount(&self) {
        super::registry::unmount_exact(self);
    }

    pub(crate) fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Flip the mount flag and run destroy callbacks.
    ///
    /// Returns false if the instance was already torn down.
    pub(crate) fn teardown(&self) -> bool {
        if !self.inner.mounted.replace(false) {
            return false;
        }
        // Taken before running: callbacks registered from inside a callback
        // see `mounted == false` and run immediately instead.
        let callbacks = std::mem::take(&mut *self.inner.destroy_callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
        true
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("index", &self.inner.index)
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent)
            .field("mounted", &self.inner.mounted.get())
            .finish()
    }
}

// =============================================================================
// WeakInstance
// =============================================================================

/// Non-owning handle held by scheduled callbacks.
#[derive(Clone)]
pub struct WeakInstance {
    inner: Weak<InstanceInner>,
}

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(|inner| Instance { inner })
    }

    /// Mount state, or [`HookError::InstanceReclaimed`] once the storage is gone.
    pub fn is_mounted(&self) -> Result<bool> {
        self.inner
            .upgrade()
            .map(|inner| inner.mounted.get())
            .ok_or(HookError::InstanceReclaimed)
    }

    /// Mounted and still backed by storage.
    pub(crate) fn is_alive(&self) -> bool {
        matches!(self.is_mounted(), Ok(true))
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakInstance")
            .field("alive", &self.is_alive())
            .finish()
    }
}
