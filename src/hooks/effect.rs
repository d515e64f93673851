//! Effect slot: setup returns a disposer, disposer runs exactly once.
//!
//! [`use_effect_with_deps`] is the scoped-acquisition primitive the other
//! hooks build on. Setup runs when the dependencies change by value; the
//! previous disposer runs first. Teardown of the owning instance runs the
//! last disposer. After teardown, updates are ignored.
//!
//! # Example
//!
//! ```ignore
//! use reblend_hooks::hooks::use_effect_with_deps;
//!
//! let effect = use_effect_with_deps(&instance, element, |element| {
//!     let id = subscribe(*element);
//!     Some(Box::new(move || unsubscribe(id)) as Cleanup)
//! });
//!
//! effect.update(other_element, |element| { /* old disposer ran first */ None });
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{Cleanup, Instance, WeakInstance};

struct EffectSlot<D> {
    deps: Option<D>,
    disposer: Option<Cleanup>,
    disposed: bool,
}

/// Handle to a dependency-keyed effect.
pub struct DepsEffect<D> {
    slot: Rc<RefCell<EffectSlot<D>>>,
    owner: WeakInstance,
}

/// Run `setup` now and again whenever [`DepsEffect::update`] is called with
/// different dependencies.
pub fn use_effect_with_deps<D, F>(instance: &Instance, deps: D, setup: F) -> DepsEffect<D>
where
    D: PartialEq + 'static,
    F: FnOnce(&D) -> Option<Cleanup>,
{
    let effect = DepsEffect {
        slot: Rc::new(RefCell::new(EffectSlot {
            deps: None,
            disposer: None,
            disposed: false,
        })),
        owner: instance.downgrade(),
    };

    let slot = effect.slot.clone();
    instance.on_destroy(move || dispose_slot(&slot));

    effect.update(deps, setup);
    effect
}

impl<D: PartialEq + 'static> DepsEffect<D> {
    /// Re-run setup if `deps` differ from the last run.
    ///
    /// Returns whether setup ran.
    pub fn update<F>(&self, deps: D, setup: F) -> bool
    where
        F: FnOnce(&D) -> Option<Cleanup>,
    {
        if self.is_disposed() || !self.owner.is_alive() {
            return false;
        }
        if self.slot.borrow().deps.as_ref() == Some(&deps) {
            return false;
        }

        let previous = self.slot.borrow_mut().disposer.take();
        if let Some(dispose) = previous {
            dispose();
        }

        let disposer = setup(&deps);

        let late = {
            let mut slot = self.slot.borrow_mut();
            if slot.disposed {
                // Torn down while setup ran
                disposer
            } else {
                slot.deps = Some(deps);
                slot.disposer = disposer;
                None
            }
        };
        if let Some(dispose) = late {
            dispose();
        }
        true
    }

    /// Run the current disposer now. Later updates are ignored.
    pub fn dispose(&self) {
        dispose_slot(&self.slot);
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.borrow().disposed
    }

    /// Dependencies of the last setup run, if any.
    pub fn deps(&self) -> Option<D>
    where
        D: Clone,
    {
        self.slot.borrow().deps.clone()
    }
}

fn dispose_slot<D>(slot: &RefCell<EffectSlot<D>>) {
    let disposer = {
        let mut slot = slot.borrow_mut();
        if slot.disposed {
            return;
        }
        slot.disposed = true;
        slot.deps = None;
        slot.disposer.take()
    };
    if let Some(dispose) = disposer {
        dispose();
    }
}
