//! Reference sinks: mutable cells, callback refs, and merging them.
//!
//! A resource (usually an element handle) is attached to a sink with
//! `Some(value)` and detached with `None`. Sinks come in two shapes:
//!
//! - [`MutableRef`] - a shared cell that is written directly
//! - callback - a function invoked with the value
//!
//! [`merge_refs`] fans one value out to many sinks. [`use_merged_refs`]
//! does the same with lifecycle: replacing the sink set detaches the sinks
//! that were dropped, and teardown detaches everything.
//!
//! # Example
//!
//! ```ignore
//! let internal = MutableRef::new();
//! let callback_ref = use_callback_ref::<ElementId>(&instance);
//!
//! let merged = use_merged_refs(&instance, [
//!     Some(internal.clone().into()),
//!     Some(callback_ref.sink()),
//!     None, // absent consumer ref
//! ]);
//!
//! merged.set(Some(ElementId(3)));
//! assert_eq!(internal.current(), Some(ElementId(3)));
//! assert_eq!(callback_ref.item(), Some(ElementId(3)));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use spark_signals::{signal, Signal};
use tracing::trace;

use crate::engine::{Instance, WeakInstance};

// =============================================================================
// MutableRef
// =============================================================================

/// Shared mutable cell, the object form of a ref.
pub struct MutableRef<T> {
    current: Rc<RefCell<Option<T>>>,
}

impl<T> MutableRef<T> {
    pub fn new() -> Self {
        Self {
            current: Rc::new(RefCell::new(None)),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            current: Rc::new(RefCell::new(Some(value))),
        }
    }

    pub fn set(&self, value: Option<T>) {
        *self.current.borrow_mut() = value;
    }

    pub fn take(&self) -> Option<T> {
        self.current.borrow_mut().take()
    }

    pub fn is_set(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub fn current(&self) -> Option<T>
    where
        T: Clone,
    {
        self.current.borrow().clone()
    }
}

impl<T> Clone for MutableRef<T> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<T> Default for MutableRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableRef").field(&self.current.borrow()).finish()
    }
}

// =============================================================================
// RefSink
// =============================================================================

/// Anything that can receive the current resource value.
pub enum RefSink<T> {
    Cell(MutableRef<T>),
    Callback(Rc<dyn Fn(Option<T>)>),
}

impl<T> RefSink<T> {
    pub fn callback(f: impl Fn(Option<T>) + 'static) -> Self {
        RefSink::Callback(Rc::new(f))
    }

    /// Deliver `value` using this sink's own convention.
    pub fn assign(&self, value: Option<T>) {
        match self {
            RefSink::Cell(cell) => cell.set(value),
            RefSink::Callback(callback) => callback(value),
        }
    }

    /// Identity comparison: same cell or same callback allocation.
    pub fn same_sink(&self, other: &RefSink<T>) -> bool {
        match (self, other) {
            (RefSink::Cell(a), RefSink::Cell(b)) => Rc::ptr_eq(&a.current, &b.current),
            (RefSink::Callback(a), RefSink::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T> Clone for RefSink<T> {
    fn clone(&self) -> Self {
        match self {
            RefSink::Cell(cell) => RefSink::Cell(cell.clone()),
            RefSink::Callback(callback) => RefSink::Callback(callback.clone()),
        }
    }
}

impl<T> From<MutableRef<T>> for RefSink<T> {
    fn from(cell: MutableRef<T>) -> Self {
        RefSink::Cell(cell)
    }
}

impl<T> fmt::Debug for RefSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSink::Cell(_) => f.write_str("RefSink::Cell"),
            RefSink::Callback(_) => f.write_str("RefSink::Callback"),
        }
    }
}

// =============================================================================
// merge_refs - stateless fan-out
// =============================================================================

/// Combine sinks into one callback sink. Absent sinks are skipped.
///
/// Every sink sees the same value in the same call, in input order.
pub fn merge_refs<T, I>(refs: I) -> RefSink<T>
where
    T: Clone + 'static,
    I: IntoIterator<Item = Option<RefSink<T>>>,
{
    let sinks: Vec<RefSink<T>> = refs.into_iter().flatten().collect();
    RefSink::callback(move |value: Option<T>| {
        for sink in &sinks {
            sink.assign(value.clone());
        }
    })
}

// =============================================================================
// use_merged_refs - fan-out with lifecycle
// =============================================================================

struct MergedState<T> {
    sinks: Vec<RefSink<T>>,
    current: Option<T>,
    detached: bool,
}

/// Lifecycle-bound merged ref returned by [`use_merged_refs`].
pub struct MergedRef<T> {
    state: Rc<RefCell<MergedState<T>>>,
}

pub fn use_merged_refs<T, I>(instance: &Instance, refs: I) -> MergedRef<T>
where
    T: Clone + 'static,
    I: IntoIterator<Item = Option<RefSink<T>>>,
{
    let state = Rc::new(RefCell::new(MergedState {
        sinks: refs.into_iter().flatten().collect(),
        current: None,
        detached: false,
    }));

    let teardown_state = state.clone();
    instance.on_destroy(move || detach_all(&teardown_state));

    MergedRef { state }
}

impl<T: Clone + 'static> MergedRef<T> {
    /// Forward `value` to every sink. Ignored after teardown.
    pub fn set(&self, value: Option<T>) {
        let sinks = {
            let mut state = self.state.borrow_mut();
            if state.detached {
                return;
            }
            state.current = value.clone();
            state.sinks.clone()
        };
        for sink in &sinks {
            sink.assign(value.clone());
        }
    }

    /// Replace the sink set.
    ///
    /// Sinks that are no longer present are detached with `None` before the
    /// newly added ones are attached with the current value. Sinks present in
    /// both sets are not notified.
    pub fn set_refs<I>(&self, refs: I)
    where
        I: IntoIterator<Item = Option<RefSink<T>>>,
    {
        let next: Vec<RefSink<T>> = refs.into_iter().flatten().collect();

        let (removed, added, current) = {
            let mut state = self.state.borrow_mut();
            if state.detached {
                return;
            }
            let removed: Vec<RefSink<T>> = state
                .sinks
                .iter()
                .filter(|old| !next.iter().any(|new| new.same_sink(old)))
                .cloned()
                .collect();
            let added: Vec<RefSink<T>> = next
                .iter()
                .filter(|new| !state.sinks.iter().any(|old| old.same_sink(new)))
                .cloned()
                .collect();
            state.sinks = next;
            (removed, added, state.current.clone())
        };

        trace!(removed = removed.len(), added = added.len(), "merged ref sinks replaced");

        for sink in &removed {
            sink.assign(None);
        }
        if current.is_some() {
            for sink in &added {
                sink.assign(current.clone());
            }
        }
    }

    /// The value last forwarded.
    pub fn current(&self) -> Option<T> {
        self.state.borrow().current.clone()
    }

    /// A callback sink that forwards into this merged ref, for handing to
    /// whatever attaches the resource. Holds a weak reference.
    pub fn sink(&self) -> RefSink<T> {
        let weak: Weak<RefCell<MergedState<T>>> = Rc::downgrade(&self.state);
        RefSink::callback(move |value: Option<T>| {
            if let Some(state) = weak.upgrade() {
                MergedRef { state }.set(value);
            }
        })
    }

    pub fn len(&self) -> usize {
        self.state.borrow().sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn detach_all<T: Clone>(state: &RefCell<MergedState<T>>) {
    let sinks = {
        let mut state = state.borrow_mut();
        state.detached = true;
        match state.current.take() {
            Some(_) => std::mem::take(&mut state.sinks),
            None => {
                state.sinks.clear();
                Vec::new()
            }
        }
    };
    for sink in &sinks {
        sink.assign(None);
    }
}

// =============================================================================
// use_callback_ref
// =============================================================================

/// Ref whose attached value lives in a signal.
///
/// Effects that read [`CallbackRef::item`] re-run when the resource is
/// attached or detached.
pub struct CallbackRef<T: Clone + PartialEq + 'static> {
    item: Signal<Option<T>>,
    owner: WeakInstance,
}

pub fn use_callback_ref<T>(instance: &Instance) -> CallbackRef<T>
where
    T: Clone + PartialEq + 'static,
{
    CallbackRef {
        item: signal(None),
        owner: instance.downgrade(),
    }
}

impl<T: Clone + PartialEq + 'static> CallbackRef<T> {
    /// Latest attached value (tracked when read inside an effect).
    pub fn item(&self) -> Option<T> {
        self.item.get()
    }

    pub fn signal(&self) -> Signal<Option<T>> {
        self.item.clone()
    }

    /// Sink that stores into this ref. Writes after teardown are ignored.
    pub fn sink(&self) -> RefSink<T> {
        let item = self.item.clone();
        let owner = self.owner.clone();
        RefSink::callback(move |value: Option<T>| {
            if owner.is_alive() {
                item.set(value);
            }
        })
    }
}

impl<T: Clone + PartialEq + 'static> Clone for CallbackRef<T> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            owner: self.owner.clone(),
        }
    }
}
