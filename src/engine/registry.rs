//! Instance Registry - Index allocation and lifecycle for component instances.
//!
//! Manages the lifecycle of component instances:
//! - ID ↔ Index mapping
//! - Free index pool for O(1) reuse
//! - ReactiveSet of mounted indices (deriveds react to mount/unmount)
//! - Parent context stack for nested component creation
//! - Recursive teardown: children are unmounted before their parent
//!
//! The registry only maps indices to instances. All hook state lives on the
//! [`Instance`] handle itself, so one component's hooks never share mutable
//! state with another's.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::ReactiveSet;
use tracing::debug;

use super::instance::Instance;
use crate::platform::Host;

// =============================================================================
// Registry State
// =============================================================================

thread_local! {
    /// Map component ID to index.
    static ID_TO_INDEX: RefCell<HashMap<String, usize>> = RefCell::new(HashMap::new());

    /// Mounted instances by index.
    static INSTANCES: RefCell<HashMap<usize, Instance>> = RefCell::new(HashMap::new());

    /// Set of currently mounted indices.
    /// Using ReactiveSet so deriveds that iterate over this set
    /// automatically react when instances are mounted or unmounted.
    static MOUNTED_INDICES: RefCell<ReactiveSet<usize>> = RefCell::new(ReactiveSet::new());

    /// Pool of freed indices for reuse.
    static FREE_INDICES: RefCell<Vec<usize>> = RefCell::new(Vec::new());

    /// Next index to allocate if pool is empty.
    static NEXT_INDEX: RefCell<usize> = const { RefCell::new(0) };

    /// Counter for generating unique IDs.
    static ID_COUNTER: RefCell<usize> = const { RefCell::new(0) };

    /// Stack of parent indices for nested component creation.
    static PARENT_STACK: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

// =============================================================================
// Parent Context Stack
// =============================================================================

/// Get current parent index (None if at root).
pub fn get_current_parent_index() -> Option<usize> {
    PARENT_STACK.with(|stack| stack.borrow().last().copied())
}

/// Push a parent index onto the stack.
pub fn push_parent_context(index: usize) {
    PARENT_STACK.with(|stack| {
        stack.borrow_mut().push(index);
    })
}

/// Pop a parent index from the stack.
pub fn pop_parent_context() {
    PARENT_STACK.with(|stack| {
        stack.borrow_mut().pop();
    })
}

/// Run `f` with `index` as the current parent.
pub fn with_parent<R>(index: usize, f: impl FnOnce() -> R) -> R {
    push_parent_context(index);
    let result = f();
    pop_parent_context();
    result
}

// =============================================================================
// Mount / Unmount
// =============================================================================

/// Mount a new component instance on `host`.
///
/// # Arguments
/// * `id` - Optional component ID. If not provided, one is generated.
/// * `host` - Host the instance's hooks schedule work on.
///
/// # Returns
/// The mounted instance. If `id` is already mounted, that instance is
/// returned unchanged.
pub fn mount_instance(id: Option<&str>, host: Rc<dyn Host>) -> Instance {
    let component_id = match id {
        Some(id) => id.to_string(),
        None => ID_COUNTER.with(|counter| {
            let mut counter = counter.borrow_mut();
            let id = format!("c{}", *counter);
            *counter += 1;
            id
        }),
    };

    let existing = ID_TO_INDEX
        .with(|map| map.borrow().get(&component_id).copied())
        .and_then(get_instance);
    if let Some(instance) = existing {
        return instance;
    }

    // Reuse free index or allocate new
    let index = FREE_INDICES.with(|free| {
        free.borrow_mut().pop().unwrap_or_else(|| {
            NEXT_INDEX.with(|next| {
                let mut next = next.borrow_mut();
                let index = *next;
                *next += 1;
                index
            })
        })
    });

    let parent = get_current_parent_index();
    let instance = Instance::new(index, component_id.clone(), parent, host);

    ID_TO_INDEX.with(|map| {
        map.borrow_mut().insert(component_id.clone(), index);
    });
    INSTANCES.with(|map| {
        map.borrow_mut().insert(index, instance.clone());
    });
    MOUNTED_INDICES.with(|set| {
        set.borrow_mut().insert(index);
    });

    debug!(index, id = %component_id, ?parent, "instance mounted");
    instance
}

/// Unmount the instance at `index`.
///
/// Also recursively unmounts all children first. Unknown indices are a no-op.
pub fn unmount_instance(index: usize) {
    let Some(instance) = get_instance(index) else {
        return;
    };

    // FIRST: children (collected before recursing to avoid holding the borrow)
    let children: Vec<usize> = INSTANCES.with(|map| {
        map.borrow()
            .values()
            .filter(|child| child.parent() == Some(index))
            .map(Instance::index)
            .collect()
    });
    for child_index in children {
        unmount_instance(child_index);
    }

    // Unregister before teardown so a destroy callback that unmounts again
    // finds nothing to do.
    ID_TO_INDEX.with(|map| {
        map.borrow_mut().remove(instance.id());
    });
    INSTANCES.with(|map| {
        map.borrow_mut().remove(&index);
    });
    MOUNTED_INDICES.with(|set| {
        set.borrow_mut().remove(&index);
    });

    // Flip the mount flag and run destroy callbacks
    instance.teardown();

    FREE_INDICES.with(|free| {
        free.borrow_mut().push(index);
    });

    debug!(index, id = instance.id(), "instance unmounted");

    // AUTO-CLEANUP: nothing mounted, start indices from zero again
    let is_empty = MOUNTED_INDICES.with(|set| set.borrow().is_empty());
    if is_empty {
        FREE_INDICES.with(|free| free.borrow_mut().clear());
        NEXT_INDEX.with(|next| *next.borrow_mut() = 0);
    }
}

/// Unmount `instance` only if it is still the one registered at its index.
pub(crate) fn unmount_exact(instance: &Instance) {
    let registered = get_instance(instance.index()).is_some_and(|current| current.ptr_eq(instance));
    if registered {
        unmount_instance(instance.index());
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// Get the mounted instance at `index`.
pub fn get_instance(index: usize) -> Option<Instance> {
    INSTANCES.with(|map| map.borrow().get(&index).cloned())
}

/// Get index for a component ID.
pub fn get_index(id: &str) -> Option<usize> {
    ID_TO_INDEX.with(|map| map.borrow().get(id).copied())
}

/// Get all currently mounted indices.
///
/// Note: This creates a reactive dependency when called from a derived/effect.
pub fn get_mounted_indices() -> Vec<usize> {
    MOUNTED_INDICES.with(|set| set.borrow().iter().copied().collect())
}

/// Check if an index is currently mounted.
pub fn is_mounted_index(index: usize) -> bool {
    MOUNTED_INDICES.with(|set| set.borrow().contains(&index))
}

/// Get the count of currently mounted instances.
pub fn get_mounted_count() -> usize {
    MOUNTED_INDICES.with(|set| set.borrow().len())
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Reset all registry state (for testing).
///
/// Instances still registered are dropped without teardown.
pub fn reset_registry() {
    ID_TO_INDEX.with(|map| map.borrow_mut().clear());
    INSTANCES.with(|map| map.borrow_mut().clear());
    MOUNTED_INDICES.with(|set| set.borrow_mut().clear());
    FREE_INDICES.with(|free| free.borrow_mut().clear());
    NEXT_INDEX.with(|next| *next.borrow_mut() = 0);
    ID_COUNTER.with(|counter| *counter.borrow_mut() = 0);
    PARENT_STACK.with(|stack| stack.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::EventLoop;
    use std::cell::{Cell, RefCell};

    fn host() -> Rc<dyn Host> {
        Rc::new(EventLoop::new())
    }

    #[test]
    fn test_mount_allocates_indices() {
        reset_registry();
        let host = host();

        let a = mount_instance(None, host.clone());
        let b = mount_instance(None, host.clone());
        let c = mount_instance(Some("my_box"), host.clone());

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(c.index(), 2);
        assert_eq!(a.id(), "c0");
        assert_eq!(c.id(), "my_box");

        assert!(is_mounted_index(2));
        assert!(!is_mounted_index(3));
        assert_eq!(get_mounted_count(), 3);
    }

    #[test]
    fn test_unmount_and_reuse() {
        reset_registry();
        let host = host();

        let a = mount_instance(None, host.clone());
        let b = mount_instance(None, host.clone());

        unmount_instance(a.index());
        assert!(!a.is_mounted());
        assert!(b.is_mounted());

        // Should reuse the freed index
        let c = mount_instance(None, host.clone());
        assert_eq!(c.index(), a.index());
    }

    #[test]
    fn test_mount_existing_id_returns_same_instance() {
        reset_registry();
        let host = host();

        let first = mount_instance(Some("panel"), host.clone());
        let second = mount_instance(Some("panel"), host.clone());

        assert!(first.ptr_eq(&second));
        assert_eq!(get_index("panel"), Some(first.index()));
        assert_eq!(get_mounted_count(), 1);
    }

    #[test]
    fn test_parent_context() {
        reset_registry();

        assert_eq!(get_current_parent_index(), None);

        push_parent_context(5);
        assert_eq!(get_current_parent_index(), Some(5));

        push_parent_context(10);
        assert_eq!(get_current_parent_index(), Some(10));

        pop_parent_context();
        assert_eq!(get_current_parent_index(), Some(5));

        pop_parent_context();
        assert_eq!(get_current_parent_index(), None);
    }

    #[test]
    fn test_children_torn_down_before_parent() {
        reset_registry();
        let host = host();
        let order = Rc::new(RefCell::new(Vec::new()));

        let parent = mount_instance(Some("parent"), host.clone());
        let child = with_parent(parent.index(), || mount_instance(Some("child"), host.clone()));
        assert_eq!(child.parent(), Some(parent.index()));

        for instance in [&parent, &child] {
            let order = order.clone();
            let id = instance.id().to_string();
            instance.on_destroy(move || order.borrow_mut().push(id));
        }

        unmount_instance(parent.index());

        assert_eq!(*order.borrow(), vec!["child".to_string(), "parent".to_string()]);
        assert!(!child.is_mounted());
        assert_eq!(get_mounted_count(), 0);
    }

    #[test]
    fn test_destroy_callbacks_run_once() {
        reset_registry();

        let count = Rc::new(Cell::new(0));
        let instance = mount_instance(None, host());
        let count_clone = count.clone();
        instance.on_destroy(move || count_clone.set(count_clone.get() + 1));

        assert_eq!(count.get(), 0);
        unmount_instance(instance.index());
        unmount_instance(instance.index());
        instance.unmount();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_on_destroy_after_teardown_runs_immediately() {
        reset_registry();

        let instance = mount_instance(None, host());
        instance.unmount();

        let called = Rc::new(Cell::new(false));
        let called_clone = called.clone();
        instance.on_destroy(move || called_clone.set(true));
        assert!(called.get());
    }

    #[test]
    fn test_stale_handle_does_not_unmount_reused_index() {
        reset_registry();
        let host = host();

        let old = mount_instance(None, host.clone());
        let keep = mount_instance(None, host.clone());
        old.unmount();

        let reused = mount_instance(None, host.clone());
        assert_eq!(reused.index(), old.index());

        old.unmount();
        assert!(reused.is_mounted(), "stale handle must not tear down the new occupant");
        assert!(keep.is_mounted());
    }

    #[test]
    fn test_mounted_indices_track_mount_and_unmount() {
        reset_registry();
        let host = host();

        let a = mount_instance(None, host.clone());
        let b = mount_instance(None, host.clone());
        let c = mount_instance(None, host.clone());

        let mut indices = get_mounted_indices();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);

        b.unmount();
        let mut indices = get_mounted_indices();
        indices.sort_unstable();
        assert_eq!(indices, vec![a.index(), c.index()]);

        a.unmount();
        c.unmount();
        assert!(get_mounted_indices().is_empty());
        assert_eq!(get_mounted_count(), 0);
    }
}
