//! Animation-frame scheduler bound to an instance.
//!
//! ```text
//! Idle ──request()──► Pending ──frame fires / cancel()──► Idle
//! ```
//!
//! Each `request` schedules independently: a second request while one is
//! pending does not drop the first. `cancel` cancels every frame this hook
//! still has outstanding, the most recent included. Teardown cancels, and a
//! request after teardown is ignored.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::engine::{Instance, WeakInstance};
use crate::platform::{FrameId, Host};

struct FrameState {
    /// Outstanding handles in request order.
    pending: Vec<FrameId>,
    torn_down: bool,
}

/// Handle returned by [`use_animation_frame`].
#[derive(Clone)]
pub struct AnimationFrame {
    state: Rc<RefCell<FrameState>>,
    host: Rc<dyn Host>,
    owner: WeakInstance,
}

pub fn use_animation_frame(instance: &Instance) -> AnimationFrame {
    let frame = AnimationFrame {
        state: Rc::new(RefCell::new(FrameState {
            pending: Vec::new(),
            torn_down: false,
        })),
        host: instance.host().clone(),
        owner: instance.downgrade(),
    };

    let teardown = frame.clone();
    instance.on_destroy(move || {
        teardown.cancel();
        teardown.state.borrow_mut().torn_down = true;
    });

    frame
}

impl AnimationFrame {
    /// Run `callback` on the next animation frame with the frame timestamp.
    pub fn request<F>(&self, callback: F)
    where
        F: FnOnce(f64) + 'static,
    {
        if self.state.borrow().torn_down || !self.owner.is_alive() {
            trace!("animation frame requested after teardown, ignored");
            return;
        }

        let slot: Rc<Cell<Option<FrameId>>> = Rc::new(Cell::new(None));
        let state = Rc::downgrade(&self.state);
        let owner = self.owner.clone();
        let fired_slot = slot.clone();

        let id = self.host.request_animation_frame(Box::new(move |timestamp| {
            if let (Some(state), Some(id)) = (state.upgrade(), fired_slot.get()) {
                state.borrow_mut().pending.retain(|pending| *pending != id);
            }
            if owner.is_alive() {
                callback(timestamp);
            }
        }));

        slot.set(Some(id));
        self.state.borrow_mut().pending.push(id);
        trace!(frame = %id, "animation frame requested");
    }

    /// Cancel outstanding frames. A no-op when idle.
    pub fn cancel(&self) {
        let pending = std::mem::take(&mut self.state.borrow_mut().pending);
        for id in pending {
            self.host.cancel_animation_frame(id);
            trace!(frame = %id, "animation frame cancelled");
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.state.borrow().pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{mount_instance, reset_registry};
    use crate::platform::EventLoop;
    use std::cell::RefCell;

    fn setup() -> (Rc<EventLoop>, Instance) {
        reset_registry();
        let host = Rc::new(EventLoop::new());
        let instance = mount_instance(None, host.clone());
        (host, instance)
    }

    #[test]
    fn test_request_fires_on_next_frame() {
        let (host, instance) = setup();
        let frame = use_animation_frame(&instance);
        let stamps = Rc::new(RefCell::new(Vec::new()));

        let stamps_clone = stamps.clone();
        frame.request(move |ts| stamps_clone.borrow_mut().push(ts));
        assert!(frame.is_pending());

        host.run_frame();
        assert_eq!(*stamps.borrow(), vec![0.0]);
        assert!(!frame.is_pending(), "back to idle after firing");
    }

    #[test]
    fn test_second_request_keeps_first() {
        let (host, instance) = setup();
        let frame = use_animation_frame(&instance);
        let log = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second"] {
            let log = log.clone();
            frame.request(move |_| log.borrow_mut().push(label));
        }
        host.run_frame();

        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_cancel_twice_is_safe() {
        let (host, instance) = setup();
        let frame = use_animation_frame(&instance);
        let fired = Rc::new(Cell::new(false));

        let fired_clone = fired.clone();
        frame.request(move |_| fired_clone.set(true));
        frame.cancel();
        frame.cancel();
        host.run_frame();

        assert!(!fired.get());
        assert!(!frame.is_pending());
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn test_teardown_cancels_and_ignores_new_requests() {
        let (host, instance) = setup();
        let frame = use_animation_frame(&instance);
        let fired = Rc::new(Cell::new(0));

        let fired_clone = fired.clone();
        frame.request(move |_| fired_clone.set(fired_clone.get() + 1));
        instance.unmount();

        let fired_clone = fired.clone();
        frame.request(move |_| fired_clone.set(fired_clone.get() + 1));
        host.run_frame();

        assert_eq!(fired.get(), 0);
        assert_eq!(host.pending_frames(), 0);
    }
}
