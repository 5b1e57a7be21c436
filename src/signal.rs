//! Host-side event sources: the frame scheduler and the viewport resize
//! signal. Both are single-threaded and cheap to clone; clones share state.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Monotonic identifier of one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(u64);

impl FrameHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

pub type FrameCallback = Box<dyn FnOnce(FrameHandle, f64)>;

#[derive(Default)]
struct FrameQueueInner {
    next_id: u64,
    pending: Vec<(FrameHandle, FrameCallback)>,
}

/// Animation-frame style scheduler. Callbacks requested while a frame runs
/// go to the next frame.
#[derive(Clone, Default)]
pub struct FrameQueue {
    inner: Rc<RefCell<FrameQueueInner>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let handle = FrameHandle(inner.next_id);
        inner.pending.push((handle, callback));
        handle
    }

    /// Returns false when the handle already ran or was cancelled.
    pub fn cancel_frame(&self, handle: FrameHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.pending.len();
        inner.pending.retain(|(h, _)| *h != handle);
        before != inner.pending.len()
    }

    pub fn pending(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        self.inner.borrow().pending.iter().any(|(h, _)| *h == handle)
    }

    /// Runs every callback that was pending when the frame started.
    /// `time` is the host clock in milliseconds.
    pub fn run_frame(&self, time: f64) -> usize {
        let due = std::mem::take(&mut self.inner.borrow_mut().pending);
        let count = due.len();
        for (handle, callback) in due {
            callback(handle, time);
        }
        count
    }
}

/// Window size in logical pixels plus the display scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMetrics {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f64,
}

impl WindowMetrics {
    pub fn new(width: u32, height: u32, scale_factor: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
        }
    }
}

type Listener = Rc<dyn Fn(WindowMetrics)>;

struct ResizeRegistry {
    next_id: u64,
    current: WindowMetrics,
    listeners: Vec<(u64, Listener)>,
}

/// Process-wide viewport resize signal.
#[derive(Clone)]
pub struct ResizeSignal {
    registry: Rc<RefCell<ResizeRegistry>>,
}

impl ResizeSignal {
    pub fn new(initial: WindowMetrics) -> Self {
        Self {
            registry: Rc::new(RefCell::new(ResizeRegistry {
                next_id: 0,
                current: initial,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn current(&self) -> WindowMetrics {
        self.registry.borrow().current
    }

    pub fn subscribe(&self, listener: impl Fn(WindowMetrics) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Rc::new(listener)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
            active: Cell::new(true),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Records the new metrics and notifies every listener registered at
    /// the time of the call.
    pub fn emit(&self, metrics: WindowMetrics) {
        let listeners: Vec<Listener> = {
            let mut registry = self.registry.borrow_mut();
            registry.current = metrics;
            registry.listeners.iter().map(|(_, l)| l.clone()).collect()
        };
        for listener in listeners {
            listener(metrics);
        }
    }
}

/// Registration token for a [`ResizeSignal`] listener. Released exactly once,
/// either explicitly or on drop.
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<ResizeRegistry>>,
    active: Cell<bool>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn release(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry
                .borrow_mut()
                .listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameQueue, ResizeSignal, WindowMetrics};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn frame_handles_are_monotonic_and_cancellable() {
        let frames = FrameQueue::new();
        let ran = Rc::new(Cell::new(0));
        let a = {
            let ran = ran.clone();
            frames.request_frame(Box::new(move |_, _| ran.set(ran.get() + 1)))
        };
        let b = {
            let ran = ran.clone();
            frames.request_frame(Box::new(move |_, _| ran.set(ran.get() + 10)))
        };
        assert!(b > a);
        assert!(frames.cancel_frame(a));
        assert!(!frames.cancel_frame(a));
        assert_eq!(frames.run_frame(0.0), 1);
        assert_eq!(ran.get(), 10);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn callbacks_requested_during_a_frame_wait_for_the_next() {
        let frames = FrameQueue::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let inner_frames = frames.clone();
        let inner_seen = seen.clone();
        frames.request_frame(Box::new(move |_, t| {
            inner_seen.borrow_mut().push(t);
            let seen = inner_seen.clone();
            inner_frames.request_frame(Box::new(move |_, t| seen.borrow_mut().push(t)));
        }));
        assert_eq!(frames.run_frame(1.0), 1);
        assert_eq!(frames.pending(), 1);
        frames.run_frame(2.0);
        assert_eq!(*seen.borrow(), vec![1.0, 2.0]);
    }

    #[test]
    fn subscription_releases_once_and_on_drop() {
        let signal = ResizeSignal::new(WindowMetrics::new(1024, 768, 1.0));
        let hits = Rc::new(Cell::new(0));
        let sub = {
            let hits = hits.clone();
            signal.subscribe(move |_| hits.set(hits.get() + 1))
        };
        let other = signal.subscribe(|_| {});
        assert_eq!(signal.listener_count(), 2);

        signal.emit(WindowMetrics::new(500, 700, 2.0));
        assert_eq!(hits.get(), 1);
        assert_eq!(signal.current().width, 500);

        sub.release();
        sub.release();
        assert!(!sub.is_active());
        assert_eq!(signal.listener_count(), 1);
        signal.emit(WindowMetrics::new(600, 700, 2.0));
        assert_eq!(hits.get(), 1);

        drop(other);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn subscription_outliving_signal_is_harmless() {
        let signal = ResizeSignal::new(WindowMetrics::new(800, 600, 1.0));
        let sub = signal.subscribe(|_| {});
        drop(signal);
        sub.release();
        assert!(!sub.is_active());
    }
}
