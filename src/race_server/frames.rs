//! Frames - The "next frame" scheduling capability
//!
//! The engine never loops on its own. It hands a callback to a
//! [`FrameScheduler`] and does work only when that callback fires. Callers
//! choose the clock: [`SteppedFrames`] fires pending callbacks whenever it is
//! told to, with whatever timestamp it is given.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

/// Callback run on the next frame, receiving the frame timestamp
pub type FrameCallback = Box<dyn FnOnce(Duration)>;

/// Handle to a pending frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(pub u64);

/// Something that can run a callback "soon" and cancel it before it does.
pub trait FrameScheduler {
    /// Queue `callback` for the next frame
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Drop a pending callback. Unknown or already-fired handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Frame scheduler driven by explicit `step` calls
#[derive(Default)]
pub struct SteppedFrames {
    next_id: Cell<u64>,
    pending: RefCell<BTreeMap<u64, FrameCallback>>,
}

impl SteppedFrames {
    /// Create a scheduler with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every callback pending at the time of the call, in request order.
    ///
    /// Callbacks requested while stepping wait for the next step. Returns the
    /// number of callbacks fired.
    pub fn step(&self, timestamp: Duration) -> usize {
        let due = std::mem::take(&mut *self.pending.borrow_mut());
        let fired = due.len();
        for callback in due.into_values() {
            callback(timestamp);
        }
        fired
    }

    /// Step `count` frames spaced `interval` apart, starting at `start`
    pub fn run_frames(&self, count: usize, start: Duration, interval: Duration) {
        for i in 0..count {
            self.step(start + interval * i as u32);
        }
    }

    /// Number of callbacks waiting for the next step
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl FrameScheduler for SteppedFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.pending.borrow_mut().insert(id, callback);
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.pending.borrow_mut().remove(&handle.0);
    }
}
