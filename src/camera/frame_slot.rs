use crate::core::capture_source::Frame;
use std::sync::{Arc, Mutex, MutexGuard};

/// Last-write-wins single-frame buffer. Writers never wait on readers and
/// intermediate frames are dropped.
#[derive(Debug, Default)]
pub struct FrameSlot {
    inner: Mutex<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    latest: Option<Arc<Frame>>,
    next_sequence: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current frame and returns the sequence number it got.
    pub fn publish(&self, mut frame: Frame) -> u64 {
        let mut state = self.lock();
        state.next_sequence += 1;
        frame.sequence = state.next_sequence;
        state.latest = Some(Arc::new(frame));
        state.next_sequence
    }

    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.lock().latest.clone()
    }

    pub fn clear(&self) {
        self.lock().latest = None;
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // A panicking grabber must not take the whole camera down with it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
