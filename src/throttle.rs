//! Producer-side frame admission.
//!
//! Depth inference is much slower than the camera, so producers only start
//! work on every n-th frame and never run more than one frame at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
struct ThrottleState {
    frames_seen: AtomicU64,
    in_flight: AtomicBool,
}

/// Admits every `divisor`-th frame while no other frame is in flight.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    divisor: u64,
    state: Arc<ThrottleState>,
}

impl FrameThrottle {
    /// A divisor of zero is treated as one.
    pub fn new(divisor: u32) -> Self {
        Self {
            divisor: divisor.max(1) as u64,
            state: Arc::new(ThrottleState::default()),
        }
    }

    /// Count a frame and try to start processing it.
    ///
    /// Frames skipped by the divisor and frames arriving while another is in
    /// flight both return `None`.
    pub fn try_begin(&self) -> Option<FramePermit> {
        let frame = self.state.frames_seen.fetch_add(1, Ordering::Relaxed);
        if frame % self.divisor != 0 {
            return None;
        }
        self.state
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(FramePermit {
            state: Arc::clone(&self.state),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.state.in_flight.load(Ordering::Acquire)
    }

    pub fn frames_seen(&self) -> u64 {
        self.state.frames_seen.load(Ordering::Relaxed)
    }
}

/// Marks a frame as in flight until dropped.
#[derive(Debug)]
pub struct FramePermit {
    state: Arc<ThrottleState>,
}

impl Drop for FramePermit {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::Release);
    }
}
