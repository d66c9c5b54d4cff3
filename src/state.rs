//! Shared service state flags.
//!
//! One instance lives in an `Arc` shared between the protocol engine and
//! the tracking worker. The engine owns `calibrated` and `camera_open`;
//! the worker owns `consecutive_errors` and flips `tracking` off on
//! self-termination. `tracking` doubles as the worker's cooperative stop
//! flag, polled once per iteration.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared mutable service state
#[derive(Debug, Default)]
pub struct ServiceState {
    calibrated: AtomicBool,
    tracking: AtomicBool,
    camera_open: AtomicBool,
    consecutive_errors: AtomicU32,
}

impl ServiceState {
    /// Create the initial (uncalibrated, idle) state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a trained or loaded model is established
    pub fn is_calibrated(&self) -> bool {
        self.calibrated.load(Ordering::SeqCst)
    }

    /// Set the calibrated flag
    pub fn set_calibrated(&self, value: bool) {
        self.calibrated.store(value, Ordering::SeqCst);
    }

    /// Whether the tracking worker is live
    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }

    /// Set the tracking flag (also the worker's stop flag)
    pub fn set_tracking(&self, value: bool) {
        self.tracking.store(value, Ordering::SeqCst);
    }

    /// Whether the measurement source is open
    pub fn is_camera_open(&self) -> bool {
        self.camera_open.load(Ordering::SeqCst)
    }

    /// Set the camera-open flag
    pub fn set_camera_open(&self, value: bool) {
        self.camera_open.store(value, Ordering::SeqCst);
    }

    /// Current consecutive sampling failure count
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::SeqCst)
    }

    /// Record a sampling failure, returning the new count
    pub fn record_error(&self) -> u32 {
        self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Reset the failure count after a successful sample
    pub fn reset_errors(&self) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
    }
}
