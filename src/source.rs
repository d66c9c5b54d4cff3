//! Measurement source abstraction.
//!
//! The service never touches camera hardware directly; it consumes frames
//! through the [`MeasurementSource`] trait. Real capture backends (webcam,
//! video file) implement this trait in companion crates. The crate ships a
//! [`SyntheticSource`] producing a deterministic scripted gaze trajectory
//! with configurable failure injection, used for development and tests.

use crate::{Error, Result};

/// One raw sample from the measurement source.
///
/// The core never inspects the payload; only the estimator interprets it.
/// Feature-level sources (including [`SyntheticSource`]) use the layout
/// `[face_flag, blink_flag, feature...]` understood by the shipped
/// estimator; pixel-level backends pair with their own estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Raw sample payload
    pub data: Vec<f64>,
}

impl Frame {
    /// Build a feature-level frame for a visible, non-blinking face
    #[must_use]
    pub fn features(features: &[f64]) -> Self {
        let mut data = Vec::with_capacity(features.len() + 2);
        data.push(1.0);
        data.push(0.0);
        data.extend_from_slice(features);
        Self { data }
    }

    /// Build a frame in which no face is visible
    #[must_use]
    pub fn no_face() -> Self {
        Self { data: vec![0.0, 0.0] }
    }

    /// Build a frame capturing a blink
    #[must_use]
    pub fn blink() -> Self {
        Self { data: vec![1.0, 1.0] }
    }
}

/// Trait for measurement sources feeding the service
pub trait MeasurementSource: Send {
    /// Open the source for the given device id. Idempotent: opening an
    /// already-open source succeeds without reacquiring the device.
    fn open(&mut self, id: i32) -> Result<()>;

    /// Whether the source is currently open
    fn is_open(&self) -> bool;

    /// Read one sample. Fails with a resource error if the source is
    /// closed or the read itself fails.
    fn read_sample(&mut self) -> Result<Frame>;

    /// Release the underlying device. Safe to call when already closed.
    fn release(&mut self);
}

/// Deterministic synthetic source for development and tests.
///
/// Produces feature frames whose gaze target follows a Lissajous sweep of
/// the configured screen, so a trained linear model can recover the
/// mapping exactly. Blink frames, face-loss frames, read failures, and a
/// calibration cancellation can be injected at fixed ticks.
pub struct SyntheticSource {
    open: bool,
    tick: u64,
    screen_width: f64,
    screen_height: f64,
    /// Simulated native frame interval; reads block for this long
    frame_interval: Option<std::time::Duration>,
    /// Every n-th sample is a blink
    blink_every: Option<u64>,
    /// Every n-th sample loses the face
    no_face_every: Option<u64>,
    /// All reads fail once this tick is reached
    fail_from_tick: Option<u64>,
    /// Reads report operator cancellation once this tick is reached
    cancel_from_tick: Option<u64>,
}

impl SyntheticSource {
    /// Create a source sweeping the given screen dimensions
    #[must_use]
    pub fn new(screen_width: f64, screen_height: f64) -> Self {
        Self {
            open: false,
            tick: 0,
            screen_width,
            screen_height,
            frame_interval: None,
            blink_every: None,
            no_face_every: None,
            fail_from_tick: None,
            cancel_from_tick: None,
        }
    }

    /// Pace reads at a simulated native frame rate
    #[must_use]
    pub fn with_frame_interval(mut self, interval: std::time::Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    /// Inject a blink every `n` samples
    #[must_use]
    pub fn with_blink_every(mut self, n: u64) -> Self {
        self.blink_every = Some(n);
        self
    }

    /// Lose the face every `n` samples
    #[must_use]
    pub fn with_no_face_every(mut self, n: u64) -> Self {
        self.no_face_every = Some(n);
        self
    }

    /// Make every read fail from sample `tick` onwards
    #[must_use]
    pub fn with_failures_from(mut self, tick: u64) -> Self {
        self.fail_from_tick = Some(tick);
        self
    }

    /// Report operator cancellation from sample `tick` onwards
    #[must_use]
    pub fn with_cancel_from(mut self, tick: u64) -> Self {
        self.cancel_from_tick = Some(tick);
        self
    }

    /// The scripted gaze target for a given tick
    #[must_use]
    pub fn target_at(&self, tick: u64) -> (f64, f64) {
        let t = tick as f64 * 0.05;
        let x = (0.5 + 0.4 * (0.7 * t).sin()) * self.screen_width;
        let y = (0.5 + 0.4 * (1.1 * t).cos()) * self.screen_height;
        (x, y)
    }

    /// The feature vector imaging a gaze at `(x, y)`: normalized screen
    /// coordinates plus a stable third channel
    #[must_use]
    pub fn features_for(&self, x: f64, y: f64) -> Vec<f64> {
        let nx = x / self.screen_width;
        let ny = y / self.screen_height;
        vec![nx, ny, 0.5 * (nx + ny)]
    }
}

impl MeasurementSource for SyntheticSource {
    fn open(&mut self, _id: i32) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_sample(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(Error::Resource("Source is not open".to_string()));
        }

        if let Some(interval) = self.frame_interval {
            std::thread::sleep(interval);
        }

        let tick = self.tick;
        self.tick += 1;

        if let Some(from) = self.cancel_from_tick {
            if tick >= from {
                return Err(Error::Cancelled("Calibration cancelled by user".to_string()));
            }
        }
        if let Some(from) = self.fail_from_tick {
            if tick >= from {
                return Err(Error::Resource("Could not read frame".to_string()));
            }
        }
        if let Some(n) = self.no_face_every {
            if n > 0 && tick % n == n - 1 {
                return Ok(Frame::no_face());
            }
        }
        if let Some(n) = self.blink_every {
            if n > 0 && tick % n == n - 1 {
                return Ok(Frame::blink());
            }
        }

        let (x, y) = self.target_at(tick);
        Ok(Frame::features(&self.features_for(x, y)))
    }

    fn release(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_requires_open() {
        let mut source = SyntheticSource::new(1920.0, 1080.0);
        assert!(!source.is_open());
        assert!(source.read_sample().is_err());

        source.open(0).expect("open");
        assert!(source.is_open());
        assert!(source.read_sample().is_ok());
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut source = SyntheticSource::new(1920.0, 1080.0);
        source.open(0).expect("open");
        source.open(0).expect("reopen");
        assert!(source.is_open());

        source.release();
        source.release();
        assert!(!source.is_open());
    }

    #[test]
    fn test_blink_injection() {
        let mut source = SyntheticSource::new(1920.0, 1080.0).with_blink_every(3);
        source.open(0).expect("open");

        let frames: Vec<Frame> = (0..6).map(|_| source.read_sample().expect("read")).collect();
        assert_ne!(frames[0], Frame::blink());
        assert_ne!(frames[1], Frame::blink());
        assert_eq!(frames[2], Frame::blink());
        assert_eq!(frames[5], Frame::blink());
    }

    #[test]
    fn test_failures_from_tick() {
        let mut source = SyntheticSource::new(1920.0, 1080.0).with_failures_from(2);
        source.open(0).expect("open");

        assert!(source.read_sample().is_ok());
        assert!(source.read_sample().is_ok());
        assert!(source.read_sample().is_err());
        assert!(source.read_sample().is_err());
    }

    #[test]
    fn test_trajectory_stays_on_screen() {
        let source = SyntheticSource::new(1920.0, 1080.0);
        for tick in 0..500 {
            let (x, y) = source.target_at(tick);
            assert!((0.0..=1920.0).contains(&x));
            assert!((0.0..=1080.0).contains(&y));
        }
    }
}
