//! Helper functions and utilities for tests
#![allow(dead_code)]

use gaze_tracking::config::Config;
use gaze_tracking::estimator::RidgeEstimator;
use gaze_tracking::service::GazeService;
use gaze_tracking::source::SyntheticSource;
use serde_json::Value;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Shared output buffer so tests can inspect everything the service
/// emitted while the worker thread holds a clone
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// All emitted lines, parsed
    pub fn lines(&self) -> Vec<Value> {
        let buffer = self.0.lock().expect("buffer lock");
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(|line| serde_json::from_str(line).expect("service emitted invalid JSON"))
            .collect()
    }

    /// Lines of a given type ("response", "gaze_update", "ready", "error")
    pub fn of_type(&self, kind: &str) -> Vec<Value> {
        self.lines().into_iter().filter(|v| v["type"] == kind).collect()
    }

    /// The most recent response line
    pub fn last_response(&self) -> Value {
        self.of_type("response").pop().expect("no response emitted")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub type TestService = GazeService<SyntheticSource, RidgeEstimator, SharedBuf>;

/// Test configuration with short calibration windows and a fast worker
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.calibration.point_duration_ms = 30;
    config.tracking.period_ms = 5;
    config
}

/// Build a service around the given source, returning the output handle
pub fn service_with_source(source: SyntheticSource) -> (TestService, SharedBuf) {
    let config = test_config();
    let estimator = RidgeEstimator::new(config.model.ridge_alpha);
    let output = SharedBuf::new();
    let service = GazeService::new(config, source, estimator, output.clone()).expect("service");
    (service, output)
}

/// A synthetic source paced at a 1 ms native frame rate, so calibration
/// windows collect tens of samples rather than spinning unbounded
pub fn paced_source() -> SyntheticSource {
    SyntheticSource::new(1920.0, 1080.0).with_frame_interval(std::time::Duration::from_millis(1))
}

/// Build a service with a clean synthetic source
pub fn service() -> (TestService, SharedBuf) {
    service_with_source(paced_source())
}

/// Drive the service to a calibrated state via the protocol
pub fn calibrate(service: &mut TestService, output: &SharedBuf) {
    service
        .handle_line(r#"{"command": "add_calibration_point", "request_id": "cal-1", "screen_x": 400.0, "screen_y": 300.0}"#)
        .expect("add point");
    assert_eq!(output.last_response()["success"], true, "point collection failed");

    service
        .handle_line(r#"{"command": "train_model", "request_id": "cal-2"}"#)
        .expect("train");
    assert_eq!(output.last_response()["success"], true, "training failed");
}
