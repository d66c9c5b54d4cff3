//! Wire protocol: commands in, responses and events out.
//!
//! One JSON object per line in both directions. Commands parse into a
//! tagged [`Command`] enum with parameters validated up front; unknown
//! commands and bad parameters become failure responses carrying the
//! original `request_id`, while lines that are not JSON at all become
//! protocol error events. All output funnels through [`OutputChannel`],
//! which serializes whole lines so worker events and responses never
//! interleave mid-line.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A parsed command with its validated parameters
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Blocking batch calibration over the 3x3 target grid
    RunCalibration {
        #[serde(default)]
        camera_id: Option<i32>,
    },
    /// Start the tracking worker
    StartTracking,
    /// Stop the tracking worker
    StopTracking,
    /// Collect one calibration point's window of samples
    AddCalibrationPoint {
        screen_x: f64,
        screen_y: f64,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    /// Train the model from accumulated calibration samples
    TrainModel,
    /// Discard model, samples, and filter state
    ClearCalibration,
    /// One-shot gaze sample
    GetGaze,
    /// Persist the trained model
    SaveModel {
        #[serde(default)]
        filepath: Option<PathBuf>,
    },
    /// Load a persisted model
    LoadModel {
        #[serde(default)]
        filepath: Option<PathBuf>,
    },
    /// Liveness check
    Ping,
}

const KNOWN_COMMANDS: &[&str] = &[
    "run_calibration",
    "start_tracking",
    "stop_tracking",
    "add_calibration_point",
    "train_model",
    "clear_calibration",
    "get_gaze",
    "save_model",
    "load_model",
    "ping",
];

/// One inbound request: an opaque id plus the decoded command, or the
/// reason the command part could not be decoded
#[derive(Debug)]
pub struct Request {
    /// Echoed verbatim in the response; `Null` when absent
    pub request_id: Value,
    /// Decoded command, or a human-readable rejection reason
    pub command: std::result::Result<Command, String>,
}

impl Request {
    /// Parse one input line. Fails only when the line is not a JSON
    /// object at all; command-level problems are carried inside the
    /// request so the response can echo the id.
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| Error::Protocol(format!("Invalid JSON: {e}")))?;
        if !value.is_object() {
            return Err(Error::Protocol("Expected a JSON object".to_string()));
        }

        let request_id = value.get("request_id").cloned().unwrap_or(Value::Null);

        let command = match value.get("command").and_then(Value::as_str) {
            None => Err("Missing command field".to_string()),
            Some(name) if !KNOWN_COMMANDS.contains(&name) => Err(format!("Unknown command: {name}")),
            Some(name) => serde_json::from_value::<Command>(value.clone())
                .map_err(|e| format!("Invalid parameters for {name}: {e}")),
        };

        Ok(Self { request_id, command })
    }
}

/// A gaze coordinate pair on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePoint {
    pub x: f64,
    pub y: f64,
}

/// Payload of a gaze sample, shared by `get_gaze` responses and
/// `gaze_update` events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GazeReport {
    pub success: bool,
    pub gaze: Option<GazePoint>,
    pub blink: bool,
    pub no_face: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_calibrated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_gaze: Option<GazePoint>,
}

impl GazeReport {
    /// A smoothed prediction with the raw coordinates alongside
    #[must_use]
    pub fn gaze(smoothed: GazePoint, raw: GazePoint) -> Self {
        Self {
            success: true,
            gaze: Some(smoothed),
            blink: false,
            no_face: false,
            not_calibrated: None,
            raw_gaze: Some(raw),
        }
    }

    /// No face visible in the sample
    #[must_use]
    pub fn no_face() -> Self {
        Self {
            success: true,
            gaze: None,
            blink: false,
            no_face: true,
            not_calibrated: None,
            raw_gaze: None,
        }
    }

    /// A blink was detected
    #[must_use]
    pub fn blink() -> Self {
        Self {
            success: true,
            gaze: None,
            blink: true,
            no_face: false,
            not_calibrated: None,
            raw_gaze: None,
        }
    }

    /// Face visible but no model established
    #[must_use]
    pub fn not_calibrated() -> Self {
        Self {
            success: true,
            gaze: None,
            blink: false,
            no_face: false,
            not_calibrated: Some(true),
            raw_gaze: None,
        }
    }
}

/// Serialized line-oriented output channel shared by the protocol engine
/// and the tracking worker
pub struct OutputChannel<W: Write + Send> {
    inner: Arc<Mutex<W>>,
}

impl<W: Write + Send> Clone for OutputChannel<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write + Send> OutputChannel<W> {
    /// Wrap a writer; all lines go out under one lock
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    fn write_line(&self, value: &Value) -> Result<()> {
        let line = serde_json::to_string(value)?;
        let mut writer = self
            .inner
            .lock()
            .map_err(|_| Error::Protocol("Output channel poisoned".to_string()))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }

    /// Emit the startup ready event
    pub fn send_ready(&self) -> Result<()> {
        self.write_line(&serde_json::json!({"type": "ready"}))
    }

    /// Emit a protocol-level error event (not tied to a request)
    pub fn send_error_event(&self, message: &str) -> Result<()> {
        self.write_line(&serde_json::json!({"type": "error", "error": message}))
    }

    /// Emit a gaze update event from the tracking worker
    pub fn send_gaze_update(&self, report: &GazeReport) -> Result<()> {
        let data = serde_json::to_value(report)?;
        self.write_line(&serde_json::json!({"type": "gaze_update", "data": data}))
    }

    /// Emit the response for one request. `fields` is merged into the
    /// response object; a `success` key in it wins over the default.
    pub fn send_response(&self, request_id: &Value, success: bool, fields: Value) -> Result<()> {
        let mut object = serde_json::Map::new();
        object.insert("type".to_string(), Value::String("response".to_string()));
        object.insert("request_id".to_string(), request_id.clone());
        object.insert("success".to_string(), Value::Bool(success));
        if let Value::Object(extra) = fields {
            for (key, value) in extra {
                object.insert(key, value);
            }
        }
        self.write_line(&Value::Object(object))
    }
}
