//! Gaze tracking service over stdin/stdout line-delimited JSON.

use anyhow::Result;
use clap::Parser;
use gaze_tracking::config::Config;
use gaze_tracking::estimator::RidgeEstimator;
use gaze_tracking::service::GazeService;
use gaze_tracking::source::SyntheticSource;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long, default_value = "0")]
    cam: i32,

    /// Filter type for gaze smoothing (kalman, exponential, none)
    #[arg(short, long)]
    filter: Option<String>,

    /// Default model file path for save_model / load_model
    #[arg(short, long)]
    model: Option<String>,

    /// Simulated source frame interval in milliseconds
    #[arg(long, default_value = "33")]
    frame_interval_ms: u64,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger; diagnostics go to stderr, stdout carries only
    // protocol JSON
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Gaze Tracking Service");

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {config_path}");
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    // Command line overrides
    config.source.camera_id = args.cam;
    if let Some(filter) = args.filter {
        config.filter.filter_type = filter;
    }
    if let Some(model) = args.model {
        config.model.path = model.into();
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    // The synthetic source stands in for a camera-backed implementation
    // of MeasurementSource; real capture backends plug in through the
    // same trait
    let source = SyntheticSource::new(
        config.calibration.screen_width,
        config.calibration.screen_height,
    )
    .with_frame_interval(Duration::from_millis(args.frame_interval_ms));
    let estimator = RidgeEstimator::new(config.model.ridge_alpha);

    let stdin = std::io::stdin();
    let mut service = GazeService::new(config, source, estimator, std::io::stdout())?;
    service.run(stdin.lock())?;

    Ok(())
}
