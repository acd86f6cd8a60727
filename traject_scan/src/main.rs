//! # Traject Scan Binary
//!
//! Runs one trajectory scan from a configuration file and a list of points.
//!
//! # Usage
//!
//! ```bash
//! # Run a scan on the simulated controller
//! traject_scan --config config/scan.toml --points config/points.json
//!
//! # Verbose logging, JSON log output, print the readback report
//! traject_scan -c config/scan.toml -p config/points.json -v --json --report
//! ```
//!
//! The points file is a JSON array of points, each an array with one entry per
//! axis; `null` marks an axis that does not move.

#![deny(warnings)]

use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use traject_common::config::LogLevel;
use traject_common::consts::DEFAULT_CONFIG_PATH;
use traject_common::controller::config::TrajectoryScanConfig;
use traject_scan::{
    CompileStrategy, CompiledProfile, DriverRegistry, MoveExecutor, Point, Readback,
};

/// Traject Scan - hardware trajectory scan coordinator
#[derive(Parser, Debug)]
#[command(name = "traject_scan")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Hardware trajectory scan coordinator with pluggable controller drivers")]
#[command(long_about = None)]
struct Args {
    /// Path to the scan configuration file (scan.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Path to the points file (JSON array of arrays, null = axis not moving)
    #[arg(short, long)]
    points: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Print a JSON report with the compiled profile and the readback
    #[arg(long)]
    report: bool,
}

/// Report printed with `--report`.
#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    service: &'a str,
    driver: &'a str,
    strategy: CompileStrategy,
    points: usize,
    profile: Option<CompiledProfile>,
    readback: Readback,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Trajectory scan failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = TrajectoryScanConfig::load_validated(&args.config);
    setup_tracing(
        &args,
        config.as_ref().map(|c| c.shared.log_level).unwrap_or_default(),
    );
    let config = config.map_err(|e| format!("{}: {e}", args.config.display()))?;

    info!(
        "Traject Scan v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let registry = DriverRegistry::with_builtin_drivers();
    let handle = registry.create(&config.controller)?;
    info!("Controller driver '{}' loaded", handle.controller.name());

    let executor = Arc::new(MoveExecutor::from_config(handle, &config)?);

    // Ctrl-C stops the hardware; the main thread then sees the aborted move.
    let on_signal = Arc::clone(&executor);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        if let Err(e) = on_signal.stop_and_reset() {
            warn!("Reset after signal failed: {e}");
        }
    })?;

    let points = load_points(&args.points)?;
    info!("Loaded {} points from {}", points.len(), args.points.display());
    let point_count = points.len();
    for point in points {
        executor.add_point(point)?;
    }

    let scan = run_scan(&executor);
    let reset = executor.stop_and_reset();
    let readback = scan?;
    reset?;

    if args.report {
        let report = ScanReport {
            service: &config.shared.service_name,
            driver: &config.controller.driver,
            strategy: if config.scan.use_alternate_method {
                CompileStrategy::ConstantVelocity
            } else {
                CompileStrategy::Pointwise
            },
            points: point_count,
            profile: readback.0,
            readback: readback.1,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    info!("Traject Scan complete");
    Ok(())
}

/// Prepare, execute, wait and read back one trajectory.
fn run_scan(
    executor: &MoveExecutor,
) -> Result<(Option<CompiledProfile>, Readback), traject_scan::ScanError> {
    executor.prepare_for_move()?;
    let profile = executor.compiled_profile();
    executor.start_move()?;
    executor.wait_while_moving()?;
    let readback = executor.read_back()?;
    info!(
        "Read back {} axes, {} pulses",
        readback.axes.len(),
        readback.actual_pulses
    );
    Ok((profile, readback))
}

/// Read the points file.
fn load_points(path: &Path) -> Result<Vec<Point>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let points: Vec<Point> = serde_json::from_str(&content)
        .map_err(|e| format!("invalid points file {}: {e}", path.display()))?;
    Ok(points)
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let directive: Directive = if args.verbose {
        Level::DEBUG.into()
    } else {
        configured
            .as_directive()
            .parse()
            .unwrap_or_else(|_| Level::INFO.into())
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
