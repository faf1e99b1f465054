//! lane_signal - count vehicles per lane and compute green times
//!
//! Reads the lane file, resolves each lane's frame, runs the configured
//! detector, writes the pipeline result as JSON and raises heavy-traffic
//! alerts for lanes over the threshold.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use lane_signal::{
    default_detectors, dispatch, AlertSink, FileFrameResolver, LaneSet, LogAlertSink,
    Pipeline, Point, SignalConfig,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (.toml or .json).
    #[arg(long, env = "LANE_SIGNAL_CONFIG")]
    config: Option<PathBuf>,
    /// Lane file (JSON array of lanes).
    #[arg(long)]
    lanes: Option<PathBuf>,
    /// Output path for the pipeline result.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Frame search root; repeat for several. Replaces configured roots.
    #[arg(long = "root")]
    roots: Vec<PathBuf>,
    /// Detector backend (sidecar|stub).
    #[arg(long)]
    detector: Option<String>,
    /// Lanes processed concurrently.
    #[arg(long)]
    workers: Option<usize>,
    /// POST heavy-traffic alerts to this URL (requires the alert-http feature).
    #[arg(long)]
    alert_url: Option<String>,
    /// Alert when a lane has more vehicles than this.
    #[arg(long)]
    alert_threshold: Option<u32>,
    /// Print which lane contains the image point X,Y and exit.
    #[arg(long, value_name = "X,Y")]
    locate: Option<String>,
    /// Also print the result JSON to stdout.
    #[arg(long)]
    print: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = build_config(&args)?;

    let lanes = LaneSet::load(&cfg.lanes_path)?;
    log::info!(
        "loaded {} lanes from {}",
        lanes.len(),
        cfg.lanes_path.display()
    );

    if let Some(spec) = &args.locate {
        let point = parse_point(spec)?;
        match lanes.lane_for_point(point) {
            Some(lane_id) => println!("{}", lane_id),
            None => println!("unknown"),
        }
        return Ok(());
    }

    let detector = default_detectors().select(Some(&cfg.detector))?;
    log::info!("detector: {}", detector.name());
    let resolver = FileFrameResolver::new(cfg.search_roots.clone());
    let pipeline = Pipeline::new(Arc::new(resolver), detector)
        .with_normalizer(cfg.normalizer())
        .with_timing(cfg.timing)?
        .with_workers(cfg.workers)?;

    let is_tty = std::io::stderr().is_terminal();
    let progress = ui::LaneProgress::new(
        ui::UiMode::parse(&args.ui),
        is_tty,
        !std::io::stdout().is_terminal(),
        lanes.len(),
    );
    let result = pipeline.run_with_progress(lanes.lanes(), &|lane| progress.lane_done(lane))?;
    progress.finish();

    result.write_json(&cfg.output_path)?;
    log::info!("saved result to {}", cfg.output_path.display());

    let alerts = cfg.alert.alerts_for(&result);
    if !alerts.is_empty() {
        let sink = alert_sink(cfg.alert.url.as_deref())?;
        let delivered = dispatch(sink.as_ref(), &alerts);
        log::info!(
            "{} of {} alerts delivered via {}",
            delivered,
            alerts.len(),
            sink.name()
        );
    }

    let summary = result.summary();
    log::info!(
        "{} lanes, {} vehicles, busiest lane {}, {} degraded",
        summary.lanes,
        summary.vehicles,
        summary.busiest_lane.as_deref().unwrap_or("-"),
        summary.degraded_lanes
    );
    for lane in &result.lanes {
        eprintln!(
            "lane {:>8}  {:>3} vehicles  green {:>2}s  {:?}",
            lane.lane_id, lane.total, lane.green_time, lane.status
        );
    }

    if args.print {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<SignalConfig> {
    let mut cfg = SignalConfig::load_from(args.config.as_deref())?;
    if let Some(lanes) = &args.lanes {
        cfg.lanes_path = lanes.clone();
    }
    if let Some(output) = &args.output {
        cfg.output_path = output.clone();
    }
    if !args.roots.is_empty() {
        cfg.search_roots = args.roots.clone();
    }
    if let Some(detector) = &args.detector {
        cfg.detector = detector.clone();
    }
    if let Some(workers) = args.workers {
        cfg.workers = workers;
    }
    if let Some(url) = &args.alert_url {
        cfg.alert.url = Some(url.clone());
    }
    if let Some(threshold) = args.alert_threshold {
        cfg.alert.threshold = threshold;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn parse_point(spec: &str) -> Result<Point> {
    let (x, y) = spec
        .split_once(',')
        .ok_or_else(|| anyhow!("point must be X,Y, got '{}'", spec))?;
    let x: f64 = x.trim().parse().context("invalid X coordinate")?;
    let y: f64 = y.trim().parse().context("invalid Y coordinate")?;
    Ok(Point::new(x, y))
}

fn alert_sink(url: Option<&str>) -> Result<Box<dyn AlertSink>> {
    match url {
        #[cfg(feature = "alert-http")]
        Some(url) => Ok(Box::new(lane_signal::HttpAlertSink::new(url)?)),
        #[cfg(not(feature = "alert-http"))]
        Some(url) => {
            log::warn!(
                "alert url {} ignored: built without the alert-http feature",
                url
            );
            Ok(Box::new(LogAlertSink))
        }
        None => Ok(Box::new(LogAlertSink)),
    }
}
