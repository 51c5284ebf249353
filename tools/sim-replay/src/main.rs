use anyhow::{bail, Context, Result};
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use headway_sim::departures::upcoming_departures;
use headway_sim::prelude::*;
use headway_transit::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "sim-replay",
    author,
    version,
    about = "Drive the transit vehicle simulation headlessly over a synthetic timeline",
    long_about = "Loads a network records file (stops, lines, schedules), observes one or \
                  all lines, and ticks the simulation frame by frame from a fixed clock \
                  anchor. Positions are reported periodically.\n\n\
                  The timeline is synthetic, so runs are reproducible: the same records, \
                  start time and seed always produce the same positions. Routing is \
                  straight-line between stops; no network access happens."
)]
struct Args {
    /// Network records JSON file (stops, lines, vehicles)
    records: PathBuf,

    /// Simulate only this line id (default: every line in the file)
    #[arg(short, long)]
    line: Option<String>,

    /// Number of frames to drive
    #[arg(long, default_value = "600")]
    frames: u64,

    /// Frames per second of the synthetic timeline
    #[arg(long, default_value = "60")]
    fps: f64,

    /// Virtual clock speedup over real time
    #[arg(long, default_value = "60")]
    speed: f64,

    /// Virtual time of day the replay starts at (HH:MM)
    #[arg(long, default_value = "06:00")]
    start: String,

    /// Seed for per-vehicle speed and traffic draws
    #[arg(long)]
    seed: Option<u64>,

    /// Report positions every N frames (0 = only the final report)
    #[arg(long, default_value = "60")]
    report_every: u64,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct RecordsFile {
    stops: Vec<StopRecord>,
    lines: Vec<LineRecord>,
    #[serde(default)]
    vehicles: Vec<VehicleRecord>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    log::info!("=== Transit Simulation Replay ===");
    log::info!("Records: {}", args.records.display());

    if !args.records.exists() {
        bail!("Records file does not exist: {}", args.records.display());
    }
    if !(args.fps.is_finite() && args.fps > 0.0) {
        bail!("fps must be a positive number, got {}", args.fps);
    }

    let start_time = NaiveTime::parse_from_str(&args.start, "%H:%M")
        .with_context(|| format!("Bad start time {:?}, expected HH:MM", args.start))?;

    // Phase 1: Load the network
    log::info!("");
    log::info!("Phase 1: Loading network records...");
    let raw = std::fs::read_to_string(&args.records)
        .with_context(|| format!("Failed to read {}", args.records.display()))?;
    let records: RecordsFile = serde_json::from_str(&raw).context("Failed to parse records JSON")?;
    log::info!(
        "  {} stops, {} lines, {} vehicles in file",
        records.stops.len(),
        records.lines.len(),
        records.vehicles.len()
    );

    let snapshot = Arc::new(NetworkSnapshot::from_records(
        records.stops,
        records.lines,
        records.vehicles,
    ));
    log::info!(
        "  {} stops and {} lines survived validation",
        snapshot.all_stops().len(),
        snapshot.all_lines().len()
    );

    // Phase 2: Build the simulation
    log::info!("");
    log::info!("Phase 2: Building simulation...");
    log::info!("  Clock: {}x from {}", args.speed, start_time.format("%H:%M"));
    log::info!("  Routing: straight line between stops (offline)");

    // Frame 0 of the synthetic timeline is real timestamp 0
    let anchors = ClockAnchors::at(0, NaiveDateTime::default().date().and_time(start_time));
    let clock = VirtualClock::anchored(anchors, args.speed);
    let router = Arc::new(StraightLineRouter);
    let tuning = SimTuning::default();
    let mut sim = match args.seed {
        Some(seed) => {
            log::info!("  Seed: {}", seed);
            TransitSimulation::with_seed(snapshot.clone(), clock, tuning, router, seed)
        }
        None => TransitSimulation::new(snapshot.clone(), clock, tuning, router),
    };

    let line_ids: Vec<LineIdentifier> = match &args.line {
        Some(id) => vec![LineIdentifier::new(id)],
        None => snapshot.all_lines().iter().map(|l| l.id.clone()).collect(),
    };
    for line_id in &line_ids {
        let created = pollster::block_on(sim.observe(line_id))
            .with_context(|| format!("Cannot observe line {}", line_id))?;
        let line = snapshot.line(line_id).context("line vanished")?;
        log::info!("  Observing {} ({}): {} sessions", line.number, line.id, created);
    }
    if sim.session_count() == 0 {
        bail!("No line could be simulated (missing schedules or too few stops?)");
    }

    // Show each line's board at the start time
    let start_minute = start_time.hour() * 60 + start_time.minute();
    for line_id in &line_ids {
        let Some(line) = snapshot.line(line_id) else { continue };
        if let Some(schedule) = &line.schedule {
            let board = upcoming_departures(schedule, start_minute, 3);
            let times: Vec<String> = board.iter().map(|d| d.time.format("%H:%M").to_string()).collect();
            log::info!("  Line {} departures from {}: [{}]", line.number, args.start, times.join(", "));
        }
    }

    // Phase 3: Drive the frames
    log::info!("");
    log::info!(
        "Phase 3: Driving {} frames at {} fps ({:.1}s of render time)...",
        args.frames,
        args.fps,
        args.frames as f64 / args.fps
    );

    let dt = 1.0 / args.fps;
    let mut last_now = NaiveDateTime::default();
    for frame in 0..args.frames {
        let real_ms = (frame as f64 * 1000.0 / args.fps) as i64;
        let sim_now = sim.tick_at(real_ms, dt);
        last_now = sim_now;

        if args.report_every > 0 && frame % args.report_every == 0 {
            log::info!(
                "  [{} | frame {:>5}] {} active vehicles",
                sim_now.format("%H:%M:%S"),
                frame,
                sim.vehicle_count()
            );
            for view in sim.vehicle_views() {
                log::debug!(
                    "    {} {} {:.5},{:.5} progress {:.3}{}",
                    view.id,
                    view.direction,
                    view.latitude,
                    view.longitude,
                    view.progress,
                    if view.paused { " (held)" } else { "" }
                );
            }
        }
    }

    // Summary
    log::info!("");
    log::info!("Final virtual time: {}", last_now.format("%H:%M:%S"));
    log::info!("Active vehicles: {}", sim.vehicle_count());
    for view in sim.vehicle_views() {
        log::info!(
            "  {} at {:.5},{:.5} ({:.1}% of route)",
            view.id,
            view.latitude,
            view.longitude,
            view.progress * 100.0
        );
    }
    log::info!("Done!");

    Ok(())
}
