//! # Stream Simulation
//!
//! Runs the synthetic producer against a full viewer core and walks
//! through a playback session:
//!
//! ```text
//! play ──► pause ──► step × 3 ──► seek ──► play
//! ```
//!
//! Usage:
//!
//! ```text
//! stream_simulation [--seconds N] [--rate HZ] [--config FILE] [--inline] [--corrupt N]
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use lanescope::playback::TransportMessage;
use lanescope::scene::RenderQuery;
use lanescope::{logging, ProducerConfig, SyntheticProducer, Viewer, ViewerConfig};

struct Args {
    seconds: f64,
    rate_hz: u32,
    config: Option<String>,
    inline: bool,
    corrupt_every: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        seconds: 4.0,
        rate_hz: 60,
        config: None,
        inline: false,
        corrupt_every: 0,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().ok_or_else(|| format!("{flag} needs a value"));
        match flag.as_str() {
            "--seconds" => args.seconds = value()?.parse().map_err(|e| format!("--seconds: {e}"))?,
            "--rate" => args.rate_hz = value()?.parse().map_err(|e| format!("--rate: {e}"))?,
            "--config" => args.config = Some(value()?),
            "--corrupt" => {
                args.corrupt_every = value()?.parse().map_err(|e| format!("--corrupt: {e}"))?;
            }
            "--inline" => args.inline = true,
            other => return Err(format!("unknown argument {other}")),
        }
    }
    if args.seconds <= 0.0 || args.rate_hz == 0 {
        return Err("--seconds and --rate must be positive".into());
    }
    Ok(args)
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!(
                "usage: stream_simulation [--seconds N] [--rate HZ] [--config FILE] [--inline] [--corrupt N]"
            );
            std::process::exit(2);
        }
    };

    let mut config = match &args.config {
        Some(path) => match ViewerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        },
        None => ViewerConfig::default(),
    };
    if args.inline {
        config.intake.use_worker = false;
    }
    if let Err(e) = logging::init(&config.log_filter) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              LANESCOPE - STREAM SIMULATION                       ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Duration:           {:.1} s", args.seconds);
    println!("│ Producer Rate:      {} Hz", args.rate_hz);
    println!("│ Render Rate:        {} Hz", config.playback.tick_rate_hz);
    println!("│ Inertial Capacity:  {}", config.playback.inertial_capacity);
    println!("│ Decode Worker:      {}", config.intake.use_worker);
    println!("│ Corrupt Every:      {}", args.corrupt_every);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let (mut viewer, intake) = match Viewer::build(&config) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let handle = viewer.handle();

    let stop = Arc::new(AtomicBool::new(false));
    let (seek_tx, seek_rx) = bounded::<u64>(4);
    let producer_config = ProducerConfig {
        rate_hz: args.rate_hz,
        corrupt_every: args.corrupt_every,
        ..ProducerConfig::default()
    };
    let producer_stop = Arc::clone(&stop);
    let producer = thread::Builder::new()
        .name("synthetic-producer".into())
        .spawn(move || {
            let mut producer = SyntheticProducer::new(producer_config);
            let interval = Duration::from_secs(1) / producer_config.rate_hz;
            let mut sent = 0u64;
            while !producer_stop.load(Ordering::Relaxed) {
                if let Ok(target) = seek_rx.try_recv() {
                    producer.seek_to(target);
                    intake.on_message(TransportMessage::Control(format!(
                        "{{\"op\":\"seek\",\"frame\":{target}}}"
                    )));
                }
                intake.on_message(producer.next_message());
                sent += 1;
                thread::sleep(interval);
            }
            (sent, intake)
        });
    let producer = match producer {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("error: failed to start producer: {e}");
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let phase = Duration::from_secs_f64(args.seconds / 4.0);

    println!("▶ play");
    viewer.run_for(phase);
    report_phase(&viewer);

    println!("⏸ pause");
    handle.pause();
    viewer.run_for(phase);
    report_phase(&viewer);

    for step in 1..=3 {
        handle.step_forward();
        let report = viewer.tick();
        println!(
            "⏭ step {step}: applied {:?}, queued {}",
            report.applied.map(|s| s.frame_id),
            viewer.playback().controller().queued_len()
        );
    }

    let target = 10_000;
    println!("⏩ seek to {target}");
    handle.seek();
    let _ = seek_tx.send(target);
    viewer.run_for(phase / 2);
    report_phase(&viewer);

    println!("▶ play");
    handle.play();
    viewer.run_for(phase);
    report_phase(&viewer);

    stop.store(true, Ordering::Relaxed);
    let (sent, intake) = match producer.join() {
        Ok(result) => result,
        Err(_) => {
            eprintln!("error: producer thread panicked");
            std::process::exit(1);
        }
    };
    let intake_stats = intake.stats();
    drop(intake);

    let playback = viewer.playback();
    let admission = playback.controller().stats();
    let health = playback.health();

    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    SIMULATION RESULTS                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ INTAKE ────────────────────────────────────────────────────────┐");
    println!("│ Messages Sent:      {sent}");
    println!("│ Binary Received:    {}", intake_stats.received);
    println!("│ Control Ignored:    {}", intake_stats.control_ignored);
    println!("│ Decoded:            {}", intake_stats.decoded);
    println!("│ Dropped (full):     {}", intake_stats.dropped);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!("┌─ ADMISSION ─────────────────────────────────────────────────────┐");
    println!("│ Offered:            {}", admission.offered);
    println!("│ Skipped (newer):    {}", admission.replaced);
    println!("│ Queued (paused):    {}", admission.queued);
    println!("│ Rejected (full):    {}", admission.rejected);
    println!("│ Delivered:          {}", admission.delivered);
    println!("│ Discarded:          {}", admission.discarded);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!("┌─ DECODE HEALTH ─────────────────────────────────────────────────┐");
    println!("│ Decoded:            {}", health.decoded_total());
    println!("│ Partial:            {}", health.partial_total());
    println!("│ Malformed:          {}", health.malformed_total());
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!("┌─ SCENE ─────────────────────────────────────────────────────────┐");
    println!("│ Objects:            {}", viewer.store().len());
    println!("│ Groups:             {}", viewer.store().index().group_count());
    println!("│ Generation:         {}", viewer.store().generation());
    println!("│ Ticks:              {}", playback.ticks());
    println!("│ Wall Time:          {:.2} s", start.elapsed().as_secs_f64());
    let consistent = viewer.store().check_invariants().is_ok();
    if consistent {
        println!("│ Group Index:        ✓ CONSISTENT");
    } else {
        println!("│ Group Index:        ✗ INCONSISTENT");
    }
    println!("└──────────────────────────────────────────────────────────────────┘");

    if !consistent {
        std::process::exit(1);
    }
}

fn report_phase(viewer: &Viewer) {
    let visible = viewer.store().renderables(&RenderQuery::all()).len();
    let change = viewer.poll_scene_changes();
    println!(
        "   objects {visible:>3}  generation {:>5}  last frame {:?}",
        viewer.store().generation(),
        change.and_then(|c| c.frame_id)
    );
}
