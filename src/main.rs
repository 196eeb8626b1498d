use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use trip_meter_rs::live_status::current_timestamp;
use trip_meter_rs::{
    sensors, GpsSample, LiveStatus, SampleOutcome, TripConfig, TripHistory, TripRecord,
    TripSession,
};

#[derive(Parser, Debug)]
#[command(name = "trip_meter")]
#[command(about = "GPS trip meter - distance, speed and duration from a live or recorded sample stream", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until the source ends)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// Replay a recorded session file (one JSON sample per line) instead of
    /// polling the device
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory for live status
    #[arg(long, default_value = "trip_meter_sessions")]
    output_dir: String,

    /// Trip history file (defaults to <output-dir>/history.json)
    #[arg(long)]
    history_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[{}] Trip Meter Starting", ts_now());
    println!("  Duration: {} seconds (0=until source ends)", args.duration);
    match &args.input {
        Some(path) => println!("  Source: replay {}", path.display()),
        None => println!("  Source: live (device poll with mock fallback)"),
    }
    println!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;
    let history_path = args
        .history_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&args.output_dir).join("history.json"));
    let history = TripHistory::new(&history_path);

    let session = TripSession::new(TripConfig::default());
    session.start_recording(current_timestamp())?;

    let (gps_tx, mut gps_rx) = mpsc::channel::<GpsSample>(100);
    let _source_handle = match args.input.clone() {
        Some(path) => tokio::spawn(sensors::replay_loop(path, gps_tx)),
        None => tokio::spawn(sensors::live_loop(gps_tx)),
    };

    let start = Utc::now();
    let mut ticker = interval(Duration::from_secs(1));
    let mut current_speed_kmh = 0.0;
    let status_path = format!("{}/live_status.json", args.output_dir);

    println!("[{}] Recording...", ts_now());

    loop {
        tokio::select! {
            maybe_sample = gps_rx.recv() => {
                let Some(sample) = maybe_sample else {
                    println!("[{}] Sample source ended, stopping...", ts_now());
                    break;
                };
                match session.push_sample(&sample)? {
                    Some(SampleOutcome::Moved { speed_kmh, .. }) => {
                        current_speed_kmh = speed_kmh;
                    }
                    Some(SampleOutcome::Stationary) => {
                        current_speed_kmh = 0.0;
                    }
                    Some(SampleOutcome::Rejected { reason }) => {
                        log::warn!(
                            "sample rejected ({reason:?}): accuracy {:.1} m",
                            sample.accuracy
                        );
                    }
                    None => {}
                }
            }
            _ = ticker.tick() => {
                session.tick(current_timestamp())?;

                if args.duration > 0 {
                    let elapsed = Utc::now().signed_duration_since(start);
                    if elapsed.num_seconds() as u64 >= args.duration {
                        println!("[{}] Duration reached, stopping...", ts_now());
                        break;
                    }
                }

                let _ = write_live_status(&session, current_speed_kmh, &status_path);
            }
        }
    }

    // Finalize: close the trip and append it to the history
    let stats = session.stop_recording()?;
    let record = TripRecord::from_stats(&stats, Utc::now());
    history.append(record)?;
    let _ = write_live_status(&session, 0.0, &status_path);

    let meta = session.get_metadata()?;
    println!("\n=== Final Stats ===");
    println!("Elapsed: {} s", stats.elapsed_seconds);
    println!("Distance: {:.2} m", stats.total_distance_m);
    println!("Top speed: {:.2} km/h", stats.top_speed_kmh);
    println!("Average speed: {:.2} km/h", stats.average_speed_kmh);
    println!(
        "Samples: {} ({} moved, {} rejected)",
        meta.gps_sample_count, meta.moved_sample_count, meta.rejected_sample_count
    );
    println!("History: {}", history_path.display());

    Ok(())
}

fn write_live_status(
    session: &TripSession,
    current_speed_kmh: f64,
    path: &str,
) -> Result<()> {
    let stats = session.snapshot()?;
    let meta = session.get_metadata()?;

    let mut status = LiveStatus::new();
    status.timestamp = current_timestamp();
    status.recording = session.is_recording()?;
    status.elapsed_seconds = stats.elapsed_seconds;
    status.total_distance_m = stats.total_distance_m;
    status.current_speed_kmh = current_speed_kmh;
    status.top_speed_kmh = stats.top_speed_kmh;
    status.average_speed_kmh = stats.average_speed_kmh;
    status.gps_samples = meta.gps_sample_count;
    status.rejected_samples = meta.rejected_sample_count;
    status.moved_samples = meta.moved_sample_count;
    status.save(path)?;

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
