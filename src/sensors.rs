//! Location sources feeding `GpsSample`s into a channel.
//!
//! Two sources: `replay_loop` plays back a recorded newline-delimited JSON
//! session, paced by the recorded timestamps; `live_loop` polls a device
//! reader on a fixed interval and falls back to synthesized fixes when no
//! reader is available. Source failures are the source's own problem: they
//! are logged and the loop keeps going. Absence of samples is never an
//! error for the consumer.

use crate::live_status::current_timestamp;
use crate::types::GpsSample;
use std::path::PathBuf;
use std::process::Command;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, sleep, Duration};

/// Longest pause honored between two replayed samples, so a recorded signal
/// gap does not stall a replay for minutes.
const MAX_REPLAY_GAP_SECS: f64 = 5.0;

/// Replay a recorded session file (one JSON sample per line).
pub async fn replay_loop(path: PathBuf, tx: Sender<GpsSample>) {
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(err) => {
            log::error!("failed to read replay file {}: {err}", path.display());
            return;
        }
    };

    let mut sample_count = 0u64;
    let mut last_timestamp: Option<f64> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sample: GpsSample = match serde_json::from_str(line) {
            Ok(sample) => sample,
            Err(err) => {
                log::warn!("skipping unparseable replay line: {err}");
                continue;
            }
        };

        // Pace playback by the recorded timestamp deltas
        if let Some(prev) = last_timestamp {
            let gap = (sample.timestamp - prev).clamp(0.0, MAX_REPLAY_GAP_SECS);
            if gap > 0.0 {
                sleep(Duration::from_secs_f64(gap)).await;
            }
        }
        last_timestamp = Some(sample.timestamp);

        match tx.try_send(sample) {
            Ok(_) => {
                sample_count += 1;
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                eprintln!("[replay] Channel closed after {} samples", sample_count);
                return;
            }
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                // Channel full, drop this sample
            }
        }
    }

    eprintln!("[replay] Finished, {} samples sent", sample_count);
}

/// Poll the device for fixes at ~1 Hz, with a mock fallback.
pub async fn live_loop(tx: Sender<GpsSample>) {
    let mut interval = interval(Duration::from_secs(1));
    let mut sample_count = 0u64;

    loop {
        interval.tick().await;

        let sample = match read_location() {
            Some(sample) => sample,
            None => mock_sample(),
        };

        match tx.try_send(sample) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 10 == 0 {
                    eprintln!("[gps] {} fixes", sample_count);
                }
            }
            Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                eprintln!("[gps] Channel closed after {} fixes", sample_count);
                break;
            }
            Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                // Channel full, drop this sample
            }
        }
    }
}

fn read_location() -> Option<GpsSample> {
    // Try to read from termux-location
    match Command::new("termux-location").arg("-p").arg("gps").output() {
        Ok(output) if output.status.success() => {
            let text = String::from_utf8_lossy(&output.stdout);
            parse_location_output(&text)
        }
        Ok(_) => None,
        Err(err) => {
            log::debug!("termux-location unavailable: {err}");
            None
        }
    }
}

/// Parse the termux-location JSON payload into a sample.
///
/// A missing or negative `speed` field reads as "no device speed" rather
/// than zero, so downstream speed derivation can fall back to positions.
fn parse_location_output(output: &str) -> Option<GpsSample> {
    let value: serde_json::Value = serde_json::from_str(output).ok()?;
    let latitude = value.get("latitude")?.as_f64()?;
    let longitude = value.get("longitude")?.as_f64()?;
    let accuracy = value.get("accuracy")?.as_f64()?;
    let speed = value
        .get("speed")
        .and_then(|s| s.as_f64())
        .filter(|s| *s >= 0.0);

    Some(GpsSample {
        timestamp: current_timestamp(),
        latitude,
        longitude,
        speed,
        accuracy,
    })
}

fn mock_sample() -> GpsSample {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed) as f64;

    GpsSample {
        timestamp: current_timestamp(),
        latitude: 37.7749 + seq * 0.0001,
        longitude: -122.4194 + seq * 0.0001,
        speed: Some(10.0 + (seq * 0.5).sin() * 5.0),
        accuracy: 5.0 + (seq * 0.1).sin() * 2.0,
    }
}
