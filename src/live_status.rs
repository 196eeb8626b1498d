use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// Point-in-time status written out for an external UI to poll.
///
/// Write-only plumbing: the binary fills this from a `TripStats` snapshot
/// plus session metadata after each loop pass and saves it as JSON. Nothing
/// in the engine ever reads it back.
#[derive(Serialize, Deserialize, Clone)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub recording: bool,
    pub elapsed_seconds: u64,
    pub total_distance_m: f64,
    /// Speed of the last accepted moving sample; zero while stationary.
    pub current_speed_kmh: f64,
    pub top_speed_kmh: f64,
    pub average_speed_kmh: f64,
    // Sample accounting
    pub gps_samples: u32,
    pub rejected_samples: u32,
    pub moved_samples: u32,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            recording: false,
            elapsed_seconds: 0,
            total_distance_m: 0.0,
            current_speed_kmh: 0.0,
            top_speed_kmh: 0.0,
            average_speed_kmh: 0.0,
            gps_samples: 0,
            rejected_samples: 0,
            moved_samples: 0,
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        let mut status = LiveStatus::new();
        status.recording = true;
        status.elapsed_seconds = 90;
        status.total_distance_m = 812.5;
        status.current_speed_kmh = 31.0;

        let json = serde_json::to_string(&status).unwrap();
        let back: LiveStatus = serde_json::from_str(&json).unwrap();
        assert!(back.recording);
        assert_eq!(back.elapsed_seconds, 90);
        assert_eq!(back.total_distance_m, 812.5);
    }
}
