use crate::aggregator::TripStats;
use crate::error::{TripMeterError, TripResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One completed trip, as kept in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Completion time, ISO-8601.
    pub date: String,
    pub duration_seconds: u64,
    pub distance_meters: f64,
    pub top_speed_kmh: f64,
}

impl TripRecord {
    pub fn from_stats(stats: &TripStats, completed_at: DateTime<Utc>) -> Self {
        TripRecord {
            date: completed_at.to_rfc3339(),
            duration_seconds: stats.elapsed_seconds,
            distance_meters: stats.total_distance_m,
            top_speed_kmh: stats.top_speed_kmh,
        }
    }
}

/// Append-only history of completed trips, stored as a JSON array.
///
/// Records are only ever added; there is no edit or delete surface. A
/// missing file reads as an empty history.
pub struct TripHistory {
    path: PathBuf,
}

impl TripHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TripHistory { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all stored records.
    pub fn load(&self) -> TripResult<Vec<TripRecord>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(TripMeterError::Storage(err.to_string())),
        };
        serde_json::from_str(&contents).map_err(|err| TripMeterError::Storage(err.to_string()))
    }

    /// Append one record and write the file back.
    pub fn append(&self, record: TripRecord) -> TripResult<()> {
        let mut records = self.load()?;
        records.push(record);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|err| TripMeterError::Storage(err.to_string()))?;
            }
        }

        let json = serde_json::to_string_pretty(&records)
            .map_err(|err| TripMeterError::Storage(err.to_string()))?;
        std::fs::write(&self.path, json).map_err(|err| TripMeterError::Storage(err.to_string()))
    }
}
