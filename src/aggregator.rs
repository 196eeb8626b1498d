// aggregator.rs — Pure computation layer for the trip meter
//
// Everything in this module is independent of:
//   - tokio / async runtime
//   - the location source (live device reader or replay file)
//   - File I/O, live status output, trip history
//
// It takes GPS samples in, produces per-sample outcomes and running trip
// statistics out. This means you can unit-test it with recorded data and
// replay whole sessions without touching the source or storage plumbing.
// The aggregator never reads a clock; `now` and sample timestamps are
// supplied by the caller, in seconds on the same monotonic timebase.

use serde::{Deserialize, Serialize};

use crate::geo::{coordinates_valid, haversine_m};
use crate::types::GpsSample;

/// m/s to km/h.
const MS_TO_KMH: f64 = 3.6;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Gate thresholds for sample filtering and accumulation.
///
/// Defaults are tuned for handheld/vehicle-mounted phone receivers. Every
/// gate is configurable so a device class with a different noise profile
/// can be accommodated without touching the engine.
#[derive(Clone, Debug)]
pub struct TripConfig {
    /// Reject samples whose reported accuracy radius exceeds this (meters).
    pub accuracy_threshold_m: f64,
    /// Speeds below this are treated as standing still (km/h).
    pub min_speed_kmh: f64,
    /// Speeds above this are treated as receiver glitches (km/h).
    pub max_speed_kmh: f64,
    /// Position steps shorter than this do not count as distance (meters).
    pub distance_jitter_floor_m: f64,
    /// Minimum interval for position-derived speed; shorter intervals are
    /// dominated by receiver noise and read as stationary (seconds).
    pub min_derived_interval_secs: f64,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold_m: 15.0,
            min_speed_kmh: 0.5,
            max_speed_kmh: 250.0,
            distance_jitter_floor_m: 2.5,
            min_derived_interval_secs: 0.5,
        }
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Why a sample was discarded without touching any state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Accuracy radius above the configured threshold.
    LowAccuracy,
    /// NaN or out-of-range coordinates, or a non-finite accuracy/timestamp.
    MalformedCoordinates,
}

/// Result of folding one sample into the trip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleOutcome {
    /// Sample discarded entirely; the movement baseline is untouched.
    Rejected { reason: RejectReason },
    /// Sample accepted but read as standing still. The baseline advances to
    /// this fix so the next delta is measured from here.
    Stationary,
    /// Sample accepted as real movement. `distance_m` is the amount actually
    /// added to the total: zero when the position step was under the jitter
    /// floor or when this was the first accepted fix of the trip.
    Moved { speed_kmh: f64, distance_m: f64 },
}

// ─── Statistics snapshot ─────────────────────────────────────────────────────

/// Running trip statistics, read by the presentation and storage layers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripStats {
    pub elapsed_seconds: u64,
    pub total_distance_m: f64,
    pub top_speed_kmh: f64,
    pub average_speed_kmh: f64,
}

// ─── The aggregator ──────────────────────────────────────────────────────────

/// Last accepted fix, the reference point for the next speed/distance delta.
#[derive(Clone, Copy, Debug)]
struct Baseline {
    latitude: f64,
    longitude: f64,
    timestamp: f64,
}

/// Stateful engine folding GPS samples into running trip statistics.
///
/// One instance per trip. Not internally synchronized: when samples and
/// timer ticks arrive from different tasks, put the aggregator behind a
/// mutex (see `TripSession`).
pub struct TripAggregator {
    config: TripConfig,
    start_time: f64,
    elapsed_seconds: u64,
    total_distance_m: f64,
    top_speed_kmh: f64,
    speed_sum: f64,
    speed_samples: u32,
    baseline: Option<Baseline>,
}

impl TripAggregator {
    pub fn new(config: TripConfig, now: f64) -> Self {
        Self {
            config,
            start_time: now,
            elapsed_seconds: 0,
            total_distance_m: 0.0,
            top_speed_kmh: 0.0,
            speed_sum: 0.0,
            speed_samples: 0,
            baseline: None,
        }
    }

    /// Discard all progress and start a new trip at `now`.
    pub fn reset(&mut self, now: f64) {
        self.start_time = now;
        self.elapsed_seconds = 0;
        self.total_distance_m = 0.0;
        self.top_speed_kmh = 0.0;
        self.speed_sum = 0.0;
        self.speed_samples = 0;
        self.baseline = None;
    }

    /// Recompute elapsed whole seconds from the trip start.
    ///
    /// Always derived from `start_time`, never incremented, so skipped or
    /// irregular timer ticks cannot make the clock drift.
    pub fn tick(&mut self, now: f64) -> u64 {
        let elapsed = (now - self.start_time).floor();
        self.elapsed_seconds = if elapsed > 0.0 { elapsed as u64 } else { 0 };
        self.elapsed_seconds
    }

    /// Fold one sample into the trip and report what happened.
    ///
    /// Total over any well-typed sample: malformed input comes back as a
    /// rejection outcome, never a panic or a poisoned accumulator.
    pub fn observe(&mut self, sample: &GpsSample) -> SampleOutcome {
        if !coordinates_valid(sample.latitude, sample.longitude)
            || !sample.timestamp.is_finite()
            || !sample.accuracy.is_finite()
            || sample.accuracy < 0.0
        {
            return SampleOutcome::Rejected {
                reason: RejectReason::MalformedCoordinates,
            };
        }
        if sample.accuracy > self.config.accuracy_threshold_m {
            return SampleOutcome::Rejected {
                reason: RejectReason::LowAccuracy,
            };
        }

        // Out-of-order or repeated fixes would mean a non-positive interval.
        // Clamp to stationary and move the baseline onto the newer fix.
        if let Some(baseline) = self.baseline {
            if sample.timestamp <= baseline.timestamp {
                self.set_baseline(sample);
                return SampleOutcome::Stationary;
            }
        }

        let speed_kmh = self.derive_speed_kmh(sample);
        let step_m = self
            .baseline
            .map(|b| haversine_m(b.latitude, b.longitude, sample.latitude, sample.longitude));
        self.set_baseline(sample);

        if speed_kmh < self.config.min_speed_kmh || speed_kmh > self.config.max_speed_kmh {
            return SampleOutcome::Stationary;
        }

        // Distance always comes from the position delta, regardless of which
        // speed branch fired, and only counts when it clears the jitter floor.
        let distance_m = match step_m {
            Some(d) if d >= self.config.distance_jitter_floor_m => d,
            _ => 0.0,
        };

        self.total_distance_m += distance_m;
        if speed_kmh > self.top_speed_kmh {
            self.top_speed_kmh = speed_kmh;
        }
        self.speed_sum += speed_kmh;
        self.speed_samples += 1;

        SampleOutcome::Moved {
            speed_kmh,
            distance_m,
        }
    }

    /// Current statistics. Pure read.
    pub fn snapshot(&self) -> TripStats {
        TripStats {
            elapsed_seconds: self.elapsed_seconds,
            total_distance_m: self.total_distance_m,
            top_speed_kmh: self.top_speed_kmh,
            average_speed_kmh: if self.speed_samples > 0 {
                self.speed_sum / self.speed_samples as f64
            } else {
                0.0
            },
        }
    }

    pub fn config(&self) -> &TripConfig {
        &self.config
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Device-reported speed wins over position-derived speed; the former is
    /// typically Doppler-derived and far less sensitive to position noise.
    fn derive_speed_kmh(&self, sample: &GpsSample) -> f64 {
        if let Some(ms) = sample.speed {
            if ms.is_finite() && ms >= 0.0 {
                return ms * MS_TO_KMH;
            }
        }
        if let Some(baseline) = self.baseline {
            let dt = sample.timestamp - baseline.timestamp;
            if dt < self.config.min_derived_interval_secs {
                return 0.0;
            }
            let d = haversine_m(
                baseline.latitude,
                baseline.longitude,
                sample.latitude,
                sample.longitude,
            );
            return d / dt * MS_TO_KMH;
        }
        0.0
    }

    fn set_baseline(&mut self, sample: &GpsSample) {
        self.baseline = Some(Baseline {
            latitude: sample.latitude,
            longitude: sample.longitude,
            timestamp: sample.timestamp,
        });
    }
}
