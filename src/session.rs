use crate::aggregator::{SampleOutcome, TripAggregator, TripConfig, TripStats};
use crate::error::{TripMeterError, TripResult};
use crate::types::GpsSample;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Session created but not recording
    Idle,
    /// Folding incoming samples into the trip
    Recording,
    /// Paused (clock still runs, samples are dropped)
    Paused,
}

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub start_time: String,
    pub state: SessionState,
    pub gps_sample_count: u32,
    pub rejected_sample_count: u32,
    pub moved_sample_count: u32,
}

/// A recording session owning one trip aggregator.
///
/// Location updates and timer ticks may arrive from different tasks; the
/// aggregator only permits one call in flight at a time, so it lives behind
/// a mutex here and every operation serializes through it.
pub struct TripSession {
    metadata: Arc<Mutex<SessionMetadata>>,
    aggregator: Arc<Mutex<TripAggregator>>,
}

impl TripSession {
    /// Create a new session in Idle state
    pub fn new(config: TripConfig) -> Self {
        let session_id = format!("trip_{}", Utc::now().timestamp_millis());
        let start_time = Utc::now().to_rfc3339();

        let metadata = SessionMetadata {
            session_id,
            start_time,
            state: SessionState::Idle,
            gps_sample_count: 0,
            rejected_sample_count: 0,
            moved_sample_count: 0,
        };

        TripSession {
            metadata: Arc::new(Mutex::new(metadata)),
            aggregator: Arc::new(Mutex::new(TripAggregator::new(config, 0.0))),
        }
    }

    /// Transition to Recording (Idle → Recording resets the trip,
    /// Paused → Recording resumes it)
    pub fn start_recording(&self, now: f64) -> TripResult<()> {
        let mut meta = self.lock_metadata()?;
        match meta.state {
            SessionState::Idle => {
                self.lock_aggregator()?.reset(now);
                meta.gps_sample_count = 0;
                meta.rejected_sample_count = 0;
                meta.moved_sample_count = 0;
                meta.state = SessionState::Recording;
                Ok(())
            }
            SessionState::Recording => Err(TripMeterError::AlreadyRunning),
            SessionState::Paused => {
                meta.state = SessionState::Recording;
                Ok(())
            }
        }
    }

    /// Transition to Paused (Recording → Paused)
    pub fn pause_recording(&self) -> TripResult<()> {
        let mut meta = self.lock_metadata()?;
        match meta.state {
            SessionState::Recording => {
                meta.state = SessionState::Paused;
                Ok(())
            }
            SessionState::Paused => Err(TripMeterError::InvalidState(
                "Already paused".to_string(),
            )),
            SessionState::Idle => Err(TripMeterError::InvalidState("Not recording".to_string())),
        }
    }

    /// End the session (Recording|Paused → Idle) and hand back the final
    /// statistics for persistence.
    pub fn stop_recording(&self) -> TripResult<TripStats> {
        let mut meta = self.lock_metadata()?;
        match meta.state {
            SessionState::Recording | SessionState::Paused => {
                meta.state = SessionState::Idle;
                Ok(self.lock_aggregator()?.snapshot())
            }
            SessionState::Idle => Err(TripMeterError::NotRunning),
        }
    }

    /// Feed one GPS sample. Returns the aggregator's outcome, or `None`
    /// when the session is not recording (the sample is dropped).
    pub fn push_sample(&self, sample: &GpsSample) -> TripResult<Option<SampleOutcome>> {
        if !self.is_recording()? {
            return Ok(None);
        }

        let outcome = self.lock_aggregator()?.observe(sample);

        let mut meta = self.lock_metadata()?;
        meta.gps_sample_count += 1;
        match outcome {
            SampleOutcome::Rejected { .. } => meta.rejected_sample_count += 1,
            SampleOutcome::Moved { .. } => meta.moved_sample_count += 1,
            SampleOutcome::Stationary => {}
        }

        Ok(Some(outcome))
    }

    /// Advance the trip clock. No-op outside Recording.
    pub fn tick(&self, now: f64) -> TripResult<u64> {
        if self.is_recording()? {
            Ok(self.lock_aggregator()?.tick(now))
        } else {
            Ok(self.lock_aggregator()?.snapshot().elapsed_seconds)
        }
    }

    /// Current statistics snapshot
    pub fn snapshot(&self) -> TripResult<TripStats> {
        Ok(self.lock_aggregator()?.snapshot())
    }

    /// Get current state
    pub fn get_state(&self) -> TripResult<SessionState> {
        Ok(self.lock_metadata()?.state)
    }

    /// Check if currently recording
    pub fn is_recording(&self) -> TripResult<bool> {
        Ok(self.lock_metadata()?.state == SessionState::Recording)
    }

    /// Get metadata snapshot
    pub fn get_metadata(&self) -> TripResult<SessionMetadata> {
        Ok(self.lock_metadata()?.clone())
    }

    fn lock_metadata(&self) -> TripResult<std::sync::MutexGuard<'_, SessionMetadata>> {
        self.metadata
            .lock()
            .map_err(|_| TripMeterError::Internal("Failed to acquire metadata lock".to_string()))
    }

    fn lock_aggregator(&self) -> TripResult<std::sync::MutexGuard<'_, TripAggregator>> {
        self.aggregator
            .lock()
            .map_err(|_| TripMeterError::Internal("Failed to acquire aggregator lock".to_string()))
    }
}

impl Default for TripSession {
    fn default() -> Self {
        Self::new(TripConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, lon: f64, speed: Option<f64>) -> GpsSample {
        GpsSample::new(t, 0.0, lon, speed, 5.0)
    }

    #[test]
    fn test_session_state_transitions() {
        let session = TripSession::default();

        // Initial state is Idle
        assert_eq!(session.get_state().unwrap(), SessionState::Idle);
        assert!(!session.is_recording().unwrap());

        // Idle → Recording
        session.start_recording(0.0).unwrap();
        assert_eq!(session.get_state().unwrap(), SessionState::Recording);
        assert!(session.is_recording().unwrap());

        // Recording → Paused
        session.pause_recording().unwrap();
        assert_eq!(session.get_state().unwrap(), SessionState::Paused);
        assert!(!session.is_recording().unwrap());

        // Paused → Recording
        session.start_recording(5.0).unwrap();
        assert_eq!(session.get_state().unwrap(), SessionState::Recording);

        // Recording → Idle (stop)
        session.stop_recording().unwrap();
        assert_eq!(session.get_state().unwrap(), SessionState::Idle);
    }

    #[test]
    fn test_invalid_state_transitions() {
        let session = TripSession::default();

        // Can't pause or stop while idle
        assert!(session.pause_recording().is_err());
        assert!(session.stop_recording().is_err());

        // Can't start twice
        session.start_recording(0.0).unwrap();
        assert!(session.start_recording(0.0).is_err());

        // Can pause once, not twice
        assert!(session.pause_recording().is_ok());
        assert!(session.pause_recording().is_err());
    }

    #[test]
    fn test_samples_dropped_unless_recording() {
        let session = TripSession::default();

        assert_eq!(session.push_sample(&sample(1.0, 0.0, None)).unwrap(), None);

        session.start_recording(0.0).unwrap();
        assert!(session.push_sample(&sample(1.0, 0.0, None)).unwrap().is_some());

        session.pause_recording().unwrap();
        assert_eq!(session.push_sample(&sample(2.0, 0.001, None)).unwrap(), None);

        let meta = session.get_metadata().unwrap();
        assert_eq!(meta.gps_sample_count, 1);
    }

    #[test]
    fn test_restart_resets_trip() {
        let session = TripSession::default();
        session.start_recording(0.0).unwrap();
        session.push_sample(&sample(1.0, 0.0, None)).unwrap();
        session.push_sample(&sample(3.0, 0.0001, Some(6.0))).unwrap();

        let stats = session.stop_recording().unwrap();
        assert!(stats.total_distance_m > 0.0);

        // A new recording starts from zero
        session.start_recording(100.0).unwrap();
        let stats = session.snapshot().unwrap();
        assert_eq!(stats.total_distance_m, 0.0);
        assert_eq!(stats.top_speed_kmh, 0.0);
        assert_eq!(session.get_metadata().unwrap().gps_sample_count, 0);
    }

    #[test]
    fn test_sample_counters() {
        let session = TripSession::default();
        session.start_recording(0.0).unwrap();

        session.push_sample(&sample(1.0, 0.0, None)).unwrap(); // stationary
        session.push_sample(&sample(3.0, 0.0001, Some(6.0))).unwrap(); // moved
        session
            .push_sample(&GpsSample::new(4.0, 0.0, 0.0002, None, 99.0))
            .unwrap(); // rejected

        let meta = session.get_metadata().unwrap();
        assert_eq!(meta.gps_sample_count, 3);
        assert_eq!(meta.moved_sample_count, 1);
        assert_eq!(meta.rejected_sample_count, 1);
    }

    #[test]
    fn test_tick_only_advances_while_recording() {
        let session = TripSession::default();
        session.start_recording(0.0).unwrap();
        assert_eq!(session.tick(12.9).unwrap(), 12);

        session.pause_recording().unwrap();
        // Paused: the stored elapsed value is reported unchanged
        assert_eq!(session.tick(20.0).unwrap(), 12);
    }
}
