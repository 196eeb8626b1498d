use serde::{Deserialize, Serialize};

/// One GPS fix as delivered by a location source.
///
/// `speed` is the device-reported speed in m/s and is `None` when the source
/// cannot measure speed directly (common on cheap receivers and indoors).
/// `accuracy` is the reported 1-sigma horizontal error radius in meters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GpsSample {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub accuracy: f64,
}

impl GpsSample {
    pub fn new(
        timestamp: f64,
        latitude: f64,
        longitude: f64,
        speed: Option<f64>,
        accuracy: f64,
    ) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            speed,
            accuracy,
        }
    }
}
