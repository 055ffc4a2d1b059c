//! Hand-entered GPS points for exercising the tracking layer without a live
//! feed.

use serde::{Deserialize, Serialize};
use yard_core::{Result, bad_request};

/// Body of `POST /api/gps-tracks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockPoint {
    pub vehicle_id: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub heading: f64,
}

impl MockPoint {
    /// Rejects points the backend would store as nonsense.
    ///
    /// # Errors
    ///
    /// Returns [`yard_core::Error::BadRequest`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.vehicle_id.trim().is_empty() {
            return Err(bad_request!("vehicleId is required"));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(bad_request!("lat {} outside [-90, 90]", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(bad_request!("lng {} outside [-180, 180]", self.lng));
        }
        if self.speed.is_nan() || self.speed < 0.0 {
            return Err(bad_request!("speed {} must be zero or more", self.speed));
        }
        if !(0.0..=360.0).contains(&self.heading) {
            return Err(bad_request!("heading {} outside [0, 360]", self.heading));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use yard_core::Error;

    use super::*;

    fn point() -> MockPoint {
        MockPoint { vehicle_id: "SC-1".to_string(), lat: -36.84, lng: 174.76, speed: 8.5, heading: 90.0 }
    }

    #[test]
    fn accepts_valid_point() {
        point().validate().expect("point should be valid");
        MockPoint { lat: 90.0, lng: -180.0, speed: 0.0, heading: 360.0, ..point() }
            .validate()
            .expect("bounds are inclusive");
    }

    #[test]
    fn rejects_out_of_range() {
        let cases = [
            MockPoint { vehicle_id: "  ".to_string(), ..point() },
            MockPoint { lat: 90.5, ..point() },
            MockPoint { lng: -181.0, ..point() },
            MockPoint { speed: -1.0, ..point() },
            MockPoint { speed: f64::NAN, ..point() },
            MockPoint { heading: 361.0, ..point() },
            MockPoint { heading: -0.5, ..point() },
        ];
        for case in cases {
            let err = case.validate().expect_err("point should be rejected");
            assert!(matches!(err, Error::BadRequest(_)), "{case:?}: {err}");
        }
    }

    #[test]
    fn wire_format() {
        let json = serde_json::to_value(point()).expect("should serialize");
        assert_eq!(
            json,
            serde_json::json!({"vehicleId": "SC-1", "lat": -36.84, "lng": 174.76, "speed": 8.5, "heading": 90.0})
        );
    }
}
