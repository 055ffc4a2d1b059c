//! Wire types exchanged with the yard backend.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::surface::LatLng;

/// One position report for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosition {
    pub vehicle_id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    pub time: DateTime<Utc>,
}

impl VehiclePosition {
    #[must_use]
    pub const fn lat_lng(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Heading used for rendering; an absent heading points north.
    #[must_use]
    pub fn heading_or_north(&self) -> f64 {
        self.heading.unwrap_or(0.0)
    }
}

/// Popup summary of speed, heading and report time.
#[must_use]
pub fn popup_text(
    vehicle_id: &str, speed: Option<f64>, heading: f64, time: DateTime<Utc>, tz: Tz,
) -> String {
    let speed = speed.map_or_else(|| "-".to_string(), |speed| format!("{speed:.1} km/h"));
    let time = time.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z");
    format!("{vehicle_id}\nSpeed: {speed}\nHeading: {heading:.0}°\nTime: {time}")
}

/// Reference data for a vehicle registered with the yard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredVehicle {
    pub vehicle_id: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ids of registered vehicles.
#[must_use]
pub fn known_ids(registered: &[RegisteredVehicle]) -> HashSet<String> {
    registered.iter().map(|vehicle| vehicle.vehicle_id.clone()).collect()
}
