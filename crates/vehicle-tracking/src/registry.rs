//! # Marker registry
//!
//! Owns the `vehicle_id -> marker` map together with the layer group the
//! markers live in.

use std::collections::HashMap;

use tracing::debug;

use crate::surface::{Color, LatLng, LayerId, MapSurface, MarkerId};

/// Attributes last rendered for a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerAttrs {
    pub position: LatLng,
    pub heading: f64,
    pub speed: Option<f64>,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEntry {
    pub marker: MarkerId,
    pub attrs: MarkerAttrs,
}

#[derive(Debug)]
pub struct MarkerRegistry {
    layer: LayerId,
    entries: HashMap<String, MarkerEntry>,
}

impl MarkerRegistry {
    #[must_use]
    pub fn new(layer: LayerId) -> Self {
        Self { layer, entries: HashMap::new() }
    }

    #[must_use]
    pub const fn layer(&self) -> LayerId {
        self.layer
    }

    #[must_use]
    pub fn get(&self, vehicle_id: &str) -> Option<&MarkerEntry> {
        self.entries.get(vehicle_id)
    }

    #[must_use]
    pub fn contains(&self, vehicle_id: &str) -> bool {
        self.entries.contains_key(vehicle_id)
    }

    /// Records `attrs` for `vehicle_id`. An existing entry keeps its marker
    /// handle; `marker` is only used for new entries. Returns the handle in
    /// effect.
    pub fn upsert(&mut self, vehicle_id: &str, marker: MarkerId, attrs: MarkerAttrs) -> MarkerId {
        if let Some(entry) = self.entries.get_mut(vehicle_id) {
            entry.attrs = attrs;
            return entry.marker;
        }
        self.entries.insert(vehicle_id.to_string(), MarkerEntry { marker, attrs });
        marker
    }

    /// Detaches the vehicle's marker from the layer and forgets it.
    pub fn delete(&mut self, surface: &mut impl MapSurface, vehicle_id: &str) -> bool {
        let Some(entry) = self.entries.remove(vehicle_id) else {
            return false;
        };
        surface.remove_marker(self.layer, entry.marker);
        debug!(vehicle_id, "marker deleted");
        true
    }

    /// Detaches every marker and empties the registry.
    pub fn clear_all(&mut self, surface: &mut impl MapSurface) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            surface.remove_marker(self.layer, entry.marker);
        }
        if count > 0 {
            debug!(markers = count, "registry cleared");
        }
        count
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
