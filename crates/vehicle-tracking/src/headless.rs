//! In-memory [`MapSurface`] that keeps marker, layer and line state and
//! counts every mutation.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::surface::{Color, Icon, LatLng, LayerId, LineId, MapSurface, MarkerId};

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceOps {
    pub markers_created: usize,
    pub markers_added: usize,
    pub markers_removed: usize,
    pub positions_set: usize,
    pub icons_set: usize,
    pub tooltips_bound: usize,
    pub popups_bound: usize,
    pub popups_updated: usize,
    pub clicks_subscribed: usize,
    pub lines_drawn: usize,
    pub lines_removed: usize,
    pub layers_attached: usize,
    pub layers_detached: usize,
}

impl SurfaceOps {
    /// Total number of visual writes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.markers_created
            + self.markers_added
            + self.markers_removed
            + self.positions_set
            + self.icons_set
            + self.tooltips_bound
            + self.popups_bound
            + self.popups_updated
            + self.clicks_subscribed
            + self.lines_drawn
            + self.lines_removed
            + self.layers_attached
            + self.layers_detached
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerState {
    pub position: LatLng,
    pub icon: Icon,
    pub tooltip: Option<String>,
    pub popup: Option<String>,
    pub click_target: Option<String>,
    pub layer: Option<LayerId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineState {
    pub points: Vec<LatLng>,
    pub color: Color,
}

#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_id: u64,
    markers: BTreeMap<MarkerId, MarkerState>,
    attached: HashSet<LayerId>,
    lines: HashMap<LineId, LineState>,
    ops: SurfaceOps,
}

impl HeadlessSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn ops(&self) -> SurfaceOps {
        self.ops
    }

    /// Returns the counters accumulated since the last call and resets them.
    pub fn take_ops(&mut self) -> SurfaceOps {
        std::mem::take(&mut self.ops)
    }

    #[must_use]
    pub fn marker(&self, marker: MarkerId) -> Option<&MarkerState> {
        self.markers.get(&marker)
    }

    /// Markers in attached layers, i.e. what a user would see.
    pub fn visible_markers(&self) -> impl Iterator<Item = (MarkerId, &MarkerState)> {
        self.markers
            .iter()
            .filter(|(_, state)| state.layer.is_some_and(|layer| self.attached.contains(&layer)))
            .map(|(id, state)| (*id, state))
    }

    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_attached(&self, layer: LayerId) -> bool {
        self.attached.contains(&layer)
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineState> {
        self.lines.values()
    }

    /// Simulates a user click, returning the vehicle the marker selects.
    #[must_use]
    pub fn click(&self, marker: MarkerId) -> Option<&str> {
        self.markers.get(&marker).and_then(|state| state.click_target.as_deref())
    }

    const fn issue(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MapSurface for HeadlessSurface {
    fn create_layer_group(&mut self) -> LayerId {
        LayerId(self.issue())
    }

    fn attach_layer(&mut self, layer: LayerId) {
        if self.attached.insert(layer) {
            self.ops.layers_attached += 1;
            debug!(layer = layer.0, "layer attached");
        }
    }

    fn detach_layer(&mut self, layer: LayerId) {
        if self.attached.remove(&layer) {
            self.ops.layers_detached += 1;
            debug!(layer = layer.0, "layer detached");
        }
    }

    fn create_marker(&mut self, at: LatLng, icon: &Icon) -> MarkerId {
        let marker = MarkerId(self.issue());
        self.markers.insert(
            marker,
            MarkerState {
                position: at,
                icon: icon.clone(),
                tooltip: None,
                popup: None,
                click_target: None,
                layer: None,
            },
        );
        self.ops.markers_created += 1;
        marker
    }

    fn add_marker(&mut self, layer: LayerId, marker: MarkerId) {
        if let Some(state) = self.markers.get_mut(&marker) {
            state.layer = Some(layer);
            self.ops.markers_added += 1;
            debug!(marker = marker.0, layer = layer.0, lat = state.position.lat, lng = state.position.lng, "marker added");
        }
    }

    fn remove_marker(&mut self, layer: LayerId, marker: MarkerId) {
        if self.markers.get(&marker).is_some_and(|state| state.layer == Some(layer)) {
            self.markers.remove(&marker);
            self.ops.markers_removed += 1;
            debug!(marker = marker.0, layer = layer.0, "marker removed");
        }
    }

    fn set_position(&mut self, marker: MarkerId, at: LatLng) {
        if let Some(state) = self.markers.get_mut(&marker) {
            state.position = at;
            self.ops.positions_set += 1;
            debug!(marker = marker.0, lat = at.lat, lng = at.lng, "marker moved");
        }
    }

    fn set_icon(&mut self, marker: MarkerId, icon: &Icon) {
        if let Some(state) = self.markers.get_mut(&marker) {
            state.icon = icon.clone();
            self.ops.icons_set += 1;
            debug!(marker = marker.0, rotation = icon.rotation, color = %icon.color, "marker icon set");
        }
    }

    fn bind_tooltip(&mut self, marker: MarkerId, text: &str) {
        if let Some(state) = self.markers.get_mut(&marker) {
            state.tooltip = Some(text.to_string());
            self.ops.tooltips_bound += 1;
        }
    }

    fn bind_popup(&mut self, marker: MarkerId, content: &str) {
        if let Some(state) = self.markers.get_mut(&marker) {
            state.popup = Some(content.to_string());
            self.ops.popups_bound += 1;
        }
    }

    fn set_popup_content(&mut self, marker: MarkerId, content: &str) {
        if let Some(state) = self.markers.get_mut(&marker) {
            state.popup = Some(content.to_string());
            self.ops.popups_updated += 1;
        }
    }

    fn subscribe_click(&mut self, marker: MarkerId, vehicle_id: &str) {
        if let Some(state) = self.markers.get_mut(&marker) {
            state.click_target = Some(vehicle_id.to_string());
            self.ops.clicks_subscribed += 1;
        }
    }

    fn draw_polyline(&mut self, points: &[LatLng], color: &Color) -> LineId {
        let line = LineId(self.issue());
        self.lines.insert(line, LineState { points: points.to_vec(), color: color.clone() });
        self.ops.lines_drawn += 1;
        debug!(line = line.0, vertices = points.len(), "track drawn");
        line
    }

    fn remove_polyline(&mut self, line: LineId) {
        if self.lines.remove(&line).is_some() {
            self.ops.lines_removed += 1;
            debug!(line = line.0, "track removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DefaultIconFactory, IconFactory};

    #[test]
    fn markers_visible_only_in_attached_layers() {
        let mut surface = HeadlessSurface::new();
        let factory = DefaultIconFactory::default();
        let icon = factory.vehicle_icon(0.0, &factory.vehicle_color(true));

        let layer = surface.create_layer_group();
        let marker = surface.create_marker(LatLng::new(1.0, 2.0), &icon);
        surface.add_marker(layer, marker);
        assert_eq!(surface.visible_markers().count(), 0);

        surface.attach_layer(layer);
        assert_eq!(surface.visible_markers().count(), 1);

        surface.detach_layer(layer);
        assert_eq!(surface.visible_markers().count(), 0);
        assert_eq!(surface.marker_count(), 1);
    }

    #[test]
    fn counts_and_resets_ops() {
        let mut surface = HeadlessSurface::new();
        let factory = DefaultIconFactory::default();
        let icon = factory.vehicle_icon(0.0, &factory.vehicle_color(false));

        let layer = surface.create_layer_group();
        let marker = surface.create_marker(LatLng::new(1.0, 2.0), &icon);
        surface.add_marker(layer, marker);
        surface.subscribe_click(marker, "SC-1");
        surface.set_position(marker, LatLng::new(1.5, 2.0));

        let ops = surface.take_ops();
        assert_eq!(ops.markers_created, 1);
        assert_eq!(ops.positions_set, 1);
        assert_eq!(ops.total(), 4);
        assert_eq!(surface.ops().total(), 0);
        assert_eq!(surface.click(marker), Some("SC-1"));

        surface.remove_marker(layer, marker);
        assert_eq!(surface.marker_count(), 0);
        assert_eq!(surface.click(marker), None);
    }
}
