//! # Reconciler
//!
//! Diffs a position snapshot against the marker registry and issues the
//! minimal set of surface calls that brings the map in line with it.

use std::collections::{HashMap, HashSet};

use chrono_tz::Tz;
use tracing::debug;

use crate::model::{VehiclePosition, popup_text};
use crate::registry::{MarkerAttrs, MarkerRegistry};
use crate::surface::{IconFactory, MapSurface};

/// Counts of surface changes made by one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub moved: usize,
    pub reiconed: usize,
    pub repopped: usize,
    pub removed: usize,
}

impl ReconcileReport {
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.added == 0
            && self.moved == 0
            && self.reiconed == 0
            && self.repopped == 0
            && self.removed == 0
    }
}

/// Brings `registry` (and the markers it owns) in line with `snapshot`.
///
/// Afterwards the registry's key set equals the snapshot's id set. When an
/// id appears more than once the last report is used.
pub fn reconcile<S, I>(
    snapshot: &[VehiclePosition], registry: &mut MarkerRegistry, known: &HashSet<String>,
    surface: &mut S, icons: &I, tz: Tz,
) -> ReconcileReport
where
    S: MapSurface,
    I: IconFactory,
{
    let mut report = ReconcileReport::default();

    let latest: HashMap<&str, usize> = snapshot
        .iter()
        .enumerate()
        .map(|(index, position)| (position.vehicle_id.as_str(), index))
        .collect();

    for (index, position) in snapshot.iter().enumerate() {
        let vehicle_id = position.vehicle_id.as_str();
        if latest.get(vehicle_id) != Some(&index) {
            continue;
        }

        let next = MarkerAttrs {
            position: position.lat_lng(),
            heading: position.heading_or_north(),
            speed: position.speed,
            color: icons.vehicle_color(known.contains(vehicle_id)),
        };

        let Some(entry) = registry.get(vehicle_id) else {
            let icon = icons.vehicle_icon(next.heading, &next.color);
            let popup = popup_text(vehicle_id, next.speed, next.heading, position.time, tz);

            let marker = surface.create_marker(next.position, &icon);
            surface.bind_tooltip(marker, vehicle_id);
            surface.bind_popup(marker, &popup);
            surface.subscribe_click(marker, vehicle_id);
            registry.upsert(vehicle_id, marker, next);
            surface.add_marker(registry.layer(), marker);
            report.added += 1;
            continue;
        };

        let marker = entry.marker;
        let prev = &entry.attrs;
        let heading_changed = differs(prev.heading, next.heading);
        let speed_changed = match (prev.speed, next.speed) {
            (Some(a), Some(b)) => differs(a, b),
            (None, None) => false,
            _ => true,
        };

        if prev.position != next.position {
            surface.set_position(marker, next.position);
            report.moved += 1;
        }
        if heading_changed || prev.color != next.color {
            surface.set_icon(marker, &icons.vehicle_icon(next.heading, &next.color));
            report.reiconed += 1;
        }
        if heading_changed || speed_changed {
            let popup = popup_text(vehicle_id, next.speed, next.heading, position.time, tz);
            surface.set_popup_content(marker, &popup);
            report.repopped += 1;
        }
        registry.upsert(vehicle_id, marker, next);
    }

    let absent: Vec<String> =
        registry.keys().filter(|id| !latest.contains_key(id)).map(ToString::to_string).collect();
    for vehicle_id in absent {
        registry.delete(surface, &vehicle_id);
        report.removed += 1;
    }

    debug!(
        added = report.added,
        moved = report.moved,
        reiconed = report.reiconed,
        repopped = report.repopped,
        removed = report.removed,
        "snapshot reconciled"
    );
    report
}

fn differs(a: f64, b: f64) -> bool {
    (a - b).abs() > f64::EPSILON
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::headless::{HeadlessSurface, SurfaceOps};
    use crate::surface::DefaultIconFactory;

    struct Fixture {
        surface: HeadlessSurface,
        registry: MarkerRegistry,
        icons: DefaultIconFactory,
        known: HashSet<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut surface = HeadlessSurface::new();
            let layer = surface.create_layer_group();
            surface.attach_layer(layer);
            surface.take_ops();
            Self {
                surface,
                registry: MarkerRegistry::new(layer),
                icons: DefaultIconFactory::default(),
                known: HashSet::new(),
            }
        }

        fn reconcile(&mut self, snapshot: &[VehiclePosition]) -> ReconcileReport {
            reconcile(
                snapshot,
                &mut self.registry,
                &self.known,
                &mut self.surface,
                &self.icons,
                chrono_tz::UTC,
            )
        }

        fn keys(&self) -> BTreeSet<String> {
            self.registry.keys().map(ToString::to_string).collect()
        }

        fn icon_rotation(&self, vehicle_id: &str) -> f64 {
            let entry = self.registry.get(vehicle_id).expect("entry exists");
            self.surface.marker(entry.marker).expect("marker exists").icon.rotation
        }
    }

    fn position(id: &str, lat: f64, speed: Option<f64>, heading: Option<f64>) -> VehiclePosition {
        VehiclePosition {
            vehicle_id: id.to_string(),
            lat,
            lng: 174.76,
            speed,
            heading,
            time: Utc.with_ymd_and_hms(2026, 3, 1, 2, 30, 0).single().expect("valid time"),
        }
    }

    fn ids(snapshot: &[VehiclePosition]) -> BTreeSet<String> {
        snapshot.iter().map(|position| position.vehicle_id.clone()).collect()
    }

    #[test]
    fn key_set_matches_snapshot() {
        let mut fixture = Fixture::new();

        let snapshots = [
            vec![position("SC-1", -36.8, None, None), position("SC-2", -36.9, Some(4.0), None)],
            vec![position("SC-2", -36.9, Some(4.0), None), position("RTG-4", -36.7, None, None)],
            vec![],
            vec![position("SC-1", -36.8, None, Some(45.0))],
        ];
        for snapshot in &snapshots {
            fixture.reconcile(snapshot);
            assert_eq!(fixture.keys(), ids(snapshot));
            assert_eq!(fixture.surface.visible_markers().count(), snapshot.len());
        }
    }

    #[test]
    fn same_snapshot_twice_is_a_noop() {
        let mut fixture = Fixture::new();
        let snapshot =
            vec![position("SC-1", -36.8, Some(10.0), Some(30.0)), position("SC-2", -36.9, None, None)];

        let first = fixture.reconcile(&snapshot);
        assert_eq!(first.added, 2);
        fixture.surface.take_ops();

        let second = fixture.reconcile(&snapshot);
        assert!(second.is_noop());
        assert_eq!(fixture.surface.take_ops(), SurfaceOps::default());
    }

    #[test]
    fn speed_only_rewrites_popup() {
        let mut fixture = Fixture::new();
        fixture.reconcile(&[position("SC-1", -36.8, Some(10.0), Some(30.0))]);
        fixture.surface.take_ops();

        let report = fixture.reconcile(&[position("SC-1", -36.8, Some(12.0), Some(30.0))]);
        assert_eq!(report, ReconcileReport { repopped: 1, ..ReconcileReport::default() });

        let ops = fixture.surface.take_ops();
        assert_eq!(ops.popups_updated, 1);
        assert_eq!(ops.total(), 1);
    }

    #[test]
    fn heading_only_swaps_icon_and_popup() {
        let mut fixture = Fixture::new();
        fixture.reconcile(&[position("SC-1", -36.8, Some(10.0), Some(30.0))]);
        fixture.surface.take_ops();

        let report = fixture.reconcile(&[position("SC-1", -36.8, Some(10.0), Some(120.0))]);
        assert_eq!(report, ReconcileReport { reiconed: 1, repopped: 1, ..ReconcileReport::default() });

        let ops = fixture.surface.take_ops();
        assert_eq!(ops.icons_set, 1);
        assert_eq!(ops.popups_updated, 1);
        assert_eq!(ops.total(), 2);
        assert!((fixture.icon_rotation("SC-1") - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn move_only_sets_position() {
        let mut fixture = Fixture::new();
        fixture.reconcile(&[position("SC-1", -36.8, Some(10.0), Some(30.0))]);
        fixture.surface.take_ops();

        let report = fixture.reconcile(&[position("SC-1", -36.81, Some(10.0), Some(30.0))]);
        assert_eq!(report, ReconcileReport { moved: 1, ..ReconcileReport::default() });
        assert_eq!(fixture.surface.take_ops().total(), 1);
    }

    #[test]
    fn registration_changes_colour() {
        let mut fixture = Fixture::new();
        let snapshot = vec![position("SC-1", -36.8, None, None)];

        fixture.reconcile(&snapshot);
        let entry = fixture.registry.get("SC-1").expect("entry exists");
        assert_eq!(entry.attrs.color.as_str(), "#9ca3af");

        fixture.known.insert("SC-1".to_string());
        let report = fixture.reconcile(&snapshot);
        assert_eq!(report, ReconcileReport { reiconed: 1, ..ReconcileReport::default() });

        let entry = fixture.registry.get("SC-1").expect("entry exists");
        assert_eq!(entry.attrs.color.as_str(), "#f97316");
        let marker = fixture.surface.marker(entry.marker).expect("marker exists");
        assert_eq!(marker.icon.color.as_str(), "#f97316");
    }

    #[test]
    fn new_marker_is_fully_bound() {
        let mut fixture = Fixture::new();
        fixture.reconcile(&[position("SC-1", -36.8, Some(5.0), Some(270.0))]);

        let entry = fixture.registry.get("SC-1").expect("entry exists");
        let marker = fixture.surface.marker(entry.marker).expect("marker exists");
        assert_eq!(marker.tooltip.as_deref(), Some("SC-1"));
        assert_eq!(
            marker.popup.as_deref(),
            Some("SC-1\nSpeed: 5.0 km/h\nHeading: 270°\nTime: 2026-03-01 02:30:00 UTC")
        );
        assert_eq!(fixture.surface.click(entry.marker), Some("SC-1"));
        assert_eq!(marker.layer, Some(fixture.registry.layer()));
    }

    #[test]
    fn duplicate_ids_last_wins() {
        let mut fixture = Fixture::new();
        let report = fixture.reconcile(&[
            position("SC-1", -36.8, None, Some(10.0)),
            position("SC-1", -36.9, None, Some(20.0)),
        ]);

        assert_eq!(report.added, 1);
        assert_eq!(fixture.surface.marker_count(), 1);
        let entry = fixture.registry.get("SC-1").expect("entry exists");
        assert!((entry.attrs.heading - 20.0).abs() < f64::EPSILON);
        assert!((entry.attrs.position.lat - -36.9).abs() < f64::EPSILON);
    }

    #[test]
    fn turn_then_replace() {
        let mut fixture = Fixture::new();

        let report = fixture.reconcile(&[position("A", -36.8, None, Some(0.0))]);
        assert_eq!(report, ReconcileReport { added: 1, ..ReconcileReport::default() });

        let report = fixture.reconcile(&[position("A", -36.8, None, Some(90.0))]);
        assert_eq!(report, ReconcileReport { reiconed: 1, repopped: 1, ..ReconcileReport::default() });
        assert!((fixture.icon_rotation("A") - 90.0).abs() < f64::EPSILON);

        let report = fixture.reconcile(&[position("B", -36.7, None, None)]);
        assert_eq!(report, ReconcileReport { added: 1, removed: 1, ..ReconcileReport::default() });
        assert_eq!(fixture.keys(), BTreeSet::from(["B".to_string()]));
        assert_eq!(fixture.surface.marker_count(), 1);
    }
}
