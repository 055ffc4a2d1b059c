//! # Track loader
//!
//! Draws the recent history of one selected vehicle as a polyline. At most
//! one track is on the map at a time.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::model::VehiclePosition;
use crate::surface::{Color, LatLng, LineId, MapSurface};

/// History query issued for a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRequest {
    pub vehicle_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A polyline with this many vertices is on the map.
    Drawn(usize),

    /// Fewer than two points; nothing drawn.
    TooShort(usize),

    /// The selection changed while the history was in flight.
    Stale,

    /// The history fetch failed; the selection is kept.
    Failed,
}

#[derive(Debug)]
pub struct TrackLoader {
    window: TimeDelta,
    color: Color,
    selected: Option<String>,
    line: Option<LineId>,
    seq: u64,
}

impl TrackLoader {
    #[must_use]
    pub const fn new(window: TimeDelta, color: Color) -> Self {
        Self { window, color, selected: None, line: None, seq: 0 }
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub const fn has_line(&self) -> bool {
        self.line.is_some()
    }

    /// Selects `vehicle_id`, removing any drawn line, and returns the query
    /// for its trailing history window ending at `now`.
    pub fn begin_select(
        &mut self, surface: &mut impl MapSurface, vehicle_id: &str, now: DateTime<Utc>,
    ) -> TrackRequest {
        self.remove_line(surface);
        self.seq += 1;
        self.selected = Some(vehicle_id.to_string());

        debug!(vehicle_id, "vehicle selected");
        TrackRequest {
            vehicle_id: vehicle_id.to_string(),
            from: now.checked_sub_signed(self.window).unwrap_or(DateTime::<Utc>::MIN_UTC),
            to: now,
            seq: self.seq,
        }
    }

    /// Applies a history response to the selection that requested it.
    pub fn finish(
        &mut self, surface: &mut impl MapSurface, request: &TrackRequest,
        result: yard_core::Result<Vec<VehiclePosition>>,
    ) -> TrackOutcome {
        if request.seq != self.seq || self.selected.as_deref() != Some(request.vehicle_id.as_str()) {
            debug!(vehicle_id = %request.vehicle_id, "discarding history for stale selection");
            return TrackOutcome::Stale;
        }

        let points = match result {
            Ok(points) => points,
            Err(err) => {
                warn!(vehicle_id = %request.vehicle_id, error = %err, "failed to fetch vehicle history");
                return TrackOutcome::Failed;
            }
        };
        if points.len() < 2 {
            debug!(vehicle_id = %request.vehicle_id, points = points.len(), "history too short to draw");
            return TrackOutcome::TooShort(points.len());
        }

        let vertices: Vec<LatLng> = points.iter().map(VehiclePosition::lat_lng).collect();
        self.remove_line(surface);
        self.line = Some(surface.draw_polyline(&vertices, &self.color));
        TrackOutcome::Drawn(vertices.len())
    }

    /// Removes the line and clears the selection. Returns whether anything
    /// was selected.
    pub fn clear(&mut self, surface: &mut impl MapSurface) -> bool {
        self.remove_line(surface);
        self.seq += 1;
        self.selected.take().is_some()
    }

    fn remove_line(&mut self, surface: &mut impl MapSurface) {
        if let Some(line) = self.line.take() {
            surface.remove_polyline(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use yard_core::{Clock, Error, FixedClock};

    use super::*;
    use crate::headless::HeadlessSurface;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid time"))
    }

    fn loader() -> TrackLoader {
        TrackLoader::new(TimeDelta::hours(24), "#2563eb".into())
    }

    fn history(id: &str, count: usize) -> Vec<VehiclePosition> {
        (0..count)
            .map(|i| VehiclePosition {
                vehicle_id: id.to_string(),
                lat: -36.8 + f64::from(u32::try_from(i).expect("small")) * 0.001,
                lng: 174.76,
                speed: None,
                heading: None,
                time: clock().now(),
            })
            .collect()
    }

    #[test]
    fn window_is_trailing_day() {
        let mut surface = HeadlessSurface::new();
        let mut tracks = loader();

        let request = tracks.begin_select(&mut surface, "SC-1", clock().now());
        assert_eq!(request.to, clock().now());
        assert_eq!(request.to - request.from, TimeDelta::hours(24));
        assert_eq!(tracks.selected(), Some("SC-1"));
    }

    #[test]
    fn window_saturates_at_earliest_time() {
        let mut surface = HeadlessSurface::new();
        let window = TimeDelta::try_hours(2_000_000_000_000).expect("in range");
        let mut tracks = TrackLoader::new(window, "#2563eb".into());

        let request = tracks.begin_select(&mut surface, "SC-1", clock().now());
        assert_eq!(request.from, DateTime::<Utc>::MIN_UTC);
        assert_eq!(request.to, clock().now());
    }

    #[test]
    fn draws_only_two_or_more_points() {
        let mut surface = HeadlessSurface::new();
        let mut tracks = loader();

        for count in [0, 1] {
            let request = tracks.begin_select(&mut surface, "SC-1", clock().now());
            let outcome = tracks.finish(&mut surface, &request, Ok(history("SC-1", count)));
            assert_eq!(outcome, TrackOutcome::TooShort(count));
            assert_eq!(surface.lines().count(), 0);
        }

        let request = tracks.begin_select(&mut surface, "SC-1", clock().now());
        let outcome = tracks.finish(&mut surface, &request, Ok(history("SC-1", 5)));
        assert_eq!(outcome, TrackOutcome::Drawn(5));

        let lines: Vec<_> = surface.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].points.len(), 5);
        assert_eq!(lines[0].color.as_str(), "#2563eb");
    }

    #[test]
    fn reselect_replaces_line() {
        let mut surface = HeadlessSurface::new();
        let mut tracks = loader();

        let request = tracks.begin_select(&mut surface, "SC-1", clock().now());
        tracks.finish(&mut surface, &request, Ok(history("SC-1", 3)));

        let request = tracks.begin_select(&mut surface, "SC-2", clock().now());
        assert_eq!(surface.lines().count(), 0);
        tracks.finish(&mut surface, &request, Ok(history("SC-2", 4)));

        let lines: Vec<_> = surface.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].points.len(), 4);
    }

    #[test]
    fn stale_responses_are_discarded() {
        let mut surface = HeadlessSurface::new();
        let mut tracks = loader();

        let first = tracks.begin_select(&mut surface, "SC-1", clock().now());
        let second = tracks.begin_select(&mut surface, "SC-2", clock().now());
        assert_eq!(tracks.finish(&mut surface, &first, Ok(history("SC-1", 3))), TrackOutcome::Stale);
        assert_eq!(tracks.finish(&mut surface, &second, Ok(history("SC-2", 2))), TrackOutcome::Drawn(2));

        let third = tracks.begin_select(&mut surface, "SC-3", clock().now());
        assert!(tracks.clear(&mut surface));
        assert_eq!(tracks.finish(&mut surface, &third, Ok(history("SC-3", 3))), TrackOutcome::Stale);
        assert_eq!(surface.lines().count(), 0);
        assert_eq!(tracks.selected(), None);
    }

    #[test]
    fn failure_keeps_selection() {
        let mut surface = HeadlessSurface::new();
        let mut tracks = loader();

        let request = tracks.begin_select(&mut surface, "SC-1", clock().now());
        let outcome = tracks.finish(
            &mut surface,
            &request,
            Err(Error::Unavailable("connection refused".to_string())),
        );
        assert_eq!(outcome, TrackOutcome::Failed);
        assert_eq!(tracks.selected(), Some("SC-1"));
        assert!(!tracks.has_line());
    }
}
