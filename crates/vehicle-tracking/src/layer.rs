//! # Tracking layer
//!
//! Lifecycle controller for live vehicle markers. Owns the map surface slot,
//! the marker registry and the track loader, and applies fetch completions
//! synchronously.
//!
//! Fetches are started with a [`Ticket`] and their results handed back with
//! it. A ticket issued before the last `stop` (or older than the newest
//! snapshot already applied) is ignored.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::model::{RegisteredVehicle, VehiclePosition, known_ids};
use crate::reconcile::{ReconcileReport, reconcile};
use crate::registry::MarkerRegistry;
use crate::surface::{IconFactory, MapHandle, MapSurface};
use crate::track::{TrackLoader, TrackOutcome, TrackRequest};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerState {
    #[default]
    Stopped,
    RunningVisible,
    RunningHidden,
}

impl LayerState {
    #[must_use]
    pub const fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Observable state of the layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub state: LayerState,
    pub visible: bool,
    pub vehicles: Vec<VehiclePosition>,
    pub registered_vehicles: Vec<RegisteredVehicle>,
    pub selected_vehicle_id: Option<String>,
    pub marker_count: usize,
}

/// Identifies one in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    session: u64,
    seq: u64,
}

/// What became of a snapshot completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Reconciled onto the visible layer.
    Applied(ReconcileReport),

    /// Stored while hidden; no surface writes.
    Stored,

    /// A newer snapshot was already applied.
    Stale,

    /// Arrived after `stop`.
    Ignored,

    /// The fetch failed; previous state kept.
    Failed,
}

pub struct TrackingLayer<S, I>
where
    S: MapSurface,
    I: IconFactory,
{
    surface: MapHandle<S>,
    icons: I,
    registry: MarkerRegistry,
    tracks: TrackLoader,
    state: LayerState,
    timezone: Tz,
    vehicles: Vec<VehiclePosition>,
    registered: Vec<RegisteredVehicle>,
    known: HashSet<String>,
    session: u64,
    issued: u64,
    applied_snapshot: u64,
    applied_registered: u64,
}

impl<S, I> TrackingLayer<S, I>
where
    S: MapSurface,
    I: IconFactory,
{
    pub fn new(mut surface: S, icons: I, config: &Config) -> Self {
        let registry = MarkerRegistry::new(surface.create_layer_group());
        Self {
            surface: MapHandle::Attached(surface),
            icons,
            registry,
            tracks: TrackLoader::new(config.track_window, config.palette.track.clone()),
            state: LayerState::Stopped,
            timezone: config.timezone,
            vehicles: Vec::new(),
            registered: Vec::new(),
            known: HashSet::new(),
            session: 0,
            issued: 0,
            applied_snapshot: 0,
            applied_registered: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LayerState {
        self.state
    }

    #[must_use]
    pub fn vehicles(&self) -> &[VehiclePosition] {
        &self.vehicles
    }

    #[must_use]
    pub fn registered_vehicles(&self) -> &[RegisteredVehicle] {
        &self.registered
    }

    #[must_use]
    pub fn selected_vehicle(&self) -> Option<&str> {
        self.tracks.selected()
    }

    #[must_use]
    pub const fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn surface(&self) -> Option<&S> {
        self.surface.get()
    }

    #[must_use]
    pub fn view(&self) -> TrackingView {
        TrackingView {
            state: self.state,
            visible: self.state == LayerState::RunningVisible,
            vehicles: self.vehicles.clone(),
            registered_vehicles: self.registered.clone(),
            selected_vehicle_id: self.tracks.selected().map(ToString::to_string),
            marker_count: self.registry.len(),
        }
    }

    /// `stopped -> running-visible`. Returns `false` when already running or
    /// the surface is gone.
    pub fn start(&mut self) -> bool {
        if self.state.is_running() {
            debug!(state = ?self.state, "start ignored: already running");
            return false;
        }
        let Some(surface) = self.surface.get_mut() else {
            warn!("start ignored: map surface released");
            return false;
        };

        surface.attach_layer(self.registry.layer());
        self.session += 1;
        self.state = LayerState::RunningVisible;
        info!(session = self.session, "vehicle tracking started");
        true
    }

    /// Any running state -> `stopped`: removes the track, every marker and the
    /// layer. Idempotent.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_running() {
            return false;
        }

        if let Some(surface) = self.surface.get_mut() {
            self.tracks.clear(surface);
            self.registry.clear_all(surface);
            surface.detach_layer(self.registry.layer());
        }
        self.session += 1;
        self.state = LayerState::Stopped;
        self.vehicles.clear();
        info!("vehicle tracking stopped");
        true
    }

    /// Stops the layer and hands back the surface. Subsequent operations
    /// short-circuit.
    pub fn release_surface(&mut self) -> Option<S> {
        self.stop();
        self.surface.take()
    }

    /// Flips between visible and hidden. A no-op while stopped.
    pub fn toggle_visibility(&mut self) -> LayerState {
        let Some(surface) = self.surface.get_mut() else {
            return self.state;
        };

        match self.state {
            LayerState::Stopped => {
                info!("toggle ignored: vehicle tracking is stopped");
            }
            LayerState::RunningVisible => {
                surface.detach_layer(self.registry.layer());
                let cleared = self.registry.clear_all(surface);
                self.state = LayerState::RunningHidden;
                info!(markers = cleared, "vehicle layer hidden");
            }
            LayerState::RunningHidden => {
                surface.attach_layer(self.registry.layer());
                self.state = LayerState::RunningVisible;
                let report = self.render();
                info!(markers = report.added, "vehicle layer shown");
            }
        }
        self.state
    }

    /// Issues a ticket for a snapshot fetch, or `None` while stopped.
    pub fn begin_refresh(&mut self) -> Option<Ticket> {
        self.issue()
    }

    /// Issues a ticket for a registered vehicles fetch, or `None` while
    /// stopped.
    pub fn begin_registered(&mut self) -> Option<Ticket> {
        self.issue()
    }

    /// Applies a snapshot completion.
    pub fn apply_snapshot(
        &mut self, ticket: Ticket, result: yard_core::Result<Vec<VehiclePosition>>,
    ) -> SnapshotOutcome {
        if !self.is_current(ticket) {
            debug!("snapshot ignored: arrived after stop");
            return SnapshotOutcome::Ignored;
        }
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, transient = err.is_transient(), "failed to fetch vehicle positions");
                return SnapshotOutcome::Failed;
            }
        };
        if ticket.seq <= self.applied_snapshot {
            debug!(seq = ticket.seq, applied = self.applied_snapshot, "snapshot ignored: out of order");
            return SnapshotOutcome::Stale;
        }

        self.applied_snapshot = ticket.seq;
        self.vehicles = snapshot;

        if self.state == LayerState::RunningHidden {
            debug!(vehicles = self.vehicles.len(), "snapshot stored while hidden");
            return SnapshotOutcome::Stored;
        }
        SnapshotOutcome::Applied(self.render())
    }

    /// Applies a registered vehicles completion. Returns whether it was
    /// applied; markers are recoloured straight away when visible.
    pub fn apply_registered(
        &mut self, ticket: Ticket, result: yard_core::Result<Vec<RegisteredVehicle>>,
    ) -> bool {
        if !self.is_current(ticket) {
            debug!("registered vehicles ignored: arrived after stop");
            return false;
        }
        let registered = match result {
            Ok(registered) => registered,
            Err(err) => {
                warn!(error = %err, transient = err.is_transient(), "failed to fetch registered vehicles");
                return false;
            }
        };
        if ticket.seq <= self.applied_registered {
            debug!(seq = ticket.seq, "registered vehicles ignored: out of order");
            return false;
        }

        self.applied_registered = ticket.seq;
        self.known = known_ids(&registered);
        self.registered = registered;
        info!(registered = self.registered.len(), "registered vehicles loaded");

        if self.state == LayerState::RunningVisible {
            self.render();
        }
        true
    }

    /// Selects a vehicle and returns the history query to run, or `None`
    /// while stopped.
    pub fn select_vehicle(&mut self, vehicle_id: &str, now: DateTime<Utc>) -> Option<TrackRequest> {
        if !self.state.is_running() {
            debug!(vehicle_id, "select ignored: vehicle tracking is stopped");
            return None;
        }
        let surface = self.surface.get_mut()?;
        Some(self.tracks.begin_select(surface, vehicle_id, now))
    }

    /// Applies a history completion for an earlier selection.
    pub fn finish_track(
        &mut self, request: &TrackRequest, result: yard_core::Result<Vec<VehiclePosition>>,
    ) -> TrackOutcome {
        let Some(surface) = self.surface.get_mut() else {
            return TrackOutcome::Stale;
        };
        self.tracks.finish(surface, request, result)
    }

    /// Removes the track line and clears the selection.
    pub fn clear_track(&mut self) -> bool {
        let Some(surface) = self.surface.get_mut() else {
            return false;
        };
        self.tracks.clear(surface)
    }

    /// Drops the track of a vehicle whose stored points were deleted.
    pub fn vehicle_purged(&mut self, vehicle_id: &str) -> bool {
        if self.tracks.selected() != Some(vehicle_id) {
            return false;
        }
        self.clear_track()
    }

    const fn issue(&mut self) -> Option<Ticket> {
        if !self.state.is_running() {
            return None;
        }
        self.issued += 1;
        Some(Ticket { session: self.session, seq: self.issued })
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.state.is_running() && ticket.session == self.session && self.surface.is_attached()
    }

    fn render(&mut self) -> ReconcileReport {
        let Some(surface) = self.surface.get_mut() else {
            return ReconcileReport::default();
        };
        reconcile(&self.vehicles, &mut self.registry, &self.known, surface, &self.icons, self.timezone)
    }
}
