//! # Vehicle tracking
//!
//! Live vehicle markers for the yard map. A [`Runner`] polls the yard
//! backend for the latest GPS position of every vehicle and reconciles the
//! snapshot onto a [`MapSurface`] with the fewest possible marker updates.
//! Selecting a vehicle draws its recent track.

mod api;
mod config;
mod headless;
mod layer;
mod mock_point;
mod model;
mod reconcile;
mod registry;
mod runner;
mod surface;
mod track;

pub use crate::api::GpsTrackClient;
pub use crate::config::Config;
pub use crate::headless::{HeadlessSurface, LineState, MarkerState, SurfaceOps};
pub use crate::layer::{LayerState, SnapshotOutcome, Ticket, TrackingLayer, TrackingView};
pub use crate::mock_point::MockPoint;
pub use crate::model::{RegisteredVehicle, VehiclePosition, known_ids, popup_text};
pub use crate::reconcile::{ReconcileReport, reconcile};
pub use crate::registry::{MarkerAttrs, MarkerEntry, MarkerRegistry};
pub use crate::runner::{Runner, TrackingHandle};
pub use crate::surface::{
    Color, DefaultIconFactory, Icon, IconFactory, LatLng, LayerId, LineId, MapHandle, MapSurface,
    MarkerId, Palette,
};
pub use crate::track::{TrackLoader, TrackOutcome, TrackRequest};
