//! # Runner
//!
//! Single-threaded event loop driving a [`TrackingLayer`]. Commands arrive
//! through a [`TrackingHandle`]; fetches run concurrently as owned futures
//! and each completion is applied to the layer synchronously. The current
//! [`TrackingView`] is published on a watch channel after every step.

use std::fmt;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use yard_core::{Clock, Error, HttpRequest, Result};

use crate::api::GpsTrackClient;
use crate::config::MAX_POLL_INTERVAL;
use crate::layer::{SnapshotOutcome, Ticket, TrackingLayer, TrackingView};
use crate::mock_point::MockPoint;
use crate::model::{RegisteredVehicle, VehiclePosition};
use crate::surface::{IconFactory, MapSurface};
use crate::track::{TrackOutcome, TrackRequest};

type Reply = oneshot::Sender<Result<()>>;

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Refresh,
    FetchRegistered,
    Select(String),
    ClearTrack,
    ToggleVisibility,
    SubmitPoint(MockPoint, Reply),
    PurgeVehicle(String, Reply),
}

enum Completion {
    Snapshot(Ticket, Result<Vec<VehiclePosition>>),
    Registered(Ticket, Result<Vec<RegisteredVehicle>>),
    Track(TrackRequest, Result<Vec<VehiclePosition>>),
    Submitted(Result<()>, Reply),
    Purged(String, Result<()>, Reply),
}

/// Cloneable control surface for a running [`Runner`].
#[derive(Debug, Clone)]
pub struct TrackingHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<TrackingView>,
}

impl TrackingHandle {
    /// Starts polling and shows the layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the runner has exited.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Stops polling and removes every marker and the track.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the runner has exited.
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Fetches a snapshot now, outside the poll schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the runner has exited.
    pub fn refresh(&self) -> Result<()> {
        self.send(Command::Refresh)
    }

    /// Reloads the registered vehicles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the runner has exited.
    pub fn fetch_registered_vehicles(&self) -> Result<()> {
        self.send(Command::FetchRegistered)
    }

    /// Selects a vehicle and loads its recent track.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the runner has exited.
    pub fn select_vehicle(&self, vehicle_id: impl Into<String>) -> Result<()> {
        self.send(Command::Select(vehicle_id.into()))
    }

    /// Removes the track and clears the selection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the runner has exited.
    pub fn clear_track(&self) -> Result<()> {
        self.send(Command::ClearTrack)
    }

    /// Hides or shows the vehicle layer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when the runner has exited.
    pub fn toggle_visibility(&self) -> Result<()> {
        self.send(Command::ToggleVisibility)
    }

    /// Posts a hand-entered point and refreshes once it is stored.
    ///
    /// # Errors
    ///
    /// Returns the validation or fetch error, or [`Error::Internal`] when the
    /// runner has exited.
    pub async fn submit_point(&self, point: MockPoint) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::SubmitPoint(point, reply))?;
        response.await.map_err(runner_gone)?
    }

    /// Deletes every stored point of a vehicle and refreshes.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, or [`Error::Internal`] when the runner has
    /// exited.
    pub async fn purge_vehicle(&self, vehicle_id: impl Into<String>) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::PurgeVehicle(vehicle_id.into(), reply))?;
        response.await.map_err(runner_gone)?
    }

    /// Watch for view changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TrackingView> {
        self.view.clone()
    }

    /// The most recently published view.
    #[must_use]
    pub fn view(&self) -> TrackingView {
        self.view.borrow().clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(runner_gone)
    }
}

fn runner_gone(err: impl fmt::Display) -> Error {
    Error::Internal(format!("tracking runner has exited: {err}"))
}

pub struct Runner<S, I, H, C>
where
    S: MapSurface,
    I: IconFactory,
    H: HttpRequest + 'static,
    C: Clock,
{
    layer: TrackingLayer<S, I>,
    api: GpsTrackClient<H>,
    clock: C,
    poll_interval: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<TrackingView>,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, Completion>>,
}

impl<S, I, H, C> Runner<S, I, H, C>
where
    S: MapSurface,
    I: IconFactory,
    H: HttpRequest + 'static,
    C: Clock,
{
    pub fn new(
        layer: TrackingLayer<S, I>, api: GpsTrackClient<H>, clock: C, poll_interval: Duration,
    ) -> (Self, TrackingHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (view, view_rx) = watch::channel(layer.view());

        let runner = Self {
            layer,
            api,
            clock,
            poll_interval: poll_interval.clamp(Duration::from_secs(1), MAX_POLL_INTERVAL),
            commands,
            view,
            in_flight: FuturesUnordered::new(),
        };
        (runner, TrackingHandle { commands: commands_tx, view: view_rx })
    }

    /// Runs until every [`TrackingHandle`] has been dropped, then waits for
    /// in-flight fetches and returns the layer.
    pub async fn run(mut self) -> TrackingLayer<S, I> {
        let mut ticker = time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if self.handle(command) {
                        ticker.reset();
                    }
                }
                Some(completion) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.complete(completion);
                }
                _ = ticker.tick(), if self.layer.state().is_running() => {
                    debug!("poll tick");
                    self.refresh();
                }
            }
            self.publish();
        }

        debug!(in_flight = self.in_flight.len(), "handles dropped, draining fetches");
        while let Some(completion) = self.in_flight.next().await {
            self.complete(completion);
        }
        self.publish();
        info!("tracking runner exited");
        self.layer
    }

    // Returns true when the poll timer should restart.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start => {
                if !self.layer.start() {
                    return false;
                }
                self.fetch_registered();
                self.refresh();
                return true;
            }
            Command::Stop => {
                self.layer.stop();
            }
            Command::Refresh => self.refresh(),
            Command::FetchRegistered => self.fetch_registered(),
            Command::Select(vehicle_id) => self.select(&vehicle_id),
            Command::ClearTrack => {
                self.layer.clear_track();
            }
            Command::ToggleVisibility => {
                self.layer.toggle_visibility();
            }
            Command::SubmitPoint(point, reply) => {
                let api = self.api.clone();
                self.in_flight.push(
                    async move {
                        let result = api.submit_point(&point).await;
                        Completion::Submitted(result, reply)
                    }
                    .boxed_local(),
                );
            }
            Command::PurgeVehicle(vehicle_id, reply) => {
                let api = self.api.clone();
                self.in_flight.push(
                    async move {
                        let result = api.delete_points(&vehicle_id).await;
                        Completion::Purged(vehicle_id, result, reply)
                    }
                    .boxed_local(),
                );
            }
        }
        false
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Snapshot(ticket, result) => match self.layer.apply_snapshot(ticket, result) {
                SnapshotOutcome::Applied(report) if !report.is_noop() => {
                    info!(
                        vehicles = self.layer.vehicles().len(),
                        added = report.added,
                        moved = report.moved,
                        removed = report.removed,
                        "vehicle positions updated"
                    );
                }
                outcome => debug!(?outcome, "snapshot completed"),
            },
            Completion::Registered(ticket, result) => {
                self.layer.apply_registered(ticket, result);
            }
            Completion::Track(request, result) => match self.layer.finish_track(&request, result) {
                TrackOutcome::Drawn(points) => {
                    info!(vehicle_id = %request.vehicle_id, points, "vehicle track drawn");
                }
                outcome => debug!(vehicle_id = %request.vehicle_id, ?outcome, "vehicle track completed"),
            },
            Completion::Submitted(result, reply) => {
                match &result {
                    Ok(()) => self.refresh(),
                    Err(err) => warn!(error = %err, "failed to submit mock point"),
                }
                let _ = reply.send(result);
            }
            Completion::Purged(vehicle_id, result, reply) => {
                match &result {
                    Ok(()) => {
                        info!(vehicle_id = %vehicle_id, "vehicle points purged");
                        self.layer.vehicle_purged(&vehicle_id);
                        self.refresh();
                    }
                    Err(err) => warn!(vehicle_id = %vehicle_id, error = %err, "failed to purge vehicle"),
                }
                let _ = reply.send(result);
            }
        }
    }

    fn refresh(&mut self) {
        let Some(ticket) = self.layer.begin_refresh() else {
            debug!("refresh ignored: vehicle tracking is stopped");
            return;
        };
        let api = self.api.clone();
        self.in_flight.push(
            async move {
                let result = api.snapshot().await;
                Completion::Snapshot(ticket, result)
            }
            .boxed_local(),
        );
    }

    fn fetch_registered(&mut self) {
        let Some(ticket) = self.layer.begin_registered() else {
            debug!("registered vehicles fetch ignored: vehicle tracking is stopped");
            return;
        };
        let api = self.api.clone();
        self.in_flight.push(
            async move {
                let result = api.registered_vehicles().await;
                Completion::Registered(ticket, result)
            }
            .boxed_local(),
        );
    }

    fn select(&mut self, vehicle_id: &str) {
        let Some(request) = self.layer.select_vehicle(vehicle_id, self.clock.now()) else {
            return;
        };
        let api = self.api.clone();
        self.in_flight.push(
            async move {
                let result = api.track(&request.vehicle_id, request.from, request.to).await;
                Completion::Track(request, result)
            }
            .boxed_local(),
        );
    }

    fn publish(&self) {
        let next = self.layer.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
