//! # Yard map
//!
//! Host for the live vehicle tracking layer. Polls the yard backend and
//! keeps an in-memory map surface up to date, driven from an operator
//! console on stdin.

mod console;
mod provider;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vehicle_tracking::{
    Config, DefaultIconFactory, GpsTrackClient, HeadlessSurface, Runner, TrackingLayer,
};
use yard_core::SystemClock;

use crate::provider::HttpProvider;

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();

    let runtime = runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let result = runtime.block_on(run(Config::from_env()));

    // the stdin reader blocks a worker thread until the next line
    runtime.shutdown_background();
    result
}

async fn run(config: Config) -> Result<()> {
    info!(
        api_url = %config.api_url,
        poll_secs = config.poll_interval.as_secs(),
        timezone = %config.timezone,
        "starting yard map"
    );

    let http = HttpProvider::new(config.http_timeout)?;
    let api = GpsTrackClient::new(Arc::new(http), config.api_url.clone());
    let icons = DefaultIconFactory::new(config.palette.clone());
    let layer = TrackingLayer::new(HeadlessSurface::new(), icons, &config);
    let (runner, handle) = Runner::new(layer, api, SystemClock, config.poll_interval);

    handle.start()?;
    let (console, layer) = tokio::join!(console::run(handle), runner.run());

    if let Some(surface) = layer.surface() {
        let ops = surface.ops();
        info!(
            markers_created = ops.markers_created,
            positions_set = ops.positions_set,
            icons_set = ops.icons_set,
            lines_drawn = ops.lines_drawn,
            "yard map stopped"
        );
    }
    console
}
