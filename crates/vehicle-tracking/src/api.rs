//! # Yard API client
//!
//! Typed access to the GPS tracking endpoints of the yard backend over an
//! injected [`HttpRequest`] provider.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use http::{Method, Request};
use serde::de::DeserializeOwned;
use tracing::debug;
use yard_core::{HttpRequest, Result, bad_gateway, unavailable};

use crate::mock_point::MockPoint;
use crate::model::{RegisteredVehicle, VehiclePosition};

#[derive(Debug)]
pub struct GpsTrackClient<H>
where
    H: HttpRequest,
{
    http: Arc<H>,
    base_url: String,
}

impl<H> Clone for GpsTrackClient<H>
where
    H: HttpRequest,
{
    fn clone(&self) -> Self {
        Self { http: Arc::clone(&self.http), base_url: self.base_url.clone() }
    }
}

impl<H> GpsTrackClient<H>
where
    H: HttpRequest,
{
    pub fn new(http: Arc<H>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// `GET /api/vehicles`
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is unreachable, answers with a
    /// non-success status, or returns an undecodable body.
    pub async fn registered_vehicles(&self) -> Result<Vec<RegisteredVehicle>> {
        let url = format!("{}/api/vehicles", self.base_url);
        self.get_json(url).await
    }

    /// `GET /api/gps-tracks/vehicles`: latest position of every vehicle.
    ///
    /// # Errors
    ///
    /// As for [`Self::registered_vehicles`].
    pub async fn snapshot(&self) -> Result<Vec<VehiclePosition>> {
        let url = format!("{}/api/gps-tracks/vehicles", self.base_url);
        self.get_json(url).await
    }

    /// `GET /api/gps-tracks/{vehicleId}?from=..&to=..`: history ascending by
    /// time.
    ///
    /// # Errors
    ///
    /// As for [`Self::registered_vehicles`].
    pub async fn track(
        &self, vehicle_id: &str, from: DateTime<Utc>, to: DateTime<Utc>,
    ) -> Result<Vec<VehiclePosition>> {
        let from = from.to_rfc3339_opts(SecondsFormat::Millis, true);
        let to = to.to_rfc3339_opts(SecondsFormat::Millis, true);
        let url = format!(
            "{}/api/gps-tracks/{}?from={}&to={}",
            self.base_url,
            urlencoding::encode(vehicle_id),
            urlencoding::encode(&from),
            urlencoding::encode(&to)
        );
        self.get_json(url).await
    }

    /// `POST /api/gps-tracks` after validating the point.
    ///
    /// # Errors
    ///
    /// Returns [`yard_core::Error::BadRequest`] for an invalid point, otherwise
    /// as for [`Self::registered_vehicles`].
    pub async fn submit_point(&self, point: &MockPoint) -> Result<()> {
        point.validate()?;

        let body = serde_json::to_vec(point)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("{}/api/gps-tracks", self.base_url))
            .header("Content-Type", "application/json")
            .body(Bytes::from(body))
            .context("building submit_point request")?;
        self.send(request).await?;

        debug!(vehicle_id = %point.vehicle_id, lat = point.lat, lng = point.lng, "mock point submitted");
        Ok(())
    }

    /// `DELETE /api/gps-tracks/{vehicleId}`: drops every stored point for
    /// the vehicle.
    ///
    /// # Errors
    ///
    /// As for [`Self::registered_vehicles`].
    pub async fn delete_points(&self, vehicle_id: &str) -> Result<()> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("{}/api/gps-tracks/{}", self.base_url, urlencoding::encode(vehicle_id)))
            .body(Bytes::new())
            .context("building delete_points request")?;
        self.send(request).await?;

        debug!(vehicle_id, "vehicle points deleted");
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header("Accept", "application/json")
            .body(Bytes::new())
            .context("building yard API request")?;
        let body = self.send(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send(&self, request: Request<Bytes>) -> Result<Bytes> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response = self
            .http
            .fetch(request)
            .await
            .map_err(|err| unavailable!("{} {}: {:#}", method, uri, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(bad_gateway!("{} {}: status {}", method, uri, status));
        }

        debug!(%method, %uri, %status, "yard API request completed");
        Ok(response.into_body())
    }
}
