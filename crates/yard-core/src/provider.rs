//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use anyhow::Result;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{Request, Response};

/// The `HttpRequest` trait defines the behavior for fetching data from a source.
pub trait HttpRequest: Send + Sync {
    /// Make outbound HTTP request.
    ///
    /// Implementations return `Err` only when the request could not be
    /// completed. Non-success statuses are returned as responses.
    fn fetch(&self, request: Request<Bytes>) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

/// The `Clock` trait supplies the current time so that time windows can be
/// pinned in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock fixed at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
