//! `reqwest`-backed [`HttpRequest`] provider.

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::{Request, Response};
use yard_core::HttpRequest;

#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
}

impl HttpProvider {
    /// Builds a pooled client that gives up on requests after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client =
            reqwest::Client::builder().timeout(timeout).build().context("building HTTP client")?;
        Ok(Self { client })
    }
}

impl HttpRequest for HttpProvider {
    async fn fetch(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let request = reqwest::Request::try_from(request).context("converting request")?;
        let response = self.client.execute(request).await.context("sending request")?;

        let mut builder = Response::builder().status(response.status());
        for (name, value) in response.headers() {
            builder = builder.header(name, value);
        }
        let body = response.bytes().await.context("reading response body")?;
        builder.body(body).context("building response")
    }
}
