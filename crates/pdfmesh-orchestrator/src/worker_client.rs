//! HTTP client for talking to worker services.
//!
//! One pooled hyper client is shared by the discovery loop, the health loop
//! and the proxy. Every call is bounded: probes by a timeout, proxied calls by
//! a [`Deadline`] that also covers reading the response body. Dropping the
//! returned future cancels the call.

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Response, StatusCode};
use futures::StreamExt;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use pdfmesh_common::{PdfMeshError, Result};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Largest `/info` or `/health` body accepted from a worker.
const PROBE_BODY_LIMIT: usize = 1024 * 1024;

/// One time budget for a whole worker call: headers and body.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// The error reported when the deadline passes.
    pub fn expired(&self) -> PdfMeshError {
        PdfMeshError::Timeout(self.budget.as_millis() as u64)
    }

    /// Runs `fut`, failing with `Timeout` if the deadline passes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout_at(self.at, fut)
            .await
            .map_err(|_| self.expired())?
    }

    /// Wraps a streaming body so that it errors out once the deadline
    /// passes. The inner body is dropped at that point, closing the upstream
    /// connection.
    pub fn bound_body(&self, body: Body) -> Body {
        let deadline = *self;
        let stream = futures::stream::unfold(Some(body.into_data_stream()), move |state| async move {
            let mut frames = state?;
            match tokio::time::timeout_at(deadline.at, frames.next()).await {
                Ok(Some(Ok(bytes))) => Some((Ok(bytes), Some(frames))),
                Ok(Some(Err(e))) => Some((
                    Err(PdfMeshError::Transport(format!("Worker body failed: {}", e))),
                    None,
                )),
                Ok(None) => None,
                Err(_) => Some((Err(deadline.expired()), None)),
            }
        });
        Body::from_stream(stream)
    }
}

/// Shared client for worker HTTP calls.
#[derive(Clone)]
pub struct WorkerClient {
    client: Client<HttpConnector, Body>,
}

impl WorkerClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// `GET url` and parse a 200 JSON body, all within `timeout`.
    ///
    /// # Errors
    /// - `Timeout` if the worker does not answer in time
    /// - `UpstreamUnreachable` on connection failures
    /// - `InvalidResponse` on a non-200 status
    /// - `JsonSerialization` on a malformed body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
        Deadline::after(timeout).run(self.fetch_json(url)).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.request(get_request(url)?).await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PdfMeshError::InvalidResponse(format!(
                "{} returned status {}",
                url, status
            )));
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), PROBE_BODY_LIMIT)
            .await
            .map_err(|e| PdfMeshError::Transport(format!("Failed to read body from {}: {}", url, e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `GET url`, returning the response once its headers arrive.
    pub async fn get(&self, url: &str, deadline: Deadline) -> Result<Response<Incoming>> {
        self.send(get_request(url)?, deadline).await
    }

    /// `POST body` to `url` with the given content type.
    ///
    /// The body is passed through untouched, so a multipart boundary in
    /// `content_type` stays valid.
    pub async fn post(
        &self,
        url: &str,
        content_type: Option<HeaderValue>,
        body: Body,
        deadline: Deadline,
    ) -> Result<Response<Incoming>> {
        let mut builder = Request::builder().method(Method::POST).uri(url);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(body)
            .map_err(|e| PdfMeshError::Transport(format!("Failed to build request for {}: {}", url, e)))?;

        self.send(request, deadline).await
    }

    /// Sends a request and waits for response headers until `deadline`.
    ///
    /// The body is not read; callers bound it with the same deadline through
    /// [`Deadline::run`] or [`Deadline::bound_body`].
    pub async fn send(&self, request: Request<Body>, deadline: Deadline) -> Result<Response<Incoming>> {
        deadline.run(self.request(request)).await
    }

    async fn request(&self, request: Request<Body>) -> Result<Response<Incoming>> {
        let uri = request.uri().to_string();
        self.client
            .request(request)
            .await
            .map_err(|e| PdfMeshError::UpstreamUnreachable(format!("{}: {}", uri, error_chain(&e))))
    }
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::new()
    }
}

fn get_request(url: &str) -> Result<Request<Body>> {
    Request::builder()
        .method(Method::GET)
        .uri(url)
        .body(Body::empty())
        .map_err(|e| PdfMeshError::Transport(format!("Failed to build request for {}: {}", url, e)))
}

/// Flattens an error and its sources into one line.
///
/// hyper's top-level client errors ("client error (Connect)") hide the cause
/// in the source chain.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
