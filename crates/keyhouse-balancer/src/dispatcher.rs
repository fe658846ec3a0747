//! Request Dispatcher
//!
//! The per-request path: pick the live backend with the least traffic,
//! forward the request unchanged, and stream the response back while
//! counting bytes.
//!
//! ## Forwarding Contract
//!
//! The outbound request is a clone of the inbound one with scheme and host
//! rewritten to the chosen backend: method, path, query string, headers,
//! and body are preserved, and the configured timeout covers the whole
//! round-trip. A transport failure marks the backend not-alive and answers
//! `503`; the request is never retried on a different backend.
//!
//! ## Byte Accounting
//!
//! The response body passes through a counting stream; when the stream
//! finishes, the total is added to the backend's traffic counter in one
//! atomic step. With tracing enabled the response carries `lb-from` and
//! `lb-traffic-before` headers, both set before the status line goes out.
//! No traffic-after header is emitted: headers are flushed before the body
//! is streamed, so the post-increment value cannot reach the client on a
//! non-trailer transport.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HeaderValue, HOST};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::registry::{Backend, Registry};

/// Shared state for the dispatch handler.
pub struct BalancerState {
    pub registry: Arc<Registry>,
    pub client: reqwest::Client,
    pub scheme: &'static str,
    pub trace: bool,
}

/// Create the balancer router: every path funnels into the dispatcher.
pub fn router(state: Arc<BalancerState>) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to read request body: {0}")]
    RequestBody(axum::Error),
}

async fn dispatch(State(state): State<Arc<BalancerState>>, req: Request) -> Response {
    let Some(backend) = state.registry.select_least_traffic().await else {
        warn!("no live backends available");
        return (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response();
    };

    debug!(
        backend = backend.endpoint(),
        traffic = backend.traffic(),
        method = %req.method(),
        path = req.uri().path(),
        "selected backend"
    );

    match forward(&state, &backend, req).await {
        Ok(response) => response,
        Err(err) => {
            error!(backend = backend.endpoint(), error = %err, "forwarding failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response()
        }
    }
}

/// Forward one request to `backend` and stream the response back.
///
/// On transport failure the backend is marked not-alive and the error is
/// returned; the caller answers 503 without retrying.
pub async fn forward(
    state: &BalancerState,
    backend: &Arc<Backend>,
    req: Request,
) -> Result<Response, ForwardError> {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}://{}{}", state.scheme, backend.endpoint(), path_and_query);

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(ForwardError::RequestBody)?;
    let mut headers = parts.headers.clone();
    headers.remove(HOST);

    let upstream = match state
        .client
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(upstream) => upstream,
        Err(err) => {
            warn!(backend = backend.endpoint(), error = %err, "backend unreachable");
            backend.set_alive(false).await;
            return Err(err.into());
        }
    };

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    if state.trace {
        if let Ok(value) = HeaderValue::from_str(backend.endpoint()) {
            response_headers.insert("lb-from", value);
        }
        response_headers.insert("lb-traffic-before", HeaderValue::from(backend.traffic()));
    }

    let counted = CountingStream::new(upstream.bytes_stream().boxed(), backend.clone());
    let mut response = Response::new(Body::from_stream(counted));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// Passes response chunks through while tallying their size; the total is
/// added to the backend's counter once the body completes. A body that
/// errors mid-stream is not counted, matching the fail-fast contract.
struct CountingStream {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    backend: Arc<Backend>,
    written: u64,
    finished: bool,
}

impl CountingStream {
    fn new(inner: BoxStream<'static, reqwest::Result<Bytes>>, backend: Arc<Backend>) -> Self {
        Self {
            inner,
            backend,
            written: 0,
            finished: false,
        }
    }
}

impl Stream for CountingStream {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.written += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if !this.finished {
                    this.finished = true;
                    if this.written > 0 {
                        let total = this.backend.add_traffic(this.written);
                        debug!(
                            backend = this.backend.endpoint(),
                            bytes = this.written,
                            total,
                            "response streamed"
                        );
                    }
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
