//! HTTP listener serving the intercept router.
//!
//! One accept loop on a local port; each connection is served by hyper's
//! http1 connection driver and every request is decoded into an
//! [`InterceptedRequest`] before dispatch.

use crate::error::MockError;
use crate::intercept::{InterceptRouter, InterceptedRequest};
use crate::params::RequestBody;
use crate::responses::CannedResponse;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub(crate) struct InterceptServer {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl InterceptServer {
    /// Bind `port` (0 = ephemeral) and start serving `router`.
    pub(crate) async fn bind(port: u16, router: Arc<InterceptRouter>) -> Result<Self, MockError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| MockError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| MockError::Bind { port, source })?;

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _addr)) => {
                                let router = Arc::clone(&router);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let router = Arc::clone(&router);
                                        async move { handle_request(req, router).await }
                                    });
                                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                        debug!(error = %e, "intercept connection error");
                                    }
                                });
                            }
                            Err(e) => error!(error = %e, "intercept accept error"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("intercept server shutting down");
                        break;
                    }
                }
            }
        });

        info!(%local_addr, "intercept server listening");

        Ok(Self {
            local_addr,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections; resolves after the accept loop exits.
    pub(crate) async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                debug!(error = %e, "intercept server task join failed");
            }
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    router: Arc<InterceptRouter>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let content_type = headers.get("content-type").cloned().unwrap_or_default();

    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(error = %e, "failed to read request body");
            Bytes::new()
        }
    };

    let request = InterceptedRequest {
        method,
        path_and_query,
        headers,
        body: decode_body(&content_type, &bytes),
    };

    match router.dispatch(request).await {
        Some(reply) => Ok(render_reply(reply)),
        None => Ok(plain_response(
            StatusCode::NOT_FOUND,
            "no interceptor registered for this path",
        )),
    }
}

/// Decode the body by content type: JSON payloads become structured values,
/// anything else is kept as a raw (form-encoded) string.
fn decode_body(content_type: &str, bytes: &Bytes) -> RequestBody {
    if bytes.is_empty() {
        return RequestBody::Empty;
    }
    if content_type.contains("json") {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return RequestBody::Json(value);
        }
        debug!("json content type with unparseable body, treating as raw string");
    }
    RequestBody::Form(String::from_utf8_lossy(bytes).into_owned())
}

/// Render a canned reply. String bodies go out verbatim as text, everything
/// else is serialized as JSON; override headers may replace the content type.
fn render_reply(reply: CannedResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(reply.status_code).unwrap_or(StatusCode::OK);
    let (default_content_type, bytes) = match &reply.body {
        Value::String(text) => ("text/plain; charset=utf-8", Bytes::from(text.clone())),
        other => (
            "application/json",
            Bytes::from(serde_json::to_vec(other).unwrap_or_default()),
        ),
    };

    let mut builder = Response::builder().status(status);
    let mut has_content_type = false;
    for (key, value) in &reply.headers {
        if key.eq_ignore_ascii_case("content-type") {
            has_content_type = true;
        }
        builder = builder.header(key.as_str(), value.as_str());
    }
    if !has_content_type {
        builder = builder.header("content-type", default_content_type);
    }

    builder
        .body(Full::new(bytes))
        .unwrap_or_else(|_| plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"))
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from(body))))
}
