//! Shared helpers for socket-level integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Poll `condition` until it holds or a 5s deadline passes.
pub async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Minimal stand-in for a bot under test.
///
/// Answers every POST with `immediate_body`; when `callback_text` is set and
/// the form payload carries a `response_url`, it posts
/// `{text: callback_text}` back on that URL after replying.
pub async fn spawn_bot(
    immediate_body: &'static str,
    callback_text: Option<&'static str>,
) -> SocketAddr {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("bind bot listener");
    let addr = listener.local_addr().expect("bot listener addr");

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service =
                    service_fn(move |req| handle_bot_request(req, immediate_body, callback_text));
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    addr
}

async fn handle_bot_request(
    req: Request<Incoming>,
    immediate_body: &'static str,
    callback_text: Option<&'static str>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();
    let form = String::from_utf8_lossy(&bytes).into_owned();
    let params = chat_mock::params::parse_params("/", &chat_mock::params::RequestBody::Form(form));

    if let Some(text) = callback_text {
        if let Some(response_url) = params.get("response_url").and_then(|v| v.as_str()) {
            let response_url = response_url.to_string();
            tokio::spawn(async move {
                let _ = reqwest::Client::new()
                    .post(&response_url)
                    .form(&[("text", text)])
                    .send()
                    .await;
            });
        }
    }

    Ok(Response::new(Full::new(Bytes::from(immediate_body))))
}
