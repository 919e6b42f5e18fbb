//! Generic web API mocker.
//!
//! Intercepts GET and POST calls under the web base path, records them, and
//! serves queued overrides. `rtm.start` / `rtm.connect` calls additionally
//! get their response body's `url` pointed at a live local RTM session for
//! the caller's token, coupling the HTTP mock to the duplex mock.

use crate::calls::{CallLog, RecordedCall};
use crate::intercept::{Intercept, InterceptHandler, InterceptedRequest};
use crate::params::parse_params;
use crate::responses::{CannedResponse, Family, ResponseOverride, ResponseRegistry};
use crate::rtm::RtmRegistry;
use hyper::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

const BASE_PATH: &str = "/api";

pub struct WebMocker {
    origin: String,
    calls: CallLog,
    responses: Arc<ResponseRegistry>,
}

impl WebMocker {
    pub(crate) fn new(
        intercept: &dyn Intercept,
        responses: Arc<ResponseRegistry>,
        rtm: Arc<RtmRegistry>,
        origin: &str,
    ) -> Arc<Self> {
        let mocker = Arc::new(Self {
            origin: origin.to_string(),
            calls: CallLog::default(),
            responses,
        });

        let handler_mocker = Arc::clone(&mocker);
        let handler: InterceptHandler = Arc::new(move |request| {
            let mocker = Arc::clone(&handler_mocker);
            let rtm = Arc::clone(&rtm);
            Box::pin(async move { mocker.reply(request, rtm).await })
        });
        intercept.register_interceptor(&[Method::GET, Method::POST], BASE_PATH, handler);

        mocker
    }

    /// Base URL the system under test should use in place of the real API.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.origin, BASE_PATH)
    }

    /// Full URL for one API method, e.g. `url("rtm.start")`.
    pub fn url(&self, api_method: &str) -> String {
        format!("{}{}/{}", self.origin, BASE_PATH, api_method)
    }

    pub fn add_response(&self, opts: ResponseOverride) {
        self.responses.set(Family::Web, opts);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.snapshot()
    }

    pub fn reset(&self) {
        debug!("resetting web");
        self.calls.reset();
        self.responses.reset(Family::Web);
    }

    async fn reply(&self, request: InterceptedRequest, rtm: Arc<RtmRegistry>) -> CannedResponse {
        let path = request.path().to_string();
        let url = format!("{}{}", self.origin, path);
        let params = parse_params(&request.path_and_query, &request.body);
        debug!(%url, "intercepted web request");

        self.calls.push(RecordedCall {
            url: url.clone(),
            params: params.clone(),
            headers: request.headers,
            status_code: None,
            call_type: None,
        });

        let mut response = self.responses.get(Family::Web, &url);

        if is_rtm_connect(&path) && body_is_ok(&response.body) {
            match params.get("token").and_then(Value::as_str) {
                Some(token) => match rtm.add_token(token).await {
                    Ok(address) => {
                        debug!(%token, "pointing rtm url at local session");
                        if let Value::Object(body) = &mut response.body {
                            body.insert("url".to_string(), Value::String(address));
                        }
                    }
                    Err(e) => error!(error = %e, "could not create RTM session"),
                },
                None => warn!("rtm connect request without a token; response left untouched"),
            }
        }

        response
    }
}

fn is_rtm_connect(path: &str) -> bool {
    path.ends_with("/rtm.start") || path.ends_with("/rtm.connect")
}

fn body_is_ok(body: &Value) -> bool {
    body.get("ok").and_then(Value::as_bool).unwrap_or(false)
}
