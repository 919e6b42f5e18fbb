//! Interactive button mocker.
//!
//! Same two-hop shape as slash commands: a form-encoded button action is
//! delivered with a unique `response_url`, the immediate reply is recorded,
//! and deferred callbacks on that URL are recorded and answered from the
//! registry.

use crate::calls::{CallLog, CallType, RecordedCall};
use crate::intercept::{Intercept, InterceptHandler, InterceptedRequest};
use crate::mocker::{form_pairs, header_map, parse_reply_body};
use crate::params::parse_params;
use crate::responses::{CannedResponse, Family, ResponseOverride, ResponseRegistry};
use hyper::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

const CALLBACK_PATH: &str = "/interactive-buttons";

pub struct InteractiveButtonsMocker {
    origin: String,
    calls: CallLog,
    responses: Arc<ResponseRegistry>,
    client: reqwest::Client,
    next_action: AtomicU64,
}

impl InteractiveButtonsMocker {
    pub(crate) fn new(
        intercept: &dyn Intercept,
        responses: Arc<ResponseRegistry>,
        origin: &str,
    ) -> Arc<Self> {
        let mocker = Arc::new(Self {
            origin: origin.to_string(),
            calls: CallLog::default(),
            responses,
            client: reqwest::Client::new(),
            next_action: AtomicU64::new(0),
        });

        let handler_mocker = Arc::clone(&mocker);
        let handler: InterceptHandler = Arc::new(move |request| {
            let mocker = Arc::clone(&handler_mocker);
            Box::pin(async move { mocker.reply(request) })
        });
        intercept.register_interceptor(&[Method::POST], CALLBACK_PATH, handler);

        mocker
    }

    /// Deliver a simulated button action to `target`; see
    /// [`SlashCommandsMocker::send`](crate::mocker::SlashCommandsMocker::send)
    /// for the recording and failure semantics.
    pub async fn send(&self, target: &str, mut data: Value) {
        let number = self.next_action.fetch_add(1, Ordering::Relaxed) + 1;
        let response_url = format!("{}{}/{}", self.origin, CALLBACK_PATH, number);
        if let Value::Object(map) = &mut data {
            map.insert("response_url".to_string(), Value::String(response_url));
        }

        let result = self
            .client
            .post(target)
            .form(&form_pairs(&data))
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(%target, error = %e, "error receiving response to interactive button");
                return;
            }
        };

        let status_code = response.status().as_u16();
        let headers = header_map(response.headers());
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!(%target, error = %e, "error reading interactive button response body");
                return;
            }
        };

        debug!(%target, "received response to interactive button request");
        self.calls.push(RecordedCall {
            url: target.to_string(),
            params: parse_reply_body("interactive-buttons", text),
            headers,
            status_code: Some(status_code),
            call_type: Some(CallType::Response),
        });
    }

    pub fn add_response(&self, opts: ResponseOverride) {
        self.responses.set(Family::InteractiveButtons, opts);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.snapshot()
    }

    pub fn reset(&self) {
        debug!("resetting interactive-buttons");
        self.calls.reset();
        self.responses.reset(Family::InteractiveButtons);
    }

    fn reply(&self, request: InterceptedRequest) -> CannedResponse {
        let url = format!("{}{}", self.origin, request.path());
        debug!(%url, "intercepted interactive button response_url request");

        self.calls.push(RecordedCall {
            url: url.clone(),
            params: parse_params(&request.path_and_query, &request.body),
            headers: request.headers,
            status_code: None,
            call_type: Some(CallType::ResponseUrl),
        });

        self.responses.get(Family::InteractiveButtons, &url)
    }
}
