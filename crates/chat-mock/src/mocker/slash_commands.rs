//! Slash command mocker.
//!
//! Client role: delivers a simulated slash command to the system under test
//! as a form-encoded POST carrying a unique `response_url`, and records the
//! immediate reply. Server role: records callbacks on the generated
//! `response_url` and serves queued overrides for them.

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

const CALLBACK_PATH: &str = "/slash-commands";

pub struct SlashCommandsMocker {
    origin: String,
    calls: CallLog,
    responses: Arc<ResponseRegistry>,
    client: reqwest::Client,
    next_command: AtomicU64,
}

impl SlashCommandsMocker {
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
            next_command: AtomicU64::new(0),
        });

        let handler_mocker = Arc::clone(&mocker);
        let handler: InterceptHandler = Arc::new(move |request| {
            let mocker = Arc::clone(&handler_mocker);
            Box::pin(async move { mocker.reply(request) })
        });
        intercept.register_interceptor(&[Method::POST], CALLBACK_PATH, handler);

        mocker
    }

    /// Deliver a simulated slash command to `target`.
    ///
    /// A unique `response_url` is injected into `data` before the
    /// form-encoded POST. The immediate reply is recorded with
    /// `type: "response"`; transport failures are logged and absorbed, so
    /// callers assert on recorded-call counts instead of errors.
    pub async fn send(&self, target: &str, mut data: Value) {
        let number = self.next_command.fetch_add(1, Ordering::Relaxed) + 1;
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
                error!(%target, error = %e, "error receiving response to slash command");
                return;
            }
        };

        let status_code = response.status().as_u16();
        let headers = header_map(response.headers());
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!(%target, error = %e, "error reading slash command response body");
                return;
            }
        };

        debug!(%target, "received response to slash command request");
        self.calls.push(RecordedCall {
            url: target.to_string(),
            params: parse_reply_body("slash-commands", text),
            headers,
            status_code: Some(status_code),
            call_type: Some(CallType::Response),
        });
    }

    pub fn add_response(&self, opts: ResponseOverride) {
        self.responses.set(Family::SlashCommands, opts);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.snapshot()
    }

    pub fn reset(&self) {
        debug!("resetting slash-commands");
        self.calls.reset();
        self.responses.reset(Family::SlashCommands);
    }

    fn reply(&self, request: InterceptedRequest) -> CannedResponse {
        let url = format!("{}{}", self.origin, request.path());
        debug!(%url, "intercepted slash command response_url request");

        self.calls.push(RecordedCall {
            url: url.clone(),
            params: parse_params(&request.path_and_query, &request.body),
            headers: request.headers,
            status_code: None,
            call_type: Some(CallType::ResponseUrl),
        });

        self.responses.get(Family::SlashCommands, &url)
    }
}
