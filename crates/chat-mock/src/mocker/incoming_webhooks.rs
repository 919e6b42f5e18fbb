//! Incoming webhook receiver mocker.
//!
//! Stands in for the platform's webhook ingestion endpoint: records every
//! POST under the hooks base path and serves queued overrides.

use crate::calls::{CallLog, RecordedCall};
use crate::intercept::{Intercept, InterceptHandler, InterceptedRequest};
use crate::params::parse_params;
use crate::responses::{CannedResponse, Family, ResponseOverride, ResponseRegistry};
use hyper::Method;
use std::sync::Arc;
use tracing::debug;

const BASE_PATH: &str = "/hooks";

pub struct IncomingWebhooksMocker {
    origin: String,
    calls: CallLog,
    responses: Arc<ResponseRegistry>,
}

impl IncomingWebhooksMocker {
    pub(crate) fn new(
        intercept: &dyn Intercept,
        responses: Arc<ResponseRegistry>,
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
            Box::pin(async move { mocker.reply(request) })
        });
        intercept.register_interceptor(&[Method::POST], BASE_PATH, handler);

        mocker
    }

    /// Base URL to hand to bots as their webhook target.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.origin, BASE_PATH)
    }

    pub fn add_response(&self, opts: ResponseOverride) {
        self.responses.set(Family::IncomingWebhooks, opts);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.snapshot()
    }

    pub fn reset(&self) {
        debug!("resetting incoming-webhooks");
        self.calls.reset();
        self.responses.reset(Family::IncomingWebhooks);
    }

    fn reply(&self, request: InterceptedRequest) -> CannedResponse {
        let url = format!("{}{}", self.origin, request.path());
        debug!(%url, "intercepted incoming-webhooks request");

        self.calls.push(RecordedCall {
            url: url.clone(),
            params: parse_params(&request.path_and_query, &request.body),
            headers: request.headers,
            status_code: None,
            call_type: None,
        });

        self.responses.get(Family::IncomingWebhooks, &url)
    }
}
