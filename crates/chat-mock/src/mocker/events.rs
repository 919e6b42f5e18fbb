//! Event API mocker (client role only).
//!
//! Delivers a simulated platform event to the system under test as a JSON
//! POST and records the reply.

use crate::calls::{CallLog, RecordedCall};
use crate::mocker::{header_map, parse_reply_body};
use serde_json::Value;
use tracing::{debug, error};

#[derive(Default)]
pub struct EventsMocker {
    calls: CallLog,
    client: reqwest::Client,
}

impl EventsMocker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// POST `data` to `target` as JSON and record the reply. Transport
    /// failures are logged and absorbed; nothing is recorded for them.
    pub async fn send(&self, target: &str, data: Value) {
        let result = self.client.post(target).json(&data).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!(%target, error = %e, "error receiving response to event");
                return;
            }
        };

        let status_code = response.status().as_u16();
        let headers = header_map(response.headers());
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!(%target, error = %e, "error reading event response body");
                return;
            }
        };

        debug!(%target, "received response to event request");
        self.calls.push(RecordedCall {
            url: target.to_string(),
            params: parse_reply_body("events", text),
            headers,
            status_code: Some(status_code),
            call_type: None,
        });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.snapshot()
    }

    pub fn reset(&self) {
        debug!("resetting events");
        self.calls.reset();
    }
}
