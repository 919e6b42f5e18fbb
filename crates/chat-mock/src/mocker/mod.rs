//! Endpoint interceptors, one per simulated external surface.
//!
//! Server-role mockers register handlers on the intercept seam; client-role
//! mockers additionally deliver simulated inbound calls to the system under
//! test with reqwest and record the reply.

pub mod events;
pub mod incoming_webhooks;
pub mod interactive_buttons;
pub mod outgoing_webhooks;
pub mod slash_commands;
pub mod web;

pub use events::EventsMocker;
pub use incoming_webhooks::IncomingWebhooksMocker;
pub use interactive_buttons::InteractiveButtonsMocker;
pub use outgoing_webhooks::OutgoingWebhooksMocker;
pub use slash_commands::SlashCommandsMocker;
pub use web::WebMocker;

use serde_json::Value;
use std::collections::HashMap;
use tracing::error;

/// Flatten reqwest response headers into the map recorded calls carry.
pub(crate) fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
        .collect()
}

/// Flatten a JSON object into form fields, stringifying scalar values.
pub(crate) fn form_pairs(data: &Value) -> Vec<(String, String)> {
    match data {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Best-effort JSON parse of a reply body; the raw string is kept when
/// parsing fails.
pub(crate) fn parse_reply_body(surface: &str, text: String) -> Value {
    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            error!(%surface, error = %e, "could not parse response body as json");
            Value::String(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_pairs_stringifies_scalars() {
        let data = json!({"text": "hello", "count": 3, "flag": true});
        let mut pairs = form_pairs(&data);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("count".to_string(), "3".to_string()),
                ("flag".to_string(), "true".to_string()),
                ("text".to_string(), "hello".to_string()),
            ]
        );
    }

    #[test]
    fn parse_reply_body_falls_back_to_raw_string() {
        assert_eq!(parse_reply_body("test", "{\"a\":1}".to_string()), json!({"a": 1}));
        assert_eq!(
            parse_reply_body("test", "GO CUBS".to_string()),
            Value::String("GO CUBS".to_string())
        );
    }
}
