//! Request parameter normalization.
//!
//! Merges query-string pairs and the request body into one canonical JSON
//! mapping, the shape recorded calls carry regardless of whether the caller
//! used GET with a query string, a form-encoded POST, or a JSON POST.

use serde_json::{Map, Value};
use tracing::debug;

/// Raw request body as seen by an interceptor.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` (or otherwise unstructured) payload.
    Form(String),
    /// Already-structured JSON payload.
    Json(Value),
    Empty,
}

/// Normalize `path_and_query` plus `body` into one parameter mapping.
///
/// Query pairs override body keys on collision. When there is no query
/// string the parsed (or structured) body is returned as-is. The caller's
/// body is never mutated; the result is a fresh value.
pub fn parse_params(path_and_query: &str, body: &RequestBody) -> Value {
    let mut params = match body {
        RequestBody::Form(raw) => {
            debug!(body = %raw, "parsing form-encoded body");
            Value::Object(parse_pairs(raw))
        }
        RequestBody::Json(value) => value.clone(),
        RequestBody::Empty => Value::Object(Map::new()),
    };

    let query = path_and_query.split_once('?').map(|(_, q)| q);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        debug!(%query, "parsing query parameters");
        if let Value::Object(map) = &mut params {
            for (key, value) in parse_pairs(query) {
                map.insert(key, value);
            }
        }
    }

    params
}

/// Parse flat `key=value` pairs, URL-decoding keys and values.
/// A bare key without `=` maps to the empty string.
fn parse_pairs(raw: &str) -> Map<String, Value> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), Value::String(decode(value)))
        })
        .collect()
}

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}
