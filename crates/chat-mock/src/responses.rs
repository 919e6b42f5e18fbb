//! Queued response overrides with per-family defaults.
//!
//! Each family that accepts custom responses owns a map of FIFO queues keyed
//! by exact URL, plus a wildcard queue (`"any"`) for overrides registered
//! without a URL. A queued response is served at most once; an empty or
//! absent specific queue falls back to the wildcard queue, and an empty
//! wildcard falls back to the family's synthesized default.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::debug;

/// Queue key used when an override was registered without a URL.
pub const WILDCARD_URL: &str = "any";

/// The simulated surfaces that accept queued response overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Web,
    IncomingWebhooks,
    SlashCommands,
    InteractiveButtons,
}

impl Family {
    pub(crate) const ALL: [Family; 4] = [
        Family::Web,
        Family::IncomingWebhooks,
        Family::SlashCommands,
        Family::InteractiveButtons,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Web => "web",
            Family::IncomingWebhooks => "incoming-webhooks",
            Family::SlashCommands => "slash-commands",
            Family::InteractiveButtons => "interactive-buttons",
        }
    }

    /// Default reply body when no override is queued: an `ok` envelope for
    /// the web API, a plain acknowledgement for the webhook-style families.
    fn default_body(&self) -> Value {
        match self {
            Family::Web => json!({"ok": true}),
            _ => json!("OK"),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved canned reply.
#[derive(Debug, Clone, PartialEq)]
pub struct CannedResponse {
    pub status_code: u16,
    pub body: Value,
    pub headers: HashMap<String, String>,
}

/// Partial response override passed to `add_response`; missing fields are
/// filled with family defaults when the override is enqueued.
#[derive(Debug, Clone, Default)]
pub struct ResponseOverride {
    /// Exact URL the override applies to; `None` targets the wildcard queue.
    pub url: Option<String>,
    pub status_code: Option<u16>,
    pub body: Option<Value>,
    pub headers: Option<HashMap<String, String>>,
}

/// Per-family, per-URL FIFO queues of canned responses.
#[derive(Default)]
pub struct ResponseRegistry {
    queues: Mutex<HashMap<Family, HashMap<String, VecDeque<CannedResponse>>>>,
}

impl ResponseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an override for `family`.
    pub fn set(&self, family: Family, opts: ResponseOverride) {
        let url = opts.url.unwrap_or_else(|| WILDCARD_URL.to_string());
        let response = CannedResponse {
            status_code: opts.status_code.unwrap_or(200),
            body: opts.body.unwrap_or_else(|| family.default_body()),
            headers: opts.headers.unwrap_or_default(),
        };

        debug!(%family, %url, "queued response override");

        self.queues
            .lock()
            .entry(family)
            .or_default()
            .entry(url)
            .or_default()
            .push_back(response);
    }

    /// Resolve the next response for `(family, url)`, consuming it.
    ///
    /// A specific-URL queue always wins over the wildcard queue while it has
    /// pending entries; once both are exhausted the family default is
    /// synthesized.
    pub fn get(&self, family: Family, url: &str) -> CannedResponse {
        let mut queues = self.queues.lock();

        if let Some(by_url) = queues.get_mut(&family) {
            if let Some(response) = by_url.get_mut(url).and_then(VecDeque::pop_front) {
                debug!(%family, %url, "responding with queued override");
                return response;
            }
            if let Some(response) = by_url.get_mut(WILDCARD_URL).and_then(VecDeque::pop_front) {
                debug!(%family, %url, "responding with wildcard override");
                return response;
            }
        }

        CannedResponse {
            status_code: 200,
            body: family.default_body(),
            headers: HashMap::new(),
        }
    }

    /// Drop every queue belonging to `family`.
    pub fn reset(&self, family: Family) {
        debug!(%family, "clearing response overrides");
        self.queues.lock().remove(&family);
    }

    /// Drop the queues of every family.
    pub fn reset_all(&self) {
        for family in Family::ALL {
            self.reset(family);
        }
    }
}
