//! Append-only logs of observed interactions, exposed for test assertions.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Distinguishes, for multi-hop flows, the immediate synchronous reply from a
/// deferred callback delivered on the generated `response_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Response,
    ResponseUrl,
}

/// One observed HTTP interaction.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedCall {
    pub url: String,
    /// Normalized parameter mapping (query merged over body) for server-role
    /// hops, or the reply body for client-role hops.
    pub params: Value,
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<CallType>,
}

/// One message received on an RTM session peer.
#[derive(Debug, Clone, Serialize)]
pub struct RtmCall {
    /// Raw payload exactly as received.
    pub raw: String,
    /// Best-effort JSON parse of the payload; `None` when malformed.
    pub message: Option<Value>,
    /// Token of the session the message arrived on.
    pub token: String,
    /// Identity of the originating peer within that session.
    pub peer: u64,
}

/// Shared chronological call log. Clones share the same underlying storage,
/// so a handle held by a test observes in-place resets.
#[derive(Clone, Default)]
pub struct CallLog {
    inner: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallLog {
    pub(crate) fn push(&self, call: RecordedCall) {
        self.inner.lock().push(call);
    }

    /// Snapshot of every recorded call, oldest first.
    pub fn snapshot(&self) -> Vec<RecordedCall> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Empty the log in place.
    pub fn reset(&self) {
        self.inner.lock().clear();
    }
}
