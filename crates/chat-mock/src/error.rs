//! Error types surfaced by the mock's explicit API calls.

/// Errors returned by `rtm` operations and mock startup.
///
/// Failures inside simulated inbound delivery (client-role sends, malformed
/// socket payloads) are logged and absorbed at the interceptor boundary and
/// never show up here; tests observe those through recorded-call counts.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("client with token {0} has never connected to the RTM API")]
    UnknownToken(String),

    #[error("no peer is connected to the RTM session for token {0}")]
    Undeliverable(String),

    #[error("could not deliver RTM message: {0}")]
    Delivery(String),

    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize RTM message: {0}")]
    Serialize(#[from] serde_json::Error),
}
