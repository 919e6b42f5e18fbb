//! Mock configuration.

use tracing::Level;

/// Default port for the shared RTM websocket transport.
pub const DEFAULT_RTM_PORT: u16 = 9001;

/// Startup configuration for [`ChatMock`](crate::ChatMock).
///
/// `init` applies this exactly once per process; later calls return the
/// existing instance and ignore whatever they were given.
#[derive(Debug, Clone, Copy)]
pub struct MockConfig {
    /// Port the RTM websocket transport listens on. `0` picks an ephemeral
    /// port; session addresses returned by `add_token` always carry the
    /// actually bound port.
    pub rtm_port: u16,
    /// Port the HTTP intercept listener binds. Defaults to `0` (ephemeral)
    /// since tests read per-family base URLs from the handle.
    pub http_port: u16,
    /// Log verbosity applied on first init. `None` leaves filtering to
    /// `RUST_LOG`.
    pub log_level: Option<Level>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            rtm_port: DEFAULT_RTM_PORT,
            http_port: 0,
            log_level: None,
        }
    }
}
