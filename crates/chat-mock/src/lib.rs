//! chat-mock: a deterministic, fully local test double for a chat platform's
//! web API, real-time messaging socket, and webhook surfaces.
//!
//! Integration tests point their bot at the mock's base URLs instead of the
//! real service. Every intercepted call is recorded for assertion, replies
//! are resolved from per-endpoint FIFO override queues with family defaults,
//! and `rtm.start`-style calls hand out addresses of live local websocket
//! sessions keyed by the caller's token.
//!
//! ```no_run
//! use chat_mock::{ChatMock, MockConfig, ResponseOverride};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), chat_mock::MockError> {
//! let mock = ChatMock::start(MockConfig::default()).await?;
//!
//! mock.web.add_response(ResponseOverride {
//!     url: Some(mock.web.url("rtm.start")),
//!     body: Some(json!({"ok": true})),
//!     ..Default::default()
//! });
//!
//! // ... run the bot against mock.web.base_url() ...
//!
//! assert_eq!(mock.web.calls().len(), 1);
//! mock.reset();
//! # Ok(())
//! # }
//! ```

pub mod calls;
pub mod config;
pub mod error;
pub mod intercept;
pub mod mocker;
pub mod params;
pub mod responses;
pub mod rtm;

mod mock;
mod server;

pub use calls::{CallLog, CallType, RecordedCall, RtmCall};
pub use config::{MockConfig, DEFAULT_RTM_PORT};
pub use error::MockError;
pub use mock::{init, ChatMock};
pub use responses::{CannedResponse, Family, ResponseOverride, ResponseRegistry};
pub use rtm::RtmRegistry;
