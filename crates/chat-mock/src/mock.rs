//! Process-wide mock handle.

use crate::config::MockConfig;
use crate::error::MockError;
use crate::intercept::InterceptRouter;
use crate::mocker::{
    EventsMocker, IncomingWebhooksMocker, InteractiveButtonsMocker, OutgoingWebhooksMocker,
    SlashCommandsMocker, WebMocker,
};
use crate::responses::ResponseRegistry;
use crate::rtm::RtmRegistry;
use crate::server::InterceptServer;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Aggregate handle over every simulated surface.
///
/// Constructed either explicitly with [`ChatMock::start`] (each instance owns
/// its own listeners, the shape tests use) or once per process through
/// [`init`].
pub struct ChatMock {
    pub web: Arc<WebMocker>,
    pub incoming_webhooks: Arc<IncomingWebhooksMocker>,
    pub outgoing_webhooks: Arc<OutgoingWebhooksMocker>,
    pub slash_commands: Arc<SlashCommandsMocker>,
    pub interactive_buttons: Arc<InteractiveButtonsMocker>,
    pub events: Arc<EventsMocker>,
    pub rtm: Arc<RtmRegistry>,
    server: InterceptServer,
    responses: Arc<ResponseRegistry>,
}

impl ChatMock {
    /// Bind the HTTP intercept listener and the RTM shared transport, and
    /// wire up every interceptor.
    pub async fn start(config: MockConfig) -> Result<Self, MockError> {
        let router = Arc::new(InterceptRouter::new());
        let server = InterceptServer::bind(config.http_port, Arc::clone(&router)).await?;
        let origin = format!("http://{}", server.local_addr());

        let responses = Arc::new(ResponseRegistry::new());
        let rtm = Arc::new(RtmRegistry::new(config.rtm_port));
        rtm.start_transport().await?;

        let web = WebMocker::new(
            router.as_ref(),
            Arc::clone(&responses),
            Arc::clone(&rtm),
            &origin,
        );
        let incoming_webhooks =
            IncomingWebhooksMocker::new(router.as_ref(), Arc::clone(&responses), &origin);
        let slash_commands =
            SlashCommandsMocker::new(router.as_ref(), Arc::clone(&responses), &origin);
        let interactive_buttons =
            InteractiveButtonsMocker::new(router.as_ref(), Arc::clone(&responses), &origin);
        let outgoing_webhooks = Arc::new(OutgoingWebhooksMocker::new());
        let events = Arc::new(EventsMocker::new());

        info!("chat-mock running");

        Ok(Self {
            web,
            incoming_webhooks,
            outgoing_webhooks,
            slash_commands,
            interactive_buttons,
            events,
            rtm,
            server,
            responses,
        })
    }

    /// Origin of the HTTP intercept listener, e.g. `http://127.0.0.1:49160`.
    pub fn http_origin(&self) -> String {
        format!("http://{}", self.server.local_addr())
    }

    /// Reset every family: all call logs and all response queues. Live RTM
    /// sessions are left running; use [`RtmRegistry::stop_server`] to tear
    /// sockets down.
    pub fn reset(&self) {
        self.web.reset();
        self.incoming_webhooks.reset();
        self.outgoing_webhooks.reset();
        self.slash_commands.reset();
        self.interactive_buttons.reset();
        self.events.reset();
        self.rtm.reset();
        self.responses.reset_all();
    }

    /// Tear down the HTTP listener and every RTM session. For tests that own
    /// their instance; the process-wide handle from [`init`] lives until
    /// process exit.
    pub async fn shutdown(&self) -> Result<(), MockError> {
        self.server.shutdown().await;
        for token in self.rtm.active_tokens() {
            self.rtm.stop_server(&token).await?;
        }
        Ok(())
    }
}

static INSTANCE: OnceCell<ChatMock> = OnceCell::const_new();

/// Initialize the process-wide mock.
///
/// The first call applies `config` (including log verbosity) and starts the
/// listeners; subsequent calls return the same handle and ignore their
/// configuration entirely.
pub async fn init(config: MockConfig) -> Result<&'static ChatMock, MockError> {
    INSTANCE
        .get_or_try_init(|| async {
            init_logging(config.log_level);
            ChatMock::start(config).await
        })
        .await
}

fn init_logging(level: Option<tracing::Level>) {
    let filter = match level {
        Some(level) => EnvFilter::from_default_env().add_directive(level.into()),
        None => EnvFilter::from_default_env(),
    };
    // try_init: another subscriber (e.g. a test harness) may already be set.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
