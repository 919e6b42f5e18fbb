//! Duplex session registry: the mock's stand-in for the platform's real-time
//! messaging socket.
//!
//! One shared TCP listener accepts websocket connections for every session;
//! the handshake path (`/{token}`) routes each connection to its session.
//! Sessions are created idempotently by [`RtmRegistry::add_token`], torn down
//! by [`RtmRegistry::stop_server`], and the shared listener is released once
//! the last session is gone.

mod session;

use crate::calls::RtmCall;
use crate::error::MockError;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use session::{Frame, Peer, Session};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// State shared between the registry handle and the transport tasks.
struct Shared {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    calls: Mutex<Vec<RtmCall>>,
    next_peer_id: AtomicU64,
}

/// Live shared listener.
struct Transport {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

/// Registry of RTM sessions keyed by credential token.
pub struct RtmRegistry {
    configured_port: u16,
    shared: Arc<Shared>,
    transport: tokio::sync::Mutex<Option<Transport>>,
}

impl RtmRegistry {
    pub(crate) fn new(port: u16) -> Self {
        Self {
            configured_port: port,
            shared: Arc::new(Shared {
                sessions: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                next_peer_id: AtomicU64::new(1),
            }),
            transport: tokio::sync::Mutex::new(None),
        }
    }

    /// Ensure a session exists for `token` and return its websocket address.
    ///
    /// Idempotent: a second call for the same token returns the same address
    /// without creating another session or listener.
    pub async fn add_token(&self, token: &str) -> Result<String, MockError> {
        let port = self.start_transport().await?;

        let mut sessions = self.shared.sessions.lock();
        if !sessions.contains_key(token) {
            sessions.insert(token.to_string(), Arc::new(Session::new(token)));
            info!(%token, "created RTM session");
        }
        drop(sessions);

        Ok(format!("ws://127.0.0.1:{port}/{token}"))
    }

    /// Fire-and-forget variant of [`add_token`](Self::add_token) for
    /// bootstrap flows that do not need the address.
    pub async fn start_server(&self, token: &str) -> Result<(), MockError> {
        self.add_token(token).await.map(|_| ())
    }

    /// Deliver `message` to the first connected peer of the session for
    /// `token`. Resolves once the transport accepted the frame.
    pub async fn send(&self, token: &str, message: &Value) -> Result<(), MockError> {
        let session = self
            .session(token)
            .ok_or_else(|| MockError::UnknownToken(token.to_string()))?;
        let text = serde_json::to_string(message)?;
        let peer = session
            .first_peer()
            .ok_or_else(|| MockError::Undeliverable(token.to_string()))?;

        peer.deliver(Message::Text(text)).await
    }

    /// Deliver `message` to every connected peer of the session for `token`.
    ///
    /// One peer's failure never blocks the others; failures are logged and
    /// the number of successful deliveries is returned.
    pub async fn broadcast(&self, token: &str, message: &Value) -> Result<usize, MockError> {
        let session = self
            .session(token)
            .ok_or_else(|| MockError::UnknownToken(token.to_string()))?;
        let text = serde_json::to_string(message)?;

        let mut delivered = 0;
        for peer in session.peers() {
            match peer.deliver(Message::Text(text.clone())).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(%token, peer = peer.id, error = %e, "broadcast delivery failed"),
            }
        }
        Ok(delivered)
    }

    /// Tear down the session for `token`, disconnecting its peers.
    ///
    /// Idempotent: resolves whether or not a session exists. The shared
    /// listener is released once no sessions remain, and this resolves only
    /// after that teardown has completed.
    pub async fn stop_server(&self, token: &str) -> Result<(), MockError> {
        let session = self.shared.sessions.lock().remove(token);
        if let Some(session) = session {
            for peer in session.take_peers() {
                let _ = peer.deliver(Message::Close(None)).await;
            }
            info!(%token, "RTM session closed");
        }

        if self.shared.sessions.lock().is_empty() {
            let transport = self.transport.lock().await.take();
            if let Some(transport) = transport {
                let _ = transport.shutdown_tx.send(());
                if let Err(e) = transport.task.await {
                    debug!(error = %e, "RTM transport task join failed");
                }
                debug!("RTM shared transport released");
            }
        }

        Ok(())
    }

    /// Snapshot of every recorded inbound message, oldest first.
    pub fn calls(&self) -> Vec<RtmCall> {
        self.shared.calls.lock().clone()
    }

    /// Clear the inbound message log. Never tears down sockets.
    pub fn reset(&self) {
        debug!("resetting rtm");
        self.shared.calls.lock().clear();
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().len()
    }

    /// Tokens with a live session.
    pub fn active_tokens(&self) -> Vec<String> {
        self.shared.sessions.lock().keys().cloned().collect()
    }

    /// Number of peers currently connected for `token`.
    pub fn peer_count(&self, token: &str) -> usize {
        self.session(token).map_or(0, |session| session.peer_count())
    }

    fn session(&self, token: &str) -> Option<Arc<Session>> {
        self.shared.sessions.lock().get(token).cloned()
    }

    /// Bind the shared listener if it is not running and return the bound
    /// port. Called eagerly at mock startup and lazily by `add_token` after
    /// the transport has been released.
    pub(crate) async fn start_transport(&self) -> Result<u16, MockError> {
        let mut guard = self.transport.lock().await;
        if let Some(transport) = guard.as_ref() {
            return Ok(transport.local_addr.port());
        }

        let port = self.configured_port;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| MockError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| MockError::Bind { port, source })?;

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let shared = Arc::clone(&self.shared);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let shared = Arc::clone(&shared);
                                tokio::spawn(handle_connection(stream, addr, shared));
                            }
                            Err(e) => error!(error = %e, "RTM accept error"),
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        info!(%local_addr, "started RTM server");

        *guard = Some(Transport {
            local_addr,
            shutdown_tx,
            task,
        });
        Ok(local_addr.port())
    }
}

/// Serve one websocket connection: route by handshake path to a session,
/// spawn the writer task, then pump inbound messages into the call log.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, shared: Arc<Shared>) {
    let mut requested_token = None;
    let callback = |request: &HandshakeRequest, response: HandshakeResponse| {
        let token = request.uri().path().trim_start_matches('/').to_string();
        if shared.sessions.lock().contains_key(&token) {
            requested_token = Some(token);
            Ok(response)
        } else {
            warn!(%token, "websocket connect for unknown token rejected");
            let mut rejection = ErrorResponse::new(None);
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%addr, error = %e, "websocket handshake failed");
            return;
        }
    };
    let Some(token) = requested_token else {
        return;
    };
    // The session can disappear between handshake and registration if
    // stop_server raced the connect; drop the socket in that case.
    let Some(session) = shared.sessions.lock().get(&token).cloned() else {
        return;
    };

    let peer_id = shared.next_peer_id.fetch_add(1, Ordering::Relaxed);
    let (mut sink, mut stream) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
    session.attach(Peer::new(peer_id, outbound_tx));
    info!(%token, peer = peer_id, "client connected to RTM session");

    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let result = sink.send(frame.message).await.map_err(|e| e.to_string());
            let failed = result.is_err();
            let _ = frame.ack.send(result);
            if failed {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(next) = stream.next().await {
        match next {
            Ok(Message::Text(text)) => record_inbound(&shared, &session.token, peer_id, text),
            Ok(Message::Binary(bytes)) => {
                let raw = String::from_utf8_lossy(&bytes).into_owned();
                record_inbound(&shared, &session.token, peer_id, raw);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(%token, peer = peer_id, error = %e, "websocket read error");
                break;
            }
        }
    }

    session.detach(peer_id);
    info!(%token, peer = peer_id, "client disconnected from RTM session");
}

/// Record one inbound message. Parse failures are logged, never thrown, and
/// the raw payload is always kept so no message is silently dropped.
fn record_inbound(shared: &Shared, token: &str, peer: u64, raw: String) {
    let message = match serde_json::from_str::<Value>(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            error!(%token, error = %e, "could not parse incoming RTM message");
            None
        }
    };

    debug!(%token, peer, "intercepted RTM message");
    shared.calls.lock().push(RtmCall {
        raw,
        message,
        token: token.to_string(),
        peer,
    });
}
