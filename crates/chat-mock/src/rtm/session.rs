//! Per-token RTM sessions and their connected peers.

use crate::error::MockError;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

/// Outbound frame plus a delivery acknowledgement channel.
pub(crate) struct Frame {
    pub(crate) message: Message,
    pub(crate) ack: oneshot::Sender<Result<(), String>>,
}

/// Handle to one connected peer. Cloneable; the write half lives in the
/// peer's writer task and acknowledges each frame after the transport
/// accepted it.
#[derive(Clone)]
pub(crate) struct Peer {
    pub(crate) id: u64,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl Peer {
    pub(crate) fn new(id: u64, outbound: mpsc::UnboundedSender<Frame>) -> Self {
        Self { id, outbound }
    }

    /// Deliver one frame; resolves once the transport has accepted it.
    pub(crate) async fn deliver(&self, message: Message) -> Result<(), MockError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.outbound
            .send(Frame {
                message,
                ack: ack_tx,
            })
            .map_err(|_| MockError::Delivery("peer connection is closed".to_string()))?;

        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MockError::Delivery(e)),
            Err(_) => Err(MockError::Delivery("peer writer task exited".to_string())),
        }
    }
}

/// One live session: a token plus whoever is currently connected under it.
/// A session with zero peers is valid; sends to it are undeliverable.
pub(crate) struct Session {
    pub(crate) token: String,
    peers: Mutex<Vec<Peer>>,
}

impl Session {
    pub(crate) fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            peers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn attach(&self, peer: Peer) {
        self.peers.lock().push(peer);
    }

    pub(crate) fn detach(&self, peer_id: u64) {
        self.peers.lock().retain(|peer| peer.id != peer_id);
    }

    /// The first connected peer, the target for single sends.
    pub(crate) fn first_peer(&self) -> Option<Peer> {
        self.peers.lock().first().cloned()
    }

    pub(crate) fn peers(&self) -> Vec<Peer> {
        self.peers.lock().clone()
    }

    pub(crate) fn take_peers(&self) -> Vec<Peer> {
        std::mem::take(&mut *self.peers.lock())
    }

    pub(crate) fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }
}
