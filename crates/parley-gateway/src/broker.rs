//! Shared relay endpoint for the cross-instance bridge.
//!
//! Every chat instance keeps one WebSocket open to `/bridge`. Each text frame
//! an instance sends is checked to be an [`Envelope`] and then fanned out to
//! every other connected instance. The broker never stores frames: a peer
//! that is disconnected or whose queue is full simply misses them.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, Utf8Bytes, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};
use uuid::Uuid;

use parley_types::events::Envelope;

/// Capacity of per-peer outbound channel.
const PEER_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    peers: RwLock<HashMap<Uuid, mpsc::Sender<Utf8Bytes>>>,
    shutdown: CancellationToken,
}

impl Broker {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                peers: RwLock::new(HashMap::new()),
                shutdown,
            }),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/bridge", get(bridge_upgrade))
            .route("/health", get(health))
            .with_state(self.clone())
    }

    pub async fn peer_count(&self) -> usize {
        self.inner.peers.read().await.len()
    }

    /// Serve one instance link until it closes or the broker shuts down.
    pub async fn handle_peer(self, socket: WebSocket) {
        let conn_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel::<Utf8Bytes>(PEER_CHANNEL_CAPACITY);
        let peers = {
            let mut peers = self.inner.peers.write().await;
            peers.insert(conn_id, tx);
            peers.len()
        };
        info!(peer = %conn_id, peers, "Bridge peer connected");

        let (mut sender, mut receiver) = socket.split();

        // Writer task: drains the peer queue onto the socket
        let shutdown = self.inner.shutdown.clone();
        let mut write_task = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    frame = rx.recv() => frame,
                };
                let Some(frame) = frame else { break };
                if sender.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            let _ = sender.send(Message::Close(None)).await;
        });

        // Read loop
        let broker = self.clone();
        let mut read_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => broker.fan_out(conn_id, text).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        tokio::select! {
            _ = &mut write_task => read_task.abort(),
            _ = &mut read_task => write_task.abort(),
        }

        self.inner.peers.write().await.remove(&conn_id);
        info!(peer = %conn_id, "Bridge peer disconnected");
    }

    /// Forward a frame to every peer except its sender. Drops the frame for
    /// any peer whose queue is full.
    async fn fan_out(&self, from: Uuid, frame: Utf8Bytes) {
        let envelope = match serde_json::from_str::<Envelope>(frame.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(peer = %from, "Dropping malformed bridge frame: {}", e);
                return;
            }
        };
        trace!(peer = %from, origin = %envelope.origin, kind = envelope.event.kind(), "Broker fan-out");

        let peers = self.inner.peers.read().await;
        for (peer_id, tx) in peers.iter() {
            if *peer_id == from {
                continue;
            }
            if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(frame.clone()) {
                warn!(peer = %peer_id, "Broker queue full, dropping frame");
            }
        }
    }
}

async fn bridge_upgrade(State(broker): State<Broker>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| broker.handle_peer(socket))
}

async fn health(State(broker): State<Broker>) -> impl IntoResponse {
    let peers = broker.peer_count().await;
    Json(serde_json::json!({ "status": "ok", "peers": peers }))
}
