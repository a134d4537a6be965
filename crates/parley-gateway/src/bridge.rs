//! Cross-instance bridge.
//!
//! Each instance holds one WebSocket link to a shared broker. While the link
//! is up the bridge subscribes to the local relay, forwards events this
//! instance originated, and re-delivers events other instances sent. While it
//! is down the relay keeps serving local subscribers; nothing published during
//! the outage is replayed once the link returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use parley_types::events::Envelope;

use crate::relay::Relay;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

type BrokerSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    relay: Relay,
    broker_url: String,
    connected: AtomicBool,
    shutdown: CancellationToken,
}

impl Bridge {
    pub fn new(relay: Relay, broker_url: impl Into<String>, shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                relay,
                broker_url: broker_url.into(),
                connected: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Whether the broker link is currently up.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Run the connect loop on a background task. The task ends once the
    /// shutdown token is cancelled.
    pub fn spawn(&self) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move { bridge.run().await })
    }

    /// Connect, serve the link until it drops, back off, repeat.
    pub async fn run(self) {
        let shutdown = self.inner.shutdown.clone();
        let url = self.inner.broker_url.clone();
        let mut backoff = INITIAL_BACKOFF;

        while !shutdown.is_cancelled() {
            info!(broker = %url, "Connecting to broker");
            let attempt = tokio::select! {
                _ = shutdown.cancelled() => break,
                attempt = tokio_tungstenite::connect_async(url.as_str()) => attempt,
            };

            match attempt {
                Ok((socket, _)) => {
                    backoff = INITIAL_BACKOFF;
                    self.inner.connected.store(true, Ordering::Release);
                    info!(broker = %url, instance = %self.inner.relay.instance_id(), "Bridge connected");

                    let result = self.serve_link(socket).await;
                    self.inner.connected.store(false, Ordering::Release);

                    match result {
                        Ok(()) if shutdown.is_cancelled() => break,
                        Ok(()) => warn!(broker = %url, "Broker closed the bridge link, will reconnect"),
                        Err(e) => warn!(broker = %url, "Bridge link dropped, will reconnect: {e}"),
                    }
                }
                Err(e) => {
                    warn!(
                        broker = %url,
                        backoff_secs = backoff.as_secs(),
                        "Broker connect failed: {e}"
                    );
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        info!("Bridge stopped");
    }

    async fn serve_link(&self, socket: BrokerSocket) -> anyhow::Result<()> {
        let (mut sink, mut stream) = socket.split();
        let relay = &self.inner.relay;
        let own = relay.instance_id();

        // Subscribed only while connected: events published during an
        // outage are never queued for the broker.
        let mut local = relay.subscribe();

        loop {
            tokio::select! {
                _ = self.inner.shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }

                envelope = local.recv() => {
                    let Some(envelope) = envelope else { return Ok(()) };
                    // Remote events reached us through the broker already
                    if envelope.origin != own {
                        continue;
                    }
                    let text = serde_json::to_string(&envelope)?;
                    sink.send(Message::Text(text.into())).await?;
                }

                inbound = stream.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => self.handle_inbound(text.as_str()),
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
            }
        }
    }

    fn handle_inbound(&self, text: &str) {
        let envelope = match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                let raw: String = text.chars().take(200).collect();
                warn!("Bad bridge frame: {} -- raw: {}", e, raw);
                return;
            }
        };

        let kind = envelope.event.kind();
        let origin = envelope.origin;
        if self.inner.relay.deliver_remote(envelope) {
            trace!(kind, %origin, "Bridged event delivered");
        }
    }
}
