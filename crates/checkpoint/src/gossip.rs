//! Gossip transport for checkpoint protocol messages
//!
//! `WsGossip` is the WebSocket mesh used by a live node: it listens for
//! inbound peers, dials configured peers (with reconnect), and fans outbound
//! messages to every connection. `InMemoryHub` is the loopback equivalent
//! used by tests and local simulation.
//!
//! Broadcast is fire-and-forget: no delivery acknowledgment, no retry.

use crate::types::GossipMessage;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message, WebSocketStream};

/// Callback invoked for every decoded inbound message
pub type MessageHandler = Arc<dyn Fn(GossipMessage) + Send + Sync>;

/// Publish/subscribe surface the checkpoint protocol drives
pub trait CheckpointTransport: Send + Sync {
    /// Register the dispatch callback for inbound messages
    ///
    /// Fails if the transport is closed or a handler is already registered.
    fn subscribe(&self, handler: MessageHandler) -> anyhow::Result<()>;

    /// Publish a message to all connected peers
    fn broadcast(&self, message: &GossipMessage) -> anyhow::Result<()>;

    /// Release the subscription; idempotent
    fn close(&self);
}

/// Delay between reconnect attempts to a configured peer
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// WebSocket gossip mesh
pub struct WsGossip {
    /// Channel fanning outbound frames to all connection writer tasks
    out_tx: broadcast::Sender<Vec<u8>>,
    /// Registered dispatch callback
    handler: Arc<RwLock<Option<MessageHandler>>>,
    /// Closed flag checked by the public API and connection tasks
    closed: Arc<AtomicBool>,
}

impl WsGossip {
    pub fn new() -> Self {
        let (out_tx, _) = broadcast::channel(1024);
        Self {
            out_tx,
            handler: Arc::new(RwLock::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start listening and dial the configured peers
    pub async fn start(&self, listen_addr: &str, peers: &[String]) -> anyhow::Result<()> {
        let listener = TcpListener::bind(listen_addr).await?;
        tracing::info!("Gossip listening on {}", listen_addr);

        let out_tx = self.out_tx.clone();
        let handler = self.handler.clone();
        let closed = self.closed.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        if closed.load(Ordering::SeqCst) {
                            break;
                        }
                        tracing::info!("Peer connected from {}", peer_addr);

                        let rx = out_tx.subscribe();
                        let handler = handler.clone();
                        let closed = closed.clone();

                        tokio::spawn(async move {
                            match accept_async(stream).await {
                                Ok(ws_stream) => {
                                    if let Err(e) =
                                        run_connection(ws_stream, rx, handler, closed).await
                                    {
                                        tracing::warn!("Peer connection error: {}", e);
                                    }
                                }
                                Err(e) => tracing::warn!("WebSocket handshake failed: {}", e),
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
        });

        for peer in peers {
            let peer = peer.clone();
            let out_tx = self.out_tx.clone();
            let handler = self.handler.clone();
            let closed = self.closed.clone();

            tokio::spawn(async move {
                let url = format!("ws://{}", peer);
                while !closed.load(Ordering::SeqCst) {
                    match connect_async(&url).await {
                        Ok((ws_stream, _)) => {
                            tracing::info!("Connected to peer {}", peer);
                            let rx = out_tx.subscribe();
                            if let Err(e) =
                                run_connection(ws_stream, rx, handler.clone(), closed.clone())
                                    .await
                            {
                                tracing::warn!("Connection to {} lost: {}", peer, e);
                            }
                        }
                        Err(e) => {
                            tracing::debug!("Failed to reach peer {}: {}", peer, e);
                        }
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            });
        }

        Ok(())
    }
}

impl Default for WsGossip {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointTransport for WsGossip {
    fn subscribe(&self, handler: MessageHandler) -> anyhow::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            anyhow::bail!("transport is closed");
        }

        let mut slot = self.handler.write();
        if slot.is_some() {
            anyhow::bail!("dispatch handler already registered");
        }
        *slot = Some(handler);
        Ok(())
    }

    fn broadcast(&self, message: &GossipMessage) -> anyhow::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            anyhow::bail!("transport is closed");
        }

        // No receivers just means no peers are connected yet
        let _ = self.out_tx.send(message.to_bytes());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.handler.write() = None;
    }
}

/// Drive one WebSocket connection: forward outbound frames, decode and
/// dispatch inbound ones
async fn run_connection<S>(
    ws_stream: WebSocketStream<S>,
    mut rx: broadcast::Receiver<Vec<u8>>,
    handler: Arc<RwLock<Option<MessageHandler>>>,
    closed: Arc<AtomicBool>,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Forward outbound broadcasts to this peer
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(data) => {
                    if ws_sender.send(Message::Binary(data)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Peer connection lagged {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    });

    // Decode inbound frames and hand them to the dispatch callback
    while let Some(msg) = ws_receiver.next().await {
        if closed.load(Ordering::SeqCst) {
            break;
        }

        match msg {
            Ok(Message::Binary(data)) => match GossipMessage::from_bytes(&data) {
                Ok(message) => {
                    let callback = handler.read().clone();
                    if let Some(callback) = callback {
                        callback(message);
                    }
                }
                Err(e) => {
                    tracing::warn!("Dropping undecodable gossip frame: {}", e);
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    tracing::info!("Peer disconnected");

    Ok(())
}

/// Shared state of one in-memory endpoint
#[derive(Default)]
struct EndpointState {
    handler: RwLock<Option<MessageHandler>>,
    closed: AtomicBool,
}

/// Loopback hub connecting in-process transports
///
/// Broadcasts deliver synchronously to every other joined endpoint, which
/// keeps multi-node tests deterministic.
#[derive(Clone, Default)]
pub struct InMemoryHub {
    endpoints: Arc<RwLock<Vec<Arc<EndpointState>>>>,
}

impl InMemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the hub, returning this member's transport endpoint
    pub fn join(&self) -> Arc<InMemoryTransport> {
        let local = Arc::new(EndpointState::default());
        self.endpoints.write().push(local.clone());

        Arc::new(InMemoryTransport {
            local,
            endpoints: self.endpoints.clone(),
        })
    }
}

/// One member's view of an [`InMemoryHub`]
pub struct InMemoryTransport {
    local: Arc<EndpointState>,
    endpoints: Arc<RwLock<Vec<Arc<EndpointState>>>>,
}

impl CheckpointTransport for InMemoryTransport {
    fn subscribe(&self, handler: MessageHandler) -> anyhow::Result<()> {
        if self.local.closed.load(Ordering::SeqCst) {
            anyhow::bail!("transport is closed");
        }

        let mut slot = self.local.handler.write();
        if slot.is_some() {
            anyhow::bail!("dispatch handler already registered");
        }
        *slot = Some(handler);
        Ok(())
    }

    fn broadcast(&self, message: &GossipMessage) -> anyhow::Result<()> {
        if self.local.closed.load(Ordering::SeqCst) {
            anyhow::bail!("transport is closed");
        }

        let peers: Vec<Arc<EndpointState>> = self
            .endpoints
            .read()
            .iter()
            .filter(|peer| !Arc::ptr_eq(peer, &self.local))
            .cloned()
            .collect();

        for peer in peers {
            if peer.closed.load(Ordering::SeqCst) {
                continue;
            }
            let callback = peer.handler.read().clone();
            if let Some(callback) = callback {
                callback(message.clone());
            }
        }

        Ok(())
    }

    fn close(&self) {
        self.local.closed.store(true, Ordering::SeqCst);
        *self.local.handler.write() = None;
    }
}
