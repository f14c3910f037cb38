//! TCP line bridge standing in for the BLE UART peripheral.
//!
//! Every accepted TCP connection is one peer. Bytes read from a peer are
//! forwarded verbatim as [`PeripheralEvent::Data`]; framing is left to the
//! agent, exactly as with a BLE RX characteristic. Writes fan out to every
//! connected peer through a per-peer writer task. A peer whose queue is
//! full is disconnected rather than waited on.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use aquadata_core::{DriverError, PeripheralEvent, PeripheralLink};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const READ_CHUNK: usize = 256;
const PEER_QUEUE: usize = 32;

type Peers = Arc<DashMap<u64, PeerHandle>>;

/// Outbound queue plus the token that tears down both halves of a peer.
struct PeerHandle {
    tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

/// [`PeripheralLink`] over plain TCP.
pub struct TcpPeripheral {
    name: String,
    bind_addr: SocketAddr,
    local_addr: Mutex<Option<SocketAddr>>,
    peers: Peers,
    next_peer: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl TcpPeripheral {
    pub fn new(name: impl Into<String>, bind_addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind_addr,
            local_addr: Mutex::new(None),
            peers: Arc::new(DashMap::new()),
            next_peer: Arc::new(AtomicU64::new(1)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The address actually bound. Available after `start()`.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Stop accepting and drop every peer.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.peers.clear();
    }
}

impl Drop for TcpPeripheral {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn accept_loop(
    listener: TcpListener,
    peers: Peers,
    next_peer: Arc<AtomicU64>,
    events: mpsc::Sender<PeripheralEvent>,
    cancel: CancellationToken,
) {
    loop {
        let (stream, addr) = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "peripheral bridge accept failed");
                    continue;
                }
            },
        };

        let peer = next_peer.fetch_add(1, Ordering::SeqCst);
        info!(peer, %addr, "peripheral peer connected");
        attach(peer, stream, &peers, events.clone(), cancel.child_token()).await;
    }
    debug!("peripheral bridge accept loop stopped");
}

async fn attach(
    peer: u64,
    stream: TcpStream,
    peers: &Peers,
    events: mpsc::Sender<PeripheralEvent>,
    cancel: CancellationToken,
) {
    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::channel(PEER_QUEUE);
    peers.insert(
        peer,
        PeerHandle {
            tx,
            cancel: cancel.clone(),
        },
    );

    if events.send(PeripheralEvent::Connected { peer }).await.is_err() {
        peers.remove(&peer);
        return;
    }

    tokio::spawn(write_loop(peer, writer, rx, cancel.clone()));
    tokio::spawn(read_loop(peer, reader, Arc::clone(peers), events, cancel));
}

async fn read_loop(
    peer: u64,
    mut reader: OwnedReadHalf,
    peers: Peers,
    events: mpsc::Sender<PeripheralEvent>,
    cancel: CancellationToken,
) {
    let mut buf = [0_u8; READ_CHUNK];
    loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            read = reader.read(&mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(n) => {
                let chunk = Bytes::copy_from_slice(&buf[..n]);
                if events.send(PeripheralEvent::Data(chunk)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(peer, error = %e, "peripheral peer read failed");
                break;
            }
        }
    }

    // Dropping the sender ends the writer task.
    peers.remove(&peer);
    info!(peer, "peripheral peer disconnected");
    let _ = events.send(PeripheralEvent::Disconnected { peer }).await;
}

async fn write_loop(
    peer: u64,
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let written = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            written = writer.write_all(&frame) => written,
        };
        if let Err(e) = written {
            debug!(peer, error = %e, "peripheral peer write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Forget a peer and stop both of its tasks. The reader reports the
/// disconnect.
fn evict(peers: &Peers, peer: u64) {
    if let Some((_, handle)) = peers.remove(&peer) {
        handle.cancel.cancel();
    }
}

// ── PeripheralLink ───────────────────────────────────────────────────

#[async_trait]
impl PeripheralLink for TcpPeripheral {
    async fn start(&self, events: mpsc::Sender<PeripheralEvent>) -> Result<(), DriverError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(addr);
        info!(name = %self.name, %addr, "peripheral bridge listening");

        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.peers),
            Arc::clone(&self.next_peer),
            events,
            self.cancel.clone(),
        ));
        Ok(())
    }

    fn peer_count(&self) -> usize {
        self.peers.len()
    }

    async fn write(&self, frame: Bytes) -> Result<(), DriverError> {
        // Never waits on a peer: a stalled reader must not stall the agent.
        let targets: Vec<(u64, mpsc::Sender<Bytes>)> = self
            .peers
            .iter()
            .map(|entry| (*entry.key(), entry.value().tx.clone()))
            .collect();
        if targets.is_empty() {
            return Err(DriverError::NotConnected);
        }

        let mut delivered = 0_usize;
        for (peer, tx) in targets {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(peer, queued = PEER_QUEUE, "peripheral peer not reading; disconnecting");
                    evict(&self.peers, peer);
                }
                Err(TrySendError::Closed(_)) => evict(&self.peers, peer),
            }
        }

        if delivered == 0 {
            return Err(DriverError::Closed);
        }
        Ok(())
    }
}
