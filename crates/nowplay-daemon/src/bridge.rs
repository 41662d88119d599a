//! Player bridge IPC driver with separated reader/writer tasks.
//!
//! ```text
//!   BridgeDriver::connect()
//!         │
//!         ├── writer_task   ← receives Request via mpsc, serialises → socket
//!         └── reader_task   ← reads JSON lines from socket
//!                                ├── reply (has request_id) → matched oneshot::Sender
//!                                └── unsolicited event      → engine event channel
//! ```
//!
//! The OS-specific helper on the far side of the socket owns the actual
//! player integration; this driver only speaks the wire protocol and exposes
//! the [`Player`] interface the engine consumes.

use anyhow::Context;
use nowplay_proto::protocol::{Event, Message, PlayerStatus, ReplyBody, Request, RequestOp};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::engine::EngineEvent;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// Authoritative player interface.  Once a broadcast triggers a query, the
/// answers here are the single source of truth — never the broadcast itself.
pub trait Player {
    async fn status(&self) -> anyhow::Result<PlayerStatus>;
    async fn is_frontmost(&self) -> anyhow::Result<bool>;
    async fn activate(&self) -> anyhow::Result<()>;
    async fn next_track(&self) -> anyhow::Result<()>;
}

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<ReplyBody>>,
}

/// Cheaply cloneable handle to the bridge writer task.
#[derive(Clone)]
pub struct BridgeHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl BridgeHandle {
    async fn send(&self, op: RequestOp) -> anyhow::Result<ReplyBody> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let payload = Message::Request(Request { id: req_id, op }).encode_line()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("bridge writer task gone"))?;

        let body = tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("bridge reply timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("bridge reply channel dropped req={}", req_id))??;

        match body {
            ReplyBody::Error { message } => Err(anyhow::anyhow!("bridge error: {}", message)),
            other => Ok(other),
        }
    }
}

impl Player for BridgeHandle {
    async fn status(&self) -> anyhow::Result<PlayerStatus> {
        match self.send(RequestOp::GetStatus).await? {
            ReplyBody::Status(status) => Ok(status),
            other => anyhow::bail!("unexpected reply to GetStatus: {other:?}"),
        }
    }

    async fn is_frontmost(&self) -> anyhow::Result<bool> {
        match self.send(RequestOp::Frontmost).await? {
            ReplyBody::Frontmost { frontmost } => Ok(frontmost),
            other => anyhow::bail!("unexpected reply to Frontmost: {other:?}"),
        }
    }

    async fn activate(&self) -> anyhow::Result<()> {
        self.send(RequestOp::Activate).await.map(|_| ())
    }

    async fn next_track(&self) -> anyhow::Result<()> {
        self.send(RequestOp::NextTrack).await.map(|_| ())
    }
}

/// Connects to the bridge socket and owns the IO tasks.
pub struct BridgeDriver;

impl BridgeDriver {
    pub async fn connect(
        path: &Path,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> anyhow::Result<BridgeHandle> {
        let stream = UnixStream::connect(path)
            .await
            .with_context(|| format!("bridge socket not reachable at {}", path.display()))?;
        info!("bridge: connected to {}", path.display());
        Ok(Self::start_io_tasks(stream, event_tx))
    }

    fn start_io_tasks(stream: UnixStream, event_tx: mpsc::Sender<EngineEvent>) -> BridgeHandle {
        let (read_half, write_half) = stream.into_split();
        let reader = BufReader::new(read_half);

        // pending map: req_id → reply channel.  Shared between writer
        // (inserts) and reader (resolves).
        let pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<ReplyBody>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

        let pending_w = pending.clone();
        tokio::spawn(writer_task(write_half, cmd_rx, pending_w));
        tokio::spawn(reader_task(reader, pending, event_tx));

        BridgeHandle { tx: cmd_tx }
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<ReplyBody>>>>>,
    event_tx: mpsc::Sender<EngineEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("bridge reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("bridge connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let msg = match Message::decode_line(trimmed) {
                    Ok(m) => m,
                    Err(e) => {
                        debug!("bridge reader: invalid message '{}': {}", trimmed, e);
                        continue;
                    }
                };

                match msg {
                    Message::Reply(reply) => {
                        let mut map = pending.lock().await;
                        if let Some(tx) = map.remove(&reply.request_id) {
                            debug!("bridge reader: reply req={}", reply.request_id);
                            let _ = tx.send(Ok(reply.body));
                        } else {
                            debug!("bridge reader: reply for unknown req={}", reply.request_id);
                        }
                    }
                    Message::Event(Event::StateChanged { player_state }) => {
                        debug!(?player_state, "bridge reader: state change broadcast");
                        let _ = event_tx
                            .send(EngineEvent::StateChanged { player_state })
                            .await;
                    }
                    Message::Request(req) => {
                        debug!("bridge reader: unexpected request from bridge: {:?}", req.op);
                    }
                }
            }
            Err(e) => {
                warn!("bridge reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("bridge read error: {}", e)));
                }
                break;
            }
        }
    }
}

async fn writer_task<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<PendingRequest>,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<ReplyBody>>>>>,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register the reply channel before writing so the reader can match it
        {
            let mut map = pending.lock().await;
            map.insert(req.req_id, req.reply);
        }
        debug!("bridge writer: send req={} {}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("bridge writer: write error: {}", e);
            let mut map = pending.lock().await;
            if let Some(tx) = map.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("bridge write error: {}", e)));
            }
            break;
        }
    }
    debug!("bridge writer: task exiting");
}
