use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use hashbrown::HashMap;
use tessera_blocks::BlockType;
use tessera_world::{BlockCoord, ChunkCoord, PlayerState, Version};

use crate::error::SyncError;
use crate::protocol::{ClientId, Frame, Notification, Request, Response};
use crate::transport::{FrameSink, FrameSource, Transport};

/// Blocks the authority holds for a chunk plus its stamp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkDelta {
    pub blocks: Vec<(BlockCoord, BlockType)>,
    pub version: Version,
}

type Pending = HashMap<u64, Sender<Response>>;

struct Shared {
    pending: Mutex<Pending>,
    connected: AtomicBool,
}

impl Shared {
    /// Fails every outstanding call. Returns false if already offline.
    fn go_offline(&self) -> bool {
        let mut pending = self.pending.lock().unwrap();
        let was = self.connected.swap(false, Ordering::SeqCst);
        // dropping the senders wakes every waiter with a recv error
        pending.clear();
        was
    }
}

/// Client half of the sync connection.
///
/// Calls block the calling thread until the matching response arrives or the connection
/// drops. Pushed notifications are delivered on [`SyncClient::notifications`].
pub struct SyncClient {
    id: ClientId,
    sink: Mutex<Box<dyn FrameSink>>,
    shared: Arc<Shared>,
    next_seq: AtomicU64,
    notify_rx: Receiver<Notification>,
}

impl SyncClient {
    /// Performs the greeting and starts the reader thread.
    pub fn connect(transport: impl Transport + 'static) -> Result<Arc<Self>, SyncError> {
        let (sink, mut source) = Box::new(transport).split();
        let id = match source.recv()? {
            Frame::Hello { client_id } => client_id,
            other => {
                return Err(SyncError::Protocol(format!(
                    "expected greeting, got {other:?}"
                )));
            }
        };
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        });
        let (notify_tx, notify_rx) = unbounded();
        {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("tessera-sync-rx".into())
                .spawn(move || read_loop(source, shared, notify_tx))?;
        }
        log::info!(target: "sync", "connected as client {id}");
        Ok(Arc::new(Self {
            id,
            sink: Mutex::new(sink),
            shared,
            next_seq: AtomicU64::new(1),
            notify_rx,
        }))
    }

    pub fn client_id(&self) -> ClientId {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Stream of server pushes. Ends (disconnects) when the connection does.
    pub fn notifications(&self) -> Receiver<Notification> {
        self.notify_rx.clone()
    }

    pub fn call(&self, body: Request) -> Result<Response, SyncError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        {
            let mut pending = self.shared.pending.lock().unwrap();
            if !self.shared.connected.load(Ordering::SeqCst) {
                return Err(SyncError::Disconnected);
            }
            pending.insert(seq, tx);
        }
        let sent = self.sink.lock().unwrap().send(&Frame::Request { seq, body });
        if let Err(e) = sent {
            log::debug!(target: "sync", "send failed: {e}");
            self.mark_offline();
            return Err(SyncError::Disconnected);
        }
        match rx.recv() {
            Ok(Response::Error(msg)) => Err(SyncError::Remote(msg)),
            Ok(resp) => Ok(resp),
            Err(_) => Err(SyncError::Disconnected),
        }
    }

    pub fn fetch_chunk(
        &self,
        coord: ChunkCoord,
        known: Option<Version>,
    ) -> Result<ChunkDelta, SyncError> {
        let req = Request::FetchChunk {
            p: coord.cx,
            q: coord.cz,
            version: known,
        };
        match self.call(req)? {
            Response::FetchChunk { blocks, version } => Ok(ChunkDelta {
                blocks: blocks
                    .into_iter()
                    .map(|[x, y, z, w]| (BlockCoord::new(x, y, z), BlockType(w)))
                    .collect(),
                version,
            }),
            other => Err(unexpected("FetchChunk", &other)),
        }
    }

    pub fn update_block(&self, b: BlockCoord, w: BlockType) -> Result<Version, SyncError> {
        let c = b.chunk();
        let req = Request::UpdateBlock {
            id: self.id,
            p: c.cx,
            q: c.cz,
            x: b.x,
            y: b.y,
            z: b.z,
            w: w.id(),
        };
        match self.call(req)? {
            Response::UpdateBlock { version } => Ok(version),
            other => Err(unexpected("UpdateBlock", &other)),
        }
    }

    /// Publishes our pose and returns every other player's latest pose.
    pub fn update_player_state(
        &self,
        state: PlayerState,
    ) -> Result<BTreeMap<ClientId, PlayerState>, SyncError> {
        match self.call(Request::UpdateState { id: self.id, state })? {
            Response::UpdateState { players } => Ok(players),
            other => Err(unexpected("UpdateState", &other)),
        }
    }

    /// Closes the outgoing stream and fails outstanding calls. The reader thread exits
    /// once the peer closes its side.
    pub fn shutdown(&self) {
        self.sink.lock().unwrap().close();
        self.mark_offline();
    }

    fn mark_offline(&self) {
        if self.shared.go_offline() {
            log::info!(target: "sync", "client {} is offline; continuing with local cache", self.id);
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Ok(mut sink) = self.sink.lock() {
            sink.close();
        }
    }
}

fn unexpected(call: &str, got: &Response) -> SyncError {
    SyncError::Protocol(format!("{call}: unexpected response {got:?}"))
}

fn read_loop(mut source: Box<dyn FrameSource>, shared: Arc<Shared>, notify_tx: Sender<Notification>) {
    loop {
        match source.recv() {
            Ok(Frame::Response { seq, body }) => {
                let waiter = shared.pending.lock().unwrap().remove(&seq);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(body);
                    }
                    None => log::debug!(target: "sync", "response for unknown seq {seq}"),
                }
            }
            Ok(Frame::Notify(n)) => {
                log::trace!(target: "sync", "notify {n:?}");
                if notify_tx.send(n).is_err() {
                    log::debug!(target: "sync", "notification dropped: no listener");
                }
            }
            Ok(other) => {
                log::warn!(target: "sync", "ignoring unexpected frame {other:?}");
            }
            Err(SyncError::Codec(e)) => {
                log::warn!(target: "sync", "undecodable frame: {e}");
            }
            Err(e) => {
                if shared.go_offline() {
                    log::info!(target: "sync", "connection closed ({e}); continuing offline");
                }
                return;
            }
        }
    }
}
