//! In-memory authoritative server. Holds every edit ever made plus a version counter per
//! chunk, and fans edits out to the other attached clients.
//!
//! An edit is committed and queued to every peer under one lock, so all clients see edits
//! in commit order.

use std::collections::BTreeMap;
use std::io;
use std::net::{TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use hashbrown::HashMap;
use tessera_blocks::BlockType;
use tessera_world::{BlockCoord, ChunkCoord, PlayerState, Version};

use crate::error::SyncError;
use crate::protocol::{ClientId, Frame, Notification, Request, Response};
use crate::transport::{FrameSink, FrameSource, TcpTransport, Transport};

type Peer = Arc<Mutex<Box<dyn FrameSink>>>;

#[derive(Default)]
struct ChunkState {
    version: Version,
    blocks: BTreeMap<BlockCoord, BlockType>,
}

#[derive(Default)]
struct State {
    chunks: HashMap<ChunkCoord, ChunkState>,
    players: BTreeMap<ClientId, PlayerState>,
    peers: HashMap<ClientId, Peer>,
}

pub struct Authority {
    state: Mutex<State>,
    next_id: AtomicI32,
}

impl Default for Authority {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicI32::new(1),
        }
    }
}

impl Authority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Greets the connection and serves it on its own thread until it closes.
    pub fn attach(
        self: &Arc<Self>,
        transport: impl Transport + 'static,
    ) -> Result<JoinHandle<()>, SyncError> {
        let (mut sink, source) = Box::new(transport).split();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        sink.send(&Frame::Hello { client_id: id })?;
        let peer: Peer = Arc::new(Mutex::new(sink));
        self.state
            .lock()
            .unwrap()
            .peers
            .insert(id, Arc::clone(&peer));
        log::info!(target: "sync", "client {id} attached");
        let this = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("tessera-authority-{id}"))
            .spawn(move || this.serve(id, source, peer))?;
        Ok(handle)
    }

    /// Binds `addr` and serves every accepted connection. Blocks until the listener fails.
    pub fn listen_tcp(self: &Arc<Self>, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr)?;
        log::info!(target: "sync", "authority listening on {}", listener.local_addr()?);
        self.serve_listener(listener)
    }

    pub fn serve_listener(self: &Arc<Self>, listener: TcpListener) -> io::Result<()> {
        for stream in listener.incoming() {
            let stream = stream?;
            let peer = stream.peer_addr().ok();
            if let Err(e) = self.attach(TcpTransport::from_stream(stream)) {
                log::warn!(target: "sync", "dropping connection from {peer:?}: {e}");
            }
        }
        Ok(())
    }

    /// Current authoritative value of `b`, if it was ever edited.
    pub fn block(&self, b: BlockCoord) -> Option<BlockType> {
        let state = self.state.lock().unwrap();
        state.chunks.get(&b.chunk())?.blocks.get(&b).copied()
    }

    pub fn chunk_version(&self, c: ChunkCoord) -> Version {
        let state = self.state.lock().unwrap();
        state.chunks.get(&c).map(|s| s.version).unwrap_or_default()
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().unwrap().peers.len()
    }

    fn serve(&self, id: ClientId, mut source: Box<dyn FrameSource>, peer: Peer) {
        loop {
            match source.recv() {
                Ok(Frame::Request { seq, body }) => {
                    let resp = self.commit(id, body);
                    let sent = peer
                        .lock()
                        .unwrap()
                        .send(&Frame::Response { seq, body: resp });
                    if let Err(e) = sent {
                        log::debug!(target: "sync", "client {id}: reply failed: {e}");
                        break;
                    }
                }
                Ok(other) => log::warn!(target: "sync", "client {id}: unexpected frame {other:?}"),
                Err(SyncError::Codec(e)) => {
                    log::warn!(target: "sync", "client {id}: undecodable frame: {e}")
                }
                Err(_) => break,
            }
        }
        self.detach(id);
    }

    /// Applies `req` and, for an edit, notifies the other peers before the state lock is
    /// released.
    fn commit(&self, id: ClientId, req: Request) -> Response {
        let mut state = self.state.lock().unwrap();
        let (resp, notify) = Self::handle(&mut state, id, req);
        if let Some(n) = notify {
            fan_out(&state, Some(id), &Frame::Notify(n));
        }
        resp
    }

    fn handle(state: &mut State, id: ClientId, req: Request) -> (Response, Option<Notification>) {
        match req {
            Request::FetchChunk { p, q, version } => {
                let chunk = state.chunks.get(&ChunkCoord::new(p, q));
                let current = chunk.map(|c| c.version).unwrap_or_default();
                let blocks = match chunk {
                    Some(c) if version != Some(current) => c
                        .blocks
                        .iter()
                        .map(|(b, w)| [b.x, b.y, b.z, w.id()])
                        .collect(),
                    _ => Vec::new(),
                };
                (
                    Response::FetchChunk {
                        blocks,
                        version: current,
                    },
                    None,
                )
            }
            Request::UpdateBlock { p, q, x, y, z, w, .. } => {
                let b = BlockCoord::new(x, y, z);
                let c = ChunkCoord::new(p, q);
                if b.chunk() != c {
                    return (
                        Response::Error(format!("block {b:?} is not in chunk ({p}, {q})")),
                        None,
                    );
                }
                let chunk = state.chunks.entry(c).or_default();
                chunk.blocks.insert(b, BlockType(w));
                chunk.version = Version(chunk.version.get() + 1);
                log::debug!(target: "sync", "client {id} set {b:?} = {w} ({})", chunk.version);
                (
                    Response::UpdateBlock {
                        version: chunk.version,
                    },
                    Some(Notification::UpdateBlock { id, p, q, x, y, z, w }),
                )
            }
            Request::UpdateState { state: pose, .. } => {
                state.players.insert(id, pose);
                let players = state
                    .players
                    .iter()
                    .filter(|(other, _)| **other != id)
                    .map(|(k, v)| (*k, *v))
                    .collect();
                (Response::UpdateState { players }, None)
            }
        }
    }

    fn detach(&self, id: ClientId) {
        let peer = {
            let mut state = self.state.lock().unwrap();
            state.players.remove(&id);
            let peer = state.peers.remove(&id);
            fan_out(&state, None, &Frame::Notify(Notification::RemovePlayer { id }));
            peer
        };
        if let Some(peer) = peer {
            peer.lock().unwrap().close();
        }
        log::info!(target: "sync", "client {id} left");
    }
}

/// Sends `frame` to every peer but `except`. Callers hold the state lock; peer locks are
/// always taken after it.
fn fan_out(state: &State, except: Option<ClientId>, frame: &Frame) {
    for (id, peer) in state.peers.iter().filter(|(id, _)| Some(**id) != except) {
        if let Err(e) = peer.lock().unwrap().send(frame) {
            log::debug!(target: "sync", "notify to client {id} failed: {e}");
        }
    }
}
