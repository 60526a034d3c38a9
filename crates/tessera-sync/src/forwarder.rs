use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use tessera_blocks::BlockType;
use tessera_store::DurableCache;
use tessera_world::BlockCoord;

use crate::client::SyncClient;
use crate::error::SyncError;

/// Sends local edits to the authority from a background thread so the input path never
/// waits on the network. Each acknowledged stamp is written to the durable cache.
pub struct EditForwarder {
    tx: Option<Sender<(BlockCoord, BlockType)>>,
    handle: Option<JoinHandle<()>>,
}

impl EditForwarder {
    pub fn spawn(client: Arc<SyncClient>, cache: Option<Arc<DurableCache>>) -> Self {
        let (tx, rx) = unbounded::<(BlockCoord, BlockType)>();
        let handle = thread::Builder::new()
            .name("tessera-sync-edits".into())
            .spawn(move || {
                for (b, w) in rx.iter() {
                    match client.update_block(b, w) {
                        Ok(version) => {
                            if let Some(cache) = &cache {
                                if let Err(e) = cache.put_chunk_version(b.chunk(), version) {
                                    log::warn!(target: "store", "stamp for {:?} not saved: {e}", b.chunk());
                                }
                            }
                        }
                        // offline: the edit already lives in the local cache
                        Err(SyncError::Disconnected) => {}
                        Err(e) => log::warn!(target: "sync", "edit at {b:?} rejected: {e}"),
                    }
                }
            })
            .map_err(|e| log::error!(target: "sync", "edit forwarder did not start: {e}"))
            .ok();
        Self {
            tx: Some(tx),
            handle,
        }
    }

    /// Queues an edit. Never blocks.
    pub fn forward(&self, b: BlockCoord, w: BlockType) {
        if let Some(tx) = &self.tx {
            let _ = tx.send((b, w));
        }
    }

    /// Sends everything already queued, then stops.
    pub fn shutdown(&mut self) {
        self.tx = None;
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for EditForwarder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
