use std::path::Path;
use std::sync::Mutex;

use tessera_blocks::BlockType;
use tessera_world::{BlockCoord, ChunkCoord, PlayerState, Version};

use crate::error::StoreError;
use crate::keys;
use crate::kvlog::KvLog;

/// File name for the local cache, one per remote server so worlds never mix.
pub fn cache_file_name(server: Option<&str>) -> String {
    match server {
        None | Some("") => "cache.db".to_string(),
        Some(addr) => {
            let safe: String = addr
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
                .collect();
            format!("cache_{safe}.db")
        }
    }
}

/// Write-through persistence for block overrides, chunk version stamps, and the local
/// player pose. A single instance owns the file for the life of the process.
pub struct DurableCache {
    log: Mutex<KvLog>,
}

impl DurableCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let log = KvLog::open(path)?;
        Ok(Self {
            log: Mutex::new(log),
        })
    }

    /// Records an override. Air is stored explicitly so it can delete a generated block.
    pub fn put_block(&self, b: BlockCoord, w: BlockType) -> Result<(), StoreError> {
        let key = keys::block_key(b);
        self.log.lock().unwrap().put(&key, &w.id().to_le_bytes())
    }

    /// Visits every stored override of `chunk`. The visitor runs without the cache lock held.
    pub fn for_each_block_in_chunk(
        &self,
        chunk: ChunkCoord,
        mut visit: impl FnMut(BlockCoord, BlockType),
    ) -> Result<(), StoreError> {
        let prefix = keys::chunk_prefix(chunk);
        let rows: Vec<(BlockCoord, BlockType)> = {
            let log = self.log.lock().unwrap();
            log.scan_prefix(&prefix)
                .filter_map(|(k, v)| {
                    let b = keys::decode_block_key(k)?;
                    let raw: [u8; 4] = v.try_into().ok()?;
                    Some((b, BlockType(i32::from_le_bytes(raw))))
                })
                .collect()
        };
        for (b, w) in rows {
            visit(b, w);
        }
        Ok(())
    }

    pub fn put_chunk_version(&self, chunk: ChunkCoord, v: Version) -> Result<(), StoreError> {
        let key = keys::version_key(chunk);
        self.log.lock().unwrap().put(&key, &v.get().to_le_bytes())
    }

    pub fn get_chunk_version(&self, chunk: ChunkCoord) -> Result<Option<Version>, StoreError> {
        let key = keys::version_key(chunk);
        let log = self.log.lock().unwrap();
        Ok(log
            .get(&key)
            .and_then(|v| <[u8; 8]>::try_from(v).ok())
            .map(|raw| Version(u64::from_le_bytes(raw))))
    }

    pub fn put_player_state(&self, state: &PlayerState) -> Result<(), StoreError> {
        self.log
            .lock()
            .unwrap()
            .put(&keys::player_key(), &state.to_bytes())
    }

    /// The stored pose, or the spawn default when none was saved.
    pub fn get_player_state(&self) -> Result<PlayerState, StoreError> {
        let log = self.log.lock().unwrap();
        Ok(log
            .get(&keys::player_key())
            .and_then(PlayerState::from_bytes)
            .unwrap_or_default())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.log.lock().unwrap().flush()
    }

    /// Flushes and fsyncs. Dropping without `close` still flushes but skips the fsync.
    pub fn close(self) -> Result<(), StoreError> {
        let mut log = self.log.into_inner().unwrap_or_else(|p| p.into_inner());
        log.sync()
    }
}
