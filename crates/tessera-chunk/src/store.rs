use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use hashbrown::HashMap;
use lru::LruCache;
use rayon::prelude::*;
use tessera_blocks::BlockType;
use tessera_store::{DurableCache, StoreError};
use tessera_sync::SyncClient;
use tessera_world::version::VersionClock;
use tessera_world::{BlockCoord, BlockMap, ChunkCoord, Generator, Version};

use crate::chunk::Chunk;

/// Called with each chunk pushed out by capacity pressure.
pub type EvictFn = Box<dyn Fn(ChunkCoord, Arc<Chunk>) + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkStoreStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Remote edits that arrived while a coordinate was being materialized.
#[derive(Default)]
struct Loading {
    loaders: usize,
    edits: Vec<(BlockCoord, BlockType)>,
}

/// Bounded LRU of materialized chunks.
///
/// A miss runs the generator, overlays the durable cache, then merges whatever the remote
/// authority has for the chunk. Edits write through to the durable cache before returning,
/// so dropping a chunk from memory never loses data.
pub struct ChunkStore {
    chunks: Mutex<LruCache<ChunkCoord, Arc<Chunk>>>,
    // lock order: chunks, then loading
    loading: Mutex<HashMap<ChunkCoord, Loading>>,
    generator: Generator,
    cache: Option<Arc<DurableCache>>,
    sync: RwLock<Option<Arc<SyncClient>>>,
    on_evict: RwLock<Option<EvictFn>>,
    clock: VersionClock,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ChunkStore {
    /// Holds `max(4r², (2r + 1)²)` chunks, so the square around the viewer always fits.
    pub fn new(generator: Generator, render_radius: i32) -> Self {
        let cap = NonZeroUsize::new(capacity_for(render_radius)).unwrap_or(NonZeroUsize::MIN);
        Self {
            chunks: Mutex::new(LruCache::new(cap)),
            loading: Mutex::new(HashMap::new()),
            generator,
            cache: None,
            sync: RwLock::new(None),
            on_evict: RwLock::new(None),
            clock: VersionClock::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn with_cache(mut self, cache: Arc<DurableCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn set_sync(&self, client: Option<Arc<SyncClient>>) {
        *self.sync.write().unwrap() = client;
    }

    pub fn set_on_evict(&self, f: impl Fn(ChunkCoord, Arc<Chunk>) + Send + Sync + 'static) {
        *self.on_evict.write().unwrap() = Some(Box::new(f));
    }

    pub fn capacity(&self) -> usize {
        self.chunks.lock().unwrap().cap().get()
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// The chunk at `coord`, materializing it on a miss. `None` when the durable cache
    /// could not be read; a later call retries.
    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        {
            let mut chunks = self.chunks.lock().unwrap();
            if let Some(c) = chunks.get(&coord) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(c));
            }
            self.loading.lock().unwrap().entry(coord).or_default().loaders += 1;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let fresh = match self.materialize(coord) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                log::warn!(target: "chunks", "chunk ({}, {}) not loadable: {e}", coord.cx, coord.cz);
                let _chunks = self.chunks.lock().unwrap();
                self.finish_loading(coord);
                return None;
            }
        };
        let (kept, evicted) = {
            let mut chunks = self.chunks.lock().unwrap();
            let (kept, evicted) = match chunks.get(&coord).cloned() {
                Some(existing) => (existing, None),
                None => {
                    let evicted = chunks.push(coord, Arc::clone(&fresh));
                    (fresh, evicted)
                }
            };
            // anything queued by apply_remote is newer than what was just loaded
            let edits = self.finish_loading(coord);
            if !edits.is_empty() {
                log::debug!(
                    target: "chunks",
                    "({}, {}): {} remote edits landed during load",
                    coord.cx,
                    coord.cz,
                    edits.len()
                );
                self.apply_to(&kept, &edits);
            }
            (kept, evicted)
        };
        if let Some((old, chunk)) = evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            log::debug!(target: "chunks", "evicted ({}, {})", old.cx, old.cz);
            if let Some(f) = self.on_evict.read().unwrap().as_ref() {
                f(old, chunk);
            }
        }
        Some(kept)
    }

    /// Fans out over the rayon pool. Chunks that fail to load are left out; order is not
    /// preserved.
    pub fn get_many(&self, coords: &[ChunkCoord]) -> Vec<Arc<Chunk>> {
        coords.par_iter().filter_map(|&c| self.get(c)).collect()
    }

    /// Cache-only lookup; does not change recency.
    pub fn peek(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.chunks.lock().unwrap().peek(&coord).cloned()
    }

    /// Block at `b`, loading its chunk if needed. `UNKNOWN` when the chunk cannot load.
    pub fn block(&self, b: BlockCoord) -> BlockType {
        self.get(b.chunk())
            .map_or(BlockType::UNKNOWN, |c| c.get(b))
    }

    /// Block at `b` if its chunk is resident, else `UNKNOWN`. Never loads.
    pub fn resident_block(&self, b: BlockCoord) -> BlockType {
        self.peek(b.chunk())
            .map_or(BlockType::UNKNOWN, |c| c.get(b))
    }

    /// True for a resident, non-air block.
    pub fn has_block(&self, b: BlockCoord) -> bool {
        let w = self.resident_block(b);
        w != BlockType::UNKNOWN && !w.is_air()
    }

    /// Applies a local edit and writes it through. Returns the chunk version afterwards.
    pub fn update_block(&self, b: BlockCoord, w: BlockType) -> Option<Version> {
        let chunk = self.get(b.chunk())?;
        if chunk.set(b, w) {
            chunk.bump(self.clock.tick());
        }
        self.persist(b, w);
        Some(chunk.version())
    }

    /// Applies an edit pushed by the authority. Only a resident chunk is touched in memory;
    /// otherwise the value is persisted and picked up on the next load. An edit racing a
    /// load of its chunk is queued and applied when that load lands.
    pub fn apply_remote(&self, b: BlockCoord, w: BlockType) -> Option<Version> {
        self.persist(b, w);
        let coord = b.chunk();
        let chunk = {
            let chunks = self.chunks.lock().unwrap();
            match chunks.peek(&coord) {
                Some(c) => Arc::clone(c),
                None => {
                    if let Some(l) = self.loading.lock().unwrap().get_mut(&coord) {
                        l.edits.push((b, w));
                    }
                    return None;
                }
            }
        };
        self.apply_to(&chunk, &[(b, w)]);
        Some(chunk.version())
    }

    pub fn stats(&self) -> ChunkStoreStats {
        ChunkStoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops one loader of `coord` and hands back the edits queued so far. Call with the
    /// chunk lock held.
    fn finish_loading(&self, coord: ChunkCoord) -> Vec<(BlockCoord, BlockType)> {
        let mut loading = self.loading.lock().unwrap();
        let Some(l) = loading.get_mut(&coord) else {
            return Vec::new();
        };
        l.loaders -= 1;
        let edits = std::mem::take(&mut l.edits);
        if l.loaders == 0 {
            loading.remove(&coord);
        }
        edits
    }

    fn apply_to(&self, chunk: &Chunk, edits: &[(BlockCoord, BlockType)]) {
        let mut changed = false;
        for &(b, w) in edits {
            changed |= chunk.set(b, w);
        }
        if changed {
            chunk.bump(self.clock.tick());
        }
    }

    fn persist(&self, b: BlockCoord, w: BlockType) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put_block(b, w) {
                log::warn!(target: "store", "edit at {b:?} not persisted: {e}");
            }
        }
    }

    fn materialize(&self, coord: ChunkCoord) -> Result<Chunk, StoreError> {
        let mut blocks = self.generator.generate(coord);
        if let Some(cache) = &self.cache {
            cache.for_each_block_in_chunk(coord, |b, w| overlay(&mut blocks, b, w))?;
        }
        let client = self.sync.read().unwrap().clone();
        if let Some(client) = client {
            self.merge_remote(&client, coord, &mut blocks)?;
        }
        log::trace!(target: "chunks", "materialized ({}, {}): {} blocks", coord.cx, coord.cz, blocks.len());
        Ok(Chunk::new(coord, blocks, self.clock.tick()))
    }

    fn merge_remote(
        &self,
        client: &SyncClient,
        coord: ChunkCoord,
        blocks: &mut BlockMap,
    ) -> Result<(), StoreError> {
        let known = match &self.cache {
            Some(cache) => cache.get_chunk_version(coord)?,
            None => None,
        };
        let delta = match client.fetch_chunk(coord, known) {
            Ok(d) => d,
            Err(e) if e.is_disconnected() => return Ok(()),
            Err(e) => {
                log::warn!(target: "sync", "fetch of ({}, {}) failed: {e}", coord.cx, coord.cz);
                return Ok(());
            }
        };
        if known == Some(delta.version) {
            return Ok(());
        }
        let mut persisted = true;
        for (b, w) in delta.blocks {
            if b.chunk() != coord {
                log::warn!(target: "sync", "ignoring {b:?} sent for chunk ({}, {})", coord.cx, coord.cz);
                continue;
            }
            overlay(blocks, b, w);
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.put_block(b, w) {
                    log::warn!(target: "store", "remote block {b:?} not persisted: {e}");
                    persisted = false;
                }
            }
        }
        if let Some(cache) = &self.cache {
            // a stamp without all of its blocks would hide them on the next load
            if persisted {
                if let Err(e) = cache.put_chunk_version(coord, delta.version) {
                    log::warn!(target: "store", "stamp for ({}, {}) not persisted: {e}", coord.cx, coord.cz);
                }
            }
        }
        Ok(())
    }
}

fn capacity_for(render_radius: i32) -> usize {
    let r = render_radius.max(0) as usize;
    (4 * r * r).max((2 * r + 1) * (2 * r + 1))
}

fn overlay(blocks: &mut BlockMap, b: BlockCoord, w: BlockType) {
    if w.is_air() {
        blocks.remove(&b);
    } else {
        blocks.insert(b, w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_follows_render_radius() {
        assert_eq!(ChunkStore::new(Generator::new(0), 6).capacity(), 169);
        assert_eq!(ChunkStore::new(Generator::new(0), 1).capacity(), 9);
        assert_eq!(ChunkStore::new(Generator::new(0), 0).capacity(), 1);
    }

    #[test]
    fn capacity_covers_the_square_around_the_viewer() {
        for r in 0..=12 {
            let side = (2 * r + 1) as usize;
            assert!(capacity_for(r) >= side * side, "radius {r}");
            assert!(capacity_for(r) >= 4 * (r * r) as usize, "radius {r}");
        }
    }

    #[test]
    fn second_get_is_a_hit() {
        let store = ChunkStore::new(Generator::new(0), 2);
        let a = store.get(ChunkCoord::new(0, 0)).unwrap();
        let b = store.get(ChunkCoord::new(0, 0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let s = store.stats();
        assert_eq!((s.hits, s.misses, s.entries), (1, 1, 1));
    }

    #[test]
    fn unloaded_chunk_reads_unknown_until_loaded() {
        let store = ChunkStore::new(Generator::new(0), 2);
        let b = BlockCoord::new(0, 0, 0);
        assert_eq!(store.resident_block(b), BlockType::UNKNOWN);
        assert!(!store.has_block(b));
        // every column is filled from y = 0
        assert!(!store.block(b).is_air());
        assert!(store.has_block(b));
    }
}
