use std::io;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use tessera_blocks::TextureAtlas;
use tessera_chunk::ChunkStore;
use tessera_geom::Frustum;
use tessera_mesh_cpu::build_chunk_mesh;
use tessera_world::{BlockCoord, ChunkCoord};

use crate::backend::{RenderBackend, Viewer};
use crate::mesh_cache::{CachedMesh, MeshCache};
use crate::scheduler::{BuiltMesh, PassContext, RebuildScheduler};
use crate::visibility::{chunk_visible, is_needed};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub radius: i32,
    pub batch_limit: usize,
    /// Periodic wake-up for the scheduler; `None` wakes only on requests.
    pub tick: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            radius: 6,
            batch_limit: 4,
            tick: Some(Duration::from_micros(16_667)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub faces: usize,
    pub cached: usize,
    pub drawn: usize,
}

/// Render-thread side of meshing. Owns the cache and the scheduler; every backend call
/// goes through [`MeshRuntime::frame`] or [`MeshRuntime::shutdown`].
pub struct MeshRuntime<H: Send + 'static> {
    store: Arc<ChunkStore>,
    atlas: Arc<TextureAtlas>,
    cache: Arc<MeshCache<H>>,
    viewer: Arc<RwLock<Option<Viewer>>>,
    radius: i32,
    scheduler: RebuildScheduler,
    built_rx: Receiver<BuiltMesh>,
    release_rx: Receiver<H>,
}

impl<H: Send + 'static> MeshRuntime<H> {
    pub fn new(
        store: Arc<ChunkStore>,
        atlas: Arc<TextureAtlas>,
        config: RuntimeConfig,
    ) -> io::Result<Self> {
        let (release_tx, release_rx) = unbounded::<H>();
        let cache = Arc::new(MeshCache::new(move |_, h| {
            let _ = release_tx.send(h);
        }));
        let (built_tx, built_rx) = unbounded();
        let viewer = Arc::new(RwLock::new(None));
        let ctx = PassContext {
            store: Arc::clone(&store),
            cache: Arc::clone(&cache),
            atlas: Arc::clone(&atlas),
            viewer: Arc::clone(&viewer),
            radius: config.radius,
            batch_limit: config.batch_limit.max(1),
            built_tx,
        };
        let scheduler = RebuildScheduler::spawn(ctx, config.tick)?;
        log::info!(
            target: "mesh",
            "mesh runtime up: radius {}, batch {}",
            config.radius,
            config.batch_limit
        );
        Ok(Self {
            store,
            atlas,
            cache,
            viewer,
            radius: config.radius,
            scheduler,
            built_rx,
            release_rx,
        })
    }

    pub fn cache(&self) -> &MeshCache<H> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Completed background passes.
    pub fn passes(&self) -> u64 {
        self.scheduler.passes()
    }

    pub fn update_viewer(&self, viewer: Viewer) {
        let moved = {
            let mut slot = self.viewer.write().unwrap();
            let moved = slot.map(|v| v.chunk()) != Some(viewer.chunk());
            *slot = Some(viewer);
            moved
        };
        if moved {
            self.scheduler.request();
        }
    }

    pub fn request_rebuild(&self) {
        self.scheduler.request();
    }

    pub fn mark_dirty(&self, coord: ChunkCoord) {
        if self.cache.mark_dirty(coord) {
            log::trace!(target: "mesh", "dirty ({}, {})", coord.cx, coord.cz);
        }
        self.scheduler.request();
    }

    /// Marks the block's chunk dirty, plus each neighbour chunk it borders.
    pub fn dirty_block(&self, b: BlockCoord) {
        self.cache.mark_dirty(b.chunk());
        for c in b.border_chunks() {
            self.cache.mark_dirty(c);
        }
        self.scheduler.request();
    }

    /// Installs finished builds, refreshes the chunks around the viewer, releases retired
    /// handles, and draws what the frustum can see.
    pub fn frame<B>(&self, backend: &mut B, viewer: &Viewer) -> RenderStats
    where
        B: RenderBackend<Handle = H>,
    {
        self.update_viewer(*viewer);
        let center = viewer.chunk();

        for built in self.built_rx.try_iter() {
            self.install(backend, center, built);
        }
        self.force_near(backend, center);
        for h in self.release_rx.try_iter() {
            backend.release_mesh(h);
        }

        let frustum = Frustum::from_matrix(&viewer.view_proj);
        let mut stats = RenderStats::default();
        self.cache.for_each(|coord, mesh| {
            stats.cached += 1;
            if chunk_visible(&frustum, coord) {
                stats.drawn += 1;
                stats.faces += mesh.faces;
                backend.draw(&mesh.handle, &viewer.view_proj);
            }
        });
        stats
    }

    /// Stops the scheduler and releases every handle through `backend`.
    pub fn shutdown<B>(&mut self, backend: &mut B)
    where
        B: RenderBackend<Handle = H>,
    {
        self.scheduler.stop();
        let dropped = self.built_rx.try_iter().count();
        self.cache.clear();
        let mut released = 0usize;
        for h in self.release_rx.try_iter() {
            backend.release_mesh(h);
            released += 1;
        }
        log::info!(target: "mesh", "released {released} meshes ({dropped} unbuilt dropped)");
    }

    fn install<B>(&self, backend: &mut B, center: ChunkCoord, built: BuiltMesh)
    where
        B: RenderBackend<Handle = H>,
    {
        let BuiltMesh {
            coord,
            version,
            data,
        } = built;
        if !is_needed(center, self.radius, coord) {
            self.cache.abandon_build(coord);
            return;
        }
        // a synchronous rebuild may already have installed something newer
        if let Some((have, false)) = self.cache.state(coord) {
            if have >= version {
                self.cache.abandon_build(coord);
                return;
            }
        }
        let handle = backend.build_mesh(&data);
        self.cache.insert(
            coord,
            CachedMesh {
                handle,
                faces: data.faces(),
                version,
                dirty: false,
            },
        );
    }

    fn force_near<B>(&self, backend: &mut B, center: ChunkCoord)
    where
        B: RenderBackend<Handle = H>,
    {
        for dx in -1..=1 {
            for dz in -1..=1 {
                let coord = center.offset(dx, dz);
                if !is_needed(center, self.radius, coord) {
                    continue;
                }
                let Some(chunk) = self.store.get(coord) else {
                    continue;
                };
                let version = chunk.version();
                if let Some((have, false)) = self.cache.state(coord) {
                    if have == version {
                        continue;
                    }
                }
                let data = build_chunk_mesh(&chunk, self.store.as_ref(), &self.atlas);
                let handle = backend.build_mesh(&data);
                self.cache.insert(
                    coord,
                    CachedMesh {
                        handle,
                        faces: data.faces(),
                        version,
                        dirty: false,
                    },
                );
            }
        }
    }
}
