use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, never, select, tick};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tessera_blocks::TextureAtlas;
use tessera_chunk::ChunkStore;
use tessera_geom::Frustum;
use tessera_mesh_cpu::{VertexData, build_chunk_mesh};
use tessera_world::{ChunkCoord, Version};

use crate::backend::Viewer;
use crate::mesh_cache::{BuildPlan, MeshCache};
use crate::visibility::{needed_set, rank};

/// CPU mesh on its way to the render thread.
#[derive(Debug)]
pub struct BuiltMesh {
    pub coord: ChunkCoord,
    pub version: Version,
    pub data: VertexData,
}

/// Wakes the scheduler. Requests made while one is already pending collapse into it.
#[derive(Clone, Debug)]
pub struct RebuildSignal {
    tx: Sender<()>,
}

impl RebuildSignal {
    pub fn channel() -> (Self, Receiver<()>) {
        let (tx, rx) = bounded(1);
        (Self { tx }, rx)
    }

    /// Never blocks.
    #[inline]
    pub fn request(&self) {
        let _ = self.tx.try_send(());
    }
}

pub(crate) struct PassContext<H> {
    pub store: Arc<ChunkStore>,
    pub cache: Arc<MeshCache<H>>,
    pub atlas: Arc<TextureAtlas>,
    pub viewer: Arc<RwLock<Option<Viewer>>>,
    pub radius: i32,
    pub batch_limit: usize,
    pub built_tx: Sender<BuiltMesh>,
}

impl<H: Send> PassContext<H> {
    /// One round: drop meshes that left the radius, then build the best-ranked missing or
    /// dirty chunks. Returns how many meshes were sent.
    pub fn run_pass(&self, pool: &ThreadPool) -> usize {
        let Some(viewer) = *self.viewer.read().unwrap() else {
            return 0;
        };
        let center = viewer.chunk();
        let needed = needed_set(center, self.radius);
        let BuildPlan { mut add, remove } = self.cache.plan(&needed);
        for c in &remove {
            self.cache.remove(*c);
        }
        if !remove.is_empty() {
            log::debug!(target: "mesh", "dropped {} meshes outside radius", remove.len());
        }

        let frustum = Frustum::from_matrix(&viewer.view_proj);
        rank(&mut add, center, &frustum);
        add.truncate(self.batch_limit);
        if add.is_empty() {
            return 0;
        }
        self.cache.begin_build(&add);
        let built: Vec<BuiltMesh> = pool.install(|| {
            let chunks = self.store.get_many(&add);
            chunks
                .par_iter()
                .map(|chunk| {
                    // read before meshing so a concurrent edit leaves the mesh looking stale
                    let version = chunk.version();
                    BuiltMesh {
                        coord: chunk.coord(),
                        version,
                        data: build_chunk_mesh(chunk, self.store.as_ref(), &self.atlas),
                    }
                })
                .collect()
        });
        for c in &add {
            if !built.iter().any(|b| b.coord == *c) {
                self.cache.abandon_build(*c);
            }
        }
        let n = built.len();
        log::debug!(target: "mesh", "built {n} of {} requested meshes", add.len());
        for b in built {
            if self.built_tx.send(b).is_err() {
                break;
            }
        }
        n
    }
}

/// Background thread that keeps the mesh cache in step with the viewer.
pub struct RebuildScheduler {
    signal: RebuildSignal,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl RebuildScheduler {
    pub(crate) fn spawn<H: Send + 'static>(
        ctx: PassContext<H>,
        tick_every: Option<Duration>,
    ) -> io::Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .thread_name(|i| format!("tessera-mesh-{i}"))
            .build()
            .map_err(io::Error::other)?;
        let (signal, signal_rx) = RebuildSignal::channel();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let ticker = match tick_every {
            Some(d) => tick(d),
            None => never(),
        };
        let passes = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&passes);
        let handle = thread::Builder::new()
            .name("tessera-rebuild".into())
            .spawn(move || {
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(signal_rx) -> msg => if msg.is_err() { break },
                        recv(ticker) -> _ => {},
                    }
                    ctx.run_pass(&pool);
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                log::debug!(target: "mesh", "rebuild scheduler stopped");
            })?;
        Ok(Self {
            signal,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            passes,
        })
    }

    pub fn signal(&self) -> RebuildSignal {
        self.signal.clone()
    }

    #[inline]
    pub fn request(&self) {
        self.signal.request();
    }

    /// Completed passes so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Waits for the current pass to finish, then stops the thread.
    pub fn stop(&mut self) {
        self.stop_tx = None;
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::error!(target: "mesh", "rebuild scheduler panicked");
            }
        }
    }
}

impl Drop for RebuildScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
