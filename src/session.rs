//! Composition root: owns the single instance of every layer and runs the frame loop.

use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cgmath::{Matrix4, Vector3};
use crossbeam_channel::{Receiver, tick};
use tessera_blocks::{BlockType, TextureAtlas};
use tessera_chunk::ChunkStore;
use tessera_geom::Vec3;
use tessera_mesh_cpu::{visible_faces, wireframe_vertices};
use tessera_runtime::{MeshRuntime, RenderBackend, RenderStats, RuntimeConfig};
use tessera_store::{DurableCache, cache_file_name};
use tessera_sync::transport::TcpTransport;
use tessera_sync::{EditForwarder, Notification, SyncClient};
use tessera_world::{BlockCoord, ChunkCoord, Generator, Version};

use crate::camera::{Camera, Movement};
use crate::config::Config;
use crate::headless::{HeadlessBackend, MeshId};
use crate::players::RemotePlayers;
use crate::presence::Presence;

const ASPECT: f32 = 16.0 / 9.0;
const GRAVITY: f32 = 20.0;
const TERMINAL_VELOCITY: f32 = 50.0;
const MAX_DT: f32 = 0.02;
// slightly larger than a block so the outline does not z-fight its faces
const OUTLINE_SCALE: f32 = 1.005;

pub struct Session {
    started: Instant,
    cache: Option<Arc<DurableCache>>,
    client: Option<Arc<SyncClient>>,
    notifications: Option<Receiver<Notification>>,
    forwarder: Option<EditForwarder>,
    presence: Option<Presence>,
    store: Arc<ChunkStore>,
    runtime: MeshRuntime<MeshId>,
    backend: HeadlessBackend,
    players: RemotePlayers<MeshId>,
    camera: Camera,
    velocity_y: f32,
    palette: Vec<BlockType>,
    item: usize,
}

impl Session {
    /// Opens the cache and, when a server is configured, connects to it. Either may fail
    /// without stopping the session.
    pub fn open(config: &Config) -> Result<Self, Box<dyn Error>> {
        let client = match config.server.as_deref() {
            Some(addr) if !addr.is_empty() => {
                match TcpTransport::connect(addr).and_then(SyncClient::connect) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        log::warn!(target: "sync", "cannot reach {addr}: {e}; playing offline");
                        None
                    }
                }
            }
            _ => None,
        };
        Self::with_client(config, client)
    }

    pub fn with_client(
        config: &Config,
        client: Option<Arc<SyncClient>>,
    ) -> Result<Self, Box<dyn Error>> {
        let cache = open_cache(config);

        let mut atlas = TextureAtlas::default();
        if let Some(path) = &config.atlas {
            atlas.load_overrides(path)?;
            log::info!("atlas overrides from {}", path.display());
        }
        let atlas = Arc::new(atlas);

        let mut store = ChunkStore::new(Generator::new(config.seed), config.render_radius);
        if let Some(c) = &cache {
            store = store.with_cache(Arc::clone(c));
        }
        store.set_sync(client.clone());
        let store = Arc::new(store);

        let runtime = MeshRuntime::new(
            Arc::clone(&store),
            Arc::clone(&atlas),
            RuntimeConfig {
                radius: config.render_radius,
                batch_limit: config.batch_limit,
                ..RuntimeConfig::default()
            },
        )?;

        let mut camera = Camera::new(Vec3::new(0.0, 16.0, 0.0));
        if let Some(c) = &cache {
            match c.get_player_state() {
                Ok(s) => camera.restore(s),
                Err(e) => log::warn!(target: "store", "player state not loaded: {e}"),
            }
        }

        let (notifications, forwarder, presence) = match &client {
            Some(c) => {
                let presence = Presence::spawn(
                    Arc::clone(c),
                    Duration::from_millis(config.player_sync_ms.max(1)),
                    camera.state(),
                )?;
                (
                    Some(c.notifications()),
                    Some(EditForwarder::spawn(Arc::clone(c), cache.clone())),
                    Some(presence),
                )
            }
            None => (None, None, None),
        };

        let palette = atlas.palette();
        Ok(Self {
            started: Instant::now(),
            cache,
            client,
            notifications,
            forwarder,
            presence,
            store,
            runtime,
            backend: HeadlessBackend::new(),
            players: RemotePlayers::new(&atlas),
            camera,
            velocity_y: 0.0,
            palette,
            item: 0,
        })
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn runtime(&self) -> &MeshRuntime<MeshId> {
        &self.runtime
    }

    pub fn backend(&self) -> &HeadlessBackend {
        &self.backend
    }

    pub fn players(&self) -> &RemotePlayers<MeshId> {
        &self.players
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn is_online(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Local edit: memory and cache first, then the authority in the background.
    pub fn set_block(&mut self, b: BlockCoord, w: BlockType) -> Option<Version> {
        let v = self.store.update_block(b, w)?;
        if let Some(f) = &self.forwarder {
            f.forward(b, w);
        }
        self.runtime.dirty_block(b);
        Some(v)
    }

    /// Block under the crosshair.
    pub fn selected(&self) -> Option<BlockCoord> {
        self.store
            .hit_test(self.camera.position, self.camera.front())
            .map(|(hit, _)| hit)
    }

    /// Removes the block under the crosshair.
    pub fn dig(&mut self) -> Option<BlockCoord> {
        let (hit, _) = self
            .store
            .hit_test(self.camera.position, self.camera.front())?;
        self.set_block(hit, BlockType::AIR)?;
        Some(hit)
    }

    /// Places the selected item against the block under the crosshair.
    pub fn build(&mut self) -> Option<BlockCoord> {
        let (_, before) = self
            .store
            .hit_test(self.camera.position, self.camera.front())?;
        let cell = before?;
        let w = *self.palette.get(self.item)?;
        self.set_block(cell, w)?;
        Some(cell)
    }

    pub fn select_next_item(&mut self) {
        if !self.palette.is_empty() {
            self.item = (self.item + 1) % self.palette.len();
        }
    }

    /// Applies pushed edits and roster changes. Returns how many edits were applied.
    pub fn drain_remote(&mut self) -> usize {
        let now = self.now();
        let mut applied = 0;
        if let Some(rx) = &self.notifications {
            for n in rx.try_iter() {
                match n {
                    Notification::UpdateBlock {
                        p, q, x, y, z, w, ..
                    } => {
                        let b = BlockCoord::new(x, y, z);
                        if b.chunk() != ChunkCoord::new(p, q) {
                            log::warn!(target: "sync", "edit at {b:?} tagged with chunk ({p}, {q})");
                            continue;
                        }
                        self.store.apply_remote(b, BlockType(w));
                        self.runtime.dirty_block(b);
                        applied += 1;
                    }
                    Notification::RemovePlayer { id } => self.players.remove(id),
                }
            }
        }
        if let Some(roster) = self.presence.as_ref().and_then(Presence::latest) {
            self.players.retain(|id| roster.contains_key(&id));
            for (id, state) in roster {
                self.players.update_or_add(id, state, now);
            }
        }
        applied
    }

    /// One frame: remote updates, gravity and collision, then meshing and drawing.
    pub fn step(&mut self, dt: f32) -> RenderStats {
        self.drain_remote();
        let dt = dt.clamp(0.0, MAX_DT);
        let mut pos = self.camera.position;
        if !self.camera.flying {
            self.velocity_y = (self.velocity_y - dt * GRAVITY).max(-TERMINAL_VELOCITY);
            pos.y += self.velocity_y * dt;
        }
        let (pos, stopped) = self.store.collide(pos);
        if stopped {
            self.velocity_y = 0.0;
        }
        self.camera.position = pos;
        if let Some(p) = &self.presence {
            p.publish(self.camera.state());
        }

        let viewer = self.camera.viewer(ASPECT);
        let stats = self.runtime.frame(&mut self.backend, &viewer);
        let now = self.now();
        self.players.draw(&mut self.backend, &viewer.view_proj, now);
        self.draw_selection(&viewer.view_proj);
        stats
    }

    /// Outlines the exposed faces of the block under the crosshair.
    fn draw_selection(&mut self, view_proj: &Matrix4<f32>) {
        let Some(b) = self.selected() else {
            return;
        };
        let lines = wireframe_vertices(visible_faces(self.store.as_ref(), b));
        if lines.is_empty() {
            return;
        }
        let model = Matrix4::from_translation(Vector3::new(b.x as f32, b.y as f32, b.z as f32))
            * Matrix4::from_scale(OUTLINE_SCALE);
        self.backend.draw_lines(&lines, &(*view_proj * model));
    }

    /// Headless demo: walks forward at 60 fps, digging and building now and then.
    pub fn run(&mut self, frames: u64) {
        let ticker = tick(Duration::from_micros(16_667));
        let mut last = Instant::now();
        for frame in 0..frames {
            let _ = ticker.recv();
            let now = Instant::now();
            let dt = (now - last).as_secs_f32();
            last = now;

            self.camera.step(Movement::Forward, 0.1);
            match frame % 240 {
                80 => {
                    if let Some(b) = self.dig() {
                        log::debug!("dug {b:?}");
                    }
                }
                160 => {
                    self.select_next_item();
                    if let Some(b) = self.build() {
                        log::debug!("built {b:?}");
                    }
                }
                _ => {}
            }
            let stats = self.step(dt);
            if frame % 60 == 0 {
                let p = self.camera.position;
                let store = self.store.stats();
                log::info!(
                    "[{:.1} {:.1} {:.1}] {:?} meshes {}/{} faces {} chunks {} (hit {} miss {}) players {}{}",
                    p.x,
                    p.y,
                    p.z,
                    self.camera_chunk(),
                    stats.drawn,
                    stats.cached,
                    stats.faces,
                    self.store.len(),
                    store.hits,
                    store.misses,
                    self.players.len(),
                    if self.is_online() { "" } else { " (offline)" }
                );
            }
        }
    }

    /// Stops every background thread, releases GPU handles, and saves the pose.
    pub fn close(mut self) {
        self.runtime.shutdown(&mut self.backend);
        self.players.release_all(&mut self.backend);
        let leaked = self.backend.stats().live;
        if leaked != 0 {
            log::error!(target: "render", "{leaked} meshes still live at shutdown");
        }

        if let Some(mut f) = self.forwarder.take() {
            f.shutdown();
        }
        if let Some(c) = self.client.take() {
            c.shutdown();
        }
        if let Some(mut p) = self.presence.take() {
            p.stop();
        }

        let Some(cache) = self.cache.take() else {
            return;
        };
        if let Err(e) = cache.put_player_state(&self.camera.state()) {
            log::warn!(target: "store", "player state not saved: {e}");
        }
        // the store and runtime hold the other references
        drop(self);
        match Arc::try_unwrap(cache) {
            Ok(cache) => {
                if let Err(e) = cache.close() {
                    log::warn!(target: "store", "cache close failed: {e}");
                }
            }
            Err(shared) => {
                if let Err(e) = shared.flush() {
                    log::warn!(target: "store", "cache flush failed: {e}");
                }
            }
        }
    }

    fn camera_chunk(&self) -> ChunkCoord {
        BlockCoord::nearest(
            self.camera.position.x,
            self.camera.position.y,
            self.camera.position.z,
        )
        .chunk()
    }

    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

fn open_cache(config: &Config) -> Option<Arc<DurableCache>> {
    if let Err(e) = fs::create_dir_all(&config.cache_dir) {
        log::warn!(target: "store", "cannot create {}: {e}", config.cache_dir.display());
        return None;
    }
    let path = config
        .cache_dir
        .join(cache_file_name(config.server.as_deref()));
    match DurableCache::open(&path) {
        Ok(c) => {
            log::info!(target: "store", "cache at {}", path.display());
            Some(Arc::new(c))
        }
        Err(e) => {
            log::warn!(target: "store", "cache {} unavailable: {e}; edits will not persist", path.display());
            None
        }
    }
}
