//! Other players' avatars, smoothed between the last two reported poses.

use cgmath::{Matrix4, Point3, SquareMatrix};
use hashbrown::HashMap;
use tessera_blocks::{AVATAR_BLOCK, TextureAtlas};
use tessera_geom::Vec3;
use tessera_mesh_cpu::{VertexData, cube_vertices};
use tessera_runtime::RenderBackend;
use tessera_sync::ClientId;
use tessera_world::{BlockCoord, PlayerState};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Timed {
    state: PlayerState,
    at: f64,
}

struct RemotePlayer<H> {
    prev: Timed,
    last: Timed,
    handle: Option<H>,
}

impl<H> RemotePlayer<H> {
    /// Moves from `prev` toward `last` over the interval the two reports arrived in.
    fn pose(&self, now: f64) -> PlayerState {
        let span = self.last.at - self.prev.at;
        let t = if span <= 0.0 {
            1.0
        } else {
            ((now - self.last.at) / span).clamp(0.0, 1.0) as f32
        };
        self.prev.state.lerp(&self.last.state, t)
    }
}

pub struct RemotePlayers<H> {
    players: HashMap<ClientId, RemotePlayer<H>>,
    retired: Vec<H>,
    avatar: VertexData,
}

impl<H> RemotePlayers<H> {
    pub fn new(atlas: &TextureAtlas) -> Self {
        let mut data = Vec::new();
        cube_vertices(
            &mut data,
            [true; 6],
            BlockCoord::new(0, 0, 0),
            atlas.texture(AVATAR_BLOCK),
        );
        Self {
            players: HashMap::new(),
            retired: Vec::new(),
            avatar: VertexData { data },
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn update_or_add(&mut self, id: ClientId, state: PlayerState, now: f64) {
        let timed = Timed { state, at: now };
        match self.players.get_mut(&id) {
            Some(p) => {
                // identical reports would stall the interpolation clock
                if p.last.state != state {
                    p.prev = p.last;
                    p.last = timed;
                }
            }
            None => {
                log::info!(target: "players", "add player {id}");
                self.players.insert(
                    id,
                    RemotePlayer {
                        prev: timed,
                        last: timed,
                        handle: None,
                    },
                );
            }
        }
    }

    pub fn remove(&mut self, id: ClientId) {
        if let Some(p) = self.players.remove(&id) {
            log::info!(target: "players", "remove player {id}");
            self.retired.extend(p.handle);
        }
    }

    /// Drops every player the roster no longer lists.
    pub fn retain(&mut self, mut keep: impl FnMut(ClientId) -> bool) {
        let gone: Vec<ClientId> = self.players.keys().copied().filter(|&id| !keep(id)).collect();
        for id in gone {
            self.remove(id);
        }
    }

    pub fn pose(&self, id: ClientId, now: f64) -> Option<PlayerState> {
        self.players.get(&id).map(|p| p.pose(now))
    }

    /// Releases avatars of departed players, then draws the rest. Returns how many were
    /// drawn.
    pub fn draw<B>(&mut self, backend: &mut B, view_proj: &Matrix4<f32>, now: f64) -> usize
    where
        B: RenderBackend<Handle = H>,
    {
        for h in self.retired.drain(..) {
            backend.release_mesh(h);
        }
        let avatar = &self.avatar;
        let mut drawn = 0;
        for p in self.players.values_mut() {
            let model = avatar_model(&p.pose(now));
            let handle = p.handle.get_or_insert_with(|| backend.build_mesh(avatar));
            backend.draw(handle, &(*view_proj * model));
            drawn += 1;
        }
        drawn
    }

    pub fn release_all<B>(&mut self, backend: &mut B)
    where
        B: RenderBackend<Handle = H>,
    {
        for h in self.retired.drain(..) {
            backend.release_mesh(h);
        }
        for (_, p) in self.players.drain() {
            if let Some(h) = p.handle {
                backend.release_mesh(h);
            }
        }
    }
}

/// Places the avatar cube at the pose, facing where the player looks.
fn avatar_model(s: &PlayerState) -> Matrix4<f32> {
    let (yaw, pitch) = (s.rx.to_radians(), s.ry.to_radians());
    let front = Vec3::new(pitch.cos() * yaw.cos(), pitch.sin(), pitch.cos() * yaw.sin()).normalized();
    let right = front.cross(Vec3::UP).normalized();
    let up = right.cross(front).normalized();
    let pos = Vec3::new(s.x, s.y, s.z);
    let eye: Point3<f32> = pos.into();
    let look = Matrix4::look_at_rh(eye, (pos + front).into(), up.into());
    look.invert().unwrap_or_else(Matrix4::identity)
}
