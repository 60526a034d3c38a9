use cgmath::Matrix4;
use hashbrown::HashMap;
use tessera_mesh_cpu::VertexData;
use tessera_runtime::RenderBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub live: usize,
    pub live_faces: usize,
    pub built: u64,
    pub released: u64,
    pub draws: u64,
    pub line_segments: u64,
}

/// Backend with no GPU: keeps face counts per handle so leaks and double frees show up.
#[derive(Default)]
pub struct HeadlessBackend {
    next: u64,
    meshes: HashMap<MeshId, usize>,
    stats: HeadlessStats,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> HeadlessStats {
        HeadlessStats {
            live: self.meshes.len(),
            live_faces: self.meshes.values().sum(),
            ..self.stats
        }
    }
}

impl RenderBackend for HeadlessBackend {
    type Handle = MeshId;

    fn build_mesh(&mut self, data: &VertexData) -> MeshId {
        self.next += 1;
        let id = MeshId(self.next);
        self.meshes.insert(id, data.faces());
        self.stats.built += 1;
        id
    }

    fn release_mesh(&mut self, handle: MeshId) {
        if self.meshes.remove(&handle).is_none() {
            log::error!(target: "render", "release of unknown mesh {handle:?}");
            return;
        }
        self.stats.released += 1;
    }

    fn draw(&mut self, handle: &MeshId, _view_proj: &Matrix4<f32>) {
        if !self.meshes.contains_key(handle) {
            log::error!(target: "render", "draw of released mesh {handle:?}");
            return;
        }
        self.stats.draws += 1;
    }

    fn draw_lines(&mut self, lines: &[f32], _mvp: &Matrix4<f32>) {
        if lines.len() % 6 != 0 {
            log::error!(target: "render", "line list of {} floats is not xyz pairs", lines.len());
            return;
        }
        self.stats.line_segments += (lines.len() / 6) as u64;
    }
}
