use cgmath::Matrix4;
use tessera_geom::Vec3;
use tessera_mesh_cpu::VertexData;
use tessera_world::{BlockCoord, ChunkCoord};

/// GPU side of meshing. Every call happens on the render thread.
pub trait RenderBackend {
    type Handle: Send;

    fn build_mesh(&mut self, data: &VertexData) -> Self::Handle;
    fn release_mesh(&mut self, handle: Self::Handle);
    fn draw(&mut self, handle: &Self::Handle, view_proj: &Matrix4<f32>);
    /// Immediate line list of xyz pairs, such as the selection outline. Nothing is kept.
    fn draw_lines(&mut self, lines: &[f32], mvp: &Matrix4<f32>);
}

/// Camera position plus the combined projection * view matrix for this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewer {
    pub position: Vec3,
    pub view_proj: Matrix4<f32>,
}

impl Viewer {
    pub fn new(position: Vec3, view_proj: Matrix4<f32>) -> Self {
        Self {
            position,
            view_proj,
        }
    }

    #[inline]
    pub fn chunk(&self) -> ChunkCoord {
        BlockCoord::nearest(self.position.x, self.position.y, self.position.z).chunk()
    }
}
