//! Render-facing runtime: mesh cache, rebuild scheduling, and the per-frame driver.
#![forbid(unsafe_code)]

mod backend;
mod mesh_cache;
mod runtime;
mod scheduler;
pub mod visibility;

pub use backend::{RenderBackend, Viewer};
pub use mesh_cache::{BuildPlan, CachedMesh, MeshCache};
pub use runtime::{MeshRuntime, RenderStats, RuntimeConfig};
pub use scheduler::{BuiltMesh, RebuildScheduler, RebuildSignal};
