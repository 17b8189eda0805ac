pub mod chunk;
pub mod config;
pub mod cpu;
pub mod error;
pub mod gpu;
pub mod marching_cubes;
pub mod mesh;
pub mod voxel_field;
pub mod world;

pub use chunk::{Chunk, RebuildOutcome};
pub use config::{ExecutionMode, TerrainConfig};
pub use cpu::CpuMeshExtractor;
pub use error::{ConfigError, EngineError, GpuError, VoxelFieldError};
pub use gpu::{
	ComputeBackend, GpuMeshExtractor, GpuMeshState, KernelSource, RenderDeviceBackend,
	SoftwareBackend,
};
pub use mesh::{ExtractStatus, MeshBuffers, MeshExtractor, MeshSink, Triangle};
pub use voxel_field::{FieldLayout, VoxelField};
pub use world::{TerrainBounds, TerrainWorld, TickReport};

pub use density;
pub use terrain_density;

// Typical use:
// - Build a TerrainWorld from a TerrainConfig, optionally with a custom Density and a
//   ComputeBackend for GPU mode
// - Call tick() every frame with a MeshSink that uploads published meshes
// - Route edits through TerrainWorld::set_value
