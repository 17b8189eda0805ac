use crate::config::ExecutionMode;
use crate::error::EngineError;
use crate::marching_cubes::march_cube;
use crate::mesh::{ExtractStatus, MeshBuffers, MeshExtractor};
use crate::voxel_field::VoxelField;
use bevy::prelude::*;

/// Synchronous marching cubes on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuMeshExtractor;

impl CpuMeshExtractor {
	/// Rebuilds `mesh` from every cube of the field.
	///
	/// Vertices are in local space: lattice coordinates divided by resolution.
	pub fn generate_chunk_mesh(field: &VoxelField, mesh: &mut MeshBuffers) {
		let start_time = std::time::Instant::now();
		mesh.clear();

		let layout = field.layout();
		let cells = layout.cells();
		let resolution = layout.resolution as f32;

		for x in 0..cells.x {
			for y in 0..cells.y {
				for z in 0..cells.z {
					march_cube(|p| field.get(p), UVec3::new(x, y, z), resolution, |triangle| {
						mesh.push_triangle(triangle)
					});
				}
			}
		}

		log::debug!(
			"Marched {} cubes into {} triangles in {:?}",
			layout.cube_count(),
			mesh.triangle_count(),
			start_time.elapsed()
		);
	}
}

impl MeshExtractor for CpuMeshExtractor {
	fn mode(&self) -> ExecutionMode {
		ExecutionMode::Cpu
	}

	fn extract(
		&mut self,
		field: &VoxelField,
		mesh: &mut MeshBuffers,
	) -> Result<ExtractStatus, EngineError> {
		Self::generate_chunk_mesh(field, mesh);
		Ok(ExtractStatus::Complete)
	}
}
