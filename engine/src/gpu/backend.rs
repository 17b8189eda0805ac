// =================================================================================================
// COMPUTE BACKEND BOUNDARY
// =================================================================================================
// What a GPU extractor needs from a device: per-chunk kernels that take a density upload and hand
// back a pending triangle readback.

use crate::error::GpuError;
use crate::gpu::readback::Readback;
use crate::voxel_field::FieldLayout;
use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};

/// Invocations per work-group along each axis
pub const WORKGROUP_SIZE: u32 = 8;

/// Byte offset of the triangle records in the readback staging buffer. The first word holds
/// the triangle count.
pub const READBACK_HEADER_BYTES: usize = 16;

/// Uniform block bound at binding 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct KernelParams {
	pub chunk_width: u32,
	pub chunk_height: u32,
	pub pixels_per_unit: u32,
	pub _padding: u32,
}

impl KernelParams {
	pub fn new(layout: &FieldLayout) -> Self {
		Self {
			chunk_width: layout.chunk_width,
			chunk_height: layout.chunk_height,
			pixels_per_unit: layout.resolution,
			_padding: 0,
		}
	}

	/// The lattice the kernel will address
	pub fn layout(&self) -> FieldLayout {
		FieldLayout::new(self.chunk_width, self.chunk_height, self.pixels_per_unit)
	}
}

/// Work-groups needed to cover every cube. Invocations past the last cube exit early.
pub fn workgroups_for(cells: UVec3) -> UVec3 {
	UVec3::new(
		cells.x.div_ceil(WORKGROUP_SIZE),
		cells.y.div_ceil(WORKGROUP_SIZE),
		cells.z.div_ceil(WORKGROUP_SIZE),
	)
}

/// Whether every axis is a whole number of work-groups.
pub fn is_workgroup_aligned(cells: UVec3) -> bool {
	cells.to_array().iter().all(|n| n % WORKGROUP_SIZE == 0)
}

/// Output records a kernel for `layout` can hold.
pub fn triangle_capacity(layout: &FieldLayout) -> usize {
	layout.cube_count() * crate::marching_cubes::MAX_TRIANGLES_PER_CUBE
}

/// WGSL source of a compute kernel together with the entry point the pipeline is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSource {
	pub source: &'static str,
	pub entry_point: &'static str,
}

impl KernelSource {
	pub const fn march_cubes() -> Self {
		Self {
			source: include_str!("../../assets/shaders/march_cubes.wgsl"),
			entry_point: "march_cubes",
		}
	}

	/// Checks that the entry point is declared as a `@compute` function.
	pub fn validate(&self) -> Result<(), GpuError> {
		let signature = format!("fn {}(", self.entry_point);
		let found = self.source.match_indices(&signature).any(|(index, _)| {
			let preceding = &self.source[..index];
			match (preceding.rfind("@compute"), preceding.rfind('}')) {
				(Some(attribute), Some(item_end)) => attribute > item_end,
				(Some(_), None) => true,
				(None, _) => false,
			}
		});

		if found {
			Ok(())
		} else {
			Err(GpuError::MissingEntryPoint(self.entry_point.to_string()))
		}
	}
}

/// A device able to run the marching cubes kernel.
pub trait ComputeBackend: Send + Sync {
	fn name(&self) -> &'static str;

	/// Creates the buffers for one chunk. Called once per chunk; buffers never resize.
	fn allocate(&self, layout: &FieldLayout) -> Result<Box<dyn ChunkKernel>, GpuError>;
}

/// Chunk-private buffers plus the shared kernel.
pub trait ChunkKernel: Send + Sync {
	/// Uploads the densities, resets the append counter and dispatches.
	///
	/// Returns immediately. The triangles arrive later through the returned [`Readback`].
	fn dispatch(
		&mut self,
		densities: &[f32],
		params: &KernelParams,
		workgroups: UVec3,
	) -> Result<Readback, GpuError>;

	/// Triangle records the output buffer can hold
	fn capacity(&self) -> usize;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_workgroups_cover_cells() {
		assert_eq!(workgroups_for(UVec3::new(16, 32, 16)), UVec3::new(2, 4, 2));
		assert_eq!(workgroups_for(UVec3::new(9, 1, 8)), UVec3::new(2, 1, 1));

		assert!(is_workgroup_aligned(UVec3::new(16, 32, 16)));
		assert!(!is_workgroup_aligned(UVec3::new(16, 12, 16)));
	}

	#[test]
	fn test_params_layout() {
		let layout = FieldLayout::new(16, 32, 2);
		let params = KernelParams::new(&layout);

		assert_eq!(std::mem::size_of::<KernelParams>(), 16);
		assert_eq!(params.layout(), layout);
		assert_eq!(triangle_capacity(&layout), 32 * 64 * 32 * 5);
	}

	#[test]
	fn test_bundled_kernel_has_entry_point() {
		assert_eq!(KernelSource::march_cubes().validate(), Ok(()));
	}

	#[test]
	fn test_missing_entry_point() {
		let source = KernelSource { entry_point: "classify", ..KernelSource::march_cubes() };
		assert_eq!(source.validate(), Err(GpuError::MissingEntryPoint("classify".to_string())));
	}

	#[test]
	fn test_helper_function_is_not_an_entry_point() {
		let source = KernelSource {
			source: "struct P { a: u32 }\nfn march_cubes(id: vec3<u32>) {}\n",
			entry_point: "march_cubes",
		};
		assert!(source.validate().is_err());
	}
}
