pub mod backend;
pub mod bind_groups;
pub mod readback;
pub mod render_device;
pub mod software;

pub use backend::{ChunkKernel, ComputeBackend, KernelParams, KernelSource};
pub use readback::Readback;
pub use render_device::RenderDeviceBackend;
pub use software::SoftwareBackend;

use crate::config::ExecutionMode;
use crate::error::{EngineError, GpuError};
use crate::mesh::{ExtractStatus, MeshBuffers, MeshExtractor, Triangle};
use crate::voxel_field::{FieldLayout, VoxelField};
use backend::{is_workgroup_aligned, workgroups_for};

/// Where a GPU extractor is in its dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuMeshState {
	/// Nothing in flight; the next rebuild dispatches
	Idle,
	/// Dispatched; waiting on the readback
	AwaitingReadback,
	/// Triangles arrived and wait to be consumed by the next rebuild
	Ready,
}

/// Marching cubes on a compute device with a non-blocking readback.
///
/// The first rebuild dispatches and returns [`ExtractStatus::Pending`]. Rebuilds while the
/// readback is outstanding change nothing. The first rebuild after the readback lands copies the
/// triangles into the mesh and returns [`ExtractStatus::Complete`].
pub struct GpuMeshExtractor {
	kernel: Box<dyn ChunkKernel>,
	layout: FieldLayout,
	state: GpuMeshState,
	readback: Option<Readback>,
	triangles: Vec<Triangle>,
}

impl GpuMeshExtractor {
	pub fn new(backend: &dyn ComputeBackend, layout: FieldLayout) -> Result<Self, GpuError> {
		let cells = layout.cells();
		if !is_workgroup_aligned(cells) {
			log::warn!(
				"Chunk cells {:?} are not a multiple of the work-group size; trailing invocations idle",
				cells
			);
		}

		Ok(Self {
			kernel: backend.allocate(&layout)?,
			layout,
			state: GpuMeshState::Idle,
			readback: None,
			triangles: Vec::new(),
		})
	}

	pub fn state(&self) -> GpuMeshState {
		self.state
	}

	/// A dispatch is in flight or its results are unconsumed.
	pub fn is_updating(&self) -> bool {
		self.state != GpuMeshState::Idle
	}

	/// Results are ready to be consumed.
	pub fn is_finished(&self) -> bool {
		self.state == GpuMeshState::Ready
	}

	fn dispatch(&mut self, field: &VoxelField) -> Result<(), GpuError> {
		if field.layout() != self.layout {
			return Err(GpuError::LayoutMismatch { expected: self.layout, actual: field.layout() });
		}

		let params = KernelParams::new(&self.layout);
		let readback =
			self.kernel.dispatch(field.densities(), &params, workgroups_for(self.layout.cells()))?;

		self.readback = Some(readback);
		self.state = GpuMeshState::AwaitingReadback;
		Ok(())
	}

	/// Checks for a landed readback without blocking.
	///
	/// A failed readback returns the extractor to `Idle` so the next rebuild dispatches again.
	pub fn poll(&mut self) -> Result<GpuMeshState, GpuError> {
		if self.state != GpuMeshState::AwaitingReadback {
			return Ok(self.state);
		}

		let Some(result) = self.readback.as_ref().and_then(Readback::try_take) else {
			return Ok(self.state);
		};
		self.readback = None;

		match result {
			Ok(triangles) => {
				self.triangles = triangles;
				self.state = GpuMeshState::Ready;
				Ok(self.state)
			}
			Err(err) => {
				self.state = GpuMeshState::Idle;
				Err(err)
			}
		}
	}

	fn consume(&mut self, mesh: &mut MeshBuffers) {
		mesh.clear();
		for triangle in self.triangles.drain(..) {
			mesh.push_triangle(triangle.vertices());
		}
		self.state = GpuMeshState::Idle;
	}
}

impl MeshExtractor for GpuMeshExtractor {
	fn mode(&self) -> ExecutionMode {
		ExecutionMode::Gpu
	}

	fn extract(
		&mut self,
		field: &VoxelField,
		mesh: &mut MeshBuffers,
	) -> Result<ExtractStatus, EngineError> {
		if self.state == GpuMeshState::Idle {
			self.dispatch(field)?;
		}

		if self.poll()? == GpuMeshState::Ready {
			self.consume(mesh);
			return Ok(ExtractStatus::Complete);
		}
		Ok(ExtractStatus::Pending)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cpu::CpuMeshExtractor;
	use bevy::prelude::*;
	use density::{ConstantDensity, SphereDensity};

	fn sphere_field(layout: FieldLayout) -> VoxelField {
		let center = Vec3::new(layout.chunk_width as f32, layout.chunk_height as f32, layout.chunk_width as f32) / 2.0;
		VoxelField::generate(layout, Vec3::ZERO, &SphereDensity::new(center, 2.6))
	}

	#[test]
	fn test_rebuild_while_updating_is_noop() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let layout = FieldLayout::new(8, 8, 1);
		let field = sphere_field(layout);
		let mut extractor = GpuMeshExtractor::new(&backend, layout)?;
		let mut mesh = MeshBuffers::default();
		mesh.push_triangle([Vec3::ZERO, Vec3::X, Vec3::Y]);
		let before = mesh.clone();

		assert!(!extractor.is_updating());
		assert_eq!(extractor.extract(&field, &mut mesh)?, ExtractStatus::Pending);
		assert!(extractor.is_updating());
		assert!(!extractor.is_finished());

		assert_eq!(extractor.extract(&field, &mut mesh)?, ExtractStatus::Pending);
		assert_eq!(backend.pending(), 1);
		assert_eq!(mesh, before);
		Ok(())
	}

	#[test]
	fn test_resolution_reflects_one_dispatch() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let layout = FieldLayout::new(8, 8, 1);
		let field = sphere_field(layout);
		let mut extractor = GpuMeshExtractor::new(&backend, layout)?;
		let mut mesh = MeshBuffers::default();

		extractor.extract(&field, &mut mesh)?;
		backend.complete_pending();
		assert_eq!(extractor.poll()?, GpuMeshState::Ready);
		assert!(extractor.is_finished());

		assert_eq!(extractor.extract(&field, &mut mesh)?, ExtractStatus::Complete);
		assert!(!extractor.is_updating());
		assert!(!extractor.is_finished());

		let mut expected = MeshBuffers::default();
		CpuMeshExtractor::generate_chunk_mesh(&field, &mut expected);
		assert_eq!(mesh.triangle_count(), expected.triangle_count());
		assert!(mesh.is_well_formed());
		Ok(())
	}

	#[test]
	fn test_matches_cpu_extraction() -> Result<(), EngineError> {
		for layout in [FieldLayout::new(8, 8, 1), FieldLayout::new(4, 6, 2)] {
			let field = sphere_field(layout);
			let backend = SoftwareBackend::new();
			let mut gpu = GpuMeshExtractor::new(&backend, layout)?;
			let mut gpu_mesh = MeshBuffers::default();

			gpu.extract(&field, &mut gpu_mesh)?;
			backend.complete_pending();
			assert_eq!(gpu.extract(&field, &mut gpu_mesh)?, ExtractStatus::Complete);

			let mut cpu_mesh = MeshBuffers::default();
			CpuMeshExtractor.extract(&field, &mut cpu_mesh)?;

			assert!(!cpu_mesh.is_empty());
			assert_eq!(gpu_mesh, cpu_mesh);
		}
		Ok(())
	}

	#[test]
	fn test_failed_readback_returns_to_idle() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let layout = FieldLayout::new(8, 8, 1);
		let field = sphere_field(layout);
		let mut extractor = GpuMeshExtractor::new(&backend, layout)?;
		let mut mesh = MeshBuffers::default();

		extractor.extract(&field, &mut mesh)?;
		backend.fail_pending("device lost");

		let result = extractor.extract(&field, &mut mesh);
		assert!(matches!(result, Err(EngineError::Gpu(GpuError::Readback(_)))));
		assert_eq!(extractor.state(), GpuMeshState::Idle);

		// the next rebuild dispatches again
		assert_eq!(extractor.extract(&field, &mut mesh)?, ExtractStatus::Pending);
		assert_eq!(backend.pending(), 1);
		Ok(())
	}

	#[test]
	fn test_layout_mismatch() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let mut extractor = GpuMeshExtractor::new(&backend, FieldLayout::new(8, 8, 1))?;
		let field = VoxelField::generate(FieldLayout::new(4, 4, 1), Vec3::ZERO, &ConstantDensity(1.0));

		let result = extractor.extract(&field, &mut MeshBuffers::default());
		assert!(matches!(result, Err(EngineError::Gpu(GpuError::LayoutMismatch { .. }))));
		assert_eq!(extractor.state(), GpuMeshState::Idle);
		Ok(())
	}

	#[test]
	fn test_drop_while_in_flight() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let layout = FieldLayout::new(8, 8, 1);
		let mut extractor = GpuMeshExtractor::new(&backend, layout)?;
		extractor.extract(&sphere_field(layout), &mut MeshBuffers::default())?;

		drop(extractor);
		assert_eq!(backend.complete_pending(), 1);
		Ok(())
	}
}
