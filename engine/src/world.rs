use crate::chunk::{Chunk, RebuildOutcome};
use crate::config::{ExecutionMode, TerrainConfig};
use crate::cpu::CpuMeshExtractor;
use crate::error::EngineError;
use crate::gpu::{ComputeBackend, GpuMeshExtractor};
use crate::mesh::{MeshExtractor, MeshSink};
use crate::voxel_field::VoxelField;
use bevy::prelude::*;
use density::Density;
use std::collections::HashMap;
use std::sync::Arc;
use terrain_density::PerlinHeightDensity;

/// Axis-aligned box covered by the terrain. Both faces are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainBounds {
	pub min: Vec3,
	pub max: Vec3,
}

impl TerrainBounds {
	pub fn contains(&self, p: Vec3) -> bool {
		p.cmpge(self.min).all() && p.cmple(self.max).all()
	}
}

/// Summary of one [`TerrainWorld::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
	pub rebuilt: usize,
	pub pending: usize,
	pub skipped: usize,
	pub failed: usize,
}

/// A square grid of chunks.
///
/// Row `r` and column `c` hold the chunk whose minimum corner is
/// `origin + (r * chunk_width, 0, c * chunk_width)`.
#[derive(Resource)]
pub struct TerrainWorld {
	config: TerrainConfig,
	chunks: HashMap<IVec3, Chunk>,
}

impl TerrainWorld {
	/// Validates the config and builds every chunk.
	///
	/// Without a `generator` the Perlin height field from the config's generation settings is
	/// used. GPU mode needs a `backend`.
	pub fn start(
		config: TerrainConfig,
		generator: Option<Arc<dyn Density>>,
		backend: Option<&dyn ComputeBackend>,
	) -> Result<Self, EngineError> {
		let start_time = std::time::Instant::now();
		let config = config.validated()?;
		let generator: Arc<dyn Density> = match generator {
			Some(generator) => generator,
			None => Arc::new(PerlinHeightDensity::new(config.generation)),
		};

		let backend = match config.execution_mode {
			ExecutionMode::Gpu => Some(backend.ok_or(EngineError::ComputeBackendUnavailable)?),
			ExecutionMode::Cpu => None,
		};

		log::info!(
			"Starting terrain: {}x{} chunks of {}x{}x{} at {} samples per unit, marching cubes on {}",
			config.amount_of_chunks,
			config.amount_of_chunks,
			config.chunk_width,
			config.chunk_height,
			config.chunk_width,
			config.pixels_per_unit,
			config.execution_mode
		);

		let layout = config.field_layout();
		let mut chunks = HashMap::new();
		for row in 0..config.amount_of_chunks {
			for column in 0..config.amount_of_chunks {
				let offset = Vec3::new(
					(row * config.chunk_width) as f32,
					0.0,
					(column * config.chunk_width) as f32,
				);
				let field = VoxelField::generate(layout, config.origin() + offset, generator.as_ref());

				let extractor: Box<dyn MeshExtractor> = match backend {
					Some(backend) => Box::new(GpuMeshExtractor::new(backend, layout)?),
					None => Box::new(CpuMeshExtractor),
				};

				let key = Self::key_for(&config, row, column);
				chunks.insert(key, Chunk::new(key, field, extractor));
			}
		}

		log::debug!("Built {} chunks in {:?}", chunks.len(), start_time.elapsed());

		Ok(Self { config, chunks })
	}

	fn key_for(config: &TerrainConfig, row: u32, column: u32) -> IVec3 {
		let origin = config.origin();
		let rounded = IVec3::new(
			origin.x.round_ties_even() as i32,
			origin.y.round_ties_even() as i32,
			origin.z.round_ties_even() as i32,
		);
		rounded + IVec3::new((row * config.chunk_width) as i32, 0, (column * config.chunk_width) as i32)
	}

	pub fn config(&self) -> &TerrainConfig {
		&self.config
	}

	pub fn mode(&self) -> ExecutionMode {
		self.config.execution_mode
	}

	pub fn origin(&self) -> Vec3 {
		self.config.origin()
	}

	pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
		self.chunks.values()
	}

	pub fn chunk_count(&self) -> usize {
		self.chunks.len()
	}

	/// Chunks waiting for a rebuild
	pub fn dirty_count(&self) -> usize {
		self.chunks.values().filter(|chunk| chunk.needs_update()).count()
	}

	pub fn chunk(&self, key: IVec3) -> Option<&Chunk> {
		self.chunks.get(&key)
	}

	pub fn chunk_at(&self, row: u32, column: u32) -> Option<&Chunk> {
		if row >= self.config.amount_of_chunks || column >= self.config.amount_of_chunks {
			return None;
		}
		self.chunks.get(&Self::key_for(&self.config, row, column))
	}

	pub fn chunk_at_mut(&mut self, row: u32, column: u32) -> Option<&mut Chunk> {
		if row >= self.config.amount_of_chunks || column >= self.config.amount_of_chunks {
			return None;
		}
		self.chunks.get_mut(&Self::key_for(&self.config, row, column))
	}

	pub fn bounds(&self) -> TerrainBounds {
		let width = self.config.terrain_width();
		let min = self.origin();
		TerrainBounds { min, max: min + Vec3::new(width, self.config.chunk_height as f32, width) }
	}

	/// Row and column of the chunk containing `world_pos`. Points on the far faces belong to the
	/// last row or column.
	pub fn grid_coordinates(&self, world_pos: Vec3) -> Option<(u32, u32)> {
		if !self.bounds().contains(world_pos) {
			return None;
		}

		let local = self.world_to_local(world_pos);
		let width = self.config.chunk_width as f32;
		let last = self.config.amount_of_chunks - 1;
		let row = ((local.x / width).floor() as u32).min(last);
		let column = ((local.z / width).floor() as u32).min(last);
		Some((row, column))
	}

	pub fn world_to_chunk(&self, world_pos: Vec3) -> Option<&Chunk> {
		let (row, column) = self.grid_coordinates(world_pos)?;
		self.chunk_at(row, column)
	}

	pub fn world_to_chunk_mut(&mut self, world_pos: Vec3) -> Option<&mut Chunk> {
		let (row, column) = self.grid_coordinates(world_pos)?;
		self.chunk_at_mut(row, column)
	}

	pub fn world_to_local(&self, world_pos: Vec3) -> Vec3 {
		world_pos - self.origin()
	}

	pub fn local_to_world(&self, local_pos: Vec3) -> Vec3 {
		local_pos + self.origin()
	}

	/// Edits the sample nearest to `world_pos` in the chunk containing it.
	///
	/// Only that chunk is touched, even when the sample lies on a face shared with a neighbour.
	pub fn set_value(&mut self, world_pos: Vec3, value: f32) -> bool {
		match self.world_to_chunk_mut(world_pos) {
			Some(chunk) => chunk.set_value(world_pos, value),
			None => false,
		}
	}

	/// Rebuilds every dirty chunk, publishing finished meshes to `sink`.
	///
	/// A chunk that fails is logged and stays dirty; the rest of the tick carries on.
	pub fn tick<S: MeshSink + ?Sized>(&mut self, sink: &mut S) -> TickReport {
		let mut report = TickReport::default();
		for chunk in self.chunks.values_mut() {
			match chunk.rebuild_if_dirty(sink) {
				Ok(RebuildOutcome::Rebuilt) => report.rebuilt += 1,
				Ok(RebuildOutcome::Pending) => report.pending += 1,
				Ok(RebuildOutcome::Skipped) => report.skipped += 1,
				Err(err) => {
					log::error!("Failed to rebuild chunk {}: {}", chunk.key(), err);
					report.failed += 1;
				}
			}
		}

		if report.rebuilt > 0 || report.failed > 0 {
			log::debug!("Terrain tick: {:?}", report);
		}
		report
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gpu::SoftwareBackend;
	use crate::mesh::MeshBuffers;
	use density::ConstantDensity;

	#[derive(Default)]
	struct CountingSink {
		published: HashMap<IVec3, usize>,
	}

	impl MeshSink for CountingSink {
		fn publish(&mut self, key: IVec3, _position: Vec3, mesh: &MeshBuffers) {
			*self.published.entry(key).or_default() += 1;
			assert!(mesh.is_well_formed());
		}
	}

	fn config(mode: ExecutionMode) -> TerrainConfig {
		TerrainConfig {
			chunk_width: 8,
			chunk_height: 8,
			amount_of_chunks: 2,
			pixels_per_unit: 1,
			execution_mode: mode,
			origin: [10.0, 0.0, -6.0],
			..Default::default()
		}
	}

	fn flat_ground() -> Option<Arc<dyn Density>> {
		Some(Arc::new(|_x: f32, y: f32, _z: f32| 3.5 - y))
	}

	#[test]
	fn test_start_builds_keyed_grid() -> Result<(), EngineError> {
		let world = TerrainWorld::start(config(ExecutionMode::Cpu), flat_ground(), None)?;

		assert_eq!(world.chunk_count(), 4);
		assert_eq!(world.dirty_count(), 4);

		let chunk = world.chunk_at(1, 0).expect("row 1, column 0 exists");
		assert_eq!(chunk.key(), IVec3::new(18, 0, -6));
		assert_eq!(chunk.position(), Vec3::new(18.0, 0.0, -6.0));
		assert!(world.chunk(IVec3::new(10, 0, 2)).is_some());
		assert!(world.chunk_at(2, 0).is_none());
		Ok(())
	}

	#[test]
	fn test_origin_key_rounds_to_integer() -> Result<(), EngineError> {
		let config = TerrainConfig { origin: [0.4, 0.6, 2.5], ..config(ExecutionMode::Cpu) };
		let world = TerrainWorld::start(config, flat_ground(), None)?;

		assert!(world.chunk(IVec3::new(0, 1, 2)).is_some());
		assert!(world.chunk(IVec3::new(8, 1, 10)).is_some());
		Ok(())
	}

	#[test]
	fn test_cpu_tick_rebuilds_once() -> Result<(), EngineError> {
		let mut world = TerrainWorld::start(config(ExecutionMode::Cpu), flat_ground(), None)?;
		let mut sink = CountingSink::default();

		let report = world.tick(&mut sink);
		assert_eq!(report, TickReport { rebuilt: 4, ..Default::default() });
		assert_eq!(sink.published.len(), 4);
		assert!(world.chunks().all(|chunk| chunk.mesh().triangle_count() > 0));

		let report = world.tick(&mut sink);
		assert_eq!(report, TickReport { skipped: 4, ..Default::default() });
		assert!(sink.published.values().all(|count| *count == 1));
		Ok(())
	}

	#[test]
	fn test_world_to_chunk() -> Result<(), EngineError> {
		let world = TerrainWorld::start(config(ExecutionMode::Cpu), flat_ground(), None)?;

		let key = |p: Vec3| world.world_to_chunk(p).map(Chunk::key);
		assert_eq!(key(Vec3::new(10.0, 0.0, -6.0)), Some(IVec3::new(10, 0, -6)));
		assert_eq!(key(Vec3::new(17.9, 4.0, 1.9)), Some(IVec3::new(10, 0, -6)));
		assert_eq!(key(Vec3::new(18.0, 4.0, 2.0)), Some(IVec3::new(18, 0, 2)));
		// far faces are part of the last chunk
		assert_eq!(key(Vec3::new(26.0, 8.0, 10.0)), Some(IVec3::new(18, 0, 2)));

		assert_eq!(key(Vec3::new(9.9, 0.0, 0.0)), None);
		assert_eq!(key(Vec3::new(12.0, 8.1, 0.0)), None);
		assert_eq!(key(Vec3::new(12.0, 0.0, 10.5)), None);
		Ok(())
	}

	#[test]
	fn test_local_world_round_trip() -> Result<(), EngineError> {
		let world = TerrainWorld::start(config(ExecutionMode::Cpu), flat_ground(), None)?;

		for p in [Vec3::ZERO, Vec3::new(3.5, -1.0, 7.25), Vec3::new(-10.0, 2.0, 6.0)] {
			assert_eq!(world.world_to_local(world.local_to_world(p)), p);
		}
		assert_eq!(world.bounds().max, Vec3::new(26.0, 8.0, 10.0));
		Ok(())
	}

	#[test]
	fn test_set_value_dirties_one_chunk() -> Result<(), EngineError> {
		let mut world = TerrainWorld::start(config(ExecutionMode::Cpu), flat_ground(), None)?;
		world.tick(&mut CountingSink::default());

		assert!(!world.set_value(Vec3::new(0.0, 0.0, 0.0), 1.0));
		assert_eq!(world.dirty_count(), 0);

		assert!(world.set_value(Vec3::new(20.0, 3.0, 4.0), 1.0));
		assert_eq!(world.dirty_count(), 1);
		let dirty = world.chunks().find(|chunk| chunk.needs_update()).map(Chunk::key);
		assert_eq!(dirty, Some(IVec3::new(18, 0, 2)));

		let report = world.tick(&mut CountingSink::default());
		assert_eq!(report.rebuilt, 1);
		assert_eq!(report.skipped, 3);
		Ok(())
	}

	#[test]
	fn test_gpu_without_backend_does_not_start() {
		let result = TerrainWorld::start(config(ExecutionMode::Gpu), flat_ground(), None);
		assert!(matches!(result, Err(EngineError::ComputeBackendUnavailable)));
	}

	#[test]
	fn test_invalid_config_does_not_start() {
		let config = TerrainConfig { amount_of_chunks: 0, ..config(ExecutionMode::Cpu) };
		assert!(matches!(TerrainWorld::start(config, None, None), Err(EngineError::Config(_))));
	}

	#[test]
	fn test_gpu_tick_completes_on_later_tick() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let mut world = TerrainWorld::start(config(ExecutionMode::Gpu), flat_ground(), Some(&backend))?;
		let mut sink = CountingSink::default();

		assert_eq!(world.tick(&mut sink), TickReport { pending: 4, ..Default::default() });
		assert_eq!(world.tick(&mut sink), TickReport { pending: 4, ..Default::default() });
		assert_eq!(backend.pending(), 4);

		backend.complete_pending();
		assert_eq!(world.tick(&mut sink), TickReport { rebuilt: 4, ..Default::default() });
		assert_eq!(world.dirty_count(), 0);
		assert_eq!(sink.published.len(), 4);
		Ok(())
	}

	#[test]
	fn test_gpu_matches_cpu_world() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let mut gpu = TerrainWorld::start(config(ExecutionMode::Gpu), flat_ground(), Some(&backend))?;
		let mut cpu = TerrainWorld::start(config(ExecutionMode::Cpu), flat_ground(), None)?;

		gpu.tick(&mut CountingSink::default());
		backend.complete_pending();
		gpu.tick(&mut CountingSink::default());
		cpu.tick(&mut CountingSink::default());

		for chunk in cpu.chunks() {
			let other = gpu.chunk(chunk.key()).expect("both worlds share keys");
			assert_eq!(other.mesh(), chunk.mesh());
		}
		Ok(())
	}

	#[test]
	fn test_failed_chunk_does_not_stop_tick() -> Result<(), EngineError> {
		let backend = SoftwareBackend::new();
		let mut world = TerrainWorld::start(config(ExecutionMode::Gpu), flat_ground(), Some(&backend))?;
		let mut sink = CountingSink::default();

		world.tick(&mut sink);
		backend.fail_pending("device lost");

		let report = world.tick(&mut sink);
		assert_eq!(report.failed, 4);
		assert_eq!(world.dirty_count(), 4);

		// failed chunks dispatch again on the next tick
		assert_eq!(world.tick(&mut sink).pending, 4);
		assert_eq!(backend.pending(), 4);
		Ok(())
	}

	#[test]
	fn test_constant_field_meshes_empty() -> Result<(), EngineError> {
		let generator: Arc<dyn Density> = Arc::new(ConstantDensity(0.5));
		let mut world = TerrainWorld::start(config(ExecutionMode::Cpu), Some(generator), None)?;
		world.tick(&mut CountingSink::default());

		assert!(world.chunks().all(|chunk| chunk.mesh().is_empty()));
		Ok(())
	}
}
