use crate::config::ExecutionMode;
use crate::error::EngineError;
use crate::mesh::{ExtractStatus, MeshBuffers, MeshExtractor, MeshSink};
use crate::voxel_field::VoxelField;
use bevy::prelude::*;

/// What a call to [`Chunk::rebuild_if_dirty`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
	/// The chunk was clean
	Skipped,
	/// A rebuild is in flight
	Pending,
	/// A new mesh was published
	Rebuilt,
}

/// One tile of the terrain: its voxel field, mesh buffers and extraction strategy.
pub struct Chunk {
	key: IVec3,
	position: Vec3,
	field: VoxelField,
	extractor: Box<dyn MeshExtractor>,
	mesh: MeshBuffers,
	needs_update: bool,
	/// Bumped by every edit that wrote a sample
	revision: u64,
	/// Revision of the field the running extraction was started from
	in_flight_revision: Option<u64>,
}

impl Chunk {
	/// A new chunk starts dirty so its first rebuild meshes the generated field.
	pub fn new(key: IVec3, field: VoxelField, extractor: Box<dyn MeshExtractor>) -> Self {
		Self {
			key,
			position: field.origin(),
			field,
			extractor,
			mesh: MeshBuffers::default(),
			needs_update: true,
			revision: 0,
			in_flight_revision: None,
		}
	}

	pub fn key(&self) -> IVec3 {
		self.key
	}

	/// World position of the chunk's minimum corner
	pub fn position(&self) -> Vec3 {
		self.position
	}

	pub fn field(&self) -> &VoxelField {
		&self.field
	}

	pub fn mesh(&self) -> &MeshBuffers {
		&self.mesh
	}

	pub fn mode(&self) -> ExecutionMode {
		self.extractor.mode()
	}

	pub fn needs_update(&self) -> bool {
		self.needs_update
	}

	pub fn mark_dirty(&mut self) {
		self.needs_update = true;
	}

	/// Writes the sample nearest to `world_pos`. Out-of-bounds writes are ignored and leave the
	/// dirty flag alone.
	pub fn set_value(&mut self, world_pos: Vec3, value: f32) -> bool {
		if !self.field.set_value(world_pos, value) {
			return false;
		}
		self.revision += 1;
		self.needs_update = true;
		true
	}

	/// Rebuilds the mesh if the chunk is dirty and publishes it to `sink` once it is complete.
	///
	/// If the field was edited while an asynchronous rebuild was in flight, the published mesh
	/// is stale and the chunk stays dirty.
	pub fn rebuild_if_dirty<S: MeshSink + ?Sized>(
		&mut self,
		sink: &mut S,
	) -> Result<RebuildOutcome, EngineError> {
		if !self.needs_update {
			return Ok(RebuildOutcome::Skipped);
		}

		let started_from = *self.in_flight_revision.get_or_insert(self.revision);
		match self.extractor.extract(&self.field, &mut self.mesh) {
			Ok(ExtractStatus::Pending) => Ok(RebuildOutcome::Pending),
			Ok(ExtractStatus::Complete) => {
				self.in_flight_revision = None;
				self.needs_update = started_from != self.revision;
				sink.publish(self.key, self.position, &self.mesh);
				Ok(RebuildOutcome::Rebuilt)
			}
			Err(err) => {
				self.in_flight_revision = None;
				Err(err)
			}
		}
	}
}
