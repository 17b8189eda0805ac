use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use engine::{MeshBuffers, MeshSink, TerrainWorld};
use std::collections::HashMap;

/// Marks the entity drawing one chunk
#[derive(Component, Debug, Clone, Copy)]
pub struct TerrainChunk {
	pub key: IVec3,
}

/// Entities spawned for chunk meshes, by chunk key
#[derive(Resource, Default)]
pub struct ChunkEntities {
	entities: HashMap<IVec3, Entity>,
	material: Option<Handle<StandardMaterial>>,
}

/// Publishes chunk meshes as `Mesh3d` entities.
pub struct BevyMeshSink<'a, 'w, 's> {
	pub commands: &'a mut Commands<'w, 's>,
	pub meshes: &'a mut Assets<Mesh>,
	pub materials: &'a mut Assets<StandardMaterial>,
	pub chunk_entities: &'a mut ChunkEntities,
}

impl MeshSink for BevyMeshSink<'_, '_, '_> {
	fn publish(&mut self, key: IVec3, position: Vec3, mesh: &MeshBuffers) {
		let handle = self.meshes.add(to_bevy_mesh(mesh));

		if let Some(entity) = self.chunk_entities.entities.get(&key) {
			self.commands.entity(*entity).insert(Mesh3d(handle));
			return;
		}

		let materials = &mut *self.materials;
		let material = self
			.chunk_entities
			.material
			.get_or_insert_with(|| {
				materials.add(StandardMaterial {
					base_color: Color::hsla(46.0, 0.22, 0.62, 1.0),
					metallic: 0.0,
					perceptual_roughness: 0.7,
					double_sided: true,
					cull_mode: None,
					..default()
				})
			})
			.clone();

		let entity = self
			.commands
			.spawn((
				TerrainChunk { key },
				Mesh3d(handle),
				MeshMaterial3d(material),
				Transform::from_translation(position),
			))
			.id();
		self.chunk_entities.entities.insert(key, entity);

		log::debug!(
			"Spawned chunk {} at world position {:?} with {} triangles",
			key,
			position,
			mesh.triangle_count()
		);
	}
}

/// Converts chunk buffers into a render mesh. Vertices stay in chunk-local space.
pub fn to_bevy_mesh(mesh: &MeshBuffers) -> Mesh {
	let positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| v.to_array()).collect();

	let mut bevy_mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::RENDER_WORLD);
	bevy_mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
	bevy_mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, mesh.face_normals());
	bevy_mesh.insert_indices(Indices::U32(mesh.indices.clone()));
	bevy_mesh
}

/// Advances the terrain by one tick.
pub fn tick_terrain(
	mut commands: Commands,
	world: Option<ResMut<TerrainWorld>>,
	mut meshes: ResMut<Assets<Mesh>>,
	mut materials: ResMut<Assets<StandardMaterial>>,
	mut chunk_entities: ResMut<ChunkEntities>,
) {
	let Some(mut world) = world else {
		return;
	};

	let mut sink = BevyMeshSink {
		commands: &mut commands,
		meshes: &mut meshes,
		materials: &mut materials,
		chunk_entities: &mut chunk_entities,
	};
	world.tick(&mut sink);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_to_bevy_mesh_keeps_buffers() {
		let mut buffers = MeshBuffers::default();
		buffers.push_triangle([Vec3::ZERO, Vec3::X, Vec3::Y]);

		let mesh = to_bevy_mesh(&buffers);
		assert_eq!(mesh.count_vertices(), 3);
		assert_eq!(mesh.indices().map(|indices| indices.len()), Some(3));
		assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
	}
}
