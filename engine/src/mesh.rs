use crate::config::ExecutionMode;
use crate::error::EngineError;
use crate::voxel_field::VoxelField;
use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};

/// One triangle as written by the compute kernel: three packed points.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Triangle {
	pub points: [[f32; 3]; 3],
}

impl Triangle {
	pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
		Self { points: [a.to_array(), b.to_array(), c.to_array()] }
	}

	pub fn vertices(&self) -> [Vec3; 3] {
		self.points.map(Vec3::from_array)
	}
}

/// Triangle-list buffers of a chunk mesh.
///
/// Vertices are never shared: every triangle appends three new vertices and three
/// sequential indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
	pub vertices: Vec<Vec3>,
	pub indices: Vec<u32>,
}

impl MeshBuffers {
	pub fn clear(&mut self) {
		self.vertices.clear();
		self.indices.clear();
	}

	pub fn push_triangle(&mut self, triangle: [Vec3; 3]) {
		for vertex in triangle {
			self.indices.push(self.vertices.len() as u32);
			self.vertices.push(vertex);
		}
	}

	pub fn triangle_count(&self) -> usize {
		self.indices.len() / 3
	}

	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}

	/// Triangles in index order
	pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
		self.indices.chunks_exact(3).map(|tri| {
			[
				self.vertices[tri[0] as usize],
				self.vertices[tri[1] as usize],
				self.vertices[tri[2] as usize],
			]
		})
	}

	/// One normal per vertex, taken from the triangle the vertex belongs to.
	pub fn face_normals(&self) -> Vec<[f32; 3]> {
		let mut normals = vec![[0.0, 1.0, 0.0]; self.vertices.len()];
		for tri in self.indices.chunks_exact(3) {
			let [a, b, c] = [tri[0], tri[1], tri[2]].map(|index| self.vertices[index as usize]);
			let normal = (b - a).cross(c - a).normalize_or(Vec3::Y).to_array();
			for index in tri {
				normals[*index as usize] = normal;
			}
		}
		normals
	}

	/// Index count is a multiple of three and every index addresses a vertex.
	pub fn is_well_formed(&self) -> bool {
		self.indices.len() % 3 == 0
			&& self.indices.iter().all(|index| (*index as usize) < self.vertices.len())
	}
}

/// Outcome of asking an extractor for a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStatus {
	/// The buffers now hold a mesh of the field
	Complete,
	/// Work is in flight; ask again on a later tick
	Pending,
}

/// Produces or refreshes a mesh from the current voxel data.
pub trait MeshExtractor: Send + Sync {
	fn mode(&self) -> ExecutionMode;

	/// Meshes `field` into `mesh`.
	///
	/// The buffers are only touched when the call returns [`ExtractStatus::Complete`].
	fn extract(
		&mut self,
		field: &VoxelField,
		mesh: &mut MeshBuffers,
	) -> Result<ExtractStatus, EngineError>;
}

/// Consumer of finished chunk meshes, e.g. the renderable that draws the chunk.
pub trait MeshSink {
	fn publish(&mut self, key: IVec3, position: Vec3, mesh: &MeshBuffers);
}

impl<F> MeshSink for F
where
	F: FnMut(IVec3, Vec3, &MeshBuffers),
{
	fn publish(&mut self, key: IVec3, position: Vec3, mesh: &MeshBuffers) {
		self(key, position, mesh)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_push_triangle_does_not_share_vertices() {
		let mut mesh = MeshBuffers::default();
		let tri = [Vec3::ZERO, Vec3::X, Vec3::Y];
		mesh.push_triangle(tri);
		mesh.push_triangle(tri);

		assert_eq!(mesh.vertices.len(), 6);
		assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
		assert_eq!(mesh.triangle_count(), 2);
		assert!(mesh.is_well_formed());
		assert_eq!(mesh.triangles().collect::<Vec<_>>(), vec![tri, tri]);
	}

	#[test]
	fn test_face_normals() {
		let mut mesh = MeshBuffers::default();
		mesh.push_triangle([Vec3::ZERO, Vec3::X, Vec3::Y]);
		mesh.push_triangle([Vec3::ZERO, Vec3::Z, Vec3::X]);

		let normals = mesh.face_normals();
		assert_eq!(normals.len(), 6);
		assert_eq!(&normals[..3], &[[0.0, 0.0, 1.0]; 3]);
		assert_eq!(&normals[3..], &[[0.0, 1.0, 0.0]; 3]);
	}

	#[test]
	fn test_triangle_record_layout() {
		assert_eq!(std::mem::size_of::<Triangle>(), 36);

		let tri = Triangle::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Vec3::ONE);
		let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&tri));
		assert_eq!(&floats[..3], &[1.0, 2.0, 3.0]);
		assert_eq!(tri.vertices()[2], Vec3::ONE);
	}
}
