pub mod tables;

pub use tables::{CORNER_OFFSETS, EDGE_CORNERS, SENTINEL, TRIANGULATIONS};

use bevy::prelude::*;

/// Densities above this value are inside the surface
pub const SURFACE_LEVEL: f32 = 0.0;

/// A cube configuration never produces more than five triangles
pub const MAX_TRIANGLES_PER_CUBE: usize = 5;

/// Builds the 8-bit configuration of a cube from its corner densities, ordered as
/// `CORNER_OFFSETS`.
pub fn get_cube_index(corners: [f32; 8]) -> usize {
	let mut cube_index = 0;
	for (i, density) in corners.iter().enumerate() {
		if *density > SURFACE_LEVEL {
			cube_index |= 1 << i;
		}
	}
	cube_index
}

/// Edge triples of a configuration, stopping at the sentinel.
pub fn triangles(cube_index: usize) -> impl Iterator<Item = [usize; 3]> {
	TRIANGULATIONS[cube_index & 0xff]
		.chunks_exact(3)
		.take_while(|tri| tri.iter().all(|edge| *edge != SENTINEL))
		.map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
}

/// Midpoint of a cube edge in lattice units.
///
/// Vertices sit halfway along the edge regardless of the corner densities.
pub fn edge_midpoint(edge: usize, cube: UVec3) -> Vec3 {
	let [a, b] = EDGE_CORNERS[edge];
	let corner_a = cube + UVec3::from_array(CORNER_OFFSETS[a]);
	let corner_b = cube + UVec3::from_array(CORNER_OFFSETS[b]);
	(corner_a.as_vec3() + corner_b.as_vec3()) / 2.0
}

/// Triangulates one cube.
///
/// `density_at` is sampled at the cube's eight lattice corners. Every emitted triangle is
/// already scaled back into local unit space by `resolution`.
pub fn march_cube(
	density_at: impl Fn(UVec3) -> f32,
	cube: UVec3,
	resolution: f32,
	mut emit: impl FnMut([Vec3; 3]),
) {
	let mut corners = [0.0; 8];
	for (corner, offset) in corners.iter_mut().zip(CORNER_OFFSETS.iter()) {
		*corner = density_at(cube + UVec3::from_array(*offset));
	}

	let cube_index = get_cube_index(corners);
	for [e0, e1, e2] in triangles(cube_index) {
		emit([
			edge_midpoint(e0, cube) / resolution,
			edge_midpoint(e1, cube) / resolution,
			edge_midpoint(e2, cube) / resolution,
		]);
	}
}

/// The case table flattened row by row, as uploaded to the compute kernel.
pub fn flattened_triangulations() -> Vec<i32> {
	TRIANGULATIONS.iter().flat_map(|row| row.iter().map(|edge| *edge as i32)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn corner_inside(cube_index: usize, corner: usize) -> bool {
		cube_index & (1 << corner) != 0
	}

	#[test]
	fn test_uniform_configurations_are_empty() {
		assert_eq!(triangles(0).count(), 0);
		assert_eq!(triangles(255).count(), 0);
		assert_eq!(TRIANGULATIONS[0][0], SENTINEL);
		assert_eq!(TRIANGULATIONS[255][0], SENTINEL);
	}

	#[test]
	fn test_every_other_configuration_has_triangles() {
		for cube_index in 1..255 {
			let count = triangles(cube_index).count();
			assert!(
				(1..=MAX_TRIANGLES_PER_CUBE).contains(&count),
				"configuration {} has {} triangles",
				cube_index,
				count
			);
		}
	}

	#[test]
	fn test_rows_are_closed_triples() {
		for (cube_index, row) in TRIANGULATIONS.iter().enumerate() {
			let used = row.iter().take_while(|edge| **edge != SENTINEL).count();
			assert_eq!(used % 3, 0, "configuration {} ends mid-triangle", cube_index);
			assert!(used <= 15);
			assert!(row[used..].iter().all(|edge| *edge == SENTINEL));
			assert!(row[..used].iter().all(|edge| (0..12).contains(edge)));
		}
	}

	#[test]
	fn test_triangles_are_non_degenerate() {
		for cube_index in 0..256 {
			for tri in triangles(cube_index) {
				assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);

				let [a, b, c] = tri.map(|edge| edge_midpoint(edge, UVec3::ZERO));
				let area = (b - a).cross(c - a).length();
				assert!(area > 1e-6, "configuration {} has a degenerate triangle", cube_index);
			}
		}
	}

	#[test]
	fn test_edges_cross_the_surface() {
		// Catches a table whose bit layout disagrees with the corner ordering
		for cube_index in 0..256 {
			for tri in triangles(cube_index) {
				for edge in tri {
					let [a, b] = EDGE_CORNERS[edge];
					assert_ne!(
						corner_inside(cube_index, a),
						corner_inside(cube_index, b),
						"configuration {} uses edge {} without a sign change",
						cube_index,
						edge
					);
				}
			}
		}
	}

	#[test]
	fn test_edges_join_adjacent_corners() {
		for [a, b] in EDGE_CORNERS {
			let delta = UVec3::from_array(CORNER_OFFSETS[a]).as_ivec3()
				- UVec3::from_array(CORNER_OFFSETS[b]).as_ivec3();
			assert_eq!(delta.abs().element_sum(), 1);
		}
	}

	#[test]
	fn test_cube_index_bits() {
		let mut corners = [-1.0; 8];
		assert_eq!(get_cube_index(corners), 0);

		corners[0] = 0.5;
		corners[7] = 0.5;
		assert_eq!(get_cube_index(corners), 0b1000_0001);

		// the surface level itself counts as outside
		assert_eq!(get_cube_index([0.0; 8]), 0);
		assert_eq!(get_cube_index([1.0; 8]), 255);
	}

	#[test]
	fn test_march_single_corner() {
		let inside = UVec3::ZERO;
		let mut emitted = Vec::new();
		march_cube(
			|p| if p == inside { 1.0 } else { -1.0 },
			UVec3::ZERO,
			2.0,
			|tri| emitted.push(tri),
		);

		assert_eq!(emitted.len(), 1);
		for vertex in emitted[0] {
			// halfway along an edge touching corner 0, scaled by resolution 2
			assert_eq!(vertex.element_sum(), 0.25);
		}
	}

	#[test]
	fn test_flattened_table_layout() {
		let flat = flattened_triangulations();
		assert_eq!(flat.len(), 256 * 16);
		assert_eq!(&flat[16..19], &[0, 8, 3]);
		assert_eq!(flat[19], -1);
	}
}
