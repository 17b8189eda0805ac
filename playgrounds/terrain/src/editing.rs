use crate::camera::CameraController;
use bevy::prelude::*;
use engine::TerrainWorld;

/// Distance in front of the camera where edits land
const REACH: f32 = 8.0;

/// Radius of the edited sphere in world units
const BRUSH_RADIUS: f32 = 2.0;

/// Brush densities. The default height field samples positive above the ground.
const CARVED: f32 = 1.0;
const FILLED: f32 = -1.0;

/// `E` carves a sphere out of the terrain in front of the camera, `Q` fills one in.
pub fn edit_terrain(
	keyboard_input: Res<ButtonInput<KeyCode>>,
	world: Option<ResMut<TerrainWorld>>,
	camera: Query<&Transform, With<CameraController>>,
) {
	let value = if keyboard_input.pressed(KeyCode::KeyE) {
		CARVED
	} else if keyboard_input.pressed(KeyCode::KeyQ) {
		FILLED
	} else {
		return;
	};

	let (Some(mut world), Ok(transform)) = (world, camera.single()) else {
		return;
	};

	let target = transform.translation + *transform.forward() * REACH;
	let written = paint_sphere(&mut world, target, BRUSH_RADIUS, value);
	if written > 0 {
		log::debug!("Brush at {:?} wrote {} samples", target, written);
	}
}

/// Writes `value` into every lattice point within `radius` of `center`.
pub fn paint_sphere(world: &mut TerrainWorld, center: Vec3, radius: f32, value: f32) -> usize {
	let step = 1.0 / world.config().resolution() as f32;
	let reach = (radius / step).ceil() as i32;

	let mut written = 0;
	for x in -reach..=reach {
		for y in -reach..=reach {
			for z in -reach..=reach {
				let offset = IVec3::new(x, y, z).as_vec3() * step;
				if offset.length() <= radius && world.set_value(center + offset, value) {
					written += 1;
				}
			}
		}
	}
	written
}

#[cfg(test)]
mod tests {
	use super::*;
	use engine::{ExecutionMode, TerrainConfig};
	use std::sync::Arc;

	#[test]
	fn test_paint_sphere_dirties_touched_chunks() -> Result<(), engine::EngineError> {
		let config = TerrainConfig {
			chunk_width: 8,
			chunk_height: 8,
			amount_of_chunks: 2,
			execution_mode: ExecutionMode::Cpu,
			..Default::default()
		};
		let ground: Arc<dyn engine::density::Density> = Arc::new(|_x: f32, y: f32, _z: f32| y - 4.0);
		let mut world = TerrainWorld::start(config, Some(ground), None)?;
		world.tick(&mut |_key: IVec3, _position: Vec3, _mesh: &engine::MeshBuffers| {});
		assert_eq!(world.dirty_count(), 0);

		// a brush on the shared corner of all four chunks
		assert!(paint_sphere(&mut world, Vec3::new(8.0, 4.0, 8.0), 1.5, CARVED) > 0);
		assert_eq!(world.dirty_count(), 4);

		assert_eq!(paint_sphere(&mut world, Vec3::new(-20.0, 4.0, 0.0), 1.5, CARVED), 0);
		Ok(())
	}
}
