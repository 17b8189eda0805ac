use bevy::prelude::*;
use bevy::render::renderer::{RenderDevice, RenderQueue};
use std::f32::consts::PI;

mod camera;
mod editing;
mod render;

use engine::{
	ComputeBackend, ExecutionMode, KernelSource, RenderDeviceBackend, TerrainConfig, TerrainWorld,
};

pub use camera::CameraController;
pub use editing::paint_sphere;
pub use render::{BevyMeshSink, ChunkEntities, TerrainChunk};

pub use engine;

pub struct TerrainPlugin {
	pub config: TerrainConfig,
}

impl Plugin for TerrainPlugin {
	fn build(&self, app: &mut App) {
		app.insert_resource(self.config.clone())
			.insert_resource(ClearColor(Color::hsla(201.0, 0.69, 0.62, 1.0)))
			.init_resource::<ChunkEntities>()
			.add_systems(Startup, (start_terrain, camera::setup_camera, setup_lighting))
			.add_systems(
				Update,
				(camera::camera_controller, editing::edit_terrain, render::tick_terrain).chain(),
			);
	}
}

/// Builds the terrain from the config. A terrain that cannot start closes the app.
fn start_terrain(
	mut commands: Commands,
	config: Res<TerrainConfig>,
	device: Option<Res<RenderDevice>>,
	queue: Option<Res<RenderQueue>>,
	mut exit: MessageWriter<AppExit>,
) {
	let backend = match (config.execution_mode, device, queue) {
		(ExecutionMode::Gpu, Some(device), Some(queue)) => {
			match RenderDeviceBackend::new(
				RenderDevice::clone(&device),
				RenderQueue::clone(&queue),
				KernelSource::march_cubes(),
			) {
				Ok(backend) => Some(backend),
				Err(err) => {
					log::error!("Failed to build the marching cubes kernel: {}", err);
					exit.write(AppExit::error());
					return;
				}
			}
		}
		_ => None,
	};

	let backend = backend.as_ref().map(|backend| backend as &dyn ComputeBackend);
	match TerrainWorld::start(TerrainConfig::clone(&config), None, backend) {
		Ok(world) => commands.insert_resource(world),
		Err(err) => {
			log::error!("Failed to start terrain: {}", err);
			exit.write(AppExit::error());
		}
	}
}

fn setup_lighting(mut commands: Commands) {
	commands.insert_resource(AmbientLight {
		color: Color::WHITE,
		brightness: 400.0,
		affects_lightmapped_meshes: true,
	});

	// Sun
	commands.spawn((
		DirectionalLight { illuminance: 10000.0, shadows_enabled: true, ..default() },
		Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -PI / 4.0, PI / 4.0, 0.0)),
	));

	// Fill light from the opposite direction
	commands.spawn((
		DirectionalLight { illuminance: 1500.0, shadows_enabled: false, ..default() },
		Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, PI / 4.0, -PI / 4.0, 0.0)),
	));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sample_config_parses() -> Result<(), engine::ConfigError> {
		let config = TerrainConfig::from_toml_str(include_str!("../terrain.toml"))?.validated()?;

		assert_eq!(config.execution_mode, ExecutionMode::Cpu);
		assert_eq!(config.generation.seed, 12345);
		assert_eq!(config.field_layout(), TerrainConfig::default().field_layout());
		Ok(())
	}
}
