use anyhow::Context;
use bevy::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use terrain_playground::engine::{ExecutionMode, TerrainConfig};
use terrain_playground::TerrainPlugin;

#[derive(Parser, Debug)]
#[command(name = "terrain-playground", about = "Marching cubes terrain viewer")]
struct Cli {
	/// TOML terrain config; defaults are used when omitted
	#[arg(long)]
	config: Option<PathBuf>,

	/// Overrides the generation seed
	#[arg(long)]
	seed: Option<u32>,

	/// Extract meshes on the GPU
	#[arg(long)]
	gpu: bool,
}

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let mut config = match &cli.config {
		Some(path) => TerrainConfig::load(path)
			.with_context(|| format!("failed to load terrain config {}", path.display()))?,
		None => TerrainConfig::default(),
	};
	if let Some(seed) = cli.seed {
		config.generation.seed = seed;
	}
	if cli.gpu {
		config.execution_mode = ExecutionMode::Gpu;
	}

	println!(
		"Starting terrain viewer with seed {} ({} extraction)",
		config.generation.seed, config.execution_mode
	);

	App::new()
		.add_plugins(DefaultPlugins.set(WindowPlugin {
			primary_window: Some(Window {
				title: "Terrain Viewer".to_string(),
				resolution: (1280, 720).into(),
				..default()
			}),
			..default()
		}))
		.add_plugins(TerrainPlugin { config })
		.run();

	Ok(())
}
