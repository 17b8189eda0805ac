use crate::error::ConfigError;
use crate::voxel_field::FieldLayout;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use terrain_density::GenerationConfig;

/// Where chunk meshes are extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
	/// Synchronous marching cubes on the calling thread
	#[default]
	Cpu,
	/// Compute dispatch with an asynchronous readback
	Gpu,
}

impl std::fmt::Display for ExecutionMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExecutionMode::Cpu => write!(f, "CPU"),
			ExecutionMode::Gpu => write!(f, "GPU"),
		}
	}
}

/// Terrain layout and generation settings.
///
/// Loaded from TOML. Missing keys fall back to [`TerrainConfig::default`].
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
	/// Horizontal size of a chunk in world units
	pub chunk_width: u32,
	/// Vertical size of a chunk in world units
	pub chunk_height: u32,
	/// Chunks per side of the square grid
	pub amount_of_chunks: u32,
	/// Lattice points per world unit along each axis
	pub pixels_per_unit: i32,
	pub execution_mode: ExecutionMode,
	/// World position of the terrain's minimum corner
	pub origin: [f32; 3],
	pub generation: GenerationConfig,
}

impl Default for TerrainConfig {
	fn default() -> Self {
		Self {
			chunk_width: 16,
			chunk_height: 32,
			amount_of_chunks: 4,
			pixels_per_unit: 1,
			execution_mode: ExecutionMode::Cpu,
			origin: [0.0; 3],
			generation: GenerationConfig::default(),
		}
	}
}

impl TerrainConfig {
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let source = std::fs::read_to_string(path.as_ref())?;
		Self::from_toml_str(&source)
	}

	/// Normalizes the config for use.
	///
	/// A resolution below 1 is raised to 1 with a warning. Zero-sized chunks or grids are
	/// rejected.
	pub fn validated(mut self) -> Result<Self, ConfigError> {
		if self.pixels_per_unit < 1 {
			log::warn!(
				"pixels_per_unit must be at least 1 (got {}); falling back to 1",
				self.pixels_per_unit
			);
			self.pixels_per_unit = 1;
		}

		if self.chunk_width == 0 || self.chunk_height == 0 {
			return Err(ConfigError::Invalid(format!(
				"chunk dimensions must be positive, got {}x{}",
				self.chunk_width, self.chunk_height
			)));
		}

		if self.amount_of_chunks == 0 {
			return Err(ConfigError::Invalid("amount_of_chunks must be positive".to_string()));
		}

		Ok(self)
	}

	/// Resolution as an unsigned scale. Only meaningful after [`TerrainConfig::validated`].
	pub fn resolution(&self) -> u32 {
		self.pixels_per_unit.max(1) as u32
	}

	pub fn field_layout(&self) -> FieldLayout {
		FieldLayout::new(self.chunk_width, self.chunk_height, self.resolution())
	}

	pub fn origin(&self) -> Vec3 {
		Vec3::from_array(self.origin)
	}

	/// Horizontal extent of the whole terrain in world units
	pub fn terrain_width(&self) -> f32 {
		(self.chunk_width * self.amount_of_chunks) as f32
	}
}
