use serde::{Deserialize, Serialize};

/// Parameters of the default height-field terrain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
	/// Seed for the Perlin permutation table
	pub seed: u32,
	/// Height the terrain would have if the range were 0
	pub base_height: f32,
	/// Distance between the lowest and the highest point of the terrain
	pub height_range: f32,
}

impl Default for GenerationConfig {
	fn default() -> Self {
		Self { seed: 0, base_height: 8.0, height_range: 12.0 }
	}
}
