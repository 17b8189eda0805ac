use crate::config::GenerationConfig;
use bevy::prelude::*;
use density::Density;
use noise::{NoiseFn, Perlin};

/// Horizontal scale applied to world coordinates before sampling the noise
const FREQUENCY: f64 = 1.5 / 16.0;

/// Keeps samples off the integer lattice, where Perlin noise is always zero
const LATTICE_OFFSET: f64 = 0.001;

/// Height-field terrain driven by 2D Perlin noise.
///
/// The heightfield `y = height(x, z)` becomes the density `f(p) = p.y - height(p.x, p.z)`,
/// so everything above the terrain surface samples positive.
pub struct PerlinHeightDensity {
	perlin: Perlin,
	config: GenerationConfig,
}

impl PerlinHeightDensity {
	pub fn new(config: GenerationConfig) -> Self {
		Self { perlin: Perlin::new(config.seed), config }
	}

	pub fn config(&self) -> &GenerationConfig {
		&self.config
	}

	/// Noise on the unit interval at a horizontal position
	pub fn noise_on_unit(&self, x: f32, z: f32) -> f32 {
		let sample = self.perlin.get([
			x as f64 * FREQUENCY + LATTICE_OFFSET,
			z as f64 * FREQUENCY + LATTICE_OFFSET,
		]);
		(sample * 0.5 + 0.5).clamp(0.0, 1.0) as f32
	}

	/// Terrain surface height at a horizontal position
	pub fn height_at(&self, x: f32, z: f32) -> f32 {
		self.config.height_range * self.noise_on_unit(x, z) + self.config.base_height
	}
}

impl Density for PerlinHeightDensity {
	fn density(&self, p: Vec3) -> f32 {
		p.y - self.height_at(p.x, p.z)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_height_stays_within_range() {
		let config = GenerationConfig { seed: 7, base_height: 4.0, height_range: 10.0 };
		let terrain = PerlinHeightDensity::new(config);

		for x in 0..32 {
			for z in 0..32 {
				let height = terrain.height_at(x as f32 * 0.7, z as f32 * 1.3);
				assert!((4.0..=14.0).contains(&height), "height {} out of range", height);
			}
		}
	}

	#[test]
	fn test_density_sign_follows_height() {
		let terrain = PerlinHeightDensity::new(GenerationConfig::default());
		let height = terrain.height_at(3.0, 9.0);

		assert!(terrain.density(Vec3::new(3.0, height + 1.0, 9.0)) > 0.0);
		assert!(terrain.density(Vec3::new(3.0, height - 1.0, 9.0)) < 0.0);
	}

	#[test]
	fn test_zero_range_is_flat() {
		let config = GenerationConfig { seed: 1, base_height: 5.0, height_range: 0.0 };
		let terrain = PerlinHeightDensity::new(config);

		assert_eq!(terrain.height_at(12.5, -3.0), 5.0);
		assert_eq!(terrain.density_at(0.0, 5.0, 0.0), 0.0);
	}
}
