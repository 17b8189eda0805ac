pub mod constant;
pub mod sphere;

pub use constant::ConstantDensity;
pub use sphere::SphereDensity;

use bevy::prelude::*;

/// Trait for scalar density fields sampled onto a voxel lattice.
///
/// The surface sits at density 0:
/// - Positive: inside the surface
/// - Zero or negative: outside the surface
///
/// Any `Fn(f32, f32, f32) -> f32` closure is a density, so generation strategies can be
/// swapped in without defining a type.
pub trait Density: Send + Sync {
	fn density(&self, p: Vec3) -> f32;

	/// Samples the field at separate coordinates, matching the `(x, y, z) -> density`
	/// signature generation strategies are usually written against.
	fn density_at(&self, x: f32, y: f32, z: f32) -> f32 {
		self.density(Vec3::new(x, y, z))
	}
}

impl<F> Density for F
where
	F: Fn(f32, f32, f32) -> f32 + Send + Sync,
{
	fn density(&self, p: Vec3) -> f32 {
		self(p.x, p.y, p.z)
	}
}
