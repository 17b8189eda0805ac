use crate::Density;
use bevy::prelude::*;

/// A solid sphere: positive inside, negative outside
pub struct SphereDensity {
	pub center: Vec3,
	pub radius: f32,
}

impl SphereDensity {
	pub fn new(center: Vec3, radius: f32) -> Self {
		Self { center, radius }
	}
}

impl Density for SphereDensity {
	fn density(&self, p: Vec3) -> f32 {
		self.radius - (p - self.center).length()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sphere_sign() {
		let sphere = SphereDensity::new(Vec3::new(1.0, 1.0, 1.0), 2.0);

		assert!(sphere.density(Vec3::new(1.0, 1.0, 1.0)) > 0.0);
		assert_eq!(sphere.density(Vec3::new(3.0, 1.0, 1.0)), 0.0);
		assert!(sphere.density(Vec3::new(4.0, 1.0, 1.0)) < 0.0);
	}
}
