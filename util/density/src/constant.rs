use crate::Density;
use bevy::prelude::*;

/// The same density everywhere. A constant field never crosses the surface
/// unless it is exactly zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantDensity(pub f32);

impl Density for ConstantDensity {
	fn density(&self, _p: Vec3) -> f32 {
		self.0
	}
}
