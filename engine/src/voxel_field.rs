use crate::error::VoxelFieldError;
use bevy::prelude::*;
use density::Density;

/// Shape of a chunk's lattice.
///
/// A chunk of `chunk_width × chunk_height × chunk_width` units holds `resolution` cubes per
/// unit along each axis, and one more lattice point than cubes per axis so the cube lattice
/// closes at the chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldLayout {
	pub chunk_width: u32,
	pub chunk_height: u32,
	pub resolution: u32,
}

impl FieldLayout {
	pub fn new(chunk_width: u32, chunk_height: u32, resolution: u32) -> Self {
		Self { chunk_width, chunk_height, resolution }
	}

	/// Number of cubes along each axis
	pub fn cells(&self) -> UVec3 {
		UVec3::new(self.chunk_width, self.chunk_height, self.chunk_width) * self.resolution
	}

	/// Number of lattice points along each axis
	pub fn lattice(&self) -> UVec3 {
		self.cells() + UVec3::ONE
	}

	pub fn lattice_len(&self) -> usize {
		self.lattice().to_array().iter().map(|n| *n as usize).product()
	}

	pub fn cube_count(&self) -> usize {
		self.cells().to_array().iter().map(|n| *n as usize).product()
	}

	/// Row-major linear index: x slowest, z fastest.
	pub fn index(&self, p: UVec3) -> usize {
		let dims = self.lattice();
		((p.x as usize * dims.y as usize) + p.y as usize) * dims.z as usize + p.z as usize
	}

	/// Inclusive bounds check against the lattice.
	pub fn contains(&self, p: IVec3) -> bool {
		let cells = self.cells().as_ivec3();
		p.cmpge(IVec3::ZERO).all() && p.cmple(cells).all()
	}
}

/// A chunk's density samples.
///
/// Densities above zero are inside the surface. The field is populated once at creation,
/// edited in place, and never resized.
#[derive(Debug, Clone)]
pub struct VoxelField {
	layout: FieldLayout,
	origin: Vec3,
	densities: Vec<f32>,
}

impl VoxelField {
	/// A field of zero densities.
	pub fn new(layout: FieldLayout, origin: Vec3) -> Self {
		Self { layout, origin, densities: vec![0.0; layout.lattice_len()] }
	}

	/// A field populated from a generation strategy.
	pub fn generate<D: Density + ?Sized>(layout: FieldLayout, origin: Vec3, generator: &D) -> Self {
		let mut field = Self::new(layout, origin);
		field.populate(generator);
		field
	}

	/// Samples the generator at every lattice point's world position.
	pub fn populate<D: Density + ?Sized>(&mut self, generator: &D) {
		let start_time = std::time::Instant::now();
		let lattice = self.layout.lattice();

		for x in 0..lattice.x {
			for y in 0..lattice.y {
				for z in 0..lattice.z {
					let p = UVec3::new(x, y, z);
					let world = self.grid_to_world(p);
					let index = self.layout.index(p);
					self.densities[index] = generator.density_at(world.x, world.y, world.z);
				}
			}
		}

		log::debug!(
			"Populated {} samples at origin {:?} in {:?}",
			self.densities.len(),
			self.origin,
			start_time.elapsed()
		);
	}

	/// Sets every sample to the same density.
	pub fn fill(&mut self, value: f32) {
		self.densities.fill(value);
	}

	pub fn layout(&self) -> FieldLayout {
		self.layout
	}

	pub fn origin(&self) -> Vec3 {
		self.origin
	}

	/// The raw samples in row-major order, as uploaded to the compute kernel.
	pub fn densities(&self) -> &[f32] {
		&self.densities
	}

	/// Validated sample.
	pub fn sample(&self, p: IVec3) -> Result<f32, VoxelFieldError> {
		if !self.is_in_bounds(p) {
			return Err(VoxelFieldError::OutOfRange { position: p, lattice: self.layout.lattice() });
		}
		Ok(self.densities[self.layout.index(p.as_uvec3())])
	}

	/// Sample for positions produced by the cube walk.
	pub fn get(&self, p: UVec3) -> f32 {
		debug_assert!(self.is_in_bounds(p.as_ivec3()), "sample {:?} outside the lattice", p);
		self.densities[self.layout.index(p)]
	}

	/// Writes a sample in grid space. Returns whether anything was written.
	pub fn set(&mut self, p: IVec3, value: f32) -> bool {
		if !self.is_in_bounds(p) {
			return false;
		}
		let index = self.layout.index(p.as_uvec3());
		self.densities[index] = value;
		true
	}

	/// Writes the sample nearest to a world position.
	///
	/// Positions outside the field are ignored. Returns whether anything was written so
	/// the owning chunk can mark itself dirty.
	pub fn set_value(&mut self, world_pos: Vec3, value: f32) -> bool {
		self.set(self.world_to_grid(world_pos), value)
	}

	pub fn is_in_bounds(&self, p: IVec3) -> bool {
		self.layout.contains(p)
	}

	/// Nearest lattice point to a world position. Ties round to even.
	pub fn world_to_grid(&self, world_pos: Vec3) -> IVec3 {
		let scaled = (world_pos - self.origin) * self.layout.resolution as f32;
		IVec3::new(
			scaled.x.round_ties_even() as i32,
			scaled.y.round_ties_even() as i32,
			scaled.z.round_ties_even() as i32,
		)
	}

	pub fn grid_to_world(&self, p: UVec3) -> Vec3 {
		self.origin + p.as_vec3() / self.layout.resolution as f32
	}

	/// Snaps a local position onto the lattice.
	pub fn round_to_grid(&self, local: Vec3) -> Vec3 {
		let resolution = self.layout.resolution as f32;
		let scaled = local * resolution;
		Vec3::new(scaled.x.round_ties_even(), scaled.y.round_ties_even(), scaled.z.round_ties_even())
			/ resolution
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use density::ConstantDensity;

	fn layout() -> FieldLayout {
		FieldLayout::new(2, 3, 2)
	}

	#[test]
	fn test_layout_dimensions() {
		let layout = layout();

		assert_eq!(layout.cells(), UVec3::new(4, 6, 4));
		assert_eq!(layout.lattice(), UVec3::new(5, 7, 5));
		assert_eq!(layout.lattice_len(), 5 * 7 * 5);
		assert_eq!(layout.cube_count(), 4 * 6 * 4);
	}

	#[test]
	fn test_row_major_index() {
		let layout = layout();

		assert_eq!(layout.index(UVec3::ZERO), 0);
		assert_eq!(layout.index(UVec3::new(0, 0, 1)), 1);
		assert_eq!(layout.index(UVec3::new(0, 1, 0)), 5);
		assert_eq!(layout.index(UVec3::new(1, 0, 0)), 35);
		assert_eq!(layout.index(UVec3::new(4, 6, 4)), layout.lattice_len() - 1);
	}

	#[test]
	fn test_bounds_are_inclusive() {
		let field = VoxelField::new(layout(), Vec3::ZERO);

		assert!(field.is_in_bounds(IVec3::ZERO));
		assert!(field.is_in_bounds(IVec3::new(4, 6, 4)));
		assert!(!field.is_in_bounds(IVec3::new(5, 0, 0)));
		assert!(!field.is_in_bounds(IVec3::new(0, 7, 0)));
		assert!(!field.is_in_bounds(IVec3::new(0, 0, -1)));
	}

	#[test]
	fn test_sample_out_of_range() {
		let field = VoxelField::new(layout(), Vec3::ZERO);

		assert_eq!(field.sample(IVec3::new(1, 1, 1)), Ok(0.0));
		assert!(matches!(
			field.sample(IVec3::new(0, 8, 0)),
			Err(VoxelFieldError::OutOfRange { .. })
		));
	}

	#[test]
	fn test_populate_samples_world_positions() -> Result<(), VoxelFieldError> {
		let origin = Vec3::new(10.0, 0.0, -4.0);
		let field = VoxelField::generate(layout(), origin, &|x: f32, y: f32, z: f32| x + y * 100.0 + z * 10_000.0);

		// grid (2, 1, 3) at resolution 2 is world (11.0, 0.5, -2.5)
		let expected = 11.0 + 0.5 * 100.0 - 2.5 * 10_000.0;
		assert_eq!(field.sample(IVec3::new(2, 1, 3))?, expected);
		Ok(())
	}

	#[test]
	fn test_set_value_rounds_to_nearest_lattice_point() -> Result<(), VoxelFieldError> {
		let origin = Vec3::new(4.0, 0.0, 4.0);
		let mut field = VoxelField::generate(layout(), origin, &ConstantDensity(1.0));

		// local (0.8, 1.1, 0.2) scaled by 2 rounds to (2, 2, 0)
		assert!(field.set_value(Vec3::new(4.8, 1.1, 4.2), -3.0));
		assert_eq!(field.sample(IVec3::new(2, 2, 0))?, -3.0);
		Ok(())
	}

	#[test]
	fn test_set_value_outside_is_ignored() {
		let mut field = VoxelField::generate(layout(), Vec3::ZERO, &ConstantDensity(1.0));

		assert!(!field.set_value(Vec3::new(-1.0, 0.0, 0.0), -3.0));
		assert!(!field.set_value(Vec3::new(0.0, 50.0, 0.0), -3.0));
		assert!(field.densities().iter().all(|d| *d == 1.0));
	}

	#[test]
	fn test_round_to_grid() {
		let field = VoxelField::new(layout(), Vec3::ZERO);

		assert_eq!(field.round_to_grid(Vec3::new(0.3, 0.74, 1.26)), Vec3::new(0.5, 0.5, 1.5));
		// ties round to even lattice points
		assert_eq!(field.round_to_grid(Vec3::new(0.25, 0.75, 0.0)), Vec3::new(0.0, 1.0, 0.0));
	}
}
