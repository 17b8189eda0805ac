use crate::error::GpuError;
use crate::gpu::backend::{
	triangle_capacity, ChunkKernel, ComputeBackend, KernelParams, WORKGROUP_SIZE,
};
use crate::gpu::readback::{clamp_count, readback_channel, Readback, ReadbackSender};
use crate::marching_cubes::march_cube;
use crate::mesh::Triangle;
use crate::voxel_field::FieldLayout;
use bevy::prelude::*;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;

/// A dispatch waiting for its device timeline to advance.
struct Job {
	densities: Vec<f32>,
	params: KernelParams,
	workgroups: UVec3,
	capacity: usize,
	sender: ReadbackSender,
}

impl Job {
	/// Runs the kernel once per invocation of the dispatch grid, appending triangles the way
	/// the device does through its atomic counter.
	fn run(&self) -> Vec<Triangle> {
		let layout = self.params.layout();
		let cells = layout.cells();
		let resolution = layout.resolution as f32;
		let grid = self.workgroups * WORKGROUP_SIZE;

		let mut triangles: Vec<Triangle> = (0..grid.x * grid.y * grid.z)
			.into_par_iter()
			.flat_map_iter(|invocation| {
				let id = UVec3::new(
					invocation / (grid.y * grid.z),
					(invocation / grid.z) % grid.y,
					invocation % grid.z,
				);
				let mut appended = Vec::new();
				if id.cmplt(cells).all() {
					march_cube(|p| self.densities[layout.index(p)], id, resolution, |[a, b, c]| {
						appended.push(Triangle::new(a, b, c))
					});
				}
				appended
			})
			.collect();

		triangles.truncate(clamp_count(triangles.len(), self.capacity));
		triangles
	}
}

/// Runs the marching cubes kernel on the CPU with device-like completion.
///
/// Dispatches queue up and only complete when [`SoftwareBackend::complete_pending`] is called,
/// standing in for the device timeline advancing between frames.
#[derive(Clone, Default)]
pub struct SoftwareBackend {
	queue: Arc<Mutex<VecDeque<Job>>>,
}

impl SoftwareBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Dispatches not yet completed
	pub fn pending(&self) -> usize {
		self.queue.lock().len()
	}

	/// Runs every queued dispatch and delivers its readback. Returns how many completed.
	pub fn complete_pending(&self) -> usize {
		let jobs: Vec<Job> = self.queue.lock().drain(..).collect();
		let completed = jobs.len();
		for job in jobs {
			let triangles = job.run();
			job.sender.complete(Ok(triangles));
		}
		completed
	}

	/// Fails every queued dispatch, as a lost device would.
	pub fn fail_pending(&self, reason: &str) -> usize {
		let jobs: Vec<Job> = self.queue.lock().drain(..).collect();
		let failed = jobs.len();
		for job in jobs {
			job.sender.complete(Err(GpuError::Readback(reason.to_string())));
		}
		failed
	}
}

impl ComputeBackend for SoftwareBackend {
	fn name(&self) -> &'static str {
		"software"
	}

	fn allocate(&self, layout: &FieldLayout) -> Result<Box<dyn ChunkKernel>, GpuError> {
		Ok(Box::new(SoftwareKernel {
			capacity: triangle_capacity(layout),
			queue: self.queue.clone(),
		}))
	}
}

pub struct SoftwareKernel {
	capacity: usize,
	queue: Arc<Mutex<VecDeque<Job>>>,
}

impl ChunkKernel for SoftwareKernel {
	fn dispatch(
		&mut self,
		densities: &[f32],
		params: &KernelParams,
		workgroups: UVec3,
	) -> Result<Readback, GpuError> {
		let (sender, readback) = readback_channel();
		self.queue.lock().push_back(Job {
			densities: densities.to_vec(),
			params: *params,
			workgroups,
			capacity: self.capacity,
			sender,
		});
		Ok(readback)
	}

	fn capacity(&self) -> usize {
		self.capacity
	}
}
