// =================================================================================================
// RENDER DEVICE BACKEND
// =================================================================================================
// Runs the marching cubes kernel on Bevy's render device.
//
// The pipeline and the triangulation table are created once and shared. Every chunk owns its
// own params, densities, triangles, counter and staging buffers, sized at allocation. A dispatch
// copies the counter and the triangle records into the staging buffer and maps it
// asynchronously; the map callback fires on a later `queue.submit` and delivers the decoded
// triangles through the chunk's readback channel.

use crate::error::GpuError;
use crate::gpu::backend::{
	triangle_capacity, ChunkKernel, ComputeBackend, KernelParams, KernelSource,
	READBACK_HEADER_BYTES,
};
use crate::gpu::bind_groups::{bind_in_order, march_cubes_layout};
use crate::gpu::readback::{decode_triangles, readback_channel, Readback};
use crate::marching_cubes::flattened_triangulations;
use crate::mesh::Triangle;
use crate::voxel_field::FieldLayout;
use bevy::{
	prelude::*,
	render::{
		render_resource::*,
		renderer::{RenderDevice, RenderQueue},
	},
};
use std::borrow::Cow;

const COUNTER_BYTES: u64 = std::mem::size_of::<u32>() as u64;

pub struct RenderDeviceBackend {
	device: RenderDevice,
	queue: RenderQueue,
	pipeline: ComputePipeline,
	layout: BindGroupLayout,
	triangulation: Buffer,
}

impl RenderDeviceBackend {
	/// Compiles the kernel and uploads the triangulation table.
	///
	/// Fails if `source` does not declare its entry point.
	pub fn new(
		device: RenderDevice,
		queue: RenderQueue,
		source: KernelSource,
	) -> Result<Self, GpuError> {
		source.validate()?;
		let start_time = std::time::Instant::now();

		let layout = march_cubes_layout(&device);
		let module = device.create_and_validate_shader_module(ShaderModuleDescriptor {
			label: Some("march_cubes_shader"),
			source: ShaderSource::Wgsl(Cow::Borrowed(source.source)),
		});
		let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
			label: Some("march_cubes_pipeline_layout"),
			bind_group_layouts: &[&*layout],
			push_constant_ranges: &[],
		});
		let pipeline = device.create_compute_pipeline(&RawComputePipelineDescriptor {
			label: Some("march_cubes_pipeline"),
			layout: Some(&pipeline_layout),
			module: &module,
			entry_point: Some(source.entry_point),
			compilation_options: PipelineCompilationOptions::default(),
			cache: None,
		});

		let triangulation = device.create_buffer_with_data(&BufferInitDescriptor {
			label: Some("march_cubes_triangulation"),
			contents: bytemuck::cast_slice(&flattened_triangulations()),
			usage: BufferUsages::STORAGE,
		});

		log::debug!("Built marching cubes pipeline in {:?}", start_time.elapsed());

		Ok(Self { device, queue, pipeline, layout, triangulation })
	}

	fn new_buffer(&self, label: &str, size: u64, usage: BufferUsages) -> Buffer {
		self.device.create_buffer(&BufferDescriptor {
			label: Some(label),
			size,
			usage,
			mapped_at_creation: false,
		})
	}
}

impl ComputeBackend for RenderDeviceBackend {
	fn name(&self) -> &'static str {
		"render device"
	}

	fn allocate(&self, layout: &FieldLayout) -> Result<Box<dyn ChunkKernel>, GpuError> {
		let capacity = triangle_capacity(layout);
		let triangle_bytes = (capacity * std::mem::size_of::<Triangle>()) as u64;
		let density_bytes = (layout.lattice_len() * std::mem::size_of::<f32>()) as u64;

		let params = self.device.create_buffer_with_data(&BufferInitDescriptor {
			label: Some("march_cubes_params"),
			contents: bytemuck::bytes_of(&KernelParams::new(layout)),
			usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
		});
		let densities = self.new_buffer(
			"march_cubes_densities",
			density_bytes,
			BufferUsages::STORAGE | BufferUsages::COPY_DST,
		);
		let triangles = self.new_buffer(
			"march_cubes_triangles",
			triangle_bytes,
			BufferUsages::STORAGE | BufferUsages::COPY_SRC,
		);
		let counter = self.new_buffer(
			"march_cubes_counter",
			COUNTER_BYTES,
			BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
		);
		let staging = self.new_buffer(
			"march_cubes_staging",
			READBACK_HEADER_BYTES as u64 + triangle_bytes,
			BufferUsages::MAP_READ | BufferUsages::COPY_DST,
		);

		let bind_group = bind_in_order(
			&self.device,
			"march_cubes_bind_group",
			&self.layout,
			&[&params, &densities, &self.triangulation, &triangles, &counter],
		);

		Ok(Box::new(RenderDeviceKernel {
			device: self.device.clone(),
			queue: self.queue.clone(),
			pipeline: self.pipeline.clone(),
			bind_group,
			params,
			densities,
			triangles,
			counter,
			staging,
			capacity,
		}))
	}
}

struct RenderDeviceKernel {
	device: RenderDevice,
	queue: RenderQueue,
	pipeline: ComputePipeline,
	bind_group: BindGroup,
	params: Buffer,
	densities: Buffer,
	triangles: Buffer,
	counter: Buffer,
	staging: Buffer,
	capacity: usize,
}

impl ChunkKernel for RenderDeviceKernel {
	fn dispatch(
		&mut self,
		densities: &[f32],
		params: &KernelParams,
		workgroups: UVec3,
	) -> Result<Readback, GpuError> {
		self.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(params));
		self.queue.write_buffer(&self.densities, 0, bytemuck::cast_slice(densities));
		self.queue.write_buffer(&self.counter, 0, bytemuck::bytes_of(&0u32));

		let mut encoder = self
			.device
			.create_command_encoder(&CommandEncoderDescriptor { label: Some("march_cubes_encoder") });
		{
			let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor::default());
			pass.set_pipeline(&self.pipeline);
			pass.set_bind_group(0, &self.bind_group, &[]);
			pass.dispatch_workgroups(workgroups.x, workgroups.y, workgroups.z);
		}
		encoder.copy_buffer_to_buffer(&self.counter, 0, &self.staging, 0, COUNTER_BYTES);
		encoder.copy_buffer_to_buffer(
			&self.triangles,
			0,
			&self.staging,
			READBACK_HEADER_BYTES as u64,
			self.triangles.size(),
		);
		self.queue.submit(std::iter::once(encoder.finish()));

		// The callback owns its own handle to the staging buffer, so the chunk can be dropped
		// while the map is pending.
		let (sender, readback) = readback_channel();
		let staging = self.staging.clone();
		let capacity = self.capacity;
		self.staging.slice(..).map_async(MapMode::Read, move |result| {
			let decoded = match result {
				Ok(()) => {
					let decoded = {
						let bytes = staging.slice(..).get_mapped_range();
						decode_triangles(&bytes, capacity)
					};
					staging.unmap();
					decoded
				}
				Err(err) => Err(GpuError::Readback(err.to_string())),
			};
			sender.complete(decoded);
		});

		Ok(readback)
	}

	fn capacity(&self) -> usize {
		self.capacity
	}
}
