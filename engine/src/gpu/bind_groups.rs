// =================================================================================================
// BIND GROUP HELPERS
// =================================================================================================

use bevy::render::{render_resource::*, renderer::RenderDevice};

pub fn uniform_layout_entry(binding: u32) -> BindGroupLayoutEntry {
	BindGroupLayoutEntry {
		binding,
		visibility: ShaderStages::COMPUTE,
		ty: BindingType::Buffer {
			ty: BufferBindingType::Uniform,
			has_dynamic_offset: false,
			min_binding_size: None,
		},
		count: None,
	}
}

pub fn storage_layout_entry(binding: u32, read_only: bool) -> BindGroupLayoutEntry {
	BindGroupLayoutEntry {
		binding,
		visibility: ShaderStages::COMPUTE,
		ty: BindingType::Buffer {
			ty: BufferBindingType::Storage { read_only },
			has_dynamic_offset: false,
			min_binding_size: None,
		},
		count: None,
	}
}

/// Layout of the marching cubes kernel's group 0.
pub fn march_cubes_layout(device: &RenderDevice) -> BindGroupLayout {
	device.create_bind_group_layout(
		Some("march_cubes_layout"),
		&[
			uniform_layout_entry(0),        // params
			storage_layout_entry(1, true),  // densities
			storage_layout_entry(2, true),  // triangulation table
			storage_layout_entry(3, false), // triangles
			storage_layout_entry(4, false), // triangle counter
		],
	)
}

/// Binds `buffers` in order: binding 0, 1, 2, ...
pub fn bind_in_order(
	device: &RenderDevice,
	label: &str,
	layout: &BindGroupLayout,
	buffers: &[&Buffer],
) -> BindGroup {
	let entries: Vec<BindGroupEntry> = buffers
		.iter()
		.enumerate()
		.map(|(i, buffer)| BindGroupEntry {
			binding: i as u32,
			resource: BindingResource::Buffer(BufferBinding { buffer, offset: 0, size: None }),
		})
		.collect();
	device.create_bind_group(Some(label), layout, &entries)
}
