use crate::voxel_field::FieldLayout;
use bevy::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VoxelFieldError {
	#[error("lattice position {position} is outside the field {lattice}")]
	OutOfRange { position: IVec3, lattice: UVec3 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read terrain config: {0}")]
	Io(#[from] std::io::Error),
	#[error("failed to parse terrain config: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("invalid terrain config: {0}")]
	Invalid(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GpuError {
	#[error("compute kernel entry point `{0}` not found")]
	MissingEntryPoint(String),
	#[error("triangle readback failed: {0}")]
	Readback(String),
	#[error("triangle readback was dropped before it completed")]
	ReadbackDisconnected,
	#[error("field layout {actual:?} does not match the kernel's buffers {expected:?}")]
	LayoutMismatch { expected: FieldLayout, actual: FieldLayout },
}

#[derive(Debug, Error)]
pub enum EngineError {
	#[error(transparent)]
	Config(#[from] ConfigError),
	#[error(transparent)]
	VoxelField(#[from] VoxelFieldError),
	#[error(transparent)]
	Gpu(#[from] GpuError),
	#[error("GPU execution selected but no compute backend was provided")]
	ComputeBackendUnavailable,
}
