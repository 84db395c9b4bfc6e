//! Error types for the load-time paths.
//!
//! Per-frame execution performs no fallible work by design: every index a
//! record can reference is proven valid by [`crate::record::DependencySet::
//! validate`] before the set is installed, and backend frame calls are
//! infallible by contract.

use std::path::PathBuf;

use crate::device::{CopyRegion, ShaderStage};
use crate::handle::ResourceKind;
use crate::record::Phase;

/// Failure reported by a backend creation call.
#[derive(Clone, Debug, thiserror::Error)]
#[error("backend device: {0}")]
pub struct DeviceError(pub String);

/// Fatal realization failures.
///
/// Shader, buffer and input-layout creation failures abort the whole load;
/// texture, sampler and view failures are logged per entry and leave a null
/// handle instead (the dependency that later binds the null slot degrades
/// silently).
#[derive(Debug, thiserror::Error)]
pub enum RealizeError {
    #[error("shader {index} ({name}): {source}")]
    ShaderCreate {
        index: u32,
        name: String,
        #[source]
        source: DeviceError,
    },
    #[error("buffer {index}: {source}")]
    BufferCreate {
        index: u32,
        #[source]
        source: DeviceError,
    },
    #[error("buffer {index}: content file {path}: {message}")]
    BufferContent {
        index: u32,
        path: PathBuf,
        message: String,
    },
    #[error("input layout {index}: {source}")]
    InputLayoutCreate {
        index: u32,
        #[source]
        source: DeviceError,
    },
    #[error("input layout {index} references shader {shader} that was not realized")]
    InputLayoutShader { index: u32, shader: u32 },
}

/// Install-time validation failures for a dependency set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    #[error("{phase:?} record {record}: {kind:?} index {index} out of range (table len {len})")]
    IndexOutOfRange {
        phase: Phase,
        record: usize,
        kind: ResourceKind,
        index: u32,
        len: u32,
    },
    #[error(
        "{phase:?} record {record}: update payload of {size} bytes exceeds destination buffer ({dst_size} bytes)"
    )]
    UpdateTooLarge {
        phase: Phase,
        record: usize,
        size: u32,
        dst_size: u32,
    },
    #[error(
        "{phase:?} record {record}: update region {region:?} exceeds destination extent {max_x}x{max_y}x{max_z}"
    )]
    RegionOutOfBounds {
        phase: Phase,
        record: usize,
        region: CopyRegion,
        max_x: u32,
        max_y: u32,
        max_z: u32,
    },
}

/// Failure reported by the mesh/animation import collaborator.
#[derive(Clone, Debug, thiserror::Error)]
#[error("import {path}: {message}")]
pub struct ImportError {
    pub path: PathBuf,
    pub message: String,
}

/// Failure reported by the shader-compilation collaborator.
#[derive(Clone, Debug, thiserror::Error)]
#[error("shader build {path} ({entry}, {stage}): {message}")]
pub struct ShaderBuildError {
    pub path: PathBuf,
    pub entry: String,
    pub stage: ShaderStage,
    pub message: String,
}

/// Instance-to-dependency compilation failures.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    ShaderBuild(#[from] ShaderBuildError),
    #[error("mesh '{mesh}' not found in {path}")]
    MeshNotFound { path: PathBuf, mesh: String },
    #[error("animation clip '{clip}' not found in {path}")]
    ClipNotFound { path: PathBuf, clip: String },
    #[error("{path} has no bone hierarchy; skinning requires one")]
    SkeletonMissing { path: PathBuf },
    #[error("mesh '{mesh}' carries no bone indices/weights; it cannot be skinned")]
    MeshNotSkinnable { mesh: String },
    #[error("shader {path} was rejected at reservation (stage tag '{tag}')")]
    ShaderDropped { path: PathBuf, tag: char },
    #[error("instance '{name}' enables no vertex stage")]
    MissingVertexStage { name: String },
    #[error("instance '{instance}' binds {what}, which this instance does not produce")]
    WellKnownUnavailable {
        instance: String,
        what: &'static str,
    },
    #[error(transparent)]
    Realize(#[from] RealizeError),
    #[error(transparent)]
    Validate(#[from] ValidateError),
}
