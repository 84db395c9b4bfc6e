//! `renderlink` is a data-driven resource and dependency engine for a
//! D3D11-class rendering backend.
//!
//! The crate is built around two load-time/run-time splits:
//! - Resources go through two phases: reservation into an append-only
//!   [`DescriptorTable`] (stable per-kind indices, no device needed) and
//!   realization into backend objects (see [`realize`]).
//! - Per-frame GPU work is described as [`DependencyRecord`] data, emitted
//!   once by the instance compiler (see [`compile`]) and replayed every frame
//!   by the allocation-free [`Executor`].
//!
//! The backend itself sits behind the [`GpuDevice`] trait; [`TraceDevice`]
//! is a recording implementation used throughout the test suite.

pub mod compile;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod execute;
pub mod geometry;
pub mod handle;
pub mod realize;
pub mod record;
pub mod trace;

pub use compile::{CompiledScene, Compiler, RenderInstanceDesc, ShaderCatalog};
pub use context::{ExecutionContext, FrameState, ScratchCapacity};
pub use descriptor::{ContentProducer, ContentSource, DescriptorTable};
pub use device::{DeviceHandle, GpuDevice, ShaderStage};
pub use error::{CompileError, DeviceError, RealizeError, ValidateError};
pub use execute::{ExecMetrics, Executor};
pub use realize::{RealizedResources, Realizer};
pub use record::{DependencyRecord, DependencySet, Phase, UpdateProducer, UpdateRegion};
pub use trace::{DeviceCall, TraceDevice};
