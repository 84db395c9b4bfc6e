//! The backend seam: everything the engine asks of a graphics device.
//!
//! The engine itself is backend-agnostic bookkeeping; the only touchpoints
//! with a real graphics API are the creation calls (one per resource kind)
//! and the per-frame bind/draw/dispatch/copy calls collected in the
//! [`GpuDevice`] trait. A production backend wraps a D3D11/wgpu device;
//! tests use [`crate::trace::TraceDevice`], which records every call.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::error::DeviceError;

/// Opaque backend object handle.
///
/// `0` is reserved as the null handle; binding it to a slot unbinds that
/// slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u64);

impl DeviceHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Shader stages addressable by bindings and shader reservations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
}

impl ShaderStage {
    /// Draw-pipeline stages, in the order a draw record stores and the
    /// executor binds them.
    pub const DRAW_ORDER: [ShaderStage; 5] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
    ];

    /// Parses the single-letter stage tag attached to compiled shader blobs
    /// by the shader-compilation collaborator.
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'v' | 'V' => Some(Self::Vertex),
            'p' | 'P' => Some(Self::Pixel),
            'g' | 'G' => Some(Self::Geometry),
            'h' | 'H' => Some(Self::Hull),
            'd' | 'D' => Some(Self::Domain),
            'c' | 'C' => Some(Self::Compute),
            _ => None,
        }
    }

    pub const fn tag(self) -> char {
        match self {
            Self::Vertex => 'v',
            Self::Pixel => 'p',
            Self::Geometry => 'g',
            Self::Hull => 'h',
            Self::Domain => 'd',
            Self::Compute => 'c',
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Pixel => write!(f, "pixel"),
            ShaderStage::Geometry => write!(f, "geometry"),
            ShaderStage::Hull => write!(f, "hull"),
            ShaderStage::Domain => write!(f, "domain"),
            ShaderStage::Compute => write!(f, "compute"),
        }
    }
}

bitflags! {
    /// Buffer bind/usage capabilities requested at creation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX    = 1 << 0;
        const INDEX     = 1 << 1;
        const CONSTANT  = 1 << 2;
        /// Bindable as a structured/raw view (SRV or UAV source).
        const STORAGE   = 1 << 3;
        const INDIRECT  = 1 << 4;
        const COPY_SRC  = 1 << 5;
        const COPY_DST  = 1 << 6;
    }
}

bitflags! {
    /// Texture bind/usage capabilities requested at creation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const SAMPLED       = 1 << 0;
        const STORAGE       = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const COPY_SRC      = 1 << 3;
        const COPY_DST      = 1 << 4;
    }
}

/// Texel/element formats used by textures, views and vertex attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    R16Uint,
    Rgba16Uint,
    Rgba16Float,
    R32Uint,
    R32Float,
    Rg32Float,
    Rgb32Float,
    Rgba32Float,
}

impl Format {
    pub const fn bytes_per_element(self) -> u32 {
        match self {
            Format::Rgba8Unorm | Format::Rgba8UnormSrgb | Format::Bgra8Unorm => 4,
            Format::R16Uint => 2,
            Format::Rgba16Uint | Format::Rgba16Float => 8,
            Format::R32Uint | Format::R32Float => 4,
            Format::Rg32Float => 8,
            Format::Rgb32Float => 12,
            Format::Rgba32Float => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
    Anisotropic,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressMode {
    #[default]
    Wrap,
    Clamp,
    Mirror,
    Border,
}

/// Sampler creation parameters.
///
/// Structural equality over this whole struct is the sampler deduplication
/// key, so every field must stay `Eq + Hash`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub max_anisotropy: u8,
}

/// Buffer creation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub size_bytes: u32,
    /// Element stride for structured access; `0` for unstructured buffers.
    pub stride_bytes: u32,
    pub usage: BufferUsage,
}

/// 2D texture creation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: Format,
    pub usage: TextureUsage,
    /// Byte pitch of one row of the initial payload, if any.
    pub row_pitch_bytes: u32,
}

/// Shape of a shader-visible view over a buffer or texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewShape {
    /// Structured buffer view: `element_count` elements of `stride_bytes`.
    Structured {
        stride_bytes: u32,
        element_count: u32,
    },
    /// Raw byte-address buffer view.
    Raw { size_bytes: u32 },
    /// Texture view over mip 0 of a 2D texture.
    Texture2d { format: Format },
}

/// A 3D box selecting a sub-region of a subresource.
///
/// For buffers only `x..x + width` (in bytes) is meaningful; `y`/`z` extents
/// must describe a single row/slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct CopyRegion {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// CPU-side layout of a dispatch-indirect argument triple, for callers that
/// fill indirect buffers themselves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DispatchIndirectArgs {
    pub group_count_x: u32,
    pub group_count_y: u32,
    pub group_count_z: u32,
}

/// Vertex attribute semantics understood by the mesh-import collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexSemantic {
    Position,
    Normal,
    Tangent,
    Binormal,
    TexCoord(u8),
    BoneIndices,
    BoneWeights,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub semantic: VertexSemantic,
    pub format: Format,
    pub offset_bytes: u32,
}

/// Input-layout creation parameters; doubles as the structural "vertex
/// layout shape" key for layout deduplication.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InputLayoutDesc {
    pub attributes: Vec<VertexAttribute>,
    pub stride_bytes: u32,
}

/// Everything the engine asks of a backend device.
///
/// Creation calls run during realization (load time) and may fail; frame
/// calls replay validated dependency records and are infallible by contract
/// (a backend that can fail mid-frame should surface that out of band).
pub trait GpuDevice {
    // Creation (realize-time).
    fn create_shader(
        &mut self,
        stage: ShaderStage,
        blob: &[u8],
        debug_name: &str,
    ) -> Result<DeviceHandle, DeviceError>;
    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<DeviceHandle, DeviceError>;
    fn create_texture2d(
        &mut self,
        desc: &TextureDesc,
        initial: Option<&[u8]>,
    ) -> Result<DeviceHandle, DeviceError>;
    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        initial: Option<&[u8]>,
    ) -> Result<DeviceHandle, DeviceError>;
    fn create_srv(
        &mut self,
        source: DeviceHandle,
        shape: &ViewShape,
    ) -> Result<DeviceHandle, DeviceError>;
    fn create_uav(
        &mut self,
        source: DeviceHandle,
        shape: &ViewShape,
    ) -> Result<DeviceHandle, DeviceError>;
    fn create_input_layout(
        &mut self,
        desc: &InputLayoutDesc,
        vertex_shader_blob: &[u8],
    ) -> Result<DeviceHandle, DeviceError>;

    // Frame (execute-time).
    fn set_input_layout(&mut self, layout: DeviceHandle);
    fn set_vertex_buffer(&mut self, buffer: DeviceHandle, stride_bytes: u32, offset_bytes: u32);
    fn set_index_buffer(&mut self, buffer: DeviceHandle, format: IndexFormat, offset_bytes: u32);
    fn set_topology(&mut self, topology: Topology);
    fn set_shader(&mut self, stage: ShaderStage, shader: DeviceHandle);
    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        first_slot: u32,
        buffers: &[DeviceHandle],
    );
    fn set_samplers(&mut self, stage: ShaderStage, first_slot: u32, samplers: &[DeviceHandle]);
    fn set_srvs(&mut self, stage: ShaderStage, first_slot: u32, views: &[DeviceHandle]);
    fn set_uavs(
        &mut self,
        stage: ShaderStage,
        first_slot: u32,
        views: &[DeviceHandle],
        initial_counts: &[u32],
    );
    fn draw(&mut self, vertex_count: u32, first_vertex: u32);
    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32);
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_indirect(&mut self, args_buffer: DeviceHandle, offset_bytes: u32);
    fn copy_resource(&mut self, src: DeviceHandle, dst: DeviceHandle);
    #[allow(clippy::too_many_arguments)]
    fn update_subresource(
        &mut self,
        dst: DeviceHandle,
        subresource: u32,
        region: Option<CopyRegion>,
        data: &[u8],
        row_pitch_bytes: u32,
        depth_pitch_bytes: u32,
    );
}
