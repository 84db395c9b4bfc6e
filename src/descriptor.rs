//! Resource descriptors and the append-only descriptor table.
//!
//! Reservation is phase one of the two-phase resource model: loaders append
//! creation parameters here and get back a stable per-kind index long before
//! a device exists. Phase two ([`crate::realize`]) turns every entry into a
//! backend object in one dependency-ordered pass.

use std::fmt;
use std::path::PathBuf;

use tracing::warn;

use crate::context::FrameState;
use crate::device::{
    BufferDesc, InputLayoutDesc, SamplerDesc, ShaderStage, TextureDesc, ViewShape,
};
use crate::handle::{BufferId, LayoutId, SamplerId, ShaderId, SrvId, TextureId, UavId};

/// Realize-time content producer.
///
/// Fires exactly once, immediately before its buffer/texture is created, into
/// a scratch byte buffer owned by the realizer. This is the late-binding hook
/// for payloads that depend on state not known at reservation time (the
/// classic case: a bind-pose buffer whose size depends on a bone count).
///
/// Per-frame updates use [`crate::record::UpdateProducer`] instead; the two
/// call sites are deliberately separate types.
pub struct ContentProducer {
    size_bytes: u32,
    fill: Box<dyn Fn(&FrameState, &mut [u8])>,
}

impl ContentProducer {
    pub fn new(size_bytes: u32, fill: impl Fn(&FrameState, &mut [u8]) + 'static) -> Self {
        Self {
            size_bytes,
            fill: Box::new(fill),
        }
    }

    /// Producer that copies a fixed payload captured at reservation time.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u32;
        Self::new(size, move |_, out| out.copy_from_slice(&bytes))
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn fill(&self, frame: &FrameState, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.size_bytes as usize);
        (self.fill)(frame, out);
    }
}

impl fmt::Debug for ContentProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentProducer")
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Where a buffer's/texture's initial payload comes from at realize time.
#[derive(Debug, Default)]
pub enum ContentSource {
    /// Created without initial data.
    #[default]
    None,
    /// Eagerly supplied payload.
    Bytes(Vec<u8>),
    /// Raw payload read from disk immediately before creation.
    File(PathBuf),
    /// Late-bound payload produced immediately before creation.
    Producer(ContentProducer),
}

#[derive(Debug)]
pub struct ShaderReservation {
    pub stage: ShaderStage,
    pub blob: Vec<u8>,
    pub debug_name: String,
}

#[derive(Debug)]
pub struct BufferReservation {
    pub desc: BufferDesc,
    pub content: ContentSource,
}

#[derive(Debug)]
pub struct TextureReservation {
    pub desc: TextureDesc,
    pub content: ContentSource,
}

/// What a view reads from or writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewSource {
    Buffer(BufferId),
    Texture(TextureId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SrvReservation {
    pub source: ViewSource,
    pub shape: ViewShape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UavReservation {
    pub source: ViewSource,
    pub shape: ViewShape,
}

#[derive(Clone, Debug)]
pub struct LayoutReservation {
    /// Vertex shader whose input signature the layout is validated against.
    pub shader: ShaderId,
    pub desc: InputLayoutDesc,
}

/// Append-only table of reservations, one growable sequence per kind.
///
/// Insertion order defines the index; indices are never reused or
/// renumbered. Single load thread only.
#[derive(Debug, Default)]
pub struct DescriptorTable {
    shaders: Vec<ShaderReservation>,
    samplers: Vec<SamplerDesc>,
    textures: Vec<TextureReservation>,
    buffers: Vec<BufferReservation>,
    srvs: Vec<SrvReservation>,
    uavs: Vec<UavReservation>,
    layouts: Vec<LayoutReservation>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a compiled shader from its stage tag.
    ///
    /// An unrecognized tag drops the reservation with a warning and returns
    /// `None`; nothing downstream may reference a dropped reservation.
    pub fn reserve_shader(
        &mut self,
        stage_tag: char,
        blob: Vec<u8>,
        debug_name: &str,
    ) -> Option<ShaderId> {
        let Some(stage) = ShaderStage::from_tag(stage_tag) else {
            warn!(
                tag = %stage_tag,
                name = debug_name,
                "dropping shader reservation with unknown stage tag"
            );
            return None;
        };
        let id = ShaderId(self.shaders.len() as u32);
        self.shaders.push(ShaderReservation {
            stage,
            blob,
            debug_name: debug_name.to_owned(),
        });
        Some(id)
    }

    pub fn reserve_sampler(&mut self, desc: SamplerDesc) -> SamplerId {
        let id = SamplerId(self.samplers.len() as u32);
        self.samplers.push(desc);
        id
    }

    pub fn reserve_texture(&mut self, desc: TextureDesc, content: ContentSource) -> TextureId {
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(TextureReservation { desc, content });
        id
    }

    pub fn reserve_buffer(&mut self, desc: BufferDesc, content: ContentSource) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(BufferReservation { desc, content });
        id
    }

    pub fn reserve_srv(&mut self, source: ViewSource, shape: ViewShape) -> SrvId {
        let id = SrvId(self.srvs.len() as u32);
        self.srvs.push(SrvReservation { source, shape });
        id
    }

    pub fn reserve_uav(&mut self, source: ViewSource, shape: ViewShape) -> UavId {
        let id = UavId(self.uavs.len() as u32);
        self.uavs.push(UavReservation { source, shape });
        id
    }

    pub fn reserve_layout(&mut self, shader: ShaderId, desc: InputLayoutDesc) -> LayoutId {
        let id = LayoutId(self.layouts.len() as u32);
        self.layouts.push(LayoutReservation { shader, desc });
        id
    }

    pub fn shaders(&self) -> &[ShaderReservation] {
        &self.shaders
    }

    pub fn samplers(&self) -> &[SamplerDesc] {
        &self.samplers
    }

    pub fn textures(&self) -> &[TextureReservation] {
        &self.textures
    }

    pub fn buffers(&self) -> &[BufferReservation] {
        &self.buffers
    }

    pub fn srvs(&self) -> &[SrvReservation] {
        &self.srvs
    }

    pub fn uavs(&self) -> &[UavReservation] {
        &self.uavs
    }

    pub fn layouts(&self) -> &[LayoutReservation] {
        &self.layouts
    }
}
