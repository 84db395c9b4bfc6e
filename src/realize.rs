//! Phase two of the resource model: materializing descriptors into backend
//! objects.
//!
//! Kinds are processed in a fixed order (shaders, samplers, textures,
//! buffers, read-only views, read-write views, input layouts) so later kinds
//! can resolve indices into earlier ones. Each kind tracks a high-water mark
//! (the realized table's length), which makes a repeated `realize` additive:
//! only indices reserved since the previous pass are processed.

use std::fs;

use tracing::{debug, warn};

use crate::context::FrameState;
use crate::descriptor::{ContentSource, DescriptorTable, ViewSource};
use crate::device::{DeviceHandle, GpuDevice};
use crate::error::RealizeError;
use crate::handle::{BufferId, LayoutId, SamplerId, ShaderId, SrvId, TextureId, UavId};

/// One realized backend object per descriptor index, per kind.
///
/// Entries are written exactly once. A null handle marks a per-entry
/// creation failure in one of the non-fatal kinds (texture, sampler, view);
/// binding it later degrades output silently.
#[derive(Debug, Default)]
pub struct RealizedResources {
    shaders: Vec<DeviceHandle>,
    samplers: Vec<DeviceHandle>,
    textures: Vec<DeviceHandle>,
    buffers: Vec<DeviceHandle>,
    srvs: Vec<DeviceHandle>,
    uavs: Vec<DeviceHandle>,
    layouts: Vec<DeviceHandle>,
}

impl RealizedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shader(&self, id: ShaderId) -> DeviceHandle {
        self.shaders[id.index()]
    }

    pub fn sampler(&self, id: SamplerId) -> DeviceHandle {
        self.samplers[id.index()]
    }

    pub fn texture(&self, id: TextureId) -> DeviceHandle {
        self.textures[id.index()]
    }

    pub fn buffer(&self, id: BufferId) -> DeviceHandle {
        self.buffers[id.index()]
    }

    pub fn srv(&self, id: SrvId) -> DeviceHandle {
        self.srvs[id.index()]
    }

    pub fn uav(&self, id: UavId) -> DeviceHandle {
        self.uavs[id.index()]
    }

    pub fn layout(&self, id: LayoutId) -> DeviceHandle {
        self.layouts[id.index()]
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn srv_count(&self) -> usize {
        self.srvs.len()
    }

    pub fn uav_count(&self) -> usize {
        self.uavs.len()
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }
}

/// Runs realization passes; owns the content-producer scratch buffer, which
/// grows across a pass and is reused by later passes.
#[derive(Debug, Default)]
pub struct Realizer {
    scratch: Vec<u8>,
}

impl Realizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Realizes every descriptor reserved since the previous pass.
    ///
    /// Shader, buffer and input-layout failures abort the pass; texture,
    /// sampler and view failures are logged and leave a null handle.
    pub fn realize(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        frame: &FrameState,
        out: &mut RealizedResources,
    ) -> Result<(), RealizeError> {
        self.realize_shaders(table, device, out)?;
        self.realize_samplers(table, device, out);
        self.realize_textures(table, device, frame, out);
        self.realize_buffers(table, device, frame, out)?;
        self.realize_srvs(table, device, out);
        self.realize_uavs(table, device, out);
        self.realize_layouts(table, device, out)?;
        Ok(())
    }

    fn realize_shaders(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        out: &mut RealizedResources,
    ) -> Result<(), RealizeError> {
        for index in out.shaders.len()..table.shaders().len() {
            let res = &table.shaders()[index];
            let handle = device
                .create_shader(res.stage, &res.blob, &res.debug_name)
                .map_err(|source| RealizeError::ShaderCreate {
                    index: index as u32,
                    name: res.debug_name.clone(),
                    source,
                })?;
            out.shaders.push(handle);
        }
        Ok(())
    }

    fn realize_samplers(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        out: &mut RealizedResources,
    ) {
        for index in out.samplers.len()..table.samplers().len() {
            let desc = &table.samplers()[index];
            match device.create_sampler(desc) {
                Ok(handle) => out.samplers.push(handle),
                Err(err) => {
                    warn!(index, error = %err, "sampler creation failed; leaving slot null");
                    out.samplers.push(DeviceHandle::NULL);
                }
            }
        }
    }

    fn realize_textures(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        frame: &FrameState,
        out: &mut RealizedResources,
    ) {
        for index in out.textures.len()..table.textures().len() {
            let res = &table.textures()[index];
            let initial = match self.resolve_content(&res.content, frame) {
                Ok(initial) => initial,
                Err(message) => {
                    warn!(index, %message, "texture content unavailable; leaving slot null");
                    out.textures.push(DeviceHandle::NULL);
                    continue;
                }
            };
            match device.create_texture2d(&res.desc, initial) {
                Ok(handle) => out.textures.push(handle),
                Err(err) => {
                    warn!(index, error = %err, "texture creation failed; leaving slot null");
                    out.textures.push(DeviceHandle::NULL);
                }
            }
        }
    }

    fn realize_buffers(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        frame: &FrameState,
        out: &mut RealizedResources,
    ) -> Result<(), RealizeError> {
        for index in out.buffers.len()..table.buffers().len() {
            let res = &table.buffers()[index];
            let initial =
                self.resolve_content(&res.content, frame)
                    .map_err(|message| RealizeError::BufferContent {
                        index: index as u32,
                        path: match &res.content {
                            ContentSource::File(path) => path.clone(),
                            _ => Default::default(),
                        },
                        message,
                    })?;
            let handle = device
                .create_buffer(&res.desc, initial)
                .map_err(|source| RealizeError::BufferCreate {
                    index: index as u32,
                    source,
                })?;
            out.buffers.push(handle);
        }
        Ok(())
    }

    fn realize_srvs(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        out: &mut RealizedResources,
    ) {
        for index in out.srvs.len()..table.srvs().len() {
            let res = &table.srvs()[index];
            let source = resolve_view_source(res.source, out);
            if source.is_null() {
                warn!(index, source = ?res.source, "srv source not realized; leaving slot null");
                out.srvs.push(DeviceHandle::NULL);
                continue;
            }
            match device.create_srv(source, &res.shape) {
                Ok(handle) => out.srvs.push(handle),
                Err(err) => {
                    warn!(index, error = %err, "srv creation failed; leaving slot null");
                    out.srvs.push(DeviceHandle::NULL);
                }
            }
        }
    }

    fn realize_uavs(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        out: &mut RealizedResources,
    ) {
        for index in out.uavs.len()..table.uavs().len() {
            let res = &table.uavs()[index];
            let source = resolve_view_source(res.source, out);
            if source.is_null() {
                warn!(index, source = ?res.source, "uav source not realized; leaving slot null");
                out.uavs.push(DeviceHandle::NULL);
                continue;
            }
            match device.create_uav(source, &res.shape) {
                Ok(handle) => out.uavs.push(handle),
                Err(err) => {
                    warn!(index, error = %err, "uav creation failed; leaving slot null");
                    out.uavs.push(DeviceHandle::NULL);
                }
            }
        }
    }

    fn realize_layouts(
        &mut self,
        table: &DescriptorTable,
        device: &mut dyn GpuDevice,
        out: &mut RealizedResources,
    ) -> Result<(), RealizeError> {
        for index in out.layouts.len()..table.layouts().len() {
            let res = &table.layouts()[index];
            let shader_handle = out
                .shaders
                .get(res.shader.index())
                .copied()
                .unwrap_or(DeviceHandle::NULL);
            if shader_handle.is_null() {
                return Err(RealizeError::InputLayoutShader {
                    index: index as u32,
                    shader: res.shader.0,
                });
            }
            let blob = &table.shaders()[res.shader.index()].blob;
            let handle = device.create_input_layout(&res.desc, blob).map_err(|source| {
                RealizeError::InputLayoutCreate {
                    index: index as u32,
                    source,
                }
            })?;
            out.layouts.push(handle);
        }
        debug!(
            shaders = out.shaders.len(),
            samplers = out.samplers.len(),
            textures = out.textures.len(),
            buffers = out.buffers.len(),
            srvs = out.srvs.len(),
            uavs = out.uavs.len(),
            layouts = out.layouts.len(),
            "realize pass complete"
        );
        Ok(())
    }

    /// Resolves a content source into a payload slice, producing into the
    /// pass-wide scratch buffer where needed. The scratch only grows.
    fn resolve_content<'a>(
        &'a mut self,
        content: &'a ContentSource,
        frame: &FrameState,
    ) -> Result<Option<&'a [u8]>, String> {
        match content {
            ContentSource::None => Ok(None),
            ContentSource::Bytes(bytes) => Ok(Some(bytes)),
            ContentSource::File(path) => {
                let bytes = fs::read(path).map_err(|e| e.to_string())?;
                if self.scratch.len() < bytes.len() {
                    self.scratch.resize(bytes.len(), 0);
                }
                self.scratch[..bytes.len()].copy_from_slice(&bytes);
                Ok(Some(&self.scratch[..bytes.len()]))
            }
            ContentSource::Producer(producer) => {
                let size = producer.size_bytes() as usize;
                if self.scratch.len() < size {
                    self.scratch.resize(size, 0);
                }
                producer.fill(frame, &mut self.scratch[..size]);
                Ok(Some(&self.scratch[..size]))
            }
        }
    }
}

fn resolve_view_source(source: ViewSource, out: &RealizedResources) -> DeviceHandle {
    match source {
        ViewSource::Buffer(id) => out
            .buffers
            .get(id.index())
            .copied()
            .unwrap_or(DeviceHandle::NULL),
        ViewSource::Texture(id) => out
            .textures
            .get(id.index())
            .copied()
            .unwrap_or(DeviceHandle::NULL),
    }
}
