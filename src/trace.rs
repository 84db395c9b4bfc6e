//! A recording backend: every [`GpuDevice`] call becomes a [`DeviceCall`]
//! value that can be inspected afterwards.
//!
//! This is the trace/replay half of the engine's test story: instead of
//! driving a real graphics API, a scenario executes against a `TraceDevice`
//! and asserts on the exact call sequence the engine issued, payloads
//! included. Creation failures can be injected per kind to exercise the
//! warn-and-continue versus abort paths.

use crate::device::{
    BufferDesc, CopyRegion, DeviceHandle, GpuDevice, IndexFormat, InputLayoutDesc, SamplerDesc,
    ShaderStage, TextureDesc, Topology, ViewShape,
};
use crate::error::DeviceError;

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    CreateShader {
        handle: DeviceHandle,
        stage: ShaderStage,
        blob_len: usize,
        debug_name: String,
    },
    CreateSampler {
        handle: DeviceHandle,
        desc: SamplerDesc,
    },
    CreateTexture2d {
        handle: DeviceHandle,
        desc: TextureDesc,
        initial_len: Option<usize>,
    },
    CreateBuffer {
        handle: DeviceHandle,
        desc: BufferDesc,
        initial: Option<Vec<u8>>,
    },
    CreateSrv {
        handle: DeviceHandle,
        source: DeviceHandle,
        shape: ViewShape,
    },
    CreateUav {
        handle: DeviceHandle,
        source: DeviceHandle,
        shape: ViewShape,
    },
    CreateInputLayout {
        handle: DeviceHandle,
        desc: InputLayoutDesc,
    },
    SetInputLayout(DeviceHandle),
    SetVertexBuffer {
        buffer: DeviceHandle,
        stride_bytes: u32,
        offset_bytes: u32,
    },
    SetIndexBuffer {
        buffer: DeviceHandle,
        format: IndexFormat,
        offset_bytes: u32,
    },
    SetTopology(Topology),
    SetShader {
        stage: ShaderStage,
        shader: DeviceHandle,
    },
    SetConstantBuffers {
        stage: ShaderStage,
        first_slot: u32,
        buffers: Vec<DeviceHandle>,
    },
    SetSamplers {
        stage: ShaderStage,
        first_slot: u32,
        samplers: Vec<DeviceHandle>,
    },
    SetSrvs {
        stage: ShaderStage,
        first_slot: u32,
        views: Vec<DeviceHandle>,
    },
    SetUavs {
        stage: ShaderStage,
        first_slot: u32,
        views: Vec<DeviceHandle>,
        initial_counts: Vec<u32>,
    },
    Draw {
        vertex_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        args_buffer: DeviceHandle,
        offset_bytes: u32,
    },
    CopyResource {
        src: DeviceHandle,
        dst: DeviceHandle,
    },
    UpdateSubresource {
        dst: DeviceHandle,
        subresource: u32,
        region: Option<CopyRegion>,
        data: Vec<u8>,
        row_pitch_bytes: u32,
        depth_pitch_bytes: u32,
    },
}

impl DeviceCall {
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            DeviceCall::CreateShader { .. }
                | DeviceCall::CreateSampler { .. }
                | DeviceCall::CreateTexture2d { .. }
                | DeviceCall::CreateBuffer { .. }
                | DeviceCall::CreateSrv { .. }
                | DeviceCall::CreateUav { .. }
                | DeviceCall::CreateInputLayout { .. }
        )
    }
}

/// Recording [`GpuDevice`]: hands out sequential non-null handles and logs
/// every call.
#[derive(Debug, Default)]
pub struct TraceDevice {
    calls: Vec<DeviceCall>,
    next_handle: u64,
    /// Fail every texture creation while set (warn-and-continue class).
    pub fail_texture_creates: bool,
    /// Fail every sampler creation while set (warn-and-continue class).
    pub fail_sampler_creates: bool,
    /// Fail every shader creation while set (abort class).
    pub fail_shader_creates: bool,
}

impl TraceDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn creation_count(&self) -> usize {
        self.calls.iter().filter(|c| c.is_creation()).count()
    }

    fn alloc(&mut self) -> DeviceHandle {
        self.next_handle += 1;
        DeviceHandle(self.next_handle)
    }
}

impl GpuDevice for TraceDevice {
    fn create_shader(
        &mut self,
        stage: ShaderStage,
        blob: &[u8],
        debug_name: &str,
    ) -> Result<DeviceHandle, DeviceError> {
        if self.fail_shader_creates {
            return Err(DeviceError(format!("injected shader failure ({debug_name})")));
        }
        let handle = self.alloc();
        self.calls.push(DeviceCall::CreateShader {
            handle,
            stage,
            blob_len: blob.len(),
            debug_name: debug_name.to_owned(),
        });
        Ok(handle)
    }

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<DeviceHandle, DeviceError> {
        if self.fail_sampler_creates {
            return Err(DeviceError("injected sampler failure".into()));
        }
        let handle = self.alloc();
        self.calls.push(DeviceCall::CreateSampler {
            handle,
            desc: *desc,
        });
        Ok(handle)
    }

    fn create_texture2d(
        &mut self,
        desc: &TextureDesc,
        initial: Option<&[u8]>,
    ) -> Result<DeviceHandle, DeviceError> {
        if self.fail_texture_creates {
            return Err(DeviceError("injected texture failure".into()));
        }
        let handle = self.alloc();
        self.calls.push(DeviceCall::CreateTexture2d {
            handle,
            desc: *desc,
            initial_len: initial.map(<[u8]>::len),
        });
        Ok(handle)
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        initial: Option<&[u8]>,
    ) -> Result<DeviceHandle, DeviceError> {
        let handle = self.alloc();
        self.calls.push(DeviceCall::CreateBuffer {
            handle,
            desc: *desc,
            initial: initial.map(<[u8]>::to_vec),
        });
        Ok(handle)
    }

    fn create_srv(
        &mut self,
        source: DeviceHandle,
        shape: &ViewShape,
    ) -> Result<DeviceHandle, DeviceError> {
        let handle = self.alloc();
        self.calls.push(DeviceCall::CreateSrv {
            handle,
            source,
            shape: *shape,
        });
        Ok(handle)
    }

    fn create_uav(
        &mut self,
        source: DeviceHandle,
        shape: &ViewShape,
    ) -> Result<DeviceHandle, DeviceError> {
        let handle = self.alloc();
        self.calls.push(DeviceCall::CreateUav {
            handle,
            source,
            shape: *shape,
        });
        Ok(handle)
    }

    fn create_input_layout(
        &mut self,
        desc: &InputLayoutDesc,
        _vertex_shader_blob: &[u8],
    ) -> Result<DeviceHandle, DeviceError> {
        let handle = self.alloc();
        self.calls.push(DeviceCall::CreateInputLayout {
            handle,
            desc: desc.clone(),
        });
        Ok(handle)
    }

    fn set_input_layout(&mut self, layout: DeviceHandle) {
        self.calls.push(DeviceCall::SetInputLayout(layout));
    }

    fn set_vertex_buffer(&mut self, buffer: DeviceHandle, stride_bytes: u32, offset_bytes: u32) {
        self.calls.push(DeviceCall::SetVertexBuffer {
            buffer,
            stride_bytes,
            offset_bytes,
        });
    }

    fn set_index_buffer(&mut self, buffer: DeviceHandle, format: IndexFormat, offset_bytes: u32) {
        self.calls.push(DeviceCall::SetIndexBuffer {
            buffer,
            format,
            offset_bytes,
        });
    }

    fn set_topology(&mut self, topology: Topology) {
        self.calls.push(DeviceCall::SetTopology(topology));
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: DeviceHandle) {
        self.calls.push(DeviceCall::SetShader { stage, shader });
    }

    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        first_slot: u32,
        buffers: &[DeviceHandle],
    ) {
        self.calls.push(DeviceCall::SetConstantBuffers {
            stage,
            first_slot,
            buffers: buffers.to_vec(),
        });
    }

    fn set_samplers(&mut self, stage: ShaderStage, first_slot: u32, samplers: &[DeviceHandle]) {
        self.calls.push(DeviceCall::SetSamplers {
            stage,
            first_slot,
            samplers: samplers.to_vec(),
        });
    }

    fn set_srvs(&mut self, stage: ShaderStage, first_slot: u32, views: &[DeviceHandle]) {
        self.calls.push(DeviceCall::SetSrvs {
            stage,
            first_slot,
            views: views.to_vec(),
        });
    }

    fn set_uavs(
        &mut self,
        stage: ShaderStage,
        first_slot: u32,
        views: &[DeviceHandle],
        initial_counts: &[u32],
    ) {
        self.calls.push(DeviceCall::SetUavs {
            stage,
            first_slot,
            views: views.to_vec(),
            initial_counts: initial_counts.to_vec(),
        });
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) {
        self.calls.push(DeviceCall::Draw {
            vertex_count,
            first_vertex,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: i32) {
        self.calls.push(DeviceCall::DrawIndexed {
            index_count,
            first_index,
            base_vertex,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.calls.push(DeviceCall::Dispatch { x, y, z });
    }

    fn dispatch_indirect(&mut self, args_buffer: DeviceHandle, offset_bytes: u32) {
        self.calls.push(DeviceCall::DispatchIndirect {
            args_buffer,
            offset_bytes,
        });
    }

    fn copy_resource(&mut self, src: DeviceHandle, dst: DeviceHandle) {
        self.calls.push(DeviceCall::CopyResource { src, dst });
    }

    fn update_subresource(
        &mut self,
        dst: DeviceHandle,
        subresource: u32,
        region: Option<CopyRegion>,
        data: &[u8],
        row_pitch_bytes: u32,
        depth_pitch_bytes: u32,
    ) {
        self.calls.push(DeviceCall::UpdateSubresource {
            dst,
            subresource,
            region,
            data: data.to_vec(),
            row_pitch_bytes,
            depth_pitch_bytes,
        });
    }
}
