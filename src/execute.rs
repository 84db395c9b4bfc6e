//! Replays dependency records against a backend device.
//!
//! Records execute strictly in list order; no reordering or batching. Every
//! multi-element bind gathers its resolved handles into the execution
//! context's scratch arrays and issues a single multi-slot call, so the hot
//! path performs no allocation. Indices are not bounds-checked here: a set
//! must pass [`crate::record::DependencySet::validate`] before it is
//! installed.

use crate::context::{ExecutionContext, FrameState, ScratchCapacity};
use crate::device::{DeviceHandle, GpuDevice, ShaderStage};
use crate::realize::RealizedResources;
use crate::record::{
    ComputeRecord, CopyOp, CopyTarget, DependencyRecord, DispatchArgs, DrawArgs, DrawRecord,
    StageBindings,
};

/// Counters for one `execute` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecMetrics {
    pub records: u32,
    pub draws: u32,
    pub dispatches: u32,
    pub copies: u32,
    pub updates: u32,
    pub bind_calls: u32,
}

/// Replays record lists against the realized resource table.
pub struct Executor<'a> {
    resources: &'a RealizedResources,
}

impl<'a> Executor<'a> {
    pub fn new(resources: &'a RealizedResources) -> Self {
        Self { resources }
    }

    /// Executes `records` in order.
    ///
    /// `token` is the capacity token returned by
    /// [`ExecutionContext::prepare`] for the dependency set these records
    /// belong to; passing records from a larger, unprepared set is a
    /// contract violation and panics.
    pub fn execute(
        &self,
        records: &[DependencyRecord],
        ctx: &mut ExecutionContext,
        token: ScratchCapacity,
        frame: &FrameState,
        device: &mut dyn GpuDevice,
    ) -> ExecMetrics {
        assert!(
            ctx.capacity().covers(token),
            "execution context was not prepared for this dependency set"
        );

        let mut metrics = ExecMetrics::default();
        for record in records {
            metrics.records += 1;
            match record {
                DependencyRecord::Draw(draw) => self.draw(draw, ctx, device, &mut metrics),
                DependencyRecord::Compute(compute) => {
                    self.compute(compute, ctx, device, &mut metrics)
                }
                DependencyRecord::Copy(copy) => self.copy(copy, ctx, frame, device, &mut metrics),
            }
        }
        metrics
    }

    fn draw(
        &self,
        record: &DrawRecord,
        ctx: &mut ExecutionContext,
        device: &mut dyn GpuDevice,
        metrics: &mut ExecMetrics,
    ) {
        let inputs = &record.inputs;
        if let Some(layout) = inputs.layout {
            device.set_input_layout(self.resources.layout(layout));
        }
        if let Some(vb) = inputs.vertex_buffer {
            device.set_vertex_buffer(
                self.resources.buffer(vb),
                inputs.vertex_stride_bytes,
                inputs.vertex_offset_bytes,
            );
        }
        if let (Some(ib), Some(format)) = (inputs.index_buffer, inputs.index_format) {
            device.set_index_buffer(self.resources.buffer(ib), format, 0);
        }
        device.set_topology(inputs.topology);

        for (stage, bindings) in ShaderStage::DRAW_ORDER.iter().zip(&record.stages) {
            self.bind_stage(*stage, bindings, ctx, device, metrics);
        }

        match record.args {
            DrawArgs::Draw {
                vertex_count,
                first_vertex,
            } => device.draw(vertex_count, first_vertex),
            DrawArgs::DrawIndexed {
                index_count,
                first_index,
                base_vertex,
            } => device.draw_indexed(index_count, first_index, base_vertex),
        }
        metrics.draws += 1;
    }

    fn compute(
        &self,
        record: &ComputeRecord,
        ctx: &mut ExecutionContext,
        device: &mut dyn GpuDevice,
        metrics: &mut ExecMetrics,
    ) {
        self.bind_stage(ShaderStage::Compute, &record.stage, ctx, device, metrics);

        match record.args {
            DispatchArgs::Dispatch { x, y, z } => device.dispatch(x, y, z),
            DispatchArgs::DispatchIndirect {
                args_buffer,
                offset_bytes,
            } => device.dispatch_indirect(self.resources.buffer(args_buffer), offset_bytes),
        }
        metrics.dispatches += 1;

        // Mandatory: release every UAV slot the dispatch held so a later
        // record cannot alias the outputs through a stale binding.
        for binding in &record.stage.uavs {
            let n = binding.ids.len();
            debug_assert!(n <= ctx.handles.len());
            for slot in 0..n {
                ctx.handles[slot] = DeviceHandle::NULL;
                ctx.words[slot] = u32::MAX;
            }
            device.set_uavs(
                ShaderStage::Compute,
                binding.first_slot,
                &ctx.handles[..n],
                &ctx.words[..n],
            );
            metrics.bind_calls += 1;
        }
    }

    fn copy(
        &self,
        op: &CopyOp,
        ctx: &mut ExecutionContext,
        frame: &FrameState,
        device: &mut dyn GpuDevice,
        metrics: &mut ExecMetrics,
    ) {
        match op {
            CopyOp::WholeResource { src, dst } => {
                device.copy_resource(self.copy_handle(*src), self.copy_handle(*dst));
                metrics.copies += 1;
            }
            CopyOp::PartialUpdate {
                dst,
                subresource,
                region,
                producer,
                row_pitch_bytes,
                depth_pitch_bytes,
            } => {
                let selected = region.select(frame);
                let size = producer.size_bytes() as usize;
                debug_assert!(size <= ctx.bytes.len());
                producer.fill(frame, &mut ctx.bytes[..size]);

                device.update_subresource(
                    self.copy_handle(*dst),
                    *subresource,
                    selected,
                    &ctx.bytes[..size],
                    *row_pitch_bytes,
                    *depth_pitch_bytes,
                );
                metrics.updates += 1;
            }
        }
    }

    fn bind_stage(
        &self,
        stage: ShaderStage,
        bindings: &StageBindings,
        ctx: &mut ExecutionContext,
        device: &mut dyn GpuDevice,
        metrics: &mut ExecMetrics,
    ) {
        let shader = bindings
            .shader
            .map_or(DeviceHandle::NULL, |id| self.resources.shader(id));
        device.set_shader(stage, shader);
        if shader.is_null() {
            // Disabled stage: bindings are empty by the uniform-record
            // invariant, nothing further to issue.
            return;
        }

        for binding in &bindings.constant_buffers {
            let n = binding.ids.len();
            for (slot, id) in binding.ids.iter().enumerate() {
                ctx.handles[slot] = self.resources.buffer(*id);
            }
            device.set_constant_buffers(stage, binding.first_slot, &ctx.handles[..n]);
            metrics.bind_calls += 1;
        }
        for binding in &bindings.samplers {
            let n = binding.ids.len();
            for (slot, id) in binding.ids.iter().enumerate() {
                ctx.handles[slot] = self.resources.sampler(*id);
            }
            device.set_samplers(stage, binding.first_slot, &ctx.handles[..n]);
            metrics.bind_calls += 1;
        }
        for binding in &bindings.srvs {
            let n = binding.ids.len();
            for (slot, id) in binding.ids.iter().enumerate() {
                ctx.handles[slot] = self.resources.srv(*id);
            }
            device.set_srvs(stage, binding.first_slot, &ctx.handles[..n]);
            metrics.bind_calls += 1;
        }
        for binding in &bindings.uavs {
            let n = binding.ids.len();
            for (slot, id) in binding.ids.iter().enumerate() {
                ctx.handles[slot] = self.resources.uav(*id);
                // Preserve any append/consume counter the view carries.
                ctx.words[slot] = u32::MAX;
            }
            device.set_uavs(stage, binding.first_slot, &ctx.handles[..n], &ctx.words[..n]);
            metrics.bind_calls += 1;
        }
    }

    fn copy_handle(&self, target: CopyTarget) -> DeviceHandle {
        match target {
            CopyTarget::Buffer(id) => self.resources.buffer(id),
            CopyTarget::Texture(id) => self.resources.texture(id),
        }
    }
}
