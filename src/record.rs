//! The dependency record model: per-frame GPU work described as data.
//!
//! A [`DependencyRecord`] is one scheduled operation (draw, dispatch or
//! copy) plus every resource binding it needs, expressed as descriptor-table
//! indices. Records carry no behavior; [`crate::execute`] replays them in
//! list order against the realized resource table.

use std::fmt;

use crate::context::FrameState;
use crate::descriptor::DescriptorTable;
use crate::device::{CopyRegion, IndexFormat, Topology};
use crate::error::ValidateError;
use crate::handle::{BufferId, LayoutId, ResourceKind, SamplerId, ShaderId, SrvId, TextureId, UavId};
use crate::realize::RealizedResources;

/// Number of draw-pipeline stages a draw record always carries.
pub const DRAW_STAGE_COUNT: usize = 5;

/// One multi-slot bind: `ids` land in consecutive slots starting at
/// `first_slot`. `ids.len()` is the binding's fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding<I> {
    pub first_slot: u32,
    pub ids: Vec<I>,
}

impl<I> Binding<I> {
    pub fn new(first_slot: u32, ids: Vec<I>) -> Self {
        Self { first_slot, ids }
    }
}

/// Resource bindings for one shader stage.
///
/// Every draw record carries all five draw stages and every compute record
/// carries one of these, even for disabled stages: a disabled stage is
/// `shader: None` with empty binding lists, never an absent entry. The
/// executor iterates stages uniformly without per-stage `Option` checks on
/// the binding lists.
#[derive(Debug, Default)]
pub struct StageBindings {
    pub shader: Option<ShaderId>,
    pub constant_buffers: Vec<Binding<BufferId>>,
    pub samplers: Vec<Binding<SamplerId>>,
    pub srvs: Vec<Binding<SrvId>>,
    pub uavs: Vec<Binding<UavId>>,
}

impl StageBindings {
    pub fn is_enabled(&self) -> bool {
        self.shader.is_some()
    }

    /// Largest single-bind fan-out across all binding kinds of this stage.
    pub(crate) fn max_fanout(&self) -> usize {
        let cb = self.constant_buffers.iter().map(|b| b.ids.len());
        let sm = self.samplers.iter().map(|b| b.ids.len());
        let sr = self.srvs.iter().map(|b| b.ids.len());
        let ua = self.uavs.iter().map(|b| b.ids.len());
        cb.chain(sm).chain(sr).chain(ua).max().unwrap_or(0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawArgs {
    Draw {
        vertex_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchArgs {
    Dispatch { x: u32, y: u32, z: u32 },
    DispatchIndirect {
        args_buffer: BufferId,
        offset_bytes: u32,
    },
}

/// Input-assembler state for a draw record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawInputs {
    pub vertex_buffer: Option<BufferId>,
    pub vertex_stride_bytes: u32,
    pub vertex_offset_bytes: u32,
    pub index_buffer: Option<BufferId>,
    pub index_format: Option<IndexFormat>,
    pub layout: Option<LayoutId>,
    pub topology: Topology,
}

impl Default for DrawArgs {
    fn default() -> Self {
        DrawArgs::Draw {
            vertex_count: 0,
            first_vertex: 0,
        }
    }
}

#[derive(Debug)]
pub struct DrawRecord {
    pub inputs: DrawInputs,
    /// One entry per draw stage, in [`crate::device::ShaderStage::DRAW_ORDER`]
    /// order. Disabled stages are present with empty bindings.
    pub stages: [StageBindings; DRAW_STAGE_COUNT],
    pub args: DrawArgs,
}

impl DrawRecord {
    pub fn new(inputs: DrawInputs, args: DrawArgs) -> Self {
        Self {
            inputs,
            stages: std::array::from_fn(|_| StageBindings::default()),
            args,
        }
    }
}

#[derive(Debug)]
pub struct ComputeRecord {
    pub stage: StageBindings,
    pub args: DispatchArgs,
}

/// Per-execution update payload producer.
///
/// Unlike [`crate::descriptor::ContentProducer`] (which fires once at
/// realize time), this fires on every execution of its record, into the
/// execution context's scratch byte buffer.
pub struct UpdateProducer {
    size_bytes: u32,
    fill: Box<dyn Fn(&FrameState, &mut [u8])>,
}

impl UpdateProducer {
    pub fn new(size_bytes: u32, fill: impl Fn(&FrameState, &mut [u8]) + 'static) -> Self {
        Self {
            size_bytes,
            fill: Box::new(fill),
        }
    }

    pub fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    pub fn fill(&self, frame: &FrameState, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.size_bytes as usize);
        (self.fill)(frame, out);
    }
}

impl fmt::Debug for UpdateProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateProducer")
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

/// Per-execution region selector; `None` from the callback means "whole
/// subresource".
pub type RegionSelect = Box<dyn Fn(&FrameState) -> Option<CopyRegion>>;

/// Destination region of a partial update.
///
/// `Whole` and `Static` are fully known at install time and get bounds
/// checked by [`DependencySet::validate`]; `Dynamic` regions are chosen per
/// execution and cannot be.
#[derive(Default)]
pub enum UpdateRegion {
    /// The whole subresource.
    #[default]
    Whole,
    /// A fixed box.
    Static(CopyRegion),
    /// A box chosen per execution.
    Dynamic(RegionSelect),
}

impl UpdateRegion {
    pub fn select(&self, frame: &FrameState) -> Option<CopyRegion> {
        match self {
            UpdateRegion::Whole => None,
            UpdateRegion::Static(region) => Some(*region),
            UpdateRegion::Dynamic(select) => select(frame),
        }
    }
}

impl fmt::Debug for UpdateRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateRegion::Whole => f.write_str("Whole"),
            UpdateRegion::Static(region) => f.debug_tuple("Static").field(region).finish(),
            UpdateRegion::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopyTarget {
    Buffer(BufferId),
    Texture(TextureId),
}

pub enum CopyOp {
    /// Full-resource copy between two realized resources.
    WholeResource { src: CopyTarget, dst: CopyTarget },
    /// Partial update of one subresource from a freshly produced payload.
    PartialUpdate {
        dst: CopyTarget,
        subresource: u32,
        region: UpdateRegion,
        producer: UpdateProducer,
        row_pitch_bytes: u32,
        depth_pitch_bytes: u32,
    },
}

impl fmt::Debug for CopyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyOp::WholeResource { src, dst } => f
                .debug_struct("WholeResource")
                .field("src", src)
                .field("dst", dst)
                .finish(),
            CopyOp::PartialUpdate {
                dst,
                subresource,
                region,
                producer,
                row_pitch_bytes,
                depth_pitch_bytes,
            } => f
                .debug_struct("PartialUpdate")
                .field("dst", dst)
                .field("subresource", subresource)
                .field("region", region)
                .field("producer", producer)
                .field("row_pitch_bytes", row_pitch_bytes)
                .field("depth_pitch_bytes", depth_pitch_bytes)
                .finish(),
        }
    }
}

/// One scheduled GPU operation plus its bindings.
#[derive(Debug)]
pub enum DependencyRecord {
    Draw(DrawRecord),
    Compute(ComputeRecord),
    Copy(CopyOp),
}

/// Lifecycle phase a record list belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Run once after load.
    Init,
    /// Run on every viewport resize.
    Resize,
    /// Run every frame.
    Frame,
}

/// The three ordered record lists emitted by instance compilation.
///
/// Immutable once built; records execute strictly in list order.
#[derive(Debug, Default)]
pub struct DependencySet {
    pub init: Vec<DependencyRecord>,
    pub resize: Vec<DependencyRecord>,
    pub frame: Vec<DependencyRecord>,
}

impl DependencySet {
    pub fn records(&self, phase: Phase) -> &[DependencyRecord] {
        match phase {
            Phase::Init => &self.init,
            Phase::Resize => &self.resize,
            Phase::Frame => &self.frame,
        }
    }

    pub(crate) fn all_records(&self) -> impl Iterator<Item = &DependencyRecord> {
        self.init.iter().chain(&self.resize).chain(&self.frame)
    }

    /// Proves every index in every record valid against the realized table.
    ///
    /// Run this once at install time; the executor itself performs no
    /// per-record bounds checks.
    pub fn validate(
        &self,
        table: &DescriptorTable,
        realized: &RealizedResources,
    ) -> Result<(), ValidateError> {
        for phase in [Phase::Init, Phase::Resize, Phase::Frame] {
            for (i, record) in self.records(phase).iter().enumerate() {
                let mut check = RecordCheck {
                    phase,
                    record: i,
                    realized,
                };
                match record {
                    DependencyRecord::Draw(draw) => {
                        if let Some(vb) = draw.inputs.vertex_buffer {
                            check.buffer(vb)?;
                        }
                        if let Some(ib) = draw.inputs.index_buffer {
                            check.buffer(ib)?;
                        }
                        if let Some(layout) = draw.inputs.layout {
                            check.layout(layout)?;
                        }
                        for stage in &draw.stages {
                            check.stage(stage)?;
                        }
                    }
                    DependencyRecord::Compute(compute) => {
                        check.stage(&compute.stage)?;
                        if let DispatchArgs::DispatchIndirect { args_buffer, .. } = compute.args {
                            check.buffer(args_buffer)?;
                        }
                    }
                    DependencyRecord::Copy(copy) => match copy {
                        CopyOp::WholeResource { src, dst } => {
                            check.copy_target(*src)?;
                            check.copy_target(*dst)?;
                        }
                        CopyOp::PartialUpdate {
                            dst,
                            subresource,
                            region,
                            producer,
                            row_pitch_bytes,
                            ..
                        } => {
                            check.copy_target(*dst)?;
                            check.update(
                                table,
                                *dst,
                                *subresource,
                                region,
                                producer,
                                *row_pitch_bytes,
                            )?;
                        }
                    },
                }
            }
        }
        Ok(())
    }
}

struct RecordCheck<'a> {
    phase: Phase,
    record: usize,
    realized: &'a RealizedResources,
}

impl RecordCheck<'_> {
    fn range(&self, kind: ResourceKind, index: u32, len: usize) -> Result<(), ValidateError> {
        if (index as usize) < len {
            Ok(())
        } else {
            Err(ValidateError::IndexOutOfRange {
                phase: self.phase,
                record: self.record,
                kind,
                index,
                len: len as u32,
            })
        }
    }

    fn buffer(&mut self, id: BufferId) -> Result<(), ValidateError> {
        self.range(ResourceKind::Buffer, id.0, self.realized.buffer_count())
    }

    fn layout(&mut self, id: LayoutId) -> Result<(), ValidateError> {
        self.range(ResourceKind::InputLayout, id.0, self.realized.layout_count())
    }

    fn copy_target(&mut self, target: CopyTarget) -> Result<(), ValidateError> {
        match target {
            CopyTarget::Buffer(id) => self.buffer(id),
            CopyTarget::Texture(id) => {
                self.range(ResourceKind::Texture, id.0, self.realized.texture_count())
            }
        }
    }

    /// Bounds-checks a partial update whose destination and region are known
    /// at install time. `Dynamic` regions are chosen per execution and skip
    /// the payload/box checks.
    fn update(
        &mut self,
        table: &DescriptorTable,
        dst: CopyTarget,
        subresource: u32,
        region: &UpdateRegion,
        producer: &UpdateProducer,
        row_pitch_bytes: u32,
    ) -> Result<(), ValidateError> {
        let size = producer.size_bytes();
        match (dst, region) {
            (_, UpdateRegion::Dynamic(_)) => Ok(()),
            (CopyTarget::Buffer(id), UpdateRegion::Whole) => {
                let dst_size = table.buffers()[id.index()].desc.size_bytes;
                self.fits(size, dst_size)
            }
            (CopyTarget::Buffer(id), UpdateRegion::Static(r)) => {
                // Buffer regions are byte ranges on the x axis.
                let dst_size = table.buffers()[id.index()].desc.size_bytes;
                if r.height != 1 || r.depth != 1 || r.x.saturating_add(r.width) > dst_size {
                    return Err(self.region_err(*r, dst_size, 1, 1));
                }
                self.fits(size, r.width)
            }
            (CopyTarget::Texture(id), UpdateRegion::Whole) => {
                let desc = &table.textures()[id.index()].desc;
                let (_, height) = mip_extent(desc.width, desc.height, desc.mip_levels, subresource);
                let pitch = if row_pitch_bytes != 0 {
                    row_pitch_bytes
                } else {
                    desc.row_pitch_bytes
                };
                if pitch == 0 {
                    return Ok(());
                }
                self.fits(size, pitch.saturating_mul(height))
            }
            (CopyTarget::Texture(id), UpdateRegion::Static(r)) => {
                let desc = &table.textures()[id.index()].desc;
                let (width, height) =
                    mip_extent(desc.width, desc.height, desc.mip_levels, subresource);
                if r.x.saturating_add(r.width) > width
                    || r.y.saturating_add(r.height) > height
                    || r.z.saturating_add(r.depth) > 1
                {
                    return Err(self.region_err(*r, width, height, 1));
                }
                let pitch = if row_pitch_bytes != 0 {
                    row_pitch_bytes
                } else {
                    desc.row_pitch_bytes
                };
                if pitch == 0 {
                    return Ok(());
                }
                self.fits(size, pitch.saturating_mul(r.height).saturating_mul(r.depth))
            }
        }
    }

    fn fits(&self, size: u32, dst_size: u32) -> Result<(), ValidateError> {
        if size > dst_size {
            Err(ValidateError::UpdateTooLarge {
                phase: self.phase,
                record: self.record,
                size,
                dst_size,
            })
        } else {
            Ok(())
        }
    }

    fn region_err(&self, region: CopyRegion, max_x: u32, max_y: u32, max_z: u32) -> ValidateError {
        ValidateError::RegionOutOfBounds {
            phase: self.phase,
            record: self.record,
            region,
            max_x,
            max_y,
            max_z,
        }
    }

    fn stage(&mut self, stage: &StageBindings) -> Result<(), ValidateError> {
        if let Some(shader) = stage.shader {
            self.range(ResourceKind::Shader, shader.0, self.realized.shader_count())?;
        }
        for b in &stage.constant_buffers {
            for id in &b.ids {
                self.buffer(*id)?;
            }
        }
        for b in &stage.samplers {
            for id in &b.ids {
                self.range(ResourceKind::Sampler, id.0, self.realized.sampler_count())?;
            }
        }
        for b in &stage.srvs {
            for id in &b.ids {
                self.range(ResourceKind::Srv, id.0, self.realized.srv_count())?;
            }
        }
        for b in &stage.uavs {
            for id in &b.ids {
                self.range(ResourceKind::Uav, id.0, self.realized.uav_count())?;
            }
        }
        Ok(())
    }
}

/// Extent of the mip level `subresource` addresses. Subresources index mips
/// within an array layer, so the mip level is the index modulo the mip count.
fn mip_extent(width: u32, height: u32, mip_levels: u32, subresource: u32) -> (u32, u32) {
    let mip = subresource % mip_levels.max(1);
    ((width >> mip).max(1), (height >> mip).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stage_bindings_are_present_but_disabled() {
        let record = DrawRecord::new(DrawInputs::default(), DrawArgs::default());
        assert_eq!(record.stages.len(), DRAW_STAGE_COUNT);
        for stage in &record.stages {
            assert!(!stage.is_enabled());
            assert!(stage.constant_buffers.is_empty());
            assert!(stage.samplers.is_empty());
            assert!(stage.srvs.is_empty());
            assert!(stage.uavs.is_empty());
        }
    }

    #[test]
    fn max_fanout_spans_all_binding_kinds() {
        let mut stage = StageBindings::default();
        stage.constant_buffers.push(Binding::new(0, vec![BufferId(0)]));
        stage
            .srvs
            .push(Binding::new(0, vec![SrvId(0), SrvId(1), SrvId(2), SrvId(3)]));
        stage.samplers.push(Binding::new(0, vec![SamplerId(0)]));
        assert_eq!(stage.max_fanout(), 4);
        assert_eq!(StageBindings::default().max_fanout(), 0);
    }
}
