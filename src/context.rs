//! Execution context: pre-sized scratch storage shared by every record.
//!
//! The executor never allocates per call. Before a dependency set is first
//! executed, [`ExecutionContext::prepare`] measures the set's worst-case
//! binding fan-out and largest partial-update payload, grows the scratch
//! arrays to cover them, and returns a [`ScratchCapacity`] token. `execute`
//! requires that token, so "resize before use" is enforced by the type
//! system instead of a comment. Scratch storage only ever grows.

use crate::device::DeviceHandle;
use crate::record::{CopyOp, DependencyRecord, DependencySet};

/// Explicit per-frame state threaded through realization and execution.
///
/// Content producers and region selectors receive this instead of reading
/// ambient globals; it is the only channel for "current frame" inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameState {
    pub frame_index: u64,
    pub time_seconds: f32,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// Proof token that an [`ExecutionContext`] was prepared for a dependency
/// set at least this demanding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScratchCapacity {
    /// Maximum binding fan-out, in elements.
    pub max_fanout: u32,
    /// Maximum scratch byte payload.
    pub max_bytes: u32,
}

impl ScratchCapacity {
    /// Measures the worst case across every record in every phase of `set`.
    ///
    /// Fan-out is counted in elements. The byte requirement takes the worst
    /// of "fan-out worth of handle-sized elements" and "largest partial
    /// update payload", so either sizing convention is covered.
    pub fn measure(set: &DependencySet) -> Self {
        let mut max_fanout = 0usize;
        let mut max_update = 0usize;
        for record in set.all_records() {
            match record {
                DependencyRecord::Draw(draw) => {
                    for stage in &draw.stages {
                        max_fanout = max_fanout.max(stage.max_fanout());
                    }
                }
                DependencyRecord::Compute(compute) => {
                    max_fanout = max_fanout.max(compute.stage.max_fanout());
                }
                DependencyRecord::Copy(CopyOp::PartialUpdate { producer, .. }) => {
                    max_update = max_update.max(producer.size_bytes() as usize);
                }
                DependencyRecord::Copy(CopyOp::WholeResource { .. }) => {}
            }
        }
        let handle_bytes = max_fanout * std::mem::size_of::<DeviceHandle>();
        Self {
            max_fanout: max_fanout as u32,
            max_bytes: handle_bytes.max(max_update) as u32,
        }
    }

    /// True if a context with capacity `self` can execute a set measured at
    /// `required`.
    pub fn covers(self, required: ScratchCapacity) -> bool {
        self.max_fanout >= required.max_fanout && self.max_bytes >= required.max_bytes
    }
}

/// Scratch storage for the executor: a handle array for gathered bind lists,
/// a numeric array for per-slot words (UAV initial counts), and a byte
/// buffer for partial-update payloads.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub(crate) handles: Vec<DeviceHandle>,
    pub(crate) words: Vec<u32>,
    pub(crate) bytes: Vec<u8>,
    capacity: ScratchCapacity,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grows scratch storage to cover `set` and returns the capacity token
    /// `execute` requires for it. Never shrinks; installing a smaller set
    /// later keeps the larger scratch.
    pub fn prepare(&mut self, set: &DependencySet) -> ScratchCapacity {
        let measured = ScratchCapacity::measure(set);
        if measured.max_fanout > self.capacity.max_fanout {
            self.handles
                .resize(measured.max_fanout as usize, DeviceHandle::NULL);
            self.words.resize(measured.max_fanout as usize, 0);
            self.capacity.max_fanout = measured.max_fanout;
        }
        if measured.max_bytes > self.capacity.max_bytes {
            self.bytes.resize(measured.max_bytes as usize, 0);
            self.capacity.max_bytes = measured.max_bytes;
        }
        measured
    }

    pub fn capacity(&self) -> ScratchCapacity {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{SrvId, UavId};
    use crate::record::{
        Binding, ComputeRecord, CopyTarget, DispatchArgs, StageBindings, UpdateProducer,
        UpdateRegion,
    };

    fn compute_with_fanout(n: u32) -> DependencyRecord {
        let mut stage = StageBindings::default();
        stage
            .srvs
            .push(Binding::new(0, (0..n).map(SrvId).collect()));
        stage.uavs.push(Binding::new(0, vec![UavId(0)]));
        DependencyRecord::Compute(ComputeRecord {
            stage,
            args: DispatchArgs::Dispatch { x: 1, y: 1, z: 1 },
        })
    }

    fn update_with_bytes(n: u32) -> DependencyRecord {
        DependencyRecord::Copy(CopyOp::PartialUpdate {
            dst: CopyTarget::Buffer(crate::handle::BufferId(0)),
            subresource: 0,
            region: UpdateRegion::Whole,
            producer: UpdateProducer::new(n, |_, out| out.fill(0)),
            row_pitch_bytes: 0,
            depth_pitch_bytes: 0,
        })
    }

    #[test]
    fn measure_takes_worst_case_across_phases() {
        let set = DependencySet {
            init: vec![update_with_bytes(100)],
            resize: vec![compute_with_fanout(3)],
            frame: vec![compute_with_fanout(7), update_with_bytes(40)],
        };
        let cap = ScratchCapacity::measure(&set);
        assert_eq!(cap.max_fanout, 7);
        // The 100-byte update beats 7 handle-sized elements.
        assert_eq!(cap.max_bytes, 100);
    }

    #[test]
    fn fanout_dominates_byte_sizing_when_updates_are_small() {
        let set = DependencySet {
            init: vec![],
            resize: vec![],
            frame: vec![compute_with_fanout(16), update_with_bytes(8)],
        };
        let cap = ScratchCapacity::measure(&set);
        assert_eq!(cap.max_bytes, 16 * 8);
    }

    #[test]
    fn prepare_never_shrinks() {
        let big = DependencySet {
            init: vec![],
            resize: vec![],
            frame: vec![compute_with_fanout(12), update_with_bytes(200)],
        };
        let small = DependencySet {
            init: vec![],
            resize: vec![],
            frame: vec![compute_with_fanout(2)],
        };

        let mut ctx = ExecutionContext::new();
        let big_cap = ctx.prepare(&big);
        assert_eq!(ctx.capacity(), big_cap);
        assert_eq!(ctx.handles.len(), 12);

        let small_cap = ctx.prepare(&small);
        assert!(ctx.capacity().covers(small_cap));
        assert_eq!(ctx.capacity(), big_cap, "capacity must not shrink");
        assert_eq!(ctx.handles.len(), 12);
    }
}
