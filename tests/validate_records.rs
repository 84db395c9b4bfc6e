//! Install-time validation: every record index must resolve inside the
//! realized tables, and statically known updates (whole-subresource or
//! fixed-region) must fit their destination.

use renderlink::descriptor::{ContentSource, DescriptorTable};
use renderlink::device::{BufferDesc, BufferUsage, CopyRegion, Format, TextureDesc, TextureUsage};
use renderlink::error::ValidateError;
use renderlink::handle::{BufferId, ResourceKind, TextureId};
use renderlink::record::{
    Binding, CopyOp, CopyTarget, DependencyRecord, DependencySet, DrawArgs, DrawInputs,
    DrawRecord, Phase, UpdateProducer, UpdateRegion,
};
use renderlink::trace::TraceDevice;
use renderlink::{FrameState, RealizedResources, Realizer};

fn realized_with_buffers(sizes: &[u32]) -> (DescriptorTable, RealizedResources) {
    let mut table = DescriptorTable::new();
    for &size in sizes {
        table.reserve_buffer(
            BufferDesc {
                size_bytes: size,
                stride_bytes: 0,
                usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
            },
            ContentSource::None,
        );
    }
    let mut device = TraceDevice::new();
    let mut resources = RealizedResources::new();
    Realizer::new()
        .realize(&table, &mut device, &FrameState::default(), &mut resources)
        .unwrap();
    (table, resources)
}

/// One 4x4 RGBA8 texture: 16 bytes per row, 64 bytes in all.
fn realized_with_texture() -> (DescriptorTable, RealizedResources) {
    let mut table = DescriptorTable::new();
    table.reserve_texture(
        TextureDesc {
            width: 4,
            height: 4,
            mip_levels: 1,
            array_layers: 1,
            format: Format::Rgba8Unorm,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
            row_pitch_bytes: 16,
        },
        ContentSource::None,
    );
    let mut device = TraceDevice::new();
    let mut resources = RealizedResources::new();
    Realizer::new()
        .realize(&table, &mut device, &FrameState::default(), &mut resources)
        .unwrap();
    (table, resources)
}

fn texture_update(region: UpdateRegion, payload_bytes: u32) -> DependencyRecord {
    DependencyRecord::Copy(CopyOp::PartialUpdate {
        dst: CopyTarget::Texture(TextureId(0)),
        subresource: 0,
        region,
        producer: UpdateProducer::new(payload_bytes, |_, out| out.fill(0)),
        row_pitch_bytes: 16,
        depth_pitch_bytes: 0,
    })
}

#[test]
fn out_of_range_index_is_rejected_with_location() {
    let (table, resources) = realized_with_buffers(&[16]);

    let mut draw = DrawRecord::new(
        DrawInputs {
            vertex_buffer: Some(BufferId(5)),
            ..DrawInputs::default()
        },
        DrawArgs::default(),
    );
    draw.stages[0]
        .constant_buffers
        .push(Binding::new(0, vec![BufferId(0)]));
    let set = DependencySet {
        frame: vec![DependencyRecord::Draw(draw)],
        ..DependencySet::default()
    };

    let err = set.validate(&table, &resources).unwrap_err();
    assert_eq!(
        err,
        ValidateError::IndexOutOfRange {
            phase: Phase::Frame,
            record: 0,
            kind: ResourceKind::Buffer,
            index: 5,
            len: 1,
        }
    );
}

#[test]
fn oversized_static_update_is_rejected() {
    let (table, resources) = realized_with_buffers(&[16]);

    let set = DependencySet {
        init: vec![DependencyRecord::Copy(CopyOp::PartialUpdate {
            dst: CopyTarget::Buffer(BufferId(0)),
            subresource: 0,
            region: UpdateRegion::Whole,
            producer: UpdateProducer::new(32, |_, out| out.fill(0)),
            row_pitch_bytes: 0,
            depth_pitch_bytes: 0,
        })],
        ..DependencySet::default()
    };

    let err = set.validate(&table, &resources).unwrap_err();
    assert_eq!(
        err,
        ValidateError::UpdateTooLarge {
            phase: Phase::Init,
            record: 0,
            size: 32,
            dst_size: 16,
        }
    );
}

#[test]
fn oversized_texture_update_is_rejected() {
    let (table, resources) = realized_with_texture();

    // 4x4 RGBA8 holds 64 bytes; a 4096-byte payload cannot fit.
    let set = DependencySet {
        frame: vec![texture_update(UpdateRegion::Whole, 4096)],
        ..DependencySet::default()
    };

    let err = set.validate(&table, &resources).unwrap_err();
    assert_eq!(
        err,
        ValidateError::UpdateTooLarge {
            phase: Phase::Frame,
            record: 0,
            size: 4096,
            dst_size: 64,
        }
    );
}

#[test]
fn fixed_region_outside_the_texture_is_rejected() {
    let (table, resources) = realized_with_texture();

    let region = CopyRegion {
        x: 0,
        y: 0,
        z: 0,
        width: 8,
        height: 4,
        depth: 1,
    };
    let set = DependencySet {
        frame: vec![texture_update(UpdateRegion::Static(region), 64)],
        ..DependencySet::default()
    };

    let err = set.validate(&table, &resources).unwrap_err();
    assert_eq!(
        err,
        ValidateError::RegionOutOfBounds {
            phase: Phase::Frame,
            record: 0,
            region,
            max_x: 4,
            max_y: 4,
            max_z: 1,
        }
    );
}

#[test]
fn fixed_buffer_region_is_bounds_checked() {
    let (table, resources) = realized_with_buffers(&[16]);

    // Byte range 8..24 overruns a 16-byte buffer.
    let region = CopyRegion {
        x: 8,
        y: 0,
        z: 0,
        width: 16,
        height: 1,
        depth: 1,
    };
    let set = DependencySet {
        frame: vec![DependencyRecord::Copy(CopyOp::PartialUpdate {
            dst: CopyTarget::Buffer(BufferId(0)),
            subresource: 0,
            region: UpdateRegion::Static(region),
            producer: UpdateProducer::new(16, |_, out| out.fill(0)),
            row_pitch_bytes: 0,
            depth_pitch_bytes: 0,
        })],
        ..DependencySet::default()
    };

    let err = set.validate(&table, &resources).unwrap_err();
    assert_eq!(
        err,
        ValidateError::RegionOutOfBounds {
            phase: Phase::Frame,
            record: 0,
            region,
            max_x: 16,
            max_y: 1,
            max_z: 1,
        }
    );
}

#[test]
fn fitting_update_and_in_range_indices_pass() {
    let (table, resources) = realized_with_buffers(&[64, 16]);

    let set = DependencySet {
        init: vec![DependencyRecord::Copy(CopyOp::PartialUpdate {
            dst: CopyTarget::Buffer(BufferId(0)),
            subresource: 0,
            region: UpdateRegion::Whole,
            producer: UpdateProducer::new(64, |_, out| out.fill(1)),
            row_pitch_bytes: 0,
            depth_pitch_bytes: 0,
        })],
        frame: vec![DependencyRecord::Copy(CopyOp::WholeResource {
            src: CopyTarget::Buffer(BufferId(0)),
            dst: CopyTarget::Buffer(BufferId(1)),
        })],
        ..DependencySet::default()
    };
    assert!(set.validate(&table, &resources).is_ok());
}

#[test]
fn fitting_texture_region_passes() {
    let (table, resources) = realized_with_texture();

    let set = DependencySet {
        frame: vec![texture_update(
            UpdateRegion::Static(CopyRegion {
                x: 1,
                y: 1,
                z: 0,
                width: 2,
                height: 2,
                depth: 1,
            }),
            32,
        )],
        ..DependencySet::default()
    };
    assert!(set.validate(&table, &resources).is_ok());
}
