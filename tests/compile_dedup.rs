//! Structural deduplication across instances: one import per file, one
//! compiled shader per (file, entry, stage), one texture per path, one
//! sampler per parameter set, one shared constant buffer per (name, size).

mod common;

use common::{init_tracing, push_param, quad_file, simple_instance, StubImporter, StubShaderCompiler};
use renderlink::compile::{Compiler, ConstantBufferParam, ShaderParamDesc};
use renderlink::device::{Format, SamplerDesc, ShaderStage, TextureDesc, TextureUsage};
use renderlink::error::CompileError;
use renderlink::handle::{ShaderId, SrvId};
use renderlink::record::{DependencyRecord, Phase, UpdateProducer};
use renderlink::trace::TraceDevice;
use renderlink::FrameState;

fn wood_texture_sized(width: u32) -> ShaderParamDesc {
    ShaderParamDesc::TextureFile {
        path: "textures/wood.png".into(),
        desc: TextureDesc {
            width,
            height: 64,
            mip_levels: 1,
            array_layers: 1,
            format: Format::Rgba8Unorm,
            usage: TextureUsage::SAMPLED,
            row_pitch_bytes: width * 4,
        },
    }
}

fn wood_texture() -> ShaderParamDesc {
    wood_texture_sized(64)
}

fn scene_cbuffer(with_producer: bool) -> ShaderParamDesc {
    ShaderParamDesc::ConstantBuffer(ConstantBufferParam {
        name: "scene".into(),
        size_bytes: 64,
        unique: false,
        update: Phase::Frame,
        producer: with_producer.then(|| UpdateProducer::new(64, |_, out| out.fill(0x5a))),
    })
}

#[test]
fn shared_assets_are_reserved_once() {
    init_tracing();
    let mut importer = StubImporter::with_file("scene.fbx", quad_file());
    let mut shaders = StubShaderCompiler::default();

    let mut a = simple_instance("crate_a", "scene.fbx");
    let mut b = simple_instance("crate_b", "scene.fbx");
    for instance in [&mut a, &mut b] {
        let pixel = instance.pixel.as_mut().unwrap();
        push_param(pixel, scene_cbuffer(true));
        push_param(pixel, wood_texture());
        push_param(pixel, ShaderParamDesc::Sampler(SamplerDesc::default()));
    }

    let mut device = TraceDevice::new();
    let scene = Compiler::new(&mut importer, &mut shaders)
        .compile(vec![a, b], &mut device, &FrameState::default())
        .unwrap();

    assert_eq!(importer.import_count, 1, "one import per file path");
    assert_eq!(shaders.compile_count, 2, "vs and ps compiled once each");
    assert_eq!(scene.table.shaders().len(), 2);
    assert_eq!(scene.table.textures().len(), 1);
    assert_eq!(scene.table.samplers().len(), 1);
    // Vertex buffer, index buffer, one shared constant buffer.
    assert_eq!(scene.table.buffers().len(), 3);
    assert_eq!(scene.table.srvs().len(), 1);
    assert_eq!(scene.table.layouts().len(), 1);

    // The shared buffer's update is emitted once, followed by both draws.
    assert_eq!(scene.deps.frame.len(), 3);
    assert!(matches!(scene.deps.frame[0], DependencyRecord::Copy(_)));

    // Both draws' pixel stages must resolve to the single shared view.
    let pixel_srvs = |record: &DependencyRecord| -> Vec<SrvId> {
        let DependencyRecord::Draw(draw) = record else {
            panic!("expected a draw record");
        };
        draw.stages[4].srvs.iter().flat_map(|b| b.ids.clone()).collect()
    };
    let a_srvs = pixel_srvs(&scene.deps.frame[1]);
    let b_srvs = pixel_srvs(&scene.deps.frame[2]);
    assert_eq!(a_srvs, vec![SrvId(0)]);
    assert_eq!(a_srvs, b_srvs, "both instances bind the same view index");
}

#[test]
fn texture_desc_conflict_keeps_the_first_reservation() {
    init_tracing();
    let mut importer = StubImporter::with_file("scene.fbx", quad_file());
    let mut shaders = StubShaderCompiler::default();

    let mut a = simple_instance("crate_a", "scene.fbx");
    let mut b = simple_instance("crate_b", "scene.fbx");
    push_param(a.pixel.as_mut().unwrap(), wood_texture_sized(64));
    push_param(b.pixel.as_mut().unwrap(), wood_texture_sized(128));

    let mut device = TraceDevice::new();
    let scene = Compiler::new(&mut importer, &mut shaders)
        .compile(vec![a, b], &mut device, &FrameState::default())
        .unwrap();

    assert_eq!(scene.table.textures().len(), 1);
    assert_eq!(scene.table.textures()[0].desc.width, 64, "first wins");
    assert_eq!(scene.table.srvs().len(), 1);
}

#[test]
fn catalog_addresses_shaders_by_file_and_stage() {
    let mut importer = StubImporter::with_file("scene.fbx", quad_file());
    let mut shaders = StubShaderCompiler::default();

    let instance = simple_instance("crate", "scene.fbx");
    let mut device = TraceDevice::new();
    let scene = Compiler::new(&mut importer, &mut shaders)
        .compile(vec![instance], &mut device, &FrameState::default())
        .unwrap();

    let path = std::path::Path::new("shaders/basic.fx");
    assert_eq!(scene.catalog.count(path, ShaderStage::Vertex), 1);
    assert_eq!(
        scene.catalog.lookup(path, ShaderStage::Vertex, 0),
        Some(ShaderId(0))
    );
    assert_eq!(
        scene.catalog.lookup(path, ShaderStage::Pixel, 0),
        Some(ShaderId(1))
    );
    assert_eq!(scene.catalog.lookup(path, ShaderStage::Pixel, 1), None);
}

#[test]
fn unknown_stage_tag_fails_compilation() {
    let mut importer = StubImporter::with_file("scene.fbx", quad_file());
    let mut shaders = StubShaderCompiler {
        tag_override: Some('q'),
        ..StubShaderCompiler::default()
    };

    let instance = simple_instance("crate", "scene.fbx");
    let mut device = TraceDevice::new();
    let err = Compiler::new(&mut importer, &mut shaders)
        .compile(vec![instance], &mut device, &FrameState::default())
        .unwrap_err();
    assert!(matches!(err, CompileError::ShaderDropped { tag: 'q', .. }));
}

#[test]
fn missing_vertex_stage_is_rejected() {
    let mut importer = StubImporter::with_file("scene.fbx", quad_file());
    let mut shaders = StubShaderCompiler::default();

    let mut instance = simple_instance("crate", "scene.fbx");
    instance.vertex = None;
    let mut device = TraceDevice::new();
    let err = Compiler::new(&mut importer, &mut shaders)
        .compile(vec![instance], &mut device, &FrameState::default())
        .unwrap_err();
    assert!(matches!(err, CompileError::MissingVertexStage { .. }));
}
