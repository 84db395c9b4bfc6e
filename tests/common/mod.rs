#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use renderlink::compile::{
    AnimationRef, GeometryRef, RenderInstanceDesc, ShaderParamDesc, SkinningDesc, StageDesc,
    WellKnownView,
};
use renderlink::device::ShaderStage;
use renderlink::error::{ImportError, ShaderBuildError};
use renderlink::geometry::{
    AnimationClip, Bone, BoneHierarchy, CompiledShader, GeometryImporter, ImportedFile, MeshData,
    ShaderCompiler,
};

/// Importer backed by an in-memory map of prebuilt files. Counts calls so
/// tests can assert the one-import-per-path guarantee.
#[derive(Default)]
pub struct StubImporter {
    pub files: HashMap<PathBuf, ImportedFile>,
    pub import_count: usize,
}

impl StubImporter {
    pub fn with_file(path: impl Into<PathBuf>, file: ImportedFile) -> Self {
        let mut files = HashMap::new();
        files.insert(path.into(), file);
        Self {
            files,
            import_count: 0,
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, file: ImportedFile) {
        self.files.insert(path.into(), file);
    }
}

impl GeometryImporter for StubImporter {
    fn import(&mut self, path: &Path) -> Result<ImportedFile, ImportError> {
        self.import_count += 1;
        self.files.get(path).cloned().ok_or_else(|| ImportError {
            path: path.to_path_buf(),
            message: "no such file".into(),
        })
    }
}

/// Compiler that fabricates a small blob per (path, entry) pair. Counts
/// calls so tests can assert shader deduplication; `tag_override` forces a
/// bogus stage tag to exercise the reservation-drop path.
#[derive(Default)]
pub struct StubShaderCompiler {
    pub compile_count: usize,
    pub tag_override: Option<char>,
}

impl ShaderCompiler for StubShaderCompiler {
    fn compile(
        &mut self,
        path: &Path,
        entry: &str,
        stage: ShaderStage,
    ) -> Result<CompiledShader, ShaderBuildError> {
        self.compile_count += 1;
        Ok(CompiledShader {
            stage_tag: self.tag_override.unwrap_or(stage.tag()),
            blob: format!("{}:{entry}", path.display()).into_bytes(),
        })
    }
}

pub fn quad_mesh(name: &str) -> MeshData {
    MeshData {
        name: name.into(),
        positions: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ],
        normals: Some(vec![[0.0, 0.0, 1.0]; 4]),
        uv_channels: vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]],
        indices: vec![0, 1, 2, 2, 1, 3],
        ..MeshData::default()
    }
}

pub fn skinned_mesh(name: &str, vertex_count: usize) -> MeshData {
    MeshData {
        name: name.into(),
        positions: vec![[0.0; 3]; vertex_count],
        normals: Some(vec![[0.0, 1.0, 0.0]; vertex_count]),
        uv_channels: vec![vec![[0.5, 0.5]; vertex_count]],
        bone_indices: Some(vec![[0, 1, 0, 0]; vertex_count]),
        bone_weights: Some(vec![[0.5, 0.5, 0.0, 0.0]; vertex_count]),
        indices: (0..vertex_count as u32).collect(),
        ..MeshData::default()
    }
}

pub fn skeleton(bone_count: u32) -> BoneHierarchy {
    let identity = {
        let mut m = [0.0f32; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        m
    };
    BoneHierarchy {
        bones: (0..bone_count)
            .map(|i| Bone {
                name: format!("bone{i}"),
                parent: (i > 0).then(|| i - 1),
                first_child: 0,
                child_count: 0,
                inverse_bind: identity,
            })
            .collect(),
    }
}

pub fn clip(name: &str, frame_count: u32, bone_count: u32) -> AnimationClip {
    AnimationClip {
        name: name.into(),
        frame_count,
        fps_hint: 30.0,
        bone_count,
        matrices: vec![[0.0; 16]; (frame_count * bone_count) as usize],
    }
}

/// File with one unskinned quad.
pub fn quad_file() -> ImportedFile {
    ImportedFile {
        meshes: vec![quad_mesh("quad")],
        ..ImportedFile::default()
    }
}

/// File with one skinned mesh, a skeleton and one clip.
pub fn skinned_file(vertex_count: usize, bone_count: u32, frame_count: u32) -> ImportedFile {
    ImportedFile {
        meshes: vec![skinned_mesh("body", vertex_count)],
        clips: vec![clip("walk", frame_count, bone_count)],
        skeleton: Some(skeleton(bone_count)),
    }
}

/// Vertex+pixel instance over the quad in `geometry_path`.
pub fn simple_instance(name: &str, geometry_path: &str) -> RenderInstanceDesc {
    RenderInstanceDesc {
        name: name.into(),
        geometry: GeometryRef {
            path: geometry_path.into(),
            mesh: "quad".into(),
        },
        vertex: Some(StageDesc::new("shaders/basic.fx", "vs_main")),
        pixel: Some(StageDesc::new("shaders/basic.fx", "ps_main")),
        ..RenderInstanceDesc::default()
    }
}

/// Skinned instance over the "body" mesh in `geometry_path`, animated by the
/// "walk" clip in the same file.
pub fn skinned_instance(name: &str, geometry_path: &str) -> RenderInstanceDesc {
    let mut pixel = StageDesc::new("shaders/skinned.fx", "ps_main");
    pixel
        .params
        .push(ShaderParamDesc::WellKnown(WellKnownView::SkinOutput));
    RenderInstanceDesc {
        name: name.into(),
        geometry: GeometryRef {
            path: geometry_path.into(),
            mesh: "body".into(),
        },
        vertex: Some(StageDesc::new("shaders/skinned.fx", "vs_main")),
        pixel: Some(pixel),
        skinning: Some(SkinningDesc {
            shader_path: "shaders/skin_deform.fx".into(),
            entry: "cs_main".into(),
            animation: AnimationRef {
                path: geometry_path.into(),
                clip: "walk".into(),
            },
        }),
        ..RenderInstanceDesc::default()
    }
}

pub fn push_param(stage: &mut StageDesc, param: ShaderParamDesc) {
    stage.params.push(param);
}

/// Installs a compact tracing subscriber for the current test. Repeated
/// calls are fine; later ones are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
