//! Data shapes supplied by the mesh/animation-import and shader-compilation
//! collaborators, plus the packing helpers the instance compiler uses to
//! turn them into GPU payloads.
//!
//! Nothing here parses a file format; the importer trait hands the engine
//! plain in-memory buffers and the engine only repacks them.

use std::path::Path;

use crate::device::{Format, InputLayoutDesc, ShaderStage, VertexAttribute, VertexSemantic};
use crate::error::{ImportError, ShaderBuildError};

/// One imported mesh: positions plus whatever optional channels the source
/// file carried. All per-vertex channels, when present, have exactly
/// `vertex_count` entries.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tangents: Option<Vec<[f32; 3]>>,
    pub binormals: Option<Vec<[f32; 3]>>,
    pub uv_channels: Vec<Vec<[f32; 2]>>,
    pub bone_indices: Option<Vec<[u16; 4]>>,
    pub bone_weights: Option<Vec<[f32; 4]>>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_skinnable(&self) -> bool {
        self.bone_indices.is_some() && self.bone_weights.is_some()
    }

    /// Derives the vertex layout implied by the channels this mesh carries.
    ///
    /// Attribute order is fixed (position, normal, tangent, binormal, UVs in
    /// channel order, bone indices, bone weights) so that two meshes with
    /// the same channel set produce structurally equal layouts and share one
    /// input-layout reservation.
    pub fn layout(&self) -> InputLayoutDesc {
        let mut attributes = Vec::new();
        let mut offset = 0u32;
        let mut push = |semantic: VertexSemantic, format: Format, offset: &mut u32| {
            attributes.push(VertexAttribute {
                semantic,
                format,
                offset_bytes: *offset,
            });
            *offset += format.bytes_per_element();
        };

        push(VertexSemantic::Position, Format::Rgb32Float, &mut offset);
        if self.normals.is_some() {
            push(VertexSemantic::Normal, Format::Rgb32Float, &mut offset);
        }
        if self.tangents.is_some() {
            push(VertexSemantic::Tangent, Format::Rgb32Float, &mut offset);
        }
        if self.binormals.is_some() {
            push(VertexSemantic::Binormal, Format::Rgb32Float, &mut offset);
        }
        for channel in 0..self.uv_channels.len() {
            push(
                VertexSemantic::TexCoord(channel as u8),
                Format::Rg32Float,
                &mut offset,
            );
        }
        if self.bone_indices.is_some() {
            push(VertexSemantic::BoneIndices, Format::Rgba16Uint, &mut offset);
        }
        if self.bone_weights.is_some() {
            push(VertexSemantic::BoneWeights, Format::Rgba32Float, &mut offset);
        }

        InputLayoutDesc {
            attributes,
            stride_bytes: offset,
        }
    }

    /// Interleaves every channel into one vertex buffer payload matching
    /// [`Self::layout`].
    pub fn pack_vertices(&self) -> Vec<u8> {
        let layout = self.layout();
        let mut out = Vec::with_capacity(layout.stride_bytes as usize * self.positions.len());
        for v in 0..self.positions.len() {
            out.extend_from_slice(bytemuck::cast_slice(&self.positions[v][..]));
            if let Some(normals) = &self.normals {
                out.extend_from_slice(bytemuck::cast_slice(&normals[v][..]));
            }
            if let Some(tangents) = &self.tangents {
                out.extend_from_slice(bytemuck::cast_slice(&tangents[v][..]));
            }
            if let Some(binormals) = &self.binormals {
                out.extend_from_slice(bytemuck::cast_slice(&binormals[v][..]));
            }
            for channel in &self.uv_channels {
                out.extend_from_slice(bytemuck::cast_slice(&channel[v][..]));
            }
            if let Some(bone_indices) = &self.bone_indices {
                out.extend_from_slice(bytemuck::cast_slice(&bone_indices[v][..]));
            }
            if let Some(bone_weights) = &self.bone_weights {
                out.extend_from_slice(bytemuck::cast_slice(&bone_weights[v][..]));
            }
        }
        out
    }

    pub fn pack_indices(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.indices).to_vec()
    }
}

/// One animation clip: `frame_count * bone_count` row-major 4×4 matrices,
/// frame-major.
#[derive(Clone, Debug, Default)]
pub struct AnimationClip {
    pub name: String,
    pub frame_count: u32,
    pub fps_hint: f32,
    pub bone_count: u32,
    pub matrices: Vec<[f32; 16]>,
}

impl AnimationClip {
    pub fn matrix_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.matrices.len() * 64);
        for m in &self.matrices {
            out.extend_from_slice(bytemuck::cast_slice(&m[..]));
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub parent: Option<u32>,
    pub first_child: u32,
    pub child_count: u32,
    pub inverse_bind: [f32; 16],
}

#[derive(Clone, Debug, Default)]
pub struct BoneHierarchy {
    pub bones: Vec<Bone>,
}

impl BoneHierarchy {
    pub fn bone_count(&self) -> u32 {
        self.bones.len() as u32
    }

    /// Packs the per-bone inverse bind matrices, in bone order.
    pub fn bind_pose_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bones.len() * 64);
        for bone in &self.bones {
            out.extend_from_slice(bytemuck::cast_slice(&bone.inverse_bind[..]));
        }
        out
    }
}

/// Everything one imported file contributes. A single file may carry several
/// meshes and clips; the compiler imports the file once and addresses its
/// contents by name.
#[derive(Clone, Debug, Default)]
pub struct ImportedFile {
    pub meshes: Vec<MeshData>,
    pub clips: Vec<AnimationClip>,
    pub skeleton: Option<BoneHierarchy>,
}

impl ImportedFile {
    pub fn mesh(&self, name: &str) -> Option<&MeshData> {
        self.meshes.iter().find(|m| m.name == name)
    }

    pub fn clip(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.iter().find(|c| c.name == name)
    }
}

/// Mesh/animation import collaborator (e.g. an FBX importer).
pub trait GeometryImporter {
    fn import(&mut self, path: &Path) -> Result<ImportedFile, ImportError>;
}

/// An opaque compiled shader blob plus its stage tag, as handed over by the
/// shader-compilation collaborator.
#[derive(Clone, Debug)]
pub struct CompiledShader {
    pub stage_tag: char,
    pub blob: Vec<u8>,
}

/// Shader compilation collaborator.
pub trait ShaderCompiler {
    fn compile(
        &mut self,
        path: &Path,
        entry: &str,
        stage: ShaderStage,
    ) -> Result<CompiledShader, ShaderBuildError>;
}
