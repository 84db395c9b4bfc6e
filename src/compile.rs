//! The instance-to-dependency compiler: turns declarative render-instance
//! descriptions into a realized resource table plus the three dependency
//! lists.
//!
//! This is where the three coordinate spaces meet: instance-local parameter
//! slots, deduplicated descriptor indices, and dependency-record binding
//! indices. Deduplication is structural: one import per file path, one
//! compiled shader per (file, entry, stage), one texture per path, one
//! sampler per parameter set, one constant buffer per (name, size) unless
//! flagged unique. Reservation happens first for every instance, then one
//! realization pass, then record emission.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::context::FrameState;
use crate::descriptor::{ContentProducer, ContentSource, DescriptorTable, ViewSource};
use crate::device::{
    BufferDesc, BufferUsage, GpuDevice, IndexFormat, InputLayoutDesc, SamplerDesc, ShaderStage,
    TextureDesc, Topology, ViewShape,
};
use crate::error::CompileError;
use crate::geometry::{GeometryImporter, ImportedFile, ShaderCompiler};
use crate::handle::{BufferId, LayoutId, SamplerId, ShaderId, SrvId, UavId};
use crate::realize::{RealizedResources, Realizer};
use crate::record::{
    Binding, ComputeRecord, CopyOp, CopyTarget, DependencyRecord, DependencySet, DispatchArgs,
    DrawArgs, DrawInputs, DrawRecord, Phase, StageBindings, UpdateProducer, UpdateRegion,
    DRAW_STAGE_COUNT,
};

/// Thread-group width of the skinning compute shader.
const SKIN_GROUP_SIZE: u32 = 64;
/// Byte size of the per-skin parameter constant buffer.
const SKIN_PARAMS_BYTES: u32 = 16;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GeometryRef {
    pub path: PathBuf,
    pub mesh: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AnimationRef {
    pub path: PathBuf,
    pub clip: String,
}

/// GPU-skinning request: which compute shader deforms the mesh and which
/// clip drives it.
#[derive(Clone, Debug)]
pub struct SkinningDesc {
    pub shader_path: PathBuf,
    pub entry: String,
    pub animation: AnimationRef,
}

/// A constant-buffer parameter declaration.
///
/// Non-unique buffers deduplicate on `(name, size_bytes)` across all
/// instances; unique ones always get their own buffer. The optional producer
/// becomes a partial-update record in the declared phase; for a deduplicated
/// buffer only the first declaring instance's update is kept.
pub struct ConstantBufferParam {
    pub name: String,
    pub size_bytes: u32,
    pub unique: bool,
    pub update: Phase,
    pub producer: Option<UpdateProducer>,
}

/// Views an instance can bind without reserving anything itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WellKnownView {
    /// The skin deformation's output buffer, as a read-only view.
    SkinOutput,
}

/// One entry in a stage's ordered parameter list. Parameters of the same
/// kind occupy consecutive slots in declaration order, starting at slot 0.
pub enum ShaderParamDesc {
    ConstantBuffer(ConstantBufferParam),
    TextureFile { path: PathBuf, desc: TextureDesc },
    Sampler(SamplerDesc),
    WellKnown(WellKnownView),
}

/// A shader stage enabled on an instance: source file, entry point and the
/// ordered parameter list.
pub struct StageDesc {
    pub path: PathBuf,
    pub entry: String,
    pub params: Vec<ShaderParamDesc>,
}

impl StageDesc {
    pub fn new(path: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry: entry.into(),
            params: Vec::new(),
        }
    }
}

/// Declarative description of one thing to render.
#[derive(Default)]
pub struct RenderInstanceDesc {
    pub name: String,
    pub geometry: GeometryRef,
    pub topology: Topology,
    pub vertex: Option<StageDesc>,
    pub hull: Option<StageDesc>,
    pub domain: Option<StageDesc>,
    pub geometry_stage: Option<StageDesc>,
    pub pixel: Option<StageDesc>,
    pub skinning: Option<SkinningDesc>,
}

/// Shader addressing scheme: shader N within file F at stage S, in
/// compilation order.
#[derive(Debug, Default)]
pub struct ShaderCatalog {
    by_file: HashMap<(PathBuf, ShaderStage), Vec<ShaderId>>,
}

impl ShaderCatalog {
    fn record(&mut self, path: &Path, stage: ShaderStage, id: ShaderId) {
        self.by_file
            .entry((path.to_path_buf(), stage))
            .or_default()
            .push(id);
    }

    pub fn lookup(
        &self,
        path: &Path,
        stage: ShaderStage,
        index_in_file: usize,
    ) -> Option<ShaderId> {
        self.by_file
            .get(&(path.to_path_buf(), stage))?
            .get(index_in_file)
            .copied()
    }

    pub fn count(&self, path: &Path, stage: ShaderStage) -> usize {
        self.by_file
            .get(&(path.to_path_buf(), stage))
            .map_or(0, Vec::len)
    }
}

/// Everything the compiler produces: the tables and the dependency lists,
/// already validated against each other.
#[derive(Debug)]
pub struct CompiledScene {
    pub table: DescriptorTable,
    pub resources: RealizedResources,
    pub deps: DependencySet,
    pub catalog: ShaderCatalog,
}

/// Drives descriptor reservation, realization and record emission for a
/// list of render instances.
pub struct Compiler<'a> {
    importer: &'a mut dyn GeometryImporter,
    shaders: &'a mut dyn ShaderCompiler,
}

impl<'a> Compiler<'a> {
    pub fn new(
        importer: &'a mut dyn GeometryImporter,
        shaders: &'a mut dyn ShaderCompiler,
    ) -> Self {
        Self { importer, shaders }
    }

    pub fn compile(
        &mut self,
        instances: Vec<RenderInstanceDesc>,
        device: &mut dyn GpuDevice,
        frame: &FrameState,
    ) -> Result<CompiledScene, CompileError> {
        let mut builder = SceneBuilder {
            importer: &mut *self.importer,
            shaders: &mut *self.shaders,
            table: DescriptorTable::new(),
            catalog: ShaderCatalog::default(),
            imported: HashMap::new(),
            shader_ids: HashMap::new(),
            texture_ids: HashMap::new(),
            sampler_ids: HashMap::new(),
            cbuffer_ids: HashMap::new(),
            update_emitted: HashSet::new(),
            mesh_gpu: HashMap::new(),
            layout_ids: HashMap::new(),
            bind_pose: HashMap::new(),
            anim_buffers: HashMap::new(),
            skins: HashMap::new(),
        };

        // Import every referenced file exactly once and decide which mesh
        // buffers need storage capability before anything is reserved.
        let mut storage_meshes = HashSet::new();
        for instance in &instances {
            builder.ensure_imported(&instance.geometry.path)?;
            if let Some(skin) = &instance.skinning {
                builder.ensure_imported(&skin.animation.path)?;
                storage_meshes.insert((
                    instance.geometry.path.clone(),
                    instance.geometry.mesh.clone(),
                ));
            }
        }

        let mut plans = Vec::with_capacity(instances.len());
        for instance in instances {
            plans.push(builder.plan_instance(instance, &storage_meshes)?);
        }

        let mut resources = RealizedResources::new();
        Realizer::new().realize(&builder.table, device, frame, &mut resources)?;

        let deps = builder.emit(plans);
        deps.validate(&builder.table, &resources)?;

        debug!(
            init = deps.init.len(),
            resize = deps.resize.len(),
            frame = deps.frame.len(),
            "instance compilation complete"
        );
        Ok(CompiledScene {
            table: builder.table,
            resources,
            deps,
            catalog: builder.catalog,
        })
    }
}

type MeshKey = (PathBuf, String);
type SkinKey = (MeshKey, (PathBuf, String));

/// Per-mesh GPU state shared by every instance drawing that mesh.
#[derive(Clone, Debug)]
struct MeshGpu {
    vertex: BufferId,
    index: Option<BufferId>,
    layout: InputLayoutDesc,
    stride_bytes: u32,
    vertex_count: u32,
    index_count: u32,
}

/// Per-(geometry, animation) skinning state.
struct SkinGpu {
    shader: ShaderId,
    params_cb: BufferId,
    input_srv: SrvId,
    bind_pose_srv: SrvId,
    anim_srv: SrvId,
    out_buffer: BufferId,
    out_uav: UavId,
    out_srv: SrvId,
    /// Dedicated copy of the deformed output the draw reads as its vertex
    /// buffer.
    skinned_vb: BufferId,
    groups_x: u32,
    params_producer: Option<UpdateProducer>,
    emitted: bool,
}

struct StagePlan {
    shader: ShaderId,
    constant_buffers: Vec<BufferId>,
    srvs: Vec<SrvId>,
    samplers: Vec<SamplerId>,
}

struct InstancePlan {
    topology: Topology,
    mesh: MeshGpu,
    layout: LayoutId,
    skin: Option<SkinKey>,
    stages: [Option<StagePlan>; DRAW_STAGE_COUNT],
    /// (phase, destination, producer) for each constant-buffer update this
    /// instance contributes.
    updates: Vec<(Phase, BufferId, UpdateProducer)>,
}

struct SceneBuilder<'a> {
    importer: &'a mut dyn GeometryImporter,
    shaders: &'a mut dyn ShaderCompiler,
    table: DescriptorTable,
    catalog: ShaderCatalog,
    imported: HashMap<PathBuf, ImportedFile>,
    shader_ids: HashMap<(PathBuf, String, ShaderStage), ShaderId>,
    texture_ids: HashMap<PathBuf, (SrvId, TextureDesc)>,
    sampler_ids: HashMap<SamplerDesc, SamplerId>,
    cbuffer_ids: HashMap<(String, u32), BufferId>,
    /// Shared buffers that already have an update record scheduled.
    update_emitted: HashSet<BufferId>,
    mesh_gpu: HashMap<MeshKey, MeshGpu>,
    layout_ids: HashMap<(ShaderId, InputLayoutDesc), LayoutId>,
    bind_pose: HashMap<PathBuf, (SrvId, u32)>,
    anim_buffers: HashMap<(PathBuf, String), (SrvId, u32)>,
    skins: HashMap<SkinKey, SkinGpu>,
}

impl SceneBuilder<'_> {
    fn ensure_imported(&mut self, path: &Path) -> Result<(), CompileError> {
        if !self.imported.contains_key(path) {
            let file = self.importer.import(path)?;
            self.imported.insert(path.to_path_buf(), file);
        }
        Ok(())
    }

    fn ensure_shader(
        &mut self,
        path: &Path,
        entry: &str,
        stage: ShaderStage,
    ) -> Result<ShaderId, CompileError> {
        let key = (path.to_path_buf(), entry.to_owned(), stage);
        if let Some(id) = self.shader_ids.get(&key) {
            return Ok(*id);
        }
        let compiled = self.shaders.compile(path, entry, stage)?;
        let name = format!("{}:{}", path.display(), entry);
        let id = self
            .table
            .reserve_shader(compiled.stage_tag, compiled.blob, &name)
            .ok_or(CompileError::ShaderDropped {
                path: path.to_path_buf(),
                tag: compiled.stage_tag,
            })?;
        self.catalog.record(path, stage, id);
        self.shader_ids.insert(key, id);
        Ok(id)
    }

    fn ensure_texture(&mut self, path: &Path, desc: &TextureDesc) -> SrvId {
        if let Some((srv, first)) = self.texture_ids.get(path) {
            if first != desc {
                warn!(
                    path = %path.display(),
                    "texture requested with a different description; keeping the first reservation"
                );
            }
            return *srv;
        }
        let texture = self
            .table
            .reserve_texture(*desc, ContentSource::File(path.to_path_buf()));
        let srv = self.table.reserve_srv(
            ViewSource::Texture(texture),
            ViewShape::Texture2d {
                format: desc.format,
            },
        );
        self.texture_ids.insert(path.to_path_buf(), (srv, *desc));
        srv
    }

    fn ensure_sampler(&mut self, desc: SamplerDesc) -> SamplerId {
        if let Some(id) = self.sampler_ids.get(&desc) {
            return *id;
        }
        let id = self.table.reserve_sampler(desc);
        self.sampler_ids.insert(desc, id);
        id
    }

    fn ensure_cbuffer(&mut self, param: &ConstantBufferParam) -> BufferId {
        let desc = BufferDesc {
            size_bytes: param.size_bytes,
            stride_bytes: 0,
            usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
        };
        if param.unique {
            return self.table.reserve_buffer(desc, ContentSource::None);
        }
        let key = (param.name.clone(), param.size_bytes);
        if let Some(id) = self.cbuffer_ids.get(&key) {
            return *id;
        }
        let id = self.table.reserve_buffer(desc, ContentSource::None);
        self.cbuffer_ids.insert(key, id);
        id
    }

    fn ensure_mesh(
        &mut self,
        key: &MeshKey,
        storage_meshes: &HashSet<MeshKey>,
    ) -> Result<MeshGpu, CompileError> {
        if let Some(gpu) = self.mesh_gpu.get(key) {
            return Ok(gpu.clone());
        }
        let (packed_vertices, packed_indices, layout, vertex_count, index_count) = {
            let file = &self.imported[&key.0];
            let mesh = file.mesh(&key.1).ok_or_else(|| CompileError::MeshNotFound {
                path: key.0.clone(),
                mesh: key.1.clone(),
            })?;
            (
                mesh.pack_vertices(),
                mesh.pack_indices(),
                mesh.layout(),
                mesh.vertex_count(),
                mesh.index_count(),
            )
        };

        let mut usage = BufferUsage::VERTEX;
        if storage_meshes.contains(key) {
            usage |= BufferUsage::STORAGE;
        }
        let stride_bytes = layout.stride_bytes;
        let vertex = self.table.reserve_buffer(
            BufferDesc {
                size_bytes: packed_vertices.len() as u32,
                stride_bytes,
                usage,
            },
            ContentSource::Bytes(packed_vertices),
        );
        let index = (index_count > 0).then(|| {
            self.table.reserve_buffer(
                BufferDesc {
                    size_bytes: packed_indices.len() as u32,
                    stride_bytes: 4,
                    usage: BufferUsage::INDEX,
                },
                ContentSource::Bytes(packed_indices),
            )
        });

        let gpu = MeshGpu {
            vertex,
            index,
            layout,
            stride_bytes,
            vertex_count,
            index_count,
        };
        self.mesh_gpu.insert(key.clone(), gpu.clone());
        Ok(gpu)
    }

    fn ensure_layout(&mut self, shader: ShaderId, layout: &InputLayoutDesc) -> LayoutId {
        let key = (shader, layout.clone());
        if let Some(id) = self.layout_ids.get(&key) {
            return *id;
        }
        let id = self.table.reserve_layout(shader, layout.clone());
        self.layout_ids.insert(key, id);
        id
    }

    /// Reserves the shared bind-pose matrix view for a skeleton file and
    /// returns it with the bone count.
    ///
    /// The payload is produced at realize time, when the bone data is
    /// final, rather than captured eagerly at reservation.
    fn ensure_bind_pose(&mut self, path: &Path) -> Result<(SrvId, u32), CompileError> {
        if let Some(entry) = self.bind_pose.get(path) {
            return Ok(*entry);
        }
        let (bone_count, bytes) = {
            let file = &self.imported[path];
            let skeleton = file
                .skeleton
                .as_ref()
                .ok_or_else(|| CompileError::SkeletonMissing {
                    path: path.to_path_buf(),
                })?;
            (skeleton.bone_count(), skeleton.bind_pose_bytes())
        };
        let size_bytes = bytes.len() as u32;
        let buffer = self.table.reserve_buffer(
            BufferDesc {
                size_bytes,
                stride_bytes: 64,
                usage: BufferUsage::STORAGE,
            },
            ContentSource::Producer(ContentProducer::from_bytes(bytes)),
        );
        let srv = self.table.reserve_srv(
            ViewSource::Buffer(buffer),
            ViewShape::Structured {
                stride_bytes: 64,
                element_count: bone_count,
            },
        );
        self.bind_pose.insert(path.to_path_buf(), (srv, bone_count));
        Ok((srv, bone_count))
    }

    /// Reserves the shared matrix view for one animation clip and returns it
    /// with the clip's frame count.
    fn ensure_anim(&mut self, anim: &AnimationRef) -> Result<(SrvId, u32), CompileError> {
        let key = (anim.path.clone(), anim.clip.clone());
        if let Some(entry) = self.anim_buffers.get(&key) {
            return Ok(*entry);
        }
        let (matrix_count, frame_count, bytes) = {
            let file = &self.imported[&anim.path];
            let clip = file
                .clip(&anim.clip)
                .ok_or_else(|| CompileError::ClipNotFound {
                    path: anim.path.clone(),
                    clip: anim.clip.clone(),
                })?;
            (
                clip.matrices.len() as u32,
                clip.frame_count,
                clip.matrix_bytes(),
            )
        };
        let buffer = self.table.reserve_buffer(
            BufferDesc {
                size_bytes: bytes.len() as u32,
                stride_bytes: 64,
                usage: BufferUsage::STORAGE,
            },
            ContentSource::Bytes(bytes),
        );
        let srv = self.table.reserve_srv(
            ViewSource::Buffer(buffer),
            ViewShape::Structured {
                stride_bytes: 64,
                element_count: matrix_count,
            },
        );
        self.anim_buffers.insert(key, (srv, frame_count));
        Ok((srv, frame_count))
    }

    fn ensure_skin(
        &mut self,
        geometry: &GeometryRef,
        skin: &SkinningDesc,
        mesh: &MeshGpu,
    ) -> Result<SkinKey, CompileError> {
        let key: SkinKey = (
            (geometry.path.clone(), geometry.mesh.clone()),
            (skin.animation.path.clone(), skin.animation.clip.clone()),
        );
        if self.skins.contains_key(&key) {
            return Ok(key);
        }

        {
            let file = &self.imported[&geometry.path];
            let mesh_data = file
                .mesh(&geometry.mesh)
                .ok_or_else(|| CompileError::MeshNotFound {
                    path: geometry.path.clone(),
                    mesh: geometry.mesh.clone(),
                })?;
            if !mesh_data.is_skinnable() {
                return Err(CompileError::MeshNotSkinnable {
                    mesh: geometry.mesh.clone(),
                });
            }
        }

        let shader = self.ensure_shader(&skin.shader_path, &skin.entry, ShaderStage::Compute)?;
        let (bind_pose_srv, bone_count) = self.ensure_bind_pose(&geometry.path)?;
        let (anim_srv, frame_count) = self.ensure_anim(&skin.animation)?;
        let frame_count = frame_count.max(1);

        let input_srv = self.table.reserve_srv(
            ViewSource::Buffer(mesh.vertex),
            ViewShape::Structured {
                stride_bytes: mesh.stride_bytes,
                element_count: mesh.vertex_count,
            },
        );

        let out_size = mesh.stride_bytes * mesh.vertex_count;
        let out_buffer = self.table.reserve_buffer(
            BufferDesc {
                size_bytes: out_size,
                stride_bytes: mesh.stride_bytes,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_SRC,
            },
            ContentSource::None,
        );
        let out_shape = ViewShape::Structured {
            stride_bytes: mesh.stride_bytes,
            element_count: mesh.vertex_count,
        };
        let out_uav = self
            .table
            .reserve_uav(ViewSource::Buffer(out_buffer), out_shape);
        let out_srv = self
            .table
            .reserve_srv(ViewSource::Buffer(out_buffer), out_shape);
        let skinned_vb = self.table.reserve_buffer(
            BufferDesc {
                size_bytes: out_size,
                stride_bytes: mesh.stride_bytes,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            ContentSource::None,
        );

        let params_cb = self.table.reserve_buffer(
            BufferDesc {
                size_bytes: SKIN_PARAMS_BYTES,
                stride_bytes: 0,
                usage: BufferUsage::CONSTANT | BufferUsage::COPY_DST,
            },
            ContentSource::None,
        );
        let vertex_count = mesh.vertex_count;
        let params_producer = UpdateProducer::new(SKIN_PARAMS_BYTES, move |frame, out| {
            let tick = (frame.frame_index % frame_count as u64) as u32;
            out[0..4].copy_from_slice(&tick.to_le_bytes());
            out[4..8].copy_from_slice(&bone_count.to_le_bytes());
            out[8..12].copy_from_slice(&vertex_count.to_le_bytes());
            out[12..16].copy_from_slice(&0u32.to_le_bytes());
        });

        self.skins.insert(
            key.clone(),
            SkinGpu {
                shader,
                params_cb,
                input_srv,
                bind_pose_srv,
                anim_srv,
                out_buffer,
                out_uav,
                out_srv,
                skinned_vb,
                groups_x: vertex_count.div_ceil(SKIN_GROUP_SIZE),
                params_producer: Some(params_producer),
                emitted: false,
            },
        );
        Ok(key)
    }

    fn plan_stage(
        &mut self,
        instance_name: &str,
        desc: StageDesc,
        stage: ShaderStage,
        skin_out: Option<SrvId>,
        updates: &mut Vec<(Phase, BufferId, UpdateProducer)>,
    ) -> Result<StagePlan, CompileError> {
        let shader = self.ensure_shader(&desc.path, &desc.entry, stage)?;
        let mut plan = StagePlan {
            shader,
            constant_buffers: Vec::new(),
            srvs: Vec::new(),
            samplers: Vec::new(),
        };
        for param in desc.params {
            match param {
                ShaderParamDesc::ConstantBuffer(mut cb) => {
                    let id = self.ensure_cbuffer(&cb);
                    plan.constant_buffers.push(id);
                    if let Some(producer) = cb.producer.take() {
                        // For shared buffers only the first declaring
                        // instance's update survives.
                        if self.update_emitted.insert(id) {
                            updates.push((cb.update, id, producer));
                        }
                    }
                }
                ShaderParamDesc::TextureFile { path, desc } => {
                    let srv = self.ensure_texture(&path, &desc);
                    plan.srvs.push(srv);
                }
                ShaderParamDesc::Sampler(desc) => {
                    let id = self.ensure_sampler(desc);
                    plan.samplers.push(id);
                }
                ShaderParamDesc::WellKnown(WellKnownView::SkinOutput) => {
                    let srv = skin_out.ok_or(CompileError::WellKnownUnavailable {
                        instance: instance_name.to_owned(),
                        what: "the skin deformation output",
                    })?;
                    plan.srvs.push(srv);
                }
            }
        }
        Ok(plan)
    }

    fn plan_instance(
        &mut self,
        instance: RenderInstanceDesc,
        storage_meshes: &HashSet<MeshKey>,
    ) -> Result<InstancePlan, CompileError> {
        let RenderInstanceDesc {
            name,
            geometry,
            topology,
            vertex,
            hull,
            domain,
            geometry_stage,
            pixel,
            skinning,
        } = instance;
        let Some(vertex) = vertex else {
            return Err(CompileError::MissingVertexStage { name });
        };

        let mesh_key: MeshKey = (geometry.path.clone(), geometry.mesh.clone());
        let mesh = self.ensure_mesh(&mesh_key, storage_meshes)?;

        let skin_key = match &skinning {
            Some(skin) => Some(self.ensure_skin(&geometry, skin, &mesh)?),
            None => None,
        };
        let skin_out = skin_key.as_ref().map(|key| self.skins[key].out_srv);

        let mut updates = Vec::new();
        let mut stages: [Option<StagePlan>; DRAW_STAGE_COUNT] = Default::default();
        // Stage slots follow ShaderStage::DRAW_ORDER. The vertex stage is
        // planned first; its shader anchors the input layout.
        let vertex_plan =
            self.plan_stage(&name, vertex, ShaderStage::Vertex, skin_out, &mut updates)?;
        let vs_shader = vertex_plan.shader;
        stages[0] = Some(vertex_plan);
        let rest = [
            (1, ShaderStage::Hull, hull),
            (2, ShaderStage::Domain, domain),
            (3, ShaderStage::Geometry, geometry_stage),
            (4, ShaderStage::Pixel, pixel),
        ];
        for (slot, stage, desc) in rest {
            if let Some(desc) = desc {
                stages[slot] = Some(self.plan_stage(&name, desc, stage, skin_out, &mut updates)?);
            }
        }

        let layout = self.ensure_layout(vs_shader, &mesh.layout);

        Ok(InstancePlan {
            topology,
            mesh,
            layout,
            skin: skin_key,
            stages,
            updates,
        })
    }

    /// Emits the three dependency lists, in instance order.
    ///
    /// A skinned instance's draw is preceded in the frame list by the
    /// parameter update, the deformation dispatch and the whole-resource
    /// copy into the vertex buffer its draw reads. Instances sharing a
    /// (geometry, animation) pair share one deformation; only the first
    /// occurrence emits those records.
    fn emit(&mut self, plans: Vec<InstancePlan>) -> DependencySet {
        let mut deps = DependencySet::default();
        for plan in plans {
            for (phase, dst, producer) in plan.updates {
                let record = DependencyRecord::Copy(CopyOp::PartialUpdate {
                    dst: CopyTarget::Buffer(dst),
                    subresource: 0,
                    region: UpdateRegion::Whole,
                    producer,
                    row_pitch_bytes: 0,
                    depth_pitch_bytes: 0,
                });
                match phase {
                    Phase::Init => deps.init.push(record),
                    Phase::Resize => deps.resize.push(record),
                    Phase::Frame => deps.frame.push(record),
                }
            }

            let mut vertex_buffer = plan.mesh.vertex;
            if let Some(skin) = plan.skin.as_ref().and_then(|key| self.skins.get_mut(key)) {
                vertex_buffer = skin.skinned_vb;
                if !skin.emitted {
                    skin.emitted = true;

                    if let Some(producer) = skin.params_producer.take() {
                        deps.frame
                            .push(DependencyRecord::Copy(CopyOp::PartialUpdate {
                                dst: CopyTarget::Buffer(skin.params_cb),
                                subresource: 0,
                                region: UpdateRegion::Whole,
                                producer,
                                row_pitch_bytes: 0,
                                depth_pitch_bytes: 0,
                            }));
                    }

                    deps.frame.push(DependencyRecord::Compute(ComputeRecord {
                        stage: StageBindings {
                            shader: Some(skin.shader),
                            constant_buffers: vec![Binding::new(0, vec![skin.params_cb])],
                            samplers: Vec::new(),
                            srvs: vec![Binding::new(
                                0,
                                vec![skin.input_srv, skin.bind_pose_srv, skin.anim_srv],
                            )],
                            uavs: vec![Binding::new(0, vec![skin.out_uav])],
                        },
                        args: DispatchArgs::Dispatch {
                            x: skin.groups_x,
                            y: 1,
                            z: 1,
                        },
                    }));

                    deps.frame
                        .push(DependencyRecord::Copy(CopyOp::WholeResource {
                            src: CopyTarget::Buffer(skin.out_buffer),
                            dst: CopyTarget::Buffer(skin.skinned_vb),
                        }));
                }
            }

            let args = if plan.mesh.index.is_some() {
                DrawArgs::DrawIndexed {
                    index_count: plan.mesh.index_count,
                    first_index: 0,
                    base_vertex: 0,
                }
            } else {
                DrawArgs::Draw {
                    vertex_count: plan.mesh.vertex_count,
                    first_vertex: 0,
                }
            };
            let mut record = DrawRecord::new(
                DrawInputs {
                    vertex_buffer: Some(vertex_buffer),
                    vertex_stride_bytes: plan.mesh.stride_bytes,
                    vertex_offset_bytes: 0,
                    index_buffer: plan.mesh.index,
                    index_format: plan.mesh.index.map(|_| IndexFormat::Uint32),
                    layout: Some(plan.layout),
                    topology: plan.topology,
                },
                args,
            );
            for (slot, stage_plan) in plan.stages.into_iter().enumerate() {
                if let Some(stage_plan) = stage_plan {
                    let bindings = &mut record.stages[slot];
                    bindings.shader = Some(stage_plan.shader);
                    if !stage_plan.constant_buffers.is_empty() {
                        bindings
                            .constant_buffers
                            .push(Binding::new(0, stage_plan.constant_buffers));
                    }
                    if !stage_plan.samplers.is_empty() {
                        bindings.samplers.push(Binding::new(0, stage_plan.samplers));
                    }
                    if !stage_plan.srvs.is_empty() {
                        bindings.srvs.push(Binding::new(0, stage_plan.srvs));
                    }
                }
            }
            deps.frame.push(DependencyRecord::Draw(record));
        }
        deps
    }
}
