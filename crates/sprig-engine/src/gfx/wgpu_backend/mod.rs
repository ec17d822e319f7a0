//! [`GraphicsBackend`] on top of wgpu.
//!
//! Shader stages are WGSL. Compilation and linking run through the naga front
//! end in [`reflect`]; a linked program owns a render pipeline whose layout is
//! derived from its uniforms (group 0) plus the shared texture layout
//! (group 1). Draws are recorded and encoded into one render pass by
//! [`WgpuBackend::flush`].

mod frame;
pub mod reflect;

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroU64;

use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::device::Gpu;
use crate::gfx::{
    GraphicsBackend, ProgramId, ShaderId, ShaderStage, TextureId, UniformLocation, VertexArrayId,
};
use crate::sprite::SpriteVertex;

use frame::{DrawCall, FrameRecorder, UniformArena};
use reflect::{ProgramLayout, SAMPLER_BINDING, StageInterface, TEXTURE_BINDING};

const SPRITE_VERTEX_ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    0 => Float32x3, // position
    1 => Float32x2  // uv
];

fn sprite_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SpriteVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &SPRITE_VERTEX_ATTRS,
    }
}

struct CompiledShader {
    interface: StageInterface,
    module: wgpu::ShaderModule,
}

struct Program {
    layout: ProgramLayout,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    /// Current value of each uniform slot, same order as `layout.uniforms`.
    values: Vec<Vec<u8>>,
    bind_group: Option<(u64, wgpu::BindGroup)>,
}

impl Program {
    fn ensure_bind_group(&mut self, device: &wgpu::Device, arena: &wgpu::Buffer, generation: u64) {
        if matches!(&self.bind_group, Some((g, _)) if *g == generation) {
            return;
        }

        let entries: Vec<wgpu::BindGroupEntry<'_>> = self
            .layout
            .uniforms
            .iter()
            .map(|u| wgpu::BindGroupEntry {
                binding: u.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: arena,
                    offset: 0,
                    size: NonZeroU64::new(u.size as u64),
                }),
            })
            .collect();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprig program uniforms"),
            layout: &self.uniform_layout,
            entries: &entries,
        });
        self.bind_group = Some((generation, bind_group));
    }
}

struct VertexArray {
    buffer: wgpu::Buffer,
    vertex_count: u32,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// wgpu implementation of the GPU command seam.
///
/// Owns every shader, program, vertex array and texture it hands out. Draws
/// issued through [`GraphicsBackend::draw_triangles`] are staged until
/// [`flush`](Self::flush) encodes them.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    capabilities: naga::valid::Capabilities,

    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fallback_texture: TextureId,

    shaders: HashMap<ShaderId, CompiledShader>,
    programs: HashMap<ProgramId, Program>,
    vertex_arrays: HashMap<VertexArrayId, VertexArray>,
    textures: HashMap<TextureId, GpuTexture>,

    current_program: Option<ProgramId>,
    current_vertex_array: Option<VertexArrayId>,
    current_texture: TextureId,

    frame: FrameRecorder,
    arena: UniformArena,
    next_id: u32,

    warned_no_program: bool,
    warned_no_vertex_array: bool,
    warned_out_of_range: bool,
}

impl WgpuBackend {
    /// Creates a backend rendering into targets of `format`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment;
        let capabilities = reflect::capabilities_for(device.features());

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprig texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Sprites are pixel art more often than not; keep texels crisp.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprig sprite sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback_texture = TextureId(1);
        let white = upload_texture(&device, &queue, &texture_layout, &sampler, 1, 1, &[255; 4]);

        let mut textures = HashMap::new();
        textures.insert(fallback_texture, white);

        Self {
            device,
            queue,
            format,
            capabilities,
            texture_layout,
            sampler,
            fallback_texture,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures,
            current_program: None,
            current_vertex_array: None,
            current_texture: fallback_texture,
            frame: FrameRecorder::new(alignment),
            arena: UniformArena::default(),
            next_id: fallback_texture.0,
            warned_no_program: false,
            warned_no_vertex_array: false,
            warned_out_of_range: false,
        }
    }

    /// Creates a backend sharing `gpu`'s device and queue, targeting its surface format.
    pub fn for_gpu(gpu: &Gpu) -> Self {
        Self::new(gpu.device().clone(), gpu.queue().clone(), gpu.surface_format())
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Number of draws staged since the last flush.
    pub fn pending_draws(&self) -> usize {
        self.frame.draws.len()
    }

    /// Drops every draw staged since the last flush.
    ///
    /// For frames that will never be flushed, e.g. when the surface could not
    /// be acquired.
    pub fn discard_pending(&mut self) {
        if !self.frame.is_empty() {
            log::trace!("discarded {} unflushed sprite draws", self.frame.draws.len());
        }
        self.frame.clear();
    }

    /// Runs `create` inside a validation error scope.
    fn validated<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        match pollster::block_on(scope.pop()) {
            Some(err) => Err(format!("error: {err}")),
            None => Ok(value),
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Encodes every staged draw into `target`, preserving its contents.
    ///
    /// Uniform snapshots are uploaded in one write; the staging area is empty
    /// afterwards. Current program, bindings and uniform values carry over to
    /// the next frame.
    pub fn flush(&mut self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        if self.frame.is_empty() {
            self.frame.clear();
            return;
        }

        let (arena, generation) = self.arena.upload(&self.device, &self.queue, self.frame.bytes());

        let used: BTreeSet<ProgramId> = self.frame.draws.iter().map(|d| d.program).collect();
        for id in used {
            if let Some(program) = self.programs.get_mut(&id) {
                program.ensure_bind_group(&self.device, &arena, generation);
            }
        }

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprig sprite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let mut bound_program = None;
            for draw in &self.frame.draws {
                // Programs deleted after recording take their draws with them.
                let Some(program) = self.programs.get(&draw.program) else { continue };
                let Some((_, uniforms)) = program.bind_group.as_ref() else { continue };
                let Some(vertex_array) = self.vertex_arrays.get(&draw.vertex_array) else {
                    continue;
                };
                let Some(texture) = self
                    .textures
                    .get(&draw.texture)
                    .or_else(|| self.textures.get(&self.fallback_texture))
                else {
                    continue;
                };

                if bound_program != Some(draw.program) {
                    rpass.set_pipeline(&program.pipeline);
                    bound_program = Some(draw.program);
                }
                rpass.set_bind_group(0, uniforms, &draw.offsets);
                rpass.set_bind_group(1, &texture.bind_group, &[]);
                rpass.set_vertex_buffer(0, vertex_array.buffer.slice(..));
                rpass.draw(draw.first_vertex..draw.first_vertex + draw.vertex_count, 0..1);
            }
        }

        log::trace!("flushed {} sprite draws", self.frame.draws.len());
        self.frame.clear();
    }

    fn write_uniform(&mut self, location: UniformLocation, bytes: &[u8]) {
        let Some(program) = self.current_program.and_then(|id| self.programs.get_mut(&id)) else {
            return;
        };
        let Some((index, slot)) = program.layout.slot(location) else {
            log::trace!("no uniform at {location}; write ignored");
            return;
        };
        if slot.size as usize != bytes.len() {
            log::warn!(
                "uniform `{}` is {} bytes, got a {}-byte write; ignored",
                slot.name,
                slot.size,
                bytes.len()
            );
            return;
        }
        program.values[index].copy_from_slice(bytes);
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> GpuTexture {
    let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("sprig sprite texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("sprig sprite texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    GpuTexture { _texture: texture, bind_group }
}

impl GraphicsBackend for WgpuBackend {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let interface = reflect::compile(stage, source, self.capabilities)?;
        let module = self.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "sprig vertex shader",
                    ShaderStage::Fragment => "sprig fragment shader",
                }),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })?;

        let id = ShaderId(self.next_id());
        self.shaders.insert(id, CompiledShader { interface, module });
        Ok(id)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
    }

    fn link_program(&mut self, vertex: ShaderId, fragment: ShaderId) -> Result<ProgramId, String> {
        let vs = self
            .shaders
            .get(&vertex)
            .ok_or_else(|| format!("error: {vertex} is not a compiled shader"))?;
        let fs = self
            .shaders
            .get(&fragment)
            .ok_or_else(|| format!("error: {fragment} is not a compiled shader"))?;

        let layout = reflect::link(&vs.interface, &fs.interface)?;

        let entries: Vec<wgpu::BindGroupLayoutEntry> = layout
            .uniforms
            .iter()
            .map(|u| wgpu::BindGroupLayoutEntry {
                binding: u.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(u.size as u64),
                },
                count: None,
            })
            .collect();

        // Anything reflection missed is reported by wgpu as a link error.
        let (uniform_layout, pipeline) = self.validated(|device| {
            let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("sprig program uniform bgl"),
                entries: &entries,
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("sprig program pipeline layout"),
                bind_group_layouts: &[&uniform_layout, &self.texture_layout],
                immediate_size: 0,
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("sprig program pipeline"),
                layout: Some(&pipeline_layout),

                vertex: wgpu::VertexState {
                    module: &vs.module,
                    entry_point: Some(layout.vertex_entry.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[sprite_vertex_layout()],
                },

                fragment: Some(wgpu::FragmentState {
                    module: &fs.module,
                    entry_point: Some(layout.fragment_entry.as_str()),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
            (uniform_layout, pipeline)
        })?;

        let values = layout.uniforms.iter().map(|u| vec![0; u.size as usize]).collect();
        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            Program { layout, pipeline, uniform_layout, values, bind_group: None },
        );
        Ok(id)
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        self.current_program = Some(program);
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.layout.uniform_location(name)
    }

    fn set_uniform_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        self.write_uniform(location, bytemuck::cast_slice(&value.to_cols_array()));
    }

    fn set_uniform_vec4(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.write_uniform(location, bytemuck::cast_slice(&value));
    }

    fn create_vertex_array(&mut self, vertices: &[SpriteVertex]) -> VertexArrayId {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprig sprite vbo"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let id = VertexArrayId(self.next_id());
        self.vertex_arrays.insert(id, VertexArray { buffer, vertex_count: vertices.len() as u32 });
        id
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.current_vertex_array = Some(vertex_array);
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureId {
        let texture = upload_texture(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.sampler,
            width,
            height,
            rgba,
        );
        let id = TextureId(self.next_id());
        self.textures.insert(id, texture);
        id
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if texture == self.fallback_texture {
            return;
        }
        self.textures.remove(&texture);
        if self.current_texture == texture {
            self.current_texture = self.fallback_texture;
        }
    }

    fn bind_texture(&mut self, texture: TextureId) {
        self.current_texture = texture;
    }

    fn draw_triangles(&mut self, first_vertex: u32, vertex_count: u32) {
        let Some(program_id) = self.current_program else {
            if !self.warned_no_program {
                log::warn!("draw issued before any program was used; skipped");
                self.warned_no_program = true;
            }
            return;
        };
        let Some(program) = self.programs.get(&program_id) else { return };

        let Some(vertex_array_id) = self.current_vertex_array else {
            if !self.warned_no_vertex_array {
                log::warn!("draw issued with no vertex array bound; skipped");
                self.warned_no_vertex_array = true;
            }
            return;
        };
        let Some(vertex_array) = self.vertex_arrays.get(&vertex_array_id) else { return };

        let in_range = first_vertex
            .checked_add(vertex_count)
            .is_some_and(|end| end <= vertex_array.vertex_count);
        if !in_range {
            if !self.warned_out_of_range {
                log::warn!(
                    "draw of vertices {first_vertex}..+{vertex_count} exceeds {vertex_array_id} \
                     ({} vertices); skipped",
                    vertex_array.vertex_count
                );
                self.warned_out_of_range = true;
            }
            return;
        }

        let offsets = self.frame.push_uniforms(&program.values);
        self.frame.draws.push(DrawCall {
            program: program_id,
            vertex_array: vertex_array_id,
            texture: self.current_texture,
            first_vertex,
            vertex_count,
            offsets,
        });
    }
}
