//! wgpu backend.
//!
//! wgpu has no immediate-mode device context, so replay is recorded first and
//! encoded once in [`end_replay`](NativeRenderer2D::end_replay):
//!
//! - Buffer uploads go through `Queue::write_buffer` while replaying. Since
//!   every queued write lands before the frame's command buffer executes, a
//!   `Discard` upload moves on to a fresh buffer generation instead of
//!   overwriting data that earlier draws of the same frame still read.
//! - Each draw snapshots the bound state. Transforms are gathered into one
//!   uniform buffer and selected with a dynamic offset.
//! - A render target change starts a new render pass. Passes load and store
//!   the target, the renderer never clears.
//!
//! Only texture and sampler slot 0 are sampled by the shaders.

mod context;
mod pipeline;
mod sampler;

use std::sync::Arc;

use bitflags::bitflags;
use vesper_core::alloc::HashMap;
use vesper_core::geometry::{IntRect, Size};
use vesper_core::math::Mat3x2;
use vesper_core::profiling::{profile_function, profile_scope};

use crate::asset::{
    PixelShader, PixelShaderId, ShaderRegistry, StandardPixelShader, StandardShaderTable, Texture,
    TextureId, TextureRegistry,
};
use crate::backend::{BufferUploader, MapMode, NativeRenderer2D, NativeStateCache, pack_transform};
use crate::config::Renderer2DConfig;
use crate::error::{NativeError, Renderer2DError};
use crate::state::{BlendState, RasterizerState, SamplerState};
use crate::vertex::{Index, Vertex2D};

pub use context::{GraphicsContext, GraphicsContextDescriptor};
pub use pipeline::{FragmentProgram, PipelineCache, PipelineKey};
pub use sampler::SamplerCache;

const SHADER_SOURCE: &str = include_str!("../../shaders/renderer2d.wgsl");

/// Two `vec4<f32>` rows.
const TRANSFORM_SIZE: u64 = 32;

/// Format of textures created through [`WgpuRenderer2D::create_texture`].
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

bitflags! {
    /// Pass state that differs from the previous draw in the same pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Dirty: u8 {
        const PIPELINE  = 1 << 0;
        const TRANSFORM = 1 << 1;
        const TEXTURE   = 1 << 2;
        const VERTICES  = 1 << 3;
        const INDICES   = 1 << 4;
        const VIEWPORT  = 1 << 5;
        const SCISSOR   = 1 << 6;
    }
}

impl Dirty {
    fn between(prev: &DrawRecord, next: &DrawRecord) -> Self {
        let mut dirty = Dirty::empty();
        dirty.set(Dirty::PIPELINE, prev.pipeline != next.pipeline);
        dirty.set(Dirty::TRANSFORM, prev.transform != next.transform);
        dirty.set(Dirty::TEXTURE, prev.binding != next.binding);
        dirty.set(Dirty::VERTICES, prev.vertex_generation != next.vertex_generation);
        dirty.set(Dirty::INDICES, prev.index_generation != next.index_generation);
        dirty.set(Dirty::VIEWPORT, prev.viewport != next.viewport);
        dirty.set(Dirty::SCISSOR, prev.scissor != next.scissor);
        dirty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureBinding {
    texture: Option<TextureId>,
    sampler: SamplerState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DrawRecord {
    pipeline: PipelineKey,
    transform: u32,
    binding: TextureBinding,
    vertex_generation: usize,
    index_generation: usize,
    /// `None` covers the whole target.
    viewport: Option<IntRect>,
    /// `None` when scissoring is disabled.
    scissor: Option<IntRect>,
    first_index: u32,
    index_count: u32,
    base_vertex: u32,
}

struct PassRecord {
    target: TextureId,
    draws: Vec<DrawRecord>,
}

struct GpuTexture {
    // Kept alive for the view; frame targets are owned by the surface.
    _texture: Option<wgpu::Texture>,
    view: wgpu::TextureView,
    size: Size<u32>,
}

/// A vertex or index buffer streamed with `Queue::write_buffer`.
struct StreamBuffer {
    label: &'static str,
    usage: wgpu::BufferUsages,
    stride: u64,
    capacity: u32,
    generations: Vec<wgpu::Buffer>,
    current: Option<usize>,
}

impl StreamBuffer {
    fn new(label: &'static str, usage: wgpu::BufferUsages, stride: u64, capacity: u32) -> Self {
        Self {
            label,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            stride,
            capacity,
            generations: Vec::new(),
            current: None,
        }
    }

    fn reset(&mut self) {
        self.current = None;
    }

    fn write(
        &mut self,
        context: &GraphicsContext,
        first: u32,
        count: usize,
        bytes: &[u8],
        mode: MapMode,
    ) -> Result<(), NativeError> {
        let end = first as u64 + count as u64;
        if end > self.capacity as u64 {
            return Err(NativeError::Upload(format!(
                "{} range {}..{} exceeds capacity {}",
                self.label, first, end, self.capacity
            )));
        }

        let generation = match (mode, self.current) {
            (MapMode::Discard, Some(current)) => current + 1,
            (MapMode::NoOverwrite, Some(current)) => current,
            (_, None) => 0,
        };
        while self.generations.len() <= generation {
            tracing::debug!("Allocating {} generation {}", self.label, self.generations.len());
            self.generations.push(context.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: self.capacity as u64 * self.stride,
                usage: self.usage,
                mapped_at_creation: false,
            }));
        }
        self.current = Some(generation);

        if !bytes.is_empty() {
            context
                .queue
                .write_buffer(&self.generations[generation], first as u64 * self.stride, bytes);
        }
        Ok(())
    }

    fn buffer(&self, generation: usize) -> Option<&wgpu::Buffer> {
        self.generations.get(generation)
    }
}

/// Per-frame transforms in one uniform buffer, one aligned entry per
/// `set_transform`.
struct TransformRing {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: usize,
    stride: u64,
    staging: Vec<u8>,
}

impl TransformRing {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, alignment: u32) -> Self {
        let stride = TRANSFORM_SIZE.max(alignment as u64).next_multiple_of(alignment.max(1) as u64);
        let (buffer, bind_group) = Self::allocate(device, layout, stride, 64);
        Self {
            buffer,
            bind_group,
            capacity: 64,
            stride,
            staging: Vec::new(),
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vesper_transform_buffer"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vesper_transform_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(TRANSFORM_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn upload(
        &mut self,
        context: &GraphicsContext,
        layout: &wgpu::BindGroupLayout,
        transforms: &[[[f32; 4]; 2]],
    ) {
        if transforms.len() > self.capacity {
            let capacity = transforms.len().next_power_of_two();
            tracing::debug!("Growing transform buffer to {} entries", capacity);
            let (buffer, bind_group) = Self::allocate(&context.device, layout, self.stride, capacity);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = capacity;
        }

        let stride = self.stride as usize;
        self.staging.clear();
        self.staging.resize(transforms.len() * stride, 0);
        for (entry, rows) in self.staging.chunks_exact_mut(stride).zip(transforms) {
            entry[..TRANSFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(rows));
        }
        if !self.staging.is_empty() {
            context.queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }

    fn offset(&self, index: u32) -> u32 {
        (index as u64 * self.stride) as u32
    }
}

fn compile_module(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, Renderer2DError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(Renderer2DError::ShaderCompilation {
            label: label.to_string(),
            log: error.to_string(),
        }),
        None => Ok(module),
    }
}

fn intersect(a: IntRect, b: IntRect) -> Option<IntRect> {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = a.x.saturating_add(a.width).min(b.x.saturating_add(b.width));
    let y1 = a.y.saturating_add(a.height).min(b.y.saturating_add(b.height));
    (x1 > x0 && y1 > y0).then(|| IntRect::new(x0, y0, x1 - x0, y1 - y0))
}

/// [`NativeRenderer2D`] on top of wgpu.
pub struct WgpuRenderer2D {
    context: Arc<GraphicsContext>,
    format: wgpu::TextureFormat,
    texture_registry: Arc<TextureRegistry>,
    shader_registry: Arc<ShaderRegistry>,

    transform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipelines: PipelineCache,
    programs: HashMap<PixelShaderId, FragmentProgram>,
    standard: [PixelShader; 4],
    samplers: SamplerCache,

    textures: HashMap<TextureId, GpuTexture>,
    white: GpuTexture,
    texture_bind_groups: HashMap<TextureBinding, wgpu::BindGroup>,

    vertices: StreamBuffer,
    indices: StreamBuffer,
    transforms: Vec<[[f32; 4]; 2]>,
    transform_ring: TransformRing,

    state: NativeStateCache,
    transform: Option<u32>,
    passes: Vec<PassRecord>,
}

impl WgpuRenderer2D {
    /// Creates the backend. Render targets bound later must use `format`.
    pub fn new(
        context: Arc<GraphicsContext>,
        format: wgpu::TextureFormat,
        textures: Arc<TextureRegistry>,
        shaders: Arc<ShaderRegistry>,
        config: &Renderer2DConfig,
    ) -> Result<Self, Renderer2DError> {
        profile_function!();
        let device = &context.device;

        let module = compile_module(device, "vesper_renderer2d_shader", SHADER_SOURCE)?;

        let transform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vesper_transform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(TRANSFORM_SIZE),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vesper_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vesper_renderer2d_pipeline_layout"),
            bind_group_layouts: &[&transform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let standard = StandardPixelShader::ALL.map(|shader| shaders.create_pixel_shader(shader.label()));
        let mut programs = HashMap::new();
        for (kind, handle) in StandardPixelShader::ALL.iter().zip(&standard) {
            programs.insert(
                handle.id(),
                FragmentProgram {
                    module: module.clone(),
                    entry_point: format!("fs_{}", kind.label()),
                },
            );
        }

        let white = Self::upload_texture(&context, 1, 1, &[255; 4]);
        let transform_ring = TransformRing::new(
            device,
            &transform_layout,
            context.min_uniform_buffer_offset_alignment(),
        );
        let vertex_stride = std::mem::size_of::<Vertex2D>() as u64;
        let index_stride = std::mem::size_of::<Index>() as u64;

        tracing::info!(
            "WgpuRenderer2D ready: {:?}, {} vertex / {} index buffer capacity",
            format,
            config.batch_vertex_capacity,
            config.batch_index_capacity
        );

        Ok(Self {
            pipelines: PipelineCache::new(pipeline_layout, module, context.supports_wireframe()),
            vertices: StreamBuffer::new(
                "vesper_vertex_buffer",
                wgpu::BufferUsages::VERTEX,
                vertex_stride,
                config.batch_vertex_capacity,
            ),
            indices: StreamBuffer::new(
                "vesper_index_buffer",
                wgpu::BufferUsages::INDEX,
                index_stride,
                config.batch_index_capacity,
            ),
            context,
            format,
            texture_registry: textures,
            shader_registry: shaders,
            transform_layout,
            texture_layout,
            programs,
            standard,
            samplers: SamplerCache::new(),
            textures: HashMap::new(),
            white,
            texture_bind_groups: HashMap::new(),
            transforms: Vec::new(),
            transform_ring,
            state: NativeStateCache::default(),
            transform: None,
            passes: Vec::new(),
        })
    }

    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Creates an RGBA8 texture from tightly packed pixels.
    pub fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Texture {
        let handle = self.texture_registry.create_texture(width, height);
        let texture = Self::upload_texture(&self.context, width, height, rgba);
        self.insert_texture(handle.id(), texture);
        handle
    }

    /// Creates an offscreen target in the backend's format that can also be
    /// sampled.
    pub fn create_render_target(&mut self, width: u32, height: u32) -> Texture {
        let handle = self.texture_registry.create_render_target(width, height);
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vesper_render_target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.insert_texture(
            handle.id(),
            GpuTexture {
                _texture: Some(texture),
                view,
                size: Size::new(width, height),
            },
        );
        handle
    }

    /// Binds an application-created texture to a registered handle.
    pub fn register_texture(&mut self, handle: &Texture, texture: wgpu::Texture) {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.insert_texture(
            handle.id(),
            GpuTexture {
                _texture: Some(texture),
                view,
                size: handle.info().size,
            },
        );
    }

    /// Points `target` at this frame's surface view. Call before every flush
    /// that renders to the window.
    pub fn set_frame_target(&mut self, target: &Texture, view: wgpu::TextureView) {
        self.insert_texture(
            target.id(),
            GpuTexture {
                _texture: None,
                view,
                size: target.info().size,
            },
        );
    }

    /// Compiles a WGSL module and registers `entry_point` as a pixel shader.
    ///
    /// The module must declare the same `VertexOutput` and group 1 bindings as
    /// the built-in shaders.
    pub fn register_pixel_shader(
        &mut self,
        label: &str,
        source: &str,
        entry_point: &str,
    ) -> Result<PixelShader, Renderer2DError> {
        let module = compile_module(&self.context.device, label, source)?;
        let handle = self.shader_registry.create_pixel_shader(label);
        self.programs.insert(
            handle.id(),
            FragmentProgram {
                module,
                entry_point: entry_point.to_string(),
            },
        );
        tracing::debug!("Registered pixel shader '{}' as {:?}", label, handle.id());
        Ok(handle)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn upload_texture(context: &GraphicsContext, width: u32, height: u32, rgba: &[u8]) -> GpuTexture {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vesper_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let expected = size.width as usize * size.height as usize * 4;
        if rgba.len() >= expected {
            context.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &rgba[..expected],
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(size.width * 4),
                    rows_per_image: Some(size.height),
                },
                size,
            );
        } else {
            tracing::warn!(
                "Texture data too short ({} bytes for {}x{}), left uninitialized",
                rgba.len(),
                width,
                height
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture {
            _texture: Some(texture),
            view,
            size: Size::new(width, height),
        }
    }

    fn insert_texture(&mut self, id: TextureId, texture: GpuTexture) {
        self.textures.insert(id, texture);
        self.texture_bind_groups.retain(|binding, _| binding.texture != Some(id));
    }

    fn release_resources(&mut self) {
        for id in self.texture_registry.drain_released() {
            self.textures.remove(&id);
            self.texture_bind_groups.retain(|binding, _| binding.texture != Some(id));
        }
        for id in self.shader_registry.drain_released() {
            self.programs.remove(&id);
            self.pipelines.remove_shader(id);
        }
    }

    fn prepare(&mut self, draw: &DrawRecord) {
        match self.programs.get(&draw.pipeline.shader) {
            Some(fragment) => {
                self.pipelines
                    .get_or_create(&self.context.device, draw.pipeline, fragment);
            }
            None => tracing::warn!("Pixel shader {:?} is not registered", draw.pipeline.shader),
        }

        if self.texture_bind_groups.contains_key(&draw.binding) {
            return;
        }
        let view = match draw.binding.texture {
            Some(id) => match self.textures.get(&id) {
                Some(texture) => &texture.view,
                None => {
                    tracing::warn!("Texture {:?} has no GPU data, sampling white", id);
                    &self.white.view
                }
            },
            None => &self.white.view,
        };
        let sampler = self
            .samplers
            .get_or_create(&self.context.device, draw.binding.sampler);
        let bind_group = self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vesper_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        self.texture_bind_groups.insert(draw.binding, bind_group);
    }

    fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, pass: &PassRecord) {
        let Some(target) = self.textures.get(&pass.target) else {
            tracing::warn!(
                "Render target {:?} has no GPU view, skipping {} draws",
                pass.target,
                pass.draws.len()
            );
            return;
        };
        let bounds = IntRect::from_size(target.size);

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("vesper_renderer2d_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let mut previous: Option<&DrawRecord> = None;
        for draw in &pass.draws {
            let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                continue;
            };
            let Some(texture_group) = self.texture_bind_groups.get(&draw.binding) else {
                continue;
            };
            let (Some(vertex_buffer), Some(index_buffer)) = (
                self.vertices.buffer(draw.vertex_generation),
                self.indices.buffer(draw.index_generation),
            ) else {
                continue;
            };
            // Fully clipped draws produce nothing.
            let Some(viewport) = intersect(draw.viewport.unwrap_or(bounds), bounds) else {
                continue;
            };
            let Some(scissor) = intersect(draw.scissor.unwrap_or(bounds), bounds) else {
                continue;
            };

            let dirty = previous.map_or(Dirty::all(), |prev| Dirty::between(prev, draw));
            if dirty.contains(Dirty::PIPELINE) {
                render_pass.set_pipeline(pipeline);
            }
            if dirty.contains(Dirty::TRANSFORM) {
                render_pass.set_bind_group(
                    0,
                    &self.transform_ring.bind_group,
                    &[self.transform_ring.offset(draw.transform)],
                );
            }
            if dirty.contains(Dirty::TEXTURE) {
                render_pass.set_bind_group(1, texture_group, &[]);
            }
            if dirty.contains(Dirty::VERTICES) {
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            }
            if dirty.contains(Dirty::INDICES) {
                render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            }
            if dirty.contains(Dirty::VIEWPORT) {
                render_pass.set_viewport(
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.width as f32,
                    viewport.height as f32,
                    0.0,
                    1.0,
                );
            }
            if dirty.contains(Dirty::SCISSOR) {
                render_pass.set_scissor_rect(
                    scissor.x as u32,
                    scissor.y as u32,
                    scissor.width as u32,
                    scissor.height as u32,
                );
            }

            render_pass.draw_indexed(
                draw.first_index..draw.first_index + draw.index_count,
                draw.base_vertex as i32,
                0..1,
            );
            previous = Some(draw);
        }
    }
}

impl BufferUploader for WgpuRenderer2D {
    fn upload_vertices(
        &mut self,
        first: u32,
        vertices: &[Vertex2D],
        mode: MapMode,
    ) -> Result<(), NativeError> {
        self.vertices.write(
            &self.context,
            first,
            vertices.len(),
            bytemuck::cast_slice(vertices),
            mode,
        )
    }

    fn upload_indices(&mut self, first: u32, indices: &[Index], mode: MapMode) -> Result<(), NativeError> {
        self.indices
            .write(&self.context, first, indices.len(), bytemuck::cast_slice(indices), mode)
    }
}

impl NativeRenderer2D for WgpuRenderer2D {
    fn standard_shaders(&self) -> StandardShaderTable {
        StandardShaderTable::new(self.standard.each_ref().map(|handle| handle.id()))
    }

    fn begin_replay(&mut self) {
        self.release_resources();
        self.vertices.reset();
        self.indices.reset();
        self.transforms.clear();
        self.transform = None;
        self.passes.clear();
        self.state.invalidate();
    }

    fn set_blend_state(&mut self, state: BlendState) {
        self.state.blend.update(state);
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.state.rasterizer.update(state);
    }

    fn set_sampler_state(&mut self, slot: u32, state: SamplerState) {
        if let Some(cached) = self.state.samplers.get_mut(slot as usize) {
            cached.update(state);
        }
    }

    fn set_scissor_rect(&mut self, rect: IntRect) {
        self.state.scissor.update(rect);
    }

    fn set_viewport(&mut self, rect: IntRect) {
        self.state.viewport.update(rect);
    }

    fn set_transform(&mut self, matrix: &Mat3x2) {
        let packed = pack_transform(matrix);
        if self.transform.and_then(|i| self.transforms.get(i as usize)) == Some(&packed) {
            return;
        }
        self.transform = Some(self.transforms.len() as u32);
        self.transforms.push(packed);
    }

    fn set_pixel_shader(&mut self, shader: PixelShaderId) {
        self.state.pixel_shader.update(shader);
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureId>) {
        if let Some(cached) = self.state.textures.get_mut(slot as usize) {
            cached.update(texture);
        }
    }

    fn set_render_target(&mut self, texture: TextureId) {
        if self.state.render_target.update(texture) {
            self.passes.push(PassRecord {
                target: texture,
                draws: Vec::new(),
            });
        }
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: u32) {
        if index_count == 0 {
            return;
        }
        let Some(shader) = self.state.pixel_shader.get() else {
            tracing::warn!("Draw without a pixel shader, skipped");
            return;
        };
        let (Some(vertex_generation), Some(index_generation)) =
            (self.vertices.current, self.indices.current)
        else {
            tracing::warn!("Draw before any buffer upload, skipped");
            return;
        };
        let transform = match self.transform {
            Some(index) => index,
            None => {
                self.set_transform(&Mat3x2::IDENTITY);
                self.transform.unwrap_or_default()
            }
        };

        let rasterizer = self.state.rasterizer.get().unwrap_or_default();
        let record = DrawRecord {
            pipeline: PipelineKey::new(
                self.state.blend.get().unwrap_or_default(),
                rasterizer,
                shader,
                self.format,
            ),
            transform,
            binding: TextureBinding {
                texture: self.state.textures[0].get().flatten(),
                sampler: self.state.samplers[0].get().unwrap_or_default(),
            },
            vertex_generation,
            index_generation,
            viewport: self.state.viewport.get(),
            scissor: if rasterizer.scissor_enable {
                self.state.scissor.get()
            } else {
                None
            },
            first_index,
            index_count,
            base_vertex,
        };

        match self.passes.last_mut() {
            Some(pass) => pass.draws.push(record),
            None => tracing::warn!("Draw before any render target was bound, skipped"),
        }
    }

    fn end_replay(&mut self) {
        profile_function!();
        let passes = std::mem::take(&mut self.passes);
        if passes.iter().all(|pass| pass.draws.is_empty()) {
            self.passes = passes;
            return;
        }

        self.transform_ring
            .upload(&self.context, &self.transform_layout, &self.transforms);
        {
            profile_scope!("prepare_draws");
            for draw in passes.iter().flat_map(|pass| pass.draws.iter()) {
                self.prepare(draw);
            }
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vesper_renderer2d_encoder"),
            });
        for pass in &passes {
            self.encode_pass(&mut encoder, pass);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));

        self.passes = passes;
        self.passes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersect_clips_to_bounds() {
        let bounds = IntRect::new(0, 0, 800, 600);
        assert_eq!(
            intersect(IntRect::new(-10, 500, 100, 200), bounds),
            Some(IntRect::new(0, 500, 90, 100))
        );
        assert_eq!(intersect(IntRect::new(900, 0, 10, 10), bounds), None);
        assert_eq!(intersect(IntRect::new(0, 0, 0, 10), bounds), None);
    }

    #[test]
    fn test_dirty_between_draws() {
        let key = PipelineKey::new(
            BlendState::Alpha,
            RasterizerState::default(),
            PixelShaderId::from_raw(1),
            wgpu::TextureFormat::Bgra8UnormSrgb,
        );
        let draw = DrawRecord {
            pipeline: key,
            transform: 0,
            binding: TextureBinding {
                texture: None,
                sampler: SamplerState::default(),
            },
            vertex_generation: 0,
            index_generation: 0,
            viewport: None,
            scissor: None,
            first_index: 0,
            index_count: 6,
            base_vertex: 0,
        };
        let next = DrawRecord {
            transform: 1,
            index_generation: 1,
            first_index: 6,
            ..draw
        };
        assert_eq!(Dirty::between(&draw, &draw), Dirty::empty());
        assert_eq!(Dirty::between(&draw, &next), Dirty::TRANSFORM | Dirty::INDICES);
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_renders_to_offscreen_target() {
        use crate::{Color, Renderer2D};
        use vesper_core::geometry::FloatRect;

        let Ok(context) = GraphicsContext::new_owned_sync() else {
            return;
        };
        let textures = TextureRegistry::new();
        let shaders = ShaderRegistry::new();
        let config = Renderer2DConfig::default().with_batch_capacity(1024, 4096);
        let Ok(mut backend) = WgpuRenderer2D::new(
            context,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            textures.clone(),
            shaders,
            &config,
        ) else {
            return;
        };
        let target = backend.create_render_target(64, 64);

        let mut renderer = Renderer2D::new(backend, textures, target, config);
        renderer.add_rect(&FloatRect::new(8.0, 8.0, 16.0, 16.0), Color::RED);
        renderer.add_circle(vesper_core::math::Vec2::new(40.0, 40.0), 10.0, Color::WHITE);
        let stats = renderer.flush(true);

        assert_eq!(stats.batches, 1);
        assert!(stats.draw_calls >= 1);
        assert!(renderer.backend().pipeline_count() >= 1);
    }
}
