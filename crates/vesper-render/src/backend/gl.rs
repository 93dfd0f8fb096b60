//! OpenGL 3.3 / ES 3.0 backend on top of `glow`.
//!
//! GL has an immediate-mode context, so every [`NativeRenderer2D`] call maps
//! straight onto GL state. Calls are deduplicated against a
//! [`NativeStateCache`] that lives as long as the backend.
//!
//! GL framebuffers have a bottom-left origin; scissor and viewport rects are
//! flipped against the height of the bound target.

use std::sync::Arc;

use glow::HasContext;
use vesper_core::alloc::HashMap;
use vesper_core::geometry::{IntRect, Size};
use vesper_core::math::Mat3x2;
use vesper_core::profiling::profile_function;

use crate::asset::{
    PixelShader, PixelShaderId, ShaderRegistry, StandardPixelShader, StandardShaderTable, Texture,
    TextureId, TextureRegistry,
};
use crate::backend::{BufferUploader, MapMode, NativeRenderer2D, NativeStateCache, pack_transform};
use crate::config::Renderer2DConfig;
use crate::error::{NativeError, Renderer2DError};
use crate::state::{
    AddressMode, BlendFactor, BlendOp, BlendState, CullMode, FillMode, FilterMode, RasterizerState,
    SamplerState,
};
use crate::vertex::{Index, Vertex2D};

const VERTEX_SOURCE: &str = include_str!("../shaders/gl/renderer2d.vert");

fn standard_fragment_source(shader: StandardPixelShader) -> &'static str {
    match shader {
        StandardPixelShader::Shape => include_str!("../shaders/gl/shape.frag"),
        StandardPixelShader::Texture => include_str!("../shaders/gl/texture.frag"),
        StandardPixelShader::SquareDot => include_str!("../shaders/gl/square_dot.frag"),
        StandardPixelShader::RoundDot => include_str!("../shaders/gl/round_dot.frag"),
    }
}

/// GLSL dialect the shaders are compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GlslVersion {
    /// `#version 330 core`
    #[default]
    Core330,
    /// `#version 300 es`, for GLES 3.0 and WebGL2.
    Es300,
}

impl GlslVersion {
    fn header(self) -> &'static str {
        match self {
            GlslVersion::Core330 => "#version 330 core\n",
            GlslVersion::Es300 => "#version 300 es\nprecision highp float;\n",
        }
    }
}

fn to_gl_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
    }
}

fn to_gl_op(op: BlendOp) -> u32 {
    match op {
        BlendOp::Add => glow::FUNC_ADD,
        BlendOp::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
    }
}

fn to_gl_wrap(mode: AddressMode) -> i32 {
    (match mode {
        AddressMode::Repeat => glow::REPEAT,
        AddressMode::Mirror => glow::MIRRORED_REPEAT,
        AddressMode::Clamp => glow::CLAMP_TO_EDGE,
    }) as i32
}

fn to_gl_filter(filter: FilterMode) -> i32 {
    (match filter {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
    }) as i32
}

/// Converts a top-left origin rect into GL's bottom-left window coordinates.
fn flip_rect(rect: IntRect, target_height: u32) -> IntRect {
    let height = i32::try_from(target_height).unwrap_or(i32::MAX);
    IntRect::new(rect.x, height - (rect.y + rect.height), rect.width.max(0), rect.height.max(0))
}

struct GlProgram {
    program: glow::Program,
    transform: Option<glow::UniformLocation>,
    /// Transform version last uploaded to this program.
    transform_version: u64,
}

struct GlTexture {
    texture: Option<glow::Texture>,
    /// `None` with no texture means the default framebuffer.
    framebuffer: Option<glow::Framebuffer>,
    size: Size<u32>,
}

/// [`NativeRenderer2D`] on top of a `glow` context.
pub struct GlRenderer2D {
    gl: Arc<glow::Context>,
    version: GlslVersion,
    texture_registry: Arc<TextureRegistry>,
    shader_registry: Arc<ShaderRegistry>,

    vertex_shader: glow::Shader,
    programs: HashMap<PixelShaderId, GlProgram>,
    standard: [PixelShader; 4],

    vao: glow::VertexArray,
    vertex_buffer: glow::Buffer,
    index_buffer: glow::Buffer,
    vertex_capacity: u32,
    index_capacity: u32,

    textures: HashMap<TextureId, GlTexture>,
    samplers: HashMap<SamplerState, glow::Sampler>,
    white: glow::Texture,

    state: NativeStateCache,
    scissor: IntRect,
    viewport: IntRect,
    target_height: u32,
    transform: [f32; 8],
    transform_version: u64,
    wireframe_supported: bool,
}

impl GlRenderer2D {
    /// Creates the backend and its GL objects.
    ///
    /// # Safety
    ///
    /// `gl` must be current on the calling thread for every later call on the
    /// returned backend, including its drop.
    pub unsafe fn new(
        gl: Arc<glow::Context>,
        version: GlslVersion,
        textures: Arc<TextureRegistry>,
        shaders: Arc<ShaderRegistry>,
        config: &Renderer2DConfig,
    ) -> Result<Self, Renderer2DError> {
        profile_function!();
        // SAFETY: the caller guarantees the context is current.
        unsafe {
            let vertex_shader = compile_shader(&gl, version, glow::VERTEX_SHADER, "vertex", VERTEX_SOURCE)?;

            let standard = StandardPixelShader::ALL.map(|shader| shaders.create_pixel_shader(shader.label()));
            let mut programs = HashMap::new();
            for (kind, handle) in StandardPixelShader::ALL.iter().zip(&standard) {
                let program = link_program(
                    &gl,
                    version,
                    vertex_shader,
                    kind.label(),
                    standard_fragment_source(*kind),
                )?;
                programs.insert(handle.id(), program);
            }

            let vao = gl.create_vertex_array().map_err(Renderer2DError::BufferCreation)?;
            gl.bind_vertex_array(Some(vao));

            let vertex_buffer = gl.create_buffer().map_err(Renderer2DError::BufferCreation)?;
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            gl.buffer_data_size(
                glow::ARRAY_BUFFER,
                byte_len::<Vertex2D>(config.batch_vertex_capacity)?,
                glow::DYNAMIC_DRAW,
            );
            let stride = std::mem::size_of::<Vertex2D>() as i32;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 8);
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 4, glow::FLOAT, false, stride, 16);

            let index_buffer = gl.create_buffer().map_err(Renderer2DError::BufferCreation)?;
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(index_buffer));
            gl.buffer_data_size(
                glow::ELEMENT_ARRAY_BUFFER,
                byte_len::<Index>(config.batch_index_capacity)?,
                glow::DYNAMIC_DRAW,
            );

            let white = gl.create_texture().map_err(Renderer2DError::StateCreation)?;
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(white));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                1,
                1,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(&[255u8; 4][..])),
            );

            let wireframe_supported = !gl.version().is_embedded;
            tracing::info!(
                "GlRenderer2D ready: {:?} ({}), {} vertex / {} index buffer capacity",
                version,
                gl.get_parameter_string(glow::VERSION),
                config.batch_vertex_capacity,
                config.batch_index_capacity
            );

            Ok(Self {
                gl,
                version,
                texture_registry: textures,
                shader_registry: shaders,
                vertex_shader,
                programs,
                standard,
                vao,
                vertex_buffer,
                index_buffer,
                vertex_capacity: config.batch_vertex_capacity,
                index_capacity: config.batch_index_capacity,
                textures: HashMap::new(),
                samplers: HashMap::new(),
                white,
                state: NativeStateCache::default(),
                scissor: IntRect::default(),
                viewport: IntRect::default(),
                target_height: 0,
                transform: [0.0; 8],
                transform_version: 0,
                wireframe_supported,
            })
        }
    }

    /// Maps `target` to the default framebuffer. Call again whenever the
    /// window is resized.
    pub fn set_frame_target(&mut self, target: &Texture) {
        self.textures.insert(
            target.id(),
            GlTexture {
                texture: None,
                framebuffer: None,
                size: target.info().size,
            },
        );
        self.state.render_target.invalidate();
    }

    /// Creates an RGBA8 texture from tightly packed pixels.
    pub fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> Result<Texture, Renderer2DError> {
        let expected = width as usize * height as usize * 4;
        let pixels = (rgba.len() >= expected).then(|| &rgba[..expected]);
        if pixels.is_none() {
            tracing::warn!("Texture data too short ({} bytes for {}x{})", rgba.len(), width, height);
        }
        // SAFETY: context is current (see `new`).
        let texture = unsafe { self.allocate_texture(width, height, pixels)? };
        let handle = self.texture_registry.create_texture(width, height);
        self.textures.insert(
            handle.id(),
            GlTexture {
                texture: Some(texture),
                framebuffer: None,
                size: Size::new(width, height),
            },
        );
        Ok(handle)
    }

    /// Creates an offscreen color target that can also be sampled.
    pub fn create_render_target(&mut self, width: u32, height: u32) -> Result<Texture, Renderer2DError> {
        // SAFETY: context is current (see `new`).
        let (texture, framebuffer) = unsafe {
            let texture = self.allocate_texture(width, height, None)?;
            let framebuffer = self
                .gl
                .create_framebuffer()
                .map_err(Renderer2DError::StateCreation)?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                tracing::warn!("Render target framebuffer incomplete: 0x{:x}", status);
            }
            (texture, framebuffer)
        };
        self.state.render_target.invalidate();

        let handle = self.texture_registry.create_render_target(width, height);
        self.textures.insert(
            handle.id(),
            GlTexture {
                texture: Some(texture),
                framebuffer: Some(framebuffer),
                size: Size::new(width, height),
            },
        );
        Ok(handle)
    }

    /// Links a fragment shader against the shared vertex stage.
    ///
    /// `source` is GLSL without a `#version` line; it receives `v_tex`,
    /// `v_color` and may sample `t_texture`.
    pub fn register_pixel_shader(&mut self, label: &str, source: &str) -> Result<PixelShader, Renderer2DError> {
        // SAFETY: context is current (see `new`).
        let program = unsafe { link_program(&self.gl, self.version, self.vertex_shader, label, source)? };
        let handle = self.shader_registry.create_pixel_shader(label);
        self.programs.insert(handle.id(), program);
        // Linking left the new program bound.
        self.state.pixel_shader.invalidate();
        tracing::debug!("Registered pixel shader '{}' as {:?}", label, handle.id());
        Ok(handle)
    }

    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    unsafe fn allocate_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: Option<&[u8]>,
    ) -> Result<glow::Texture, Renderer2DError> {
        unsafe {
            let texture = self.gl.create_texture().map_err(Renderer2DError::StateCreation)?;
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width.max(1) as i32,
                height.max(1) as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(pixels),
            );
            self.state.textures[0].invalidate();
            Ok(texture)
        }
    }

    unsafe fn upload(
        &self,
        target: u32,
        first: u32,
        count: usize,
        capacity: u32,
        bytes: &[u8],
        mode: MapMode,
    ) -> Result<(), NativeError> {
        let end = first as u64 + count as u64;
        if end > capacity as u64 {
            return Err(NativeError::Upload(format!(
                "range {}..{} exceeds capacity {}",
                first, end, capacity
            )));
        }
        if bytes.is_empty() {
            return Ok(());
        }
        let stride = bytes.len() / count;
        let access = glow::MAP_WRITE_BIT
            | match mode {
                MapMode::Discard => glow::MAP_INVALIDATE_BUFFER_BIT,
                MapMode::NoOverwrite => glow::MAP_UNSYNCHRONIZED_BIT,
            };
        unsafe {
            let ptr = self.gl.map_buffer_range(
                target,
                (first as usize * stride) as i32,
                bytes.len() as i32,
                access,
            );
            if ptr.is_null() {
                return Err(NativeError::Upload("glMapBufferRange returned null".to_string()));
            }
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
            self.gl.unmap_buffer(target);
        }
        Ok(())
    }

    fn sampler(&mut self, state: SamplerState) -> Option<glow::Sampler> {
        if let Some(sampler) = self.samplers.get(&state) {
            return Some(*sampler);
        }
        // SAFETY: context is current (see `new`).
        let sampler = unsafe {
            let sampler = match self.gl.create_sampler() {
                Ok(sampler) => sampler,
                Err(e) => {
                    tracing::error!("Failed to create sampler: {}", e);
                    return None;
                }
            };
            let wrap = to_gl_wrap(state.address);
            let filter = to_gl_filter(state.filter);
            self.gl.sampler_parameter_i32(sampler, glow::TEXTURE_WRAP_S, wrap);
            self.gl.sampler_parameter_i32(sampler, glow::TEXTURE_WRAP_T, wrap);
            self.gl.sampler_parameter_i32(sampler, glow::TEXTURE_MIN_FILTER, filter);
            self.gl.sampler_parameter_i32(sampler, glow::TEXTURE_MAG_FILTER, filter);
            sampler
        };
        tracing::debug!("Created sampler {:?}", state);
        self.samplers.insert(state, sampler);
        Some(sampler)
    }

    fn apply_scissor(&self) {
        let rect = flip_rect(self.scissor, self.target_height);
        // SAFETY: context is current (see `new`).
        unsafe { self.gl.scissor(rect.x, rect.y, rect.width, rect.height) };
    }

    fn apply_viewport(&self) {
        let rect = flip_rect(self.viewport, self.target_height);
        // SAFETY: context is current (see `new`).
        unsafe { self.gl.viewport(rect.x, rect.y, rect.width, rect.height) };
    }

    fn release_resources(&mut self) {
        for id in self.texture_registry.drain_released() {
            if let Some(texture) = self.textures.remove(&id) {
                // SAFETY: context is current (see `new`).
                unsafe { delete_texture(&self.gl, texture) };
            }
        }
        for id in self.shader_registry.drain_released() {
            if let Some(program) = self.programs.remove(&id) {
                // SAFETY: context is current (see `new`).
                unsafe { self.gl.delete_program(program.program) };
            }
        }
    }
}

unsafe fn delete_texture(gl: &glow::Context, texture: GlTexture) {
    unsafe {
        if let Some(framebuffer) = texture.framebuffer {
            gl.delete_framebuffer(framebuffer);
        }
        if let Some(texture) = texture.texture {
            gl.delete_texture(texture);
        }
    }
}

fn byte_len<T>(count: u32) -> Result<i32, Renderer2DError> {
    i32::try_from(count as u64 * std::mem::size_of::<T>() as u64)
        .map_err(|_| Renderer2DError::BufferCreation(format!("{} elements do not fit a GL buffer", count)))
}

unsafe fn compile_shader(
    gl: &glow::Context,
    version: GlslVersion,
    stage: u32,
    label: &str,
    source: &str,
) -> Result<glow::Shader, Renderer2DError> {
    unsafe {
        let shader = gl.create_shader(stage).map_err(Renderer2DError::StateCreation)?;
        gl.shader_source(shader, &format!("{}{}", version.header(), source));
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(Renderer2DError::ShaderCompilation {
                label: label.to_string(),
                log,
            });
        }
        Ok(shader)
    }
}

unsafe fn link_program(
    gl: &glow::Context,
    version: GlslVersion,
    vertex_shader: glow::Shader,
    label: &str,
    fragment_source: &str,
) -> Result<GlProgram, Renderer2DError> {
    unsafe {
        let fragment = compile_shader(gl, version, glow::FRAGMENT_SHADER, label, fragment_source)?;
        let program = gl.create_program().map_err(Renderer2DError::StateCreation)?;
        gl.attach_shader(program, vertex_shader);
        gl.attach_shader(program, fragment);
        gl.link_program(program);
        gl.detach_shader(program, vertex_shader);
        gl.detach_shader(program, fragment);
        gl.delete_shader(fragment);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(Renderer2DError::ShaderCompilation {
                label: label.to_string(),
                log,
            });
        }

        gl.use_program(Some(program));
        if let Some(sampler) = gl.get_uniform_location(program, "t_texture") {
            gl.uniform_1_i32(Some(&sampler), 0);
        }
        Ok(GlProgram {
            program,
            transform: gl.get_uniform_location(program, "transform"),
            transform_version: 0,
        })
    }
}

impl BufferUploader for GlRenderer2D {
    fn upload_vertices(
        &mut self,
        first: u32,
        vertices: &[Vertex2D],
        mode: MapMode,
    ) -> Result<(), NativeError> {
        // SAFETY: context is current (see `new`).
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertex_buffer));
            self.upload(
                glow::ARRAY_BUFFER,
                first,
                vertices.len(),
                self.vertex_capacity,
                bytemuck::cast_slice(vertices),
                mode,
            )
        }
    }

    fn upload_indices(&mut self, first: u32, indices: &[Index], mode: MapMode) -> Result<(), NativeError> {
        // SAFETY: context is current (see `new`). The element binding is VAO
        // state, so the VAO is bound first.
        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.index_buffer));
            self.upload(
                glow::ELEMENT_ARRAY_BUFFER,
                first,
                indices.len(),
                self.index_capacity,
                bytemuck::cast_slice(indices),
                mode,
            )
        }
    }
}

impl NativeRenderer2D for GlRenderer2D {
    fn standard_shaders(&self) -> StandardShaderTable {
        StandardShaderTable::new(self.standard.each_ref().map(|handle| handle.id()))
    }

    fn begin_replay(&mut self) {
        self.release_resources();
        // Anything else sharing the context may have changed bindings.
        self.state.invalidate();
        // SAFETY: context is current (see `new`).
        unsafe {
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vertex_buffer));
            self.gl.disable(glow::DEPTH_TEST);
        }
    }

    fn set_blend_state(&mut self, state: BlendState) {
        if !self.state.blend.update(state) {
            return;
        }
        // SAFETY: context is current (see `new`).
        unsafe {
            match state.equation() {
                None => self.gl.disable(glow::BLEND),
                Some(eq) => {
                    self.gl.enable(glow::BLEND);
                    self.gl
                        .blend_equation_separate(to_gl_op(eq.color.op), to_gl_op(eq.alpha.op));
                    self.gl.blend_func_separate(
                        to_gl_factor(eq.color.src),
                        to_gl_factor(eq.color.dst),
                        to_gl_factor(eq.alpha.src),
                        to_gl_factor(eq.alpha.dst),
                    );
                }
            }
        }
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        if !self.state.rasterizer.update(state) {
            return;
        }
        // SAFETY: context is current (see `new`).
        unsafe {
            match state.cull {
                CullMode::None => self.gl.disable(glow::CULL_FACE),
                CullMode::Front => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::FRONT);
                }
                CullMode::Back => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::BACK);
                }
            }
            if state.scissor_enable {
                self.gl.enable(glow::SCISSOR_TEST);
            } else {
                self.gl.disable(glow::SCISSOR_TEST);
            }
            if self.wireframe_supported {
                let mode = match state.fill {
                    FillMode::Solid => glow::FILL,
                    FillMode::Wireframe => glow::LINE,
                };
                self.gl.polygon_mode(glow::FRONT_AND_BACK, mode);
            } else if state.fill == FillMode::Wireframe {
                tracing::warn!("Wireframe fill unsupported on GLES, drawing solid");
            }
        }
    }

    fn set_sampler_state(&mut self, slot: u32, state: SamplerState) {
        let Some(cached) = self.state.samplers.get_mut(slot as usize) else {
            return;
        };
        if !cached.update(state) {
            return;
        }
        let sampler = self.sampler(state);
        // SAFETY: context is current (see `new`).
        unsafe { self.gl.bind_sampler(slot, sampler) };
    }

    fn set_scissor_rect(&mut self, rect: IntRect) {
        self.scissor = rect;
        if self.state.scissor.update(rect) {
            self.apply_scissor();
        }
    }

    fn set_viewport(&mut self, rect: IntRect) {
        self.viewport = rect;
        if self.state.viewport.update(rect) {
            self.apply_viewport();
        }
    }

    fn set_transform(&mut self, matrix: &Mat3x2) {
        let [r0, r1] = pack_transform(matrix);
        let packed = [r0[0], r0[1], r0[2], r0[3], r1[0], r1[1], r1[2], r1[3]];
        if packed != self.transform {
            self.transform = packed;
            self.transform_version += 1;
        }
    }

    fn set_pixel_shader(&mut self, shader: PixelShaderId) {
        if !self.state.pixel_shader.update(shader) {
            return;
        }
        match self.programs.get(&shader) {
            // SAFETY: context is current (see `new`).
            Some(program) => unsafe { self.gl.use_program(Some(program.program)) },
            None => tracing::warn!("Pixel shader {:?} is not registered", shader),
        }
    }

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureId>) {
        let Some(cached) = self.state.textures.get_mut(slot as usize) else {
            return;
        };
        if !cached.update(texture) {
            return;
        }
        let native = match texture {
            None => self.white,
            Some(id) => match self.textures.get(&id).and_then(|t| t.texture) {
                Some(native) => native,
                None => {
                    tracing::warn!("Texture {:?} has no GL texture, sampling white", id);
                    self.white
                }
            },
        };
        // SAFETY: context is current (see `new`).
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + slot);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(native));
        }
    }

    fn set_render_target(&mut self, texture: TextureId) {
        if !self.state.render_target.update(texture) {
            return;
        }
        let Some(target) = self.textures.get(&texture) else {
            tracing::warn!("Render target {:?} has no GL framebuffer", texture);
            return;
        };
        // SAFETY: context is current (see `new`).
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, target.framebuffer) };
        self.target_height = target.size.height;
        // The flip depends on the target height.
        self.apply_scissor();
        self.apply_viewport();
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: u32) {
        let Some(shader) = self.state.pixel_shader.get() else {
            tracing::warn!("Draw without a pixel shader, skipped");
            return;
        };
        let Some(program) = self.programs.get_mut(&shader) else {
            return;
        };
        // SAFETY: context is current (see `new`).
        unsafe {
            if program.transform_version != self.transform_version {
                self.gl
                    .uniform_4_f32_slice(program.transform.as_ref(), &self.transform);
                program.transform_version = self.transform_version;
            }
            self.gl.draw_elements_base_vertex(
                glow::TRIANGLES,
                index_count as i32,
                glow::UNSIGNED_INT,
                (first_index as usize * std::mem::size_of::<Index>()) as i32,
                base_vertex as i32,
            );
        }
    }
}

impl Drop for GlRenderer2D {
    fn drop(&mut self) {
        // SAFETY: context is current (see `new`).
        unsafe {
            for (_, program) in self.programs.drain() {
                self.gl.delete_program(program.program);
            }
            for (_, texture) in self.textures.drain() {
                delete_texture(&self.gl, texture);
            }
            for (_, sampler) in self.samplers.drain() {
                self.gl.delete_sampler(sampler);
            }
            self.gl.delete_shader(self.vertex_shader);
            self.gl.delete_texture(self.white);
            self.gl.delete_buffer(self.vertex_buffer);
            self.gl.delete_buffer(self.index_buffer);
            self.gl.delete_vertex_array(self.vao);
        }
    }
}
