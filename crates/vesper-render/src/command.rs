//! Per-frame instruction stream with state dedup and draw merging.
//!
//! Every `push_*` compares against the single authoritative [`RenderState`]
//! and records a [`Command`] only when the value actually changes. Draws that
//! follow each other with the same shader collapse into one `Draw`.

use std::sync::Arc;

use vesper_core::alloc::HashMap;
use vesper_core::geometry::IntRect;
use vesper_core::math::Mat3x2;

use crate::asset::{
    PixelShader, PixelShaderId, PixelShaderType, ShaderLookup, StandardPixelShader, Texture,
    TextureId,
};
use crate::state::{BlendState, MAX_SAMPLER_SLOTS, RasterizerState, SamplerState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Draw { index_count: u32 },
    NextBatch,
    BlendState(BlendState),
    RasterizerState(RasterizerState),
    SamplerState { slot: u32, state: SamplerState },
    ScissorRect(IntRect),
    /// `None` means "the whole current render target".
    Viewport(Option<IntRect>),
    /// Composed local * camera * screen matrix, in pixel space.
    Transform(Mat3x2),
    PixelShader(PixelShaderId),
    BindTexture { slot: u32, texture: Option<TextureId> },
    SetRenderTarget(TextureId),
}

/// The state the stream will have established once replayed up to its end.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub blend: BlendState,
    pub rasterizer: RasterizerState,
    pub samplers: [SamplerState; MAX_SAMPLER_SLOTS],
    pub scissor: IntRect,
    pub viewport: Option<IntRect>,
    pub local: Mat3x2,
    pub camera: Mat3x2,
    pub screen: Mat3x2,
    pub pixel_shader: Option<PixelShaderType>,
    pub textures: [Option<TextureId>; MAX_SAMPLER_SLOTS],
    pub render_target: TextureId,
}

impl RenderState {
    fn defaults(back_buffer: &Texture, screen: Mat3x2) -> Self {
        Self {
            blend: BlendState::default(),
            rasterizer: RasterizerState::default(),
            samplers: [SamplerState::default(); MAX_SAMPLER_SLOTS],
            scissor: IntRect::from_size(back_buffer.info().size),
            viewport: None,
            local: Mat3x2::IDENTITY,
            camera: Mat3x2::IDENTITY,
            screen,
            pixel_shader: Some(PixelShaderType::Standard(StandardPixelShader::Shape)),
            textures: [None; MAX_SAMPLER_SLOTS],
            render_target: back_buffer.id(),
        }
    }

    pub fn composed_transform(&self) -> Mat3x2 {
        self.local * self.camera * self.screen
    }
}

pub struct CommandManager {
    commands: Vec<Command>,
    state: RenderState,
    composed: Mat3x2,
    max_scaling: f32,
    shaders: Arc<dyn ShaderLookup>,
    back_buffer: Texture,
    reserved_textures: HashMap<TextureId, Texture>,
    reserved_shaders: HashMap<PixelShaderId, PixelShader>,
}

impl CommandManager {
    /// Creates a manager whose stream already holds the frame-start prefix.
    pub fn new(shaders: Arc<dyn ShaderLookup>, back_buffer: Texture) -> Self {
        let state = RenderState::defaults(&back_buffer, Mat3x2::IDENTITY);
        let mut manager = Self {
            commands: Vec::new(),
            composed: state.composed_transform(),
            max_scaling: 1.0,
            state,
            shaders,
            back_buffer,
            reserved_textures: HashMap::new(),
            reserved_shaders: HashMap::new(),
        };
        manager.reset();
        manager
    }

    /// Starts a new frame.
    ///
    /// All tracked state returns to its defaults (the screen transform is
    /// kept) and is re-emitted unconditionally, so a replay never depends on
    /// whatever the previous frame left bound.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.reserved_textures.clear();
        self.reserved_shaders.clear();

        self.state = RenderState::defaults(&self.back_buffer, self.state.screen);
        self.update_composed();

        let shape = self.shaders.pixel_shader(StandardPixelShader::Shape);
        self.commands.push(Command::NextBatch);
        self.commands.push(Command::BlendState(self.state.blend));
        self.commands.push(Command::RasterizerState(self.state.rasterizer));
        for (slot, state) in self.state.samplers.iter().enumerate() {
            self.commands.push(Command::SamplerState {
                slot: slot as u32,
                state: *state,
            });
        }
        self.commands.push(Command::SetRenderTarget(self.back_buffer.id()));
        self.reserved_textures
            .insert(self.back_buffer.id(), self.back_buffer.clone());
        self.commands.push(Command::ScissorRect(self.state.scissor));
        self.commands.push(Command::Viewport(self.state.viewport));
        self.commands.push(Command::Transform(self.composed));
        self.commands.push(Command::PixelShader(shape));
        for slot in 0..MAX_SAMPLER_SLOTS {
            self.commands.push(Command::BindTexture {
                slot: slot as u32,
                texture: None,
            });
        }
    }

    /// Replaces the default render target used from the next [`reset`](Self::reset) on.
    pub fn set_back_buffer(&mut self, back_buffer: Texture) {
        self.back_buffer = back_buffer;
    }

    pub fn back_buffer(&self) -> &Texture {
        &self.back_buffer
    }

    pub fn push_next_batch(&mut self) {
        self.commands.push(Command::NextBatch);
    }

    pub fn push_draw(&mut self, index_count: u32, shader: PixelShaderType) {
        if index_count == 0 {
            return;
        }

        let mut shader_changed = false;
        if self.state.pixel_shader != Some(shader) {
            let id = self.shaders.resolve(shader);
            self.commands.push(Command::PixelShader(id));
            self.state.pixel_shader = Some(shader);
            shader_changed = true;
        }

        if !shader_changed
            && let Some(Command::Draw { index_count: last }) = self.commands.last_mut()
        {
            *last += index_count;
            return;
        }
        self.commands.push(Command::Draw { index_count });
    }

    pub fn push_blend_state(&mut self, state: BlendState) {
        if self.state.blend == state {
            return;
        }
        self.state.blend = state;
        self.commands.push(Command::BlendState(state));
    }

    pub fn push_rasterizer_state(&mut self, state: RasterizerState) {
        if self.state.rasterizer == state {
            return;
        }
        self.state.rasterizer = state;
        self.commands.push(Command::RasterizerState(state));
    }

    /// Out-of-range slots are ignored.
    pub fn push_sampler_state(&mut self, slot: u32, state: SamplerState) {
        let Some(current) = self.state.samplers.get_mut(slot as usize) else {
            tracing::warn!("Sampler slot {} out of range", slot);
            return;
        };
        if *current == state {
            return;
        }
        *current = state;
        self.commands.push(Command::SamplerState { slot, state });
    }

    pub fn push_scissor_rect(&mut self, rect: IntRect) {
        if self.state.scissor == rect {
            return;
        }
        self.state.scissor = rect;
        self.commands.push(Command::ScissorRect(rect));
    }

    pub fn push_viewport(&mut self, viewport: Option<IntRect>) {
        if self.state.viewport == viewport {
            return;
        }
        self.state.viewport = viewport;
        self.commands.push(Command::Viewport(viewport));
    }

    pub fn push_transform_local(&mut self, matrix: Mat3x2) {
        if self.state.local == matrix {
            return;
        }
        self.state.local = matrix;
        self.push_composed();
    }

    pub fn push_transform_camera(&mut self, matrix: Mat3x2) {
        if self.state.camera == matrix {
            return;
        }
        self.state.camera = matrix;
        self.push_composed();
    }

    pub fn push_transform_screen(&mut self, matrix: Mat3x2) {
        if self.state.screen == matrix {
            return;
        }
        self.state.screen = matrix;
        self.push_composed();
    }

    /// `None` unbinds the slot. Out-of-range slots are ignored.
    pub fn push_texture(&mut self, slot: u32, texture: Option<&Texture>) {
        let id = texture.map(Texture::id);
        let Some(current) = self.state.textures.get_mut(slot as usize) else {
            tracing::warn!("Texture slot {} out of range", slot);
            return;
        };
        if *current == id {
            return;
        }
        *current = id;
        if let Some(texture) = texture {
            self.reserved_textures
                .entry(texture.id())
                .or_insert_with(|| texture.clone());
        }
        self.commands.push(Command::BindTexture { slot, texture: id });
    }

    /// `None` selects the back buffer.
    pub fn push_render_target(&mut self, target: Option<&Texture>) {
        let target = target.unwrap_or(&self.back_buffer).clone();
        if self.state.render_target == target.id() {
            return;
        }
        self.state.render_target = target.id();
        self.commands.push(Command::SetRenderTarget(target.id()));
        self.reserved_textures.entry(target.id()).or_insert(target);
    }

    /// Keeps a custom shader alive until the next reset.
    pub fn reserve_pixel_shader(&mut self, shader: &PixelShader) {
        self.reserved_shaders
            .entry(shader.id())
            .or_insert_with(|| shader.clone());
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn blend_state(&self) -> BlendState {
        self.state.blend
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.state.rasterizer
    }

    pub fn sampler_state(&self, slot: u32) -> Option<SamplerState> {
        self.state.samplers.get(slot as usize).copied()
    }

    pub fn scissor_rect(&self) -> IntRect {
        self.state.scissor
    }

    pub fn viewport(&self) -> Option<IntRect> {
        self.state.viewport
    }

    pub fn transform_local(&self) -> Mat3x2 {
        self.state.local
    }

    pub fn transform_camera(&self) -> Mat3x2 {
        self.state.camera
    }

    pub fn transform_screen(&self) -> Mat3x2 {
        self.state.screen
    }

    pub fn composed_transform(&self) -> Mat3x2 {
        self.composed
    }

    /// Scale factor of the composed transform, used for curve quality.
    pub fn max_scaling(&self) -> f32 {
        self.max_scaling
    }

    pub fn render_target(&self) -> TextureId {
        self.state.render_target
    }

    pub fn reserved_texture_count(&self) -> usize {
        self.reserved_textures.len()
    }

    pub fn is_texture_reserved(&self, id: TextureId) -> bool {
        self.reserved_textures.contains_key(&id)
    }

    fn push_composed(&mut self) {
        self.update_composed();
        self.commands.push(Command::Transform(self.composed));
    }

    fn update_composed(&mut self) {
        self.composed = self.state.composed_transform();
        self.max_scaling = self.composed.max_scaling();
    }
}
