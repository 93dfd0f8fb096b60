//! The drawing front door.
//!
//! [`Renderer2D`] owns the command stream and batch buffer for one backend.
//! Draw calls tessellate immediately into the batch buffer and record
//! commands; [`Renderer2D::flush`] replays the frame through the backend.
//!
//! # Example
//!
//! ```ignore
//! let mut renderer = Renderer2D::new(backend, textures, back_buffer, Renderer2DConfig::default());
//! renderer.set_blend_state(BlendState::Additive);
//! renderer.add_circle(vec2(400.0, 300.0), 50.0, Color::RED);
//! let stats = renderer.flush(true);
//! ```

use std::sync::Arc;

use vesper_core::geometry::{FloatRect, IntRect, Quad};
use vesper_core::math::{Mat3x2, Vec2};
use vesper_core::profiling::profile_function;

use crate::asset::{
    PixelShader, PixelShaderType, StandardPixelShader, Texture, TextureId, TextureLookup,
};
use crate::backend::NativeRenderer2D;
use crate::batch::BatchBuffer;
use crate::command::{Command, CommandManager};
use crate::config::Renderer2DConfig;
use crate::replay::replay;
use crate::state::{BlendState, RasterizerState, SamplerState};
use crate::tessellate::{self, GeometrySink, LineStyle};
use crate::vertex::{Index, Vertex2D};
use crate::Color;

/// Counters for the last flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Renderer2DStats {
    pub commands: u32,
    pub batches: u32,
    pub draw_calls: u32,
    pub state_changes: u32,
    pub uploaded_vertices: u32,
    pub uploaded_indices: u32,
    /// Draws rejected because the batch buffer was exhausted.
    pub dropped_draws: u32,
}

pub struct Renderer2D<B: NativeRenderer2D> {
    backend: B,
    textures: Arc<dyn TextureLookup>,
    commands: CommandManager,
    batches: BatchBuffer,
    custom_shader: Option<PixelShader>,
    stats: Renderer2DStats,
}

impl<B: NativeRenderer2D> Renderer2D<B> {
    pub fn new(
        backend: B,
        textures: Arc<dyn TextureLookup>,
        back_buffer: Texture,
        config: Renderer2DConfig,
    ) -> Self {
        let shaders = Arc::new(backend.standard_shaders());
        tracing::info!(
            "Renderer2D ready: {}x{} back buffer, batch capacity {} vertices / {} indices",
            back_buffer.info().size.width,
            back_buffer.info().size.height,
            config.batch_vertex_capacity,
            config.batch_index_capacity
        );
        Self {
            backend,
            textures,
            commands: CommandManager::new(shaders, back_buffer),
            batches: BatchBuffer::new(config),
            custom_shader: None,
            stats: Renderer2DStats::default(),
        }
    }

    // --- State ---

    pub fn set_blend_state(&mut self, state: BlendState) {
        self.commands.push_blend_state(state);
    }

    pub fn blend_state(&self) -> BlendState {
        self.commands.blend_state()
    }

    pub fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.commands.push_rasterizer_state(state);
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.commands.rasterizer_state()
    }

    pub fn set_sampler_state(&mut self, slot: u32, state: SamplerState) {
        self.commands.push_sampler_state(slot, state);
    }

    pub fn sampler_state(&self, slot: u32) -> Option<SamplerState> {
        self.commands.sampler_state(slot)
    }

    pub fn set_scissor_rect(&mut self, rect: IntRect) {
        self.commands.push_scissor_rect(rect);
    }

    pub fn scissor_rect(&self) -> IntRect {
        self.commands.scissor_rect()
    }

    /// `None` covers the whole render target.
    pub fn set_viewport(&mut self, viewport: Option<IntRect>) {
        self.commands.push_viewport(viewport);
    }

    pub fn viewport(&self) -> Option<IntRect> {
        self.commands.viewport()
    }

    pub fn set_transform_local(&mut self, matrix: Mat3x2) {
        self.commands.push_transform_local(matrix);
    }

    pub fn set_transform_camera(&mut self, matrix: Mat3x2) {
        self.commands.push_transform_camera(matrix);
    }

    pub fn set_transform_screen(&mut self, matrix: Mat3x2) {
        self.commands.push_transform_screen(matrix);
    }

    pub fn transform_local(&self) -> Mat3x2 {
        self.commands.transform_local()
    }

    pub fn transform_camera(&self) -> Mat3x2 {
        self.commands.transform_camera()
    }

    pub fn transform_screen(&self) -> Mat3x2 {
        self.commands.transform_screen()
    }

    pub fn max_scaling(&self) -> f32 {
        self.commands.max_scaling()
    }

    /// `None` draws to the back buffer.
    pub fn set_render_target(&mut self, target: Option<&Texture>) {
        self.commands.push_render_target(target);
    }

    pub fn render_target(&self) -> TextureId {
        self.commands.render_target()
    }

    pub fn set_texture(&mut self, slot: u32, texture: Option<&Texture>) {
        self.commands.push_texture(slot, texture);
    }

    /// Overrides the built-in pixel shader of every following draw until
    /// cleared with `None` or the next frame starts.
    pub fn set_custom_pixel_shader(&mut self, shader: Option<&PixelShader>) {
        if let Some(shader) = shader {
            self.commands.reserve_pixel_shader(shader);
        }
        self.custom_shader = shader.cloned();
    }

    pub fn custom_pixel_shader(&self) -> Option<&PixelShader> {
        self.custom_shader.as_ref()
    }

    /// Takes effect when the next frame starts.
    pub fn set_back_buffer(&mut self, back_buffer: Texture) {
        self.commands.set_back_buffer(back_buffer);
    }

    // --- Shapes ---

    pub fn add_triangle(&mut self, points: [Vec2; 3], color: Color) {
        self.add_triangle_colors(points, [color; 3]);
    }

    pub fn add_triangle_colors(&mut self, points: [Vec2; 3], colors: [Color; 3]) {
        tessellate::triangle(&mut self.sink(StandardPixelShader::Shape), points, colors);
    }

    pub fn add_rect(&mut self, rect: &FloatRect, color: Color) {
        self.add_rect_colors(rect, [color; 4]);
    }

    /// Corner colors are top left, top right, bottom right, bottom left.
    pub fn add_rect_colors(&mut self, rect: &FloatRect, colors: [Color; 4]) {
        tessellate::rect(&mut self.sink(StandardPixelShader::Shape), rect, colors);
    }

    pub fn add_rect_frame(&mut self, rect: &FloatRect, inner: f32, outer: f32, color: Color) {
        tessellate::rect_frame(&mut self.sink(StandardPixelShader::Shape), rect, inner, outer, color);
    }

    pub fn add_quad(&mut self, quad: &Quad, color: Color) {
        self.add_quad_colors(quad, [color; 4]);
    }

    pub fn add_quad_colors(&mut self, quad: &Quad, colors: [Color; 4]) {
        tessellate::quad(&mut self.sink(StandardPixelShader::Shape), quad, colors);
    }

    pub fn add_circle(&mut self, center: Vec2, r: f32, color: Color) {
        self.add_circle_gradient(center, r, color, color);
    }

    pub fn add_circle_gradient(&mut self, center: Vec2, r: f32, inner: Color, outer: Color) {
        tessellate::circle(&mut self.sink(StandardPixelShader::Shape), center, r, inner, outer);
    }

    pub fn add_circle_frame(&mut self, center: Vec2, r_inner: f32, thickness: f32, color: Color) {
        self.add_circle_frame_gradient(center, r_inner, thickness, color, color);
    }

    pub fn add_circle_frame_gradient(
        &mut self,
        center: Vec2,
        r_inner: f32,
        thickness: f32,
        inner: Color,
        outer: Color,
    ) {
        let mut sink = self.sink(StandardPixelShader::Shape);
        tessellate::circle_frame(&mut sink, center, r_inner, thickness, inner, outer);
    }

    /// Angles are radians clockwise from straight up.
    pub fn add_circle_pie(&mut self, center: Vec2, r: f32, start: f32, angle: f32, color: Color) {
        let mut sink = self.sink(StandardPixelShader::Shape);
        tessellate::circle_pie(&mut sink, center, r, start, angle, color);
    }

    pub fn add_circle_arc(
        &mut self,
        center: Vec2,
        r_inner: f32,
        start: f32,
        angle: f32,
        thickness: f32,
        color: Color,
    ) {
        let mut sink = self.sink(StandardPixelShader::Shape);
        tessellate::circle_arc(&mut sink, center, r_inner, start, angle, thickness, color);
    }

    pub fn add_ellipse(&mut self, center: Vec2, a: f32, b: f32, color: Color) {
        tessellate::ellipse(&mut self.sink(StandardPixelShader::Shape), center, a, b, color);
    }

    pub fn add_ellipse_frame(
        &mut self,
        center: Vec2,
        a_inner: f32,
        b_inner: f32,
        thickness: f32,
        inner: Color,
        outer: Color,
    ) {
        let mut sink = self.sink(StandardPixelShader::Shape);
        tessellate::ellipse_frame(&mut sink, center, a_inner, b_inner, thickness, inner, outer);
    }

    pub fn add_round_rect(&mut self, rect: &FloatRect, r: f32, color: Color) {
        tessellate::round_rect(&mut self.sink(StandardPixelShader::Shape), rect, r, color);
    }

    // --- Lines ---

    pub fn add_line(&mut self, style: LineStyle, begin: Vec2, end: Vec2, thickness: f32, color: Color) {
        self.add_line_colors(style, begin, end, thickness, [color; 2]);
    }

    /// Shaded from `colors[0]` at `begin` to `colors[1]` at `end`.
    pub fn add_line_colors(
        &mut self,
        style: LineStyle,
        begin: Vec2,
        end: Vec2,
        thickness: f32,
        colors: [Color; 2],
    ) {
        let mut sink = self.sink(style.pixel_shader());
        tessellate::line(&mut sink, style, begin, end, thickness, colors);
    }

    pub fn add_line_string(
        &mut self,
        style: LineStyle,
        points: &[Vec2],
        offset: Option<Vec2>,
        thickness: f32,
        color: Color,
        closed: bool,
    ) {
        let mut sink = self.sink(style.pixel_shader());
        tessellate::line_string(&mut sink, style, points, offset, thickness, color, closed);
    }

    // --- Polygons ---

    /// Filled polygon from explicit triangles. `indices` refer to `points`.
    pub fn add_shape2d(&mut self, points: &[Vec2], indices: &[u32], offset: Option<Vec2>, color: Color) {
        let mut sink = self.sink(StandardPixelShader::Shape);
        tessellate::shape2d(&mut sink, points, indices, offset, color);
    }

    /// Like [`add_shape2d`](Self::add_shape2d), rotated by the angle with
    /// sine `s` and cosine `c` and then moved by `offset`.
    pub fn add_shape2d_transformed(
        &mut self,
        points: &[Vec2],
        indices: &[u32],
        s: f32,
        c: f32,
        offset: Vec2,
        color: Color,
    ) {
        let mut sink = self.sink(StandardPixelShader::Shape);
        tessellate::shape2d_transformed(&mut sink, points, indices, s, c, offset, color);
    }

    pub fn add_shape2d_frame(&mut self, points: &[Vec2], thickness: f32, color: Color) {
        tessellate::shape2d_frame(&mut self.sink(StandardPixelShader::Shape), points, thickness, color);
    }

    // --- Textured ---

    /// Caller-built mesh. With a texture it is bound to slot 0 and sampled.
    pub fn add_sprite(
        &mut self,
        texture: Option<&Texture>,
        vertices: &[Vertex2D],
        indices: &[Index],
        start: usize,
        count: usize,
    ) {
        let shader = match texture {
            Some(texture) => {
                self.commands.push_texture(0, Some(texture));
                StandardPixelShader::Texture
            }
            None => StandardPixelShader::Shape,
        };
        tessellate::sprite(&mut self.sink(shader), vertices, indices, start, count);
    }

    /// Draws the `uv` region of `texture` into `rect`.
    pub fn add_texture_region(&mut self, texture: &Texture, rect: &FloatRect, uv: &FloatRect, color: Color) {
        self.add_texture_region_colors(texture, rect, uv, [color; 4]);
    }

    pub fn add_texture_region_colors(
        &mut self,
        texture: &Texture,
        rect: &FloatRect,
        uv: &FloatRect,
        colors: [Color; 4],
    ) {
        let mut sink = self.textured_sink(texture);
        tessellate::texture_region(&mut sink, rect, uv, colors);
    }

    pub fn add_textured_circle(&mut self, texture: &Texture, center: Vec2, r: f32, uv: &FloatRect, color: Color) {
        let mut sink = self.textured_sink(texture);
        tessellate::textured_circle(&mut sink, center, r, uv, color);
    }

    pub fn add_textured_quad(&mut self, texture: &Texture, quad: &Quad, uv: &FloatRect, color: Color) {
        let mut sink = self.textured_sink(texture);
        tessellate::textured_quad(&mut sink, quad, uv, color);
    }

    // --- Frame ---

    /// Replays the recorded frame through the backend.
    ///
    /// With `clear_after` the batch buffer and command stream start a new
    /// frame; otherwise both are left intact so the same frame can be
    /// replayed again.
    pub fn flush(&mut self, clear_after: bool) -> Renderer2DStats {
        profile_function!();
        let dropped_draws = self.batches.dropped_draws();
        if dropped_draws > 0 {
            tracing::warn!("Batch buffer exhausted, dropped {} draws this frame", dropped_draws);
        }

        let replayed = replay(
            self.commands.commands(),
            &mut self.batches,
            &mut self.backend,
            self.textures.as_ref(),
        );
        self.stats = Renderer2DStats {
            commands: self.commands.commands().len() as u32,
            batches: replayed.batches,
            draw_calls: replayed.draw_calls,
            state_changes: replayed.state_changes,
            uploaded_vertices: replayed.uploaded_vertices,
            uploaded_indices: replayed.uploaded_indices,
            dropped_draws,
        };

        if clear_after {
            self.batches.clear();
            self.commands.reset();
            self.custom_shader = None;
        }
        self.stats
    }

    pub fn stats(&self) -> Renderer2DStats {
        self.stats
    }

    pub fn commands(&self) -> &[Command] {
        self.commands.commands()
    }

    pub fn batches(&self) -> &BatchBuffer {
        &self.batches
    }

    pub fn command_manager(&self) -> &CommandManager {
        &self.commands
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn shader(&self, standard: StandardPixelShader) -> PixelShaderType {
        match &self.custom_shader {
            Some(custom) => PixelShaderType::Custom(custom.id()),
            None => PixelShaderType::Standard(standard),
        }
    }

    fn sink(&mut self, standard: StandardPixelShader) -> GeometrySink<'_> {
        let shader = self.shader(standard);
        GeometrySink::new(&mut self.batches, &mut self.commands, shader)
    }

    fn textured_sink(&mut self, texture: &Texture) -> GeometrySink<'_> {
        self.commands.push_texture(0, Some(texture));
        self.sink(StandardPixelShader::Texture)
    }
}
