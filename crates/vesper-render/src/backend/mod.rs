//! Native leaf operations the replay loop drives.
//!
//! The command stream, batching and dedup logic live once in this crate.
//! A backend only implements [`NativeRenderer2D`]: bind this state, upload that
//! buffer range, issue one indexed draw.

use vesper_core::geometry::IntRect;
use vesper_core::math::Mat3x2;

use crate::asset::{PixelShaderId, StandardShaderTable, TextureId};
use crate::error::NativeError;
use crate::state::{BlendState, MAX_SAMPLER_SLOTS, RasterizerState, SamplerState};
use crate::vertex::{Index, Vertex2D};

#[cfg(feature = "gl")]
pub mod gl;
#[cfg(feature = "wgpu")]
pub mod wgpu;

/// How a range of a GPU buffer is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// The whole buffer is orphaned and writing restarts at element 0.
    Discard,
    /// Appends past data the GPU may still be reading, without waiting on it.
    NoOverwrite,
}

/// Streams batch geometry into the GPU vertex/index buffers.
///
/// `first` is an element offset, not a byte offset.
pub trait BufferUploader {
    fn upload_vertices(
        &mut self,
        first: u32,
        vertices: &[Vertex2D],
        mode: MapMode,
    ) -> Result<(), NativeError>;

    fn upload_indices(&mut self, first: u32, indices: &[Index], mode: MapMode)
    -> Result<(), NativeError>;
}

/// One graphics API as seen by the replay loop.
pub trait NativeRenderer2D: BufferUploader {
    /// Ids of the built-in pixel shaders this backend registered.
    fn standard_shaders(&self) -> StandardShaderTable;

    fn begin_replay(&mut self) {}

    fn set_blend_state(&mut self, state: BlendState);

    fn set_rasterizer_state(&mut self, state: RasterizerState);

    fn set_sampler_state(&mut self, slot: u32, state: SamplerState);

    fn set_scissor_rect(&mut self, rect: IntRect);

    fn set_viewport(&mut self, rect: IntRect);

    /// Uploads the final pixel-to-clip transform.
    fn set_transform(&mut self, matrix: &Mat3x2);

    fn set_pixel_shader(&mut self, shader: PixelShaderId);

    fn bind_texture(&mut self, slot: u32, texture: Option<TextureId>);

    fn set_render_target(&mut self, texture: TextureId);

    fn draw_indexed(&mut self, index_count: u32, first_index: u32, base_vertex: u32);

    /// Called once after the last command of a flush.
    fn end_replay(&mut self) {}
}

/// Packs a 3x2 transform into the two `vec4` rows the shaders read:
/// `(m11, m12, m31, m32)` and `(m21, m22, 0, 1)`.
pub fn pack_transform(m: &Mat3x2) -> [[f32; 4]; 2] {
    let [m11, m12, m21, m22, m31, m32] = m.to_array();
    [[m11, m12, m31, m32], [m21, m22, 0.0, 1.0]]
}

/// Last value actually handed to the native API for one piece of state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cached<T>(Option<T>);

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Cached(None)
    }
}

impl<T: PartialEq + Copy> Cached<T> {
    /// Stores `value` and reports whether the native call must be made.
    pub fn update(&mut self, value: T) -> bool {
        if self.0 == Some(value) {
            return false;
        }
        self.0 = Some(value);
        true
    }

    pub fn get(&self) -> Option<T> {
        self.0
    }

    pub fn invalidate(&mut self) {
        self.0 = None;
    }
}

/// Native-side dedup of bound state, independent from the command manager's
/// logical dedup.
#[derive(Debug, Clone, Default)]
pub struct NativeStateCache {
    pub blend: Cached<BlendState>,
    pub rasterizer: Cached<RasterizerState>,
    pub samplers: [Cached<SamplerState>; MAX_SAMPLER_SLOTS],
    pub scissor: Cached<IntRect>,
    pub viewport: Cached<IntRect>,
    pub pixel_shader: Cached<PixelShaderId>,
    pub textures: [Cached<Option<TextureId>>; MAX_SAMPLER_SLOTS],
    pub render_target: Cached<TextureId>,
}

impl NativeStateCache {
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}
