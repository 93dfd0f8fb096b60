//! Replays one recorded frame against a native backend.

use vesper_core::geometry::{IntRect, Size};
use vesper_core::math::Mat3x2;
use vesper_core::profiling::profile_function;

use crate::asset::TextureLookup;
use crate::backend::NativeRenderer2D;
use crate::batch::{BatchBuffer, DrawOffset};
use crate::command::Command;

/// Counters for one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub batches: u32,
    pub draw_calls: u32,
    /// Blend, rasterizer, sampler, scissor, viewport, shader, texture and
    /// render-target commands forwarded to the backend.
    pub state_changes: u32,
    pub uploaded_vertices: u32,
    pub uploaded_indices: u32,
}

/// Walks `commands` once, uploading each batch on `NextBatch` and issuing
/// every `Draw` at the batch's GPU offsets.
///
/// Transforms reach the backend already multiplied by the pixel-to-clip
/// matrix of the current viewport. A `None` viewport covers the whole render
/// target, whose size is read from `textures`.
pub fn replay<B: NativeRenderer2D>(
    commands: &[Command],
    batches: &mut BatchBuffer,
    native: &mut B,
    textures: &dyn TextureLookup,
) -> ReplayStats {
    profile_function!();
    let mut stats = ReplayStats::default();
    let mut viewport = ViewportState::default();
    let mut batch_index = 0usize;
    let mut offset = DrawOffset {
        base_vertex: 0,
        first_index: 0,
    };

    native.begin_replay();

    for command in commands {
        match *command {
            Command::NextBatch => {
                offset = batches.set_buffers(batch_index, native);
                if let Some(batch) = batches.batches().get(batch_index) {
                    stats.uploaded_vertices += batch.vertex_count;
                    stats.uploaded_indices += batch.index_count;
                }
                tracing::trace!(
                    "Batch {} at vertex {} index {}",
                    batch_index,
                    offset.base_vertex,
                    offset.first_index
                );
                batch_index += 1;
                stats.batches += 1;
            }
            Command::Draw { index_count } => {
                native.draw_indexed(index_count, offset.first_index, offset.base_vertex);
                offset.first_index += index_count;
                stats.draw_calls += 1;
            }
            Command::BlendState(state) => {
                native.set_blend_state(state);
                stats.state_changes += 1;
            }
            Command::RasterizerState(state) => {
                native.set_rasterizer_state(state);
                stats.state_changes += 1;
            }
            Command::SamplerState { slot, state } => {
                native.set_sampler_state(slot, state);
                stats.state_changes += 1;
            }
            Command::ScissorRect(rect) => {
                native.set_scissor_rect(rect);
                stats.state_changes += 1;
            }
            Command::Viewport(rect) => {
                viewport.logical = rect;
                viewport.apply(native);
                stats.state_changes += 1;
            }
            Command::Transform(matrix) => {
                viewport.transform = matrix;
                native.set_transform(&(matrix * viewport.screen));
            }
            Command::PixelShader(id) => {
                native.set_pixel_shader(id);
                stats.state_changes += 1;
            }
            Command::BindTexture { slot, texture } => {
                native.bind_texture(slot, texture);
                stats.state_changes += 1;
            }
            Command::SetRenderTarget(id) => {
                native.set_render_target(id);
                match textures.size(id) {
                    Some(size) => viewport.target_size = size,
                    None => tracing::warn!("Render target {:?} has no registered size", id),
                }
                if viewport.logical.is_none() {
                    viewport.apply(native);
                }
                stats.state_changes += 1;
            }
        }
    }

    native.end_replay();
    stats
}

#[derive(Debug, Clone, Copy)]
struct ViewportState {
    logical: Option<IntRect>,
    target_size: Size<u32>,
    screen: Mat3x2,
    transform: Mat3x2,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            logical: None,
            target_size: Size::new(0, 0),
            screen: Mat3x2::IDENTITY,
            transform: Mat3x2::IDENTITY,
        }
    }
}

impl ViewportState {
    fn apply<B: NativeRenderer2D>(&mut self, native: &mut B) {
        let rect = self
            .logical
            .unwrap_or_else(|| IntRect::from_size(self.target_size));
        native.set_viewport(rect);
        if rect.width > 0 && rect.height > 0 {
            self.screen = Mat3x2::screen(rect.width as f32, rect.height as f32);
        } else {
            tracing::warn!("Empty viewport {:?}", rect);
        }
        native.set_transform(&(self.transform * self.screen));
    }
}
