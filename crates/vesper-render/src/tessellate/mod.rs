//! Shape and sprite tessellation.
//!
//! Builders turn one primitive into vertices and batch-relative indices. Each
//! builder returns the number of indices it recorded; `0` means the input was
//! degenerate or the batch buffer had no room, and nothing was recorded.

mod line;
pub mod quality;
mod shape;
mod textured;

pub use line::{LineStyle, MITER_THRESHOLD, line, line_string, shape2d_frame};
pub use shape::{
    circle, circle_arc, circle_frame, circle_pie, ellipse, ellipse_frame, quad, rect, rect_frame,
    round_rect, shape2d, shape2d_transformed, triangle,
};
pub use textured::{sprite, texture_region, textured_circle, textured_quad};

use vesper_core::math::Vec2;

use crate::asset::PixelShaderType;
use crate::batch::{BatchAllocation, BatchBuffer};
use crate::command::CommandManager;

/// Two triangles over four vertices laid out as
/// `0 1` on the first row and `2 3` on the second.
pub(crate) const RECT_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

/// Four strips (left, top, right, bottom) over an outer/inner vertex pair per
/// corner: `0/1` top left, `2/3` bottom left, `4/5` top right, `6/7` bottom right.
pub(crate) const RECT_FRAME_INDICES: [u32; 24] = [
    0, 1, 2, 3, 2, 1, 0, 4, 1, 5, 1, 4, 5, 4, 7, 6, 7, 4, 3, 7, 2, 6, 2, 7,
];

/// Where builders write: the batch buffer, plus the command stream that
/// receives batch boundaries and the draw for each filled allocation.
pub struct GeometrySink<'a> {
    batches: &'a mut BatchBuffer,
    commands: &'a mut CommandManager,
    shader: PixelShaderType,
}

impl<'a> GeometrySink<'a> {
    pub fn new(
        batches: &'a mut BatchBuffer,
        commands: &'a mut CommandManager,
        shader: PixelShaderType,
    ) -> Self {
        Self {
            batches,
            commands,
            shader,
        }
    }

    /// Max scaling of the active transform.
    pub fn scale(&self) -> f32 {
        self.commands.max_scaling()
    }

    pub fn shader(&self) -> PixelShaderType {
        self.shader
    }

    /// Allocates, lets `fill` write the geometry, then records the draw.
    ///
    /// Every allocation gets its own draw push so a batch boundary between two
    /// allocations of one primitive stays correct; consecutive pushes merge.
    pub fn emit(
        &mut self,
        vertex_count: u32,
        index_count: u32,
        fill: impl FnOnce(&mut BatchAllocation<'_>),
    ) -> u32 {
        let Some(mut allocation) = self.batches.allocate(vertex_count, index_count, self.commands)
        else {
            return 0;
        };
        fill(&mut allocation);
        self.commands.push_draw(index_count, self.shader);
        index_count
    }
}

pub(crate) fn write_table(indices: &mut [u32], offset: u32, table: &[u32]) {
    for (dst, src) in indices.iter_mut().zip(table) {
        *dst = offset + src;
    }
}

/// Point at `angle` radians, measured clockwise from straight up.
#[inline]
pub(crate) fn on_circle(center: Vec2, r: f32, angle: f32) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(center.x + r * s, center.y - r * c)
}

/// Clockwise-from-up angle of a direction vector.
#[inline]
pub(crate) fn angle_of(v: Vec2) -> f32 {
    v.x.atan2(-v.y)
}

#[inline]
pub(crate) fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
