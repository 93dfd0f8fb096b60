//! GPU vertex layout shared by every backend.

use bytemuck::{Pod, Zeroable};
use vesper_core::math::Vec2;

use crate::Color;

/// Index into the vertex range of the current batch.
pub type Index = u32;

/// One 2D vertex: position, texture coordinate and color.
///
/// # Memory Layout
///
/// ```text
/// Offset | Field | Size
/// -------|-------|------
/// 0      | pos   | 8 bytes  ([f32; 2])
/// 8      | tex   | 8 bytes  ([f32; 2])
/// 16     | color | 16 bytes ([f32; 4])
/// Total: 32 bytes
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex2D {
    pub pos: [f32; 2],
    pub tex: [f32; 2],
    pub color: [f32; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<Vertex2D>(), 32);

impl Vertex2D {
    #[inline]
    pub fn new(pos: Vec2, tex: Vec2, color: Color) -> Self {
        Self {
            pos: pos.to_array(),
            tex: tex.to_array(),
            color: color.to_array(),
        }
    }

    /// Untextured vertex; the texture coordinate is left at zero.
    #[inline]
    pub fn colored(pos: Vec2, color: Color) -> Self {
        Self {
            pos: pos.to_array(),
            tex: [0.0, 0.0],
            color: color.to_array(),
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::from_array(self.pos)
    }

    #[cfg(feature = "wgpu")]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            0 => Float32x2,  // pos
            1 => Float32x2,  // tex
            2 => Float32x4,  // color
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex2D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }
}
