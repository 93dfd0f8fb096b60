use std::f32::consts::TAU;

use vesper_core::geometry::{FloatRect, Quad};
use vesper_core::math::Vec2;

use super::quality::textured_circle_quality;
use super::{GeometrySink, RECT_INDICES, is_finite, write_table};
use crate::Color;
use crate::vertex::{Index, Vertex2D};

/// Caller-built textured mesh. `start` and `count` select a range of
/// `indices`; the range is clamped and rounded down to whole triangles.
pub fn sprite(
    sink: &mut GeometrySink<'_>,
    vertices: &[Vertex2D],
    indices: &[Index],
    start: usize,
    count: usize,
) -> u32 {
    let start = start.min(indices.len());
    let count = count.min(indices.len() - start);
    let count = count - count % 3;
    if vertices.is_empty() || count == 0 {
        return 0;
    }
    let selected = &indices[start..start + count];
    let (Ok(vertex_count), Ok(index_count)) = (u32::try_from(vertices.len()), u32::try_from(count))
    else {
        return 0;
    };
    if selected.iter().any(|&i| i >= vertex_count) {
        tracing::debug!("Sprite index out of range, skipping");
        return 0;
    }
    sink.emit(vertex_count, index_count, |a| {
        a.vertices.copy_from_slice(vertices);
        for (dst, src) in a.indices.iter_mut().zip(selected) {
            *dst = a.index_offset + src;
        }
    })
}

/// `rect` sampled from the `uv` region of the bound texture. Corner colors
/// are top left, top right, bottom right, bottom left.
pub fn texture_region(
    sink: &mut GeometrySink<'_>,
    rect: &FloatRect,
    uv: &FloatRect,
    colors: [Color; 4],
) -> u32 {
    if rect.width == 0.0 || rect.height == 0.0 || !rect.is_finite() || !uv.is_finite() {
        return 0;
    }
    sink.emit(4, 6, |a| {
        a.vertices[0] = Vertex2D::new(rect.top_left(), uv.top_left(), colors[0]);
        a.vertices[1] = Vertex2D::new(rect.top_right(), uv.top_right(), colors[1]);
        a.vertices[2] = Vertex2D::new(rect.bottom_left(), uv.bottom_left(), colors[3]);
        a.vertices[3] = Vertex2D::new(rect.bottom_right(), uv.bottom_right(), colors[2]);
        write_table(a.indices, a.index_offset, &RECT_INDICES);
    })
}

/// Circle cut out of the `uv` region, which maps onto its bounding square.
pub fn textured_circle(
    sink: &mut GeometrySink<'_>,
    center: Vec2,
    r: f32,
    uv: &FloatRect,
    color: Color,
) -> u32 {
    if !(r > 0.0) || !r.is_finite() || !is_finite(center) || !uv.is_finite() {
        return 0;
    }
    let quality = textured_circle_quality(r * sink.scale());
    let uv_center = uv.center();
    let uv_half = Vec2::new(uv.width, uv.height) * 0.5;
    sink.emit(quality + 1, quality * 3, |a| {
        a.vertices[0] = Vertex2D::new(center, uv_center, color);
        for (i, v) in a.vertices[1..].iter_mut().enumerate() {
            let (s, c) = (TAU / quality as f32 * i as f32).sin_cos();
            let dir = Vec2::new(c, -s);
            *v = Vertex2D::new(center + dir * r, uv_center + dir * uv_half, color);
        }
        let o = a.index_offset;
        for (i, tri) in a.indices.chunks_exact_mut(3).enumerate() {
            let i = i as u32;
            tri.copy_from_slice(&[o + 1 + i, o, o + 1 + (i + 1) % quality]);
        }
    })
}

/// Arbitrary quad mapped to the `uv` region, top left at the first point.
pub fn textured_quad(sink: &mut GeometrySink<'_>, quad: &Quad, uv: &FloatRect, color: Color) -> u32 {
    if !quad.p.iter().all(|p| is_finite(*p)) || !uv.is_finite() {
        return 0;
    }
    let tex = [uv.top_left(), uv.top_right(), uv.bottom_right(), uv.bottom_left()];
    sink.emit(4, 6, |a| {
        for ((v, p), t) in a.vertices.iter_mut().zip(quad.p).zip(tex) {
            *v = Vertex2D::new(p, t, color);
        }
        write_table(a.indices, a.index_offset, &[0, 1, 3, 3, 1, 2]);
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;

    const WHITE: Color = Color::WHITE;

    fn uvs(h: &Harness) -> Vec<[f32; 2]> {
        h.batches.vertices().iter().map(|v| v.tex).collect()
    }

    #[test]
    fn test_texture_region_maps_uv_corners() {
        let mut h = Harness::new();
        let rect = FloatRect::new(0.0, 0.0, 64.0, 32.0);
        let uv = FloatRect::new(0.5, 0.0, 0.5, 0.25);
        assert_eq!(texture_region(&mut h.sink(), &rect, &uv, [WHITE; 4]), 6);
        assert_eq!(uvs(&h), vec![[0.5, 0.0], [1.0, 0.0], [0.5, 0.25], [1.0, 0.25]]);
    }

    #[test]
    fn test_textured_circle_uv_stays_in_region() {
        let mut h = Harness::new();
        let uv = FloatRect::new(0.0, 0.0, 1.0, 1.0);
        let count = textured_circle(&mut h.sink(), Vec2::new(50.0, 50.0), 10.0, &uv, WHITE);
        assert_eq!(count, textured_circle_quality(10.0) * 3);
        let uvs = uvs(&h);
        assert_eq!(uvs[0], [0.5, 0.5]);
        assert!((uvs[1][0] - 1.0).abs() < 1e-5);
        for [u, v] in uvs {
            assert!((-1e-5..=1.0 + 1e-5).contains(&u));
            assert!((-1e-5..=1.0 + 1e-5).contains(&v));
        }
        h.assert_indices_in_range();
    }

    #[test]
    fn test_textured_circle_segment_count() {
        let mut h = Harness::new();
        let uv = FloatRect::new(0.0, 0.0, 1.0, 1.0);
        let count = textured_circle(&mut h.sink(), Vec2::ZERO, 100.0, &uv, WHITE);
        assert_eq!(count, 40 * 3);
        assert_eq!(h.batches.vertices().len(), 41);
    }

    #[test]
    fn test_textured_quad() {
        let mut h = Harness::new();
        let quad = Quad::new(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 2.0),
            Vec2::new(12.0, 12.0),
            Vec2::new(-1.0, 10.0),
        );
        let uv = FloatRect::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(textured_quad(&mut h.sink(), &quad, &uv, WHITE), 6);
        assert_eq!(uvs(&h), vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        assert_eq!(h.batches.indices(), &[0, 1, 3, 3, 1, 2]);
    }

    #[test]
    fn test_sprite_rounds_to_whole_triangles() {
        let mut h = Harness::new();
        let vertices = [Vertex2D::default(); 4];
        let indices = [0, 1, 2, 2, 1, 3];
        assert_eq!(sprite(&mut h.sink(), &vertices, &indices, 1, 5), 3);
        assert_eq!(h.batches.indices(), &[1, 2, 2]);
        assert_eq!(sprite(&mut h.sink(), &vertices, &indices, 0, 100), 6);
        assert_eq!(&h.batches.indices()[3..], &[4, 5, 6, 6, 5, 7]);
    }

    #[test]
    fn test_sprite_rejects_empty_and_invalid() {
        let mut h = Harness::new();
        let vertices = [Vertex2D::default(); 2];
        assert_eq!(sprite(&mut h.sink(), &vertices, &[0, 1, 2], 0, 3), 0);
        assert_eq!(sprite(&mut h.sink(), &vertices, &[0, 1, 1], 0, 2), 0);
        assert_eq!(sprite(&mut h.sink(), &vertices, &[0, 1, 1], 7, 3), 0);
        assert_eq!(sprite(&mut h.sink(), &[], &[0, 1, 1], 0, 3), 0);
        assert_eq!(h.batches.vertex_count(), 0);
    }
}
