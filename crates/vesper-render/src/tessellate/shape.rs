use std::f32::consts::{FRAC_PI_2, TAU};

use vesper_core::geometry::{FloatRect, Quad};
use vesper_core::math::Vec2;

use super::quality::{circle_frame_quality, circle_pie_quality, circle_quality, ellipse_quality, fan_quality};
use super::{GeometrySink, RECT_FRAME_INDICES, RECT_INDICES, is_finite, on_circle, write_table};
use crate::Color;
use crate::vertex::Vertex2D;

pub fn triangle(sink: &mut GeometrySink<'_>, points: [Vec2; 3], colors: [Color; 3]) -> u32 {
    if !points.iter().all(|p| is_finite(*p)) {
        return 0;
    }
    sink.emit(3, 3, |a| {
        for ((v, p), c) in a.vertices.iter_mut().zip(points).zip(colors) {
            *v = Vertex2D::colored(p, c);
        }
        write_table(a.indices, a.index_offset, &[0, 1, 2]);
    })
}

/// Corner colors are top left, top right, bottom right, bottom left.
pub fn rect(sink: &mut GeometrySink<'_>, rect: &FloatRect, colors: [Color; 4]) -> u32 {
    if rect.width == 0.0 || rect.height == 0.0 || !rect.is_finite() {
        return 0;
    }
    sink.emit(4, 6, |a| {
        a.vertices[0] = Vertex2D::colored(rect.top_left(), colors[0]);
        a.vertices[1] = Vertex2D::colored(rect.top_right(), colors[1]);
        a.vertices[2] = Vertex2D::colored(rect.bottom_left(), colors[3]);
        a.vertices[3] = Vertex2D::colored(rect.bottom_right(), colors[2]);
        write_table(a.indices, a.index_offset, &RECT_INDICES);
    })
}

/// Outline of `rect`, extending `inner` pixels inward and `outer` pixels outward.
pub fn rect_frame(
    sink: &mut GeometrySink<'_>,
    rect: &FloatRect,
    inner: f32,
    outer: f32,
    color: Color,
) -> u32 {
    if inner < 0.0 || outer < 0.0 || inner + outer <= 0.0 || !rect.is_finite() {
        return 0;
    }
    let o = rect.stretched(outer);
    let i = rect.stretched(-inner);
    sink.emit(8, 24, |a| {
        let corners = [
            o.top_left(),
            i.top_left(),
            o.bottom_left(),
            i.bottom_left(),
            o.top_right(),
            i.top_right(),
            o.bottom_right(),
            i.bottom_right(),
        ];
        for (v, p) in a.vertices.iter_mut().zip(corners) {
            *v = Vertex2D::colored(p, color);
        }
        write_table(a.indices, a.index_offset, &RECT_FRAME_INDICES);
    })
}

/// Corner colors follow the quad's point order.
pub fn quad(sink: &mut GeometrySink<'_>, quad: &Quad, colors: [Color; 4]) -> u32 {
    if !quad.p.iter().all(|p| is_finite(*p)) {
        return 0;
    }
    sink.emit(4, 6, |a| {
        for ((v, p), c) in a.vertices.iter_mut().zip(quad.p).zip(colors) {
            *v = Vertex2D::colored(p, c);
        }
        write_table(a.indices, a.index_offset, &[0, 1, 3, 3, 1, 2]);
    })
}

/// Filled circle as a fan around the center, shaded from `inner` at the
/// center to `outer` on the rim.
pub fn circle(sink: &mut GeometrySink<'_>, center: Vec2, r: f32, inner: Color, outer: Color) -> u32 {
    if !(r > 0.0) || !r.is_finite() || !is_finite(center) {
        return 0;
    }
    let quality = circle_quality(r * sink.scale());
    fan(sink, center, quality, inner, outer, |i| {
        let (s, c) = (TAU / quality as f32 * i as f32).sin_cos();
        Vec2::new(center.x + r * c, center.y - r * s)
    })
}

pub fn circle_frame(
    sink: &mut GeometrySink<'_>,
    center: Vec2,
    r_inner: f32,
    thickness: f32,
    inner: Color,
    outer: Color,
) -> u32 {
    if !(thickness > 0.0) || r_inner < 0.0 || !r_inner.is_finite() || !is_finite(center) {
        return 0;
    }
    let r_outer = r_inner + thickness;
    let quality = circle_frame_quality(r_outer * sink.scale());
    ring(sink, quality, inner, outer, |i| {
        let (s, c) = (TAU / quality as f32 * i as f32).sin_cos();
        let dir = Vec2::new(c, -s);
        (center + dir * r_inner, center + dir * r_outer)
    })
}

/// Filled circular sector starting at `start` (clockwise from up) and
/// sweeping `angle` radians. Negative angles sweep counter-clockwise.
pub fn circle_pie(
    sink: &mut GeometrySink<'_>,
    center: Vec2,
    r: f32,
    start: f32,
    angle: f32,
    color: Color,
) -> u32 {
    if !(r > 0.0) || angle == 0.0 || !angle.is_finite() || !start.is_finite() || !is_finite(center) {
        return 0;
    }
    let angle = angle.clamp(-TAU, TAU);
    let quality = circle_pie_quality(r * sink.scale(), angle);
    let step = angle / (quality - 1) as f32;
    sink.emit(quality + 1, (quality - 1) * 3, |a| {
        a.vertices[0] = Vertex2D::colored(center, color);
        for (i, v) in a.vertices[1..].iter_mut().enumerate() {
            *v = Vertex2D::colored(on_circle(center, r, start + step * i as f32), color);
        }
        let o = a.index_offset;
        for (i, tri) in a.indices.chunks_exact_mut(3).enumerate() {
            let i = i as u32;
            tri.copy_from_slice(&[o, o + i + 1, o + i + 2]);
        }
    })
}

/// Ring segment of width `thickness` outside radius `r_inner`.
pub fn circle_arc(
    sink: &mut GeometrySink<'_>,
    center: Vec2,
    r_inner: f32,
    start: f32,
    angle: f32,
    thickness: f32,
    color: Color,
) -> u32 {
    if !(thickness > 0.0)
        || r_inner < 0.0
        || angle == 0.0
        || !angle.is_finite()
        || !start.is_finite()
        || !is_finite(center)
    {
        return 0;
    }
    let angle = angle.clamp(-TAU, TAU);
    let r_outer = r_inner + thickness;
    let quality = circle_pie_quality(r_outer * sink.scale(), angle);
    let step = angle / (quality - 1) as f32;
    sink.emit(quality * 2, (quality - 1) * 6, |a| {
        for (i, pair) in a.vertices.chunks_exact_mut(2).enumerate() {
            let theta = start + step * i as f32;
            pair[0] = Vertex2D::colored(on_circle(center, r_outer, theta), color);
            pair[1] = Vertex2D::colored(on_circle(center, r_inner, theta), color);
        }
        strip_indices(a.indices, a.index_offset);
    })
}

pub fn ellipse(sink: &mut GeometrySink<'_>, center: Vec2, a: f32, b: f32, color: Color) -> u32 {
    if !(a > 0.0) || !(b > 0.0) || !a.is_finite() || !b.is_finite() || !is_finite(center) {
        return 0;
    }
    let quality = ellipse_quality(a.max(b), sink.scale());
    fan(sink, center, quality, color, color, |i| {
        let (s, c) = (TAU / quality as f32 * i as f32).sin_cos();
        Vec2::new(center.x + a * c, center.y - b * s)
    })
}

pub fn ellipse_frame(
    sink: &mut GeometrySink<'_>,
    center: Vec2,
    a_inner: f32,
    b_inner: f32,
    thickness: f32,
    inner: Color,
    outer: Color,
) -> u32 {
    if !(thickness > 0.0) || a_inner < 0.0 || b_inner < 0.0 || !is_finite(center) {
        return 0;
    }
    let (a_outer, b_outer) = (a_inner + thickness, b_inner + thickness);
    let quality = circle_frame_quality(a_outer.max(b_outer) * sink.scale());
    ring(sink, quality, inner, outer, |i| {
        let (s, c) = (TAU / quality as f32 * i as f32).sin_cos();
        (
            Vec2::new(center.x + a_inner * c, center.y - b_inner * s),
            Vec2::new(center.x + a_outer * c, center.y - b_outer * s),
        )
    })
}

/// Rectangle with quarter-circle corners of radius `r`, clamped to half the
/// shorter side. A non-positive radius draws a plain rectangle.
pub fn round_rect(sink: &mut GeometrySink<'_>, rect: &FloatRect, r: f32, color: Color) -> u32 {
    if !(rect.width > 0.0) || !(rect.height > 0.0) || !rect.is_finite() {
        return 0;
    }
    let rr = r.min(rect.width * 0.5).min(rect.height * 0.5);
    if !(rr > 0.0) {
        return self::rect(sink, rect, [color; 4]);
    }

    let quality = fan_quality(rr * sink.scale());
    let centers = [
        Vec2::new(rect.x + rect.width - rr, rect.y + rr),
        Vec2::new(rect.x + rect.width - rr, rect.y + rect.height - rr),
        Vec2::new(rect.x + rr, rect.y + rect.height - rr),
        Vec2::new(rect.x + rr, rect.y + rr),
    ];
    let step = FRAC_PI_2 / (quality - 1) as f32;
    let rim = quality * 4;
    sink.emit(rim + 1, rim * 3, |a| {
        a.vertices[0] = Vertex2D::colored(rect.center(), color);
        for (corner, center) in centers.iter().enumerate() {
            let base = FRAC_PI_2 * corner as f32;
            for j in 0..quality {
                let p = on_circle(*center, rr, base + step * j as f32);
                a.vertices[1 + corner * quality as usize + j as usize] = Vertex2D::colored(p, color);
            }
        }
        fan_indices(a.indices, a.index_offset, rim);
    })
}

/// Arbitrary triangulated polygon. Indices refer to `points`.
pub fn shape2d(
    sink: &mut GeometrySink<'_>,
    points: &[Vec2],
    indices: &[u32],
    offset: Option<Vec2>,
    color: Color,
) -> u32 {
    let offset = offset.unwrap_or(Vec2::ZERO);
    polygon(sink, points, indices, color, |p| p + offset)
}

/// Like [`shape2d`], rotating each point by the angle with sine `s` and
/// cosine `c` before adding `offset`.
pub fn shape2d_transformed(
    sink: &mut GeometrySink<'_>,
    points: &[Vec2],
    indices: &[u32],
    s: f32,
    c: f32,
    offset: Vec2,
    color: Color,
) -> u32 {
    polygon(sink, points, indices, color, |p| {
        Vec2::new(p.x * c - p.y * s + offset.x, p.x * s + p.y * c + offset.y)
    })
}

fn polygon(
    sink: &mut GeometrySink<'_>,
    points: &[Vec2],
    indices: &[u32],
    color: Color,
    map: impl Fn(Vec2) -> Vec2,
) -> u32 {
    if points.is_empty() || indices.is_empty() {
        return 0;
    }
    let (Ok(vertex_count), Ok(index_count)) = (u32::try_from(points.len()), u32::try_from(indices.len()))
    else {
        return 0;
    };
    if indices.iter().any(|&i| i >= vertex_count) {
        tracing::debug!("Polygon index out of range, skipping");
        return 0;
    }
    sink.emit(vertex_count, index_count, |a| {
        for (v, p) in a.vertices.iter_mut().zip(points) {
            *v = Vertex2D::colored(map(*p), color);
        }
        for (dst, src) in a.indices.iter_mut().zip(indices) {
            *dst = a.index_offset + src;
        }
    })
}

/// Center vertex plus `quality` rim vertices, closed.
fn fan(
    sink: &mut GeometrySink<'_>,
    center: Vec2,
    quality: u32,
    inner: Color,
    outer: Color,
    rim: impl Fn(u32) -> Vec2,
) -> u32 {
    sink.emit(quality + 1, quality * 3, |a| {
        a.vertices[0] = Vertex2D::colored(center, inner);
        for (i, v) in a.vertices[1..].iter_mut().enumerate() {
            *v = Vertex2D::colored(rim(i as u32), outer);
        }
        fan_indices(a.indices, a.index_offset, quality);
    })
}

/// `quality` (inner, outer) vertex pairs, closed into a loop.
fn ring(
    sink: &mut GeometrySink<'_>,
    quality: u32,
    inner: Color,
    outer: Color,
    pair: impl Fn(u32) -> (Vec2, Vec2),
) -> u32 {
    sink.emit(quality * 2, quality * 6, |a| {
        for (i, v) in a.vertices.chunks_exact_mut(2).enumerate() {
            let (pi, po) = pair(i as u32);
            v[0] = Vertex2D::colored(po, outer);
            v[1] = Vertex2D::colored(pi, inner);
        }
        let o = a.index_offset;
        let n = quality * 2;
        for (i, quad) in a.indices.chunks_exact_mut(6).enumerate() {
            let i = i as u32 * 2;
            let (outer0, inner0) = (i, i + 1);
            let (outer1, inner1) = ((i + 2) % n, (i + 3) % n);
            quad.copy_from_slice(&[
                o + outer0,
                o + inner0,
                o + outer1,
                o + outer1,
                o + inner0,
                o + inner1,
            ]);
        }
    })
}

/// Triangle fan around vertex 0 over `rim` closed rim vertices starting at 1.
fn fan_indices(indices: &mut [u32], offset: u32, rim: u32) {
    for (i, tri) in indices.chunks_exact_mut(3).enumerate() {
        let i = i as u32;
        let next = (i + 1) % rim;
        tri.copy_from_slice(&[offset + 1 + i, offset, offset + 1 + next]);
    }
}

/// Open strip over consecutive (outer, inner) pairs.
pub(crate) fn strip_indices(indices: &mut [u32], offset: u32) {
    for (i, quad) in indices.chunks_exact_mut(6).enumerate() {
        let b = offset + i as u32 * 2;
        quad.copy_from_slice(&[b, b + 1, b + 2, b + 2, b + 1, b + 3]);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Harness;
    use super::*;
    use crate::command::Command;

    const WHITE: Color = Color::WHITE;

    #[test]
    fn test_rect_counts_and_layout() {
        let mut h = Harness::new();
        let r = FloatRect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect(&mut h.sink(), &r, [WHITE; 4]), 6);
        assert_eq!(
            h.positions(),
            vec![
                Vec2::new(10.0, 20.0),
                Vec2::new(40.0, 20.0),
                Vec2::new(10.0, 60.0),
                Vec2::new(40.0, 60.0),
            ]
        );
        assert_eq!(h.recorded(), &[Command::Draw { index_count: 6 }]);
    }

    #[test]
    fn test_rect_corner_colors() {
        let mut h = Harness::new();
        let colors = [Color::RED, Color::GREEN, Color::BLUE, Color::BLACK];
        rect(&mut h.sink(), &FloatRect::new(0.0, 0.0, 1.0, 1.0), colors);
        let vertices = h.batches.vertices();
        assert_eq!(vertices[2].color, Color::BLACK.to_array());
        assert_eq!(vertices[3].color, Color::BLUE.to_array());
    }

    #[test]
    fn test_zero_size_rect_is_noop() {
        let mut h = Harness::new();
        assert_eq!(rect(&mut h.sink(), &FloatRect::new(0.0, 0.0, 0.0, 5.0), [WHITE; 4]), 0);
        assert!(h.recorded().is_empty());
    }

    #[test]
    fn test_rect_frame() {
        let mut h = Harness::new();
        let r = FloatRect::new(10.0, 10.0, 10.0, 10.0);
        assert_eq!(rect_frame(&mut h.sink(), &r, 1.0, 2.0, WHITE), 24);
        let positions = h.positions();
        assert_eq!(positions[0], Vec2::new(8.0, 8.0));
        assert_eq!(positions[1], Vec2::new(11.0, 11.0));
        assert_eq!(positions[6], Vec2::new(22.0, 22.0));
        assert_eq!(rect_frame(&mut h.sink(), &r, 0.0, 0.0, WHITE), 0);
        assert_eq!(rect_frame(&mut h.sink(), &r, -1.0, 3.0, WHITE), 0);
    }

    #[test]
    fn test_circle_quality_follows_scale() {
        let mut h = Harness::new();
        assert_eq!(circle(&mut h.sink(), Vec2::ZERO, 10.0, WHITE, WHITE), 20 * 3);
        assert_eq!(h.batches.vertex_count(), 21);

        h.commands.push_transform_local(vesper_core::math::Mat3x2::scale(Vec2::splat(4.0)));
        let scaled = circle(&mut h.sink(), Vec2::ZERO, 10.0, WHITE, WHITE);
        assert!(scaled > 20 * 3);
        h.assert_indices_in_range();
    }

    #[test]
    fn test_circle_rim_positions() {
        let mut h = Harness::new();
        circle(&mut h.sink(), Vec2::new(100.0, 100.0), 0.5, Color::RED, Color::BLUE);
        let positions = h.positions();
        assert_eq!(positions.len(), 4);
        assert_eq!(positions[0], Vec2::new(100.0, 100.0));
        assert!((positions[1] - Vec2::new(100.5, 100.0)).length() < 1e-5);
        assert_eq!(h.batches.vertices()[0].color, Color::RED.to_array());
        assert_eq!(h.batches.vertices()[1].color, Color::BLUE.to_array());
        assert_eq!(h.batches.indices(), &[1, 0, 2, 2, 0, 3, 3, 0, 1]);
    }

    #[test]
    fn test_degenerate_circles_are_noops() {
        let mut h = Harness::new();
        assert_eq!(circle(&mut h.sink(), Vec2::ZERO, 0.0, WHITE, WHITE), 0);
        assert_eq!(circle(&mut h.sink(), Vec2::ZERO, -1.0, WHITE, WHITE), 0);
        assert_eq!(circle(&mut h.sink(), Vec2::ZERO, f32::NAN, WHITE, WHITE), 0);
        assert_eq!(circle_frame(&mut h.sink(), Vec2::ZERO, 5.0, 0.0, WHITE, WHITE), 0);
        assert_eq!(circle_frame(&mut h.sink(), Vec2::ZERO, 5.0, -2.0, WHITE, WHITE), 0);
        assert_eq!(circle_pie(&mut h.sink(), Vec2::ZERO, 5.0, 0.0, 0.0, WHITE), 0);
        assert_eq!(circle_arc(&mut h.sink(), Vec2::ZERO, 5.0, 0.0, 1.0, 0.0, WHITE), 0);
        assert_eq!(ellipse(&mut h.sink(), Vec2::ZERO, 0.0, 3.0, WHITE), 0);
        assert!(h.recorded().is_empty());
    }

    #[test]
    fn test_circle_frame_ring() {
        let mut h = Harness::new();
        let count = circle_frame(&mut h.sink(), Vec2::ZERO, 10.0, 2.0, WHITE, WHITE);
        let quality = circle_frame_quality(12.0);
        assert_eq!(count, quality * 6);
        assert_eq!(h.batches.vertex_count(), quality * 2);
        h.assert_indices_in_range();
        let positions = h.positions();
        assert!((positions[0].length() - 12.0).abs() < 1e-4);
        assert!((positions[1].length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_pie_covers_requested_sweep() {
        let mut h = Harness::new();
        let center = Vec2::new(50.0, 50.0);
        let count = circle_pie(&mut h.sink(), center, 20.0, 0.0, FRAC_PI_2, WHITE);
        let positions = h.positions();
        let quality = positions.len() as u32 - 1;
        assert_eq!(count, (quality - 1) * 3);
        assert!((positions[1] - Vec2::new(50.0, 30.0)).length() < 1e-4);
        assert!((positions[quality as usize] - Vec2::new(70.0, 50.0)).length() < 1e-4);
        h.assert_indices_in_range();
    }

    #[test]
    fn test_arc_vertices_alternate_outer_inner() {
        let mut h = Harness::new();
        let count = circle_arc(&mut h.sink(), Vec2::ZERO, 10.0, 0.0, std::f32::consts::PI, 5.0, WHITE);
        let positions = h.positions();
        assert_eq!(count as usize, (positions.len() / 2 - 1) * 6);
        assert!((positions[0].length() - 15.0).abs() < 1e-4);
        assert!((positions[1].length() - 10.0).abs() < 1e-4);
        h.assert_indices_in_range();
    }

    #[test]
    fn test_ellipse_and_frame() {
        let mut h = Harness::new();
        let quality = ellipse_quality(40.0, 1.0);
        assert_eq!(ellipse(&mut h.sink(), Vec2::ZERO, 40.0, 10.0, WHITE), quality * 3);
        assert_eq!(h.positions()[1], Vec2::new(40.0, 0.0));

        let frame = ellipse_frame(&mut h.sink(), Vec2::ZERO, 40.0, 10.0, 2.0, WHITE, WHITE);
        assert_eq!(frame, circle_frame_quality(42.0) * 6);
        assert_eq!(frame, 186);
        h.assert_indices_in_range();
    }

    #[test]
    fn test_round_rect_stays_inside_bounds() {
        let mut h = Harness::new();
        let r = FloatRect::new(0.0, 0.0, 100.0, 40.0);
        let count = round_rect(&mut h.sink(), &r, 10.0, WHITE);
        let quality = fan_quality(10.0);
        assert_eq!(count, quality * 4 * 3);
        for p in h.positions() {
            assert!(p.x >= -1e-4 && p.x <= 100.0 + 1e-4);
            assert!(p.y >= -1e-4 && p.y <= 40.0 + 1e-4);
        }
        h.assert_indices_in_range();
    }

    #[test]
    fn test_round_rect_without_radius_is_rect() {
        let mut h = Harness::new();
        let r = FloatRect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(round_rect(&mut h.sink(), &r, 0.0, WHITE), 6);
    }

    #[test]
    fn test_triangle_and_quad() {
        let mut h = Harness::new();
        let points = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        assert_eq!(triangle(&mut h.sink(), points, [WHITE; 3]), 3);
        let q = Quad::from(FloatRect::new(0.0, 0.0, 2.0, 2.0));
        assert_eq!(quad(&mut h.sink(), &q, [WHITE; 4]), 6);
        assert_eq!(&h.batches.indices()[3..], &[3, 4, 6, 6, 4, 5]);
        assert_eq!(h.recorded(), &[Command::Draw { index_count: 9 }]);
    }

    #[test]
    fn test_shape2d_offsets_indices() {
        let mut h = Harness::new();
        let points = [Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(4.0, 4.0)];
        rect(&mut h.sink(), &FloatRect::new(0.0, 0.0, 1.0, 1.0), [WHITE; 4]);
        let count = shape2d(&mut h.sink(), &points, &[0, 1, 2], Some(Vec2::new(1.0, 1.0)), WHITE);
        assert_eq!(count, 3);
        assert_eq!(&h.batches.indices()[6..], &[4, 5, 6]);
        assert_eq!(h.positions()[6], Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_shape2d_rejects_bad_indices() {
        let mut h = Harness::new();
        let points = [Vec2::ZERO, Vec2::new(4.0, 0.0)];
        assert_eq!(shape2d(&mut h.sink(), &points, &[0, 1, 2], None, WHITE), 0);
        assert_eq!(shape2d(&mut h.sink(), &[], &[], None, WHITE), 0);
    }

    #[test]
    fn test_shape2d_transformed_rotates() {
        let mut h = Harness::new();
        let points = [Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(2.0, 1.0)];
        let (s, c) = FRAC_PI_2.sin_cos();
        shape2d_transformed(&mut h.sink(), &points, &[0, 1, 2], s, c, Vec2::new(10.0, 0.0), WHITE);
        assert!((h.positions()[0] - Vec2::new(10.0, 1.0)).length() < 1e-5);
    }
}
