use std::f32::consts::{PI, TAU};

use vesper_core::math::Vec2;

use super::shape::circle_pie;
use super::{GeometrySink, RECT_INDICES, angle_of, is_finite, write_table};
use crate::Color;
use crate::asset::StandardPixelShader;
use crate::vertex::Vertex2D;

/// Joints whose direction similarity `d_prev · d_next` is at least this get a
/// miter. Sharper joints get a round fan on the outer side instead.
pub const MITER_THRESHOLD: f32 = -0.55;

/// How the ends and body of a line are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LineStyle {
    /// Ends extend by half the thickness.
    #[default]
    SquareCap,
    RoundCap,
    NoCap,
    /// Dashes of two thicknesses followed by a gap of one.
    SquareDot { offset: f32 },
    /// Round dots one thickness apart. `aligned` puts a dot on both ends.
    RoundDot { offset: f32, aligned: bool },
}

impl LineStyle {
    /// Built-in pixel shader the geometry of this style must be drawn with.
    pub fn pixel_shader(&self) -> StandardPixelShader {
        match self {
            LineStyle::SquareDot { .. } => StandardPixelShader::SquareDot,
            LineStyle::RoundDot { .. } => StandardPixelShader::RoundDot,
            _ => StandardPixelShader::Shape,
        }
    }

    pub fn is_dotted(&self) -> bool {
        matches!(self, LineStyle::SquareDot { .. } | LineStyle::RoundDot { .. })
    }
}

/// Texture coordinates of a dotted quad: `u` at begin and end, `v` on the
/// positive and negative normal side.
#[derive(Debug, Clone, Copy)]
struct DotCoords {
    u: [f32; 2],
    v: [f32; 2],
}

/// Single segment from `begin` to `end`, shaded from `colors[0]` to `colors[1]`.
///
/// Dotted styles must be drawn through a sink bound to
/// [`LineStyle::pixel_shader`].
pub fn line(
    sink: &mut GeometrySink<'_>,
    style: LineStyle,
    begin: Vec2,
    end: Vec2,
    thickness: f32,
    colors: [Color; 2],
) -> u32 {
    if !(thickness > 0.0) || !thickness.is_finite() || !is_finite(begin) || !is_finite(end) {
        return 0;
    }
    let delta = end - begin;
    let length = delta.length();
    if !(length > 0.0) {
        return 0;
    }

    let dir = delta / length;
    let half = thickness * 0.5;
    let normal = dir.perp() * half;
    let extend = dir * half;

    match style {
        LineStyle::SquareCap => line_quad(sink, [begin - extend, end + extend], normal, colors, None),
        LineStyle::NoCap => line_quad(sink, [begin, end], normal, colors, None),
        LineStyle::RoundCap => {
            let start = angle_of(normal);
            line_quad(sink, [begin, end], normal, colors, None)
                + circle_pie(sink, begin, half, start, PI, colors[0])
                + circle_pie(sink, end, half, start + PI, PI, colors[1])
        }
        LineStyle::SquareDot { offset } => {
            let u = square_dot_origin(offset, thickness);
            let v = square_dot_v(thickness, sink.scale());
            let coords = DotCoords {
                u: [u, u + length / thickness],
                v: [v, v],
            };
            line_quad(sink, [begin - extend, end + extend], normal, colors, Some(coords))
        }
        LineStyle::RoundDot { offset, aligned } => {
            let mut length_n = length / thickness;
            let mut u = round_dot_origin(offset, thickness);
            if aligned {
                length_n = align_round_dots(length_n);
                u = 0.5;
            }
            let coords = DotCoords {
                u: [u, u + length_n],
                v: [1.0, -1.0],
            };
            line_quad(sink, [begin - extend, end + extend], normal, colors, Some(coords))
        }
    }
}

/// Polyline through `points`, optionally closed back to the first point.
///
/// Points closer than a tenth of a screen pixel to their predecessor are
/// merged. Caps only apply to open strings.
pub fn line_string(
    sink: &mut GeometrySink<'_>,
    style: LineStyle,
    points: &[Vec2],
    offset: Option<Vec2>,
    thickness: f32,
    color: Color,
    closed: bool,
) -> u32 {
    if !(thickness > 0.0)
        || !thickness.is_finite()
        || points.len() < 2
        || !points.iter().all(|p| is_finite(*p))
    {
        return 0;
    }

    let scale = sink.scale().max(f32::EPSILON);
    let mut pts = dedup(points, 0.01 / (scale * scale), closed);
    if pts.len() < 2 {
        return 0;
    }
    let closed = closed && pts.len() >= 3;
    if let Some(offset) = offset {
        pts.iter_mut().for_each(|p| *p += offset);
    }

    if style.is_dotted() {
        dotted_string(sink, style, &pts, thickness, color, closed)
    } else {
        solid_string(sink, style, &pts, thickness * 0.5, color, closed)
    }
}

/// Outline of a polygon.
pub fn shape2d_frame(sink: &mut GeometrySink<'_>, points: &[Vec2], thickness: f32, color: Color) -> u32 {
    line_string(sink, LineStyle::SquareCap, points, None, thickness, color, true)
}

fn line_quad(
    sink: &mut GeometrySink<'_>,
    ends: [Vec2; 2],
    normal: Vec2,
    colors: [Color; 2],
    coords: Option<DotCoords>,
) -> u32 {
    sink.emit(4, 6, |a| {
        write_segment(a.vertices, ends, normal, colors, coords);
        write_table(a.indices, a.index_offset, &RECT_INDICES);
    })
}

fn write_segment(
    vertices: &mut [Vertex2D],
    [begin, end]: [Vec2; 2],
    normal: Vec2,
    colors: [Color; 2],
    coords: Option<DotCoords>,
) {
    let corners = [begin + normal, begin - normal, end + normal, end - normal];
    for (i, (v, p)) in vertices.iter_mut().zip(corners).enumerate() {
        let tex = match coords {
            Some(c) => Vec2::new(c.u[i / 2], c.v[i % 2]),
            None => Vec2::ZERO,
        };
        *v = Vertex2D::new(p, tex, colors[i / 2]);
    }
}

fn dedup(points: &[Vec2], min_dist_sq: f32, closed: bool) -> Vec<Vec2> {
    let mut out: Vec<Vec2> = Vec::with_capacity(points.len());
    out.push(points[0]);
    let Some((last, interior)) = points[1..].split_last() else {
        return out;
    };
    for &p in interior {
        if out[out.len() - 1].distance_squared(p) >= min_dist_sq {
            out.push(p);
        }
    }
    if out[out.len() - 1].distance_squared(*last) >= min_dist_sq {
        out.push(*last);
    } else if out.len() > 1 {
        let end = out.len() - 1;
        out[end] = *last;
    }
    if closed && out.len() >= 2 && out[out.len() - 1].distance_squared(out[0]) <= min_dist_sq {
        out.pop();
    }
    out
}

fn solid_string(
    sink: &mut GeometrySink<'_>,
    style: LineStyle,
    pts: &[Vec2],
    half: f32,
    color: Color,
    closed: bool,
) -> u32 {
    let n = pts.len();
    let segments = if closed { n } else { n - 1 };
    let dirs: Vec<Vec2> = (0..segments)
        .map(|k| (pts[(k + 1) % n] - pts[k]).normalize_or_zero())
        .collect();

    // Two vertices per pair. Each point starts its outgoing segment at
    // `joints[k].0` and ends its incoming segment at `joints[k].1`.
    let mut pairs: Vec<[Vec2; 2]> = Vec::with_capacity(n * 2);
    let mut joints: Vec<(u32, u32)> = Vec::with_capacity(n);
    let mut fans: Vec<(Vec2, f32, f32)> = Vec::new();

    for (k, &p) in pts.iter().enumerate() {
        let j = pairs.len() as u32;
        if !closed && (k == 0 || k == n - 1) {
            let d = if k == 0 { dirs[0] } else { dirs[segments - 1] };
            let extend = match (style, k == 0) {
                (LineStyle::SquareCap, true) => -d * half,
                (LineStyle::SquareCap, false) => d * half,
                _ => Vec2::ZERO,
            };
            let normal = d.perp() * half;
            pairs.push([p + extend + normal, p + extend - normal]);
            joints.push((j, j));
            continue;
        }

        let d_prev = dirs[(k + segments - 1) % segments];
        let d_next = dirs[k % segments];
        let n_prev = d_prev.perp();
        let n_next = d_next.perp();

        if d_prev.dot(d_next) >= MITER_THRESHOLD {
            let miter = (d_prev + d_next).normalize_or_zero().perp();
            let length = half / miter.dot(n_prev);
            pairs.push([p + miter * length, p - miter * length]);
            joints.push((j, j));
        } else {
            pairs.push([p + n_prev * half, p - n_prev * half]);
            pairs.push([p + n_next * half, p - n_next * half]);
            joints.push((j + 1, j));
            let outer = if d_prev.perp_dot(d_next) > 0.0 { -1.0 } else { 1.0 };
            let start = angle_of(n_prev * outer);
            let sweep = wrap_angle(angle_of(n_next * outer) - start);
            fans.push((p, start, sweep));
        }
    }

    let vertex_count = pairs.len() as u32 * 2;
    let mut total = sink.emit(vertex_count, segments as u32 * 6, |a| {
        for (dst, pair) in a.vertices.chunks_exact_mut(2).zip(&pairs) {
            dst[0] = Vertex2D::colored(pair[0], color);
            dst[1] = Vertex2D::colored(pair[1], color);
        }
        for (k, quad) in a.indices.chunks_exact_mut(6).enumerate() {
            let s = a.index_offset + joints[k].0 * 2;
            let e = a.index_offset + joints[(k + 1) % n].1 * 2;
            quad.copy_from_slice(&[s, s + 1, e, e, s + 1, e + 1]);
        }
    });

    for (center, start, sweep) in fans {
        total += circle_pie(sink, center, half, start, sweep, color);
    }

    if style == LineStyle::RoundCap && !closed {
        let first = dirs[0].perp();
        let last = dirs[segments - 1].perp();
        total += circle_pie(sink, pts[0], half, angle_of(first), PI, color);
        total += circle_pie(sink, pts[n - 1], half, angle_of(-last), PI, color);
    }
    total
}

fn dotted_string(
    sink: &mut GeometrySink<'_>,
    style: LineStyle,
    pts: &[Vec2],
    thickness: f32,
    color: Color,
    closed: bool,
) -> u32 {
    let n = pts.len();
    let segments = if closed { n } else { n - 1 };
    let half = thickness * 0.5;

    let mut quads = Vec::with_capacity(segments);
    let mut cursor = match style {
        LineStyle::SquareDot { offset } => square_dot_origin(offset, thickness),
        LineStyle::RoundDot { aligned: true, .. } => 0.5,
        LineStyle::RoundDot { offset, .. } => round_dot_origin(offset, thickness),
        _ => 0.0,
    };
    let v = match style {
        LineStyle::SquareDot { .. } => {
            let v = square_dot_v(thickness, sink.scale());
            [v, v]
        }
        _ => [1.0, -1.0],
    };

    for k in 0..segments {
        let (p0, p1) = (pts[k], pts[(k + 1) % n]);
        let delta = p1 - p0;
        let length = delta.length();
        let dir = delta / length;
        let mut length_n = length / thickness;
        if let LineStyle::RoundDot { aligned: true, .. } = style {
            length_n = align_round_dots(length_n);
        }
        let coords = DotCoords {
            u: [cursor, cursor + length_n],
            v,
        };
        cursor += length_n;
        quads.push(([p0 - dir * half, p1 + dir * half], dir.perp() * half, coords));
    }

    let count = segments as u32;
    sink.emit(count * 4, count * 6, |a| {
        for (dst, (ends, normal, coords)) in a.vertices.chunks_exact_mut(4).zip(&quads) {
            write_segment(dst, *ends, *normal, [color; 2], Some(*coords));
        }
        for (k, quad) in a.indices.chunks_exact_mut(6).enumerate() {
            write_table(quad, a.index_offset + k as u32 * 4, &RECT_INDICES);
        }
    })
}

/// Starting `u` of a square-dot pattern (period 3) shifted by `offset` pixels.
fn square_dot_origin(offset: f32, thickness: f32) -> f32 {
    (1.0 - fraction(offset / 3.0 / thickness)) * 3.0
}

/// Starting `u` of a round-dot pattern (period 2) shifted by `offset` pixels.
fn round_dot_origin(offset: f32, thickness: f32) -> f32 {
    (1.0 - fraction(offset / 2.0 / thickness)) * 2.0
}

/// Edge softness for square dots, in thickness units.
fn square_dot_v(thickness: f32, scale: f32) -> f32 {
    (1.0 / (thickness * scale)).min(1.0)
}

/// Stretches a normalized length so the pattern ends on a full dot.
fn align_round_dots(length_n: f32) -> f32 {
    length_n + 2.0 - (length_n - 1.0) % 2.0
}

fn fraction(x: f32) -> f32 {
    x - x.floor()
}

/// Wraps into `(-PI, PI]`.
fn wrap_angle(angle: f32) -> f32 {
    let a = angle % TAU;
    if a > PI {
        a - TAU
    } else if a <= -PI {
        a + TAU
    } else {
        a
    }
}
