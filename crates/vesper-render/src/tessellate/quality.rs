//! Segment counts for curved primitives.
//!
//! All inputs are effective (screen-space) sizes: the logical radius times the
//! max scaling of the active transform. The constants are tuned for visual
//! parity and are kept as-is.

/// Upper bound on segments for any single curve.
pub const MAX_QUALITY: u32 = 255;

/// Segments for a filled circle of radius `size`.
pub fn circle_quality(size: f32) -> u32 {
    if size <= 1.0 {
        3
    } else if size <= 5.0 {
        (size + 3.0) as u32 * 2
    } else {
        (18.0 + (size - 5.0) / 2.2).min(MAX_QUALITY as f32) as u32
    }
}

/// Segments for a circle outline whose outer radius is `size`.
pub fn circle_frame_quality(size: f32) -> u32 {
    if size <= 1.0 {
        6
    } else if size <= 8.0 {
        ((2.0 * size) as u32).max(8)
    } else {
        (16.0 + (size - 8.0) / 2.2).min(MAX_QUALITY as f32) as u32
    }
}

/// Points on a pie or arc spanning `angle` radians. Never fewer than 3.
pub fn circle_pie_quality(size: f32, angle: f32) -> u32 {
    let rate = (angle.abs() / std::f32::consts::TAU * 2.0).min(1.0);
    let quality = if size <= 1.0 {
        4.0
    } else if size <= 6.0 {
        7.0
    } else if size <= 8.0 {
        11.0
    } else {
        (size * 0.225 + 18.0).min(MAX_QUALITY as f32).floor()
    };
    (quality * rate).max(3.0) as u32
}

/// Segments for an ellipse whose larger radius is `major_axis`.
pub fn ellipse_quality(major_axis: f32, scale: f32) -> u32 {
    ((major_axis * scale * 0.225 + 18.0) as u32).clamp(6, MAX_QUALITY)
}

/// Segments for a textured circle of radius `size`.
pub fn textured_circle_quality(size: f32) -> u32 {
    (size * 0.225 + 18.0).min(MAX_QUALITY as f32) as u32
}

/// Points on one quarter-circle corner of a rounded rectangle.
pub fn fan_quality(r: f32) -> u32 {
    if r <= 1.0 {
        3
    } else if r <= 6.0 {
        5
    } else if r <= 12.0 {
        8
    } else {
        (r * 0.2 + 6.0).min(64.0) as u32
    }
}
