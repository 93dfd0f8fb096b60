use std::ops::Mul;

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

/// Pixel-aligned rectangle used for scissor and viewport state.
pub type IntRect = Rect<i32>;

/// Floating point rectangle used by shape draws.
pub type FloatRect = Rect<f32>;

impl<T> Rect<T> {
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

impl<T: Copy> Rect<T> {
    pub fn size(&self) -> Size<T> {
        Size::new(self.width, self.height)
    }

    pub fn pos(&self) -> Pos<T> {
        Pos {
            x: self.x,
            y: self.y,
        }
    }
}

impl IntRect {
    pub fn from_size(size: Size<u32>) -> Self {
        Rect::new(
            0,
            0,
            i32::try_from(size.width).unwrap_or(i32::MAX),
            i32::try_from(size.height).unwrap_or(i32::MAX),
        )
    }
}

impl FloatRect {
    pub fn from_points(top_left: Vec2, size: Vec2) -> Self {
        Rect::new(top_left.x, top_left.y, size.x, size.y)
    }

    pub fn top_left(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn top_right(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y)
    }

    pub fn bottom_left(&self) -> Vec2 {
        Vec2::new(self.x, self.y + self.height)
    }

    pub fn bottom_right(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Grows the rectangle by `amount` on every side. Negative values shrink it.
    pub fn stretched(&self, amount: f32) -> Self {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + amount * 2.0,
            self.height + amount * 2.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub const fn new(width: T, height: T) -> Self {
        Size { width, height }
    }

    pub fn cast<U: From<T>>(self) -> Size<U> {
        Size {
            width: U::from(self.width),
            height: U::from(self.height),
        }
    }
}

impl<T: Mul + Copy> Mul<T> for Size<T> {
    type Output = Size<<T as Mul>::Output>;

    fn mul(self, rhs: T) -> Self::Output {
        Size {
            width: self.width * rhs,
            height: self.height * rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pos<T> {
    pub x: T,
    pub y: T,
}

/// Arbitrary convex quadrilateral, corners in clockwise screen order
/// starting at the top left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quad {
    pub p: [Vec2; 4],
}

impl Quad {
    pub const fn new(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2) -> Self {
        Quad {
            p: [p0, p1, p2, p3],
        }
    }
}

impl From<FloatRect> for Quad {
    fn from(rect: FloatRect) -> Self {
        Quad::new(
            rect.top_left(),
            rect.top_right(),
            rect.bottom_right(),
            rect.bottom_left(),
        )
    }
}
