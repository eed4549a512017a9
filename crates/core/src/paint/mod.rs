//! Colors and fills shared by the surface and the callback table.

use serde::{Deserialize, Serialize};

/// Color packed by the engine as `0xRRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackedColor(pub u32);

impl PackedColor {
    pub const WHITE: Self = Self(0xffff_ffff);

    pub fn unpack(self) -> Color {
        let channel = |shift: u32| ((self.0 >> shift) & 0xff) as f32 / 255.0;
        Color {
            r: channel(24),
            g: channel(16),
            b: channel(8),
            a: channel(0),
        }
    }
}

impl From<u32> for PackedColor {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Straight-alpha color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a + (b - a) * t;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

/// Position along a gradient axis paired with the color at that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// Linear gradient between two points given in surface space.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub start: glam::Vec2,
    pub end: glam::Vec2,
    pub stops: Vec<ColorStop>,
}

impl LinearGradient {
    pub fn new(start: glam::Vec2, end: glam::Vec2) -> Self {
        Self {
            start,
            end,
            stops: Vec::new(),
        }
    }

    /// Builds `count` evenly spaced stops of `base` whose alpha follows
    /// `offset^2.2`, fading in along the axis.
    pub fn gamma_ramp(start: glam::Vec2, end: glam::Vec2, base: Color, count: usize) -> Self {
        let mut gradient = Self::new(start, end);
        let last = count.saturating_sub(1).max(1) as f32;
        for i in 0..count {
            let offset = i as f32 / last;
            gradient.add_stop(offset, base.with_alpha(offset.powf(2.2)));
        }
        gradient
    }

    pub fn add_stop(&mut self, offset: f32, color: Color) {
        self.stops.push(ColorStop {
            offset: offset.clamp(0.0, 1.0),
            color,
        });
    }

    /// Color at a point in surface space. Points before the first stop or
    /// after the last one take the edge color.
    pub fn sample(&self, point: glam::Vec2) -> Color {
        let (Some(first), Some(last)) = (self.stops.first(), self.stops.last()) else {
            return Color::TRANSPARENT;
        };

        let axis = self.end - self.start;
        let len_sq = axis.length_squared();
        let t = if len_sq <= f32::EPSILON {
            0.0
        } else {
            (point - self.start).dot(axis) / len_sq
        };

        if t <= first.offset {
            return first.color;
        }
        if t >= last.offset {
            return last.color;
        }

        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.offset {
                let span = b.offset - a.offset;
                let local = if span <= f32::EPSILON {
                    1.0
                } else {
                    (t - a.offset) / span
                };
                return a.color.lerp(b.color, local);
            }
        }

        last.color
    }
}

/// Fill style accepted by [`crate::Surface::fill_rect`].
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    LinearGradient(LinearGradient),
}

impl Paint {
    pub fn color_at(&self, point: glam::Vec2) -> Color {
        match self {
            Paint::Solid(color) => *color,
            Paint::LinearGradient(gradient) => gradient.sample(point),
        }
    }
}
