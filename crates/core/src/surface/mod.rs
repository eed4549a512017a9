//! Host 2D drawing capability used by the callback table.

mod raster;

use glam::{Affine2, Vec2};
use image::RgbaImage;

use crate::paint::{Color, Paint};

pub use raster::RasterSurface;

/// Axis aligned rectangle in local (pre-transform) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle of the given size centred on the origin.
    pub fn centered(w: f32, h: f32) -> Self {
        Self::new(-w / 2.0, -h / 2.0, w, h)
    }

    pub fn is_empty(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.w
            && point.y < self.y + self.h
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.x, self.y),
            Vec2::new(self.x + self.w, self.y),
            Vec2::new(self.x, self.y + self.h),
            Vec2::new(self.x + self.w, self.y + self.h),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    /// Maps the engine's alignment code; unknown codes fall back to left.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Center,
            2 => Self::Right,
            _ => Self::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    #[default]
    Top,
    Middle,
    Bottom,
}

impl TextBaseline {
    /// Maps the engine's baseline code; unknown codes fall back to top.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Middle,
            2 => Self::Bottom,
            _ => Self::Top,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle<'a> {
    pub family: &'a str,
    pub size: f32,
    pub bold: bool,
    pub align: TextAlign,
    pub baseline: TextBaseline,
    pub color: Color,
}

/// A raster target the engine's primitives are drawn onto.
///
/// Transforms map local coordinates to surface pixels. Gradient paints are
/// evaluated in local coordinates, matching the shape being filled.
pub trait Surface {
    /// Whether the surface accepts 2D drawing at all.
    fn supports_2d(&self) -> bool {
        true
    }

    /// Switches between filtered and nearest-neighbour image sampling.
    fn set_smoothing(&mut self, _enabled: bool) {}

    fn size(&self) -> (u32, u32);

    fn clear(&mut self);

    /// Draws `image` stretched over `dest`. Zero-sized images are ignored.
    fn draw_image(&mut self, image: &RgbaImage, transform: Affine2, dest: Rect, alpha: f32);

    fn fill_rect(&mut self, transform: Affine2, rect: Rect, paint: &Paint);

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color);

    /// Fills an ellipse centred on the local origin.
    fn fill_ellipse(&mut self, transform: Affine2, radii: Vec2, color: Color);

    fn fill_text(&mut self, transform: Affine2, text: &str, style: &TextStyle<'_>);
}

/// Rotation by `degrees` about the point `(x, y)`, which becomes the local
/// origin.
pub fn anchored(x: f32, y: f32, degrees: f32) -> Affine2 {
    Affine2::from_translation(Vec2::new(x, y)) * Affine2::from_angle(degrees.to_radians())
}
