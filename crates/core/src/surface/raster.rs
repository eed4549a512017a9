use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use fontdue::{Font, FontSettings};
use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};
use vello_cpu::kurbo::{self, Shape};
use vello_cpu::peniko::color::PremulRgba8;
use vello_cpu::peniko::{ImageQuality, ImageSampler};
use vello_cpu::{Pixmap, RenderContext};

use super::{Rect, Surface, TextAlign, TextBaseline, TextStyle};
use crate::paint::{Color, Paint};
use crate::{BridgeError, Result};

/// CPU implementation of [`Surface`] rendered with `vello_cpu`.
///
/// Draw calls are recorded into a render context and composited onto the
/// canvas the next time pixels are read, so a whole frame is rasterised in
/// one pass.
pub struct RasterSurface {
    ctx: RenderContext,
    canvas: Pixmap,
    pixels: RgbaImage,
    pending: bool,
    fonts: HashMap<String, Font>,
    smoothing: bool,
}

impl RasterSurface {
    /// Both dimensions must lie in `1..=65535`.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let (w, h) = (pixmap_dim(width)?, pixmap_dim(height)?);
        Ok(Self {
            ctx: RenderContext::new(w, h),
            canvas: Pixmap::new(w, h),
            pixels: RgbaImage::new(width, height),
            pending: false,
            fonts: HashMap::new(),
            smoothing: true,
        })
    }

    /// Registers a font under a family name used by [`TextStyle::family`].
    pub fn register_font(&mut self, family: impl Into<String>, bytes: &[u8]) -> Result<()> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|err| BridgeError::decode(format!("font: {err}")))?;
        self.fonts.insert(family.into(), font);
        Ok(())
    }

    /// Straight-alpha pixels with every recorded draw applied.
    pub fn pixels(&mut self) -> &RgbaImage {
        self.present();
        &self.pixels
    }

    pub fn into_pixels(mut self) -> RgbaImage {
        self.present();
        self.pixels
    }

    fn present(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;

        let mut layer = Pixmap::new(self.canvas.width(), self.canvas.height());
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut layer);
        self.ctx.reset();

        premul_over_in_place(self.canvas.data_as_u8_slice_mut(), layer.data_as_u8_slice());
        for (dst, src) in self
            .pixels
            .pixels_mut()
            .zip(self.canvas.data_as_u8_slice().chunks_exact(4))
        {
            *dst = Rgba(unpremultiply([src[0], src[1], src[2], src[3]]));
        }
    }

    fn sampler(&self) -> ImageSampler {
        let quality = if self.smoothing {
            ImageQuality::Medium
        } else {
            ImageQuality::Low
        };
        ImageSampler::default().with_quality(quality)
    }

    fn begin(&mut self, transform: Affine2) {
        self.pending = true;
        self.ctx.set_transform(affine_to_cpu(transform));
        self.ctx.set_paint_transform(kurbo::Affine::IDENTITY);
    }

    /// Stretches `pixmap` over `dest` in local space.
    fn fill_with_pixmap(&mut self, pixmap: Pixmap, transform: Affine2, dest: Rect, alpha: f32) {
        let (iw, ih) = (pixmap.width() as f32, pixmap.height() as f32);
        let placed = transform
            * Affine2::from_translation(Vec2::new(dest.x, dest.y))
            * Affine2::from_scale(Vec2::new(dest.w / iw, dest.h / ih));

        self.begin(placed);
        let sampler = self.sampler();
        self.ctx.set_paint(vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler,
        });
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha < 1.0 {
            self.ctx.push_opacity_layer(alpha);
        }
        self.ctx
            .fill_rect(&kurbo::Rect::new(0.0, 0.0, f64::from(iw), f64::from(ih)));
        if alpha < 1.0 {
            self.ctx.pop_layer();
        }
    }

    fn fill_solid_path(&mut self, transform: Affine2, path: &kurbo::BezPath, color: Color) {
        self.begin(transform);
        self.ctx.set_paint(solid(color));
        self.ctx.fill_path(path);
    }
}

impl fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterSurface")
            .field("size", &self.pixels.dimensions())
            .field("fonts", &self.fonts.keys().collect::<Vec<_>>())
            .field("smoothing", &self.smoothing)
            .field("pending", &self.pending)
            .finish()
    }
}

impl Surface for RasterSurface {
    /// Bilinear sampling when enabled, nearest neighbour otherwise.
    fn set_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
    }

    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn clear(&mut self) {
        self.ctx.reset();
        self.pending = false;
        self.canvas.data_as_u8_slice_mut().fill(0);
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, transform: Affine2, dest: Rect, alpha: f32) {
        if alpha <= 0.0 || dest.is_empty() {
            return;
        }
        let Some(pixmap) = pixmap_from_straight(image) else {
            return;
        };
        self.fill_with_pixmap(pixmap, transform, dest, alpha);
    }

    fn fill_rect(&mut self, transform: Affine2, rect: Rect, paint: &Paint) {
        if rect.is_empty() {
            return;
        }
        match paint {
            Paint::Solid(color) => {
                self.begin(transform);
                self.ctx.set_paint(solid(*color));
                self.ctx.fill_rect(&kurbo::Rect::new(
                    f64::from(rect.x),
                    f64::from(rect.y),
                    f64::from(rect.x + rect.w),
                    f64::from(rect.y + rect.h),
                ));
            }
            Paint::LinearGradient(_) => {
                // Baked at one texel per local unit, then stretched like an image.
                let (iw, ih) = (texels(rect.w), texels(rect.h));
                let step = Vec2::new(rect.w / iw as f32, rect.h / ih as f32);
                let baked = RgbaImage::from_fn(iw, ih, |x, y| {
                    let local = Vec2::new(rect.x, rect.y)
                        + (Vec2::new(x as f32, y as f32) + Vec2::splat(0.5)) * step;
                    Rgba(paint.color_at(local).to_rgba8())
                });
                if let Some(pixmap) = pixmap_from_straight(&baked) {
                    self.fill_with_pixmap(pixmap, transform, rect, 1.0);
                }
            }
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        let axis = to - from;
        if axis.length() <= f32::EPSILON || width <= 0.0 {
            return;
        }
        let normal = axis.perp().normalize() * (width / 2.0);
        let mut path = kurbo::BezPath::new();
        path.move_to(point(from + normal));
        path.line_to(point(to + normal));
        path.line_to(point(to - normal));
        path.line_to(point(from - normal));
        path.close_path();
        self.fill_solid_path(Affine2::IDENTITY, &path, color);
    }

    fn fill_ellipse(&mut self, transform: Affine2, radii: Vec2, color: Color) {
        if radii.x <= 0.0 || radii.y <= 0.0 {
            return;
        }
        let ellipse = kurbo::Ellipse::new(
            (0.0, 0.0),
            (f64::from(radii.x), f64::from(radii.y)),
            0.0,
        );
        self.fill_solid_path(transform, &ellipse.to_path(0.1), color);
    }

    fn fill_text(&mut self, transform: Affine2, text: &str, style: &TextStyle<'_>) {
        let Some(font) = self.fonts.get(style.family) else {
            tracing::debug!(family = style.family, "no font registered, skipping text");
            return;
        };
        let px = style.size;
        if px <= 0.0 || text.is_empty() {
            return;
        }

        let glyphs: Vec<_> = text.chars().map(|ch| font.rasterize(ch, px)).collect();
        let advance: f32 = glyphs.iter().map(|(metrics, _)| metrics.advance_width).sum();
        let (ascent, descent) = font
            .horizontal_line_metrics(px)
            .map(|line| (line.ascent, line.descent))
            .unwrap_or((px * 0.8, -px * 0.2));

        let start_x = match style.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => -advance / 2.0,
            TextAlign::Right => -advance,
        };
        let baseline = match style.baseline {
            TextBaseline::Top => ascent,
            TextBaseline::Middle => (ascent + descent) / 2.0,
            TextBaseline::Bottom => descent,
        };
        // Double strike stands in for a bold face.
        let strikes = if style.bold { 2 } else { 1 };

        let color = style.color;
        let [r, g, b, _] = color.to_rgba8();
        let mut pen = start_x;
        for (metrics, coverage) in glyphs {
            let (gw, gh) = (metrics.width as u32, metrics.height as u32);
            let origin = Vec2::new(
                pen + metrics.xmin as f32,
                baseline - (metrics.height as i32 + metrics.ymin) as f32,
            );
            pen += metrics.advance_width;
            if gw == 0 || gh == 0 {
                continue;
            }

            let glyph = RgbaImage::from_fn(gw, gh, |x, y| {
                let cover = coverage[(y * gw + x) as usize] as f32 / 255.0;
                Rgba([r, g, b, (color.a * cover * 255.0).round() as u8])
            });
            for dx in [0.0, px / 24.0].into_iter().take(strikes) {
                if let Some(pixmap) = pixmap_from_straight(&glyph) {
                    let dest = Rect::new(origin.x + dx, origin.y, gw as f32, gh as f32);
                    self.fill_with_pixmap(pixmap, transform, dest, 1.0);
                }
            }
        }
    }
}

fn pixmap_dim(value: u32) -> Result<u16> {
    u16::try_from(value)
        .ok()
        .filter(|&dim| dim > 0)
        .ok_or(BridgeError::InvalidInput("surface dimensions must lie in 1..=65535"))
}

/// Texel count for baking `extent` local units.
fn texels(extent: f32) -> u32 {
    extent.ceil().clamp(1.0, f32::from(u16::MAX)) as u32
}

fn affine_to_cpu(transform: Affine2) -> kurbo::Affine {
    let m = transform.matrix2;
    let t = transform.translation;
    kurbo::Affine::new([m.x_axis.x, m.x_axis.y, m.y_axis.x, m.y_axis.y, t.x, t.y].map(f64::from))
}

fn point(p: Vec2) -> kurbo::Point {
    kurbo::Point::new(f64::from(p.x), f64::from(p.y))
}

fn solid(color: Color) -> vello_cpu::peniko::Color {
    let [r, g, b, a] = color.to_rgba8();
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

/// `None` for empty images and images too large for a pixmap.
fn pixmap_from_straight(image: &RgbaImage) -> Option<Pixmap> {
    let w = u16::try_from(image.width()).ok().filter(|&w| w > 0)?;
    let h = u16::try_from(image.height()).ok().filter(|&h| h > 0)?;
    let pixels = image
        .pixels()
        .map(|pixel| PremulRgba8::from_u8_array(premultiply(pixel.0)))
        .collect();
    Some(Pixmap::from_parts(pixels, w, h))
}

fn premultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let a16 = u16::from(a);
    let scale = |c: u8| ((u16::from(c) * a16 + 127) / 255) as u8;
    [scale(r), scale(g), scale(b), a]
}

fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    if a == 0 {
        return [0; 4];
    }
    let a16 = u16::from(a);
    let scale = |c: u8| ((u16::from(c) * 255 + a16 / 2) / a16).min(255) as u8;
    [scale(r), scale(g), scale(b), a]
}

fn premul_over_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255 - sa;
        for c in 0..4 {
            let kept = ((u16::from(d[c]) * inv + 127) / 255) as u8;
            d[c] = s[c].saturating_add(kept);
        }
    }
}
