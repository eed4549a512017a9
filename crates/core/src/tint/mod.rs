use image::{Rgba, RgbaImage};

/// Produces tinted copies of cached images in a single reused buffer.
///
/// The result borrows the tinter, so a tinted image has to be drawn before
/// the next tint is requested.
#[derive(Debug)]
pub struct Tinter {
    scratch: RgbaImage,
    epsilon: f32,
}

impl Default for Tinter {
    fn default() -> Self {
        Self::new(1e-4)
    }
}

impl Tinter {
    pub fn new(epsilon: f32) -> Self {
        Self {
            scratch: RgbaImage::new(0, 0),
            epsilon,
        }
    }

    /// Whether `rgb` is close enough to white to leave images untouched.
    pub fn is_identity(&self, rgb: [f32; 3]) -> bool {
        rgb.iter().map(|c| (c - 1.0).abs()).sum::<f32>() < self.epsilon
    }

    /// Multiplies `source` by `rgb`, keeping the source alpha.
    ///
    /// Equivalent to filling the scratch buffer with `rgb`, multiply-blending
    /// the source over it and then masking by the source alpha.
    pub fn apply<'a>(&'a mut self, source: &'a RgbaImage, rgb: [f32; 3]) -> &'a RgbaImage {
        if self.is_identity(rgb) {
            return source;
        }

        let (width, height) = source.dimensions();
        if self.scratch.dimensions() != (width, height) {
            self.scratch = RgbaImage::new(width, height);
        }

        for (dst, src) in self.scratch.pixels_mut().zip(source.pixels()) {
            let [r, g, b, a] = src.0;
            let alpha = a as f32 / 255.0;
            let channel = |s: u8, tint: f32| {
                let s = s as f32 / 255.0;
                let tint = tint.clamp(0.0, 1.0);
                (tint * (1.0 - alpha + alpha * s) * 255.0).round() as u8
            };
            *dst = Rgba([channel(r, rgb[0]), channel(g, rgb[1]), channel(b, rgb[2]), a]);
        }

        &self.scratch
    }
}
