use image::{imageops, imageops::FilterType, RgbaImage};

use crate::assets::NoteTexture;

/// Destination lengths of a hold, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HoldSpans {
    pub head: u32,
    pub body: u32,
    pub tail: u32,
    pub height: u32,
}

impl HoldSpans {
    /// Truncates the engine's lengths to pixels; negative lengths become 0.
    pub fn from_lengths(head: f64, body: f64, tail: f64, height: f64) -> Self {
        let px = |v: f64| if v.is_finite() && v > 0.0 { v as u32 } else { 0 };
        Self {
            head: px(head),
            body: px(body),
            tail: px(tail),
            height: px(height),
        }
    }

    pub fn width(&self) -> u32 {
        self.head.saturating_add(self.body).saturating_add(self.tail)
    }
}

/// Three-slice compositor for hold notes.
///
/// Hold length is unbounded while the texture is fixed, so the head cap,
/// stretchable body and tail cap are each stretched into a reused scratch
/// buffer sized to the hold.
#[derive(Debug)]
pub struct HoldCompositor {
    scratch: RgbaImage,
}

impl Default for HoldCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldCompositor {
    pub fn new() -> Self {
        Self {
            scratch: RgbaImage::new(0, 0),
        }
    }

    pub fn compose(&mut self, texture: &NoteTexture, spans: HoldSpans) -> &RgbaImage {
        let (width, height) = (spans.width(), spans.height);
        if self.scratch.dimensions() == (width, height) {
            for pixel in self.scratch.pixels_mut() {
                pixel.0 = [0; 4];
            }
        } else {
            self.scratch = RgbaImage::new(width, height);
        }

        for (src_start, src_end, dst_x, dst_width) in slices(texture, spans) {
            self.stretch(texture, src_start, src_end, dst_x, dst_width);
        }

        &self.scratch
    }

    fn stretch(&mut self, texture: &NoteTexture, src_start: u32, src_end: u32, dst_x: u32, dst_width: u32) {
        let height = self.scratch.height();
        let src_width = src_end.saturating_sub(src_start);
        if src_width == 0 || dst_width == 0 || height == 0 {
            return;
        }
        let slice =
            imageops::crop_imm(&texture.image, src_start, 0, src_width, texture.image.height()).to_image();
        let stretched = imageops::resize(&slice, dst_width, height, FilterType::Triangle);
        imageops::replace(&mut self.scratch, &stretched, i64::from(dst_x), 0);
    }
}

/// `(src_start, src_end, dst_x, dst_width)` for the head, body and tail.
fn slices(texture: &NoteTexture, spans: HoldSpans) -> [(u32, u32, u32, u32); 3] {
    let src_width = texture.image.width();
    let head_split = split(texture.head_split, src_width);
    let tail_start = src_width.saturating_sub(split(texture.tail_split, src_width));
    [
        (0, head_split, 0, spans.head),
        (head_split, tail_start, spans.head, spans.body),
        (tail_start, src_width, spans.head.saturating_add(spans.body), spans.tail),
    ]
}

fn split(offset: f32, width: u32) -> u32 {
    (offset.max(0.0).round() as u32).min(width)
}
