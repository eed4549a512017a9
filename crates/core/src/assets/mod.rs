use std::path::PathBuf;

use image::{imageops, imageops::FilterType, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::engine::{ChartEngine, LineHeadTextureData, NoteTextureData, PackHandle};
use crate::{BridgeError, Result};

/// Note texture variants shipped in a resource pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Tap,
    TapDouble,
    ExTap,
    ExTapDouble,
    Hold,
    HoldDouble,
    ExHold,
    ExHoldDouble,
    Drag,
    DragDouble,
    ExDrag,
    ExDragDouble,
}

impl NoteKind {
    pub const ALL: [NoteKind; 12] = [
        NoteKind::Tap,
        NoteKind::TapDouble,
        NoteKind::ExTap,
        NoteKind::ExTapDouble,
        NoteKind::Hold,
        NoteKind::HoldDouble,
        NoteKind::ExHold,
        NoteKind::ExHoldDouble,
        NoteKind::Drag,
        NoteKind::DragDouble,
        NoteKind::ExDrag,
        NoteKind::ExDragDouble,
    ];

    /// Key used by the resource pack for this texture.
    pub fn key(self) -> &'static str {
        match self {
            NoteKind::Tap => "tap",
            NoteKind::TapDouble => "tap_double",
            NoteKind::ExTap => "extap",
            NoteKind::ExTapDouble => "extap_double",
            NoteKind::Hold => "hold",
            NoteKind::HoldDouble => "hold_double",
            NoteKind::ExHold => "exhold",
            NoteKind::ExHoldDouble => "exhold_double",
            NoteKind::Drag => "drag",
            NoteKind::DragDouble => "drag_double",
            NoteKind::ExDrag => "exdrag",
            NoteKind::ExDragDouble => "exdrag_double",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Decoded note texture. Split offsets are in post-resize pixels.
#[derive(Debug, Clone)]
pub struct NoteTexture {
    pub image: RgbaImage,
    pub scale: f64,
    pub head_split: f32,
    pub tail_split: f32,
}

/// Decoded line-head texture. `connect_point` is in post-resize pixels,
/// measured from the image centre.
#[derive(Debug, Clone)]
pub struct LineHeadTexture {
    pub image: RgbaImage,
    pub scale: f64,
    pub connect_point: f32,
}

impl LineHeadTexture {
    /// Connect point as a ratio of half the image height, the unit the
    /// engine lays lines out in.
    pub fn connect_ratio(&self) -> f64 {
        let half = f64::from(self.image.height()) / 2.0;
        if half <= 0.0 {
            return 0.0;
        }
        f64::from(self.connect_point) / half
    }
}

/// Anything that can hand out raw resource-pack textures.
pub trait TextureSource {
    fn note_texture(&mut self, kind: NoteKind) -> Result<Option<NoteTextureData>>;
    fn line_head_texture(&mut self) -> Result<Option<LineHeadTextureData>>;
}

/// A resource pack loaded into a [`ChartEngine`].
#[derive(Debug)]
pub struct EnginePack<'a, E: ChartEngine + ?Sized> {
    pub engine: &'a mut E,
    pub pack: PackHandle,
}

impl<E: ChartEngine + ?Sized> TextureSource for EnginePack<'_, E> {
    fn note_texture(&mut self, kind: NoteKind) -> Result<Option<NoteTextureData>> {
        self.engine.note_texture(self.pack, kind)
    }

    fn line_head_texture(&mut self) -> Result<Option<LineHeadTextureData>> {
        self.engine.line_head_texture(self.pack)
    }
}

/// Every texture the callback table draws from the resource pack. Filled
/// once before the first frame and read-only afterwards.
#[derive(Debug, Clone)]
pub struct TextureCache {
    notes: Vec<NoteTexture>,
    line_head: LineHeadTexture,
}

impl TextureCache {
    pub fn load(source: &mut impl TextureSource, factor: f32) -> Result<Self> {
        let mut notes = Vec::with_capacity(NoteKind::ALL.len());
        for kind in NoteKind::ALL {
            let texture = match source.note_texture(kind)? {
                Some(raw) => NoteTexture {
                    image: build_image(raw.width, raw.height, raw.rgba, factor)?,
                    scale: raw.scale,
                    head_split: raw.head_split as f32 * factor,
                    tail_split: raw.tail_split as f32 * factor,
                },
                None => {
                    tracing::warn!(key = kind.key(), "resource pack has no note texture");
                    NoteTexture {
                        image: placeholder(),
                        scale: 1.0,
                        head_split: 0.0,
                        tail_split: 0.0,
                    }
                }
            };
            tracing::debug!(
                key = kind.key(),
                width = texture.image.width(),
                height = texture.image.height(),
                "cached note texture"
            );
            notes.push(texture);
        }

        let line_head = match source.line_head_texture()? {
            Some(raw) => LineHeadTexture {
                image: build_image(raw.width, raw.height, raw.rgba, factor)?,
                scale: raw.scale,
                connect_point: raw.connect_point as f32 * factor,
            },
            None => {
                tracing::warn!("resource pack has no line head texture");
                LineHeadTexture {
                    image: placeholder(),
                    scale: 1.0,
                    connect_point: 0.0,
                }
            }
        };

        Ok(Self { notes, line_head })
    }

    pub fn note(&self, kind: NoteKind) -> &NoteTexture {
        &self.notes[kind.index()]
    }

    pub fn line_head(&self) -> &LineHeadTexture {
        &self.line_head
    }
}

fn placeholder() -> RgbaImage {
    RgbaImage::new(1, 1)
}

fn build_image(width: u64, height: u64, rgba: Vec<u8>, factor: f32) -> Result<RgbaImage> {
    let width = u32::try_from(width).map_err(|_| BridgeError::decode("texture too wide"))?;
    let height = u32::try_from(height).map_err(|_| BridgeError::decode("texture too tall"))?;
    let image = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        BridgeError::decode(format!("pixel buffer does not fill a {width}x{height} texture"))
    })?;
    Ok(resize(image, factor))
}

fn resize(image: RgbaImage, factor: f32) -> RgbaImage {
    if factor == 1.0 {
        return image;
    }
    let scaled = |dim: u32| ((dim as f32 * factor) as u32).max(1);
    let (width, height) = (scaled(image.width()), scaled(image.height()));
    imageops::resize(&image, width, height, FilterType::Triangle)
}

/// Decodes an encoded picture (PNG, JPEG) and applies the resize factor.
pub fn decode_image(bytes: &[u8], factor: f32) -> Result<RgbaImage> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    Ok(resize(image, factor))
}

/// Texture resolution multiplier for the device class.
pub fn resize_factor(mobile: bool) -> f32 {
    if mobile {
        0.5
    } else {
        1.0
    }
}

/// Heuristic mobile detection from a browser-style user agent string.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    const MARKERS: [&str; 8] = [
        "android",
        "webos",
        "iphone",
        "ipad",
        "ipod",
        "blackberry",
        "iemobile",
        "opera mini",
    ];
    let agent = user_agent.to_ascii_lowercase();
    MARKERS.iter().any(|marker| agent.contains(marker))
}

/// Where the player fetches its encoded inputs from.
pub trait AssetSource {
    fn fetch(&mut self, location: &str) -> Result<Vec<u8>>;
}

/// Reads assets from the filesystem relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsAssets {
    root: PathBuf,
}

impl FsAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for FsAssets {
    fn fetch(&mut self, location: &str) -> Result<Vec<u8>> {
        std::fs::read(self.root.join(location)).map_err(|source| BridgeError::Asset {
            location: location.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    struct MapSource {
        notes: HashMap<NoteKind, NoteTextureData>,
        line_head: Option<LineHeadTextureData>,
    }

    impl TextureSource for MapSource {
        fn note_texture(&mut self, kind: NoteKind) -> Result<Option<NoteTextureData>> {
            Ok(self.notes.get(&kind).cloned())
        }

        fn line_head_texture(&mut self) -> Result<Option<LineHeadTextureData>> {
            Ok(self.line_head.clone())
        }
    }

    fn raw_note(width: u64, height: u64, head_split: u64, tail_split: u64) -> NoteTextureData {
        NoteTextureData {
            scale: 1.0,
            head_split,
            tail_split,
            width,
            height,
            rgba: vec![200; (width * height * 4) as usize],
        }
    }

    #[test]
    fn keys_round_trip() {
        for kind in NoteKind::ALL {
            assert_eq!(NoteKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(NoteKind::from_key("slide"), None);
    }

    #[test]
    fn mobile_factor_halves_images_and_split_offsets() {
        let mut source = MapSource::default();
        source.notes.insert(NoteKind::Hold, raw_note(200, 100, 20, 40));
        source.line_head = Some(LineHeadTextureData {
            scale: 1.0,
            connect_point: 15.0,
            width: 60,
            height: 60,
            rgba: vec![0; 60 * 60 * 4],
        });

        let cache = TextureCache::load(&mut source, resize_factor(true)).unwrap();

        let hold = cache.note(NoteKind::Hold);
        assert_eq!(hold.image.dimensions(), (100, 50));
        assert_eq!(hold.head_split, 10.0);
        assert_eq!(hold.tail_split, 20.0);

        let head = cache.line_head();
        assert_eq!(head.connect_point, 7.5);
        assert_eq!(head.connect_ratio(), 0.5);
    }

    #[test]
    fn missing_textures_become_placeholders() {
        let cache = TextureCache::load(&mut MapSource::default(), 1.0).unwrap();
        assert_eq!(cache.note(NoteKind::Drag).image.dimensions(), (1, 1));
        assert_eq!(cache.line_head().connect_ratio(), 0.0);
    }

    #[test]
    fn short_pixel_buffer_is_a_decode_error() {
        let mut source = MapSource::default();
        let mut raw = raw_note(4, 4, 1, 1);
        raw.rgba.truncate(10);
        source.notes.insert(NoteKind::Tap, raw);

        let err = TextureCache::load(&mut source, 1.0).unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
    }

    #[test]
    fn tiny_images_never_collapse_to_zero() {
        let image = resize(RgbaImage::new(1, 3), 0.5);
        assert_eq!(image.dimensions(), (1, 1));
    }

    #[test]
    fn detects_mobile_agents() {
        assert!(is_mobile_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"
        ));
        assert!(is_mobile_user_agent("Opera/9.80 (J2ME/MIDP; Opera Mini/9.80)"));
        assert!(!is_mobile_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0"
        ));
    }

    #[test]
    fn fs_assets_report_the_failing_location() {
        let mut assets = FsAssets::new(std::env::temp_dir());
        let err = assets.fetch("definitely-missing-asset.bin").unwrap_err();
        assert!(format!("{err}").contains("definitely-missing-asset.bin"));
    }
}
