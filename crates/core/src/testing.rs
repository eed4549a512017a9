//! Fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;

use glam::{Affine2, Vec2};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::assets::{AssetSource, EnginePack, NoteKind, TextureCache};
use crate::audio::{AudioBackend, AudioClip, VoiceId};
use crate::engine::{
    ChartEngine, EngineLoader, InputEvent, LineHeadTextureData, NoteTextureData, PackHandle,
};
use crate::paint::{Color, Paint};
use crate::render::{RenderCallbacks, RenderResources};
use crate::surface::{Rect, Surface, TextAlign, TextStyle};
use crate::{BridgeError, Result};

/// Audio backend with a hand-driven clock. Decoded clips last one second
/// per input byte.
#[derive(Debug, Default)]
pub struct ManualAudio {
    pub clock: f64,
    pub played: Vec<(VoiceId, f64)>,
    pub stopped: Vec<VoiceId>,
    pub finished: HashSet<VoiceId>,
    pub effects: usize,
    pub reject_decode: bool,
}

impl ManualAudio {
    /// Lets every voice started so far run out.
    pub fn finish_all(&mut self) {
        let voices: Vec<_> = self.played.iter().map(|(voice, _)| *voice).collect();
        self.finished.extend(voices);
    }
}

impl AudioBackend for ManualAudio {
    fn now(&self) -> f64 {
        self.clock
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<AudioClip> {
        if self.reject_decode {
            return Err(BridgeError::decode("unsupported audio"));
        }
        Ok(AudioClip {
            duration: bytes.len() as f64,
            data: Arc::from(bytes),
        })
    }

    fn play(&mut self, _clip: &AudioClip, offset: f64) -> VoiceId {
        let voice = VoiceId(self.played.len() as u64);
        self.played.push((voice, offset));
        voice
    }

    fn stop(&mut self, voice: VoiceId) {
        self.stopped.push(voice);
        self.finished.insert(voice);
    }

    fn is_finished(&self, voice: VoiceId) -> bool {
        self.finished.contains(&voice)
    }

    fn play_effect(&mut self, _clip: &AudioClip) {
        self.effects += 1;
    }
}

type InitScript = Box<dyn FnMut(&mut dyn RenderCallbacks)>;
type RenderScript = Box<dyn FnMut(f64, &mut dyn RenderCallbacks)>;

/// In-process engine serving a small fixed resource pack and running
/// optional scripts against the callbacks it is lent.
#[derive(Default)]
pub struct ScriptedEngine {
    pub calls: Vec<&'static str>,
    pub inputs: Vec<InputEvent>,
    pub rendered: Vec<f64>,
    pub autoplay: Option<bool>,
    pub chart: Option<Vec<u8>>,
    pub on_init: Option<InitScript>,
    pub on_render: Option<RenderScript>,
    pub reject_chart: bool,
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("calls", &self.calls)
            .field("rendered", &self.rendered)
            .finish_non_exhaustive()
    }
}

impl ChartEngine for ScriptedEngine {
    fn load_resource_pack(&mut self, bytes: &[u8]) -> Result<PackHandle> {
        self.calls.push("load_resource_pack");
        if bytes.is_empty() {
            return Err(BridgeError::Engine("empty resource pack".into()));
        }
        Ok(PackHandle(1))
    }

    fn note_texture(&mut self, _pack: PackHandle, _kind: NoteKind) -> Result<Option<NoteTextureData>> {
        Ok(Some(NoteTextureData {
            scale: 1.5,
            head_split: 2,
            tail_split: 2,
            width: 8,
            height: 4,
            rgba: vec![255; 8 * 4 * 4],
        }))
    }

    fn line_head_texture(&mut self, _pack: PackHandle) -> Result<Option<LineHeadTextureData>> {
        Ok(Some(LineHeadTextureData {
            scale: 2.0,
            connect_point: 1.0,
            width: 4,
            height: 4,
            rgba: vec![255; 4 * 4 * 4],
        }))
    }

    fn hitsound(&mut self, _pack: PackHandle, kind: NoteKind) -> Result<Option<Vec<u8>>> {
        Ok((kind == NoteKind::Tap).then(|| vec![0; 2]))
    }

    fn init(&mut self, callbacks: &mut dyn RenderCallbacks) -> Result<()> {
        self.calls.push("init");
        if let Some(script) = self.on_init.as_mut() {
            script(callbacks);
        }
        Ok(())
    }

    fn load_chart(&mut self, bytes: &[u8]) -> Result<()> {
        self.calls.push("load_chart");
        if self.reject_chart {
            return Err(BridgeError::Engine("chart rejected".into()));
        }
        self.chart = Some(bytes.to_vec());
        Ok(())
    }

    fn set_autoplay(&mut self, enabled: bool) {
        self.calls.push("set_autoplay");
        self.autoplay = Some(enabled);
    }

    fn render(&mut self, chart_time: f64, callbacks: &mut dyn RenderCallbacks) {
        self.rendered.push(chart_time);
        if let Some(script) = self.on_render.as_mut() {
            script(chart_time, callbacks);
        }
    }

    fn input(&mut self, event: InputEvent) {
        self.inputs.push(event);
    }
}

/// Hands out a prepared engine once.
#[derive(Debug, Default)]
pub struct ScriptedLoader {
    pub engine: Option<ScriptedEngine>,
    pub locations: Vec<String>,
}

impl ScriptedLoader {
    pub fn new(engine: ScriptedEngine) -> Self {
        Self {
            engine: Some(engine),
            locations: Vec::new(),
        }
    }
}

impl EngineLoader for ScriptedLoader {
    type Engine = ScriptedEngine;

    fn load(&mut self, location: &str) -> Result<ScriptedEngine> {
        self.locations.push(location.to_string());
        self.engine
            .take()
            .ok_or_else(|| BridgeError::Engine(format!("no engine at {location}")))
    }
}

/// In-memory asset source.
#[derive(Debug, Default)]
pub struct MapAssets {
    pub files: HashMap<String, Vec<u8>>,
    pub fetched: Vec<String>,
}

impl MapAssets {
    pub fn with(mut self, location: &str, bytes: Vec<u8>) -> Self {
        self.files.insert(location.to_string(), bytes);
        self
    }
}

impl AssetSource for MapAssets {
    fn fetch(&mut self, location: &str) -> Result<Vec<u8>> {
        self.fetched.push(location.to_string());
        self.files.get(location).cloned().ok_or_else(|| BridgeError::Asset {
            location: location.to_string(),
            source: std::io::ErrorKind::NotFound.into(),
        })
    }
}

/// Surface that only records which primitives were called.
#[derive(Debug)]
pub struct RecordingSurface {
    pub size: (u32, u32),
    pub supports_2d: bool,
    pub ops: Vec<&'static str>,
    pub texts: Vec<(String, String, TextAlign)>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            supports_2d: true,
            ops: Vec::new(),
            texts: Vec::new(),
        }
    }
}

impl Surface for RecordingSurface {
    fn supports_2d(&self) -> bool {
        self.supports_2d
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self) {
        self.ops.push("clear");
    }

    fn draw_image(&mut self, _image: &RgbaImage, _transform: Affine2, _dest: Rect, _alpha: f32) {
        self.ops.push("draw_image");
    }

    fn fill_rect(&mut self, _transform: Affine2, _rect: Rect, _paint: &Paint) {
        self.ops.push("fill_rect");
    }

    fn stroke_line(&mut self, _from: Vec2, _to: Vec2, _width: f32, _color: Color) {
        self.ops.push("stroke_line");
    }

    fn fill_ellipse(&mut self, _transform: Affine2, _radii: Vec2, _color: Color) {
        self.ops.push("fill_ellipse");
    }

    fn fill_text(&mut self, _transform: Affine2, text: &str, style: &TextStyle<'_>) {
        self.ops.push("fill_text");
        self.texts
            .push((text.to_string(), style.family.to_string(), style.align));
    }
}

/// Render resources over the scripted engine's pack, with a storyboard
/// loader that only knows `bg.png` (3x2).
pub fn test_resources() -> RenderResources {
    let mut engine = ScriptedEngine::default();
    let textures = TextureCache::load(
        &mut EnginePack {
            engine: &mut engine,
            pack: PackHandle(1),
        },
        1.0,
    )
    .expect("scripted pack loads");
    RenderResources::new(
        textures,
        "Test Sans",
        Box::new(|key: &str| (key == "bg.png").then(|| RgbaImage::new(3, 2))),
    )
}

pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_pixel(width, height, Rgba(rgba))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png encodes");
    bytes
}
