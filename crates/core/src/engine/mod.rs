//! Typed boundary to the chart playback engine.
//!
//! The engine owns chart parsing, judgement and timing. The bridge only
//! hands it bytes, forwards input, and lends it a [`RenderCallbacks`]
//! implementation for the duration of a single call.

use glam::Vec2;

use crate::assets::NoteKind;
use crate::render::RenderCallbacks;
use crate::Result;

/// Opaque handle to a resource pack loaded inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackHandle(pub u64);

/// Raw note texture as extracted from a resource pack.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteTextureData {
    pub scale: f64,
    pub head_split: u64,
    pub tail_split: u64,
    pub width: u64,
    pub height: u64,
    pub rgba: Vec<u8>,
}

/// Raw line-head texture as extracted from a resource pack.
#[derive(Debug, Clone, PartialEq)]
pub struct LineHeadTextureData {
    pub scale: f64,
    pub connect_point: f64,
    pub width: u64,
    pub height: u64,
    pub rgba: Vec<u8>,
}

/// Input device identifier, namespaced by source so keyboard codes, mouse
/// buttons and touch identifiers never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

impl DeviceId {
    pub const KEYBOARD_BASE: u64 = 1000;
    pub const MOUSE_BASE: u64 = 2000;

    pub fn keyboard(code: u32) -> Self {
        Self(Self::KEYBOARD_BASE + u64::from(code))
    }

    pub fn mouse(button: u16) -> Self {
        Self(Self::MOUSE_BASE + u64::from(button))
    }

    pub fn touch(identifier: u64) -> Self {
        Self(identifier)
    }
}

/// Timestamped judgement input forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown { time: f64, device: DeviceId },
    KeyUp { time: f64, device: DeviceId },
    TouchStart { time: f64, device: DeviceId, position: Vec2 },
    TouchMove { time: f64, device: DeviceId, position: Vec2 },
    TouchEnd { time: f64, device: DeviceId },
}

impl InputEvent {
    pub fn time(&self) -> f64 {
        match *self {
            InputEvent::KeyDown { time, .. }
            | InputEvent::KeyUp { time, .. }
            | InputEvent::TouchStart { time, .. }
            | InputEvent::TouchMove { time, .. }
            | InputEvent::TouchEnd { time, .. } => time,
        }
    }
}

/// The chart playback engine as seen from the bridge.
///
/// None of these calls may re-enter the bridge except through the
/// callbacks argument, and `render` must draw the whole frame before it
/// returns.
pub trait ChartEngine {
    fn load_resource_pack(&mut self, bytes: &[u8]) -> Result<PackHandle>;

    /// Returns `None` when the pack has no texture for `kind`.
    fn note_texture(&mut self, pack: PackHandle, kind: NoteKind) -> Result<Option<NoteTextureData>>;

    fn line_head_texture(&mut self, pack: PackHandle) -> Result<Option<LineHeadTextureData>>;

    /// Encoded hitsound for `kind`, or `None` if the pack has none.
    fn hitsound(&mut self, pack: PackHandle, kind: NoteKind) -> Result<Option<Vec<u8>>>;

    /// Prepares the context. The engine may pre-create click-effect textures
    /// through `callbacks` here.
    fn init(&mut self, callbacks: &mut dyn RenderCallbacks) -> Result<()>;

    fn load_chart(&mut self, bytes: &[u8]) -> Result<()>;

    fn set_autoplay(&mut self, enabled: bool);

    /// Draws one frame at `chart_time` seconds.
    fn render(&mut self, chart_time: f64, callbacks: &mut dyn RenderCallbacks);

    fn input(&mut self, event: InputEvent);
}

/// Resolves an engine location (a build directory, a library path, a
/// registry name) into a ready engine instance.
pub trait EngineLoader {
    type Engine: ChartEngine;

    fn load(&mut self, location: &str) -> Result<Self::Engine>;
}
