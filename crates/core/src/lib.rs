//! Core library for the rhythm bridge.
//!
//! The bridge sits between a chart playback engine and the host it runs in.
//! It marshals the engine's textures and sounds out of its memory, caches
//! them, and answers the engine's drawing and query callbacks on a raster
//! surface. It also keeps chart time locked to the music clock. Each module
//! owns one of those concerns and the [`player`] module ties them together.

pub mod assets;
pub mod audio;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod hold;
pub mod marshal;
pub mod paint;
pub mod player;
pub mod registry;
pub mod render;
pub mod surface;
pub mod tint;

#[cfg(test)]
mod testing;

pub use assets::{AssetSource, FsAssets, LineHeadTexture, NoteKind, NoteTexture, TextureCache};
pub use audio::{AudioBackend, AudioClip, Transport, TransportState, VoiceId};
pub use config::{PlayerConfig, RenderSettings, ResolvedConfig};
pub use effect::{ClickEffectEntry, ClickEffectProgram, ClickEffectUniforms, SeedRegistry};
pub use engine::{ChartEngine, DeviceId, EngineLoader, InputEvent, PackHandle};
pub use error::{BridgeError, Result};
pub use hold::{HoldCompositor, HoldSpans};
pub use marshal::{ContainerDecoder, EngineMemory, Marshaller, Ptr, RawEngineAbi, VecHeap};
pub use paint::{Color, LinearGradient, PackedColor, Paint};
pub use player::{HostInput, Player, PlayerOptions};
pub use registry::{TextureId, TextureRegistry};
pub use render::{Frame, RenderCallbacks, RenderResources, StoryboardLoader, StoryboardTexture};
pub use surface::{RasterSurface, Rect, Surface, TextAlign, TextBaseline, TextStyle};
pub use tint::Tinter;
