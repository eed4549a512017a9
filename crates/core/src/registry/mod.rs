use std::collections::HashMap;

use image::RgbaImage;

use crate::effect::ClickEffectEntry;

/// Engine-visible id of a dynamically created texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Textures the engine creates and releases while a chart plays.
///
/// Storyboard pictures and click effects share one id counter, so an id
/// names at most one texture for the lifetime of the session. Lookups and
/// releases of unknown ids are ignored.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    next_id: u64,
    click_effects: HashMap<TextureId, ClickEffectEntry>,
    storyboard: HashMap<TextureId, RgbaImage>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        tracing::debug!(id = id.0, "texture id allocated");
        id
    }

    pub fn insert_click_effect(&mut self, entry: ClickEffectEntry) -> TextureId {
        let id = self.allocate();
        self.click_effects.insert(id, entry);
        id
    }

    /// Allocates an id without storing anything, for effects whose sprites
    /// could not be produced.
    pub fn reserve_click_effect(&mut self) -> TextureId {
        self.allocate()
    }

    pub fn click_effect(&self, id: TextureId, perfect: bool) -> Option<&RgbaImage> {
        self.click_effects.get(&id).map(|entry| entry.select(perfect))
    }

    pub fn release_click_effect(&mut self, id: TextureId) {
        self.click_effects.remove(&id);
    }

    /// Always consumes an id. The picture is only stored when it loaded.
    pub fn reserve_storyboard(&mut self, image: Option<RgbaImage>) -> TextureId {
        let id = self.allocate();
        if let Some(image) = image {
            self.storyboard.insert(id, image);
        }
        id
    }

    pub fn storyboard(&self, id: TextureId) -> Option<&RgbaImage> {
        self.storyboard.get(&id)
    }

    pub fn release_storyboard(&mut self, id: TextureId) {
        self.storyboard.remove(&id);
    }

    /// Number of stored textures of either kind.
    pub fn live_count(&self) -> usize {
        self.click_effects.len() + self.storyboard.len()
    }
}
