//! The drawing and query table the engine calls back into while it
//! initialises and renders.

use std::collections::HashMap;

use glam::{Affine2, Vec2};
use image::RgbaImage;

use crate::assets::{NoteKind, TextureCache};
use crate::audio::{AudioBackend, AudioClip};
use crate::effect::{ClickEffectEntry, ClickEffectProgram, ClickEffectUniforms, SeedRegistry};
use crate::hold::{HoldCompositor, HoldSpans};
use crate::paint::{Color, LinearGradient, PackedColor, Paint};
use crate::registry::{TextureId, TextureRegistry};
use crate::surface::{anchored, Rect, Surface, TextAlign, TextBaseline, TextStyle};
use crate::tint::Tinter;

/// Resolves a storyboard texture key to a picture.
pub type StoryboardLoader = Box<dyn FnMut(&str) -> Option<RgbaImage>>;

/// Result of [`RenderCallbacks::load_storyboard_texture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryboardTexture {
    pub id: TextureId,
    /// Picture size, or `None` when the loader had nothing for the key.
    pub size: Option<(u32, u32)>,
}

/// Completion screen data. Accepted for compatibility and currently not
/// drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionStatus<'a> {
    pub text: &'a str,
    pub gradient_progress: &'a [f64],
    pub reds: &'a [f64],
    pub greens: &'a [f64],
    pub blues: &'a [f64],
    pub scale: f64,
}

/// Primitives the engine draws a frame with. Angles are in degrees except
/// for [`RenderCallbacks::draw_ellipse`], which takes radians.
#[allow(clippy::too_many_arguments)]
pub trait RenderCallbacks {
    fn draw_background(&mut self);

    fn draw_line_head(&mut self, x: f64, y: f64, size: f64, color: PackedColor);

    fn draw_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, width: f64, color: PackedColor);

    fn draw_point_note(
        &mut self,
        kind: NoteKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        rotate: f64,
        color: PackedColor,
    );

    /// Draws a hold whose head sits at `(x, y)` and which extends along the
    /// local x axis.
    fn draw_hold(
        &mut self,
        kind: NoteKind,
        x: f64,
        y: f64,
        head: f64,
        body: f64,
        tail: f64,
        height: f64,
        rotate: f64,
        color: PackedColor,
    );

    fn texture_size(&self, kind: NoteKind) -> (f64, f64);

    fn screen_size(&self) -> (f64, f64);

    fn play_click_sound(&mut self, kind: NoteKind);

    /// Music length in seconds.
    fn audio_duration(&self) -> f64;

    fn draw_pause_button(&mut self, x: f64, y: f64, width: f64, height: f64, alpha: f64);

    fn draw_progress_bar(&mut self, progress: f64, alpha: f64);

    fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font_size: f64,
        bold: bool,
        align: TextAlign,
        baseline: TextBaseline,
        color: PackedColor,
    );

    fn load_storyboard_texture(&mut self, key: &str) -> StoryboardTexture;

    fn draw_storyboard_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        scale_x: f64,
        scale_y: f64,
        rotate: f64,
        font_size: f64,
        color: PackedColor,
    );

    fn draw_storyboard_picture(
        &mut self,
        id: TextureId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        scale_x: f64,
        scale_y: f64,
        rotate: f64,
        color: PackedColor,
    );

    fn release_storyboard_texture(&mut self, id: TextureId);

    /// Renders the perfect and good sprites of a click effect at
    /// `progress`. Every effect of a `group` shares one noise seed.
    fn create_click_effect_texture(
        &mut self,
        group: i64,
        progress: f64,
        perfect: PackedColor,
        good: PackedColor,
    ) -> TextureId;

    fn draw_click_effect_texture(
        &mut self,
        id: TextureId,
        perfect: bool,
        x: f64,
        y: f64,
        size: f64,
        rotate: f64,
    );

    fn release_click_effect_texture(&mut self, id: TextureId);

    fn draw_ellipse(&mut self, x: f64, y: f64, rx: f64, ry: f64, radians: f64, color: PackedColor);

    fn resource_pack_note_scale(&self, kind: NoteKind) -> f64;

    fn resource_pack_line_head_scale(&self) -> f64;

    /// Connect point as a ratio of half the line-head height.
    fn resource_pack_line_head_connect_point(&self) -> f64;

    fn draw_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: PackedColor);

    fn draw_completion_status(&mut self, _status: &CompletionStatus<'_>) {}
}

/// Everything the callback table reads or mutates between frames.
pub struct RenderResources {
    pub(crate) textures: TextureCache,
    pub(crate) tinter: Tinter,
    pub(crate) holds: HoldCompositor,
    pub(crate) registry: TextureRegistry,
    pub(crate) seeds: SeedRegistry,
    pub(crate) program: Option<ClickEffectProgram>,
    pub(crate) hitsounds: HashMap<NoteKind, AudioClip>,
    pub(crate) music_duration: f64,
    pub(crate) font_family: String,
    pub(crate) illustration: Option<RgbaImage>,
    pub(crate) pause_button: Option<RgbaImage>,
    pub(crate) storyboard_loader: StoryboardLoader,
}

impl RenderResources {
    pub fn new(
        textures: TextureCache,
        font_family: impl Into<String>,
        storyboard_loader: StoryboardLoader,
    ) -> Self {
        Self {
            textures,
            tinter: Tinter::default(),
            holds: HoldCompositor::new(),
            registry: TextureRegistry::new(),
            seeds: SeedRegistry::default(),
            program: None,
            hitsounds: HashMap::new(),
            music_duration: 0.0,
            font_family: font_family.into(),
            illustration: None,
            pause_button: None,
            storyboard_loader,
        }
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn registry(&self) -> &TextureRegistry {
        &self.registry
    }

    pub fn set_tint_epsilon(&mut self, epsilon: f32) {
        self.tinter = Tinter::new(epsilon);
    }

    pub fn set_seeds(&mut self, seeds: SeedRegistry) {
        self.seeds = seeds;
    }

    pub fn set_program(&mut self, program: Option<ClickEffectProgram>) {
        self.program = program;
    }

    pub fn insert_hitsound(&mut self, kind: NoteKind, clip: AudioClip) {
        self.hitsounds.insert(kind, clip);
    }

    pub fn set_music_duration(&mut self, duration: f64) {
        self.music_duration = duration;
    }

    pub fn set_illustration(&mut self, image: RgbaImage) {
        self.illustration = Some(image);
    }

    pub fn set_pause_button(&mut self, image: RgbaImage) {
        self.pause_button = Some(image);
    }

    pub(crate) fn into_storyboard_loader(self) -> StoryboardLoader {
        self.storyboard_loader
    }
}

impl std::fmt::Debug for RenderResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderResources")
            .field("registry", &self.registry)
            .field("program", &self.program)
            .field("hitsounds", &self.hitsounds.len())
            .field("music_duration", &self.music_duration)
            .field("font_family", &self.font_family)
            .finish_non_exhaustive()
    }
}

/// Callback table for one engine call. Borrows the session resources, the
/// target surface and the audio output, none of which can reach the engine.
pub struct Frame<'a, S: Surface + ?Sized, A: AudioBackend + ?Sized> {
    resources: &'a mut RenderResources,
    surface: &'a mut S,
    audio: &'a mut A,
}

impl<'a, S: Surface + ?Sized, A: AudioBackend + ?Sized> Frame<'a, S, A> {
    pub fn new(resources: &'a mut RenderResources, surface: &'a mut S, audio: &'a mut A) -> Self {
        Self {
            resources,
            surface,
            audio,
        }
    }

    fn surface_size(&self) -> Vec2 {
        let (width, height) = self.surface.size();
        Vec2::new(width as f32, height as f32)
    }

    fn render_click_effect(&self, seed: f32, progress: f32, color: PackedColor) -> Option<RgbaImage> {
        let program = self.resources.program.as_ref()?;
        Some(program.render(&ClickEffectUniforms {
            progress,
            seed,
            color: color.unpack().rgb(),
        }))
    }
}

impl<S: Surface + ?Sized, A: AudioBackend + ?Sized> RenderCallbacks for Frame<'_, S, A> {
    fn draw_background(&mut self) {
        let screen = self.surface_size();
        if let Some(illustration) = &self.resources.illustration {
            if let Some(dest) = cover(illustration, screen) {
                self.surface.draw_image(illustration, Affine2::IDENTITY, dest, 1.0);
            }
        }

        let full = Rect::new(0.0, 0.0, screen.x, screen.y);
        self.surface
            .fill_rect(Affine2::IDENTITY, full, &Paint::Solid(Color::BLACK.with_alpha(0.7)));

        let top = screen.y * 0.6;
        let shade = LinearGradient::gamma_ramp(Vec2::new(0.0, top), Vec2::new(0.0, screen.y), Color::BLACK, 6);
        self.surface.fill_rect(
            Affine2::IDENTITY,
            Rect::new(0.0, top, screen.x, screen.y),
            &Paint::LinearGradient(shade),
        );
    }

    fn draw_line_head(&mut self, x: f64, y: f64, size: f64, color: PackedColor) {
        let color = color.unpack();
        let resources = &mut *self.resources;
        let image = resources
            .tinter
            .apply(&resources.textures.line_head().image, color.rgb());
        let size = size as f32;
        self.surface.draw_image(
            image,
            anchored(x as f32, y as f32, 0.0),
            Rect::centered(size, size),
            color.a,
        );
    }

    fn draw_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, width: f64, color: PackedColor) {
        self.surface.stroke_line(
            Vec2::new(x0 as f32, y0 as f32),
            Vec2::new(x1 as f32, y1 as f32),
            width as f32,
            color.unpack(),
        );
    }

    fn draw_point_note(
        &mut self,
        kind: NoteKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        rotate: f64,
        color: PackedColor,
    ) {
        let color = color.unpack();
        let resources = &mut *self.resources;
        let image = resources
            .tinter
            .apply(&resources.textures.note(kind).image, color.rgb());
        self.surface.draw_image(
            image,
            anchored(x as f32, y as f32, rotate as f32),
            Rect::centered(width as f32, height as f32),
            color.a,
        );
    }

    fn draw_hold(
        &mut self,
        kind: NoteKind,
        x: f64,
        y: f64,
        head: f64,
        body: f64,
        tail: f64,
        height: f64,
        rotate: f64,
        color: PackedColor,
    ) {
        let color = color.unpack();
        let spans = HoldSpans::from_lengths(head, body, tail, height);
        let resources = &mut *self.resources;
        let composite = resources.holds.compose(resources.textures.note(kind), spans);
        let image = resources.tinter.apply(composite, color.rgb());
        let (width, height) = (image.width() as f32, image.height() as f32);
        self.surface.draw_image(
            image,
            anchored(x as f32, y as f32, rotate as f32),
            Rect::new(-(spans.head as f32), -height / 2.0, width, height),
            color.a,
        );
    }

    fn texture_size(&self, kind: NoteKind) -> (f64, f64) {
        let (width, height) = self.resources.textures.note(kind).image.dimensions();
        (f64::from(width), f64::from(height))
    }

    fn screen_size(&self) -> (f64, f64) {
        let (width, height) = self.surface.size();
        (f64::from(width), f64::from(height))
    }

    fn play_click_sound(&mut self, kind: NoteKind) {
        match self.resources.hitsounds.get(&kind) {
            Some(clip) => self.audio.play_effect(clip),
            None => tracing::debug!(key = kind.key(), "no hitsound for note kind"),
        }
    }

    fn audio_duration(&self) -> f64 {
        self.resources.music_duration
    }

    fn draw_pause_button(&mut self, x: f64, y: f64, width: f64, height: f64, alpha: f64) {
        if let Some(image) = &self.resources.pause_button {
            self.surface.draw_image(
                image,
                Affine2::IDENTITY,
                Rect::new(x as f32, y as f32, width as f32, height as f32),
                alpha as f32,
            );
        }
    }

    fn draw_progress_bar(&mut self, progress: f64, alpha: f64) {
        let screen = self.surface_size();
        let width = screen.x * progress as f32;
        let mut bar = LinearGradient::gamma_ramp(Vec2::ZERO, Vec2::new(width, 0.0), Color::WHITE, 30);
        for stop in &mut bar.stops {
            stop.color.a *= alpha as f32;
        }
        self.surface.fill_rect(
            Affine2::IDENTITY,
            Rect::new(0.0, 0.0, width, screen.y * 9.0 / 1080.0),
            &Paint::LinearGradient(bar),
        );
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font_size: f64,
        bold: bool,
        align: TextAlign,
        baseline: TextBaseline,
        color: PackedColor,
    ) {
        self.surface.fill_text(
            anchored(x as f32, y as f32, 0.0),
            text,
            &TextStyle {
                family: &self.resources.font_family,
                size: font_size as f32,
                bold,
                align,
                baseline,
                color: color.unpack(),
            },
        );
    }

    fn load_storyboard_texture(&mut self, key: &str) -> StoryboardTexture {
        let image = (self.resources.storyboard_loader)(key);
        if image.is_none() {
            tracing::debug!(key, "storyboard texture not found");
        }
        let size = image.as_ref().map(RgbaImage::dimensions);
        let id = self.resources.registry.reserve_storyboard(image);
        StoryboardTexture { id, size }
    }

    fn draw_storyboard_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        scale_x: f64,
        scale_y: f64,
        rotate: f64,
        font_size: f64,
        color: PackedColor,
    ) {
        self.surface.fill_text(
            scaled(x, y, rotate, scale_x, scale_y),
            text,
            &TextStyle {
                family: &self.resources.font_family,
                size: font_size as f32,
                bold: false,
                align: TextAlign::Center,
                baseline: TextBaseline::Middle,
                color: color.unpack(),
            },
        );
    }

    fn draw_storyboard_picture(
        &mut self,
        id: TextureId,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        scale_x: f64,
        scale_y: f64,
        rotate: f64,
        color: PackedColor,
    ) {
        let resources = &mut *self.resources;
        let Some(picture) = resources.registry.storyboard(id) else {
            return;
        };
        let color = color.unpack();
        let image = resources.tinter.apply(picture, color.rgb());
        self.surface.draw_image(
            image,
            scaled(x, y, rotate, scale_x, scale_y),
            Rect::centered(width as f32, height as f32),
            color.a,
        );
    }

    fn release_storyboard_texture(&mut self, id: TextureId) {
        self.resources.registry.release_storyboard(id);
    }

    fn create_click_effect_texture(
        &mut self,
        group: i64,
        progress: f64,
        perfect: PackedColor,
        good: PackedColor,
    ) -> TextureId {
        let seed = self.resources.seeds.seed(group);
        let progress = progress as f32;
        let sprites = self
            .render_click_effect(seed, progress, perfect)
            .zip(self.render_click_effect(seed, progress, good));

        match sprites {
            Some((perfect, good)) => self
                .resources
                .registry
                .insert_click_effect(ClickEffectEntry { perfect, good }),
            None => {
                tracing::warn!(group, "click effect program unavailable; effect will not be drawn");
                self.resources.registry.reserve_click_effect()
            }
        }
    }

    fn draw_click_effect_texture(
        &mut self,
        id: TextureId,
        perfect: bool,
        x: f64,
        y: f64,
        size: f64,
        rotate: f64,
    ) {
        let Some(image) = self.resources.registry.click_effect(id, perfect) else {
            return;
        };
        let size = size as f32;
        self.surface.draw_image(
            image,
            anchored(x as f32, y as f32, rotate as f32),
            Rect::centered(size, size),
            1.0,
        );
    }

    fn release_click_effect_texture(&mut self, id: TextureId) {
        self.resources.registry.release_click_effect(id);
    }

    fn draw_ellipse(&mut self, x: f64, y: f64, rx: f64, ry: f64, radians: f64, color: PackedColor) {
        let transform = Affine2::from_translation(Vec2::new(x as f32, y as f32))
            * Affine2::from_angle(radians as f32);
        self.surface
            .fill_ellipse(transform, Vec2::new(rx as f32, ry as f32), color.unpack());
    }

    fn resource_pack_note_scale(&self, kind: NoteKind) -> f64 {
        self.resources.textures.note(kind).scale
    }

    fn resource_pack_line_head_scale(&self) -> f64 {
        self.resources.textures.line_head().scale
    }

    fn resource_pack_line_head_connect_point(&self) -> f64 {
        self.resources.textures.line_head().connect_ratio()
    }

    fn draw_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: PackedColor) {
        self.surface.fill_rect(
            Affine2::IDENTITY,
            Rect::new(x as f32, y as f32, width as f32, height as f32),
            &Paint::Solid(color.unpack()),
        );
    }
}

/// Destination that covers `screen` with `image`, centred and cropped.
fn cover(image: &RgbaImage, screen: Vec2) -> Option<Rect> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || screen.y <= 0.0 {
        return None;
    }
    let ratio = width as f32 / height as f32;
    let size = if ratio > screen.x / screen.y {
        Vec2::new(screen.y * ratio, screen.y)
    } else {
        Vec2::new(screen.x, screen.x / ratio)
    };
    let origin = (screen - size) / 2.0;
    Some(Rect::new(origin.x, origin.y, size.x, size.y))
}

fn scaled(x: f64, y: f64, rotate: f64, scale_x: f64, scale_y: f64) -> Affine2 {
    anchored(x as f32, y as f32, rotate as f32)
        * Affine2::from_scale(Vec2::new(scale_x as f32, scale_y as f32))
}
