//! Session orchestration: validates options, brings the engine up in a
//! fixed order, and drives playback, rendering and input.

use glam::Vec2;

use crate::assets::{decode_image, AssetSource, EnginePack, NoteKind, TextureCache};
use crate::audio::{AudioBackend, Transport, TransportState};
use crate::config::{PlayerConfig, ResolvedConfig};
use crate::effect::ClickEffectProgram;
use crate::engine::{ChartEngine, DeviceId, EngineLoader, InputEvent, PackHandle};
use crate::render::{Frame, RenderResources, StoryboardLoader};
use crate::surface::Surface;
use crate::{BridgeError, Result};

/// Everything needed to build a [`Player`].
pub struct PlayerOptions<S, A> {
    pub config: PlayerConfig,
    pub surface: S,
    pub audio: A,
    pub storyboard_loader: Option<StoryboardLoader>,
}

/// Raw input as delivered by the host window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostInput {
    KeyDown { code: u32, repeat: bool },
    KeyUp { code: u32 },
    TouchStart { id: u64, position: Vec2 },
    TouchMove { id: u64, position: Vec2 },
    TouchEnd { id: u64 },
    MouseDown { button: u16, position: Vec2 },
    /// `buttons` is the bitmask of buttons currently held.
    MouseMove { button: u16, buttons: u16, position: Vec2 },
    MouseUp { button: u16 },
}

struct Session<E> {
    engine: E,
    resources: RenderResources,
    transport: Transport,
}

/// A chart player bound to one surface and one audio output.
pub struct Player<E: ChartEngine, S: Surface, A: AudioBackend> {
    config: ResolvedConfig,
    surface: S,
    audio: A,
    storyboard_loader: Option<StoryboardLoader>,
    session: Option<Session<E>>,
    touch_seen: bool,
}

impl<E: ChartEngine, S: Surface, A: AudioBackend> Player<E, S, A> {
    /// Validates the options. Nothing is fetched or loaded yet.
    pub fn new(options: PlayerOptions<S, A>) -> Result<Self> {
        let PlayerOptions {
            config,
            surface,
            audio,
            storyboard_loader,
        } = options;

        let supports_2d = surface.supports_2d();
        let has_loader = storyboard_loader.is_some();
        let config = config.validate_with(
            || supports_2d.then_some(()).ok_or(BridgeError::Unsupported2d),
            || {
                has_loader
                    .then_some(())
                    .ok_or(BridgeError::MissingOption("storyboard loader"))
            },
        )?;

        Ok(Self {
            config,
            surface,
            audio,
            storyboard_loader,
            session: None,
            touch_seen: false,
        })
    }

    /// Loads the engine and every asset. Any failing step fails the whole
    /// initialisation and leaves the player uninitialised.
    pub fn init<L>(&mut self, loader: &mut L, assets: &mut impl AssetSource) -> Result<()>
    where
        L: EngineLoader<Engine = E>,
    {
        if self.session.is_some() {
            return Err(BridgeError::msg("player is already initialised"));
        }
        if self.storyboard_loader.is_none() {
            return Err(BridgeError::MissingOption("storyboard loader"));
        }

        let config = &self.config;
        tracing::info!(location = %config.engine_location, "loading engine");
        let mut engine = loader.load(&config.engine_location)?;

        let pack_bytes = assets.fetch(&config.resource_pack)?;
        let pack = engine.load_resource_pack(&pack_bytes)?;

        let factor = config.render.resize_factor();
        let textures = TextureCache::load(
            &mut EnginePack {
                engine: &mut engine,
                pack,
            },
            factor,
        )?;
        if config.render.is_mobile() {
            self.surface.set_smoothing(false);
        }

        let storyboard_loader = self
            .storyboard_loader
            .take()
            .ok_or(BridgeError::MissingOption("storyboard loader"))?;
        let mut resources =
            RenderResources::new(textures, self.config.font_family.clone(), storyboard_loader);
        resources.set_tint_epsilon(self.config.render.tint_epsilon);

        match self.finish_init(engine, pack, &mut resources, assets) {
            Ok((engine, transport)) => {
                self.session = Some(Session {
                    engine,
                    resources,
                    transport,
                });
                tracing::info!("player initialised");
                Ok(())
            }
            Err(err) => {
                self.storyboard_loader = Some(resources.into_storyboard_loader());
                Err(err)
            }
        }
    }

    fn finish_init(
        &mut self,
        mut engine: E,
        pack: PackHandle,
        resources: &mut RenderResources,
        assets: &mut impl AssetSource,
    ) -> Result<(E, Transport)> {
        let config = &self.config;

        for kind in NoteKind::ALL {
            if let Some(bytes) = engine.hitsound(pack, kind)? {
                resources.insert_hitsound(kind, self.audio.decode(&bytes)?);
            }
        }
        let music = self.audio.decode(&assets.fetch(&config.audio)?)?;
        resources.set_music_duration(music.duration);
        tracing::debug!(duration = music.duration, "music decoded");

        match ClickEffectProgram::compile(&config.render) {
            Ok(program) => resources.set_program(Some(program)),
            Err(err) => tracing::error!(%err, "click effect program rejected; effects are disabled"),
        }

        engine.init(&mut Frame::new(resources, &mut self.surface, &mut self.audio))?;

        engine.load_chart(&assets.fetch(&config.chart)?)?;
        if !config.autoplay {
            engine.set_autoplay(false);
        }

        let factor = config.render.resize_factor();
        resources.set_illustration(decode_image(&assets.fetch(&config.illustration)?, factor)?);
        resources.set_pause_button(decode_image(&assets.fetch(&config.pause_button)?, factor)?);

        Ok((engine, Transport::new(music)))
    }

    /// Plays the music from `t` seconds.
    pub fn start(&mut self, t: f64) -> Result<()> {
        let session = self.session.as_mut().ok_or(BridgeError::NotInitialized)?;
        session.transport.start(&mut self.audio, t);
        Ok(())
    }

    /// Pauses, or resumes when already paused.
    pub fn pause(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(BridgeError::NotInitialized)?;
        session.transport.pause(&mut self.audio);
        Ok(())
    }

    pub fn seek(&mut self, t: f64) -> Result<()> {
        let session = self.session.as_mut().ok_or(BridgeError::NotInitialized)?;
        session.transport.seek(&mut self.audio, t);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(BridgeError::NotInitialized)?;
        session.transport.stop(&mut self.audio);
        Ok(())
    }

    /// Current chart time, or `None` when nothing is playing or paused.
    pub fn chart_time(&self) -> Option<f64> {
        let session = self.session.as_ref()?;
        session.transport.chart_time(&self.audio)
    }

    pub fn transport_state(&self) -> Option<TransportState> {
        self.session.as_ref().map(|session| session.transport.state())
    }

    /// Draws one frame at the current chart time. Does nothing while the
    /// transport is stopped.
    pub fn render(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(BridgeError::NotInitialized)?;
        let Some(time) = session.transport.tick(&self.audio) else {
            return Ok(());
        };
        self.surface.clear();
        let mut frame = Frame::new(&mut session.resources, &mut self.surface, &mut self.audio);
        session.engine.render(time, &mut frame);
        Ok(())
    }

    /// Forwards host input to the engine as judgement input. Returns whether
    /// the event was forwarded.
    pub fn handle_input(&mut self, input: HostInput) -> bool {
        if matches!(
            input,
            HostInput::TouchStart { .. } | HostInput::TouchMove { .. } | HostInput::TouchEnd { .. }
        ) {
            self.touch_seen = true;
        }

        let touch_seen = self.touch_seen;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.transport.is_playing() {
            return false;
        }
        let Some(time) = session.transport.chart_time(&self.audio) else {
            return false;
        };

        let event = match input {
            HostInput::KeyDown { repeat: true, .. } => return false,
            HostInput::KeyDown { code, .. } => InputEvent::KeyDown {
                time,
                device: DeviceId::keyboard(code),
            },
            HostInput::KeyUp { code } => InputEvent::KeyUp {
                time,
                device: DeviceId::keyboard(code),
            },
            HostInput::TouchStart { id, position } => InputEvent::TouchStart {
                time,
                device: DeviceId::touch(id),
                position,
            },
            HostInput::TouchMove { id, position } => InputEvent::TouchMove {
                time,
                device: DeviceId::touch(id),
                position,
            },
            HostInput::TouchEnd { id } => InputEvent::TouchEnd {
                time,
                device: DeviceId::touch(id),
            },
            HostInput::MouseDown { .. } | HostInput::MouseMove { .. } | HostInput::MouseUp { .. }
                if touch_seen =>
            {
                return false
            }
            HostInput::MouseMove { buttons: 0, .. } => return false,
            HostInput::MouseDown { button, position } => InputEvent::TouchStart {
                time,
                device: DeviceId::mouse(button),
                position,
            },
            HostInput::MouseMove {
                button, position, ..
            } => InputEvent::TouchMove {
                time,
                device: DeviceId::mouse(button),
                position,
            },
            HostInput::MouseUp { button } => InputEvent::TouchEnd {
                time,
                device: DeviceId::mouse(button),
            },
        };

        session.engine.input(event);
        true
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.session.as_mut().map(|session| &mut session.engine)
    }

    pub fn resources(&self) -> Option<&RenderResources> {
        self.session.as_ref().map(|session| &session.resources)
    }
}

impl<E: ChartEngine, S: Surface, A: AudioBackend> std::fmt::Debug for Player<E, S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("config", &self.config)
            .field("initialised", &self.session.is_some())
            .field("transport", &self.transport_state())
            .field("touch_seen", &self.touch_seen)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use super::*;
    use crate::config::RenderSettings;
    use crate::paint::PackedColor;
    use crate::registry::TextureId;
    use crate::render::RenderCallbacks;
    use crate::testing::{
        png_bytes, ManualAudio, MapAssets, RecordingSurface, ScriptedEngine, ScriptedLoader,
    };

    type TestPlayer = Player<ScriptedEngine, RecordingSurface, ManualAudio>;

    fn config() -> PlayerConfig {
        PlayerConfig {
            engine_location: Some("build".into()),
            resource_pack: Some("pack.bin".into()),
            chart: Some("chart.json".into()),
            audio: Some("music.ogg".into()),
            illustration: Some("illu.png".into()),
            font_family: Some("Sans".into()),
            pause_button: Some("pause.png".into()),
            autoplay: Some(false),
            render: RenderSettings {
                click_effect_size: 16,
                ..RenderSettings::default()
            },
        }
    }

    fn options(config: PlayerConfig) -> PlayerOptions<RecordingSurface, ManualAudio> {
        PlayerOptions {
            config,
            surface: RecordingSurface::new(320, 180),
            audio: ManualAudio::default(),
            storyboard_loader: Some(Box::new(|_: &str| Some(RgbaImage::new(2, 2)))),
        }
    }

    fn assets() -> MapAssets {
        MapAssets::default()
            .with("pack.bin", vec![1, 2, 3])
            .with("chart.json", b"{}".to_vec())
            .with("music.ogg", vec![0; 120])
            .with("illu.png", png_bytes(4, 2, [10, 20, 30, 255]))
            .with("pause.png", png_bytes(2, 2, [255; 4]))
    }

    fn ready(engine: ScriptedEngine) -> TestPlayer {
        let mut player = TestPlayer::new(options(config())).unwrap();
        player
            .init(&mut ScriptedLoader::new(engine), &mut assets())
            .unwrap();
        player
    }

    fn missing(err: BridgeError) -> &'static str {
        match err {
            BridgeError::MissingOption(name) => name,
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn validation_reports_fields_in_order() {
        let mut opts = options(PlayerConfig::default());
        opts.surface.supports_2d = false;
        let err = TestPlayer::new(opts).unwrap_err();
        assert_eq!(missing(err), "engine location");

        let mut opts = options(PlayerConfig {
            engine_location: Some("build".into()),
            ..PlayerConfig::default()
        });
        opts.surface.supports_2d = false;
        assert_eq!(missing(TestPlayer::new(opts).unwrap_err()), "resource pack");

        let mut opts = options(PlayerConfig {
            engine_location: Some("build".into()),
            resource_pack: Some("pack.bin".into()),
            ..PlayerConfig::default()
        });
        opts.surface.supports_2d = false;
        assert!(matches!(TestPlayer::new(opts).unwrap_err(), BridgeError::Unsupported2d));

        let mut opts = options(config());
        opts.storyboard_loader = None;
        opts.config.autoplay = None;
        assert_eq!(missing(TestPlayer::new(opts).unwrap_err()), "storyboard loader");

        let mut opts = options(config());
        opts.config.autoplay = None;
        assert_eq!(missing(TestPlayer::new(opts).unwrap_err()), "autoplay flag");
    }

    #[test]
    fn init_runs_every_step_in_order() {
        let mut assets = assets();
        let mut loader = ScriptedLoader::new(ScriptedEngine::default());
        let mut player = TestPlayer::new(options(config())).unwrap();

        player.init(&mut loader, &mut assets).unwrap();

        assert_eq!(loader.locations, ["build"]);
        assert_eq!(
            assets.fetched,
            ["pack.bin", "music.ogg", "chart.json", "illu.png", "pause.png"]
        );
        let engine = player.engine_mut().unwrap();
        assert_eq!(
            engine.calls,
            ["load_resource_pack", "init", "load_chart", "set_autoplay"]
        );
        assert_eq!(engine.autoplay, Some(false));
        assert_eq!(engine.chart.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn autoplay_is_left_alone_when_requested() {
        let mut config = config();
        config.autoplay = Some(true);
        let mut player = TestPlayer::new(options(config)).unwrap();
        player
            .init(&mut ScriptedLoader::new(ScriptedEngine::default()), &mut assets())
            .unwrap();

        assert_eq!(player.engine_mut().unwrap().autoplay, None);
    }

    #[test]
    fn engine_init_can_create_click_effects() {
        let mut engine = ScriptedEngine::default();
        engine.on_init = Some(Box::new(|callbacks: &mut dyn RenderCallbacks| {
            let id = callbacks.create_click_effect_texture(
                4,
                0.2,
                PackedColor(0xffee_00ff),
                PackedColor::WHITE,
            );
            assert_eq!(id, TextureId(0));
            assert_eq!(callbacks.audio_duration(), 120.0);
        }));

        let player = ready(engine);

        let registry = player.resources().unwrap().registry();
        assert_eq!(registry.click_effect(TextureId(0), true).map(|i| i.width()), Some(16));
    }

    #[test]
    fn failed_step_fails_initialisation_and_keeps_loader() {
        let mut engine = ScriptedEngine::default();
        engine.reject_chart = true;
        let mut player = TestPlayer::new(options(config())).unwrap();

        let err = player
            .init(&mut ScriptedLoader::new(engine), &mut assets())
            .unwrap_err();

        assert!(matches!(err, BridgeError::Engine(_)));
        assert!(player.engine_mut().is_none());
        assert!(matches!(player.start(0.0), Err(BridgeError::NotInitialized)));

        let no_engine = player.init(&mut ScriptedLoader::default(), &mut assets());
        assert!(matches!(no_engine, Err(BridgeError::Engine(_))));

        let retried = player.init(&mut ScriptedLoader::new(ScriptedEngine::default()), &mut assets());
        assert!(retried.is_ok());
    }

    #[test]
    fn missing_asset_names_its_location() {
        let mut assets = assets();
        assets.files.remove("pause.png");
        let mut player = TestPlayer::new(options(config())).unwrap();

        let err = player
            .init(&mut ScriptedLoader::new(ScriptedEngine::default()), &mut assets)
            .unwrap_err();

        assert!(matches!(err, BridgeError::Asset { ref location, .. } if location == "pause.png"));
    }

    #[test]
    fn mobile_profile_halves_every_decoded_image() {
        let mut config = config();
        config.render.mobile = true;
        let mut player = TestPlayer::new(options(config)).unwrap();
        player
            .init(&mut ScriptedLoader::new(ScriptedEngine::default()), &mut assets())
            .unwrap();

        let resources = player.resources().unwrap();
        assert_eq!(resources.illustration.as_ref().map(|i| i.dimensions()), Some((2, 1)));
        assert_eq!(resources.pause_button.as_ref().map(|i| i.dimensions()), Some((1, 1)));
        assert_eq!(resources.textures().note(NoteKind::Tap).image.dimensions(), (4, 2));
    }

    #[test]
    fn undecodable_audio_fails_initialisation() {
        let mut opts = options(config());
        opts.audio.reject_decode = true;
        let mut player = TestPlayer::new(opts).unwrap();

        let err = player
            .init(&mut ScriptedLoader::new(ScriptedEngine::default()), &mut assets())
            .unwrap_err();

        assert!(matches!(err, BridgeError::Decode(_)));
        assert!(player.resources().is_none());
    }

    #[test]
    fn render_clears_then_draws_at_chart_time() {
        let mut engine = ScriptedEngine::default();
        engine.on_render = Some(Box::new(|_: f64, callbacks: &mut dyn RenderCallbacks| {
            callbacks.draw_background()
        }));
        let mut player = ready(engine);

        player.render().unwrap();
        assert!(player.surface().ops.is_empty());

        player.audio_mut().clock = 50.0;
        player.start(5.0).unwrap();
        player.audio_mut().clock += 0.5;
        player.render().unwrap();

        assert_eq!(player.engine_mut().unwrap().rendered, [5.5]);
        assert_eq!(player.surface().ops, ["clear", "draw_image", "fill_rect", "fill_rect"]);
    }

    #[test]
    fn paused_renders_the_frozen_time_and_natural_end_stops() {
        let mut player = ready(ScriptedEngine::default());
        player.start(1.0).unwrap();
        player.audio_mut().clock += 2.0;
        player.pause().unwrap();
        player.audio_mut().clock += 5.0;
        player.render().unwrap();
        assert_eq!(player.chart_time(), Some(3.0));

        player.pause().unwrap();
        player.audio_mut().finish_all();
        player.render().unwrap();

        assert_eq!(player.engine_mut().unwrap().rendered, [3.0]);
        assert_eq!(player.transport_state(), Some(TransportState::Stopped));
        assert_eq!(player.chart_time(), None);
    }

    #[test]
    fn input_is_dropped_until_playback() {
        let mut player = ready(ScriptedEngine::default());
        assert!(!player.handle_input(HostInput::KeyDown {
            code: 32,
            repeat: false
        }));

        player.start(0.0).unwrap();
        assert!(player.handle_input(HostInput::KeyDown {
            code: 32,
            repeat: false
        }));
        assert!(!player.handle_input(HostInput::KeyDown {
            code: 32,
            repeat: true
        }));
        assert!(player.handle_input(HostInput::KeyUp { code: 32 }));

        let inputs = &player.engine_mut().unwrap().inputs;
        assert_eq!(
            inputs[0],
            InputEvent::KeyDown {
                time: 0.0,
                device: DeviceId(1032)
            }
        );
        assert_eq!(inputs.len(), 2);
    }

    #[test]
    fn mouse_moves_need_a_button_and_touch_disables_mouse() {
        let mut player = ready(ScriptedEngine::default());
        player.start(0.0).unwrap();
        let at = Vec2::new(10.0, 20.0);

        assert!(!player.handle_input(HostInput::MouseMove {
            button: 0,
            buttons: 0,
            position: at
        }));
        assert!(player.handle_input(HostInput::MouseDown {
            button: 0,
            position: at
        }));
        assert!(player.handle_input(HostInput::MouseMove {
            button: 0,
            buttons: 1,
            position: at
        }));
        assert!(player.handle_input(HostInput::TouchStart { id: 3, position: at }));
        assert!(!player.handle_input(HostInput::MouseUp { button: 0 }));
        assert!(player.handle_input(HostInput::TouchEnd { id: 3 }));

        let devices: Vec<_> = player
            .engine_mut()
            .unwrap()
            .inputs
            .iter()
            .map(|event| match *event {
                InputEvent::TouchStart { device, .. }
                | InputEvent::TouchMove { device, .. }
                | InputEvent::TouchEnd { device, .. }
                | InputEvent::KeyDown { device, .. }
                | InputEvent::KeyUp { device, .. } => device,
            })
            .collect();
        assert_eq!(devices, [DeviceId(2000), DeviceId(2000), DeviceId(3), DeviceId(3)]);
    }

    #[test]
    fn touches_before_playback_still_disable_mouse() {
        let mut player = ready(ScriptedEngine::default());
        player.handle_input(HostInput::TouchStart {
            id: 0,
            position: Vec2::ZERO,
        });
        player.start(0.0).unwrap();

        assert!(!player.handle_input(HostInput::MouseDown {
            button: 0,
            position: Vec2::ZERO
        }));
    }

    #[test]
    fn controls_require_initialisation() {
        let mut player = TestPlayer::new(options(config())).unwrap();
        assert!(matches!(player.render(), Err(BridgeError::NotInitialized)));
        assert!(matches!(player.seek(1.0), Err(BridgeError::NotInitialized)));
        assert_eq!(player.chart_time(), None);
        assert!(!player.handle_input(HostInput::KeyUp { code: 1 }));
    }
}
