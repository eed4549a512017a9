use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BridgeError, Result};

/// Serialisable part of the player options.
///
/// Every field is optional on the wire so that a partially written config
/// file reaches [`PlayerConfig::validate`] and is reported field by field
/// instead of failing inside the JSON parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    pub engine_location: Option<String>,
    pub resource_pack: Option<String>,
    pub chart: Option<String>,
    pub audio: Option<String>,
    pub illustration: Option<String>,
    pub font_family: Option<String>,
    pub pause_button: Option<String>,
    pub autoplay: Option<bool>,
    #[serde(default)]
    pub render: RenderSettings,
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks the source fields, in declaration order, and returns the
    /// resolved values.
    pub fn validate(&self) -> Result<ResolvedConfig> {
        self.validate_with(|| Ok(()), || Ok(()))
    }

    /// Like [`PlayerConfig::validate`], interleaving checks of options held
    /// outside the config. `after_resource_pack` runs right after the
    /// resource pack check and `before_autoplay` between the pause button and
    /// autoplay checks.
    pub fn validate_with(
        &self,
        after_resource_pack: impl FnOnce() -> Result<()>,
        before_autoplay: impl FnOnce() -> Result<()>,
    ) -> Result<ResolvedConfig> {
        let engine_location = required(&self.engine_location, "engine location")?;
        let resource_pack = required(&self.resource_pack, "resource pack")?;
        after_resource_pack()?;
        let chart = required(&self.chart, "chart")?;
        let audio = required(&self.audio, "audio")?;
        let illustration = required(&self.illustration, "illustration")?;
        let font_family = required(&self.font_family, "font family")?;
        let pause_button = required(&self.pause_button, "pause button")?;
        before_autoplay()?;
        Ok(ResolvedConfig {
            engine_location,
            resource_pack,
            chart,
            audio,
            illustration,
            font_family,
            pause_button,
            autoplay: self
                .autoplay
                .ok_or(BridgeError::MissingOption("autoplay flag"))?,
            render: self.render.clone(),
        })
    }
}

pub(crate) fn required(value: &Option<String>, name: &'static str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(BridgeError::MissingOption(name)),
    }
}

/// Player configuration after every required field has been checked.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub engine_location: String,
    pub resource_pack: String,
    pub chart: String,
    pub audio: String,
    pub illustration: String,
    pub font_family: String,
    pub pause_button: String,
    pub autoplay: bool,
    pub render: RenderSettings,
}

/// Tunables for the raster side of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderSettings {
    /// Halves decoded texture resolution when set.
    pub mobile: bool,
    /// Host user agent. A mobile agent turns on [`RenderSettings::mobile`]
    /// behaviour even when the flag is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Edge length of generated click-effect sprites in pixels.
    pub click_effect_size: u32,
    /// Inner radius of the click-effect annulus as a ratio of the sprite.
    pub click_effect_inner_radius: f32,
    /// L1 distance from white under which tinting is skipped.
    pub tint_epsilon: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mobile: false,
            user_agent: None,
            click_effect_size: 256,
            click_effect_inner_radius: 465.0 / 1080.0,
            tint_epsilon: 1e-4,
        }
    }
}

impl RenderSettings {
    /// The explicit flag, or a mobile user agent when one is given.
    pub fn is_mobile(&self) -> bool {
        self.mobile
            || self
                .user_agent
                .as_deref()
                .is_some_and(crate::assets::is_mobile_user_agent)
    }

    pub fn resize_factor(&self) -> f32 {
        crate::assets::resize_factor(self.is_mobile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PlayerConfig {
        PlayerConfig {
            engine_location: Some("build".into()),
            resource_pack: Some("pack.bin".into()),
            chart: Some("chart.json".into()),
            audio: Some("music.ogg".into()),
            illustration: Some("illu.png".into()),
            font_family: Some("Sans".into()),
            pause_button: Some("pause.png".into()),
            autoplay: Some(true),
            render: RenderSettings::default(),
        }
    }

    #[test]
    fn reports_first_missing_field() {
        let mut config = complete();
        config.chart = None;
        config.audio = None;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, BridgeError::MissingOption("chart")));
        assert_eq!(err.to_string(), "No chart specified");
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let mut config = complete();
        config.font_family = Some(String::new());

        let err = config.validate().unwrap_err();
        assert!(matches!(err, BridgeError::MissingOption("font family")));
    }

    #[test]
    fn autoplay_false_is_present() {
        let mut config = complete();
        config.autoplay = Some(false);
        assert!(!config.validate().unwrap().autoplay);

        config.autoplay = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BridgeError::MissingOption("autoplay flag")));
    }

    #[test]
    fn parses_camel_case_json_with_default_render_settings() {
        let config = PlayerConfig::from_json_str(
            r#"{
                "engineLocation": "build",
                "resourcePack": "pack.bin",
                "chart": "chart.json",
                "audio": "music.ogg",
                "illustration": "illu.png",
                "fontFamily": "Sans",
                "pauseButton": "pause.png",
                "autoplay": false
            }"#,
        )
        .unwrap();

        let resolved = config.validate().unwrap();
        assert_eq!(resolved.render.click_effect_size, 256);
        assert_eq!(resolved.render.resize_factor(), 1.0);
    }

    #[test]
    fn mobile_user_agent_halves_resolution() {
        let mut settings = RenderSettings {
            user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)".into()),
            ..RenderSettings::default()
        };
        assert!(settings.is_mobile());
        assert_eq!(settings.resize_factor(), 0.5);

        settings.user_agent = Some("Mozilla/5.0 (X11; Linux x86_64)".into());
        assert!(!settings.is_mobile());
        settings.mobile = true;
        assert_eq!(settings.resize_factor(), 0.5);

        let parsed: RenderSettings =
            serde_json::from_str(r#"{"userAgent": "Opera Mini/8.0"}"#).unwrap();
        assert!(parsed.is_mobile());
    }

    #[test]
    fn outside_checks_run_at_their_slots() {
        let mut config = complete();
        config.chart = None;
        let err = config
            .validate_with(|| Err(BridgeError::Unsupported2d), || Ok(()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Unsupported2d));

        config.resource_pack = None;
        let err = config
            .validate_with(|| Err(BridgeError::Unsupported2d), || Ok(()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::MissingOption("resource pack")));

        let mut config = complete();
        config.autoplay = None;
        let err = config
            .validate_with(|| Ok(()), || Err(BridgeError::MissingOption("storyboard loader")))
            .unwrap_err();
        assert!(matches!(err, BridgeError::MissingOption("storyboard loader")));
    }
}
