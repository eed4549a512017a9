//! Procedural click-effect sprites.
//!
//! A click effect is a ring of noise that dissolves as the effect
//! progresses. Each sprite is rendered once on the CPU when the engine asks
//! for it and drawn many times afterwards.

use std::collections::HashMap;

use glam::Vec2;
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RenderSettings;
use crate::{BridgeError, Result};

/// Radial density of the noise ring.
const DENSITY: f32 = 50.0;

/// Hands out one random seed per effect group and remembers it, so every
/// texture created for a group dissolves along the same pattern.
#[derive(Debug)]
pub struct SeedRegistry {
    rng: StdRng,
    seeds: HashMap<i64, f32>,
}

impl Default for SeedRegistry {
    fn default() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }
}

impl SeedRegistry {
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            seeds: HashMap::new(),
        }
    }

    /// Seed in `[0, 1)` for `group`, drawn on first use.
    pub fn seed(&mut self, group: i64) -> f32 {
        let rng = &mut self.rng;
        *self.seeds.entry(group).or_insert_with(|| rng.gen::<f32>())
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }
}

/// Per-sprite inputs of the effect program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEffectUniforms {
    /// Dissolve threshold. 0 keeps the whole ring, values above 1.1 erase it.
    pub progress: f32,
    pub seed: f32,
    pub color: [f32; 3],
}

/// Validated click-effect fragment program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEffectProgram {
    size: u32,
    inner_radius: f32,
}

impl ClickEffectProgram {
    pub fn compile(settings: &RenderSettings) -> Result<Self> {
        let size = settings.click_effect_size;
        let inner_radius = settings.click_effect_inner_radius;
        if size == 0 {
            return Err(BridgeError::msg("click effect size must be positive"));
        }
        if !(0.0..0.5).contains(&inner_radius) {
            return Err(BridgeError::msg(format!(
                "click effect inner radius {inner_radius} is outside [0, 0.5)"
            )));
        }
        Ok(Self { size, inner_radius })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn render(&self, uniforms: &ClickEffectUniforms) -> RgbaImage {
        let size = self.size as f32;
        let [r, g, b] = uniforms.color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);

        RgbaImage::from_fn(self.size, self.size, |x, y| {
            let uv = Vec2::new((x as f32 + 0.5) / size, (y as f32 + 0.5) / size);
            let l = (uv - 0.5).length();
            let visible = (self.inner_radius..=0.5).contains(&l)
                && circular_noise(uv, DENSITY, uniforms.seed) >= uniforms.progress;
            Rgba([r, g, b, if visible { 255 } else { 0 }])
        })
    }
}

/// Pre-rendered sprites of one click effect, one per judgement.
#[derive(Debug, Clone)]
pub struct ClickEffectEntry {
    pub perfect: RgbaImage,
    pub good: RgbaImage,
}

impl ClickEffectEntry {
    pub fn select(&self, perfect: bool) -> &RgbaImage {
        if perfect {
            &self.perfect
        } else {
            &self.good
        }
    }
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

fn hash(n: Vec2) -> f32 {
    fract((n.dot(Vec2::new(12.9898, 78.233))).sin() * 43758.547)
}

fn value_noise(p: Vec2) -> f32 {
    let ip = p.floor();
    let fp = p - ip;

    let a = hash(ip);
    let b = hash(ip + Vec2::X);
    let c = hash(ip + Vec2::Y);
    let d = hash(ip + Vec2::ONE);

    let u = fp * fp * (3.0 - 2.0 * fp);
    let lerp = |from: f32, to: f32, t: f32| from + (to - from) * t;
    lerp(lerp(a, b, u.x), lerp(c, d, u.x), u.y)
}

fn circular_noise(uv: Vec2, density: f32, seed: f32) -> f32 {
    let center = uv - 0.5;
    let radius = center.length() * density;
    let mut angle = center.y.atan2(center.x).abs();
    // v grows downward while the fragment's y grows upward, so the warped
    // half is the upper one.
    if uv.y < 0.5 {
        angle += angle.sin() * 2.0;
    }

    let polar = Vec2::new(radius, angle) + seed * 100.0;
    value_noise(polar) * 0.7 + value_noise(polar * 2.0) * 0.3 + value_noise(polar * 4.0) * 0.1
}
