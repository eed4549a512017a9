use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rhythm_bridge_core::assets::decode_image;
use rhythm_bridge_core::{
    AssetSource, BridgeError, ClickEffectProgram, ClickEffectUniforms, FsAssets, PackedColor,
    PlayerConfig, RenderSettings, SeedRegistry, Tinter,
};
use tracing_subscriber::EnvFilter;

fn main() -> rhythm_bridge_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::ClickEffect {
            group,
            seed,
            progress,
            color,
            size,
            output,
        } => run_click_effect(group, seed, progress, &color, size, &output),
        Commands::Tint {
            input,
            color,
            output,
        } => run_tint(&input, &color, &output),
    }
}

fn run_check(path: &Path) -> rhythm_bridge_core::Result<()> {
    tracing::info!(?path, "checking player config");
    let config = PlayerConfig::from_path(path)?.validate()?;

    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let mut assets = FsAssets::new(root);
    for location in [&config.resource_pack, &config.chart, &config.audio] {
        let bytes = assets.fetch(location)?;
        tracing::info!(location = %location, bytes = bytes.len(), "asset found");
    }

    for location in [&config.illustration, &config.pause_button] {
        let image = decode_image(&assets.fetch(location)?, 1.0)?;
        tracing::info!(
            location = %location,
            width = image.width(),
            height = image.height(),
            "image decodes"
        );
    }

    ClickEffectProgram::compile(&config.render)?;
    tracing::info!(engine = %config.engine_location, "config is complete");
    Ok(())
}

fn run_click_effect(
    group: i64,
    seed: Option<u64>,
    progress: f32,
    color: &str,
    size: u32,
    output: &Path,
) -> rhythm_bridge_core::Result<()> {
    let program = ClickEffectProgram::compile(&RenderSettings {
        click_effect_size: size,
        ..RenderSettings::default()
    })?;
    let mut seeds = match seed {
        Some(seed) => SeedRegistry::with_seed(seed),
        None => SeedRegistry::default(),
    };
    let uniforms = ClickEffectUniforms {
        progress,
        seed: seeds.seed(group),
        color: parse_color(color)?.unpack().rgb(),
    };
    tracing::info!(group, progress, seed = uniforms.seed, "rendering click effect");

    program.render(&uniforms).save(output)?;
    tracing::info!(?output, "click effect written");
    Ok(())
}

fn run_tint(input: &Path, color: &str, output: &Path) -> rhythm_bridge_core::Result<()> {
    let source = decode_image(&std::fs::read(input)?, 1.0)?;
    let color = parse_color(color)?.unpack();

    let mut tinter = Tinter::default();
    if tinter.is_identity(color.rgb()) {
        tracing::info!("color is white; image is copied unchanged");
    }
    tinter.apply(&source, color.rgb()).save(output)?;
    tracing::info!(?input, ?output, "tinted image written");
    Ok(())
}

/// Parses `RRGGBBAA` or `RRGGBB` hex, with an optional `#` or `0x` prefix.
fn parse_color(text: &str) -> rhythm_bridge_core::Result<PackedColor> {
    let hex = text
        .trim_start_matches('#')
        .trim_start_matches("0x");
    let value = u32::from_str_radix(hex, 16)
        .map_err(|err| BridgeError::msg(format!("invalid color `{text}`: {err}")))?;
    match hex.len() {
        8 => Ok(PackedColor(value)),
        6 => Ok(PackedColor(value << 8 | 0xff)),
        _ => Err(BridgeError::msg(format!(
            "invalid color `{text}`: expected 6 or 8 hex digits"
        ))),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Render and audio bridge for rhythm game engines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a player config and make sure every asset it names loads.
    Check {
        /// Path to the JSON player config. Assets resolve relative to it.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Render one click-effect sprite to a PNG file.
    ClickEffect {
        /// Effect group; sprites of one group share a noise seed.
        #[arg(long, default_value_t = 0)]
        group: i64,
        /// Fixed random seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
        /// Dissolve progress, 0 for a full ring.
        #[arg(short, long, default_value_t = 0.0)]
        progress: f32,
        /// Fill color as RRGGBB or RRGGBBAA hex.
        #[arg(short, long, default_value = "ffeca0")]
        color: String,
        /// Sprite edge length in pixels.
        #[arg(long, default_value_t = 256)]
        size: u32,
        /// Output PNG path.
        output: PathBuf,
    },
    /// Multiply an image by a color, keeping its alpha.
    Tint {
        /// Input PNG or JPEG.
        input: PathBuf,
        /// Tint color as RRGGBB or RRGGBBAA hex.
        #[arg(short, long)]
        color: String,
        /// Output PNG path.
        output: PathBuf,
    },
}
