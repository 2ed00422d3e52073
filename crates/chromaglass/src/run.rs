use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use effectcfg::{AnimationConfig, AntialiasSetting, EffectConfig};
use imagesource::{ImageClient, ImageHandle, ImageOrigin, ImageRepository};
use renderer::{Antialiasing, EffectParams, Renderer, RendererConfig};
use timeline::{AnimationPlan, Oscillator};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

/// Image the viewer falls back to when neither the CLI nor the config file
/// names a source.
const DEFAULT_IMAGE_URL: &str = "https://i.imgur.com/2VP5osy.jpg";

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(&args, &paths)?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        cache = %paths.cache_dir().display(),
        "resolved chromaglass paths"
    );

    let input = args
        .image
        .clone()
        .or_else(|| config.image.clone())
        .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string());
    let handle = ImageHandle::from_input(&input);
    tracing::info!(?handle, "bootstrapping chromaglass viewer");

    let client = build_client(&args, &handle)?;
    if args.refresh && client.is_none() && !handle.is_local() {
        tracing::warn!("refresh requested but network access is disabled; using cache only");
    }

    let repository = ImageRepository::new(paths.image_cache_dir());
    let resolved = repository.resolve(&handle, client.as_ref(), args.refresh)?;
    match &resolved.origin {
        ImageOrigin::Local => {
            tracing::info!(path = %resolved.path.display(), "using local image");
        }
        ImageOrigin::Remote { url, refreshed } => {
            tracing::info!(
                %url,
                path = %resolved.path.display(),
                refreshed,
                "using remote image"
            );
        }
    }

    let renderer_config = build_renderer_config(&args, &config, resolved.path)?;
    let mut renderer = Renderer::new(renderer_config);
    renderer.run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(args: &RunArgs, paths: &AppPaths) -> Result<EffectConfig> {
    let path = match &args.config {
        Some(path) => {
            if !path.is_file() {
                bail!("config file not found at {}", path.display());
            }
            path.clone()
        }
        None => {
            let default = paths.config_file();
            if !default.is_file() {
                tracing::debug!(path = %default.display(), "no config file; using defaults");
                return Ok(EffectConfig::default());
            }
            default
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let config = EffectConfig::from_toml_str(&raw)
        .with_context(|| format!("loading config at {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded effect config");
    Ok(config)
}

fn build_client(args: &RunArgs, handle: &ImageHandle) -> Result<Option<ImageClient>> {
    if handle.is_local() {
        return Ok(None);
    }
    if args.cache_only {
        tracing::info!("network access disabled (--cache-only)");
        return Ok(None);
    }
    Ok(Some(
        ImageClient::new().context("failed to construct image client")?,
    ))
}

fn build_renderer_config(
    args: &RunArgs,
    config: &EffectConfig,
    image_path: PathBuf,
) -> Result<RendererConfig> {
    let separation = args.separation.unwrap_or(config.distortion.separation);
    if !separation.is_finite() || separation < 0.0 {
        bail!("separation must be a non-negative finite value, got {separation}");
    }
    let drift = args.drift.unwrap_or(config.distortion.drift);
    if !drift.is_finite() {
        bail!("drift must be finite");
    }

    let effect = EffectParams {
        plan: animation_plan(&config.animation)?,
        separation,
        drift,
        initial_pointer: config.pointer.initial,
    };

    let antialias = args
        .antialias
        .or(config.antialias)
        .unwrap_or(AntialiasSetting::Auto);

    Ok(RendererConfig {
        surface_size: args
            .size
            .unwrap_or((config.surface.width, config.surface.height)),
        image_path,
        window_title: "chromaglass".to_string(),
        target_fps: args.fps.or(config.fps).filter(|fps| *fps > 0.0),
        settle: args.settle.unwrap_or(config.resize.settle),
        antialiasing: map_antialias(antialias),
        effect,
    })
}

fn animation_plan(animation: &AnimationConfig) -> Result<AnimationPlan> {
    let frequency = Oscillator::sine(
        animation.frequency.base,
        animation.frequency.depth,
        animation.frequency.rate,
    )
    .context("invalid frequency oscillator")?;
    let amplitude = Oscillator::rectified_cosine(
        animation.amplitude.base,
        animation.amplitude.depth,
        animation.amplitude.rate,
    )
    .context("invalid amplitude oscillator")?;
    Ok(AnimationPlan {
        frequency,
        amplitude,
    })
}

fn map_antialias(setting: AntialiasSetting) -> Antialiasing {
    match setting.samples() {
        None => Antialiasing::Auto,
        Some(1) => Antialiasing::Off,
        Some(samples) => Antialiasing::Samples(samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn default_args() -> RunArgs {
        RunArgs {
            image: None,
            config: None,
            size: None,
            fps: None,
            separation: None,
            drift: None,
            settle: None,
            antialias: None,
            refresh: false,
            cache_only: false,
        }
    }

    #[test]
    fn config_defaults_flow_into_renderer_config() {
        let config = EffectConfig::default();
        let built =
            build_renderer_config(&default_args(), &config, PathBuf::from("img.png")).unwrap();
        assert_eq!(built.surface_size, (500, 400));
        assert_eq!(built.settle, Duration::from_millis(100));
        assert_eq!(built.target_fps, None);
        assert_eq!(built.antialiasing, Antialiasing::Auto);
        assert_eq!(built.effect.separation, 0.02);
        assert_eq!(built.effect.drift, 0.0);
        assert_eq!(built.effect.initial_pointer, [0.5, 0.5]);
        assert_eq!(built.effect.plan.frequency.bounds(), (8.0, 12.0));
    }

    #[test]
    fn cli_flags_override_config_values() {
        let config = EffectConfig::default();
        let mut args = default_args();
        args.size = Some((800, 600));
        args.fps = Some(30.0);
        args.separation = Some(0.05);
        args.drift = Some(1.0);
        args.settle = Some(Duration::from_millis(250));
        args.antialias = Some(AntialiasSetting::Off);

        let built = build_renderer_config(&args, &config, PathBuf::from("img.png")).unwrap();
        assert_eq!(built.surface_size, (800, 600));
        assert_eq!(built.target_fps, Some(30.0));
        assert_eq!(built.effect.separation, 0.05);
        assert_eq!(built.effect.drift, 1.0);
        assert_eq!(built.settle, Duration::from_millis(250));
        assert_eq!(built.antialiasing, Antialiasing::Off);
    }

    #[test]
    fn zero_fps_is_treated_as_uncapped() {
        let config = EffectConfig::default();
        let mut args = default_args();
        args.fps = Some(0.0);
        let built = build_renderer_config(&args, &config, PathBuf::from("img.png")).unwrap();
        assert_eq!(built.target_fps, None, "fps=0 should map to uncapped");
    }

    #[test]
    fn negative_separation_override_is_rejected() {
        let config = EffectConfig::default();
        let mut args = default_args();
        args.separation = Some(-0.01);
        assert!(build_renderer_config(&args, &config, PathBuf::from("img.png")).is_err());
    }

    #[test]
    fn maps_antialias_settings() {
        assert_eq!(map_antialias(AntialiasSetting::Auto), Antialiasing::Auto);
        assert_eq!(map_antialias(AntialiasSetting::Off), Antialiasing::Off);
        assert_eq!(
            map_antialias(AntialiasSetting::Samples8),
            Antialiasing::Samples(8)
        );
    }
}
