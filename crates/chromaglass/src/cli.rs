use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use effectcfg::AntialiasSetting;

#[derive(Parser, Debug)]
#[command(
    name = "chromaglass",
    author,
    version,
    about = "Animated chromatic-aberration image viewer",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Source image: a local file or an http(s) URL.
    #[arg(value_name = "IMAGE")]
    pub image: Option<String>,

    /// Config file to load instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the window size (e.g. `500x400`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Optional FPS cap (0 = uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Base color separation strength (the config default is 0.02).
    #[arg(long, value_name = "AMOUNT")]
    pub separation: Option<f32>,

    /// Horizontal drift speed; 0 freezes the drift term.
    #[arg(long, value_name = "SPEED")]
    pub drift: Option<f32>,

    /// Quiet period before a resize measurement commits (e.g. `100ms`).
    #[arg(long, value_name = "DURATION", value_parser = parse_settle)]
    pub settle: Option<Duration>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = effectcfg::parse_antialias)]
    pub antialias: Option<AntialiasSetting>,

    /// Force re-download of a cached remote image before launch.
    #[arg(long)]
    pub refresh: bool,

    /// Never touch the network, even for uncached URLs.
    #[arg(long)]
    pub cache_only: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print resolved directories for config and cache roots.
    Paths,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in surface size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in surface size".to_string())?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_settle(value: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(value.trim())
        .map_err(|err| format!("invalid settle duration '{value}': {err}"))?;
    if duration.is_zero() {
        return Err("settle duration must be greater than zero".into());
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_surface_size_variants() {
        assert_eq!(parse_surface_size("500x400").unwrap(), (500, 400));
        assert_eq!(parse_surface_size("1920X1080").unwrap(), (1920, 1080));
        assert_eq!(parse_surface_size(" 800 x 600 ").unwrap(), (800, 600));
        assert!(parse_surface_size("500").is_err());
        assert!(parse_surface_size("0x400").is_err());
        assert!(parse_surface_size("500xtall").is_err());
    }

    #[test]
    fn parses_settle_durations() {
        assert_eq!(parse_settle("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_settle("2s").unwrap(), Duration::from_secs(2));
        assert!(parse_settle("0ms").is_err());
        assert!(parse_settle("soon").is_err());
    }

    #[test]
    fn antialias_flag_reuses_config_parser() {
        assert_eq!(
            effectcfg::parse_antialias("4").unwrap(),
            AntialiasSetting::Samples4
        );
        assert!(effectcfg::parse_antialias("5").is_err());
    }
}
