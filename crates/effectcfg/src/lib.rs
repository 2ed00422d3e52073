//! TOML configuration for the chromaglass distortion viewer.
//!
//! The file describes everything the binary needs to run without flags: the
//! source image, surface size, oscillator parameters for the animated
//! distortion, the color-separation strength, and the resize settle timeout.
//! CLI flags override individual fields after loading.

use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EffectConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Source image: a local path or an http(s) URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Frame-rate cap; 0 or absent means uncapped.
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub pointer: PointerConfig,
    #[serde(default)]
    pub distortion: DistortionConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub resize: ResizeConfig,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            image: None,
            fps: None,
            antialias: None,
            surface: SurfaceConfig::default(),
            pointer: PointerConfig::default(),
            distortion: DistortionConfig::default(),
            animation: AnimationConfig::default(),
            resize: ResizeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_surface_width")]
    pub width: u32,
    #[serde(default = "default_surface_height")]
    pub height: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: default_surface_width(),
            height: default_surface_height(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PointerConfig {
    /// Normalized bottom-left-origin position used before the cursor first
    /// enters the window.
    #[serde(default = "default_pointer_initial")]
    pub initial: [f32; 2],
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            initial: default_pointer_initial(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct DistortionConfig {
    /// Base color separation before the pointer-distance falloff is applied.
    #[serde(default = "default_separation")]
    pub separation: f32,
    /// Horizontal drift speed. Zero freezes the drift term entirely.
    #[serde(default)]
    pub drift: f32,
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            separation: default_separation(),
            drift: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct AnimationConfig {
    #[serde(default = "OscillatorConfig::frequency_default")]
    pub frequency: OscillatorConfig,
    #[serde(default = "OscillatorConfig::amplitude_default")]
    pub amplitude: OscillatorConfig,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            frequency: OscillatorConfig::frequency_default(),
            amplitude: OscillatorConfig::amplitude_default(),
        }
    }
}

/// Parameters for `base + depth * wave(rate * t_ms)`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct OscillatorConfig {
    pub base: f32,
    pub depth: f32,
    /// Radians per millisecond of elapsed animation time.
    pub rate: f32,
}

impl OscillatorConfig {
    fn frequency_default() -> Self {
        Self {
            base: 10.0,
            depth: 2.0,
            rate: 0.0007,
        }
    }

    fn amplitude_default() -> Self {
        Self {
            base: 0.05,
            depth: 0.03,
            rate: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ResizeConfig {
    /// Quiet period a resize burst must observe before dimensions commit.
    #[serde(
        default = "default_settle",
        deserialize_with = "deserialize_duration"
    )]
    pub settle: Duration,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            settle: default_settle(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples2,
    Samples4,
    Samples8,
    Samples16,
}

impl AntialiasSetting {
    pub fn from_samples(samples: u32) -> Option<Self> {
        match samples {
            0 | 1 => Some(Self::Off),
            2 => Some(Self::Samples2),
            4 => Some(Self::Samples4),
            8 => Some(Self::Samples8),
            16 => Some(Self::Samples16),
            _ => None,
        }
    }

    pub fn samples(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::Off => Some(1),
            Self::Samples2 => Some(2),
            Self::Samples4 => Some(4),
            Self::Samples8 => Some(8),
            Self::Samples16 => Some(16),
        }
    }
}

pub fn parse_antialias(value: &str) -> Result<AntialiasSetting, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" => Err("anti-alias mode must not be empty".to_string()),
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" => Ok(AntialiasSetting::Off),
        _ => {
            let samples: u32 = normalized.parse().map_err(|_| {
                format!("invalid anti-alias sample count '{value}'; use auto/off or 2/4/8/16")
            })?;
            AntialiasSetting::from_samples(samples).ok_or_else(|| {
                format!("unsupported sample count {samples}; supported values are 2, 4, 8, or 16")
            })
        }
    }
}

impl EffectConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: EffectConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if self.surface.width == 0 || self.surface.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "surface size must be non-zero, got {}x{}",
                self.surface.width, self.surface.height
            )));
        }
        for (axis, value) in [("x", self.pointer.initial[0]), ("y", self.pointer.initial[1])] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "initial pointer {axis} must lie in [0, 1], got {value}"
                )));
            }
        }
        if !self.distortion.separation.is_finite() || self.distortion.separation < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "separation must be a non-negative finite value, got {}",
                self.distortion.separation
            )));
        }
        if !self.distortion.drift.is_finite() {
            return Err(ConfigError::Invalid("drift must be finite".to_string()));
        }
        for (name, osc) in [
            ("frequency", self.animation.frequency),
            ("amplitude", self.animation.amplitude),
        ] {
            if !osc.base.is_finite() || !osc.depth.is_finite() || !osc.rate.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "{name} oscillator parameters must be finite"
                )));
            }
            if osc.rate <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} oscillator rate must be positive, got {}",
                    osc.rate
                )));
            }
            if osc.depth < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} oscillator depth must be non-negative, got {}",
                    osc.depth
                )));
            }
        }
        if self.resize.settle.is_zero() {
            return Err(ConfigError::Invalid(
                "resize settle duration must be greater than zero".to_string(),
            ));
        }
        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "fps must be a non-negative finite value, got {fps}"
                )));
            }
        }
        Ok(())
    }
}

fn default_version() -> u32 {
    1
}

fn default_surface_width() -> u32 {
    500
}

fn default_surface_height() -> u32 {
    400
}

fn default_pointer_initial() -> [f32; 2] {
    [0.5, 0.5]
}

fn default_separation() -> f32 {
    0.02
}

fn default_settle() -> Duration {
    Duration::from_millis(100)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as seconds or a human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            Some(parse_antialias(&value.to_string()).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
image = "https://example.com/picture.jpg"
fps = 60
antialias = 4

[surface]
width = 800
height = 600

[pointer]
initial = [0.25, 0.75]

[distortion]
separation = 0.03
drift = 0.5

[animation.frequency]
base = 9.0
depth = 1.0
rate = 0.0005

[animation.amplitude]
base = 0.04
depth = 0.02
rate = 0.002

[resize]
settle = "250ms"
"#;

    #[test]
    fn parses_full_config() {
        let config = EffectConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.image.as_deref(), Some("https://example.com/picture.jpg"));
        assert_eq!(config.fps, Some(60.0));
        assert_eq!(config.antialias, Some(AntialiasSetting::Samples4));
        assert_eq!(config.surface.width, 800);
        assert_eq!(config.surface.height, 600);
        assert_eq!(config.pointer.initial, [0.25, 0.75]);
        assert_eq!(config.distortion.separation, 0.03);
        assert_eq!(config.distortion.drift, 0.5);
        assert_eq!(config.animation.frequency.base, 9.0);
        assert_eq!(config.animation.amplitude.rate, 0.002);
        assert_eq!(config.resize.settle, Duration::from_millis(250));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = EffectConfig::from_toml_str("").expect("defaults parse");
        assert_eq!(config.version, 1);
        assert_eq!(config.surface.width, 500);
        assert_eq!(config.surface.height, 400);
        assert_eq!(config.pointer.initial, [0.5, 0.5]);
        assert_eq!(config.distortion.separation, 0.02);
        assert_eq!(config.distortion.drift, 0.0);
        assert_eq!(config.animation.frequency.base, 10.0);
        assert_eq!(config.animation.amplitude.depth, 0.03);
        assert_eq!(config.resize.settle, Duration::from_millis(100));
        assert_eq!(config.image, None);
    }

    #[test]
    fn settle_accepts_bare_seconds() {
        let config = EffectConfig::from_toml_str("[resize]\nsettle = 2\n").unwrap();
        assert_eq!(config.resize.settle, Duration::from_secs(2));
    }

    #[test]
    fn rejects_zero_surface() {
        let err = EffectConfig::from_toml_str("[surface]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_pointer_outside_unit_square() {
        let err = EffectConfig::from_toml_str("[pointer]\ninitial = [1.5, 0.5]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_separation() {
        let err = EffectConfig::from_toml_str("[distortion]\nseparation = -0.01\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_oscillator_rate() {
        let err = EffectConfig::from_toml_str(
            "[animation.frequency]\nbase = 10.0\ndepth = 2.0\nrate = 0.0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_settle() {
        let err = EffectConfig::from_toml_str("[resize]\nsettle = \"0s\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn antialias_accepts_strings_and_numbers() {
        assert_eq!(parse_antialias("auto").unwrap(), AntialiasSetting::Auto);
        assert_eq!(parse_antialias("off").unwrap(), AntialiasSetting::Off);
        assert_eq!(parse_antialias("8").unwrap(), AntialiasSetting::Samples8);
        assert!(parse_antialias("3").is_err());

        let config = EffectConfig::from_toml_str("antialias = \"off\"\n").unwrap();
        assert_eq!(config.antialias, Some(AntialiasSetting::Off));
    }
}
