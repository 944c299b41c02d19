use std::fmt;
use std::path::PathBuf;
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

/// Root of `config.toml`. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub scene: SceneSettings,
    #[serde(default)]
    pub pointer: PointerSettings,
    #[serde(default)]
    pub presets: PresetSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            window: WindowSettings::default(),
            scene: SceneSettings::default(),
            pointer: PointerSettings::default(),
            presets: PresetSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSettings {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub fps: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    #[serde(default)]
    pub color_space: Option<ColorSpaceSetting>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: None,
            antialias: None,
            color_space: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SceneSettings {
    pub shader: Option<String>,
    pub geometry: Option<GeometrySetting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometrySetting {
    Plane,
    Sphere,
    Torus,
    Box,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceSetting {
    Auto,
    Gamma,
    Linear,
}

/// Tuning for the pointer tracker's velocity estimate.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PointerSettings {
    /// Velocity magnitude ceiling in uv units per second.
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    /// Blend factor between the previous and the freshly measured velocity.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Per-frame velocity multiplier once the pointer stops moving.
    #[serde(default = "default_decay")]
    pub decay: f32,
    /// Magnitude under which decay stops republishing.
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
    #[serde(
        default = "default_min_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub min_interval: Duration,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            smoothing: default_smoothing(),
            decay: default_decay(),
            epsilon: default_epsilon(),
            min_interval: default_min_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PresetSettings {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportSettings {
    pub directory: Option<PathBuf>,
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
}

fn default_version() -> u32 {
    1
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_max_speed() -> f32 {
    10.0
}

fn default_smoothing() -> f32 {
    0.5
}

fn default_decay() -> f32 {
    0.95
}

fn default_epsilon() -> f32 {
    0.001
}

fn default_min_interval() -> Duration {
    Duration::from_millis(1)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer).map(|d| d.unwrap_or(default_min_interval()))
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
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

/// Parses the user-facing antialias spelling shared by the config file and the CLI.
pub fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl LabConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LabConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Frame cap in frames per second; zero or absent means uncapped.
    pub fn target_fps(&self) -> Option<f32> {
        self.window.fps.filter(|fps| *fps > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        if let Some(fps) = self.window.fps {
            if fps < 0.0 {
                return Err(ConfigError::Invalid("window.fps must be >= 0".into()));
            }
        }

        if let Some(shader) = &self.scene.shader {
            if shader.trim().is_empty() {
                return Err(ConfigError::Invalid("scene.shader may not be empty".into()));
            }
        }

        let pointer = &self.pointer;
        if pointer.max_speed <= 0.0 {
            return Err(ConfigError::Invalid(
                "pointer.max_speed must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&pointer.smoothing) {
            return Err(ConfigError::Invalid(
                "pointer.smoothing must be within [0, 1]".into(),
            ));
        }
        if !(0.0..1.0).contains(&pointer.decay) {
            return Err(ConfigError::Invalid(
                "pointer.decay must be within [0, 1)".into(),
            ));
        }
        if pointer.epsilon < 0.0 {
            return Err(ConfigError::Invalid("pointer.epsilon must be >= 0".into()));
        }
        if pointer.min_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "pointer.min_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
width = 1600
height = 900
fps = 60
antialias = 4
color_space = "linear"

[scene]
shader = "ripple"
geometry = "torus"

[pointer]
max_speed = 12.5
decay = 0.9
min_interval = "2ms"

[presets]
file = "/tmp/presets"

[export]
directory = "/tmp/exports"
"#;

    #[test]
    fn parses_sample_config() {
        let config = LabConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 1600);
        assert_eq!(config.target_fps(), Some(60.0));
        assert_eq!(config.window.antialias, Some(AntialiasSetting::Samples4));
        assert_eq!(config.window.color_space, Some(ColorSpaceSetting::Linear));
        assert_eq!(config.scene.shader.as_deref(), Some("ripple"));
        assert_eq!(config.scene.geometry, Some(GeometrySetting::Torus));
        assert_eq!(config.pointer.max_speed, 12.5);
        assert_eq!(config.pointer.smoothing, 0.5);
        assert_eq!(config.pointer.min_interval, Duration::from_millis(2));
        assert_eq!(
            config.export.directory.as_deref(),
            Some(std::path::Path::new("/tmp/exports"))
        );
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = LabConfig::from_toml_str("").expect("parse config");
        assert_eq!(config.version, 1);
        assert_eq!((config.window.width, config.window.height), (1280, 720));
        assert_eq!(config.pointer, PointerSettings::default());
        assert_eq!(config.pointer.min_interval, Duration::from_millis(1));
        assert!(config.target_fps().is_none());
    }

    #[test]
    fn zero_fps_treated_as_uncapped() {
        let config = LabConfig::from_toml_str("[window]\nfps = 0\n").unwrap();
        assert_eq!(config.target_fps(), None, "fps=0 should map to uncapped");
    }

    #[test]
    fn rejects_unknown_version() {
        let err = LabConfig::from_toml_str("version = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_decay_outside_unit_interval() {
        let err = LabConfig::from_toml_str("[pointer]\ndecay = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_antialias() {
        let err = LabConfig::from_toml_str("[window]\nantialias = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn numeric_interval_is_seconds() {
        let config = LabConfig::from_toml_str("[pointer]\nmin_interval = 0.5\n").unwrap();
        assert_eq!(config.pointer.min_interval, Duration::from_millis(500));
    }
}
