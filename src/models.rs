//! Configuration model for the daemon.

use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error parsing config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("error serializing config: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Behavior of the light entity itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct LightConfig {
    /// Friendly name of the light
    pub name: String,
    /// Duration of a brightness or color transition
    #[validate(range(min = 1))]
    pub transition_duration_ms: u32,
    /// Interpolation and render tick period
    #[validate(range(min = 1))]
    pub frame_duration_ms: u32,
    /// Whether the effect list is announced and accepted
    pub supports_effects: bool,
    /// Whether availability announcements and the last will are used
    pub supports_availability: bool,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            name: "light".to_owned(),
            transition_duration_ms: 500,
            frame_duration_ms: 30,
            supports_effects: true,
            supports_availability: true,
        }
    }
}

/// Topic layout on the message bus: one base topic with fixed suffixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct TopicsConfig {
    pub base: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            base: "strandlight/light".to_owned(),
        }
    }
}

impl TopicsConfig {
    pub fn command(&self) -> String {
        format!("{}/set", self.base)
    }

    pub fn state(&self) -> String {
        format!("{}/state", self.base)
    }

    pub fn availability(&self) -> String {
        format!("{}/availability", self.base)
    }
}

/// Output modes of the dummy device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DummyDeviceMode {
    Text,
    Ansi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Dummy {
    #[validate(range(min = 1))]
    pub led_count: u32,
    pub mode: DummyDeviceMode,
}

impl Default for Dummy {
    fn default() -> Self {
        Self {
            led_count: 100,
            mode: DummyDeviceMode::Ansi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct File {
    #[validate(range(min = 1))]
    pub led_count: u32,
    pub output: PathBuf,
    pub print_timestamp: bool,
}

impl Default for File {
    fn default() -> Self {
        Self {
            led_count: 100,
            output: PathBuf::from("strandlight-leds.txt"),
            print_timestamp: false,
        }
    }
}

/// Physical strip driver config. Driving hardware is an external concern,
/// so building this device reports it as unsupported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Ws2812Spi {
    #[validate(range(min = 1))]
    pub led_count: u32,
    pub device: PathBuf,
}

impl Default for Ws2812Spi {
    fn default() -> Self {
        Self {
            led_count: 100,
            device: PathBuf::from("/dev/spidev0.0"),
        }
    }
}

/// Pixel device selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum DeviceConfig {
    Dummy(Dummy),
    File(File),
    Ws2812Spi(Ws2812Spi),
}

impl DeviceConfig {
    pub fn led_count(&self) -> usize {
        match self {
            Self::Dummy(dummy) => dummy.led_count as _,
            Self::File(file) => file.led_count as _,
            Self::Ws2812Spi(spi) => spi.led_count as _,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::Dummy(Dummy::default())
    }
}

/// Effect storage location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct EffectsConfig {
    pub path: PathBuf,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("effects"),
        }
    }
}

/// JSON TCP bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub enable: bool,
    pub address: String,
    #[validate(range(min = 1024))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enable: true,
            address: "127.0.0.1".to_owned(),
            port: 19450,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[validate(nested)]
    pub light: LightConfig,
    #[validate(nested)]
    pub topics: TopicsConfig,
    pub device: DeviceConfig,
    #[validate(nested)]
    pub effects: EffectsConfig,
    #[validate(nested)]
    pub server: ServerConfig,
}

impl Config {
    /// Load and validate a TOML config file.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the config back to TOML, for `--dump-config`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.light.transition_duration_ms, 500);
        assert_eq!(config.light.frame_duration_ms, 30);
        assert_eq!(config.device.led_count(), 100);
    }

    #[test]
    fn test_topic_suffixes() {
        let topics = TopicsConfig::default();

        assert_eq!(topics.command(), "strandlight/light/set");
        assert_eq!(topics.state(), "strandlight/light/state");
        assert_eq!(topics.availability(), "strandlight/light/availability");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_parse_device_section() {
        let config: Config = toml::from_str(
            r#"
            [device]
            type = "file"
            led_count = 10
            output = "out.txt"
            "#,
        )
        .unwrap();

        match config.device {
            DeviceConfig::File(ref file) => {
                assert_eq!(file.led_count, 10);
                assert_eq!(file.output, PathBuf::from("out.txt"));
            }
            ref other => panic!("unexpected device config: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("[light]\nbogus = 1\n").is_err());
    }
}
