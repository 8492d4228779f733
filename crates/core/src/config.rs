use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Settings;

/// Configuration manager for engine settings
/// Separates the schema (what can be set, with ranges and descriptions) from
/// the persisted values. Settings live in `config.json` in the working
/// directory unless another path is given.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub engine: EngineConfigSchema,
    pub fixtures: FixturesConfigSchema,
    pub output: OutputConfigSchema,
    pub wheel: WheelConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigSchema {
    pub tick_rate_hz: ConfigOption<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturesConfigSchema {
    pub definitions_dir: ConfigOption<PathBuf>,
    pub include_builtin_definitions: ConfigOption<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub dmx_enabled: ConfigOption<bool>,
    pub dmx_broadcast: ConfigOption<bool>,
    pub dmx_source_ip: ConfigOption<String>,
    pub dmx_dest_ip: ConfigOption<String>,
    pub dmx_port: ConfigOption<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheelConfigSchema {
    pub wheel_safety_margin: ConfigOption<f64>,
    pub wheel_chaos_threshold: ConfigOption<u32>,
    pub wheel_latch_ms: ConfigOption<u64>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

impl<T> ConfigOption<T> {
    fn new(default: T, description: &str, requires_restart: bool) -> Self {
        ConfigOption {
            default,
            valid_range: None,
            valid_choices: None,
            description: description.to_string(),
            requires_restart,
        }
    }

    fn with_range(mut self, min: T, max: T) -> Self {
        self.valid_range = Some((min, max));
        self
    }
}

impl<T: PartialOrd + std::fmt::Display> ConfigOption<T> {
    fn check_range(&self, name: &str, value: &T, errors: &mut Vec<String>) {
        if let Some((min, max)) = &self.valid_range {
            if value < min || value > max {
                errors.push(format!("{} must be between {} and {}", name, min, max));
            }
        }
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'config.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from the configuration file, writing a default file first
    /// if none exists
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path).map_err(ConfigError::Read)?;
        let config_file: ConfigFile = serde_json::from_str(&content).map_err(ConfigError::Parse)?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match engine version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::Validation)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(ConfigError::Write)?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.read_created_at().unwrap_or_else(|| now.clone());
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file).map_err(ConfigError::Serialize)?;
        fs::write(&self.config_path, content).map_err(ConfigError::Write)?;

        Ok(())
    }

    /// Validate, then replace and save the settings
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();
        ConfigSchema {
            engine: EngineConfigSchema {
                tick_rate_hz: ConfigOption::new(
                    defaults.tick_rate_hz,
                    "DMX refresh rate in frames per second",
                    true,
                )
                .with_range(20, 44),
            },
            fixtures: FixturesConfigSchema {
                definitions_dir: ConfigOption::new(
                    defaults.definitions_dir,
                    "Directory scanned for *.json fixture definitions",
                    true,
                ),
                include_builtin_definitions: ConfigOption::new(
                    defaults.include_builtin_definitions,
                    "Add the built-in fixture catalog under the loaded definitions",
                    true,
                ),
            },
            output: OutputConfigSchema {
                dmx_enabled: ConfigOption::new(
                    defaults.dmx_enabled,
                    "Enable DMX output via Art-Net",
                    true,
                ),
                dmx_broadcast: ConfigOption::new(
                    defaults.dmx_broadcast,
                    "Use broadcast mode for Art-Net (vs unicast)",
                    true,
                ),
                dmx_source_ip: ConfigOption::new(
                    defaults.dmx_source_ip,
                    "Source IP address for Art-Net output",
                    true,
                ),
                dmx_dest_ip: ConfigOption::new(
                    defaults.dmx_dest_ip,
                    "Destination IP address for Art-Net unicast",
                    true,
                ),
                dmx_port: ConfigOption::new(defaults.dmx_port, "UDP port for Art-Net output", true)
                    .with_range(1024, 65535),
            },
            wheel: WheelConfigSchema {
                wheel_safety_margin: ConfigOption::new(
                    defaults.wheel_safety_margin,
                    "Multiplier on each color wheel's minimum dwell time",
                    false,
                )
                .with_range(1.0, 3.0),
                wheel_chaos_threshold: ConfigOption::new(
                    defaults.wheel_chaos_threshold,
                    "Wheel changes per second that latch the wheel (0 disables)",
                    false,
                ),
                wheel_latch_ms: ConfigOption::new(
                    defaults.wheel_latch_ms,
                    "How long a latched wheel holds its slot, in milliseconds",
                    false,
                )
                .with_range(0, 60_000),
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        schema
            .engine
            .tick_rate_hz
            .check_range("tick_rate_hz", &settings.tick_rate_hz, &mut errors);
        schema
            .output
            .dmx_port
            .check_range("dmx_port", &settings.dmx_port, &mut errors);
        schema.wheel.wheel_safety_margin.check_range(
            "wheel_safety_margin",
            &settings.wheel_safety_margin,
            &mut errors,
        );
        schema
            .wheel
            .wheel_latch_ms
            .check_range("wheel_latch_ms", &settings.wheel_latch_ms, &mut errors);

        if settings.dmx_source_ip.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!(
                "dmx_source_ip '{}' is not an IP address",
                settings.dmx_source_ip
            ));
        }
        if !settings.dmx_dest_ip.trim().is_empty()
            && settings.dmx_dest_ip.parse::<std::net::IpAddr>().is_err()
        {
            errors.push(format!(
                "dmx_dest_ip '{}' is not an IP address",
                settings.dmx_dest_ip
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }

    fn read_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        let existing: ConfigFile = serde_json::from_str(&content).ok()?;
        Some(existing.created_at)
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("Failed to write config file: {0}")]
    Write(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}
