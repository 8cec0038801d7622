use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use imgfetch_core::OverlapPolicy;
use imgfetch_engine::{DecodeLimits, EngineSettings, FetchSettings};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logging::LogDestination;

const CONFIG_FILENAME: &str = "imgfetch.ron";
const CONFIG_ENV: &str = "IMGFETCH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid {key} in {path:?}: must be greater than zero")]
    Invalid { path: PathBuf, key: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverlapSetting {
    #[default]
    Supersede,
    Independent,
}

/// Settings read from `imgfetch.ron`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_destination: LogDestination,
    pub log_level: LogLevel,
    pub overlap_policy: OverlapSetting,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub flow_timeout_ms: u64,
    pub max_bytes: u64,
    pub redirect_limit: usize,
    pub max_image_dimension: u32,
    pub max_display_side: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            log_destination: LogDestination::default(),
            log_level: LogLevel::default(),
            overlap_policy: OverlapSetting::default(),
            connect_timeout_ms: engine.fetch.connect_timeout.as_millis() as u64,
            request_timeout_ms: engine.fetch.request_timeout.as_millis() as u64,
            flow_timeout_ms: engine.flow_timeout.as_millis() as u64,
            max_bytes: engine.fetch.max_bytes,
            redirect_limit: engine.fetch.redirect_limit,
            max_image_dimension: engine.decode.max_width,
            max_display_side: engine.decode.max_output_side,
        }
    }
}

impl AppConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            fetch: FetchSettings {
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
                redirect_limit: self.redirect_limit,
                max_bytes: self.max_bytes,
            },
            decode: DecodeLimits {
                max_width: self.max_image_dimension,
                max_height: self.max_image_dimension,
                max_output_side: self.max_display_side,
            },
            flow_timeout: Duration::from_millis(self.flow_timeout_ms),
        }
    }

    /// Name of the first setting that would make every flow fail.
    fn first_zero_setting(&self) -> Option<&'static str> {
        [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("flow_timeout_ms", self.flow_timeout_ms),
            ("max_bytes", self.max_bytes),
            ("max_image_dimension", u64::from(self.max_image_dimension)),
            ("max_display_side", u64::from(self.max_display_side)),
        ]
        .into_iter()
        .find_map(|(key, value)| (value == 0).then_some(key))
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        match self.overlap_policy {
            OverlapSetting::Supersede => OverlapPolicy::Supersede,
            OverlapSetting::Independent => OverlapPolicy::Independent,
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        match self.log_level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// `$IMGFETCH_CONFIG` if set, otherwise `./imgfetch.ron`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".").join(CONFIG_FILENAME))
}

/// A missing file yields the defaults. A zero timeout, size or dimension is
/// rejected; `redirect_limit: 0` is allowed and disables redirects.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config: AppConfig = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(key) = config.first_zero_setting() {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            key,
        });
    }
    Ok(config)
}
