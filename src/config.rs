use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub instrument: InstrumentConfig,
    pub transfer: TransferConfig,
    pub screenshot: ScreenshotConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InstrumentConfig {
    /// SCPI raw-socket endpoint, `host:port`.
    pub address: String,
    /// Channel response timeout in milliseconds.
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Fallback sweep point count when `SWE:POIN?` is unavailable.
    pub default_sweep_points: usize,
    /// Settling delay between measurement sub-steps. The instrument's
    /// internal state machine needs time to apply each marker function
    /// before the next command lands.
    pub settle_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransferConfig {
    /// Raised channel timeout during multi-step measurement sequences.
    pub measure_timeout_ms: u64,
    /// Raised channel timeout during remote file transfers.
    pub file_timeout_ms: u64,
    /// Per-read chunk size during remote file transfers.
    pub chunk_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScreenshotConfig {
    /// Candidate remote directories, most preferred first. Ordered
    /// configuration data: deployments with different instrument disk
    /// layouts replace this list without touching the retrieval code.
    pub remote_dirs: Vec<String>,
    /// Delay after the store command; the instrument needs time to finish
    /// writing before the file is queryable.
    pub settle_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instrument: InstrumentConfig::default(),
            transfer: TransferConfig::default(),
            screenshot: ScreenshotConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.75:5025".to_string(),
            timeout_ms: 5000,
            connect_timeout_ms: 5000,
            default_sweep_points: 1001,
            settle_ms: 500,
        }
    }
}

impl InstrumentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            measure_timeout_ms: 10_000,
            file_timeout_ms: 120_000,
            chunk_size: 1_048_576,
        }
    }
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            remote_dirs: vec![
                "D:\\Users\\Instrument\\Documents\\SA\\screen".to_string(),
                "SA\\screen".to_string(),
                "C:\\temp".to_string(),
                "D:\\".to_string(),
                "C:\\".to_string(),
            ],
            settle_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else if Path::new("config.toml").exists() {
        builder = builder.add_source(File::with_name("config.toml"));
    }

    // Environment variable overrides with prefix "RUSTY_SPAN_"
    builder = builder.add_source(
        Environment::with_prefix("RUSTY_SPAN")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize::<AppConfig>()
}

/// Load configuration with better error handling and defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}
