use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/texture-press.yaml";
pub const ENV_PREFIX: &str = "TEXTURE_PRESS";

// Custom deserializer for Duration that accepts integer seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub compressor: CompressorConfig,
    pub storage: StorageConfig,
    pub housekeeping: HousekeepingConfig,
    pub uploads: UploadConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// Location and limits of the external `basisu` executable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    pub binary_path: PathBuf,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl CompressorConfig {
    /// The compressor runs inside the request directory, so a relative path with
    /// a directory component is anchored at the server's working directory. Bare
    /// names are left for `PATH` lookup.
    pub fn resolved_binary(&self) -> PathBuf {
        let path = &self.binary_path;
        if path.is_relative() && path.components().count() > 1 {
            if let Ok(cwd) = std::env::current_dir() {
                return cwd.join(path);
            }
        }
        path.clone()
    }
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("basisu/basisu"),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Served at `/`, usually the built web client.
    pub public_dir: PathBuf,
    pub uploads_dir: PathBuf,
    /// Parent of the per-request output directories, served at `/preview`.
    pub preview_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            uploads_dir: PathBuf::from("public/uploads"),
            preview_dir: PathBuf::from("public/preview"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub upload_max_age: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub preview_max_age: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub sweep_interval: Duration,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            upload_max_age: Duration::from_secs(5 * 60),
            preview_max_age: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_size: u64,
    /// Pad non-conforming images to multiples of 4 instead of rejecting them.
    pub auto_pad: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1000 * 1000,
            auto_pad: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl Config {
    /// Layers an optional YAML file under `TEXTURE_PRESS__*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Same tree with every storage directory rooted under `root`.
    pub fn rooted_at(mut self, root: &std::path::Path) -> Self {
        self.storage.public_dir = root.join(&self.storage.public_dir);
        self.storage.uploads_dir = root.join(&self.storage.uploads_dir);
        self.storage.preview_dir = root.join(&self.storage.preview_dir);
        self
    }
}
