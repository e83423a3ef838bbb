use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per cache key
    pub cache_root: PathBuf,
    /// Fixed overlay clip composited onto every source image
    pub overlay_clip: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub ffmpeg_command: String,
    pub ffprobe_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/cache.db".to_string(),
                max_connections: Some(10),
            },
            storage: StorageConfig {
                cache_root: PathBuf::from("./data/cache"),
                overlay_clip: PathBuf::from("./assets/overlay.mp4"),
            },
            render: RenderConfig {
                ffmpeg_command: "ffmpeg".to_string(),
                ffprobe_command: "ffprobe".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::create_dir_all("./data/cache")?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}
