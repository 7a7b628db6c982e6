use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the short-clip generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortsConfig {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// Staging directory for raw downloads
    pub staging_dir: PathBuf,
    /// Public directory holding rendered clips
    pub output_dir: PathBuf,
    /// URL prefix under which `output_dir` is served (e.g. "/static/outputs")
    pub public_prefix: String,
    /// Landing page served at `/`
    pub index_page: PathBuf,
    /// Path to yt-dlp binary
    pub ytdlp_bin: PathBuf,
    /// Path to ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_bin: PathBuf,
}

impl Default for ShortsConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ShortsConfig {
    /// Create a default configuration with process-relative directories
    pub fn default_config() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            staging_dir: PathBuf::from("downloads"),
            output_dir: PathBuf::from("static/outputs"),
            public_prefix: "/static/outputs".to_string(),
            index_page: PathBuf::from("templates/index.html"),
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }

    /// Create the staging and output directories if they are missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.staging_dir, &self.output_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// Public URL for a file in the output directory
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), file_name)
    }
}
