// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CONFIG_ENV: &str = "WORKSHOP_CONFIG";

/// Platform the client talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Filesystem emulator rooted at `platform_root`
    #[default]
    Local,
    /// Steamworks SDK (needs the `steam` feature)
    Steam,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "steam" => Ok(Backend::Steam),
            other => Err(anyhow::anyhow!("Unknown backend '{other}' (expected local or steam)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application id items are published under
    pub app_id: u32,

    /// Root directory of the local platform (private storage, items, subscriptions)
    pub platform_root: PathBuf,

    /// Directory subscribed item content is downloaded into
    pub content_dir: PathBuf,

    /// Delay between a successful publish and the thumbnail attach, in milliseconds
    pub thumbnail_delay_ms: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Platform backend
    pub backend: Backend,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration, resolving environment variables through `lookup`
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config_path = lookup(CONFIG_ENV).unwrap_or_else(|| "config.toml".to_string());
        let mut config = Self::from_file(Path::new(&config_path))?;
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    /// Read a TOML file, falling back to defaults when it does not exist
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(val) = lookup("WORKSHOP_APP_ID") {
            self.app_id = val.parse()?;
        }
        if let Some(val) = lookup("WORKSHOP_PLATFORM_ROOT") {
            self.platform_root = PathBuf::from(val);
        }
        if let Some(val) = lookup("WORKSHOP_CONTENT_DIR") {
            self.content_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("WORKSHOP_THUMBNAIL_DELAY_MS") {
            self.thumbnail_delay_ms = val.parse()?;
        }
        if let Some(val) = lookup("WORKSHOP_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Some(val) = lookup("WORKSHOP_BACKEND") {
            self.backend = val.parse()?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: 480,
            platform_root: PathBuf::from("workshop-data"),
            content_dir: PathBuf::from("content"),
            thumbnail_delay_ms: 1000,
            log_level: String::from("info"),
            backend: Backend::Local,
        }
    }
}
