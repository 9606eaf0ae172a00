//! Configuration loading and persistence.
//!
//! Handles reading and writing the novalink configuration file. Both
//! endpoint addresses can also be overridden through environment
//! variables, which take precedence over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Default address of the binary audio stream.
pub const DEFAULT_AUDIO_URL: &str = "ws://localhost:5000/ws/audio";

/// Default address of the JSON emotion stream.
pub const DEFAULT_EMOTION_URL: &str = "ws://localhost:5000/ws/emotion";

/// Configuration for the stream receivers.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Address of the binary audio stream.
    pub audio_url: String,
    /// Address of the JSON emotion stream.
    pub emotion_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_url: DEFAULT_AUDIO_URL.to_string(),
            emotion_url: DEFAULT_EMOTION_URL.to_string(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `NOVALINK_CONFIG_DIR` env var: explicit override
    /// 2. Default: platform config dir (macOS: ~/Library/Application Support/novalink)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("NOVALINK_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("novalink")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    /// Falls back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(audio_url) = std::env::var("NOVALINK_AUDIO_URL") {
            self.audio_url = audio_url;
        }

        if let Ok(emotion_url) = std::env::var("NOVALINK_EMOTION_URL") {
            self.emotion_url = emotion_url;
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio_url, "ws://localhost:5000/ws/audio");
        assert_eq!(config.emotion_url, "ws://localhost:5000/ws/emotion");
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = Config {
            audio_url: "ws://example.com:9000/ws/audio".to_string(),
            emotion_url: "ws://example.com:9000/ws/emotion".to_string(),
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.audio_url, config.audio_url);
        assert_eq!(parsed.emotion_url, config.emotion_url);
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        // Config dir override is process-wide; restore it afterwards.
        let previous = std::env::var("NOVALINK_CONFIG_DIR").ok();
        std::env::set_var("NOVALINK_CONFIG_DIR", dir.path());

        let config = Config {
            audio_url: "ws://saved:5000/ws/audio".to_string(),
            emotion_url: "ws://saved:5000/ws/emotion".to_string(),
        };
        config.save().unwrap();

        let loaded = Config::load_from_file().unwrap();

        match previous {
            Some(value) => std::env::set_var("NOVALINK_CONFIG_DIR", value),
            None => std::env::remove_var("NOVALINK_CONFIG_DIR"),
        }

        assert_eq!(loaded.audio_url, "ws://saved:5000/ws/audio");
        assert_eq!(loaded.emotion_url, "ws://saved:5000/ws/emotion");
    }
}
