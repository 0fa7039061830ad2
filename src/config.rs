use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_TRANSFER_BYTES: u64 = 90 * 1024 * 1024;
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 4;

/// Limits applied to every transfer, persisted as `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deadline for connecting and for all I/O on each channel.
    pub timeout_secs: u64,
    /// Upper bound on bytes read from any data channel.
    pub max_transfer_bytes: u64,
    pub parallel_downloads: usize,
    /// Expected SHA256 fingerprint of SFTP host keys; unset accepts any key.
    pub sftp_host_fingerprint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_transfer_bytes: DEFAULT_MAX_TRANSFER_BYTES,
            parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
            sftp_host_fingerprint: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "ftp-bridge", "ftp-bridge")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_transfer_bytes, 94_371_840);
        assert_eq!(config.parallel_downloads, 4);
        assert_eq!(config.sftp_host_fingerprint, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_transfer_bytes, DEFAULT_MAX_TRANSFER_BYTES);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = Config {
            timeout_secs: 12,
            max_transfer_bytes: 1024,
            parallel_downloads: 2,
            sftp_host_fingerprint: Some("SHA256:abc".to_string()),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }
}
