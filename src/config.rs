use crate::defaults;
use crate::error::{PendantError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub transfer: TransferConfig,
    pub host: HostConfig,
}

/// Peripheral-side recording and storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub storage_dir: PathBuf,
    pub sample_rate: u32,
    pub chunk_duration_s: u64,
    pub write_buf_bytes: usize,
}

/// Transfer protocol pacing and batching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    pub max_chunks_per_pass: usize,
    pub packet_delay_ms: u64,
    pub header_settle_ms: u64,
    pub chunk_delay_ms: u64,
}

/// Host-side receive, analysis, and stitching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    pub chunk_dir: PathBuf,
    pub conversation_dir: PathBuf,
    pub silence_threshold_db: f32,
    pub conversation_gap_s: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("chunks"),
            sample_rate: defaults::SAMPLE_RATE,
            chunk_duration_s: defaults::CHUNK_DURATION_S,
            write_buf_bytes: defaults::WRITE_BUF_BYTES,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_pass: defaults::MAX_CHUNKS_PER_PASS,
            packet_delay_ms: defaults::PACKET_DELAY_MS,
            header_settle_ms: defaults::HEADER_SETTLE_MS,
            chunk_delay_ms: defaults::CHUNK_DELAY_MS,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            chunk_dir: PathBuf::from("received"),
            conversation_dir: PathBuf::from("conversations"),
            silence_threshold_db: defaults::SILENCE_THRESHOLD_DB,
            conversation_gap_s: defaults::CONVERSATION_GAP_S,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is still
    /// an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(PendantError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PENDANT_STORAGE_DIR → device.storage_dir
    /// - PENDANT_CHUNK_DIR → host.chunk_dir
    /// - PENDANT_CONVERSATION_DIR → host.conversation_dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("PENDANT_STORAGE_DIR") {
            if !dir.is_empty() {
                self.device.storage_dir = PathBuf::from(dir);
            }
        }

        if let Ok(dir) = std::env::var("PENDANT_CHUNK_DIR") {
            if !dir.is_empty() {
                self.host.chunk_dir = PathBuf::from(dir);
            }
        }

        if let Ok(dir) = std::env::var("PENDANT_CONVERSATION_DIR") {
            if !dir.is_empty() {
                self.host.conversation_dir = PathBuf::from(dir);
            }
        }

        self
    }

    /// Rejects values that would wedge the pipeline rather than tune it.
    pub fn validate(&self) -> Result<()> {
        if self.device.sample_rate == 0 {
            return Err(invalid("device.sample_rate", "must be nonzero"));
        }
        if self.device.chunk_duration_s == 0 {
            return Err(invalid("device.chunk_duration_s", "must be nonzero"));
        }
        if self.device.write_buf_bytes < 3 {
            // Smaller than one length prefix plus one byte of frame.
            return Err(invalid("device.write_buf_bytes", "too small to hold a frame"));
        }
        if self.transfer.max_chunks_per_pass == 0 {
            return Err(invalid("transfer.max_chunks_per_pass", "must be nonzero"));
        }
        if self.host.conversation_gap_s == 0 {
            return Err(invalid("host.conversation_gap_s", "must be nonzero"));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/pendant/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pendant")
            .join("config.toml")
    }
}

fn invalid(key: &str, message: &str) -> PendantError {
    PendantError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set_env(key: &str, value: &str) {
        std::env::set_var(key, value)
    }

    fn remove_env(key: &str) {
        std::env::remove_var(key)
    }

    fn clear_pendant_env() {
        remove_env("PENDANT_STORAGE_DIR");
        remove_env("PENDANT_CHUNK_DIR");
        remove_env("PENDANT_CONVERSATION_DIR");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.device.sample_rate, 16_000);
        assert_eq!(config.device.chunk_duration_s, 15);
        assert_eq!(config.device.write_buf_bytes, 4096);

        assert_eq!(config.transfer.max_chunks_per_pass, 64);
        assert_eq!(config.transfer.packet_delay_ms, 8);
        assert_eq!(config.transfer.header_settle_ms, 10);
        assert_eq!(config.transfer.chunk_delay_ms, 20);

        assert_eq!(config.host.silence_threshold_db, -40.0);
        assert_eq!(config.host.conversation_gap_s, 120);
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [device]
            storage_dir = "/var/lib/pendant/chunks"
            sample_rate = 8000
            chunk_duration_s = 30
            write_buf_bytes = 8192

            [transfer]
            max_chunks_per_pass = 32
            packet_delay_ms = 4

            [host]
            silence_threshold_db = -35.0
            conversation_gap_s = 60
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(
            config.device.storage_dir,
            PathBuf::from("/var/lib/pendant/chunks")
        );
        assert_eq!(config.device.sample_rate, 8000);
        assert_eq!(config.device.chunk_duration_s, 30);
        assert_eq!(config.device.write_buf_bytes, 8192);

        assert_eq!(config.transfer.max_chunks_per_pass, 32);
        assert_eq!(config.transfer.packet_delay_ms, 4);
        // Unspecified fields keep defaults
        assert_eq!(config.transfer.header_settle_ms, 10);

        assert_eq!(config.host.silence_threshold_db, -35.0);
        assert_eq!(config.host.conversation_gap_s, 60);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [host]
            conversation_gap_s = 90
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.host.conversation_gap_s, 90);
        assert_eq!(config.device, DeviceConfig::default());
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[test]
    fn test_env_override_storage_dir() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_pendant_env();

        set_env("PENDANT_STORAGE_DIR", "/tmp/pendant-test");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.device.storage_dir, PathBuf::from("/tmp/pendant-test"));
        assert_eq!(config.host.chunk_dir, PathBuf::from("received"));

        clear_pendant_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_pendant_env();

        set_env("PENDANT_STORAGE_DIR", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.device.storage_dir, PathBuf::from("chunks"));

        clear_pendant_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [device
            storage_dir = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let toml_content = r#"
            [device]
            chunk_duration_s = 0
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(PendantError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_pendant_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_still_errors_on_invalid_toml() {
        let invalid_toml = r#"
            [device
            storage_dir = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("pendant"));
        assert!(path_str.ends_with("config.toml"));
    }
}
