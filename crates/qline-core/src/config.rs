//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/qline/config.toml)
//! 3. Environment variables (QLINE_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "QLINE";

/// Server used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the queue service (scheme + host, no trailing `/api`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory for local data (stored token, debug log)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log file for the live view (defaults to `<data_dir>/debug.log`)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// First delay before reconnecting the update channel
    #[serde(default = "default_reconnect_initial_secs")]
    pub reconnect_initial_secs: u64,

    /// Upper bound for the update channel reconnect delay
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,

    /// Fixed UTC offset for rendered timestamps; system local time when unset
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            data_dir: default_data_dir(),
            log_file: None,
            reconnect_initial_secs: default_reconnect_initial_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
            utc_offset_minutes: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (QLINE_BASE_URL, QLINE_DATA_DIR)
    /// 2. Config file (~/.config/qline/config.toml or QLINE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // QLINE_BASE_URL
        if let Ok(val) = std::env::var(format!("{}_BASE_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.base_url = val;
            }
        }

        // QLINE_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with QLINE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qline")
            .join("config.toml")
    }

    /// Path of the stored bearer token
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("token")
    }

    /// Path of the live view debug log
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }

    /// URL of the server-sent update stream
    pub fn updates_url(&self) -> String {
        format!("{}/api/queue/updates", self.base_url.trim_end_matches('/'))
    }

    pub fn reconnect_initial_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_initial_secs.max(1))
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs.max(self.reconnect_initial_secs).max(1))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qline")
}

fn default_reconnect_initial_secs() -> u64 {
    1
}

fn default_reconnect_max_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &["QLINE_BASE_URL", "QLINE_DATA_DIR"];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.data_dir.ends_with("qline"));
        assert_eq!(config.reconnect_initial_delay(), Duration::from_secs(1));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(30));
        assert!(config.utc_offset_minutes.is_none());
    }

    #[test]
    fn test_file_paths() {
        let config = Config {
            data_dir: PathBuf::from("/data/qline"),
            ..Config::default()
        };

        assert_eq!(config.token_path(), PathBuf::from("/data/qline/token"));
        assert_eq!(config.log_path(), PathBuf::from("/data/qline/debug.log"));

        let config = Config {
            log_file: Some(PathBuf::from("/tmp/q.log")),
            ..config
        };
        assert_eq!(config.log_path(), PathBuf::from("/tmp/q.log"));
    }

    #[test]
    fn test_updates_url_trims_slash() {
        let config = Config {
            base_url: "https://queues.example.com/".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.updates_url(),
            "https://queues.example.com/api/queue/updates"
        );
    }

    #[test]
    fn test_reconnect_max_never_below_initial() {
        let config = Config {
            reconnect_initial_secs: 10,
            reconnect_max_secs: 2,
            ..Config::default()
        };
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_env_override_base_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("QLINE_BASE_URL", "http://queue.local:8080");
        config.apply_env_overrides();
        assert_eq!(config.base_url, "http://queue.local:8080");

        // Empty string keeps the current value
        env::set_var("QLINE_BASE_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.base_url, "http://queue.local:8080");
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("QLINE_DATA_DIR", "/tmp/qline-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/qline-test"));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            base_url = "https://q.example.com"
            data_dir = "/custom/data"
            reconnect_max_secs = 60
            utc_offset_minutes = 180
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.base_url, "https://q.example.com");
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.reconnect_max_delay(), Duration::from_secs(60));
        assert_eq!(config.reconnect_initial_delay(), Duration::from_secs(1));
        assert_eq!(config.utc_offset_minutes, Some(180));
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            base_url: "http://saved.example.com".to_string(),
            data_dir: temp_dir.path().join("data"),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.base_url, "http://saved.example.com");
        assert!(loaded.data_dir.exists());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("QLINE_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
