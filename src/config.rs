//! Client configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$SECMAIL_CONFIG` (environment variable)
//! 2. `~/.config/secmail/config.toml` (Linux), the platform config dir elsewhere
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    APP_DIR_NAME, CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS, SESSION_FILE_NAME,
};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the secmail server; API paths are appended to it.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Optional proxy for all requests.
    pub proxy_url: Option<String>,
    /// Override for the persisted session file.
    pub session_file: Option<PathBuf>,
    /// Ask the server whether a restored address is still alive.
    pub validate_on_restore: bool,
    /// Delay between inbox polls in `watch`.
    pub poll_interval_secs: u64,
    /// Messages requested per page.
    pub page_size: u32,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy_url: None,
            session_file: None,
            validate_on_restore: true,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Where the session is persisted between runs.
    pub fn session_file_path(&self) -> PathBuf {
        if let Some(ref path) = self.session_file {
            return path.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join(SESSION_FILE_NAME)
    }
}

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from an explicit file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert!(cfg.validate_on_restore);
        assert_eq!(cfg.page_size, 20);
        assert_eq!(cfg.log_level, "warn");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
base_url = "https://mail.example.com"
validate_on_restore = false
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.base_url, "https://mail.example.com");
        assert!(!cfg.validate_on_restore);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn test_session_file_override() {
        let cfg = Config {
            session_file: Some(PathBuf::from("/tmp/secmail-test/session.json")),
            ..Config::default()
        };
        assert_eq!(
            cfg.session_file_path(),
            PathBuf::from("/tmp/secmail-test/session.json")
        );
        assert!(Config::default()
            .session_file_path()
            .ends_with(Path::new(APP_DIR_NAME).join(SESSION_FILE_NAME)));
    }

    #[test]
    fn test_load_from_bad_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"").unwrap();
        let cfg = load_from(&path);
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);

        std::fs::write(&path, "timeout_secs = 5\npage_size = 50").unwrap();
        let cfg = load_from(&path);
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.page_size, 50);
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let cfg = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    }
}
