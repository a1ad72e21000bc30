//! Service configuration.
//!
//! One TOML file configures all three services; each binary reads only its
//! own section plus the shared ones. Every field has a default, so an
//! absent file runs everything on localhost.
//!
//! ```toml
//! [store]
//! bind = "127.0.0.1:7000"
//! data_file = "data/playhub.json"
//!
//! [lobby]
//! bind = "127.0.0.1:7100"
//! store_addr = "127.0.0.1:7000"
//! transport = "tcp"
//!
//! [session]
//! idle_timeout_secs = 300
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use playhub_session::SessionConfig;
use serde::Deserialize;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PLAYHUB_CONFIG";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Which socket flavour a client-facing service listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Tcp,
    #[serde(alias = "ws")]
    WebSocket,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub bind: String,
    /// Snapshot file. `None` keeps the store in memory only.
    pub data_file: Option<PathBuf>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7000".into(),
            data_file: Some(PathBuf::from("data/playhub.json")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LobbySection {
    pub bind: String,
    pub store_addr: String,
    pub transport: TransportKind,
    /// Where the lobby reads game builds for `download_game`. Usually
    /// the developer service's artifact directory.
    pub artifact_dir: PathBuf,
}

impl Default for LobbySection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7100".into(),
            store_addr: "127.0.0.1:7000".into(),
            transport: TransportKind::Tcp,
            artifact_dir: PathBuf::from("data/artifacts"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeveloperSection {
    pub bind: String,
    pub store_addr: String,
    pub artifact_dir: PathBuf,
    pub transport: TransportKind,
}

impl Default for DeveloperSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7200".into(),
            store_addr: "127.0.0.1:7000".into(),
            artifact_dir: PathBuf::from("data/artifacts"),
            transport: TransportKind::Tcp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// `0` disables the idle timeout.
    pub idle_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: SessionConfig::default().idle_timeout_secs,
        }
    }
}

impl SessionSection {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreClientSection {
    pub request_timeout_secs: u64,
}

impl Default for StoreClientSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: 5,
        }
    }
}

impl StoreClientSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayhubConfig {
    pub store: StoreSection,
    pub lobby: LobbySection,
    pub developer: DeveloperSection,
    pub session: SessionSection,
    pub store_client: StoreClientSection,
}

impl PlayhubConfig {
    /// Loads `.env`, then the file named by [`CONFIG_ENV`] if set.
    /// Without the variable the defaults are used.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => {
                tracing::info!("{CONFIG_ENV} not set, using default configuration");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
