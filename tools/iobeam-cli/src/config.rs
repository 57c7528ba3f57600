//! Configuration file and command-line overrides

use anyhow::{bail, Context, Result};
use iobeam_embedded::{API_DEFAULT_PORT, API_DEFAULT_SERVER};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

/// Contents of `config.toml`; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub project_id: Option<u32>,
    pub project_token: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub state_dir: Option<PathBuf>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }

    /// Load `path` if given, else the per-user default if it exists
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_file() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub project_id: Option<u32>,
    pub project_token: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub state_dir: Option<PathBuf>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_id: u32,
    pub project_token: String,
    pub host: String,
    pub port: u16,
    pub state_dir: PathBuf,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Settings {
    /// Merge file values under overrides, then apply defaults
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let project_id = match overrides.project_id.or(file.project_id) {
            Some(0) => bail!("Project id must be greater than zero"),
            Some(id) => id,
            None => bail!(
                "No project id: set project_id in the config file, pass --project-id or set IOBEAM_PROJECT_ID"
            ),
        };
        let project_token = match overrides.project_token.or(file.project_token) {
            Some(token) if !token.is_empty() => token,
            _ => bail!(
                "No project token: set project_token in the config file, pass --token or set IOBEAM_PROJECT_TOKEN"
            ),
        };

        Ok(Self {
            project_id,
            project_token,
            host: overrides
                .host
                .or(file.host)
                .unwrap_or_else(|| API_DEFAULT_SERVER.to_string()),
            port: overrides.port.or(file.port).unwrap_or(API_DEFAULT_PORT),
            state_dir: overrides
                .state_dir
                .or(file.state_dir)
                .unwrap_or_else(default_state_dir),
            connect_timeout: Duration::from_millis(
                file.connect_timeout_ms
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            ),
            read_timeout: Duration::from_millis(
                file.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
            ),
        })
    }
}

/// Get the default config file path
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("iobeam").join("config.toml"))
}

/// Get the default directory for the identity record
pub fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("iobeam")
}
