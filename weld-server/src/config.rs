//! Load config from file and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use weld_core::protocol::DEFAULT_PORT;
use weld_core::session::DEFAULT_SAMPLE_STEP;

/// Config file name looked up under the application root.
pub const CONFIG_FILE: &str = "weld.toml";
const SYSTEM_CONFIG: &str = "/etc/weld/weld.toml";

/// Daemon configuration. File: `--config`, `<app_root>/weld.toml` or /etc/weld/weld.toml.
/// Env overrides: WELD_APP_ROOT, WELD_ARCHIVE_ROOT, WELD_LISTEN_PORT.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding the report templates and the stand registry (default `.`).
    #[serde(default = "default_app_root")]
    pub app_root: PathBuf,
    /// Root of the report archive; must be an existing directory.
    #[serde(default)]
    pub archive_root: Option<PathBuf>,
    /// Stand registry file (default `<app_root>/stands.config`).
    #[serde(default)]
    pub stands_file: Option<PathBuf>,
    /// Listen port (default 10000).
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Raw samples per exported row (default 3).
    #[serde(default = "default_sample_step")]
    pub sample_step: usize,
    /// Log directory (default `<app_root>/Log`).
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_app_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_listen_port() -> u16 {
    DEFAULT_PORT
}
fn default_sample_step() -> usize {
    DEFAULT_SAMPLE_STEP
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_root: default_app_root(),
            archive_root: None,
            stands_file: None,
            listen_port: default_listen_port(),
            sample_step: default_sample_step(),
            log_dir: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("archive_root is not set")]
    NoArchiveRoot,
    #[error("archive root {0} is not an existing directory")]
    ArchiveRootMissing(PathBuf),
    #[error("sample_step must be at least 1")]
    ZeroSampleStep,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply overrides from `var` (normally `std::env::var`). Unparseable values are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(s) = var("WELD_APP_ROOT") {
            self.app_root = PathBuf::from(s);
        }
        if let Some(s) = var("WELD_ARCHIVE_ROOT") {
            self.archive_root = Some(PathBuf::from(s));
        }
        if let Some(s) = var("WELD_LISTEN_PORT") {
            if let Ok(p) = s.parse::<u16>() {
                self.listen_port = p;
            }
        }
    }

    /// Check the archive root exists and return it.
    pub fn validate(&self) -> Result<&Path, ConfigError> {
        if self.sample_step == 0 {
            return Err(ConfigError::ZeroSampleStep);
        }
        let root = self.archive_root.as_deref().ok_or(ConfigError::NoArchiveRoot)?;
        if !root.is_dir() {
            return Err(ConfigError::ArchiveRootMissing(root.to_path_buf()));
        }
        Ok(root)
    }

    pub fn stands_path(&self) -> PathBuf {
        self.stands_file
            .clone()
            .unwrap_or_else(|| self.app_root.join("stands.config"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.app_root.join("Log"))
    }
}

/// Load config: explicit file, else the first config file found, else defaults;
/// then env vars; then validation.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let mut c = match explicit {
        Some(path) => read_file(path)?,
        None => match config_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => read_file(&path)?,
            None => Config::default(),
        },
    };
    c.apply_env(|name| std::env::var(name).ok());
    c.validate()?;
    Ok(c)
}

fn config_paths() -> Vec<PathBuf> {
    let app_root = std::env::var_os("WELD_APP_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(default_app_root);
    vec![app_root.join(CONFIG_FILE), PathBuf::from(SYSTEM_CONFIG)]
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Config::parse(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
