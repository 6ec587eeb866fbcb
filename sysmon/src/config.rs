//! Console configuration: JSON with a `monitor` and an `sftp` section.
//! Stored under XDG config dir: $XDG_CONFIG_HOME/sysmon/config.json (fallback ~/.config/sysmon/config.json)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path, path::PathBuf};
use sysmon_core::MonitorConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub remote_dir: String,
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 22,
            username: "admin".into(),
            password: None,
            remote_dir: "/path/on/remote/server".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub sftp: SftpConfig,
}

impl Config {
    pub fn with_env_overrides(mut self) -> Self {
        self.monitor = self.monitor.with_env_overrides();
        if let Ok(pw) = std::env::var("SYSMON_SFTP_PASSWORD") {
            if !pw.is_empty() {
                self.sftp.password = Some(pw);
            }
        }
        self
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("sysmon")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sysmon")
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Read the config at `path`. A missing file yields defaults; a file that
/// exists but does not parse is an error.
pub fn load(path: &Path) -> Result<Config> {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("reading config {}", path.display()));
        }
    };
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}
