//! Configuration resolution for hostwatch.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/hostwatch/settings.json)
//! 3. Project config (.hostwatch/settings.json)
//! 4. Environment variables (highest priority)

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete hostwatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Hosts eligible for monitoring sessions.
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

impl Config {
    /// Look up a monitored host by its configured name.
    pub fn find_host(&self, name: &str) -> Option<&HostEntry> {
        self.hosts.iter().find(|h| h.name == name)
    }
}

/// Monitoring session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Idle sleep between channel polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound for a single channel read.
    pub read_chunk_bytes: usize,
    /// Transport connect timeout, in seconds.
    pub connect_timeout_secs: u64,
    /// Directory holding the collector scripts on monitored hosts.
    /// Paths under `/home` are remapped per host user (see [`map_home_dir`]).
    pub scripts_dir: PathBuf,
    pub log_level: String,
}

impl MonitorConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            read_chunk_bytes: 4096,
            connect_timeout_secs: 5,
            scripts_dir: PathBuf::from("/opt/hostwatch/scripts"),
            log_level: "info".to_string(),
        }
    }
}

/// Status message delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum characters per outbound message; longer renders are truncated.
    pub max_message_chars: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 4096,
        }
    }
}

/// One monitored host as listed in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    /// Name users select the host by.
    pub name: String,
    /// Address the transport connects to.
    pub addr: String,
    /// Account the transport authenticates as.
    pub user: String,
}

/// Configuration source priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Default = 0,
    Global = 1,
    Project = 2,
    Environment = 3,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    // Load project config
    if let Some(dir) = project_dir {
        let project_path = dir.join(".hostwatch").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    // Apply environment overrides
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".hostwatch").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/hostwatch/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("hostwatch").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Rewrite the user segment of a `/home/<user>/...` path for a remote user.
///
/// Collector scripts are deployed under the connecting account's home
/// directory; paths outside `/home` are returned unchanged.
pub fn map_home_dir(path: &Path, remote_user: &str) -> PathBuf {
    let mut parts: Vec<&OsStr> = path.iter().collect();
    if let Some(idx) = parts.iter().position(|p| *p == "home")
        && idx + 1 < parts.len()
    {
        parts[idx + 1] = OsStr::new(remote_user);
        return parts.iter().collect();
    }
    path.to_path_buf()
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    // Merge monitor config
    base.monitor = overlay.monitor;

    // Merge delivery config
    base.delivery = overlay.delivery;

    // Merge host list (an empty overlay list keeps the current one)
    if !overlay.hosts.is_empty() {
        base.hosts = overlay.hosts;
    }
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("HOSTWATCH_POLL_INTERVAL_MS") {
        match val.parse() {
            Ok(n) => config.monitor.poll_interval_ms = n,
            Err(_) => tracing::warn!(val, "Ignoring invalid HOSTWATCH_POLL_INTERVAL_MS"),
        }
    }
    if let Ok(val) = std::env::var("HOSTWATCH_READ_CHUNK_BYTES") {
        match val.parse() {
            Ok(n) => config.monitor.read_chunk_bytes = n,
            Err(_) => tracing::warn!(val, "Ignoring invalid HOSTWATCH_READ_CHUNK_BYTES"),
        }
    }
    if let Ok(val) = std::env::var("HOSTWATCH_CONNECT_TIMEOUT_SECS") {
        match val.parse() {
            Ok(n) => config.monitor.connect_timeout_secs = n,
            Err(_) => tracing::warn!(val, "Ignoring invalid HOSTWATCH_CONNECT_TIMEOUT_SECS"),
        }
    }
    if let Ok(val) = std::env::var("HOSTWATCH_MAX_MESSAGE_CHARS") {
        match val.parse() {
            Ok(n) => config.delivery.max_message_chars = n,
            Err(_) => tracing::warn!(val, "Ignoring invalid HOSTWATCH_MAX_MESSAGE_CHARS"),
        }
    }
    if let Ok(val) = std::env::var("HOSTWATCH_LOG_LEVEL") {
        config.monitor.log_level = val;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_polls_at_500ms() {
        let config = Config::default();
        assert_eq!(config.monitor.poll_interval_ms, 500);
        assert_eq!(config.monitor.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn default_config_caps_messages_at_4096() {
        let config = Config::default();
        assert_eq!(config.delivery.max_message_chars, 4096);
        assert_eq!(config.monitor.read_chunk_bytes, 4096);
    }

    #[test]
    fn find_host_matches_exact_name() {
        let mut config = Config::default();
        config.hosts.push(HostEntry {
            name: "srv1".into(),
            addr: "10.0.0.5".into(),
            user: "monitor".into(),
        });

        assert_eq!(config.find_host("srv1").unwrap().addr, "10.0.0.5");
        assert!(config.find_host("SRV1").is_none());
        assert!(config.find_host("srv2").is_none());
    }

    #[test]
    fn map_home_dir_rewrites_user_segment() {
        let mapped = map_home_dir(Path::new("/home/deploy/hostwatch/scripts"), "bob");
        assert_eq!(mapped, PathBuf::from("/home/bob/hostwatch/scripts"));
    }

    #[test]
    fn map_home_dir_keeps_paths_outside_home() {
        let path = Path::new("/opt/hostwatch/scripts");
        assert_eq!(map_home_dir(path, "bob"), path.to_path_buf());
    }

    #[test]
    fn map_home_dir_keeps_bare_home() {
        let path = Path::new("/home");
        assert_eq!(map_home_dir(path, "bob"), path.to_path_buf());
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(".hostwatch");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            project.join("settings.json"),
            r#"{
                "monitor": { "poll_interval_ms": 250, "read_chunk_bytes": 1024,
                             "connect_timeout_secs": 2, "scripts_dir": "/srv/scripts",
                             "log_level": "debug" },
                "hosts": [ { "name": "srv1", "addr": "10.0.0.5", "user": "monitor" } ]
            }"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.monitor.poll_interval_ms, 250);
        assert_eq!(config.monitor.scripts_dir, PathBuf::from("/srv/scripts"));
        assert_eq!(config.hosts.len(), 1);
        assert_eq!(config.hosts[0].name, "srv1");
    }

    #[test]
    fn merge_keeps_hosts_when_overlay_has_none() {
        let mut base = Config::default();
        base.hosts.push(HostEntry {
            name: "srv1".into(),
            addr: "10.0.0.5".into(),
            user: "monitor".into(),
        });

        merge_config(&mut base, Config::default());
        assert_eq!(base.hosts.len(), 1);
    }

    #[test]
    fn config_source_priority_ordering() {
        assert!(ConfigSource::Default < ConfigSource::Global);
        assert!(ConfigSource::Global < ConfigSource::Project);
        assert!(ConfigSource::Project < ConfigSource::Environment);
    }
}
