//! CommandTracker configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main CommandTracker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Bounds used by `ct run` when none are given on the command line
    pub wait: WaitConfig,

    /// Simulated remote settings
    pub sim: SimConfig,
}

/// Default wait bound for the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Number of status polls before giving up
    pub steps: u32,

    /// Pause between polls in milliseconds
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            steps: 60,
            interval_ms: 500,
        }
    }
}

impl WaitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Simulated remote configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Capacity of the actor's request channel
    #[serde(rename = "channel-buffer")]
    pub channel_buffer: usize,

    /// Session name stamped on every handle
    pub session: String,

    /// How long a settled command stays queryable before it is forgotten
    #[serde(rename = "retain-settled-ms")]
    pub retain_settled_ms: u64,
}

impl SimConfig {
    pub fn retain_settled(&self) -> Duration {
        Duration::from_millis(self.retain_settled_ms)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 256,
            session: "local".to_string(),
            retain_settled_ms: 60_000,
        }
    }
}

#[derive(Deserialize)]
struct LogLevelOnly {
    #[serde(rename = "log-level")]
    log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `~/.config/commandtracker/commandtracker.yml`, then
    /// `./commandtracker.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::default_paths() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Any failure yields `None`; the full load reports it later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::default_paths(),
        };

        candidates
            .iter()
            .find(|path| path.exists())
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|content| serde_yaml::from_str::<LogLevelOnly>(&content).ok())
            .and_then(|only| only.log_level)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("commandtracker").join("commandtracker.yml"));
        }
        paths.push(PathBuf::from("commandtracker.yml"));
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.log_level, None);
        assert_eq!(config.wait.steps, 60);
        assert_eq!(config.wait.interval(), Duration::from_millis(500));
        assert_eq!(config.sim.channel_buffer, 256);
        assert_eq!(config.sim.session, "local");
        assert_eq!(config.sim.retain_settled(), Duration::from_secs(60));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

wait:
  steps: 5
  interval-ms: 20

sim:
  channel-buffer: 8
  session: ops
  retain-settled-ms: 250
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.wait.steps, 5);
        assert_eq!(config.wait.interval_ms, 20);
        assert_eq!(config.sim.channel_buffer, 8);
        assert_eq!(config.sim.session, "ops");
        assert_eq!(config.sim.retain_settled_ms, 250);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("wait:\n  steps: 3\n").unwrap();
        assert_eq!(config.wait.steps, 3);
        assert_eq!(config.wait.interval_ms, 500);
        assert_eq!(config.sim, SimConfig::default());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ct.yml");
        fs::write(&path, "log-level: warn\nwait:\n  steps: 7\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.wait.steps, 7);
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yml");

        assert!(Config::load(Some(&path)).is_err());
        assert_eq!(Config::load_log_level(Some(&path)), None);
    }

    #[test]
    fn test_load_log_level_ignores_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "wait: [not, a, map").unwrap();

        assert_eq!(Config::load_log_level(Some(&path)), None);
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.yml");
        let mut config = Config::default();
        config.wait.steps = 12;
        config.sim.session = "saved".to_string();

        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }
}
