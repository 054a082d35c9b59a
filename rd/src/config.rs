//! ReviewDaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Campaign;

/// Main ReviewDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); the CLI flag wins
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Conversation engine settings
    pub engine: EngineConfig,

    /// Timeout reconciler settings
    pub reconciler: ReconcilerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Campaign catalog
    pub campaigns: Vec<Campaign>,
}

impl Config {
    /// Check cross-field constraints before anything is started
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for campaign in &self.campaigns {
            if campaign.id.trim().is_empty() {
                return Err(eyre::eyre!("Campaign with empty id"));
            }
            if !seen.insert(campaign.id.as_str()) {
                return Err(eyre::eyre!("Duplicate campaign id: {}", campaign.id));
            }
            if campaign.total_quantity < 0 || campaign.daily_cap.is_some_and(|cap| cap < 0) {
                return Err(eyre::eyre!("Campaign {} has a negative quantity", campaign.id));
            }
        }
        if self.engine.max_accounts == 0 {
            return Err(eyre::eyre!("engine.max-accounts must be at least 1"));
        }
        let r = &self.reconciler;
        if r.tick_secs == 0 || r.housekeeping_every_ticks == 0 {
            return Err(eyre::eyre!("reconciler tick settings must be positive"));
        }
        if r.warn_before_secs >= r.cancel_after_secs {
            return Err(eyre::eyre!(
                "reconciler.warn-before-secs ({}) must be smaller than cancel-after-secs ({})",
                r.warn_before_secs,
                r.cancel_after_secs
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_unsynced(config_path)?;
        config.sync();
        Ok(config)
    }

    /// Read just the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::candidate_paths(config_path)
            .into_iter()
            .find_map(|path| Self::load_from_file(&path).ok())
            .and_then(|config| config.log_level)
    }

    fn load_unsynced(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for path in Self::candidate_paths(None) {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// ./.reviewdaemon.yml, then ~/.config/reviewdaemon/reviewdaemon.yml
    fn candidate_paths(config_path: Option<&PathBuf>) -> Vec<PathBuf> {
        if let Some(path) = config_path {
            return vec![path.clone()];
        }
        let mut paths = vec![PathBuf::from(".reviewdaemon.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("reviewdaemon").join("reviewdaemon.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Copy settings the engine needs from other sections
    pub fn sync(&mut self) {
        self.engine.form_timeout_secs = self.reconciler.cancel_after_secs;
    }
}

/// Conversation engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Most store identifiers one registration may carry
    #[serde(rename = "max-accounts")]
    pub max_accounts: usize,

    /// Base URL of the web app (screenshot upload lives under /upload)
    #[serde(rename = "web-url")]
    pub web_url: String,

    /// Transcript lines kept for the assistant and inquiry hand-off
    #[serde(rename = "recent-context-size")]
    pub recent_context_size: usize,

    /// Mirrors `reconciler.cancel-after-secs` for the purchase guide text
    #[serde(skip)]
    pub form_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_accounts: 5,
            web_url: "http://localhost:3000".to_string(),
            recent_context_size: 10,
            form_timeout_secs: ReconcilerConfig::default().cancel_after_secs,
        }
    }
}

/// Timeout reconciler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Seconds between warn/cancel scans
    #[serde(rename = "tick-secs")]
    pub tick_secs: u64,

    /// Idle time after which an unfinished registration is cancelled
    #[serde(rename = "cancel-after-secs")]
    pub cancel_after_secs: u64,

    /// How long before cancellation the warning goes out
    #[serde(rename = "warn-before-secs")]
    pub warn_before_secs: u64,

    /// Housekeeping runs once every this many ticks
    #[serde(rename = "housekeeping-every-ticks")]
    pub housekeeping_every_ticks: u64,

    /// Terminal rows older than this are deleted
    #[serde(rename = "purge-terminal-after-hours")]
    pub purge_terminal_after_hours: u64,

    /// Idle sessions at rest are dropped from memory after this long
    #[serde(rename = "session-idle-expiry-secs")]
    pub session_idle_expiry_secs: u64,

    /// Send review reminders this many days before the deadline
    #[serde(rename = "reminder-days")]
    pub reminder_days: Vec<u32>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 15,
            cancel_after_secs: 30 * 60,
            warn_before_secs: 5 * 60,
            housekeeping_every_ticks: 20,
            purge_terminal_after_hours: 24,
            session_idle_expiry_secs: 6 * 60 * 60,
            reminder_days: vec![3, 1],
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the progress database
    #[serde(rename = "store-dir")]
    pub store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/reviewdaemon on Linux)
        let store_dir = dirs::data_dir()
            .map(|d| d.join("reviewdaemon"))
            .unwrap_or_else(|| PathBuf::from(".reviewdaemon"))
            .to_string_lossy()
            .into_owned();

        Self { store_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.engine.max_accounts, 5);
        assert_eq!(config.reconciler.tick_secs, 15);
        assert_eq!(config.reconciler.cancel_after_secs, 1800);
        assert!(config.campaigns.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

engine:
  max-accounts: 3
  web-url: https://review.example.com

reconciler:
  tick-secs: 5
  cancel-after-secs: 600
  warn-before-secs: 120
  reminder-days: [2]

campaigns:
  - id: spring-serum
    product-name: 수분 세럼
    store-name: 세럼샵
    options: [50ml, 100ml]
    total-quantity: 30
    daily-cap: 10
    payment-amount: 25000
"#;

        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        config.sync();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.engine.max_accounts, 3);
        assert_eq!(config.engine.recent_context_size, 10);
        assert_eq!(config.engine.form_timeout_secs, 600);
        assert_eq!(config.reconciler.warn_before_secs, 120);
        assert_eq!(config.reconciler.reminder_days, vec![2]);
        assert_eq!(config.reconciler.housekeeping_every_ticks, 20);

        let campaign = &config.campaigns[0];
        assert_eq!(campaign.product_name, "수분 세럼");
        assert!(campaign.has_multiple_options());
        assert_eq!(campaign.daily_cap, Some(10));
        assert_eq!(campaign.review_deadline_days, 7);
        assert!(campaign.active);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.reconciler.warn_before_secs = config.reconciler.cancel_after_secs;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.campaigns = vec![
            Campaign {
                id: "a".into(),
                ..Default::default()
            },
            Campaign {
                id: "a".into(),
                ..Default::default()
            },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rd.yml");
        fs::write(&path, "log-level: warn\nreconciler:\n  cancel-after-secs: 900\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.engine.form_timeout_secs, 900);
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
        assert!(Config::load(Some(&dir.path().join("missing.yml"))).is_err());
    }
}
