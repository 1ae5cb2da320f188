//! Configuration management
//!
//! Compatible with the desktop app settings.json format:
//! ```json
//! {
//!   "app": { "demoMode": false, "tierDowngradeOnRedeem": "allow" },
//!   "channel": { "backoff": { "initialDelayMs": 500, "maxDelayMs": 30000 } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Whether a redemption may drop the balance below the current tier's
/// threshold. `Allow` applies it and logs a warning; `Block` rejects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DowngradePolicy {
    #[default]
    Allow,
    Block,
}

/// Reconnect backoff for the realtime channel: capped exponential
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl BackoffConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Next delay after `current`, capped at the configured maximum
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next = current.mul_f64(self.multiplier.max(1.0));
        next.min(Duration::from_millis(self.max_delay_ms))
    }
}

/// Raw settings.json structure (matching the app format)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    channel: ChannelSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(default)]
    tier_downgrade_on_redeem: DowngradePolicy,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSettings {
    #[serde(default)]
    backoff: Option<BackoffConfig>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Perks configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub demo_mode: bool,
    pub downgrade_policy: DowngradePolicy,
    pub backoff: BackoffConfig,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            demo_mode: false,
            downgrade_policy: DowngradePolicy::default(),
            backoff: BackoffConfig::default(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the perks directory
    ///
    /// Demo mode can be enabled via:
    /// 1. Settings file (pk demo on)
    /// 2. Environment variable PERKS_DEMO_MODE (for CI/testing)
    pub fn load(perks_dir: &Path) -> Result<Self> {
        let settings_path = perks_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        // Check env var for demo mode override (for CI/testing)
        let demo_mode = match std::env::var("PERKS_DEMO_MODE").ok().as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.app.demo_mode,
        };

        Ok(Self {
            demo_mode,
            downgrade_policy: raw.app.tier_downgrade_on_redeem,
            backoff: raw.channel.backoff.clone().unwrap_or_default(),
            _raw_settings: raw,
        })
    }

    /// Save config to the perks directory.
    /// Preserves settings fields this crate doesn't manage.
    pub fn save(&self, perks_dir: &Path) -> Result<()> {
        let settings_path = perks_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.app.demo_mode = self.demo_mode;
        settings.app.tier_downgrade_on_redeem = self.downgrade_policy;
        settings.channel.backoff = Some(self.backoff.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Enable demo mode
    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    /// Disable demo mode
    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }
}
