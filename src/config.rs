//! Journal configuration
//!
//! Small auxiliary entities the host persists alongside the trade
//! collection: the known strategy tags and the daily risk goals. Both are
//! created with defaults and overwritten wholesale on save; the engine only
//! ever reads them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Daily risk thresholds checked against today's trades
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGoals {
    /// Stop-trading threshold on cumulative daily loss (positive number)
    pub max_loss: f64,
    /// Daily profit target
    pub target_profit: f64,
    /// Overtrading threshold on daily trade count
    pub max_trades: usize,
}

impl Default for DailyGoals {
    fn default() -> Self {
        Self {
            max_loss: 500.0,
            target_profit: 1000.0,
            max_trades: 10,
        }
    }
}

/// Full configuration blob the host round-trips through its own storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalConfig {
    #[serde(default = "default_available_tags")]
    pub available_tags: Vec<String>,
    #[serde(default)]
    pub daily_goals: DailyGoals,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            available_tags: default_available_tags(),
            daily_goals: DailyGoals::default(),
        }
    }
}

impl JournalConfig {
    /// Parse configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse journal config JSON")
    }

    /// Serialize configuration for the host to persist
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize journal config")
    }
}

/// Starter strategy-tag set for fresh journals
fn default_available_tags() -> Vec<String> {
    ["Breakout", "Reversal", "Trend Following", "Scalp", "Swing", "News"]
        .into_iter()
        .map(String::from)
        .collect()
}
