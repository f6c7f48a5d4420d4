//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (or the file named by `SHARPLINE_CONFIG`) and
//! deserializes into strongly-typed structs. A handful of tuning knobs can
//! be overridden from the environment (`BANKROLL`, `MIN_EDGE`,
//! `KELLY_FRACTION`, `MAX_UNIT`). Secrets (API key, webhook) are referenced
//! by env-var name in the config and resolved at runtime.

use anyhow::{bail, Context, Result};
use chrono::Weekday;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::strategy::kelly::KellyConfig;
use crate::strategy::mapping::MappingParams;
use crate::strategy::selector::TieBreak;
use crate::strategy::threshold::ThresholdConfig;
use crate::strategy::ValuationConfig;

/// Default config path when `SHARPLINE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub valuation: ValuationSettings,
    pub feed: FeedConfig,
    pub storage: StorageConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub bankroll: Decimal,
    /// Poll interval outside game days.
    pub regular_interval_secs: u64,
    /// Poll interval on game days.
    pub gameday_interval_secs: u64,
    /// Weekdays (UTC) polled at the game-day interval.
    pub gameday_weekdays: Vec<Weekday>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "SHARPLINE".to_string(),
            bankroll: dec!(500),
            regular_interval_secs: 900,
            gameday_interval_secs: 300,
            gameday_weekdays: vec![Weekday::Sun],
        }
    }
}

/// Valuation tuning as it appears in the config file.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ValuationSettings {
    pub spread_min_edge: f64,
    pub moneyline_min_edge: f64,
    pub elevated_band_low: f64,
    pub elevated_band_high: f64,
    pub kelly_fraction: f64,
    pub max_unit: f64,
    pub min_stake: Decimal,
    pub max_gap: f64,
    pub key_number_epsilon: f64,
    pub tie_break: TieBreak,
}

impl Default for ValuationSettings {
    fn default() -> Self {
        let thresholds = ThresholdConfig::default();
        let kelly = KellyConfig::default();
        let mapping = MappingParams::default();
        Self {
            spread_min_edge: thresholds.spread_min_edge,
            moneyline_min_edge: thresholds.moneyline_min_edge,
            elevated_band_low: thresholds.elevated_band_low,
            elevated_band_high: thresholds.elevated_band_high,
            kelly_fraction: kelly.fraction,
            max_unit: kelly.max_unit,
            min_stake: kelly.min_stake,
            max_gap: mapping.max_gap,
            key_number_epsilon: mapping.key_number_epsilon,
            tie_break: TieBreak::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    pub base_url: String,
    pub sport: String,
    pub regions: String,
    /// Book whose prices we would bet into.
    pub target_book: String,
    /// Sharp book the fair ladder is built from.
    pub reference_book: String,
    /// Fetch the reference book's alternate spreads per event.
    pub alternate_lines: bool,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.the-odds-api.com/v4".to_string(),
            sport: "americanfootball_nfl".to_string(),
            regions: "us".to_string(),
            target_book: "hardrock".to_string(),
            reference_book: "pinnacle".to_string(),
            alternate_lines: true,
            api_key_env: "THEODDSAPI".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://sharpline.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AlertsConfig {
    pub title: String,
    /// Top-N decisions (by EV) persisted and notified per run.
    pub max_alerts: usize,
    pub discord_webhook_env: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            title: "NFL +EV Signals (Hard Rock)".to_string(),
            max_alerts: 5,
            discord_webhook_env: "DISCORD_WEBHOOK_URL".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load from `SHARPLINE_CONFIG` (or `config.toml`), apply environment
    /// overrides and validate.
    pub fn load_from_env() -> Result<Self> {
        let path = std::env::var("SHARPLINE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load(&path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BANKROLL`, `MIN_EDGE`, `KELLY_FRACTION` and `MAX_UNIT`
    /// overrides. `MIN_EDGE` sets the base for every market.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("BANKROLL") {
            self.agent.bankroll = raw
                .trim()
                .parse::<Decimal>()
                .with_context(|| format!("Invalid BANKROLL: {raw}"))?;
        }
        if let Some(edge) = parse_f64(&lookup, "MIN_EDGE")? {
            self.valuation.spread_min_edge = edge;
            self.valuation.moneyline_min_edge = edge;
        }
        if let Some(fraction) = parse_f64(&lookup, "KELLY_FRACTION")? {
            self.valuation.kelly_fraction = fraction;
        }
        if let Some(max_unit) = parse_f64(&lookup, "MAX_UNIT")? {
            self.valuation.max_unit = max_unit;
        }
        Ok(())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let v = &self.valuation;

        if self.agent.bankroll <= Decimal::ZERO {
            bail!("bankroll must be positive, got {}", self.agent.bankroll);
        }
        if self.agent.regular_interval_secs == 0 || self.agent.gameday_interval_secs == 0 {
            bail!("poll intervals must be at least one second");
        }
        if !(v.kelly_fraction > 0.0 && v.kelly_fraction <= 1.0) {
            bail!("kelly_fraction must be in (0, 1], got {}", v.kelly_fraction);
        }
        if !(v.max_unit > 0.0 && v.max_unit <= 1.0) {
            bail!("max_unit must be in (0, 1], got {}", v.max_unit);
        }
        if v.spread_min_edge < 0.0 || v.moneyline_min_edge < 0.0 {
            bail!("minimum edges must not be negative");
        }
        if v.elevated_band_low < 1.0 || v.elevated_band_low > v.elevated_band_high {
            bail!(
                "elevated band must satisfy 1 <= low <= high, got [{}, {}]",
                v.elevated_band_low,
                v.elevated_band_high
            );
        }
        if !v.max_gap.is_finite() || v.max_gap <= 0.0 {
            bail!("max_gap must be positive, got {}", v.max_gap);
        }
        if v.key_number_epsilon < 0.0 {
            bail!("key_number_epsilon must not be negative");
        }
        if v.min_stake < Decimal::ZERO {
            bail!("min_stake must not be negative");
        }
        if self.alerts.max_alerts == 0 {
            bail!("max_alerts must be at least 1");
        }
        Ok(())
    }

    /// Engine configuration derived from the file.
    pub fn valuation_config(&self) -> ValuationConfig {
        let v = &self.valuation;
        ValuationConfig {
            bankroll: self.agent.bankroll,
            kelly: KellyConfig {
                fraction: v.kelly_fraction,
                max_unit: v.max_unit,
                min_stake: v.min_stake,
            },
            thresholds: ThresholdConfig {
                spread_min_edge: v.spread_min_edge,
                moneyline_min_edge: v.moneyline_min_edge,
                elevated_band_low: v.elevated_band_low,
                elevated_band_high: v.elevated_band_high,
            },
            mapping: MappingParams {
                max_gap: v.max_gap,
                key_number_epsilon: v.key_number_epsilon,
            },
            tie_break: v.tie_break,
        }
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name).with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve a secret by env-var name; empty values count as unset.
    pub fn resolve_secret(env_name: &str) -> Option<SecretString> {
        Self::resolve_env(env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::new)
    }
}

fn parse_f64<F>(lookup: &F, name: &str) -> Result<Option<f64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid {name}: {raw}"))?;
            if !value.is_finite() {
                bail!("Invalid {name}: {raw}");
            }
            Ok(Some(value))
        }
    }
}
