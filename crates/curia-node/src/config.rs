use crate::engine::EngineConfig;
use anyhow::{bail, Context, Result};
use curia_arbitration::ArbitrationConfig;
use curia_ledger::LedgerConfig;
use curia_review::ReviewConfig;
use curia_settlement::SettlementConfig;
use curia_types::BPS_DENOMINATOR;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub arbitration: ArbitrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`.
    pub format: String,
    pub file_output: Option<PathBuf>,
    #[serde(default)]
    pub module_filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        // Env overrides are applied by the caller
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("CURIA_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(format) = env::var("CURIA_LOG_FORMAT") {
            if !format.is_empty() {
                self.logging.format = format;
            }
        }
        if let Ok(window) = env::var("CURIA_MATURITY_WINDOW_SECS") {
            if let Ok(secs) = window.parse() {
                self.ledger.maturity_window_secs = secs;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        self.settlement.validate()?;

        let bps = [
            ("review.wrong_review_stake_bps", self.review.wrong_review_stake_bps),
            ("review.malicious_submit_stake_bps", self.review.malicious_submit_stake_bps),
            ("arbitration.reporter_reward_bps", self.arbitration.reporter_reward_bps),
        ];
        for (name, value) in bps {
            if value as u64 > BPS_DENOMINATOR {
                bail!("{} = {} exceeds {}", name, value, BPS_DENOMINATOR);
            }
        }
        if self.review.reviewer_wrong > 0 || self.review.submitter_deleted > 0 {
            bail!("penalty credit deltas must not be positive");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!("unknown logging format '{}'", self.logging.format);
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            review: self.review.clone(),
            settlement: self.settlement.clone(),
            ledger: self.ledger.clone(),
            arbitration: self.arbitration.clone(),
        }
    }
}
