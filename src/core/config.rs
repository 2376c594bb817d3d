use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::budget::BudgetEvaluator;
use crate::core::cost::pricing::{CostModel, Rates, BUILTIN_RATES, DEFAULT_MODEL, DEFAULT_RATES};

pub const SESSIONS_DIR_ENV: &str = "TKM_SESSIONS_DIR";
pub const DATA_DIR_ENV: &str = "TKM_DATA_DIR";
pub const PORT_ENV: &str = "PORT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Failed to write config: {0}")]
    WriteError(#[source] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_color(),
        }
    }
}

/// Filesystem locations. Unset entries fall back to the OpenClaw layout under `$HOME`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub sessions_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub notes_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_daily_budget")]
    pub daily: f64,
}

fn default_daily_budget() -> f64 {
    20.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily: default_daily_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_rates")]
    pub default: Rates,
    #[serde(default = "builtin_models")]
    pub models: HashMap<String, Rates>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_rates() -> Rates {
    DEFAULT_RATES
}
fn builtin_models() -> HashMap<String, Rates> {
    BUILTIN_RATES
        .iter()
        .map(|(model, rates)| (model.to_string(), *rates))
        .collect()
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default: default_rates(),
            models: builtin_models(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
}

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".config"));
        config_dir.join("tkm").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `TKM_SESSIONS_DIR`, `TKM_DATA_DIR` and `PORT` from `lookup`.
    /// Empty values and unparseable ports are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = non_empty(SESSIONS_DIR_ENV) {
            self.paths.sessions_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty(DATA_DIR_ENV) {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(port) = non_empty(PORT_ENV).and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
    }

    /// Serialize and write this config to the config file path.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::WriteError)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content).map_err(ConfigError::WriteError)?;
        Ok(path)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.paths
            .sessions_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".openclaw/agents/main/sessions"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".openclaw/workspace/obsidian-vault/ai-usage"))
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.paths
            .notes_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".openclaw/workspace/obsidian-vault/daily-notes"))
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.pricing.models.clone(), self.pricing.default)
    }

    pub fn budget_evaluator(&self) -> BudgetEvaluator {
        BudgetEvaluator::new(self.budget.daily)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["text", "json"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text' or 'json')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if !(self.budget.daily.is_finite() && self.budget.daily > 0.0) {
            issues.push(format!(
                "Invalid daily budget: {} (must be a positive number)",
                self.budget.daily
            ));
        }
        if self.pricing.default_model.trim().is_empty() {
            issues.push("Pricing default_model must not be empty".to_string());
        }
        if !rates_valid(&self.pricing.default) {
            issues.push("Pricing default rates must be non-negative numbers".to_string());
        }
        let mut models: Vec<&String> = self.pricing.models.keys().collect();
        models.sort();
        for model in models {
            if !rates_valid(&self.pricing.models[model]) {
                issues.push(format!(
                    "Pricing for '{}': rates must be non-negative numbers",
                    model
                ));
            }
        }
        if self.server.port == 0 {
            issues.push("Invalid server port: 0".to_string());
        }
        issues
    }
}

fn rates_valid(rates: &Rates) -> bool {
    [rates.input, rates.output]
        .iter()
        .all(|r| r.is_finite() && *r >= 0.0)
}
