use std::path::PathBuf;

use crate::core::budget::BudgetEvaluator;
use crate::core::config::AppConfig;
use crate::core::cost::pricing::CostModel;
use crate::core::cost::scanner::LogParser;
use crate::core::store::DataStore;

/// Everything a command or request handler needs, resolved once from config.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub store: DataStore,
    pub cost_model: CostModel,
    pub budget: BudgetEvaluator,
    pub sessions_dir: PathBuf,
    pub notes_dir: PathBuf,
    pub default_model: String,
}

impl AppContext {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store: DataStore::new(config.data_dir()),
            cost_model: config.cost_model(),
            budget: config.budget_evaluator(),
            sessions_dir: config.sessions_dir(),
            notes_dir: config.notes_dir(),
            default_model: config.pricing.default_model.clone(),
        }
    }

    pub fn parser(&self) -> LogParser<'_> {
        LogParser::new(&self.cost_model, &self.default_model)
    }
}
