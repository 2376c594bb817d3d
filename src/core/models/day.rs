use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::models::usage::UsageFact;

/// Accumulated totals for one model on one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelStat {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
    pub calls: u64,
}

impl ModelStat {
    /// Fold a single fact in. Purely additive.
    pub fn add_fact(&mut self, fact: &UsageFact) {
        self.input_tokens += fact.input_tokens;
        self.output_tokens += fact.output_tokens;
        self.total_tokens += fact.total_tokens;
        self.cost += fact.cost;
        self.calls += 1;
    }

    /// Pointwise sum with another stat for the same model.
    pub fn absorb(&mut self, other: &ModelStat) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        self.cost += other.cost;
        self.calls += other.calls;
    }
}

/// The persisted aggregate of every usage fact for one calendar date.
///
/// `total_tokens` and `total_cost` are derived from `models` by
/// [`DayRecord::recompute_totals`]; nothing else writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub models: BTreeMap<String, ModelStat>,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost: f64,
}

impl DayRecord {
    /// Zero-valued record carrying only its date.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            models: BTreeMap::new(),
            total_tokens: 0,
            total_cost: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn recompute_totals(&mut self) {
        self.total_tokens = self.models.values().map(|m| m.total_tokens).sum();
        self.total_cost = self.models.values().map(|m| m.cost).sum();
    }

    /// Model entries ordered by descending total tokens (name breaks ties).
    pub fn models_by_tokens(&self) -> Vec<(&str, &ModelStat)> {
        let mut entries: Vec<(&str, &ModelStat)> = self
            .models
            .iter()
            .map(|(name, stat)| (name.as_str(), stat))
            .collect();
        entries.sort_by(|a, b| b.1.total_tokens.cmp(&a.1.total_tokens).then(a.0.cmp(b.0)));
        entries
    }
}
