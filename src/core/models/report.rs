use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::models::day::DayRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTotals {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub calls: u64,
}

/// Rollup over every persisted day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllTimeStats {
    pub total_tokens: u64,
    pub total_cost: f64,
    /// Session summaries in the usage ledger
    pub total_sessions: usize,
    /// Day records folded into this rollup
    pub days_recorded: usize,
    pub models: BTreeMap<String, ModelTotals>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBreakdown {
    pub model: String,
    pub total_tokens: u64,
    pub cost: f64,
    pub calls: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    /// Oldest first, one entry per day of the window
    pub days: Vec<DayRecord>,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub average_daily_cost: f64,
    /// Sorted by descending cost
    pub by_model: Vec<ModelBreakdown>,
}

/// Payload of `GET /api/usage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageOverview {
    pub today: DayRecord,
    pub week: Vec<DayRecord>,
    pub all_time: AllTimeStats,
}
