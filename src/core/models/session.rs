use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::models::day::ModelStat;

/// Summary of one recorded agent session, as kept in `usage.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    #[serde(default)]
    pub models: BTreeMap<String, ModelStat>,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub session_duration: u64,
}

/// Cumulative ledger of recorded sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageLedger {
    #[serde(default)]
    pub sessions: Vec<SessionSummary>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}
