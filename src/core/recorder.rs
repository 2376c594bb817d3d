use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::aggregator::merge;
use crate::core::cost::pricing::CostModel;
use crate::core::cost::scanner::token_count;
use crate::core::models::session::SessionSummary;
use crate::core::models::usage::UsageFact;
use crate::core::store::{DataStore, StoreError};

/// A session's message list as posted by the agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionPayload {
    #[serde(default)]
    pub messages: Vec<Value>,
}

#[derive(Deserialize)]
struct SessionMessage {
    model: Option<String>,
    tokens: Option<MessageTokens>,
}

#[derive(Deserialize)]
struct MessageTokens {
    input: Option<Value>,
    output: Option<Value>,
}

impl SessionPayload {
    /// Accepts either `{"sessionData": {...}}` or the bare session object.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Some(inner) = value.get_mut("sessionData") {
            return serde_json::from_value(inner.take());
        }
        serde_json::from_value(value)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    /// One fact per message that names a model and carries token counts.
    pub fn facts(&self, cost_model: &CostModel, now: DateTime<Local>) -> Vec<UsageFact> {
        self.messages
            .iter()
            .filter_map(|raw| SessionMessage::deserialize(raw).ok())
            .filter_map(|msg| {
                let model = msg.model.filter(|m| !m.is_empty())?;
                let tokens = msg.tokens?;
                let input = token_count(tokens.input.as_ref());
                let output = token_count(tokens.output.as_ref());
                let cost = cost_model.cost(&model, input, output);
                Some(UsageFact::new(model, input, output, cost, now))
            })
            .collect()
    }
}

/// Summarize one session's facts, all stamped `now`.
pub fn summarize(facts: &[UsageFact], now: DateTime<Local>) -> SessionSummary {
    let day = merge(None, now.date_naive(), facts);
    SessionSummary {
        timestamp: now.with_timezone(&Utc),
        date: day.date,
        models: day.models,
        total_tokens: day.total_tokens,
        total_cost: day.total_cost,
        session_duration: 0,
    }
}

/// Append the session to the ledger and fold its facts into today's record.
///
/// Sessions are an incremental source, so merging into the persisted day
/// is correct here, unlike a log replay. Both files are read before either is
/// written, and the ledger is written last: a failure leaves it untouched.
pub fn record_session(
    store: &DataStore,
    cost_model: &CostModel,
    payload: &SessionPayload,
    now: DateTime<Local>,
) -> Result<SessionSummary, StoreError> {
    let facts = payload.facts(cost_model, now);
    let summary = summarize(&facts, now);

    let _guard = store.lock_updates();
    let mut ledger = store.load_ledger()?;
    let day = if facts.is_empty() {
        None
    } else {
        let existing = store.load_day(summary.date)?;
        Some(merge(existing, summary.date, &facts))
    };

    if let Some(day) = &day {
        store.save_day(day)?;
    }
    ledger.sessions.push(summary.clone());
    ledger.last_updated = Some(summary.timestamp);
    store.save_ledger(&ledger)?;

    debug!(
        date = %summary.date,
        messages = payload.messages.len(),
        accepted = facts.len(),
        "Recorded session"
    );
    Ok(summary)
}
