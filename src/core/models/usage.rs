use chrono::{DateTime, Local, NaiveDate};

/// One observed unit of model token consumption, derived from a single log
/// line or session message. Never persisted directly.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageFact {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost: f64,
    pub timestamp: DateTime<Local>,
}

impl UsageFact {
    pub fn new(
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        cost: f64,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            model: model.into(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            cost,
            timestamp,
        }
    }

    /// Calendar day this fact is bucketed into (local time).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}
