use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-token pricing in currency units per token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub input: f64,
    pub output: f64,
}

/// Built-in pricing entries used when the config doesn't override them.
pub static BUILTIN_RATES: &[(&str, Rates)] = &[
    (
        "MiniMax-M2.1",
        Rates {
            input: 1.5e-5,
            output: 6e-5,
        },
    ),
    (
        "MiniMax-M2",
        Rates {
            input: 1e-5,
            output: 4e-5,
        },
    ),
];

/// Rates applied to any model missing from the table.
pub const DEFAULT_RATES: Rates = Rates {
    input: 1e-5,
    output: 5e-5,
};

/// Model identifier used when a log record doesn't name one.
pub const DEFAULT_MODEL: &str = "MiniMax-M2.1";

/// Normalize a model name by stripping provider prefixes and version suffixes.
/// Examples:
///   "minimax/MiniMax-M2.1" -> "MiniMax-M2.1"
///   "claude-sonnet-4-5-20250514" -> "claude-sonnet-4-5"
fn normalize_model(model: &str) -> String {
    let mut name = match model.rfind('/') {
        Some(idx) => model[idx + 1..].to_string(),
        None => model.to_string(),
    };

    // Strip Vertex/Bedrock suffixes like ":0", "@001"
    if let Some(idx) = name.find(':') {
        name.truncate(idx);
    }
    if let Some(idx) = name.find('@') {
        name.truncate(idx);
    }

    // Strip date suffixes like "-20250514"
    if name.len() > 9 {
        let is_date = name
            .get(name.len() - 9..)
            .map(|tail| tail.starts_with('-') && tail[1..].chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
        if is_date {
            name.truncate(name.len() - 9);
        }
    }

    name
}

/// Maps model identifiers to rates and prices token counts.
#[derive(Debug, Clone)]
pub struct CostModel {
    rates: HashMap<String, Rates>,
    default: Rates,
}

impl Default for CostModel {
    fn default() -> Self {
        let rates = BUILTIN_RATES
            .iter()
            .map(|(model, rates)| (model.to_string(), *rates))
            .collect();
        Self::new(rates, DEFAULT_RATES)
    }
}

impl CostModel {
    pub fn new(rates: HashMap<String, Rates>, default: Rates) -> Self {
        Self { rates, default }
    }

    /// Look up rates for a model. Unknown models get the default rates.
    pub fn rates_for(&self, model: &str) -> Rates {
        if let Some(rates) = self.rates.get(model) {
            return *rates;
        }
        let normalized = normalize_model(model);
        self.rates
            .iter()
            .find(|(known, _)| normalize_model(known) == normalized)
            .map(|(_, rates)| *rates)
            .unwrap_or(self.default)
    }

    /// Unrounded cost for the given token counts.
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let rates = self.rates_for(model);
        input_tokens as f64 * rates.input + output_tokens as f64 * rates.output
    }

    /// Cost of a fact: an upstream precomputed cost wins when it is usable.
    pub fn resolve(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        precomputed: Option<f64>,
    ) -> f64 {
        match precomputed {
            Some(cost) if cost.is_finite() && cost >= 0.0 => cost,
            _ => self.cost(model, input_tokens, output_tokens),
        }
    }
}
