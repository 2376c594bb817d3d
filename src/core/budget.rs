use serde::{Deserialize, Serialize};

/// Spend above this percent of the budget is critical.
pub const CRITICAL_PERCENT: f64 = 90.0;
/// Spend above this percent of the budget is high.
pub const HIGH_PERCENT: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Ok,
    High,
    Critical,
}

impl BudgetStatus {
    /// One-line verdict used in run summaries.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Ok => "On track",
            Self::High => "High usage",
            Self::Critical => "Near budget limit!",
        }
    }

    /// Sentence used in the Markdown brief summary section.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Ok => "Within budget.",
            Self::High => "Budget usage is high.",
            Self::Critical => "Approaching daily budget limit!",
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub status: BudgetStatus,
    /// Percent of the budget spent, unclamped; 0 when the budget is not positive
    pub percent: f64,
    pub spent: f64,
    pub budget: f64,
    /// Budget left, never negative
    pub remaining: f64,
}

/// Classify `spent` against `budget`. Thresholds are exclusive: exactly 75%
/// is ok and exactly 90% is high.
pub fn classify(spent: f64, budget: f64) -> BudgetCheck {
    let percent = if budget > 0.0 && budget.is_finite() {
        100.0 * spent / budget
    } else {
        0.0
    };
    let status = if percent > CRITICAL_PERCENT {
        BudgetStatus::Critical
    } else if percent > HIGH_PERCENT {
        BudgetStatus::High
    } else {
        BudgetStatus::Ok
    };
    BudgetCheck {
        status,
        percent,
        spent,
        budget,
        remaining: (budget - spent).max(0.0),
    }
}

/// Compares daily spend against a fixed ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetEvaluator {
    daily_budget: f64,
}

impl BudgetEvaluator {
    pub fn new(daily_budget: f64) -> Self {
        Self { daily_budget }
    }

    pub fn daily_budget(&self) -> f64 {
        self.daily_budget
    }

    pub fn classify(&self, spent: f64) -> BudgetCheck {
        classify(spent, self.daily_budget)
    }
}
