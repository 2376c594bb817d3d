use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::warn;

use crate::core::models::day::DayRecord;
use crate::core::models::usage::UsageFact;

/// Fold `facts` into `existing` (or a fresh record for `date`).
///
/// The fold is purely additive and totals are recomputed from the model
/// entries afterwards. Merging the same facts twice counts them twice: callers
/// that replay a whole log should start from `None` instead of the persisted
/// record.
pub fn merge<'f, I>(existing: Option<DayRecord>, date: NaiveDate, facts: I) -> DayRecord
where
    I: IntoIterator<Item = &'f UsageFact>,
{
    let mut day = existing.unwrap_or_else(|| DayRecord::empty(date));
    for fact in facts {
        if fact.date() != day.date {
            warn!(
                expected = %day.date,
                got = %fact.date(),
                model = %fact.model,
                "Ignoring usage fact for a different day"
            );
            continue;
        }
        day.models
            .entry(fact.model.clone())
            .or_default()
            .add_fact(fact);
    }
    day.recompute_totals();
    day
}

/// Group facts by the calendar day they fall on.
pub fn partition_by_date<I>(facts: I) -> BTreeMap<NaiveDate, Vec<UsageFact>>
where
    I: IntoIterator<Item = UsageFact>,
{
    let mut by_date: BTreeMap<NaiveDate, Vec<UsageFact>> = BTreeMap::new();
    for fact in facts {
        by_date.entry(fact.date()).or_default().push(fact);
    }
    by_date
}

/// Build one fresh record per date from the full fact set, oldest first.
pub fn aggregate<I>(facts: I) -> Vec<DayRecord>
where
    I: IntoIterator<Item = UsageFact>,
{
    partition_by_date(facts)
        .into_iter()
        .map(|(date, facts)| merge(None, date, &facts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cost::pricing::CostModel;
    use chrono::{Local, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fact(model: &str, input: u64, output: u64, cost: f64, day: u32) -> UsageFact {
        let ts = Local.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
        UsageFact::new(model, input, output, cost, ts)
    }

    #[test]
    fn two_lines_same_model() {
        let costs = CostModel::default();
        let facts = vec![
            fact("A", 100, 50, costs.cost("A", 100, 50), 1),
            fact("A", 200, 100, costs.cost("A", 200, 100), 1),
        ];
        let day = merge(None, date(2024, 1, 1), &facts);

        assert_eq!(day.date, date(2024, 1, 1));
        let a = &day.models["A"];
        assert_eq!(a.input_tokens, 300);
        assert_eq!(a.output_tokens, 150);
        assert_eq!(a.total_tokens, 450);
        assert_eq!(a.calls, 2);
        assert!((a.cost - costs.cost("A", 300, 150)).abs() < 1e-12);
        assert_eq!(day.total_tokens, 450);
    }

    #[test]
    fn empty_input_yields_zero_record() {
        let day = merge(None, date(2024, 1, 1), &Vec::<UsageFact>::new());
        assert!(day.models.is_empty());
        assert_eq!(day.total_tokens, 0);
        assert_eq!(day.total_cost, 0.0);
    }

    #[test]
    fn totals_are_derived_from_models() {
        let facts = vec![
            fact("A", 10, 5, 0.1, 1),
            fact("B", 20, 5, 0.2, 1),
            fact("C", 1, 1, 0.3, 1),
            fact("B", 7, 3, 0.4, 1),
        ];
        let day = merge(None, date(2024, 1, 1), &facts);
        let token_sum: u64 = day.models.values().map(|m| m.total_tokens).sum();
        let cost_sum: f64 = day.models.values().map(|m| m.cost).sum();
        assert_eq!(day.total_tokens, token_sum);
        assert!((day.total_cost - cost_sum).abs() < 1e-12);
        for stat in day.models.values() {
            assert_eq!(stat.total_tokens, stat.input_tokens + stat.output_tokens);
            assert!(stat.calls >= 1);
        }
    }

    #[test]
    fn merge_into_existing_adds() {
        let first = merge(None, date(2024, 1, 1), &vec![fact("A", 10, 5, 0.1, 1)]);
        let second = merge(
            Some(first),
            date(2024, 1, 1),
            &vec![fact("A", 1, 1, 0.01, 1), fact("B", 2, 2, 0.02, 1)],
        );
        assert_eq!(second.models["A"].input_tokens, 11);
        assert_eq!(second.models["A"].calls, 2);
        assert_eq!(second.models["B"].calls, 1);
        assert_eq!(second.total_tokens, 15 + 2 + 4);
    }

    #[test]
    fn stale_totals_on_existing_are_not_trusted() {
        let mut existing = merge(None, date(2024, 1, 1), &vec![fact("A", 10, 5, 0.1, 1)]);
        existing.total_tokens = 1_000_000;
        existing.total_cost = 99.0;
        let day = merge(Some(existing), date(2024, 1, 1), &Vec::<UsageFact>::new());
        assert_eq!(day.total_tokens, 15);
        assert!((day.total_cost - 0.1).abs() < 1e-12);
    }

    #[test]
    fn additivity_of_disjoint_sets() {
        let set_a = vec![fact("A", 10, 5, 0.1, 1), fact("B", 3, 4, 0.05, 1)];
        let set_b = vec![fact("A", 7, 2, 0.2, 1), fact("C", 1, 9, 0.3, 1)];

        let together: Vec<UsageFact> = set_a.iter().chain(set_b.iter()).cloned().collect();
        let combined = merge(None, date(2024, 1, 1), &together);

        let left = merge(None, date(2024, 1, 1), &set_a);
        let right = merge(None, date(2024, 1, 1), &set_b);
        let mut summed = left.clone();
        for (model, stat) in &right.models {
            summed.models.entry(model.clone()).or_default().absorb(stat);
        }
        summed.recompute_totals();

        assert_eq!(combined.models.len(), summed.models.len());
        for (model, stat) in &combined.models {
            let other = &summed.models[model];
            assert_eq!(stat.input_tokens, other.input_tokens);
            assert_eq!(stat.output_tokens, other.output_tokens);
            assert_eq!(stat.total_tokens, other.total_tokens);
            assert_eq!(stat.calls, other.calls);
            assert!((stat.cost - other.cost).abs() < 1e-12);
        }
        assert_eq!(combined.total_tokens, summed.total_tokens);
        assert!((combined.total_cost - summed.total_cost).abs() < 1e-12);
    }

    #[test]
    fn facts_for_other_days_are_ignored() {
        let facts = vec![fact("A", 10, 5, 0.1, 1), fact("A", 99, 99, 9.9, 2)];
        let day = merge(None, date(2024, 1, 1), &facts);
        assert_eq!(day.models["A"].calls, 1);
        assert_eq!(day.total_tokens, 15);
    }

    #[test]
    fn aggregate_partitions_by_date() {
        let facts = vec![
            fact("A", 1, 1, 0.1, 2),
            fact("A", 1, 1, 0.1, 1),
            fact("B", 2, 2, 0.2, 2),
        ];
        let days = aggregate(facts);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, date(2024, 1, 1));
        assert_eq!(days[0].total_tokens, 2);
        assert_eq!(days[1].date, date(2024, 1, 2));
        assert_eq!(days[1].models.len(), 2);
    }

    #[test]
    fn replaying_full_log_converges() {
        let facts = vec![fact("A", 10, 5, 0.1, 1), fact("A", 1, 1, 0.01, 1)];
        let first = aggregate(facts.clone());
        let second = aggregate(facts);
        assert_eq!(first, second);
    }
}
