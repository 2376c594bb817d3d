use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::core::budget::BudgetEvaluator;
use crate::core::formatter::{format_thousands, short_model_name};
use crate::core::models::day::DayRecord;
use crate::core::models::report::{
    AllTimeStats, ModelBreakdown, ModelTotals, UsageOverview, WeeklyReport,
};
use crate::core::models::session::SessionSummary;
use crate::core::store::DataStore;

/// Window used by the dashboard overview and the weekly report.
pub const WEEK_DAYS: u32 = 7;

/// Longest trailing window the CLI accepts.
pub const MAX_WINDOW_DAYS: u32 = 3660;

const CSV_HEADER: [&str; 7] = [
    "Date",
    "Model",
    "Input Tokens",
    "Output Tokens",
    "Total Tokens",
    "Cost",
    "Calls",
];

/// Today's record, or a zero-valued one when nothing has been persisted yet.
pub fn today_snapshot(store: &DataStore, today: NaiveDate) -> DayRecord {
    store
        .day_or_none(today)
        .unwrap_or_else(|| DayRecord::empty(today))
}

/// The `days` calendar dates ending at `today`, oldest first. Dates `lookup`
/// has nothing for become zero-valued placeholders. Dates before the
/// calendar's start are dropped.
pub fn trailing_window<F>(today: NaiveDate, days: u32, mut lookup: F) -> Vec<DayRecord>
where
    F: FnMut(NaiveDate) -> Option<DayRecord>,
{
    (0..days)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
        .map(|date| lookup(date).unwrap_or_else(|| DayRecord::empty(date)))
        .collect()
}

/// Trailing window read from the store.
pub fn stored_window(store: &DataStore, today: NaiveDate, days: u32) -> Vec<DayRecord> {
    trailing_window(today, days, |date| store.day_or_none(date))
}

/// Stored records dated `start..=end`, oldest first. Missing dates are
/// omitted rather than filled.
pub fn stored_range(store: &DataStore, start: NaiveDate, end: NaiveDate) -> Vec<DayRecord> {
    store
        .recorded_dates()
        .into_iter()
        .filter(|date| (start..=end).contains(date))
        .filter_map(|date| store.day_or_none(date))
        .collect()
}

/// Fold every day record into per-model totals; sessions come from the ledger.
pub fn all_time(days: &[DayRecord], sessions: &[SessionSummary]) -> AllTimeStats {
    let mut stats = AllTimeStats {
        total_sessions: sessions.len(),
        ..AllTimeStats::default()
    };

    for day in days {
        stats.days_recorded += 1;
        stats.first_date = Some(stats.first_date.map_or(day.date, |d| d.min(day.date)));
        stats.last_date = Some(stats.last_date.map_or(day.date, |d| d.max(day.date)));

        for (model, stat) in &day.models {
            let totals = stats.models.entry(model.clone()).or_default();
            totals.total_tokens += stat.total_tokens;
            totals.total_cost += stat.cost;
            totals.calls += stat.calls;
        }
    }

    stats.total_tokens = stats.models.values().map(|m| m.total_tokens).sum();
    stats.total_cost = stats.models.values().map(|m| m.total_cost).sum();
    stats
}

/// Dashboard payload: today, the trailing week and the all-time rollup.
pub fn usage_overview(store: &DataStore, today: NaiveDate) -> UsageOverview {
    let sessions = match store.load_ledger() {
        Ok(ledger) => ledger.sessions,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable session ledger");
            Vec::new()
        }
    };
    UsageOverview {
        today: today_snapshot(store, today),
        week: stored_window(store, today, WEEK_DAYS),
        all_time: all_time(&store.load_all_days(), &sessions),
    }
}

/// One row per (date, model) pair, in the order the days are given.
pub fn export_csv(days: &[DayRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for day in days {
        for (model, stat) in &day.models {
            writer.write_record(&[
                day.date.to_string(),
                model.clone(),
                stat.input_tokens.to_string(),
                stat.output_tokens.to_string(),
                stat.total_tokens.to_string(),
                stat.cost.to_string(),
                stat.calls.to_string(),
            ])?;
        }
    }
    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Markdown brief for one day. `None` renders the "no usage" placeholder.
pub fn daily_brief(date: NaiveDate, day: Option<&DayRecord>, budget: &BudgetEvaluator) -> String {
    let mut out = format!("# AI Usage - {}\n\n", date);
    let day = match day {
        Some(day) => day,
        None => {
            out.push_str("No usage recorded for this day.\n");
            return out;
        }
    };

    let check = budget.classify(day.total_cost);
    let _ = writeln!(out, "## Budget Status");
    let _ = writeln!(
        out,
        "- **Spent:** ${:.2} / ${}",
        check.spent,
        budget.daily_budget()
    );
    let _ = writeln!(out, "- **Remaining:** ${:.2}", check.remaining);
    let _ = writeln!(out, "- **Usage:** {:.1}%", check.percent);
    out.push('\n');

    let _ = writeln!(out, "## Model Usage\n");
    let _ = writeln!(out, "| Model | Tokens | Cost | Calls |");
    let _ = writeln!(out, "|-------|--------|------|-------|");
    for (model, stat) in day.models_by_tokens() {
        let _ = writeln!(
            out,
            "| {} | {} | ${:.4} | {} |",
            short_model_name(model),
            format_thousands(stat.total_tokens),
            stat.cost,
            stat.calls
        );
    }

    let _ = writeln!(
        out,
        "\n**Total:** {} tokens, ${:.4}",
        format_thousands(day.total_tokens),
        day.total_cost
    );
    let _ = writeln!(out, "\n## Summary");
    let _ = writeln!(out, "{}", check.status.summary());
    out
}

/// Totals over a trailing window plus a per-model breakdown by descending cost.
pub fn weekly_report(window: Vec<DayRecord>) -> WeeklyReport {
    let total_cost: f64 = window.iter().map(|d| d.total_cost).sum();
    let total_tokens: u64 = window.iter().map(|d| d.total_tokens).sum();
    let average_daily_cost = if window.is_empty() {
        0.0
    } else {
        total_cost / window.len() as f64
    };

    let mut per_model: BTreeMap<&str, ModelTotals> = BTreeMap::new();
    for day in &window {
        for (model, stat) in &day.models {
            let totals = per_model.entry(model.as_str()).or_default();
            totals.total_tokens += stat.total_tokens;
            totals.total_cost += stat.cost;
            totals.calls += stat.calls;
        }
    }
    let mut by_model: Vec<ModelBreakdown> = per_model
        .into_iter()
        .map(|(model, totals)| ModelBreakdown {
            model: model.to_string(),
            total_tokens: totals.total_tokens,
            cost: totals.total_cost,
            calls: totals.calls,
        })
        .collect();
    by_model.sort_by(|a, b| b.cost.total_cmp(&a.cost).then_with(|| a.model.cmp(&b.model)));

    WeeklyReport {
        days: window,
        total_cost,
        total_tokens,
        average_daily_cost,
        by_model,
    }
}

impl WeeklyReport {
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Weekly Model Usage Report\n\n");
        let _ = writeln!(out, "## Summary (Last {} Days)\n", self.days.len());
        let _ = writeln!(out, "- **Total Cost:** ${:.2}", self.total_cost);
        let _ = writeln!(
            out,
            "- **Total Tokens:** {}",
            format_thousands(self.total_tokens)
        );
        let _ = writeln!(out, "- **Avg Daily Cost:** ${:.2}\n", self.average_daily_cost);

        let _ = writeln!(out, "## Daily Breakdown\n");
        let _ = writeln!(out, "| Date | Cost | Tokens |");
        let _ = writeln!(out, "|------|------|--------|");
        for day in &self.days {
            let _ = writeln!(
                out,
                "| {} | ${:.2} | {} |",
                day.date,
                day.total_cost,
                format_thousands(day.total_tokens)
            );
        }

        let _ = writeln!(out, "\n## Model Breakdown\n");
        let _ = writeln!(out, "| Model | Cost | Tokens |");
        let _ = writeln!(out, "|-------|------|--------|");
        for model in &self.by_model {
            let _ = writeln!(
                out,
                "| {} | ${:.2} | {} |",
                model.model,
                model.cost,
                format_thousands(model.total_tokens)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::day::ModelStat;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn stat(input: u64, output: u64, cost: f64, calls: u64) -> ModelStat {
        ModelStat {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
            cost,
            calls,
        }
    }

    fn day(d: NaiveDate, models: &[(&str, ModelStat)]) -> DayRecord {
        let mut record = DayRecord::empty(d);
        for (name, stat) in models {
            record.models.insert(name.to_string(), stat.clone());
        }
        record.recompute_totals();
        record
    }

    #[test]
    fn window_fills_gaps_with_placeholders() {
        let today = date(2024, 1, 7);
        let present = [
            day(date(2024, 1, 2), &[("A", stat(10, 5, 0.5, 1))]),
            day(date(2024, 1, 6), &[("B", stat(1, 1, 0.25, 2))]),
        ];
        let window = trailing_window(today, 7, |d| present.iter().find(|r| r.date == d).cloned());

        assert_eq!(window.len(), 7);
        let dates: Vec<NaiveDate> = window.iter().map(|r| r.date).collect();
        let expected: Vec<NaiveDate> = (1..=7).map(|d| date(2024, 1, d)).collect();
        assert_eq!(dates, expected);
        let placeholders = window.iter().filter(|r| r.is_empty()).count();
        assert_eq!(placeholders, 5);
        for record in window.iter().filter(|r| r.is_empty()) {
            assert_eq!(record.total_tokens, 0);
            assert_eq!(record.total_cost, 0.0);
        }
        assert_eq!(window[1].total_tokens, 15);
    }

    #[test]
    fn window_crosses_month_boundary() {
        let window = trailing_window(date(2024, 3, 1), 3, |_| None);
        assert_eq!(window[0].date, date(2024, 2, 28));
        assert_eq!(window[1].date, date(2024, 2, 29));
        assert_eq!(window[2].date, date(2024, 3, 1));
    }

    #[test]
    fn window_stops_at_calendar_start() {
        let window = trailing_window(NaiveDate::MIN, 3, |_| None);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].date, NaiveDate::MIN);
    }

    #[test]
    fn range_returns_stored_days_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        for d in [1, 3, 5, 9] {
            store
                .save_day(&day(date(2024, 1, d), &[("A", stat(d.into(), 0, 0.5, 1))]))
                .unwrap();
        }
        std::fs::write(store.day_path(date(2024, 1, 4)), "{ not json").unwrap();

        let range = stored_range(&store, date(2024, 1, 3), date(2024, 1, 5));
        let dates: Vec<NaiveDate> = range.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 3), date(2024, 1, 5)]);
        assert_eq!(range[1].total_tokens, 5);

        assert!(stored_range(&store, date(2024, 1, 6), date(2024, 1, 2)).is_empty());
    }

    #[test]
    fn today_snapshot_defaults_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        let snapshot = today_snapshot(&store, date(2024, 1, 1));
        assert_eq!(snapshot, DayRecord::empty(date(2024, 1, 1)));

        let saved = day(date(2024, 1, 1), &[("A", stat(1, 2, 0.5, 1))]);
        store.save_day(&saved).unwrap();
        assert_eq!(today_snapshot(&store, date(2024, 1, 1)), saved);
    }

    #[test]
    fn all_time_folds_days_and_counts_sessions() {
        let days = [
            day(date(2024, 1, 3), &[("A", stat(10, 0, 1.0, 1))]),
            day(
                date(2024, 1, 1),
                &[("A", stat(5, 5, 0.5, 2)), ("B", stat(1, 1, 0.25, 1))],
            ),
        ];
        let session = SessionSummary {
            timestamp: Utc::now(),
            date: date(2024, 1, 1),
            models: BTreeMap::new(),
            total_tokens: 0,
            total_cost: 0.0,
            session_duration: 0,
        };
        let stats = all_time(&days, &[session.clone(), session]);

        assert_eq!(stats.days_recorded, 2);
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.first_date, Some(date(2024, 1, 1)));
        assert_eq!(stats.last_date, Some(date(2024, 1, 3)));
        assert_eq!(stats.models["A"].total_tokens, 20);
        assert_eq!(stats.models["A"].calls, 3);
        assert_eq!(stats.total_tokens, 22);
        assert!((stats.total_cost - 1.75).abs() < 1e-12);
    }

    #[test]
    fn all_time_of_nothing_is_zero() {
        let stats = all_time(&[], &[]);
        assert_eq!(stats, AllTimeStats::default());
    }

    #[test]
    fn csv_has_one_row_per_date_model_pair() {
        let days: Vec<DayRecord> = (1..=3)
            .map(|d| {
                day(
                    date(2024, 1, d),
                    &[("A", stat(100, 50, 0.5, 2)), ("B", stat(10, 5, 0.25, 1))],
                )
            })
            .collect();
        let csv = export_csv(&days).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 7);
        assert_eq!(
            lines[0],
            "Date,Model,Input Tokens,Output Tokens,Total Tokens,Cost,Calls"
        );
        assert_eq!(lines[1], "2024-01-01,A,100,50,150,0.5,2");
        assert_eq!(lines[2], "2024-01-01,B,10,5,15,0.25,1");
        assert!(lines[6].starts_with("2024-01-03,B,"));
    }

    #[test]
    fn csv_quotes_awkward_model_names() {
        let days = [day(date(2024, 1, 1), &[("vendor,model", stat(1, 1, 0.5, 1))])];
        let csv = export_csv(&days).unwrap();
        assert!(csv.contains("\"vendor,model\""));
    }

    #[test]
    fn csv_of_nothing_is_header_only() {
        let csv = export_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn brief_without_data_is_placeholder() {
        let brief = daily_brief(date(2024, 1, 1), None, &BudgetEvaluator::new(20.0));
        assert_eq!(brief, "# AI Usage - 2024-01-01\n\nNo usage recorded for this day.\n");
    }

    #[test]
    fn brief_orders_models_by_tokens() {
        let record = day(
            date(2024, 1, 1),
            &[
                ("minimax/small", stat(10, 0, 0.5, 1)),
                ("minimax/big", stat(1_000, 500, 4.0, 3)),
            ],
        );
        let brief = daily_brief(record.date, Some(&record), &BudgetEvaluator::new(20.0));

        assert!(brief.starts_with("# AI Usage - 2024-01-01\n"));
        assert!(brief.contains("- **Spent:** $4.50 / $20"));
        assert!(brief.contains("- **Remaining:** $15.50"));
        assert!(brief.contains("- **Usage:** 22.5%"));
        let big = brief.find("| big | 1,500 | $4.0000 | 3 |").unwrap();
        let small = brief.find("| small | 10 | $0.5000 | 1 |").unwrap();
        assert!(big < small);
        assert!(brief.contains("**Total:** 1,510 tokens, $4.5000"));
        assert!(brief.trim_end().ends_with("Within budget."));
    }

    #[test]
    fn brief_summary_follows_budget_status() {
        let record = day(date(2024, 1, 1), &[("A", stat(1, 1, 19.0, 1))]);
        let brief = daily_brief(record.date, Some(&record), &BudgetEvaluator::new(20.0));
        assert!(brief.contains("Approaching daily budget limit!"));

        let over = day(date(2024, 1, 1), &[("A", stat(1, 1, 25.0, 1))]);
        let brief = daily_brief(over.date, Some(&over), &BudgetEvaluator::new(20.0));
        assert!(brief.contains("- **Remaining:** $0.00"));
    }

    #[test]
    fn weekly_report_totals_and_model_order() {
        let mut window = trailing_window(date(2024, 1, 7), 7, |_| None);
        window[0] = day(
            date(2024, 1, 1),
            &[("A", stat(100, 0, 1.0, 1)), ("B", stat(10, 0, 3.0, 1))],
        );
        window[6] = day(date(2024, 1, 7), &[("A", stat(50, 50, 2.5, 2))]);
        let report = weekly_report(window);

        assert_eq!(report.days.len(), 7);
        assert!((report.total_cost - 6.5).abs() < 1e-12);
        assert_eq!(report.total_tokens, 210);
        assert!((report.average_daily_cost - 6.5 / 7.0).abs() < 1e-12);
        assert_eq!(report.by_model[0].model, "A");
        assert!((report.by_model[0].cost - 3.5).abs() < 1e-12);
        assert_eq!(report.by_model[0].calls, 3);
        assert_eq!(report.by_model[1].model, "B");

        let md = report.to_markdown();
        assert!(md.contains("## Summary (Last 7 Days)"));
        assert!(md.contains("- **Total Cost:** $6.50"));
        assert!(md.contains("| 2024-01-03 | $0.00 | 0 |"));
        assert!(md.find("| A | $3.50 | 200 |").unwrap() < md.find("| B | $3.00 | 10 |").unwrap());
    }

    #[test]
    fn overview_reads_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::new(dir.path());
        store
            .save_day(&day(date(2024, 1, 5), &[("A", stat(1, 1, 0.5, 1))]))
            .unwrap();
        let overview = usage_overview(&store, date(2024, 1, 7));
        assert!(overview.today.is_empty());
        assert_eq!(overview.week.len(), 7);
        assert_eq!(overview.week[4].total_tokens, 2);
        assert_eq!(overview.all_time.days_recorded, 1);
        assert_eq!(overview.all_time.total_sessions, 0);
    }
}
