use colored::{control, ColoredString, Colorize};

use crate::core::budget::{BudgetCheck, BudgetStatus};
use crate::core::formatter::{format_budget_bar, format_cost, format_thousands, format_tokens};
use crate::core::models::day::DayRecord;
use crate::core::models::report::AllTimeStats;
use crate::core::pipeline::ExtractOutcome;

const BAR_WIDTH: usize = 12;

fn color_by_status(status: BudgetStatus, text: &str) -> ColoredString {
    match status {
        BudgetStatus::Ok => text.green(),
        BudgetStatus::High => text.yellow(),
        BudgetStatus::Critical => text.red(),
    }
}

/// Render one day with its budget line.
///
/// Layout:
/// ```text
///  Today (2024-01-01)
///   Cost      $4.5000
///   Tokens    1,510
///   Budget    22.5% of $20 [███░░░░░░░░░]
///             On track
///   By Model:
///     • minimax/MiniMax-M2.1: 1,500 tokens, $4.0000
/// ```
pub fn render_day(label: &str, day: &DayRecord, check: &BudgetCheck, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(" {} ({})", label, day.date).bold().to_string());
    lines.push(format!("  {}      ${:.4}", "Cost".cyan(), day.total_cost));
    lines.push(format!(
        "  {}    {}",
        "Tokens".cyan(),
        format_thousands(day.total_tokens)
    ));

    let percent = format!("{:.1}% of ${}", check.percent, check.budget);
    lines.push(format!(
        "  {}    {} {}",
        "Budget".cyan(),
        color_by_status(check.status, &percent),
        format_budget_bar(check.percent, BAR_WIDTH).magenta()
    ));
    lines.push(format!(
        "            {}",
        color_by_status(check.status, check.status.headline())
    ));

    if !day.is_empty() {
        lines.push(format!("  {}:", "By Model".cyan()));
        for (model, stat) in day.models_by_tokens() {
            lines.push(format!(
                "    • {}: {} tokens, ${:.4}",
                model,
                format_thousands(stat.total_tokens),
                stat.cost
            ));
        }
    }

    lines.join("\n")
}

/// One line per day, oldest first, plus a window total.
pub fn render_window(days: &[DayRecord], use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(format!(" Last {} days", days.len()).bold().to_string());
    for day in days {
        let cost = format!("{:<8}", format_cost(day.total_cost));
        let line = format!(
            "  {:<12} {} {:>8} tokens",
            day.date.format("%a %b %d"),
            cost,
            format_tokens(day.total_tokens)
        );
        lines.push(if day.is_empty() {
            line.dimmed().to_string()
        } else {
            line
        });
    }
    let total_cost: f64 = days.iter().map(|d| d.total_cost).sum();
    let total_tokens: u64 = days.iter().map(|d| d.total_tokens).sum();
    lines.push(format!(
        "  {}        {} ({} tokens)",
        "Total".cyan(),
        format_cost(total_cost),
        format_thousands(total_tokens)
    ));
    lines.join("\n")
}

pub fn render_all_time(stats: &AllTimeStats, use_color: bool) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    lines.push(" All time".bold().to_string());
    lines.push(format!("  {}      {}", "Cost".cyan(), format_cost(stats.total_cost)));
    lines.push(format!(
        "  {}    {}",
        "Tokens".cyan(),
        format_thousands(stats.total_tokens)
    ));
    let span = match (stats.first_date, stats.last_date) {
        (Some(first), Some(last)) => format!("{} ({} to {})", stats.days_recorded, first, last),
        _ => "0".to_string(),
    };
    lines.push(format!("  {}      {}", "Days".cyan(), span));
    lines.push(format!("  {}  {}", "Sessions".cyan(), stats.total_sessions));

    if !stats.models.is_empty() {
        let mut models: Vec<_> = stats.models.iter().collect();
        models.sort_by(|a, b| b.1.total_cost.total_cmp(&a.1.total_cost).then(a.0.cmp(b.0)));
        lines.push(format!("  {}:", "By Model".cyan()));
        for (model, totals) in models {
            lines.push(format!(
                "    {:<24} ${:<8.2} ({} tokens, {} calls)",
                model,
                totals.total_cost,
                format_tokens(totals.total_tokens),
                totals.calls
            ));
        }
    }
    lines.join("\n")
}

/// Human-readable run summary for `extract`. `today` is shown only when the run
/// touched anything.
pub fn render_extract(
    outcome: &ExtractOutcome,
    today: Option<(&DayRecord, &BudgetCheck)>,
    use_color: bool,
) -> String {
    control::set_override(use_color);

    let mut lines: Vec<String> = Vec::new();
    match outcome {
        ExtractOutcome::NoSessionFiles { dir } => {
            lines.push(format!("No session files found in {}.", dir.display()));
        }
        ExtractOutcome::NoUsage { file, .. } => {
            lines.push(format!("Processing: {}", file.display()));
            lines.push("No usage data found in sessions.".to_string());
        }
        ExtractOutcome::Updated(report) => {
            lines.push(format!("Processing: {}", report.file.display()));
            for day in &report.days {
                lines.push(format!(
                    "Updated: {} - ${:.4} ({} tokens)",
                    day.date,
                    day.total_cost,
                    format_thousands(day.total_tokens)
                ));
            }
            if report.skipped_lines > 0 {
                lines.push(
                    format!("Skipped {} lines without usage", report.skipped_lines)
                        .dimmed()
                        .to_string(),
                );
            }
            if let Some((day, check)) = today {
                lines.push(String::new());
                lines.push(render_day("Today", day, check, use_color));
            }
        }
    }
    lines.join("\n")
}
