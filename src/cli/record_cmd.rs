use anyhow::{Context, Result};
use chrono::Local;
use std::io::Read;
use std::path::Path;

use crate::cli::output::OutputOptions;
use crate::core::context::AppContext;
use crate::core::formatter::format_thousands;
use crate::core::recorder::{record_session, SessionPayload};

fn read_input(source: Option<&Path>) -> Result<String> {
    match source {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read session payload from stdin")?;
            Ok(raw)
        }
    }
}

/// Record one session payload from a file, or stdin for `-`/no argument.
pub fn run(ctx: &AppContext, source: Option<&Path>, opts: &OutputOptions) -> Result<()> {
    let raw = read_input(source)?;
    let payload = SessionPayload::from_json(&raw).context("Invalid session payload")?;
    let summary = record_session(&ctx.store, &ctx.cost_model, &payload, Local::now())
        .context("Failed to record session")?;

    if opts.is_json() {
        return opts.print_json(&serde_json::json!({ "success": true, "session": summary }));
    }
    println!(
        "Recorded session for {}: {} tokens, ${:.4} across {} model{}",
        summary.date,
        format_thousands(summary.total_tokens),
        summary.total_cost,
        summary.models.len(),
        if summary.models.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
