use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::cli::output::OutputOptions;
use crate::cli::renderer;
use crate::cli::report_cmd;
use crate::core::context::AppContext;
use crate::core::pipeline::{run_extract, ExtractOutcome};
use crate::core::reports;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CronPayload {
    extract: ExtractOutcome,
    /// `None` when today's note already existed.
    note: Option<PathBuf>,
}

fn extract(ctx: &AppContext, opts: &OutputOptions) -> Result<ExtractOutcome> {
    let outcome = run_extract(&ctx.sessions_dir, &ctx.store, &ctx.parser())?;
    if !opts.is_json() {
        let today = reports::today_snapshot(&ctx.store, Local::now().date_naive());
        let check = ctx.budget.classify(today.total_cost);
        let show_today = matches!(outcome, ExtractOutcome::Updated(_));
        println!(
            "{}",
            renderer::render_extract(
                &outcome,
                show_today.then_some((&today, &check)),
                opts.use_color
            )
        );
    }
    Ok(outcome)
}

/// Zero-argument batch run: parse the latest session log and persist every day it covers.
pub fn run(ctx: &AppContext, opts: &OutputOptions) -> Result<()> {
    let outcome = extract(ctx, opts)?;
    if opts.is_json() {
        opts.print_json(&outcome)?;
    } else if matches!(outcome, ExtractOutcome::Updated(_)) {
        println!("\nData saved to: {}", ctx.store.root().display());
    }
    Ok(())
}

/// Scheduled job: extract, then write today's brief note.
pub fn cron(ctx: &AppContext, opts: &OutputOptions) -> Result<()> {
    info!(at = %Local::now().to_rfc3339(), "Daily usage job started");
    let outcome = extract(ctx, opts)?;
    let today = Local::now().date_naive();
    let note = report_cmd::write_note(ctx, today)?;

    if opts.is_json() {
        return opts.print_json(&CronPayload {
            extract: outcome,
            note,
        });
    }
    match &note {
        Some(path) => println!("\nCreated note: {}", path.display()),
        None => println!("\nNote for {} already exists", today),
    }
    Ok(())
}
