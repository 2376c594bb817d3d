use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::output::{emit, OutputOptions};
use crate::cli::renderer;
use crate::core::budget::BudgetCheck;
use crate::core::context::AppContext;
use crate::core::models::day::DayRecord;
use crate::core::reports;

#[derive(Serialize)]
struct TodayPayload<'a> {
    #[serde(flatten)]
    day: &'a DayRecord,
    budget: BudgetCheck,
}

pub fn today(ctx: &AppContext, opts: &OutputOptions) -> Result<()> {
    let day = reports::today_snapshot(&ctx.store, Local::now().date_naive());
    let check = ctx.budget.classify(day.total_cost);
    if opts.is_json() {
        return opts.print_json(&TodayPayload { day: &day, budget: check });
    }
    println!("{}", renderer::render_day("Today", &day, &check, opts.use_color));
    Ok(())
}

pub fn week(ctx: &AppContext, days: u32, opts: &OutputOptions) -> Result<()> {
    let window = reports::stored_window(&ctx.store, Local::now().date_naive(), days);
    if opts.is_json() {
        return opts.print_json(&window);
    }
    println!("{}", renderer::render_window(&window, opts.use_color));
    Ok(())
}

pub fn range(ctx: &AppContext, from: NaiveDate, to: NaiveDate, opts: &OutputOptions) -> Result<()> {
    let days = reports::stored_range(&ctx.store, from, to);
    if opts.is_json() {
        return opts.print_json(&days);
    }
    if days.is_empty() {
        println!("No usage recorded between {} and {}.", from, to);
        return Ok(());
    }
    println!("{}", renderer::render_window(&days, opts.use_color));
    Ok(())
}

pub fn all_time(ctx: &AppContext, opts: &OutputOptions) -> Result<()> {
    let ledger = ctx.store.load_ledger().context("Failed to load session ledger")?;
    let stats = reports::all_time(&ctx.store.load_all_days(), &ledger.sessions);
    if opts.is_json() {
        return opts.print_json(&stats);
    }
    println!("{}", renderer::render_all_time(&stats, opts.use_color));
    Ok(())
}

pub fn export_csv(ctx: &AppContext, output: Option<&Path>) -> Result<()> {
    let csv = reports::export_csv(&ctx.store.load_all_days())?;
    emit(&csv, output)
}

pub fn export_weekly(ctx: &AppContext, output: Option<&Path>, opts: &OutputOptions) -> Result<()> {
    let window = reports::stored_window(&ctx.store, Local::now().date_naive(), reports::WEEK_DAYS);
    let report = reports::weekly_report(window);
    if opts.is_json() && output.is_none() {
        return opts.print_json(&report);
    }
    emit(&report.to_markdown(), output)
}

/// Markdown brief for `date`, as stored right now.
pub fn render_brief(ctx: &AppContext, date: NaiveDate) -> String {
    reports::daily_brief(date, ctx.store.day_or_none(date).as_ref(), &ctx.budget)
}

/// Write the brief for `date` into the notes directory. An existing note is
/// left alone and `Ok(None)` is returned.
pub fn write_note(ctx: &AppContext, date: NaiveDate) -> Result<Option<PathBuf>> {
    let path = ctx.notes_dir.join(format!("{}.md", date.format("%Y-%m-%d")));
    if path.exists() {
        return Ok(None);
    }
    std::fs::create_dir_all(&ctx.notes_dir)
        .with_context(|| format!("Failed to create {}", ctx.notes_dir.display()))?;
    std::fs::write(&path, render_brief(ctx, date))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}

pub fn brief(ctx: &AppContext, date: Option<NaiveDate>, write: bool) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    if !write {
        print!("{}", render_brief(ctx, date));
        return Ok(());
    }
    let expected = ctx.notes_dir.join(format!("{}.md", date.format("%Y-%m-%d")));
    match write_note(ctx, date)? {
        Some(path) => println!("Created note: {}", path.display()),
        None => println!("Note already exists: {}", expected.display()),
    }
    Ok(())
}
