mod cli;
mod core;
mod logging;
mod server;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::AppConfig;
use crate::core::context::AppContext;

#[derive(Parser)]
#[command(name = "tkm", about = "Daily token usage and cost tracking for AI agent sessions", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the latest session log into daily records (default)
    Extract,
    /// Show today's usage and budget status
    Today,
    /// Show the trailing window of daily totals
    Week {
        /// Number of days ending today
        #[arg(
            short,
            long,
            default_value_t = 7,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(crate::core::reports::MAX_WINDOW_DAYS))
        )]
        days: u32,
    },
    /// Show the stored days between two dates (inclusive)
    Range {
        /// First day (YYYY-MM-DD)
        from: NaiveDate,
        /// Last day (YYYY-MM-DD)
        to: NaiveDate,
    },
    /// Show the all-time rollup
    AllTime,
    /// Export usage data
    Export {
        #[command(subcommand)]
        kind: ExportKind,
    },
    /// Render the Markdown brief for a day
    Brief {
        /// Day to render (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Save it as a note in the notes directory instead of printing
        #[arg(short, long)]
        write: bool,
    },
    /// Extract, then write today's brief note
    Cron,
    /// Record a session payload (JSON) from a file or stdin
    Record {
        /// Payload file, or `-` for stdin
        path: Option<PathBuf>,
    },
    /// Serve the usage API over HTTP
    Serve {
        /// Port to listen on (default from config or $PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ExportKind {
    /// One row per date and model
    Csv {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Markdown report for the last 7 days
    Weekly {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = AppConfig::load();
    let settings = loaded
        .as_ref()
        .map(|c| c.settings.clone())
        .unwrap_or_default();

    let output_opts = cli::output::OutputOptions {
        format: cli::output::OutputFormat::resolve(
            cli.json,
            cli.format.as_deref(),
            &settings.default_format,
        ),
        pretty: cli.pretty,
        use_color: cli::output::detect_color(!cli.no_color, &settings.color),
    };
    logging::init_logging(cli.verbose, output_opts.use_color);

    let command = cli.command.unwrap_or(Commands::Extract);
    if let Commands::Config { action } = &command {
        return match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts),
            ConfigAction::Check => cli::config_cmd::check(&output_opts),
        };
    }

    let config = loaded.context("Failed to load config")?;
    let ctx = AppContext::from_config(&config);

    match command {
        Commands::Extract => cli::extract_cmd::run(&ctx, &output_opts)?,
        Commands::Today => cli::report_cmd::today(&ctx, &output_opts)?,
        Commands::Week { days } => cli::report_cmd::week(&ctx, days, &output_opts)?,
        Commands::Range { from, to } => cli::report_cmd::range(&ctx, from, to, &output_opts)?,
        Commands::AllTime => cli::report_cmd::all_time(&ctx, &output_opts)?,
        Commands::Export { kind } => match kind {
            ExportKind::Csv { output } => cli::report_cmd::export_csv(&ctx, output.as_deref())?,
            ExportKind::Weekly { output } => {
                cli::report_cmd::export_weekly(&ctx, output.as_deref(), &output_opts)?
            }
        },
        Commands::Brief { date, write } => cli::report_cmd::brief(&ctx, date, write)?,
        Commands::Cron => cli::extract_cmd::cron(&ctx, &output_opts)?,
        Commands::Record { path } => cli::record_cmd::run(&ctx, path.as_deref(), &output_opts)?,
        Commands::Serve { port } => server::serve(ctx, port.unwrap_or(config.server.port)).await?,
        // Handled before the config is required.
        Commands::Config { .. } => {}
    }

    Ok(())
}
