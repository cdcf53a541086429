pub mod commands;

use clap::{Parser, Subcommand};
use dealpulse_core::config::{AppConfig, LoadOptions, LogFormat};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use commands::ab_test::AbTestCommand;
use commands::backfill::BackfillArgs;
use commands::deals::DealsCommand;
use commands::migrate::MigrateArgs;
use commands::report::RangeArgs;
use commands::seed::SeedArgs;

#[derive(Debug, Parser)]
#[command(
    name = "dealpulse",
    about = "DealPulse ₹1 deal analytics CLI",
    long_about = "Reconcile deal redemptions, build analytics reports, reorder deals and run threshold A/B tests.",
    after_help = "Examples:\n  dealpulse migrate\n  dealpulse backfill --dry-run\n  dealpulse report --days 7\n  dealpulse ab-test list"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate(MigrateArgs),
    #[command(about = "Load a deterministic demo storefront (deals and 30 days of orders)")]
    Seed(SeedArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Compute the deal analytics report for a date range")]
    Report(RangeArgs),
    #[command(about = "Reconcile historical orders into deal purchase events")]
    Backfill(BackfillArgs),
    #[command(subcommand, about = "List or reorder deals")]
    Deals(DealsCommand),
    #[command(subcommand, name = "ab-test", about = "Manage threshold A/B tests")]
    AbTest(AbTestCommand),
}

/// Installs the global subscriber. Logs go to stderr so stdout stays machine-readable.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second init (e.g. in tests) is harmless, so its error is ignored.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Commands report config errors themselves; logging just stays off.
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate(args) => commands::migrate::run(&args),
        Command::Seed(args) => commands::seed::run(&args),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Report(args) => commands::report::run(&args),
        Command::Backfill(args) => commands::backfill::run(&args),
        Command::Deals(command) => commands::deals::run(&command),
        Command::AbTest(command) => commands::ab_test::run(&command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn backfill_flags_parse_into_range_and_dry_run() {
        let cli = Cli::try_parse_from([
            "dealpulse",
            "backfill",
            "--from",
            "2026-03-01",
            "--to",
            "2026-03-07",
            "--dry-run",
        ])
        .expect("args should parse");

        let Command::Backfill(args) = cli.command else {
            panic!("expected backfill command");
        };
        assert!(args.dry_run);
        assert_eq!(args.range.from.as_deref(), Some("2026-03-01"));
        assert_eq!(args.range.days, None);
    }

    #[test]
    fn ab_test_create_parses_decimal_and_date_flags() {
        let cli = Cli::try_parse_from([
            "dealpulse",
            "ab-test",
            "create",
            "--name",
            "Soap 449",
            "--deal",
            "deal-soap",
            "--a-threshold",
            "499",
            "--b-threshold",
            "449.50",
            "--start",
            "2026-04-01",
            "--end",
            "2026-04-15",
        ])
        .expect("args should parse");

        assert!(matches!(cli.command, Command::AbTest(_)));
    }
}
