use chrono::Utc;
use clap::Args;

use crate::commands::report::RangeArgs;
use crate::commands::{
    application_failure, build_runtime, load_config, open_pool, service_for, CommandResult,
};

#[derive(Debug, Clone, Default, Args)]
pub struct BackfillArgs {
    #[command(flatten)]
    pub range: RangeArgs,
    /// Report what would be reconciled without writing events
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: &BackfillArgs) -> CommandResult {
    let config = match load_config("backfill") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    // No range flags means every order on record.
    let range = if args.range.is_empty() {
        None
    } else {
        match args.range.resolve(Utc::now().date_naive(), config.analytics.default_range_days) {
            Ok(range) => Some(range),
            Err(error) => {
                return CommandResult::from_failure(
                    "backfill",
                    application_failure("backfill", error.into()),
                )
            }
        }
    };

    let runtime = match build_runtime("backfill") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = service_for(&config, pool.clone());
        let report = service
            .backfill(range, args.dry_run)
            .await
            .map_err(|error| application_failure("backfill", error));
        pool.close().await;
        report
    });

    match result {
        Ok(report) => {
            let verb = if report.dry_run { "would create" } else { "created" };
            CommandResult::success_with_data(
                "backfill",
                format!(
                    "scanned {} orders, matched {} deals, {verb} {} events",
                    report.processed, report.deals_found, report.events_created
                ),
                &report,
            )
        }
        Err(failure) => CommandResult::from_failure("backfill", failure),
    }
}
