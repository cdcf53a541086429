use clap::Args;
use dealpulse_db::migrations;

use crate::commands::{build_runtime, load_config, open_pool, CommandResult};

#[derive(Debug, Clone, Default, Args)]
pub struct MigrateArgs {
    /// Roll back the analytics tables, leaving storefront tables in place
    #[arg(long)]
    pub revert_analytics: bool,
}

pub fn run(args: &MigrateArgs) -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        if args.revert_analytics {
            migrations::MIGRATOR
                .undo(&pool, migrations::ANALYTICS_SCHEMA_VERSION - 1)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;
        }
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) if args.revert_analytics => {
            CommandResult::success("migrate", "reverted analytics migration")
        }
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
