use chrono::Utc;
use clap::Args;
use dealpulse_db::{migrations, DemoSeedDataset, SeedResult};

use crate::commands::{build_runtime, load_config, open_pool, CommandResult, Failure};

#[derive(Debug, Clone, Default, Args)]
pub struct SeedArgs {
    /// Remove demo rows instead of loading them
    #[arg(long)]
    pub clean: bool,
}

pub fn run(args: &SeedArgs) -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        if args.clean {
            DemoSeedDataset::clean(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
            pool.close().await;
            return Ok(None);
        }

        let seed_result = DemoSeedDataset::load(&pool, Utc::now().date_naive())
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<Option<SeedResult>, Failure> = if verification.all_present {
            Ok(Some(seed_result))
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed_checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(Some(seeded)) => CommandResult::success_with_data(
            "seed",
            format!(
                "demo storefront loaded: {} deals, {} new orders; run `dealpulse backfill` to reconcile redemptions",
                seeded.deals_seeded, seeded.orders_seeded
            ),
            &seeded,
        ),
        Ok(None) => CommandResult::success("seed", "demo storefront rows removed"),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["demo-orders", "order-items-linked"]),
            "Seed verification failed for checks: demo-orders, order-items-linked"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }
}
