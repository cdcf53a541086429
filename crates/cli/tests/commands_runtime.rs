use std::env;
use std::sync::{Mutex, OnceLock};

use dealpulse_cli::commands::ab_test::{AbTestCommand, CreateArgs, RecordArgs, TransitionArgs};
use dealpulse_cli::commands::backfill::BackfillArgs;
use dealpulse_cli::commands::deals::{DealsCommand, ReorderArgs};
use dealpulse_cli::commands::migrate::MigrateArgs;
use dealpulse_cli::commands::report::RangeArgs;
use dealpulse_cli::commands::seed::SeedArgs;
use dealpulse_cli::commands::{ab_test, backfill, config, deals, doctor, migrate, report, seed};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_database(|| {
        let result = migrate::run(&MigrateArgs::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_bad_env_override() {
    with_env(&[("DEALPULSE_DATABASE_MAX_CONNECTIONS", "many")], || {
        let result = migrate::run(&MigrateArgs::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_database(|| {
        let first = seed::run(&SeedArgs::default());
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["data"]["deals_seeded"], 6);
        assert!(first_payload["data"]["orders_seeded"].as_u64().unwrap_or(0) > 0);

        let second = seed::run(&SeedArgs::default());
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["data"]["orders_seeded"], 0);
    });
}

#[test]
fn backfill_then_report_over_seeded_history() {
    with_database(|| {
        assert_eq!(seed::run(&SeedArgs::default()).exit_code, 0);

        let preview = backfill::run(&BackfillArgs { dry_run: true, ..BackfillArgs::default() });
        assert_eq!(preview.exit_code, 0);
        let preview = parse_payload(&preview.output);
        assert_eq!(preview["data"]["dry_run"], true);
        let planned = preview["data"]["events_created"].as_u64().unwrap_or(0);
        assert!(planned > 0, "demo history should contain deal line items");

        let applied = parse_payload(&backfill::run(&BackfillArgs::default()).output);
        assert_eq!(applied["data"]["events_created"].as_u64(), Some(planned));

        let repeated = parse_payload(&backfill::run(&BackfillArgs::default()).output);
        assert_eq!(repeated["data"]["events_created"], 0);

        let result = report::run(&RangeArgs { days: Some(30), ..RangeArgs::default() });
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "report");
        assert_eq!(payload["data"]["diagnostics"]["schema"], "ready");
        assert_eq!(payload["data"]["time_series"].as_array().map(Vec::len), Some(30));
        assert!(payload["data"]["top_deals"].as_array().is_some_and(|deals| !deals.is_empty()));
    });
}

#[test]
fn analytics_commands_before_migration_signal_setup_required() {
    with_database(|| {
        let result = backfill::run(&BackfillArgs::default());
        assert_eq!(result.exit_code, 6, "expected setup-required exit code");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "schema_not_initialized");

        let result = report::run(&RangeArgs::default());
        assert_eq!(result.exit_code, 0, "report degrades to an empty result");
        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["diagnostics"]["schema"], "missing");

        let result = doctor::run(true);
        assert_eq!(result.exit_code, 6);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
    });
}

#[test]
fn report_rejects_half_open_ranges() {
    with_database(|| {
        let args = RangeArgs { from: Some("2026-03-01".to_string()), ..RangeArgs::default() };
        let result = report::run(&args);
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "validation_error");
    });
}

#[test]
fn report_rejects_day_counts_beyond_a_year() {
    with_database(|| {
        let result = report::run(&RangeArgs { days: Some(u32::MAX), ..RangeArgs::default() });
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "validation_error");
    });
}

#[test]
fn doctor_passes_after_migration() {
    with_database(|| {
        assert_eq!(migrate::run(&MigrateArgs::default()).exit_code, 0);

        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "unexpected doctor output: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(4));
    });
}

#[test]
fn reverting_the_analytics_migration_keeps_storefront_data() {
    with_database(|| {
        assert_eq!(seed::run(&SeedArgs::default()).exit_code, 0);

        let result = migrate::run(&MigrateArgs { revert_analytics: true });
        assert_eq!(result.exit_code, 0);

        let listed = parse_payload(&deals::run(&DealsCommand::List).output);
        assert_eq!(listed["data"].as_array().map(Vec::len), Some(6));

        let result = backfill::run(&BackfillArgs::default());
        assert_eq!(result.exit_code, 6);
    });
}

#[test]
fn deals_reorder_moves_one_slot() {
    with_database(|| {
        assert_eq!(seed::run(&SeedArgs::default()).exit_code, 0);

        let result = deals::run(&DealsCommand::Reorder(ReorderArgs {
            deal_id: "deal-tea".to_string(),
            direction: "up".to_string(),
        }));
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"][1]["id"], "deal-tea");
        assert_eq!(payload["data"][1]["priority"], 2);

        let result = deals::run(&DealsCommand::Reorder(ReorderArgs {
            deal_id: "deal-tea".to_string(),
            direction: "sideways".to_string(),
        }));
        assert_eq!(result.exit_code, 7);

        let result = deals::run(&DealsCommand::Reorder(ReorderArgs {
            deal_id: "deal-missing".to_string(),
            direction: "down".to_string(),
        }));
        assert_eq!(result.exit_code, 7);
    });
}

#[test]
fn ab_test_lifecycle_over_the_cli() {
    with_database(|| {
        assert_eq!(seed::run(&SeedArgs::default()).exit_code, 0);

        let created = ab_test::run(&AbTestCommand::Create(create_args(50)));
        assert_eq!(created.exit_code, 0, "unexpected output: {}", created.output);
        let created = parse_payload(&created.output);
        assert_eq!(created["data"]["status"], "draft");
        let id = created["data"]["id"].as_str().unwrap_or_default().to_string();
        assert!(id.starts_with("ab_"));

        let started = ab_test::run(&AbTestCommand::Transition(TransitionArgs {
            id: id.clone(),
            status: "running".to_string(),
        }));
        assert_eq!(started.exit_code, 0);

        for (variant, redemptions, rate) in [("a", 30, 10.0), ("b", 45, 14.0)] {
            let recorded = ab_test::run(&AbTestCommand::Record(RecordArgs {
                id: id.clone(),
                variant: variant.to_string(),
                redemptions,
                revenue: Decimal::from(redemptions),
                conversion_rate: rate,
                confidence: None,
            }));
            assert_eq!(recorded.exit_code, 0);
        }

        let shown = parse_payload(&ab_test::run(&AbTestCommand::Show { id: id.clone() }).output);
        assert_eq!(shown["data"]["results"]["winner"], "b");
        assert_eq!(shown["data"]["results"]["confidence_source"], "heuristic");

        let back_to_draft = ab_test::run(&AbTestCommand::Transition(TransitionArgs {
            id,
            status: "draft".to_string(),
        }));
        assert_eq!(back_to_draft.exit_code, 7);

        let listed = parse_payload(&ab_test::run(&AbTestCommand::List).output);
        assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));
    });
}

#[test]
fn ab_test_create_rejects_out_of_range_split() {
    with_database(|| {
        assert_eq!(seed::run(&SeedArgs::default()).exit_code, 0);

        let result = ab_test::run(&AbTestCommand::Create(create_args(95)));
        assert_eq!(result.exit_code, 7);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "validation_error");
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(&[("DEALPULSE_ANALYTICS_TOP_DEALS_LIMIT", "3")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains(
            "- analytics.top_deals_limit = 3 (source: env (DEALPULSE_ANALYTICS_TOP_DEALS_LIMIT))"
        ));
        assert!(result.output.contains("- logging.format = compact (source: default)"));
    });
}

fn create_args(split: u8) -> CreateArgs {
    CreateArgs {
        name: "Soap at 449".to_string(),
        deal: "deal-soap".to_string(),
        a_threshold: Decimal::from(499),
        a_price: Decimal::ONE,
        b_threshold: Decimal::from(449),
        b_price: Decimal::ONE,
        split,
        start: chrono::NaiveDate::from_ymd_opt(2026, 4, 1),
        end: chrono::NaiveDate::from_ymd_opt(2026, 4, 15),
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Runs `test_fn` against a fresh, empty SQLite file.
fn with_database(test_fn: impl FnOnce()) {
    let dir = TempDir::new().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("dealpulse.db").display());
    with_env(&[("DEALPULSE_DATABASE_URL", url.as_str())], test_fn);
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DEALPULSE_DATABASE_URL",
        "DEALPULSE_DATABASE_MAX_CONNECTIONS",
        "DEALPULSE_DATABASE_TIMEOUT_SECS",
        "DEALPULSE_ANALYTICS_DEFAULT_RANGE_DAYS",
        "DEALPULSE_ANALYTICS_TOP_DEALS_LIMIT",
        "DEALPULSE_LOGGING_LEVEL",
        "DEALPULSE_LOGGING_FORMAT",
        "DEALPULSE_LOG_LEVEL",
        "DEALPULSE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
