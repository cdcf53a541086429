use chrono::{NaiveDate, Utc};
use clap::Args;
use dealpulse_core::domain::period::{DateRange, MAX_RANGE_DAYS};
use dealpulse_core::errors::DomainError;

use crate::commands::{
    application_failure, build_runtime, load_config, open_pool, service_for, CommandResult,
};

#[derive(Debug, Clone, Default, Args)]
pub struct RangeArgs {
    /// First day of the range (YYYY-MM-DD), requires --to
    #[arg(long)]
    pub from: Option<String>,
    /// Last day of the range (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub to: Option<String>,
    /// Trailing number of days ending today, ignored when --from/--to are given
    #[arg(long)]
    pub days: Option<u32>,
}

impl RangeArgs {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.days.is_none()
    }

    pub fn resolve(&self, today: NaiveDate, default_days: u32) -> Result<DateRange, DomainError> {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => DateRange::parse(from, to),
            (None, None) => {
                let days = self.days.unwrap_or(default_days);
                if days == 0 || days > MAX_RANGE_DAYS {
                    return Err(DomainError::Validation(format!(
                        "--days must be in range 1..={MAX_RANGE_DAYS}"
                    )));
                }
                DateRange::trailing_days(today, days)
            }
            _ => Err(DomainError::Validation("--from and --to must be given together".to_string())),
        }
    }
}

pub fn run(args: &RangeArgs) -> CommandResult {
    let config = match load_config("report") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let range = match args.resolve(Utc::now().date_naive(), config.analytics.default_range_days) {
        Ok(range) => range,
        Err(error) => {
            return CommandResult::from_failure("report", application_failure("report", error.into()))
        }
    };
    let runtime = match build_runtime("report") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = service_for(&config, pool.clone());
        let report =
            service.refresh(range).await.map_err(|error| application_failure("report", error));
        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success_with_data(
            "report",
            format!(
                "analytics for {} to {} ({:?} schema)",
                report.range.from, report.range.to, report.diagnostics.schema
            ),
            &report,
        ),
        Err(failure) => CommandResult::from_failure("report", failure),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use dealpulse_core::errors::DomainError;

    use super::RangeArgs;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 31).expect("date")
    }

    #[test]
    fn defaults_to_the_configured_trailing_window() {
        let range = RangeArgs::default().resolve(today(), 30).expect("range");
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"));
        assert_eq!(range.to, today());
    }

    #[test]
    fn explicit_bounds_win_over_days() {
        let args = RangeArgs {
            from: Some("2026-02-01".to_string()),
            to: Some("2026-02-07".to_string()),
            days: Some(90),
        };
        assert_eq!(args.resolve(today(), 30).expect("range").day_count(), 7);
    }

    #[test]
    fn half_open_or_inverted_bounds_are_rejected() {
        let half = RangeArgs { from: Some("2026-02-01".to_string()), ..RangeArgs::default() };
        assert!(half.resolve(today(), 30).is_err());

        let inverted = RangeArgs {
            from: Some("2026-02-07".to_string()),
            to: Some("2026-02-01".to_string()),
            days: None,
        };
        assert!(inverted.resolve(today(), 30).is_err());

        let zero = RangeArgs { days: Some(0), ..RangeArgs::default() };
        assert!(zero.resolve(today(), 30).is_err());
    }

    #[test]
    fn oversized_day_counts_are_validation_errors() {
        for days in [367, u32::MAX] {
            let args = RangeArgs { days: Some(days), ..RangeArgs::default() };
            assert!(matches!(args.resolve(today(), 30), Err(DomainError::Validation(_))));
        }
        let year = RangeArgs { days: Some(366), ..RangeArgs::default() };
        assert_eq!(year.resolve(today(), 30).expect("range").day_count(), 366);
    }
}
