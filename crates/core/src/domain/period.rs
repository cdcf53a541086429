use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Longest window a caller may request by day count.
pub const MAX_RANGE_DAYS: u32 = 366;

/// Inclusive range of calendar days.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, DomainError> {
        if from > to {
            return Err(DomainError::InvalidDateRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// The `days` calendar days ending on `today`, inclusive.
    pub fn trailing_days(today: NaiveDate, days: u32) -> Result<Self, DomainError> {
        if days == 0 || days > MAX_RANGE_DAYS {
            return Err(DomainError::Validation(format!(
                "day count must be in range 1..={MAX_RANGE_DAYS}, got {days}"
            )));
        }
        let from = today.checked_sub_signed(Duration::days(i64::from(days) - 1)).ok_or_else(|| {
            DomainError::Validation(format!("{days} days before {today} is out of range"))
        })?;
        Ok(Self { from, to: today })
    }

    pub fn parse(from: &str, to: &str) -> Result<Self, DomainError> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
                DomainError::Validation(format!("`{value}` is not a YYYY-MM-DD date"))
            })
        };
        Self::new(parse(from)?, parse(to)?)
    }

    pub fn day_count(&self) -> usize {
        ((self.to - self.from).num_days() + 1) as usize
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.from.iter_days().take(self.day_count())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.contains(instant.date_naive())
    }

    /// Half-open UTC bounds `[start, end)` for storage queries.
    pub fn utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.from.and_time(NaiveTime::MIN).and_utc();
        let end = (self.to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{DateRange, MAX_RANGE_DAYS};
    use crate::errors::DomainError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn inverted_range_is_a_validation_error() {
        let error = DateRange::new(date(2026, 3, 2), date(2026, 3, 1)).expect_err("inverted");
        assert!(matches!(error, DomainError::InvalidDateRange { .. }));
    }

    #[test]
    fn day_count_is_inclusive_and_crosses_month_boundaries() {
        let range = DateRange::new(date(2026, 2, 27), date(2026, 3, 2)).expect("range");
        assert_eq!(range.day_count(), 4);
        let days: Vec<NaiveDate> = range.days().collect();
        assert_eq!(days.first(), Some(&date(2026, 2, 27)));
        assert_eq!(days.last(), Some(&date(2026, 3, 2)));
    }

    #[test]
    fn single_day_range_has_one_day() {
        let range = DateRange::new(date(2026, 1, 1), date(2026, 1, 1)).expect("range");
        assert_eq!(range.day_count(), 1);
    }

    #[test]
    fn trailing_days_ends_today() {
        let range = DateRange::trailing_days(date(2026, 1, 7), 7).expect("range");
        assert_eq!(range.from, date(2026, 1, 1));
        assert_eq!(range.day_count(), 7);
    }

    #[test]
    fn trailing_days_rejects_counts_outside_the_window_limit() {
        let today = date(2026, 3, 31);
        assert!(DateRange::trailing_days(today, MAX_RANGE_DAYS).is_ok());
        for days in [0, MAX_RANGE_DAYS + 1, u32::MAX] {
            assert!(matches!(
                DateRange::trailing_days(today, days),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn trailing_days_near_the_minimum_date_is_an_error() {
        assert!(DateRange::trailing_days(NaiveDate::MIN, 2).is_err());
        assert!(DateRange::trailing_days(NaiveDate::MIN, 1).is_ok());
    }

    #[test]
    fn parse_rejects_non_iso_dates() {
        assert!(DateRange::parse("2026-01-01", "2026-01-31").is_ok());
        assert!(matches!(
            DateRange::parse("01/02/2026", "2026-01-31"),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn instants_are_matched_by_utc_calendar_day() {
        let range = DateRange::new(date(2026, 1, 1), date(2026, 1, 2)).expect("range");
        assert!(range.contains_instant(Utc.with_ymd_and_hms(2026, 1, 2, 23, 59, 59).unwrap()));
        assert!(!range.contains_instant(Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap()));
        let (start, end) = range.utc_bounds();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap());
    }
}
