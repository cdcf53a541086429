//! A/B tests comparing two threshold/price variants of one deal.
//!
//! Counters are supplied from outside; the model only decides a winner. Confidence is a
//! display heuristic unless the caller supplies a computed value, and the result says which.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::deal::DealId;
use crate::errors::DomainError;

/// Conversion-rate differences (in percentage points) below this are a tie.
pub const TIE_MARGIN_PCT: f64 = 0.5;

pub const MIN_TRAFFIC_SPLIT: u8 = 10;
pub const MAX_TRAFFIC_SPLIT: u8 = 90;

const HEURISTIC_BASE_CONFIDENCE: f64 = 50.0;
const HEURISTIC_CONFIDENCE_PER_POINT: f64 = 5.0;
const HEURISTIC_MAX_CONFIDENCE: f64 = 95.0;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbTestId(pub String);

impl AbTestId {
    pub fn generate() -> Self {
        Self(format!("ab_{}", Uuid::new_v4().simple()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbTestStatus {
    Draft,
    Running,
    Completed,
    Paused,
}

impl AbTestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Paused => "paused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantLabel {
    A,
    B,
}

impl VariantLabel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub threshold: Decimal,
    pub price: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantResults {
    pub redemptions: u64,
    pub revenue: Decimal,
    /// Percent, supplied by the caller.
    pub conversion_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    A,
    B,
    Tie,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    Supplied,
    Heuristic,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbTestResults {
    pub variant_a: VariantResults,
    pub variant_b: VariantResults,
    pub winner: Option<Winner>,
    pub confidence: Option<f64>,
    pub confidence_source: Option<ConfidenceSource>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewAbTest {
    pub name: String,
    pub deal_id: DealId,
    pub variant_a: Variant,
    pub variant_b: Variant,
    /// Percent of traffic sent to variant A.
    pub traffic_split: u8,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbTest {
    pub id: AbTestId,
    pub name: String,
    pub deal_id: DealId,
    pub variant_a: Variant,
    pub variant_b: Variant,
    pub status: AbTestStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub traffic_split: u8,
    pub results: AbTestResults,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AbTest {
    pub fn create(input: NewAbTest, now: DateTime<Utc>) -> Result<Self, DomainError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("test name is required".to_string()));
        }
        if input.deal_id.0.trim().is_empty() {
            return Err(DomainError::Validation("deal id is required".to_string()));
        }
        if !(MIN_TRAFFIC_SPLIT..=MAX_TRAFFIC_SPLIT).contains(&input.traffic_split) {
            return Err(DomainError::Validation(format!(
                "traffic split must be in range {MIN_TRAFFIC_SPLIT}..={MAX_TRAFFIC_SPLIT}, got {}",
                input.traffic_split
            )));
        }
        validate_variant("variant A", &input.variant_a)?;
        validate_variant("variant B", &input.variant_b)?;

        let (Some(start_date), Some(end_date)) = (input.start_date, input.end_date) else {
            return Err(DomainError::Validation("start and end dates are required".to_string()));
        };
        if start_date >= end_date {
            return Err(DomainError::Validation(format!(
                "start date {start_date} must be before end date {end_date}"
            )));
        }

        Ok(Self {
            id: AbTestId::generate(),
            name: name.to_string(),
            deal_id: input.deal_id,
            variant_a: input.variant_a,
            variant_b: input.variant_b,
            status: AbTestStatus::Draft,
            start_date,
            end_date,
            traffic_split: input.traffic_split,
            results: AbTestResults::default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces one variant's counters and recomputes the winner. A supplied confidence
    /// sticks until another is supplied or the winner is undecided again.
    pub fn record_result(
        &mut self,
        variant: VariantLabel,
        observed: VariantResults,
        confidence: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !observed.conversion_rate.is_finite() || observed.conversion_rate < 0.0 {
            return Err(DomainError::Validation(
                "conversion rate must be a non-negative number".to_string(),
            ));
        }
        if observed.revenue.is_sign_negative() && !observed.revenue.is_zero() {
            return Err(DomainError::Validation("revenue must not be negative".to_string()));
        }
        if let Some(value) = confidence {
            if !(0.0..=100.0).contains(&value) {
                return Err(DomainError::Validation(
                    "confidence must be in range 0..=100".to_string(),
                ));
            }
        }

        match variant {
            VariantLabel::A => self.results.variant_a = observed,
            VariantLabel::B => self.results.variant_b = observed,
        }

        self.results.winner = self.winner();
        let previously_supplied = match self.results.confidence_source {
            Some(ConfidenceSource::Supplied) => self.results.confidence,
            _ => None,
        };
        match (self.results.winner, confidence.or(previously_supplied)) {
            (None, _) => {
                self.results.confidence = None;
                self.results.confidence_source = None;
            }
            (Some(_), Some(supplied)) => {
                self.results.confidence = Some(supplied);
                self.results.confidence_source = Some(ConfidenceSource::Supplied);
            }
            (Some(winner), None) => {
                self.results.confidence = Some(self.heuristic_confidence(winner));
                self.results.confidence_source = Some(ConfidenceSource::Heuristic);
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// `None` until both variants have redemptions.
    pub fn winner(&self) -> Option<Winner> {
        let a = &self.results.variant_a;
        let b = &self.results.variant_b;
        if a.redemptions == 0 || b.redemptions == 0 {
            return None;
        }

        let delta = a.conversion_rate - b.conversion_rate;
        if delta.abs() < TIE_MARGIN_PCT {
            Some(Winner::Tie)
        } else if delta > 0.0 {
            Some(Winner::A)
        } else {
            Some(Winner::B)
        }
    }

    fn heuristic_confidence(&self, winner: Winner) -> f64 {
        if winner == Winner::Tie {
            return HEURISTIC_BASE_CONFIDENCE;
        }
        let delta =
            (self.results.variant_a.conversion_rate - self.results.variant_b.conversion_rate).abs();
        (HEURISTIC_BASE_CONFIDENCE + HEURISTIC_CONFIDENCE_PER_POINT * delta)
            .min(HEURISTIC_MAX_CONFIDENCE)
    }

    pub fn can_transition_to(&self, next: AbTestStatus) -> bool {
        matches!(
            (self.status, next),
            (AbTestStatus::Draft, AbTestStatus::Running)
                | (AbTestStatus::Running, AbTestStatus::Completed)
                | (AbTestStatus::Running, AbTestStatus::Paused)
                | (AbTestStatus::Paused, AbTestStatus::Running)
                | (AbTestStatus::Paused, AbTestStatus::Completed)
        )
    }

    pub fn transition_to(
        &mut self,
        next: AbTestStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = now;
            return Ok(());
        }

        Err(DomainError::InvalidAbTestTransition { from: self.status, to: next })
    }
}

fn validate_variant(label: &str, variant: &Variant) -> Result<(), DomainError> {
    if variant.threshold <= Decimal::ZERO {
        return Err(DomainError::Validation(format!("{label} threshold must be positive")));
    }
    if variant.price.is_sign_negative() && !variant.price.is_zero() {
        return Err(DomainError::Validation(format!("{label} price must not be negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        AbTest, AbTestStatus, ConfidenceSource, NewAbTest, Variant, VariantLabel, VariantResults,
        Winner,
    };
    use crate::domain::deal::DealId;
    use crate::errors::DomainError;

    fn input() -> NewAbTest {
        NewAbTest {
            name: "Soap threshold".to_string(),
            deal_id: DealId("deal-soap".to_string()),
            variant_a: Variant { threshold: Decimal::from(499), price: Decimal::ONE },
            variant_b: Variant { threshold: Decimal::from(599), price: Decimal::ONE },
            traffic_split: 50,
            start_date: NaiveDate::from_ymd_opt(2026, 4, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 4, 15),
        }
    }

    fn results(redemptions: u64, conversion_rate: f64) -> VariantResults {
        VariantResults { redemptions, revenue: Decimal::from(redemptions), conversion_rate }
    }

    fn test() -> AbTest {
        AbTest::create(input(), Utc::now()).expect("valid test")
    }

    #[test]
    fn new_tests_start_as_draft_without_results() {
        let test = test();
        assert_eq!(test.status, AbTestStatus::Draft);
        assert!(test.id.0.starts_with("ab_"));
        assert_eq!(test.results.winner, None);
        assert_eq!(test.created_at, test.updated_at);
    }

    #[test]
    fn create_rejects_invalid_input() {
        let cases: Vec<(NewAbTest, &str)> = vec![
            (NewAbTest { name: "  ".to_string(), ..input() }, "name"),
            (NewAbTest { deal_id: DealId(String::new()), ..input() }, "deal id"),
            (NewAbTest { traffic_split: 5, ..input() }, "traffic split"),
            (NewAbTest { traffic_split: 95, ..input() }, "traffic split"),
            (NewAbTest { end_date: None, ..input() }, "dates are required"),
            (NewAbTest { end_date: NaiveDate::from_ymd_opt(2026, 4, 1), ..input() }, "before"),
            (
                NewAbTest {
                    variant_b: Variant { threshold: Decimal::ZERO, price: Decimal::ONE },
                    ..input()
                },
                "variant B threshold",
            ),
        ];

        for (case, needle) in cases {
            let error = AbTest::create(case, Utc::now()).expect_err("invalid input");
            assert!(
                matches!(&error, DomainError::Validation(message) if message.contains(needle)),
                "expected `{needle}` in {error}"
            );
        }
    }

    #[test]
    fn winner_requires_redemptions_on_both_sides() {
        let mut test = test();
        test.record_result(VariantLabel::A, results(40, 18.0), None, Utc::now()).expect("record");
        assert_eq!(test.winner(), None);
        assert_eq!(test.results.confidence, None);

        test.record_result(VariantLabel::B, results(0, 30.0), None, Utc::now()).expect("record");
        assert_eq!(test.winner(), None);

        test.record_result(VariantLabel::B, results(25, 12.0), None, Utc::now()).expect("record");
        assert_eq!(test.winner(), Some(Winner::A));
        assert_eq!(test.results.winner, Some(Winner::A));
    }

    #[test]
    fn heuristic_confidence_grows_with_the_gap_and_caps() {
        let mut test = test();
        test.record_result(VariantLabel::A, results(10, 12.0), None, Utc::now()).expect("record");
        test.record_result(VariantLabel::B, results(10, 15.0), None, Utc::now()).expect("record");

        assert_eq!(test.results.winner, Some(Winner::B));
        assert_eq!(test.results.confidence, Some(65.0));
        assert_eq!(test.results.confidence_source, Some(ConfidenceSource::Heuristic));

        test.record_result(VariantLabel::B, results(10, 40.0), None, Utc::now()).expect("record");
        assert_eq!(test.results.confidence, Some(95.0));
    }

    #[test]
    fn near_equal_rates_are_a_tie() {
        let mut test = test();
        test.record_result(VariantLabel::A, results(10, 12.0), None, Utc::now()).expect("record");
        test.record_result(VariantLabel::B, results(12, 12.25), None, Utc::now()).expect("record");

        assert_eq!(test.results.winner, Some(Winner::Tie));
        assert_eq!(test.results.confidence, Some(50.0));
    }

    #[test]
    fn supplied_confidence_is_carried_and_labelled() {
        let mut test = test();
        test.record_result(VariantLabel::A, results(10, 20.0), None, Utc::now()).expect("record");
        test.record_result(VariantLabel::B, results(10, 10.0), Some(97.2), Utc::now())
            .expect("record");

        assert_eq!(test.results.confidence, Some(97.2));
        assert_eq!(test.results.confidence_source, Some(ConfidenceSource::Supplied));

        let error = test
            .record_result(VariantLabel::A, results(10, 20.0), Some(120.0), Utc::now())
            .expect_err("confidence above 100");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn supplied_confidence_survives_later_records_without_one() {
        let mut test = test();
        test.record_result(VariantLabel::A, results(10, 20.0), None, Utc::now()).expect("record");
        test.record_result(VariantLabel::B, results(10, 10.0), Some(91.0), Utc::now())
            .expect("record");

        test.record_result(VariantLabel::A, results(12, 21.0), None, Utc::now()).expect("record");
        assert_eq!(test.results.confidence, Some(91.0));
        assert_eq!(test.results.confidence_source, Some(ConfidenceSource::Supplied));

        test.record_result(VariantLabel::B, results(0, 0.0), None, Utc::now()).expect("record");
        assert_eq!(test.results.confidence_source, None);

        test.record_result(VariantLabel::B, results(10, 10.0), None, Utc::now()).expect("record");
        assert_eq!(test.results.confidence_source, Some(ConfidenceSource::Heuristic));
    }

    #[test]
    fn lifecycle_follows_allowed_transitions() {
        let mut test = test();
        let later = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

        let error = test.transition_to(AbTestStatus::Completed, later).expect_err("draft->completed");
        assert!(matches!(error, DomainError::InvalidAbTestTransition { .. }));

        test.transition_to(AbTestStatus::Running, later).expect("draft->running");
        test.transition_to(AbTestStatus::Paused, later).expect("running->paused");
        test.transition_to(AbTestStatus::Running, later).expect("paused->running");
        test.transition_to(AbTestStatus::Completed, later).expect("running->completed");
        assert_eq!(test.updated_at, later);

        for next in [AbTestStatus::Draft, AbTestStatus::Running, AbTestStatus::Paused] {
            assert!(test.transition_to(next, later).is_err(), "completed is terminal");
        }
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            AbTestStatus::Draft,
            AbTestStatus::Running,
            AbTestStatus::Completed,
            AbTestStatus::Paused,
        ] {
            assert_eq!(AbTestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AbTestStatus::parse("archived"), None);
        assert_eq!(VariantLabel::parse("B"), Some(VariantLabel::B));
    }
}
