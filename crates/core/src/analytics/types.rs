//! Types produced by the analytics pipeline

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::deal::DealId;
use crate::domain::period::DateRange;

/// Activity on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub redemptions: u64,
    pub revenue: Decimal,
    pub orders: u64,
}

impl TimeSeriesPoint {
    pub fn zero(date: NaiveDate) -> Self {
        Self { date, redemptions: 0, revenue: Decimal::ZERO, orders: 0 }
    }
}

/// Performance of one deal over the queried range. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealPerformanceRecord {
    pub deal_id: DealId,
    pub title: String,
    pub redemptions: u64,
    pub revenue: Decimal,
    /// Percentage (0-100) of eligible orders that redeemed the deal.
    pub conversion_rate: f64,
    pub avg_cart_value: Decimal,
    pub threshold_amount: Decimal,
    pub deal_price: Decimal,
    pub priority: i32,
}

/// Fixed cart-value ranges used to group deals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketRange {
    Under500,
    From500To999,
    From1000To1499,
    From1500,
}

impl BucketRange {
    pub const ALL: [BucketRange; 4] =
        [Self::Under500, Self::From500To999, Self::From1000To1499, Self::From1500];

    pub fn for_threshold(threshold: Decimal) -> Self {
        if threshold < Decimal::from(500) {
            Self::Under500
        } else if threshold < Decimal::from(1000) {
            Self::From500To999
        } else if threshold < Decimal::from(1500) {
            Self::From1000To1499
        } else {
            Self::From1500
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under500 => "<₹500",
            Self::From500To999 => "₹500-999",
            Self::From1000To1499 => "₹1000-1499",
            Self::From1500 => "₹1500+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBucket {
    pub range: BucketRange,
    pub label: String,
    pub deal_count: u64,
    pub redemptions: u64,
}

impl ThresholdBucket {
    pub fn empty(range: BucketRange) -> Self {
        Self { range, label: range.label().to_string(), deal_count: 0, redemptions: 0 }
    }
}

/// Whether a funnel count was observed or filled in by the fallback heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSource {
    Measured,
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub count: u64,
    pub source: CountSource,
}

impl FunnelStage {
    pub fn measured(count: u64) -> Self {
        Self { count, source: CountSource::Measured }
    }

    pub fn estimated(count: u64) -> Self {
        Self { count, source: CountSource::Estimated }
    }
}

/// views -> eligible -> added -> completed.
///
/// Stage counts are only monotone when the measured inputs are consistent; the
/// funnel does not clamp them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFunnel {
    pub views: FunnelStage,
    pub eligible: FunnelStage,
    pub added: FunnelStage,
    pub completed: FunnelStage,
}

impl ConversionFunnel {
    pub fn empty() -> Self {
        Self {
            views: FunnelStage::measured(0),
            eligible: FunnelStage::measured(0),
            added: FunnelStage::measured(0),
            completed: FunnelStage::measured(0),
        }
    }

    pub fn has_estimates(&self) -> bool {
        [self.views, self.eligible, self.added, self.completed]
            .iter()
            .any(|stage| stage.source == CountSource::Estimated)
    }
}

/// Funnel counts reported by instrumentation, when it exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasuredFunnel {
    pub views: Option<u64>,
    pub added: Option<u64>,
    pub completed: Option<u64>,
}

/// Output of `aggregate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealAnalytics {
    pub time_series: Vec<TimeSeriesPoint>,
    pub performance: Vec<DealPerformanceRecord>,
    pub buckets: Vec<ThresholdBucket>,
    pub funnel: ConversionFunnel,
}

impl DealAnalytics {
    /// Zero-valued analytics for `range`, still dense over every day.
    pub fn empty(range: &DateRange) -> Self {
        Self {
            time_series: range.days().map(TimeSeriesPoint::zero).collect(),
            performance: Vec::new(),
            buckets: BucketRange::ALL.into_iter().map(ThresholdBucket::empty).collect(),
            funnel: ConversionFunnel::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopDeal {
    pub deal_id: DealId,
    pub title: String,
    pub score: f64,
    pub redemptions: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    /// Heuristic percentage, decays with horizon.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictiveData {
    pub redemption_forecast: Vec<ForecastPoint>,
    pub revenue_forecast: Vec<ForecastPoint>,
    pub optimal_threshold: Decimal,
    pub recommended_threshold: Decimal,
    pub trend_direction: TrendDirection,
    pub confidence: f64,
    pub horizon_days: u32,
}

impl PredictiveData {
    pub fn empty() -> Self {
        Self {
            redemption_forecast: Vec::new(),
            revenue_forecast: Vec::new(),
            optimal_threshold: Decimal::ZERO,
            recommended_threshold: Decimal::ZERO,
            trend_direction: TrendDirection::Stable,
            confidence: 0.0,
            horizon_days: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Threshold,
    Price,
    Timing,
    Product,
    Priority,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Price => "price",
            Self::Timing => "timing",
            Self::Product => "product",
            Self::Priority => "priority",
        }
    }
}

/// Declared high to low so the derived `Ord` sorts high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    High,
    Medium,
    Low,
}

/// An advisory suggestion. Regenerated on every refresh and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub kind: RecommendationKind,
    pub priority: RecommendationPriority,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub action: String,
    pub deal_id: Option<DealId>,
    pub current_value: Option<f64>,
    pub recommended_value: Option<f64>,
    pub expected_improvement: Option<f64>,
}
