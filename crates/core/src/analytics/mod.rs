//! Deal performance analytics
//!
//! Turns raw orders and redemption events into dashboard metrics: a dense daily
//! time series, per-deal performance, threshold buckets, a conversion funnel,
//! ranked top deals, a short-horizon forecast and rule-based recommendations.
//! Every function here is pure; storage access lives in `dealpulse-db`.

pub mod aggregation;
pub mod backfill;
pub mod forecast;
pub mod ranking;
pub mod recommendations;
pub mod report;
mod types;

pub use aggregation::{aggregate, AggregationInput};
pub use backfill::{plan_backfill, BackfillPlan, BackfillReport, DealBackfillSummary};
pub use forecast::forecast;
pub use ranking::{rank, top_deals, DealScorer, RankingWeights};
pub use recommendations::{RecommendationGenerator, RecommendationRules};
pub use report::{
    AnalyticsReport, AnalyticsSnapshot, DealAnalyticsEngine, ReportDiagnostics, SchemaStatus,
};
pub use types::*;

/// Number of deals returned by `top_deals` unless configured otherwise.
pub const DEFAULT_TOP_DEALS: usize = 5;

/// Days forecast past the end of the series.
pub const FORECAST_HORIZON_DAYS: u32 = 7;

/// Trailing points the forecast trend is fitted on.
pub const FORECAST_WINDOW: usize = 7;

/// Share of eligible orders assumed to add a deal when no instrumentation exists.
pub const ESTIMATED_ADD_RATE: f64 = 0.70;

/// Share of added deals assumed to complete when no instrumentation exists.
pub const ESTIMATED_COMPLETION_RATE: f64 = 0.90;
