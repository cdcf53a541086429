//! The end-to-end analytics pipeline over one store snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregation::{aggregate, AggregationInput};
use super::forecast::forecast;
use super::ranking::DealScorer;
use super::recommendations::RecommendationGenerator;
use super::types::*;
use super::DEFAULT_TOP_DEALS;
use crate::domain::deal::Deal;
use crate::domain::order::Order;
use crate::domain::period::DateRange;
use crate::domain::redemption::PurchaseEvent;

/// Immutable rows fetched for one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsSnapshot {
    pub range: DateRange,
    pub deals: Vec<Deal>,
    pub orders: Vec<Order>,
    pub redemptions: Vec<PurchaseEvent>,
    pub measured_funnel: MeasuredFunnel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaStatus {
    Ready,
    /// Analytics tables are absent; every metric in the report is zeroed.
    Missing,
}

/// Signals that explain a report without changing its numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDiagnostics {
    pub schema: SchemaStatus,
    pub active_deals: u64,
    pub orders_scanned: u64,
    pub redemptions_scanned: u64,
    pub funnel_estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub time_series: Vec<TimeSeriesPoint>,
    pub performance: Vec<DealPerformanceRecord>,
    pub buckets: Vec<ThresholdBucket>,
    pub funnel: ConversionFunnel,
    pub top_deals: Vec<TopDeal>,
    pub forecast: PredictiveData,
    pub recommendations: Vec<Recommendation>,
    pub diagnostics: ReportDiagnostics,
}

impl AnalyticsReport {
    /// Fully populated, zero-valued report for dashboards with nothing to show.
    pub fn empty(range: DateRange, generated_at: DateTime<Utc>, schema: SchemaStatus) -> Self {
        let analytics = DealAnalytics::empty(&range);
        Self {
            range,
            generated_at,
            time_series: analytics.time_series,
            performance: analytics.performance,
            buckets: analytics.buckets,
            funnel: analytics.funnel,
            top_deals: Vec::new(),
            forecast: PredictiveData::empty(),
            recommendations: Vec::new(),
            diagnostics: ReportDiagnostics {
                schema,
                active_deals: 0,
                orders_scanned: 0,
                redemptions_scanned: 0,
                funnel_estimated: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DealAnalyticsEngine {
    top_deals_limit: usize,
    scorer: DealScorer,
    recommendations: RecommendationGenerator,
}

impl Default for DealAnalyticsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_DEALS)
    }
}

impl DealAnalyticsEngine {
    pub fn new(top_deals_limit: usize) -> Self {
        Self {
            top_deals_limit,
            scorer: DealScorer::new(),
            recommendations: RecommendationGenerator::new(),
        }
    }

    pub fn with_scorer(mut self, scorer: DealScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_recommendations(mut self, generator: RecommendationGenerator) -> Self {
        self.recommendations = generator;
        self
    }

    /// aggregate -> rank -> forecast -> recommend.
    pub fn run(&self, snapshot: &AnalyticsSnapshot, generated_at: DateTime<Utc>) -> AnalyticsReport {
        let analytics = aggregate(&AggregationInput {
            range: snapshot.range,
            deals: &snapshot.deals,
            orders: &snapshot.orders,
            redemptions: &snapshot.redemptions,
            measured_funnel: snapshot.measured_funnel,
        });

        let mut top_deals = self.scorer.rank(&analytics.performance);
        top_deals.truncate(self.top_deals_limit);

        let predictive = forecast(&analytics.time_series, &snapshot.deals, &analytics.performance);
        let recommendations =
            self.recommendations.generate(&snapshot.deals, &analytics.performance);

        let diagnostics = ReportDiagnostics {
            schema: SchemaStatus::Ready,
            active_deals: snapshot.deals.iter().filter(|deal| deal.is_active).count() as u64,
            orders_scanned: snapshot.orders.len() as u64,
            redemptions_scanned: snapshot.redemptions.len() as u64,
            funnel_estimated: analytics.funnel.has_estimates(),
        };

        AnalyticsReport {
            range: snapshot.range,
            generated_at,
            time_series: analytics.time_series,
            performance: analytics.performance,
            buckets: analytics.buckets,
            funnel: analytics.funnel,
            top_deals,
            forecast: predictive,
            recommendations,
            diagnostics,
        }
    }
}
