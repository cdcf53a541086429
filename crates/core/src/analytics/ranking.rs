//! Composite scoring and ranking of deals

use rust_decimal::prelude::ToPrimitive;

use super::types::{DealPerformanceRecord, TopDeal};

/// Weights for the composite deal score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    /// Weight per redemption (default: 0.4)
    pub redemptions: f64,
    /// Weight per ₹100 of revenue (default: 0.3)
    pub revenue_per_hundred: f64,
    /// Weight per conversion percentage point (default: 0.3)
    pub conversion_rate: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self { redemptions: 0.4, revenue_per_hundred: 0.3, conversion_rate: 0.3 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DealScorer {
    weights: RankingWeights,
}

impl DealScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: RankingWeights) -> Self {
        Self { weights }
    }

    /// Score rounded to one decimal.
    pub fn score(&self, record: &DealPerformanceRecord) -> f64 {
        let revenue = record.revenue.to_f64().unwrap_or(0.0);
        let raw = record.redemptions as f64 * self.weights.redemptions
            + (revenue / 100.0) * self.weights.revenue_per_hundred
            + record.conversion_rate * self.weights.conversion_rate;

        (raw * 10.0).round() / 10.0
    }

    /// All deals, best first. Equal scores keep their input order.
    pub fn rank(&self, records: &[DealPerformanceRecord]) -> Vec<TopDeal> {
        let mut ranked: Vec<TopDeal> = records
            .iter()
            .map(|record| TopDeal {
                deal_id: record.deal_id.clone(),
                title: record.title.clone(),
                score: self.score(record),
                redemptions: record.redemptions,
                revenue: record.revenue,
            })
            .collect();

        ranked.sort_by(|left, right| right.score.total_cmp(&left.score));
        ranked
    }
}

pub fn rank(records: &[DealPerformanceRecord]) -> Vec<TopDeal> {
    DealScorer::new().rank(records)
}

pub fn top_deals(records: &[DealPerformanceRecord], limit: usize) -> Vec<TopDeal> {
    let mut ranked = rank(records);
    ranked.truncate(limit);
    ranked
}
