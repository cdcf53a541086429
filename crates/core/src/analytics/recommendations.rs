//! Rule-based optimization recommendations
//!
//! Every rule is evaluated independently and several may fire for the same deal.
//! Output is advisory and recomputed on each call.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::types::*;
use crate::domain::deal::Deal;

/// Tunables for the recommendation rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRules {
    /// Conversion rate (%) below which a threshold is considered too high.
    pub min_conversion_rate: f64,
    /// Threshold above which a low-converting deal gets a threshold cut.
    pub high_threshold: Decimal,
    /// Multiplier applied to a threshold that is too high.
    pub threshold_cut: Decimal,
    /// Redemptions needed before price elasticity is considered.
    pub price_min_redemptions: u64,
    /// Revenue per redemption below `deal_price * price_floor_ratio` suggests a raise.
    pub price_floor_ratio: Decimal,
    pub price_raise: Decimal,
    pub price_expected_improvement: f64,
    /// Redemptions needed before a deal earns a priority boost.
    pub boost_min_redemptions: u64,
    /// Deals already at or above this priority are left alone.
    pub boost_max_priority: i32,
    pub boost_expected_improvement: f64,
    pub timing_expected_improvement: f64,
    /// Threshold under which a deal counts as low-threshold.
    pub low_threshold: Decimal,
    /// Minimum number of low-threshold deals before the gap rule is silent.
    pub min_low_threshold_deals: usize,
    pub gap_expected_improvement: f64,
}

impl Default for RecommendationRules {
    fn default() -> Self {
        Self {
            min_conversion_rate: 15.0,
            high_threshold: Decimal::from(500),
            threshold_cut: Decimal::new(85, 2),
            price_min_redemptions: 20,
            price_floor_ratio: Decimal::new(12, 1),
            price_raise: Decimal::new(11, 1),
            price_expected_improvement: 12.0,
            boost_min_redemptions: 30,
            boost_max_priority: 3,
            boost_expected_improvement: 25.0,
            timing_expected_improvement: 35.0,
            low_threshold: Decimal::from(500),
            min_low_threshold_deals: 2,
            gap_expected_improvement: 18.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationGenerator {
    rules: RecommendationRules,
}

impl RecommendationGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: RecommendationRules) -> Self {
        Self { rules }
    }

    /// Recommendations for the active deals, high priority first. Order within a
    /// priority follows the deal order, then the global rules.
    pub fn generate(
        &self,
        deals: &[Deal],
        performance: &[DealPerformanceRecord],
    ) -> Vec<Recommendation> {
        let active: Vec<&Deal> = deals.iter().filter(|deal| deal.is_active).collect();
        let mut recommendations = Vec::new();

        for deal in &active {
            let observed = performance.iter().find(|record| record.deal_id == deal.id);
            let redemptions = observed.map(|record| record.redemptions).unwrap_or(0);
            let revenue = observed.map(|record| record.revenue).unwrap_or(Decimal::ZERO);
            let conversion_rate = observed.map(|record| record.conversion_rate).unwrap_or(0.0);

            if let Some(rec) = self.threshold_too_high(deal, conversion_rate) {
                recommendations.push(rec);
            }
            if let Some(rec) = self.price_elasticity(deal, redemptions, revenue) {
                recommendations.push(rec);
            }
            if let Some(rec) = self.priority_boost(deal, redemptions) {
                recommendations.push(rec);
            }
        }

        recommendations.push(self.peak_hours());

        if let Some(rec) = self.threshold_gap(&active) {
            recommendations.push(rec);
        }

        recommendations.sort_by_key(|rec| rec.priority);

        tracing::debug!(
            event_name = "analytics.recommendations.generated",
            active_deals = active.len(),
            count = recommendations.len(),
            "recommendations generated"
        );

        recommendations
    }

    fn threshold_too_high(&self, deal: &Deal, conversion_rate: f64) -> Option<Recommendation> {
        if conversion_rate >= self.rules.min_conversion_rate
            || deal.threshold_amount <= self.rules.high_threshold
        {
            return None;
        }

        let suggested = (deal.threshold_amount * self.rules.threshold_cut).round_dp(2);
        Some(Recommendation {
            id: format!("threshold-{}", deal.id.0),
            kind: RecommendationKind::Threshold,
            priority: RecommendationPriority::High,
            title: format!("Lower the unlock threshold for {}", deal.title),
            description: format!(
                "Only {conversion_rate:.1}% of eligible carts redeem this deal at a ₹{} threshold.",
                deal.threshold_amount.round_dp(2)
            ),
            impact: "More carts qualify, lifting redemptions".to_string(),
            action: format!("Reduce threshold to ₹{suggested}"),
            deal_id: Some(deal.id.clone()),
            current_value: deal.threshold_amount.to_f64(),
            recommended_value: suggested.to_f64(),
            expected_improvement: Some(
                (self.rules.min_conversion_rate - conversion_rate) * 1.5,
            ),
        })
    }

    fn price_elasticity(
        &self,
        deal: &Deal,
        redemptions: u64,
        revenue: Decimal,
    ) -> Option<Recommendation> {
        if redemptions <= self.rules.price_min_redemptions {
            return None;
        }

        let revenue_per_redemption = revenue / Decimal::from(redemptions);
        if revenue_per_redemption >= deal.deal_price * self.rules.price_floor_ratio {
            return None;
        }

        let suggested = (deal.deal_price * self.rules.price_raise).round_dp(2);
        Some(Recommendation {
            id: format!("price-{}", deal.id.0),
            kind: RecommendationKind::Price,
            priority: RecommendationPriority::Medium,
            title: format!("Test a higher deal price for {}", deal.title),
            description: format!(
                "{redemptions} redemptions at ₹{} each show demand is not price sensitive.",
                revenue_per_redemption.round_dp(2)
            ),
            impact: "Higher revenue per redemption with little volume loss".to_string(),
            action: format!("Raise deal price to ₹{suggested}"),
            deal_id: Some(deal.id.clone()),
            current_value: deal.deal_price.to_f64(),
            recommended_value: suggested.to_f64(),
            expected_improvement: Some(self.rules.price_expected_improvement),
        })
    }

    fn priority_boost(&self, deal: &Deal, redemptions: u64) -> Option<Recommendation> {
        if redemptions <= self.rules.boost_min_redemptions
            || deal.priority <= self.rules.boost_max_priority
        {
            return None;
        }

        Some(Recommendation {
            id: format!("priority-{}", deal.id.0),
            kind: RecommendationKind::Priority,
            priority: RecommendationPriority::Medium,
            title: format!("Feature {} higher in the deal list", deal.title),
            description: format!(
                "{redemptions} redemptions while sitting at priority {}.",
                deal.priority
            ),
            impact: "More visibility for a proven performer".to_string(),
            action: format!("Move to priority 1-{}", self.rules.boost_max_priority),
            deal_id: Some(deal.id.clone()),
            current_value: Some(f64::from(deal.priority)),
            recommended_value: Some(f64::from(self.rules.boost_max_priority)),
            expected_improvement: Some(self.rules.boost_expected_improvement),
        })
    }

    fn peak_hours(&self) -> Recommendation {
        Recommendation {
            id: "timing-peak-hours".to_string(),
            kind: RecommendationKind::Timing,
            priority: RecommendationPriority::High,
            title: "Schedule deals during peak hours".to_string(),
            description: "Shoppers are most active between 18:00 and 21:00.".to_string(),
            impact: "Deals shown at peak traffic reach more carts".to_string(),
            action: "Schedule during peak hours (18:00-21:00)".to_string(),
            deal_id: None,
            current_value: None,
            recommended_value: None,
            expected_improvement: Some(self.rules.timing_expected_improvement),
        }
    }

    fn threshold_gap(&self, active: &[&Deal]) -> Option<Recommendation> {
        let low_threshold_deals = active
            .iter()
            .filter(|deal| deal.threshold_amount < self.rules.low_threshold)
            .count();
        if low_threshold_deals >= self.rules.min_low_threshold_deals {
            return None;
        }

        Some(Recommendation {
            id: "product-low-threshold-gap".to_string(),
            kind: RecommendationKind::Product,
            priority: RecommendationPriority::Medium,
            title: "Add a low-threshold deal".to_string(),
            description: format!(
                "Only {low_threshold_deals} active deal(s) unlock below ₹{}.",
                self.rules.low_threshold
            ),
            impact: "Smaller carts get a reason to convert".to_string(),
            action: format!("Create a deal with a threshold under ₹{}", self.rules.low_threshold),
            deal_id: None,
            current_value: Some(low_threshold_deals as f64),
            recommended_value: Some(self.rules.min_low_threshold_deals as f64),
            expected_improvement: Some(self.rules.gap_expected_improvement),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::RecommendationGenerator;
    use crate::analytics::types::{
        DealPerformanceRecord, RecommendationKind, RecommendationPriority,
    };
    use crate::domain::deal::{Deal, DealId, ProductId};

    fn deal(id: &str, threshold: i64, price: i64, priority: i32) -> Deal {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Deal {
            id: DealId(id.to_string()),
            title: format!("Deal {id}"),
            product_id: ProductId(format!("prod-{id}")),
            threshold_amount: Decimal::from(threshold),
            deal_price: Decimal::from(price),
            max_quantity_per_order: 1,
            priority,
            is_active: true,
            description: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn record(deal: &Deal, redemptions: u64, revenue: i64, conversion_rate: f64) -> DealPerformanceRecord {
        DealPerformanceRecord {
            deal_id: deal.id.clone(),
            title: deal.title.clone(),
            redemptions,
            revenue: Decimal::from(revenue),
            conversion_rate,
            avg_cart_value: deal.threshold_amount,
            threshold_amount: deal.threshold_amount,
            deal_price: deal.deal_price,
            priority: deal.priority,
        }
    }

    #[test]
    fn low_conversion_above_500_gets_threshold_cut() {
        let first = deal("d1", 499, 1, 1);
        let second = deal("d2", 599, 1, 2);
        let performance = vec![record(&first, 45, 45, 18.5), record(&second, 10, 10, 8.0)];

        let recs = RecommendationGenerator::new().generate(&[first, second], &performance);

        let threshold: Vec<_> =
            recs.iter().filter(|rec| rec.kind == RecommendationKind::Threshold).collect();
        assert_eq!(threshold.len(), 1);
        let rec = threshold[0];
        assert_eq!(rec.deal_id, Some(DealId("d2".to_string())));
        assert_eq!(rec.priority, RecommendationPriority::High);
        assert!((rec.recommended_value.unwrap() - 509.15).abs() < 1e-9);
        assert!((rec.expected_improvement.unwrap() - 10.5).abs() < 1e-9);
    }

    #[test]
    fn cheap_redemptions_with_volume_get_price_raise() {
        let busy = deal("d1", 299, 10, 1);
        let performance = vec![record(&busy, 25, 250, 40.0)];

        let recs = RecommendationGenerator::new().generate(&[busy], &performance);
        let price = recs.iter().find(|rec| rec.kind == RecommendationKind::Price).expect("price");
        assert_eq!(price.priority, RecommendationPriority::Medium);
        assert_eq!(price.recommended_value, Some(11.0));
        assert_eq!(price.expected_improvement, Some(12.0));
    }

    #[test]
    fn price_rule_needs_more_than_twenty_redemptions() {
        let quiet = deal("d1", 299, 10, 1);
        let performance = vec![record(&quiet, 20, 200, 40.0)];
        let recs = RecommendationGenerator::new().generate(&[quiet], &performance);
        assert!(recs.iter().all(|rec| rec.kind != RecommendationKind::Price));
    }

    #[test]
    fn strong_deal_buried_in_the_list_gets_priority_boost() {
        let buried = deal("d1", 299, 1, 7);
        let featured = deal("d2", 199, 1, 2);
        let performance = vec![record(&buried, 31, 31, 40.0), record(&featured, 80, 80, 40.0)];

        let recs = RecommendationGenerator::new().generate(&[buried, featured], &performance);
        let boosts: Vec<_> =
            recs.iter().filter(|rec| rec.kind == RecommendationKind::Priority).collect();
        assert_eq!(boosts.len(), 1);
        assert_eq!(boosts[0].deal_id, Some(DealId("d1".to_string())));
        assert_eq!(boosts[0].expected_improvement, Some(25.0));
    }

    #[test]
    fn timing_is_always_emitted_once_even_without_deals() {
        let recs = RecommendationGenerator::new().generate(&[], &[]);
        let timing: Vec<_> =
            recs.iter().filter(|rec| rec.kind == RecommendationKind::Timing).collect();
        assert_eq!(timing.len(), 1);
        assert_eq!(timing[0].priority, RecommendationPriority::High);
        assert_eq!(timing[0].expected_improvement, Some(35.0));
        // no deals at all also means no low-threshold coverage
        assert!(recs.iter().any(|rec| rec.kind == RecommendationKind::Product));
    }

    #[test]
    fn gap_rule_is_silent_with_two_low_threshold_deals() {
        let deals = vec![deal("d1", 199, 1, 1), deal("d2", 499, 1, 2), deal("d3", 999, 1, 3)];
        let performance: Vec<_> = deals.iter().map(|deal| record(deal, 5, 5, 50.0)).collect();

        let recs = RecommendationGenerator::new().generate(&deals, &performance);
        assert!(recs.iter().all(|rec| rec.kind != RecommendationKind::Product));
    }

    #[test]
    fn inactive_deals_produce_no_recommendations() {
        let mut paused = deal("d1", 999, 1, 9);
        paused.is_active = false;
        let performance = vec![record(&paused, 100, 100, 1.0)];

        let recs = RecommendationGenerator::new().generate(&[paused], &performance);
        assert!(recs.iter().all(|rec| rec.deal_id.is_none()));
    }

    #[test]
    fn output_is_ordered_by_priority_and_stable_within_priority() {
        let deals = vec![deal("d1", 999, 1, 9), deal("d2", 899, 1, 8)];
        let performance = vec![record(&deals[0], 40, 40, 2.0), record(&deals[1], 40, 40, 3.0)];

        let recs = RecommendationGenerator::new().generate(&deals, &performance);
        let priorities: Vec<_> = recs.iter().map(|rec| rec.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);

        let ids: Vec<&str> = recs.iter().map(|rec| rec.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "threshold-d1",
                "threshold-d2",
                "timing-peak-hours",
                "price-d1",
                "priority-d1",
                "price-d2",
                "priority-d2",
                "product-low-threshold-gap",
            ]
        );
    }

    #[test]
    fn deal_without_performance_is_treated_as_unconverted() {
        let recs = RecommendationGenerator::new().generate(&[deal("d1", 750, 1, 1)], &[]);
        let threshold = recs
            .iter()
            .find(|rec| rec.kind == RecommendationKind::Threshold)
            .expect("threshold recommendation");
        assert_eq!(threshold.expected_improvement, Some(22.5));
    }
}
