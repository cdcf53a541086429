//! Aggregation of orders and redemptions into dashboard metrics

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::types::*;
use super::{ESTIMATED_ADD_RATE, ESTIMATED_COMPLETION_RATE};
use crate::domain::deal::{Deal, DealId};
use crate::domain::order::{Order, OrderId};
use crate::domain::period::DateRange;
use crate::domain::redemption::PurchaseEvent;

/// Everything `aggregate` reads. Rows outside `range` are ignored.
#[derive(Debug, Clone, Copy)]
pub struct AggregationInput<'a> {
    pub range: DateRange,
    pub deals: &'a [Deal],
    pub orders: &'a [Order],
    pub redemptions: &'a [PurchaseEvent],
    pub measured_funnel: MeasuredFunnel,
}

pub fn aggregate(input: &AggregationInput<'_>) -> DealAnalytics {
    let active_deals: Vec<&Deal> = input.deals.iter().filter(|deal| deal.is_active).collect();
    let orders: Vec<&Order> = input
        .orders
        .iter()
        .filter(|order| order.is_countable() && input.range.contains_instant(order.placed_at))
        .collect();
    let redemptions: Vec<&PurchaseEvent> = input
        .redemptions
        .iter()
        .filter(|event| input.range.contains_instant(event.occurred_at))
        .collect();

    let performance = deal_performance(&active_deals, &orders, &redemptions);
    let buckets = threshold_buckets(&active_deals, &performance);

    DealAnalytics {
        time_series: time_series(&input.range, &orders, &redemptions),
        funnel: funnel(&active_deals, &orders, &redemptions, input.measured_funnel),
        performance,
        buckets,
    }
}

fn time_series(
    range: &DateRange,
    orders: &[&Order],
    redemptions: &[&PurchaseEvent],
) -> Vec<TimeSeriesPoint> {
    let mut by_day: BTreeMap<NaiveDate, TimeSeriesPoint> =
        range.days().map(|day| (day, TimeSeriesPoint::zero(day))).collect();

    for event in redemptions {
        if let Some(point) = by_day.get_mut(&event.occurred_at.date_naive()) {
            point.redemptions += 1;
            point.revenue += event.revenue();
        }
    }

    for order in orders {
        if let Some(point) = by_day.get_mut(&order.placed_at.date_naive()) {
            point.orders += 1;
        }
    }

    by_day.into_values().collect()
}

fn deal_performance(
    deals: &[&Deal],
    orders: &[&Order],
    redemptions: &[&PurchaseEvent],
) -> Vec<DealPerformanceRecord> {
    let mut events_by_deal: HashMap<&DealId, Vec<&PurchaseEvent>> = HashMap::new();
    for event in redemptions {
        events_by_deal.entry(&event.deal_id).or_default().push(event);
    }

    deals
        .iter()
        .map(|deal| {
            let events = events_by_deal.get(&deal.id).map(Vec::as_slice).unwrap_or_default();
            let revenue: Decimal = events.iter().map(|event| event.revenue()).sum();

            let redeemed_orders: HashSet<&OrderId> =
                events.iter().map(|event| &event.order_id).collect();
            let eligible: Vec<&&Order> = orders
                .iter()
                .filter(|order| order.total_amount >= deal.threshold_amount)
                .collect();
            // only eligible orders count as conversions, so the rate stays within 0..=100
            let converted =
                eligible.iter().filter(|order| redeemed_orders.contains(&order.id)).count();
            let conversion_rate = if eligible.is_empty() {
                0.0
            } else {
                converted as f64 / eligible.len() as f64 * 100.0
            };

            let avg_cart_value = if events.is_empty() {
                deal.threshold_amount
            } else {
                let total: Decimal = events.iter().map(|event| event.cart_total).sum();
                total / Decimal::from(events.len())
            };

            DealPerformanceRecord {
                deal_id: deal.id.clone(),
                title: deal.title.clone(),
                redemptions: events.len() as u64,
                revenue,
                conversion_rate,
                avg_cart_value,
                threshold_amount: deal.threshold_amount,
                deal_price: deal.deal_price,
                priority: deal.priority,
            }
        })
        .collect()
}

fn threshold_buckets(
    deals: &[&Deal],
    performance: &[DealPerformanceRecord],
) -> Vec<ThresholdBucket> {
    let redemptions_by_deal: HashMap<&DealId, u64> =
        performance.iter().map(|record| (&record.deal_id, record.redemptions)).collect();

    let mut buckets: Vec<ThresholdBucket> =
        BucketRange::ALL.into_iter().map(ThresholdBucket::empty).collect();

    for deal in deals {
        let range = BucketRange::for_threshold(deal.threshold_amount);
        if let Some(bucket) = buckets.iter_mut().find(|bucket| bucket.range == range) {
            bucket.deal_count += 1;
            bucket.redemptions += redemptions_by_deal.get(&deal.id).copied().unwrap_or(0);
        }
    }

    buckets
}

fn funnel(
    deals: &[&Deal],
    orders: &[&Order],
    redemptions: &[&PurchaseEvent],
    measured: MeasuredFunnel,
) -> ConversionFunnel {
    let eligible_orders: Vec<&&Order> = deals
        .iter()
        .map(|deal| deal.threshold_amount)
        .min()
        .map(|minimum| orders.iter().filter(|order| order.total_amount >= minimum).collect())
        .unwrap_or_default();
    let eligible = eligible_orders.len() as u64;

    let views = measured
        .views
        .map(FunnelStage::measured)
        .unwrap_or_else(|| FunnelStage::estimated(orders.len() as u64));

    let added = measured
        .added
        .map(FunnelStage::measured)
        .unwrap_or_else(|| FunnelStage::estimated(scale(eligible, ESTIMATED_ADD_RATE)));

    let redeemed_orders: HashSet<&OrderId> =
        redemptions.iter().map(|event| &event.order_id).collect();
    let completed_orders =
        eligible_orders.iter().filter(|order| redeemed_orders.contains(&order.id)).count() as u64;
    let completed = match measured.completed {
        Some(count) => FunnelStage::measured(count),
        None if completed_orders > 0 => FunnelStage::measured(completed_orders),
        None => FunnelStage::estimated(scale(added.count, ESTIMATED_COMPLETION_RATE)),
    };

    ConversionFunnel { views, eligible: FunnelStage::measured(eligible), added, completed }
}

fn scale(count: u64, rate: f64) -> u64 {
    (count as f64 * rate).round() as u64
}
