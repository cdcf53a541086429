//! Reconciliation of historical orders into purchase events

use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::deal::{Deal, DealId};
use crate::domain::order::{Order, OrderItem};
use crate::domain::redemption::{PurchaseEvent, RedemptionKey};

/// A line item matches a deal when its price is within a paisa of the deal price.
pub const PRICE_MATCH_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealBackfillSummary {
    pub deal_id: DealId,
    pub title: String,
    /// Line items matched in the scanned orders, reconciled or not.
    pub matched: u64,
    /// Events that are new in this run.
    pub created: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    /// Orders scanned.
    pub processed: u64,
    /// Distinct deals with at least one matching line item.
    pub deals_found: u64,
    pub events_created: u64,
    pub deals_processed: Vec<DealBackfillSummary>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillPlan {
    pub report: BackfillReport,
    /// Events to persist; empty counts still apply for dry runs.
    pub events: Vec<PurchaseEvent>,
}

pub fn matches_deal(item: &OrderItem, deal: &Deal) -> bool {
    deal.is_active
        && item.product_id == deal.product_id
        && (item.price - deal.deal_price).abs() <= PRICE_MATCH_TOLERANCE
}

/// Matches every line item of every countable order against the active deals and
/// emits one event per match whose key is not in `reconciled`.
pub fn plan_backfill(
    orders: &[Order],
    deals: &[Deal],
    reconciled: &HashSet<RedemptionKey>,
    dry_run: bool,
) -> BackfillPlan {
    let active: Vec<&Deal> = deals.iter().filter(|deal| deal.is_active).collect();
    let mut summaries: BTreeMap<&DealId, DealBackfillSummary> = BTreeMap::new();
    let mut planned: HashSet<RedemptionKey> = HashSet::new();
    let mut events = Vec::new();
    let mut processed = 0u64;

    for order in orders.iter().filter(|order| order.is_countable()) {
        processed += 1;

        for item in &order.items {
            for deal in active.iter().filter(|deal| matches_deal(item, deal)) {
                let summary = summaries.entry(&deal.id).or_insert_with(|| DealBackfillSummary {
                    deal_id: deal.id.clone(),
                    title: deal.title.clone(),
                    matched: 0,
                    created: 0,
                });
                summary.matched += 1;

                let key = RedemptionKey::new(order.id.clone(), deal.id.clone(), item.id.clone());
                if reconciled.contains(&key) || !planned.insert(key.clone()) {
                    continue;
                }

                summary.created += 1;
                events.push(PurchaseEvent {
                    id: key.event_id(),
                    deal_id: key.deal_id,
                    order_id: key.order_id,
                    line_item_id: key.line_item_id,
                    price: item.price,
                    quantity: item.quantity,
                    cart_total: order.total_amount,
                    occurred_at: order.placed_at,
                });
            }
        }
    }

    let deals_processed: Vec<DealBackfillSummary> = summaries.into_values().collect();
    let report = BackfillReport {
        processed,
        deals_found: deals_processed.len() as u64,
        events_created: events.len() as u64,
        deals_processed,
        dry_run,
    };

    BackfillPlan { report, events }
}
