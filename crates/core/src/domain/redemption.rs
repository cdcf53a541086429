use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::deal::DealId;
use crate::domain::order::{LineItemId, OrderId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseEventId(pub String);

/// Identity of one redemption: a deal applied to one line item of one order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RedemptionKey {
    pub order_id: OrderId,
    pub deal_id: DealId,
    pub line_item_id: LineItemId,
}

impl RedemptionKey {
    pub fn new(order_id: OrderId, deal_id: DealId, line_item_id: LineItemId) -> Self {
        Self { order_id, deal_id, line_item_id }
    }

    /// Deterministic event id, so the store's primary key rejects duplicates.
    pub fn event_id(&self) -> PurchaseEventId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.order_id.0.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.deal_id.0.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(self.line_item_id.0.as_bytes());
        let digest = hasher.finalize().to_hex();
        PurchaseEventId(format!("pe_{}", &digest.as_str()[..32]))
    }
}

/// One deal redemption inside an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseEvent {
    pub id: PurchaseEventId,
    pub deal_id: DealId,
    pub order_id: OrderId,
    pub line_item_id: LineItemId,
    pub price: Decimal,
    pub quantity: u32,
    /// Total of the order the deal was redeemed in.
    pub cart_total: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl PurchaseEvent {
    pub fn key(&self) -> RedemptionKey {
        RedemptionKey::new(self.order_id.clone(), self.deal_id.clone(), self.line_item_id.clone())
    }

    pub fn revenue(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}
