use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DealId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// A promotion that unlocks `deal_price` on one product once the cart reaches
/// `threshold_amount`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub title: String,
    pub product_id: ProductId,
    pub threshold_amount: Decimal,
    pub deal_price: Decimal,
    pub max_quantity_per_order: u32,
    /// Lower values are shown first.
    pub priority: i32,
    pub is_active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderDirection {
    Up,
    Down,
}

impl ReorderDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Display order: priority, then creation time, then id.
pub fn sort_by_priority(deals: &mut [Deal]) {
    deals.sort_by(|left, right| {
        left.priority
            .cmp(&right.priority)
            .then_with(|| left.created_at.cmp(&right.created_at))
            .then_with(|| left.id.cmp(&right.id))
    });
}

/// Swaps `deal_id` with its display neighbour and renumbers every priority densely
/// from 1. Returns `true` when the order changed.
pub fn reorder(
    deals: &mut Vec<Deal>,
    deal_id: &DealId,
    direction: ReorderDirection,
    now: DateTime<Utc>,
) -> Result<bool, DomainError> {
    sort_by_priority(deals);

    let position = deals
        .iter()
        .position(|deal| &deal.id == deal_id)
        .ok_or_else(|| DomainError::UnknownDeal(deal_id.0.clone()))?;

    let target = match direction {
        ReorderDirection::Up if position > 0 => Some(position - 1),
        ReorderDirection::Down if position + 1 < deals.len() => Some(position + 1),
        _ => None,
    };

    if let Some(target) = target {
        deals.swap(position, target);
    }

    for (index, deal) in deals.iter_mut().enumerate() {
        let dense = index as i32 + 1;
        if deal.priority != dense {
            deal.priority = dense;
            deal.updated_at = now;
        }
    }

    Ok(target.is_some())
}
