use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use dealpulse_core::analytics::{MeasuredFunnel, SchemaStatus};
use dealpulse_core::domain::deal::{sort_by_priority, Deal, DealId};
use dealpulse_core::domain::order::{Order, OrderId};
use dealpulse_core::domain::period::DateRange;
use dealpulse_core::domain::redemption::{PurchaseEvent, RedemptionKey};
use dealpulse_core::experiments::{AbTest, AbTestId};

use super::{AbTestRepository, DealEventStore, DealRepository, RepositoryError};

/// One shared in-process store backing every repository trait, so deal edits made
/// through `DealRepository` are visible to the analytics reads.
#[derive(Default)]
pub struct InMemoryStore {
    deals: RwLock<HashMap<String, Deal>>,
    orders: RwLock<Vec<Order>>,
    redemptions: RwLock<HashMap<RedemptionKey, PurchaseEvent>>,
    ab_tests: RwLock<HashMap<String, AbTest>>,
    funnel: RwLock<MeasuredFunnel>,
    analytics_schema_missing: bool,
}

impl InMemoryStore {
    /// A store whose analytics tables behave as if migrations never ran.
    pub fn without_analytics_schema() -> Self {
        Self { analytics_schema_missing: true, ..Self::default() }
    }

    pub async fn insert_order(&self, order: Order) {
        self.orders.write().await.push(order);
    }

    pub async fn insert_deal(&self, deal: Deal) {
        self.deals.write().await.insert(deal.id.0.clone(), deal);
    }

    pub async fn set_measured_funnel(&self, funnel: MeasuredFunnel) {
        *self.funnel.write().await = funnel;
    }

    fn require_analytics(&self, table: &str) -> Result<(), RepositoryError> {
        if self.analytics_schema_missing {
            return Err(RepositoryError::SchemaNotInitialized(table.to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DealEventStore for InMemoryStore {
    async fn schema_status(&self) -> Result<SchemaStatus, RepositoryError> {
        Ok(if self.analytics_schema_missing { SchemaStatus::Missing } else { SchemaStatus::Ready })
    }

    async fn list_active_deals(&self) -> Result<Vec<Deal>, RepositoryError> {
        let deals = self.deals.read().await;
        let mut active: Vec<Deal> = deals.values().filter(|deal| deal.is_active).cloned().collect();
        sort_by_priority(&mut active);
        Ok(active)
    }

    async fn list_orders(&self, range: &DateRange) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().filter(|order| range.contains_instant(order.placed_at)).cloned().collect())
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        Ok(self.orders.read().await.clone())
    }

    async fn list_redemptions(
        &self,
        range: &DateRange,
    ) -> Result<Vec<PurchaseEvent>, RepositoryError> {
        self.require_analytics("deal_purchase_events")?;
        let redemptions = self.redemptions.read().await;
        let mut events: Vec<PurchaseEvent> = redemptions
            .values()
            .filter(|event| range.contains_instant(event.occurred_at))
            .cloned()
            .collect();
        events.sort_by(|left, right| {
            left.occurred_at.cmp(&right.occurred_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(events)
    }

    async fn existing_redemption_keys(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashSet<RedemptionKey>, RepositoryError> {
        self.require_analytics("deal_purchase_events")?;
        let wanted: HashSet<&OrderId> = order_ids.iter().collect();
        let redemptions = self.redemptions.read().await;
        Ok(redemptions.keys().filter(|key| wanted.contains(&key.order_id)).cloned().collect())
    }

    async fn insert_redemptions(&self, events: Vec<PurchaseEvent>) -> Result<u64, RepositoryError> {
        self.require_analytics("deal_purchase_events")?;
        let mut redemptions = self.redemptions.write().await;
        let mut inserted = 0u64;
        for event in events {
            let key = event.key();
            if !redemptions.contains_key(&key) {
                redemptions.insert(key, event);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn measured_funnel(&self, _range: &DateRange) -> Result<MeasuredFunnel, RepositoryError> {
        self.require_analytics("deal_funnel_events")?;
        Ok(*self.funnel.read().await)
    }
}

#[async_trait::async_trait]
impl DealRepository for InMemoryStore {
    async fn list_all(&self) -> Result<Vec<Deal>, RepositoryError> {
        let mut deals: Vec<Deal> = self.deals.read().await.values().cloned().collect();
        sort_by_priority(&mut deals);
        Ok(deals)
    }

    async fn find_by_id(&self, id: &DealId) -> Result<Option<Deal>, RepositoryError> {
        Ok(self.deals.read().await.get(&id.0).cloned())
    }

    async fn save(&self, deal: Deal) -> Result<(), RepositoryError> {
        self.insert_deal(deal).await;
        Ok(())
    }

    async fn save_priorities(&self, updated: &[Deal]) -> Result<(), RepositoryError> {
        let mut deals = self.deals.write().await;
        for deal in updated {
            if let Some(stored) = deals.get_mut(&deal.id.0) {
                stored.priority = deal.priority;
                stored.updated_at = deal.updated_at;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AbTestRepository for InMemoryStore {
    async fn find_by_id(&self, id: &AbTestId) -> Result<Option<AbTest>, RepositoryError> {
        self.require_analytics("ab_tests")?;
        Ok(self.ab_tests.read().await.get(&id.0).cloned())
    }

    async fn save(&self, test: AbTest) -> Result<(), RepositoryError> {
        self.require_analytics("ab_tests")?;
        self.ab_tests.write().await.insert(test.id.0.clone(), test);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AbTest>, RepositoryError> {
        self.require_analytics("ab_tests")?;
        let mut tests: Vec<AbTest> = self.ab_tests.read().await.values().cloned().collect();
        tests.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(tests)
    }
}

#[cfg(test)]
mod tests {
    use dealpulse_core::domain::deal::DealId;
    use dealpulse_core::domain::order::{OrderId, OrderStatus};
    use dealpulse_core::domain::period::DateRange;

    use crate::fixtures::{sample_deal, sample_order};
    use crate::repositories::{DealEventStore, DealRepository, InMemoryStore, RepositoryError};

    #[tokio::test]
    async fn in_memory_deal_repo_round_trip() {
        let store = InMemoryStore::default();
        let deal = sample_deal("d-soap", "soap", 499, 1);

        DealRepository::save(&store, deal.clone()).await.expect("save deal");
        let found = DealRepository::find_by_id(&store, &deal.id).await.expect("find deal");

        assert_eq!(found, Some(deal));
        assert!(DealRepository::find_by_id(&store, &DealId("nope".to_string()))
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn orders_are_filtered_by_range() {
        let store = InMemoryStore::default();
        store.insert_order(sample_order("o-1", 2, OrderStatus::Paid, &[])).await;
        store.insert_order(sample_order("o-2", 20, OrderStatus::Paid, &[])).await;

        let range = DateRange::parse("2026-03-01", "2026-03-07").expect("range");
        let orders = store.list_orders(&range).await.expect("orders");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, OrderId("o-1".to_string()));
    }

    #[tokio::test]
    async fn missing_schema_is_reported_on_analytics_reads_only() {
        let store = InMemoryStore::without_analytics_schema();
        let range = DateRange::parse("2026-03-01", "2026-03-07").expect("range");

        assert!(store.list_orders(&range).await.is_ok());
        assert!(matches!(
            store.list_redemptions(&range).await,
            Err(RepositoryError::SchemaNotInitialized(_))
        ));
        assert!(matches!(
            store.insert_redemptions(Vec::new()).await,
            Err(RepositoryError::SchemaNotInitialized(_))
        ));
    }
}
