//! Application service wiring the analytics engine to the stores

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use dealpulse_core::analytics::{
    plan_backfill, AnalyticsReport, AnalyticsSnapshot, BackfillReport, DealAnalyticsEngine,
    SchemaStatus,
};
use dealpulse_core::domain::deal::{reorder, Deal, DealId, ReorderDirection};
use dealpulse_core::domain::order::OrderId;
use dealpulse_core::domain::period::DateRange;
use dealpulse_core::errors::{ApplicationError, DomainError};
use dealpulse_core::experiments::{
    AbTest, AbTestId, AbTestStatus, NewAbTest, VariantLabel, VariantResults,
};

use crate::repositories::{
    AbTestRepository, DealEventStore, DealRepository, InMemoryStore, RepositoryError,
    SqlAbTestRepository, SqlDealEventStore, SqlDealRepository,
};
use crate::DbPool;

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::SchemaNotInitialized(table) => Self::SchemaNotInitialized(table),
            other => Self::Persistence(other.to_string()),
        }
    }
}

pub struct DealAnalyticsService {
    events: Arc<dyn DealEventStore>,
    deals: Arc<dyn DealRepository>,
    ab_tests: Arc<dyn AbTestRepository>,
    engine: DealAnalyticsEngine,
}

impl DealAnalyticsService {
    pub fn new(
        events: Arc<dyn DealEventStore>,
        deals: Arc<dyn DealRepository>,
        ab_tests: Arc<dyn AbTestRepository>,
    ) -> Self {
        Self { events, deals, ab_tests, engine: DealAnalyticsEngine::default() }
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self::new(
            Arc::new(SqlDealEventStore::new(pool.clone())),
            Arc::new(SqlDealRepository::new(pool.clone())),
            Arc::new(SqlAbTestRepository::new(pool)),
        )
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn with_engine(mut self, engine: DealAnalyticsEngine) -> Self {
        self.engine = engine;
        self
    }

    pub async fn schema_status(&self) -> Result<SchemaStatus, ApplicationError> {
        Ok(self.events.schema_status().await?)
    }

    /// Recomputes every dashboard metric for `range`.
    ///
    /// A missing analytics schema is not an error here: the caller gets a zeroed
    /// report whose diagnostics say so.
    pub async fn refresh(&self, range: DateRange) -> Result<AnalyticsReport, ApplicationError> {
        let generated_at = Utc::now();

        let snapshot = match self.snapshot(range).await {
            Ok(snapshot) => snapshot,
            Err(RepositoryError::SchemaNotInitialized(table)) => {
                warn!(
                    event_name = "analytics.refresh.schema_missing",
                    correlation_id = "refresh",
                    table = %table,
                    from = %range.from,
                    to = %range.to,
                    "analytics schema missing, returning empty report"
                );
                return Ok(AnalyticsReport::empty(range, generated_at, SchemaStatus::Missing));
            }
            Err(error) => return Err(ApplicationError::Persistence(error.to_string())),
        };

        let report = self.engine.run(&snapshot, generated_at);
        info!(
            event_name = "analytics.refresh.completed",
            correlation_id = "refresh",
            from = %range.from,
            to = %range.to,
            orders = report.diagnostics.orders_scanned,
            redemptions = report.diagnostics.redemptions_scanned,
            recommendations = report.recommendations.len(),
            "analytics report generated"
        );
        Ok(report)
    }

    async fn snapshot(&self, range: DateRange) -> Result<AnalyticsSnapshot, RepositoryError> {
        if self.events.schema_status().await? == SchemaStatus::Missing {
            return Err(RepositoryError::SchemaNotInitialized("deal_purchase_events".to_string()));
        }

        Ok(AnalyticsSnapshot {
            range,
            deals: self.events.list_active_deals().await?,
            orders: self.events.list_orders(&range).await?,
            redemptions: self.events.list_redemptions(&range).await?,
            measured_funnel: self.events.measured_funnel(&range).await?,
        })
    }

    /// Reconciles historical orders into purchase events. `None` scans every order.
    pub async fn backfill(
        &self,
        range: Option<DateRange>,
        dry_run: bool,
    ) -> Result<BackfillReport, ApplicationError> {
        if self.events.schema_status().await? == SchemaStatus::Missing {
            warn!(
                event_name = "backfill.schema_missing",
                correlation_id = "backfill",
                "backfill requested before the analytics migration ran"
            );
            return Err(ApplicationError::SchemaNotInitialized(
                "deal_purchase_events".to_string(),
            ));
        }

        let orders = match range {
            Some(range) => self.events.list_orders(&range).await?,
            None => self.events.list_all_orders().await?,
        };
        let deals = self.events.list_active_deals().await?;

        let order_ids: Vec<OrderId> = orders
            .iter()
            .filter(|order| order.is_countable())
            .map(|order| order.id.clone())
            .collect();
        let reconciled = self.events.existing_redemption_keys(&order_ids).await?;

        let plan = plan_backfill(&orders, &deals, &reconciled, dry_run);
        let mut report = plan.report;

        if !dry_run && !plan.events.is_empty() {
            let inserted = self.events.insert_redemptions(plan.events).await?;
            if inserted != report.events_created {
                warn!(
                    event_name = "backfill.concurrent_insert",
                    correlation_id = "backfill",
                    planned = report.events_created,
                    inserted,
                    "some planned events were already stored"
                );
            }
            report.events_created = inserted;
        }

        info!(
            event_name = "backfill.completed",
            correlation_id = "backfill",
            dry_run,
            processed = report.processed,
            deals_found = report.deals_found,
            events_created = report.events_created,
            "backfill finished"
        );
        Ok(report)
    }

    pub async fn list_deals(&self) -> Result<Vec<Deal>, ApplicationError> {
        Ok(self.deals.list_all().await?)
    }

    /// Moves a deal one slot in display order and returns every deal in the new order.
    pub async fn reorder_deal(
        &self,
        deal_id: &DealId,
        direction: ReorderDirection,
    ) -> Result<Vec<Deal>, ApplicationError> {
        let mut deals = self.deals.list_all().await?;
        let moved = reorder(&mut deals, deal_id, direction, Utc::now())?;

        self.deals.save_priorities(&deals).await?;
        info!(
            event_name = "deals.reordered",
            correlation_id = "reorder",
            deal_id = %deal_id.0,
            direction = ?direction,
            moved,
            "deal priorities saved"
        );
        Ok(deals)
    }

    pub async fn create_ab_test(&self, input: NewAbTest) -> Result<AbTest, ApplicationError> {
        if self.deals.find_by_id(&input.deal_id).await?.is_none() {
            return Err(DomainError::UnknownDeal(input.deal_id.0).into());
        }

        let test = AbTest::create(input, Utc::now())?;
        self.ab_tests.save(test.clone()).await?;
        info!(
            event_name = "ab_test.created",
            correlation_id = %test.id.0,
            deal_id = %test.deal_id.0,
            traffic_split = test.traffic_split,
            "A/B test created"
        );
        Ok(test)
    }

    pub async fn ab_test(&self, id: &AbTestId) -> Result<AbTest, ApplicationError> {
        self.ab_tests
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::UnknownAbTest(id.0.clone()).into())
    }

    pub async fn list_ab_tests(&self) -> Result<Vec<AbTest>, ApplicationError> {
        Ok(self.ab_tests.list().await?)
    }

    pub async fn record_ab_result(
        &self,
        id: &AbTestId,
        variant: VariantLabel,
        observed: VariantResults,
        confidence: Option<f64>,
    ) -> Result<AbTest, ApplicationError> {
        let mut test = self.ab_test(id).await?;
        test.record_result(variant, observed, confidence, Utc::now())?;
        self.ab_tests.save(test.clone()).await?;

        info!(
            event_name = "ab_test.result_recorded",
            correlation_id = %test.id.0,
            variant = ?variant,
            winner = ?test.results.winner,
            "A/B test result recorded"
        );
        Ok(test)
    }

    pub async fn transition_ab_test(
        &self,
        id: &AbTestId,
        next: AbTestStatus,
    ) -> Result<AbTest, ApplicationError> {
        let mut test = self.ab_test(id).await?;
        let previous = test.status;
        test.transition_to(next, Utc::now())?;
        self.ab_tests.save(test.clone()).await?;

        info!(
            event_name = "ab_test.transitioned",
            correlation_id = %test.id.0,
            from = previous.as_str(),
            to = next.as_str(),
            "A/B test status changed"
        );
        Ok(test)
    }
}
