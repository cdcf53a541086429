use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use dealpulse_core::analytics::{MeasuredFunnel, SchemaStatus};
use dealpulse_core::domain::deal::{Deal, DealId};
use dealpulse_core::domain::order::{Order, OrderId};
use dealpulse_core::domain::period::DateRange;
use dealpulse_core::domain::redemption::{PurchaseEvent, RedemptionKey};
use dealpulse_core::experiments::{AbTest, AbTestId};

pub mod deal;
pub mod event_store;
pub mod memory;

pub use ab_test::SqlAbTestRepository;
pub use deal::SqlDealRepository;
pub use event_store::SqlDealEventStore;
pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("table `{0}` does not exist; run `dealpulse migrate` first")]
    SchemaNotInitialized(String),
}

impl RepositoryError {
    pub fn is_schema_missing(&self) -> bool {
        matches!(self, Self::SchemaNotInitialized(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match missing_table(&error) {
            Some(table) => Self::SchemaNotInitialized(table),
            None => Self::Database(error),
        }
    }
}

fn missing_table(error: &sqlx::Error) -> Option<String> {
    let message = error.as_database_error()?.message();
    let table = message.strip_prefix("no such table: ")?;
    Some(table.trim().trim_start_matches("main.").to_string())
}

/// Read side of the analytics engine plus the backfill write path.
#[async_trait]
pub trait DealEventStore: Send + Sync {
    async fn schema_status(&self) -> Result<SchemaStatus, RepositoryError>;

    async fn list_active_deals(&self) -> Result<Vec<Deal>, RepositoryError>;

    /// Orders placed within the inclusive date range, any status.
    async fn list_orders(&self, range: &DateRange) -> Result<Vec<Order>, RepositoryError>;

    async fn list_all_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn list_redemptions(
        &self,
        range: &DateRange,
    ) -> Result<Vec<PurchaseEvent>, RepositoryError>;

    async fn existing_redemption_keys(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashSet<RedemptionKey>, RepositoryError>;

    /// Returns how many events were actually stored; already reconciled keys are skipped.
    async fn insert_redemptions(&self, events: Vec<PurchaseEvent>) -> Result<u64, RepositoryError>;

    async fn measured_funnel(&self, range: &DateRange) -> Result<MeasuredFunnel, RepositoryError>;
}

#[async_trait]
pub trait DealRepository: Send + Sync {
    async fn list_all(&self) -> Result<Vec<Deal>, RepositoryError>;
    async fn find_by_id(&self, id: &DealId) -> Result<Option<Deal>, RepositoryError>;
    async fn save(&self, deal: Deal) -> Result<(), RepositoryError>;
    /// Persists `priority` and `updated_at` of every given deal atomically.
    async fn save_priorities(&self, deals: &[Deal]) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AbTestRepository: Send + Sync {
    async fn find_by_id(&self, id: &AbTestId) -> Result<Option<AbTest>, RepositoryError>;
    async fn save(&self, test: AbTest) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<AbTest>, RepositoryError>;
}

pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim())
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn parse_count(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column}: {value} is out of range")))
}
