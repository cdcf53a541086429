use sqlx::migrate::{MigrateError, Migrator};
use sqlx::Row;

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Version of the migration that introduces the analytics tables.
pub const ANALYTICS_SCHEMA_VERSION: i64 = 2;

pub const STOREFRONT_TABLES: &[&str] = &["deals", "orders", "order_items"];
pub const ANALYTICS_TABLES: &[&str] = &["deal_purchase_events", "deal_funnel_events", "ab_tests"];

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Tables from `expected` that are not present in the database.
pub async fn missing_tables(
    pool: &DbPool,
    expected: &[&str],
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(pool)
        .await?;
    let present: Vec<String> =
        rows.iter().map(|row| row.try_get::<String, _>("name")).collect::<Result<_, _>>()?;

    Ok(expected
        .iter()
        .filter(|table| !present.iter().any(|name| name == *table))
        .map(|table| table.to_string())
        .collect())
}

pub async fn analytics_schema_ready(pool: &DbPool) -> Result<bool, sqlx::Error> {
    Ok(missing_tables(pool, ANALYTICS_TABLES).await?.is_empty())
}
