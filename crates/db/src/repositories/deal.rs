use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use dealpulse_core::domain::deal::{sort_by_priority, Deal, DealId, ProductId};

use super::{format_timestamp, parse_count, parse_decimal, parse_timestamp, DealRepository, RepositoryError};
use crate::DbPool;

const DEAL_COLUMNS: &str = "id, title, product_id, threshold_amount, deal_price,
     max_quantity_per_order, priority, is_active, description, created_at, updated_at";

pub struct SqlDealRepository {
    pool: DbPool,
}

impl SqlDealRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_deal(row: &SqliteRow) -> Result<Deal, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: String =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let threshold_amount: String =
        row.try_get("threshold_amount").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let deal_price: String =
        row.try_get("deal_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let max_quantity: i64 = row
        .try_get("max_quantity_per_order")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority: i64 =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_active: bool =
        row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Deal {
        id: DealId(id),
        title,
        product_id: ProductId(product_id),
        threshold_amount: parse_decimal("threshold_amount", &threshold_amount)?,
        deal_price: parse_decimal("deal_price", &deal_price)?,
        max_quantity_per_order: parse_count("max_quantity_per_order", max_quantity)?,
        priority: i32::try_from(priority)
            .map_err(|_| RepositoryError::Decode(format!("priority: {priority} is out of range")))?,
        is_active,
        description,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl DealRepository for SqlDealRepository {
    async fn list_all(&self) -> Result<Vec<Deal>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals"))
            .fetch_all(&self.pool)
            .await?;

        let mut deals = rows.iter().map(row_to_deal).collect::<Result<Vec<_>, _>>()?;
        sort_by_priority(&mut deals);
        Ok(deals)
    }

    async fn find_by_id(&self, id: &DealId) -> Result<Option<Deal>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_deal(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, deal: Deal) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO deals (id, title, product_id, threshold_amount, deal_price,
                                max_quantity_per_order, priority, is_active, description,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 product_id = excluded.product_id,
                 threshold_amount = excluded.threshold_amount,
                 deal_price = excluded.deal_price,
                 max_quantity_per_order = excluded.max_quantity_per_order,
                 priority = excluded.priority,
                 is_active = excluded.is_active,
                 description = excluded.description,
                 updated_at = excluded.updated_at",
        )
        .bind(&deal.id.0)
        .bind(&deal.title)
        .bind(&deal.product_id.0)
        .bind(deal.threshold_amount.to_string())
        .bind(deal.deal_price.to_string())
        .bind(i64::from(deal.max_quantity_per_order))
        .bind(deal.priority)
        .bind(deal.is_active)
        .bind(&deal.description)
        .bind(format_timestamp(deal.created_at))
        .bind(format_timestamp(deal.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_priorities(&self, deals: &[Deal]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for deal in deals {
            sqlx::query("UPDATE deals SET priority = ?, updated_at = ? WHERE id = ?")
                .bind(deal.priority)
                .bind(format_timestamp(deal.updated_at))
                .bind(&deal.id.0)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use dealpulse_core::domain::deal::DealId;

    use super::SqlDealRepository;
    use crate::fixtures::sample_deal;
    use crate::repositories::DealRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let repo = SqlDealRepository::new(setup().await);
        let mut deal = sample_deal("d-soap", "soap", 499, 1);
        deal.description = Some("Bathing bar for ₹1".to_string());

        repo.save(deal.clone()).await.expect("save");
        let found = repo.find_by_id(&deal.id).await.expect("find").expect("should exist");

        assert_eq!(found, deal);
        assert!(repo.find_by_id(&DealId("missing".to_string())).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn save_upserts_on_conflict() {
        let repo = SqlDealRepository::new(setup().await);
        let deal = sample_deal("d-soap", "soap", 499, 1);
        repo.save(deal.clone()).await.expect("save");

        let mut updated = deal;
        updated.threshold_amount = Decimal::new(42415, 2);
        updated.is_active = false;
        updated.updated_at = updated.updated_at + Duration::minutes(5);
        repo.save(updated.clone()).await.expect("upsert");

        let all = repo.list_all().await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].threshold_amount, Decimal::new(42415, 2));
        assert!(!all[0].is_active);
    }

    #[tokio::test]
    async fn save_priorities_rewrites_only_priority_columns() {
        let repo = SqlDealRepository::new(setup().await);
        let first = sample_deal("d-1", "soap", 499, 1);
        let second = sample_deal("d-2", "rice", 999, 2);
        repo.save(first.clone()).await.expect("save first");
        repo.save(second.clone()).await.expect("save second");

        let now = Utc::now();
        let mut swapped = vec![first, second];
        swapped[0].priority = 2;
        swapped[1].priority = 1;
        for deal in &mut swapped {
            deal.title = "ignored".to_string();
            deal.updated_at = now;
        }
        repo.save_priorities(&swapped).await.expect("save priorities");

        let all = repo.list_all().await.expect("list");
        let ids: Vec<&str> = all.iter().map(|deal| deal.id.0.as_str()).collect();
        assert_eq!(ids, vec!["d-2", "d-1"]);
        assert!(all.iter().all(|deal| deal.title != "ignored"));
    }
}
