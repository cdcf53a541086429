use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;

use dealpulse_core::domain::deal::{Deal, DealId, ProductId};
use dealpulse_core::domain::order::{LineItemId, Order, OrderId, OrderItem, OrderStatus};

use crate::connection::DbPool;
use crate::repositories::{format_timestamp, RepositoryError};

/// Deals offered by the demo storefront: (id, title, product, threshold, priority, active).
const DEMO_DEALS: &[(&str, &str, &str, i64, i32, bool)] = &[
    ("deal-soap", "₹1 Bathing Soap", "prod-soap-75g", 499, 1, true),
    ("deal-toothpaste", "₹1 Toothpaste", "prod-toothpaste-100g", 599, 2, true),
    ("deal-tea", "₹1 Green Tea Sachets", "prod-green-tea-10", 999, 3, true),
    ("deal-oil", "₹1 Sunflower Oil 200ml", "prod-oil-200ml", 1299, 4, true),
    ("deal-rice", "₹1 Basmati Rice 500g", "prod-basmati-500g", 1599, 5, true),
    ("deal-sugar", "₹1 Sugar 250g", "prod-sugar-250g", 799, 6, false),
];

/// Regular catalogue items the demo carts are filled with.
const DEMO_SKUS: &[&str] = &["prod-atta-5kg", "prod-ghee-1l", "prod-detergent-2kg", "prod-dal-1kg"];

/// Days of order history generated before `today`.
pub const DEMO_HISTORY_DAYS: i64 = 30;

const DEMO_ORDER_PREFIX: &str = "demo-order-";

/// Deterministic storefront history for local dashboards and smoke tests.
///
/// Only storefront tables are written; redemptions appear after `backfill`.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub fn deals() -> Vec<Deal> {
        let created_at = demo_epoch();
        DEMO_DEALS
            .iter()
            .map(|(id, title, product, threshold, priority, active)| Deal {
                id: DealId(id.to_string()),
                title: title.to_string(),
                product_id: ProductId(product.to_string()),
                threshold_amount: Decimal::from(*threshold),
                deal_price: Decimal::ONE,
                max_quantity_per_order: 1,
                priority: *priority,
                is_active: *active,
                description: None,
                created_at,
                updated_at: created_at,
            })
            .collect()
    }

    /// Orders for the `DEMO_HISTORY_DAYS` days ending at `today`.
    pub fn orders(today: NaiveDate) -> Vec<Order> {
        let deals = Self::deals();
        let mut orders = Vec::new();

        for offset in 0..DEMO_HISTORY_DAYS {
            let date = today - Duration::days(offset);
            let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::default()));
            let per_day = 3 + (offset * 7) % 5;

            for n in 0..per_day {
                let id = format!("{DEMO_ORDER_PREFIX}{}-{n}", date.format("%Y%m%d"));
                let merchandise =
                    Decimal::new(30_000 + ((offset * 131 + n * 577) % 1_600) * 100 + (n * 37) % 100, 2);
                let sku = DEMO_SKUS[(n as usize) % DEMO_SKUS.len()];
                let mut items = vec![OrderItem {
                    id: LineItemId(format!("{id}-1")),
                    product_id: ProductId(sku.to_string()),
                    price: merchandise,
                    quantity: 1,
                }];

                let takes_deal = (offset + n) % 4 != 0;
                let best_deal = deals
                    .iter()
                    .filter(|deal| deal.is_active && deal.threshold_amount <= merchandise)
                    .max_by_key(|deal| deal.threshold_amount);
                if let (true, Some(deal)) = (takes_deal, best_deal) {
                    items.push(OrderItem {
                        id: LineItemId(format!("{id}-2")),
                        product_id: deal.product_id.clone(),
                        price: deal.deal_price,
                        quantity: 1,
                    });
                }

                let status = if (offset * 3 + n) % 13 == 0 {
                    OrderStatus::Cancelled
                } else if offset > 5 {
                    OrderStatus::Delivered
                } else {
                    OrderStatus::Paid
                };

                orders.push(Order {
                    id: OrderId(id),
                    total_amount: items.iter().map(|item| item.price * Decimal::from(item.quantity)).sum(),
                    status,
                    placed_at: midnight + Duration::hours(9 + 2 * n),
                    items,
                });
            }
        }

        orders.sort_by(|left, right| left.placed_at.cmp(&right.placed_at));
        orders
    }

    /// Idempotent: deals are upserted and existing orders are left untouched.
    pub async fn load(pool: &DbPool, today: NaiveDate) -> Result<SeedResult, RepositoryError> {
        let deals = Self::deals();
        let orders = Self::orders(today);
        let mut tx = pool.begin().await?;

        for deal in &deals {
            upsert_deal(&mut tx, deal).await?;
        }
        let mut orders_inserted = 0u64;
        for order in &orders {
            orders_inserted += insert_order_with_items(&mut tx, order).await?;
        }

        tx.commit().await?;

        Ok(SeedResult {
            deals_seeded: deals.len() as u64,
            orders_seeded: orders_inserted,
            items_seeded: orders.iter().map(|order| order.items.len() as u64).sum(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let deal_ids = sql_array_from_ids(DEMO_DEALS.iter().map(|deal| deal.0));
        let deal_count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(1) FROM deals WHERE id IN {deal_ids}"))
                .fetch_one(pool)
                .await?;
        checks.push(("demo-deals", deal_count == DEMO_DEALS.len() as i64));

        let order_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM orders WHERE id LIKE ?")
            .bind(format!("{DEMO_ORDER_PREFIX}%"))
            .fetch_one(pool)
            .await?;
        checks.push(("demo-orders", order_count > 0));

        let orphan_items: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM order_items i LEFT JOIN orders o ON o.id = i.order_id
             WHERE o.id IS NULL",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("order-items-linked", orphan_items == 0));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes demo rows, including redemptions reconciled from demo orders.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        let pattern = format!("{DEMO_ORDER_PREFIX}%");

        // Only present once the analytics migration has run.
        let analytics_ready: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = 'deal_purchase_events'",
        )
        .fetch_one(&mut *tx)
        .await?;
        if analytics_ready > 0 {
            sqlx::query("DELETE FROM deal_purchase_events WHERE order_id LIKE ?")
                .bind(&pattern)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM order_items WHERE order_id LIKE ?")
            .bind(&pattern)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE id LIKE ?").bind(&pattern).execute(&mut *tx).await?;

        let deal_ids = sql_array_from_ids(DEMO_DEALS.iter().map(|deal| deal.0));
        sqlx::query(&format!("DELETE FROM deals WHERE id IN {deal_ids}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// 2026-01-01T00:00:00Z, the creation time of every demo deal.
fn demo_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap_or_default()
}

fn sql_array_from_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let quoted = ids.map(|id| format!("'{}'", id.replace('\'', "''"))).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

async fn upsert_deal(conn: &mut SqliteConnection, deal: &Deal) -> Result<(), RepositoryError> {
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
             is_active = excluded.is_active",
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
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Returns 1 when the order was new, 0 when it already existed.
async fn insert_order_with_items(
    conn: &mut SqliteConnection,
    order: &Order,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO orders (id, total_amount, status, placed_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(&order.id.0)
    .bind(order.total_amount.to_string())
    .bind(order.status.as_str())
    .bind(format_timestamp(order.placed_at))
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, price, quantity)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(&item.id.0)
        .bind(&order.id.0)
        .bind(&item.product_id.0)
        .bind(item.price.to_string())
        .bind(i64::from(item.quantity))
        .execute(&mut *conn)
        .await?;
    }

    Ok(result.rows_affected())
}

/// Writes one storefront deal, replacing an existing row with the same id.
pub async fn insert_deal(pool: &DbPool, deal: &Deal) -> Result<(), RepositoryError> {
    let mut conn = pool.acquire().await?;
    upsert_deal(&mut conn, deal).await
}

pub async fn insert_order(pool: &DbPool, order: &Order) -> Result<u64, RepositoryError> {
    let mut tx = pool.begin().await?;
    let inserted = insert_order_with_items(&mut tx, order).await?;
    tx.commit().await?;
    Ok(inserted)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub deals_seeded: u64,
    pub orders_seeded: u64,
    pub items_seeded: u64,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
pub(crate) fn sample_deal(id: &str, product: &str, threshold: i64, priority: i32) -> Deal {
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(i64::from(priority));
    Deal {
        id: DealId(id.to_string()),
        title: format!("Deal {id}"),
        product_id: ProductId(product.to_string()),
        threshold_amount: Decimal::from(threshold),
        deal_price: Decimal::ONE,
        max_quantity_per_order: 1,
        priority,
        is_active: true,
        description: None,
        created_at,
        updated_at: created_at,
    }
}

/// Order placed at noon on the given day of March 2026, totalling ₹650.
#[cfg(test)]
pub(crate) fn sample_order(
    id: &str,
    day: u32,
    status: OrderStatus,
    items: &[(&str, &str, &str)],
) -> Order {
    use std::str::FromStr;

    Order {
        id: OrderId(id.to_string()),
        total_amount: Decimal::from(650),
        status,
        placed_at: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
        items: items
            .iter()
            .map(|(item_id, product, price)| OrderItem {
                id: LineItemId(item_id.to_string()),
                product_id: ProductId(product.to_string()),
                price: Decimal::from_str(price).unwrap(),
                quantity: 1,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use dealpulse_core::domain::order::OrderStatus;

    use super::*;
    use crate::{connect_with_settings, migrations};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
    }

    #[test]
    fn demo_orders_are_deterministic_and_consistent() {
        let first = DemoSeedDataset::orders(today());
        let second = DemoSeedDataset::orders(today());
        assert_eq!(first, second);

        for order in &first {
            let item_total: Decimal =
                order.items.iter().map(|item| item.price * Decimal::from(item.quantity)).sum();
            assert_eq!(order.total_amount, item_total, "order {} total", order.id.0);
            assert!(order.placed_at.date_naive() <= today());
        }
        assert!(first.iter().any(|order| order.status == OrderStatus::Cancelled));
        assert!(first.iter().any(|order| order.items.len() == 2));
    }

    #[test]
    fn demo_epoch_is_new_year_2026() {
        assert_eq!(demo_epoch(), Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn load_verify_clean_round_trip() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let seeded = DemoSeedDataset::load(&pool, today()).await.expect("load");
        assert_eq!(seeded.deals_seeded, 6);
        assert_eq!(seeded.orders_seeded, DemoSeedDataset::orders(today()).len() as u64);

        let again = DemoSeedDataset::load(&pool, today()).await.expect("reload");
        assert_eq!(again.orders_seeded, 0);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "{:?}", verification.checks);

        DemoSeedDataset::clean(&pool).await.expect("clean");
        let verification = DemoSeedDataset::verify(&pool).await.expect("verify after clean");
        assert!(!verification.all_present);
    }
}
