use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use dealpulse_core::analytics::{MeasuredFunnel, SchemaStatus};
use dealpulse_core::domain::deal::{sort_by_priority, Deal, DealId, ProductId};
use dealpulse_core::domain::order::{LineItemId, Order, OrderId, OrderItem, OrderStatus};
use dealpulse_core::domain::period::DateRange;
use dealpulse_core::domain::redemption::{PurchaseEvent, PurchaseEventId, RedemptionKey};

use super::deal::row_to_deal;
use super::{
    format_timestamp, parse_count, parse_decimal, parse_timestamp, DealEventStore,
    RepositoryError,
};
use crate::migrations;
use crate::DbPool;

/// Keeps `IN (...)` lists well under SQLite's bound parameter limit.
const KEY_LOOKUP_CHUNK: usize = 500;

const ORDER_COLUMNS: &str = "o.id AS order_id, o.total_amount, o.status, o.placed_at,
     i.id AS item_id, i.product_id AS item_product_id, i.price AS item_price,
     i.quantity AS item_quantity";

const EVENT_COLUMNS: &str =
    "id, deal_id, order_id, line_item_id, price, quantity, cart_total, occurred_at";

pub struct SqlDealEventStore {
    pool: DbPool,
}

impl SqlDealEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

/// Folds joined order/item rows (ordered by order) back into orders.
fn rows_to_orders(rows: &[SqliteRow]) -> Result<Vec<Order>, RepositoryError> {
    let mut orders: Vec<Order> = Vec::new();

    for row in rows {
        let order_id: String = decode(row.try_get("order_id"))?;
        let is_new_order = orders.last().map_or(true, |order| order.id.0 != order_id);

        if is_new_order {
            let total_amount: String = decode(row.try_get("total_amount"))?;
            let status: String = decode(row.try_get("status"))?;
            let placed_at: String = decode(row.try_get("placed_at"))?;

            orders.push(Order {
                id: OrderId(order_id),
                total_amount: parse_decimal("total_amount", &total_amount)?,
                status: OrderStatus::parse(&status).ok_or_else(|| {
                    RepositoryError::Decode(format!("status: unknown order status `{status}`"))
                })?,
                placed_at: parse_timestamp("placed_at", &placed_at)?,
                items: Vec::new(),
            });
        }

        let item_id: Option<String> = decode(row.try_get("item_id"))?;
        let Some(item_id) = item_id else {
            continue;
        };
        let product_id: String = decode(row.try_get("item_product_id"))?;
        let price: String = decode(row.try_get("item_price"))?;
        let quantity: i64 = decode(row.try_get("item_quantity"))?;

        if let Some(order) = orders.last_mut() {
            order.items.push(OrderItem {
                id: LineItemId(item_id),
                product_id: ProductId(product_id),
                price: parse_decimal("price", &price)?,
                quantity: parse_count("quantity", quantity)?,
            });
        }
    }

    Ok(orders)
}

fn row_to_event(row: &SqliteRow) -> Result<PurchaseEvent, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let deal_id: String = decode(row.try_get("deal_id"))?;
    let order_id: String = decode(row.try_get("order_id"))?;
    let line_item_id: String = decode(row.try_get("line_item_id"))?;
    let price: String = decode(row.try_get("price"))?;
    let quantity: i64 = decode(row.try_get("quantity"))?;
    let cart_total: String = decode(row.try_get("cart_total"))?;
    let occurred_at: String = decode(row.try_get("occurred_at"))?;

    Ok(PurchaseEvent {
        id: PurchaseEventId(id),
        deal_id: DealId(deal_id),
        order_id: OrderId(order_id),
        line_item_id: LineItemId(line_item_id),
        price: parse_decimal("price", &price)?,
        quantity: parse_count("quantity", quantity)?,
        cart_total: parse_decimal("cart_total", &cart_total)?,
        occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
    })
}

fn bounds(range: &DateRange) -> (String, String) {
    let (start, end): (DateTime<Utc>, DateTime<Utc>) = range.utc_bounds();
    (format_timestamp(start), format_timestamp(end))
}

#[async_trait::async_trait]
impl DealEventStore for SqlDealEventStore {
    async fn schema_status(&self) -> Result<SchemaStatus, RepositoryError> {
        if migrations::analytics_schema_ready(&self.pool).await? {
            Ok(SchemaStatus::Ready)
        } else {
            Ok(SchemaStatus::Missing)
        }
    }

    async fn list_active_deals(&self) -> Result<Vec<Deal>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, product_id, threshold_amount, deal_price, max_quantity_per_order,
                    priority, is_active, description, created_at, updated_at
             FROM deals
             WHERE is_active = 1",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut deals = rows.iter().map(row_to_deal).collect::<Result<Vec<_>, _>>()?;
        sort_by_priority(&mut deals);
        Ok(deals)
    }

    async fn list_orders(&self, range: &DateRange) -> Result<Vec<Order>, RepositoryError> {
        let (start, end) = bounds(range);
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}
             FROM orders o
             LEFT JOIN order_items i ON i.order_id = o.id
             WHERE o.placed_at >= ? AND o.placed_at < ?
             ORDER BY o.placed_at ASC, o.id ASC, i.id ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows_to_orders(&rows)
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS}
             FROM orders o
             LEFT JOIN order_items i ON i.order_id = o.id
             ORDER BY o.placed_at ASC, o.id ASC, i.id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows_to_orders(&rows)
    }

    async fn list_redemptions(
        &self,
        range: &DateRange,
    ) -> Result<Vec<PurchaseEvent>, RepositoryError> {
        let (start, end) = bounds(range);
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS}
             FROM deal_purchase_events
             WHERE occurred_at >= ? AND occurred_at < ?
             ORDER BY occurred_at ASC, id ASC"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    async fn existing_redemption_keys(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashSet<RedemptionKey>, RepositoryError> {
        let mut keys = HashSet::new();

        for chunk in order_ids.chunks(KEY_LOOKUP_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT order_id, deal_id, line_item_id FROM deal_purchase_events WHERE order_id IN (",
            );
            let mut separated = builder.separated(", ");
            for order_id in chunk {
                separated.push_bind(order_id.0.as_str());
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            for row in &rows {
                let order_id: String = decode(row.try_get("order_id"))?;
                let deal_id: String = decode(row.try_get("deal_id"))?;
                let line_item_id: String = decode(row.try_get("line_item_id"))?;
                keys.insert(RedemptionKey::new(
                    OrderId(order_id),
                    DealId(deal_id),
                    LineItemId(line_item_id),
                ));
            }
        }

        Ok(keys)
    }

    async fn insert_redemptions(&self, events: Vec<PurchaseEvent>) -> Result<u64, RepositoryError> {
        if events.is_empty() {
            return Ok(0);
        }

        let recorded_at = format_timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for event in &events {
            let result = sqlx::query(
                "INSERT INTO deal_purchase_events
                    (id, deal_id, order_id, line_item_id, price, quantity, cart_total,
                     occurred_at, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT DO NOTHING",
            )
            .bind(&event.id.0)
            .bind(&event.deal_id.0)
            .bind(&event.order_id.0)
            .bind(&event.line_item_id.0)
            .bind(event.price.to_string())
            .bind(i64::from(event.quantity))
            .bind(event.cart_total.to_string())
            .bind(format_timestamp(event.occurred_at))
            .bind(&recorded_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn measured_funnel(&self, range: &DateRange) -> Result<MeasuredFunnel, RepositoryError> {
        let (start, end) = bounds(range);
        let rows = sqlx::query(
            "SELECT stage,
                    SUM(CASE WHEN occurred_at >= ? AND occurred_at < ? THEN 1 ELSE 0 END)
                        AS in_range
             FROM deal_funnel_events
             GROUP BY stage",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for row in &rows {
            let stage: String = decode(row.try_get("stage"))?;
            let in_range: i64 = decode(row.try_get("in_range"))?;
            counts.insert(stage, in_range.max(0) as u64);
        }

        Ok(MeasuredFunnel {
            views: counts.get("view").copied(),
            added: counts.get("add").copied(),
            completed: counts.get("complete").copied(),
        })
    }
}
