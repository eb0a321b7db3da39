use sqlx::Row;

use mostrador_core::domain::conversation::ConversationId;
use mostrador_core::domain::order::{LineItem, OrderId, OrderStatus, PlacedOrder};
use mostrador_core::domain::product::ProductId;
use mostrador_core::domain::review::{Rating, Review, ReviewId, Sentiment};
use mostrador_core::domain::tenant::TenantId;

use super::{
    decode_err, parse_decimal, parse_timestamp, OrderRepository, RepositoryError,
    ReviewRepository,
};
use crate::DbPool;

pub(crate) async fn insert_order(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    order: &PlacedOrder,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO customer_order (id, tenant_id, conversation_id, total, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&order.id.0)
    .bind(&order.tenant_id.0)
    .bind(&order.conversation_id.0)
    .bind(order.total.to_string())
    .bind(order.status.as_str())
    .bind(order.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    for (position, line) in order.lines.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_item (order_id, position, product_id, product_name, quantity,
                                     unit_price, subtotal)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(position as i64)
        .bind(&line.product_id.0)
        .bind(&line.product_name)
        .bind(i64::from(line.quantity))
        .bind(line.unit_price.to_string())
        .bind(line.subtotal().to_string())
        .execute(&mut **tx)
        .await?;

        let quantity = i64::from(line.quantity);
        let updated = sqlx::query(
            "UPDATE inventory_item
             SET stock_quantity = stock_quantity - ?, updated_at = ?
             WHERE tenant_id = ? AND product_id = ? AND stock_quantity >= ?",
        )
        .bind(quantity)
        .bind(order.created_at.to_rfc3339())
        .bind(&order.tenant_id.0)
        .bind(&line.product_id.0)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "not enough stock of `{}` for order `{}`",
                line.product_id, order.id
            )));
        }
    }

    Ok(())
}

pub(crate) async fn insert_review(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    review: &Review,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO review (id, tenant_id, conversation_id, rating, comment, sentiment,
                             requires_attention, source, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&review.id.0)
    .bind(&review.tenant_id.0)
    .bind(&review.conversation_id.0)
    .bind(i64::from(review.rating.value()))
    .bind(&review.comment)
    .bind(review.sentiment.as_str())
    .bind(review.requires_attention)
    .bind(&review.source)
    .bind(review.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<LineItem, RepositoryError> {
    let product_id: String = row.try_get("product_id").map_err(decode_err)?;
    let product_name: String = row.try_get("product_name").map_err(decode_err)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode_err)?;
    let unit_price: String = row.try_get("unit_price").map_err(decode_err)?;

    Ok(LineItem {
        product_id: ProductId(product_id),
        product_name,
        quantity: u32::try_from(quantity).map_err(decode_err)?,
        unit_price: parse_decimal(&unit_price)?,
    })
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn orders_for_conversation(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
    ) -> Result<Vec<PlacedOrder>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, conversation_id, total, status, created_at
             FROM customer_order WHERE tenant_id = ? AND conversation_id = ?
             ORDER BY created_at ASC",
        )
        .bind(&tenant_id.0)
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(decode_err)?;
            let total: String = row.try_get("total").map_err(decode_err)?;
            let status: String = row.try_get("status").map_err(decode_err)?;
            let created_at: String = row.try_get("created_at").map_err(decode_err)?;

            let line_rows = sqlx::query(
                "SELECT product_id, product_name, quantity, unit_price
                 FROM order_item WHERE order_id = ? ORDER BY position ASC",
            )
            .bind(&id)
            .fetch_all(&self.pool)
            .await?;
            let lines = line_rows.iter().map(row_to_line).collect::<Result<Vec<_>, _>>()?;

            orders.push(PlacedOrder {
                id: OrderId(id),
                tenant_id: tenant_id.clone(),
                conversation_id: conversation_id.clone(),
                lines,
                total: parse_decimal(&total)?,
                status: OrderStatus::parse(&status).ok_or_else(|| {
                    RepositoryError::Decode(format!("unknown order status `{status}`"))
                })?,
                created_at: parse_timestamp(&created_at)?,
            });
        }

        Ok(orders)
    }
}

pub struct SqlReviewRepository {
    pool: DbPool,
}

impl SqlReviewRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_review(row: &sqlx::sqlite::SqliteRow) -> Result<Review, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let tenant_id: String = row.try_get("tenant_id").map_err(decode_err)?;
    let conversation_id: String = row.try_get("conversation_id").map_err(decode_err)?;
    let rating: i64 = row.try_get("rating").map_err(decode_err)?;
    let comment: String = row.try_get("comment").map_err(decode_err)?;
    let sentiment: String = row.try_get("sentiment").map_err(decode_err)?;
    let requires_attention: bool = row.try_get("requires_attention").map_err(decode_err)?;
    let source: String = row.try_get("source").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    let rating = u8::try_from(rating).map_err(decode_err).and_then(|value| {
        Rating::new(value).map_err(decode_err)
    })?;

    Ok(Review {
        id: ReviewId(id),
        tenant_id: TenantId(tenant_id),
        conversation_id: ConversationId(conversation_id),
        rating,
        comment,
        sentiment: Sentiment::parse(&sentiment)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown sentiment `{sentiment}`")))?,
        requires_attention,
        source,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait::async_trait]
impl ReviewRepository for SqlReviewRepository {
    async fn reviews_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, conversation_id, rating, comment, sentiment,
                    requires_attention, source, created_at
             FROM review WHERE tenant_id = ? ORDER BY created_at ASC",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_review).collect::<Result<Vec<_>, _>>()
    }
}
