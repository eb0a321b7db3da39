use sqlx::Row;

use mostrador_core::domain::faq::{Faq, FaqId};
use mostrador_core::domain::product::{Product, ProductId};
use mostrador_core::domain::tenant::TenantId;

use super::{decode_err, parse_decimal, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save_product(&self, product: &Product, stock: i64) -> Result<(), RepositoryError> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO product (id, tenant_id, name, description, category, price, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 category = excluded.category,
                 price = excluded.price,
                 active = excluded.active",
        )
        .bind(&product.id.0)
        .bind(&product.tenant_id.0)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.price.to_string())
        .bind(product.active)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO inventory_item (product_id, tenant_id, stock_quantity, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(product_id) DO UPDATE SET
                 stock_quantity = excluded.stock_quantity,
                 updated_at = excluded.updated_at",
        )
        .bind(&product.id.0)
        .bind(&product.tenant_id.0)
        .bind(stock)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn save_faq(&self, faq: &Faq) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO faq (id, tenant_id, question, answer, active, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 question = excluded.question,
                 answer = excluded.answer,
                 active = excluded.active",
        )
        .bind(&faq.id.0)
        .bind(&faq.tenant_id.0)
        .bind(&faq.question)
        .bind(&faq.answer)
        .bind(faq.active)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let tenant_id: String = row.try_get("tenant_id").map_err(decode_err)?;
    let name: String = row.try_get("name").map_err(decode_err)?;
    let description: String = row.try_get("description").map_err(decode_err)?;
    let category: String = row.try_get("category").map_err(decode_err)?;
    let price: String = row.try_get("price").map_err(decode_err)?;
    let active: bool = row.try_get("active").map_err(decode_err)?;

    Ok(Product {
        id: ProductId(id),
        tenant_id: TenantId(tenant_id),
        name,
        description,
        category,
        price: parse_decimal(&price)?,
        active,
    })
}

fn row_to_faq(row: &sqlx::sqlite::SqliteRow) -> Result<Faq, RepositoryError> {
    Ok(Faq {
        id: FaqId(row.try_get("id").map_err(decode_err)?),
        tenant_id: TenantId(row.try_get("tenant_id").map_err(decode_err)?),
        question: row.try_get("question").map_err(decode_err)?,
        answer: row.try_get("answer").map_err(decode_err)?,
        active: row.try_get("active").map_err(decode_err)?,
    })
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn active_products(&self, tenant_id: &TenantId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, name, description, category, price, active
             FROM product WHERE tenant_id = ? AND active = 1 ORDER BY category, name",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn find_product(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, description, category, price, active
             FROM product WHERE tenant_id = ? AND id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn stock_level(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Result<i64, RepositoryError> {
        let stock: Option<i64> = sqlx::query_scalar(
            "SELECT stock_quantity FROM inventory_item WHERE tenant_id = ? AND product_id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&product_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock.unwrap_or(0))
    }

    async fn active_faqs(&self, tenant_id: &TenantId) -> Result<Vec<Faq>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, question, answer, active
             FROM faq WHERE tenant_id = ? AND active = 1 ORDER BY id",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_faq).collect::<Result<Vec<_>, _>>()
    }
}
