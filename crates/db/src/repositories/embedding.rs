use chrono::{DateTime, Utc};
use sqlx::Row;

use mostrador_core::domain::retrieval::Collection;
use mostrador_core::domain::tenant::TenantId;

use super::{decode_err, parse_timestamp, EmbeddingRepository, RepositoryError};
use crate::DbPool;

/// A stored vector for one FAQ or product of one tenant.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingRecord {
    pub tenant_id: TenantId,
    pub collection: Collection,
    pub source_id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub updated_at: DateTime<Utc>,
}

/// Little-endian f32 encoding used for the `vector` BLOB column.
pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn blob_to_vector(blob: &[u8]) -> Result<Vec<f32>, RepositoryError> {
    if blob.len() % 4 != 0 {
        return Err(RepositoryError::Decode(format!(
            "vector blob length {} is not a multiple of 4",
            blob.len()
        )));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub struct SqlEmbeddingRepository {
    pool: DbPool,
}

impl SqlEmbeddingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Stored vector count per model, for coverage checks.
    pub async fn count_by_model(&self) -> Result<Vec<(String, i64)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT model, COUNT(1) AS total FROM embedding GROUP BY model ORDER BY model",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let model: String = row.try_get("model").map_err(decode_err)?;
                let total: i64 = row.try_get("total").map_err(decode_err)?;
                Ok((model, total))
            })
            .collect()
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<EmbeddingRecord, RepositoryError> {
    let tenant_id: String = row.try_get("tenant_id").map_err(decode_err)?;
    let collection: String = row.try_get("collection").map_err(decode_err)?;
    let source_id: String = row.try_get("source_id").map_err(decode_err)?;
    let content: String = row.try_get("content").map_err(decode_err)?;
    let blob: Vec<u8> = row.try_get("vector").map_err(decode_err)?;
    let model: String = row.try_get("model").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(EmbeddingRecord {
        tenant_id: TenantId(tenant_id),
        collection: Collection::parse(&collection)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown collection `{collection}`")))?,
        source_id,
        content,
        vector: blob_to_vector(&blob)?,
        model,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait::async_trait]
impl EmbeddingRepository for SqlEmbeddingRepository {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO embedding (tenant_id, collection, source_id, content, vector, model,
                                    dimensions, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tenant_id, collection, source_id) DO UPDATE SET
                 content = excluded.content,
                 vector = excluded.vector,
                 model = excluded.model,
                 dimensions = excluded.dimensions,
                 updated_at = excluded.updated_at",
        )
        .bind(&record.tenant_id.0)
        .bind(record.collection.as_str())
        .bind(&record.source_id)
        .bind(&record.content)
        .bind(vector_to_blob(&record.vector))
        .bind(&record.model)
        .bind(record.vector.len() as i64)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        tenant_id: &TenantId,
        collection: Collection,
    ) -> Result<Vec<EmbeddingRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT tenant_id, collection, source_id, content, vector, model, updated_at
             FROM embedding WHERE tenant_id = ? AND collection = ?",
        )
        .bind(&tenant_id.0)
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect::<Result<Vec<_>, _>>()
    }

    async fn delete_stale(
        &self,
        tenant_id: &TenantId,
        collection: Collection,
        keep_source_ids: &[String],
    ) -> Result<u64, RepositoryError> {
        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT source_id FROM embedding WHERE tenant_id = ? AND collection = ?",
        )
        .bind(&tenant_id.0)
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut removed = 0;
        for source_id in existing.iter().filter(|id| !keep_source_ids.contains(id)) {
            removed += sqlx::query(
                "DELETE FROM embedding WHERE tenant_id = ? AND collection = ? AND source_id = ?",
            )
            .bind(&tenant_id.0)
            .bind(collection.as_str())
            .bind(source_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        }

        Ok(removed)
    }
}
