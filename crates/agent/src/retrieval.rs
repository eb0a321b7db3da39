//! Tenant-scoped vector search over the FAQ and product collections.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use mostrador_core::domain::retrieval::{Collection, RetrievalMatch};
use mostrador_core::domain::tenant::TenantId;
use mostrador_db::{CatalogRepository, EmbeddingRecord, EmbeddingRepository, RepositoryError};

use crate::embedding::Embedder;
use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] LlmError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Cosine similarity of two equal-length vectors; `0.0` when either has no magnitude.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut left_norm = 0.0_f32;
    let mut right_norm = 0.0_f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    let denominator = left_norm.sqrt() * right_norm.sqrt();
    if denominator <= f32::EPSILON {
        0.0
    } else {
        dot / denominator
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub faqs_indexed: usize,
    pub products_indexed: usize,
    pub stale_removed: u64,
}

#[derive(Clone)]
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn EmbeddingRepository>,
    similarity_floor: f32,
    top_k: usize,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn EmbeddingRepository>,
        similarity_floor: f32,
        top_k: usize,
    ) -> Self {
        Self { embedder, store, similarity_floor, top_k: top_k.max(1) }
    }

    pub fn model(&self) -> &str {
        self.embedder.model()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(self.embedder.embed(text).await?)
    }

    /// Best-first matches for `query` in one collection of one tenant, at most `k` long.
    /// Anything under the similarity floor is dropped, so an empty result means
    /// nothing relevant is on file.
    pub async fn search(
        &self,
        tenant_id: &TenantId,
        query: &[f32],
        collection: Collection,
        k: usize,
    ) -> Result<Vec<RetrievalMatch>, RetrievalError> {
        let records = self.store.list(tenant_id, collection).await?;
        let scanned = records.len();

        let mut matches: Vec<RetrievalMatch> = records
            .into_iter()
            .filter(|record| &record.tenant_id == tenant_id && record.vector.len() == query.len())
            .filter_map(|record| {
                let score = cosine_similarity(query, &record.vector);
                (score >= self.similarity_floor).then(|| RetrievalMatch {
                    source_id: record.source_id,
                    tenant_id: record.tenant_id,
                    collection,
                    score,
                    text: record.content,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(k);

        debug!(
            event_name = "retrieval.search.completed",
            tenant_id = %tenant_id,
            collection = collection.as_str(),
            scanned,
            matched = matches.len(),
            "vector search completed"
        );
        Ok(matches)
    }

    /// Embeds `query` once and searches both collections, merged best-first.
    pub async fn retrieve(
        &self,
        tenant_id: &TenantId,
        query: &str,
    ) -> Result<Vec<RetrievalMatch>, RetrievalError> {
        let vector = self.embed(query).await?;
        let per_collection = self.top_k / 2 + 1;

        let mut matches = self.search(tenant_id, &vector, Collection::Faq, per_collection).await?;
        matches
            .extend(self.search(tenant_id, &vector, Collection::Product, per_collection).await?);
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(self.top_k);
        Ok(matches)
    }

    /// Re-embeds every active FAQ and product of a tenant with the configured model and
    /// drops vectors whose source no longer exists.
    pub async fn index_tenant(
        &self,
        tenant_id: &TenantId,
        catalog: &dyn CatalogRepository,
    ) -> Result<IndexReport, RetrievalError> {
        let mut report = IndexReport::default();

        let faqs = catalog.active_faqs(tenant_id).await?;
        let mut keep = Vec::with_capacity(faqs.len());
        for faq in &faqs {
            let content = faq.embedding_text();
            self.store_vector(tenant_id, Collection::Faq, &faq.id.0, content).await?;
            keep.push(faq.id.0.clone());
        }
        report.faqs_indexed = keep.len();
        report.stale_removed += self.store.delete_stale(tenant_id, Collection::Faq, &keep).await?;

        let products = catalog.active_products(tenant_id).await?;
        let mut keep = Vec::with_capacity(products.len());
        for product in &products {
            let content = product.embedding_text();
            self.store_vector(tenant_id, Collection::Product, &product.id.0, content).await?;
            keep.push(product.id.0.clone());
        }
        report.products_indexed = keep.len();
        report.stale_removed +=
            self.store.delete_stale(tenant_id, Collection::Product, &keep).await?;

        info!(
            event_name = "retrieval.index.completed",
            tenant_id = %tenant_id,
            model = self.embedder.model(),
            faqs = report.faqs_indexed,
            products = report.products_indexed,
            stale_removed = report.stale_removed,
            "tenant vectors regenerated"
        );
        Ok(report)
    }

    async fn store_vector(
        &self,
        tenant_id: &TenantId,
        collection: Collection,
        source_id: &str,
        content: String,
    ) -> Result<(), RetrievalError> {
        let vector = self.embedder.embed(&content).await?;
        self.store
            .upsert(EmbeddingRecord {
                tenant_id: tenant_id.clone(),
                collection,
                source_id: source_id.to_owned(),
                content,
                vector,
                model: self.embedder.model().to_owned(),
                updated_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}
