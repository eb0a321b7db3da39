use async_trait::async_trait;
use thiserror::Error;

use mostrador_core::domain::conversation::{Conversation, ConversationId, Message};
use mostrador_core::domain::faq::Faq;
use mostrador_core::domain::order::PlacedOrder;
use mostrador_core::domain::product::{Product, ProductId};
use mostrador_core::domain::retrieval::Collection;
use mostrador_core::domain::review::Review;
use mostrador_core::domain::tenant::{Tenant, TenantId};

pub mod catalog;
pub mod conversation;
pub mod embedding;
pub mod memory;
pub mod order;
pub mod tenant;

pub use catalog::SqlCatalogRepository;
pub use conversation::SqlConversationRepository;
pub use embedding::{blob_to_vector, vector_to_blob, EmbeddingRecord, SqlEmbeddingRepository};
pub use memory::InMemoryStore;
pub use order::{SqlOrderRepository, SqlReviewRepository};
pub use tenant::SqlTenantRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Everything one turn writes. Committed as a single transaction: the conversation row
/// (inserted or version-checked update), both messages, and the optional order and review.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnCommit {
    /// Conversation with its updated metadata. `version` is the version the turn was
    /// computed against; the commit fails with `Conflict` if the stored version moved.
    pub conversation: Conversation,
    pub is_new: bool,
    pub user_message: Message,
    pub agent_message: Message,
    pub order: Option<PlacedOrder>,
    pub review: Option<Review>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedTurn {
    pub conversation_id: ConversationId,
    pub version: i64,
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError>;
}

/// Read-only catalog access. Every call is scoped by tenant.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn active_products(&self, tenant_id: &TenantId) -> Result<Vec<Product>, RepositoryError>;
    async fn find_product(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError>;
    /// Units on hand; products without an inventory row have none.
    async fn stock_level(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Result<i64, RepositoryError>;
    async fn active_faqs(&self, tenant_id: &TenantId) -> Result<Vec<Faq>, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: &ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;
    /// Last `limit` messages in chronological order.
    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError>;
    async fn commit_turn(&self, commit: TurnCommit) -> Result<CommittedTurn, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn orders_for_conversation(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
    ) -> Result<Vec<PlacedOrder>, RepositoryError>;
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn reviews_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Review>, RepositoryError>;
}

#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), RepositoryError>;
    /// All vectors of one collection for one tenant. Never crosses tenants.
    async fn list(
        &self,
        tenant_id: &TenantId,
        collection: Collection,
    ) -> Result<Vec<EmbeddingRecord>, RepositoryError>;
    async fn delete_stale(
        &self,
        tenant_id: &TenantId,
        collection: Collection,
        keep_source_ids: &[String],
    ) -> Result<u64, RepositoryError>;
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(
    value: &str,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(decode_err)
}

pub(crate) fn parse_decimal(value: &str) -> Result<rust_decimal::Decimal, RepositoryError> {
    value.parse::<rust_decimal::Decimal>().map_err(decode_err)
}
