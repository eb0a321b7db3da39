use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use mostrador_core::domain::conversation::{Conversation, ConversationId, Message};
use mostrador_core::domain::faq::Faq;
use mostrador_core::domain::order::PlacedOrder;
use mostrador_core::domain::product::{Product, ProductId};
use mostrador_core::domain::retrieval::Collection;
use mostrador_core::domain::review::Review;
use mostrador_core::domain::tenant::{Tenant, TenantId};

use super::{
    CatalogRepository, CommittedTurn, ConversationRepository, EmbeddingRecord,
    EmbeddingRepository, OrderRepository, RepositoryError, ReviewRepository, TenantRepository,
    TurnCommit,
};

#[derive(Default)]
struct MemoryState {
    tenants: HashMap<TenantId, Tenant>,
    products: Vec<Product>,
    stock: HashMap<(TenantId, ProductId), i64>,
    faqs: Vec<Faq>,
    embeddings: HashMap<(TenantId, Collection, String), EmbeddingRecord>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    orders: Vec<PlacedOrder>,
    reviews: Vec<Review>,
}

/// Implements every repository trait over one lock so a turn commit is all-or-nothing.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
    fail_commits: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `commit_turn` fail before writing anything.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_tenant(&self, tenant: Tenant) {
        self.state.write().await.tenants.insert(tenant.id.clone(), tenant);
    }

    pub async fn insert_product(&self, product: Product, stock: i64) {
        let mut state = self.state.write().await;
        state.stock.insert((product.tenant_id.clone(), product.id.clone()), stock);
        state.products.retain(|existing| {
            existing.id != product.id || existing.tenant_id != product.tenant_id
        });
        state.products.push(product);
    }

    pub async fn set_stock(&self, tenant_id: &TenantId, product_id: &ProductId, stock: i64) {
        self.state.write().await.stock.insert((tenant_id.clone(), product_id.clone()), stock);
    }

    pub async fn insert_faq(&self, faq: Faq) {
        let mut state = self.state.write().await;
        state.faqs.retain(|existing| existing.id != faq.id || existing.tenant_id != faq.tenant_id);
        state.faqs.push(faq);
    }

    pub async fn message_count(&self, conversation_id: &ConversationId) -> usize {
        self.state.read().await.messages.get(conversation_id).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl TenantRepository for InMemoryStore {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        Ok(self.state.read().await.tenants.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        let mut tenants: Vec<Tenant> = self.state.read().await.tenants.values().cloned().collect();
        tenants.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(tenants)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryStore {
    async fn active_products(&self, tenant_id: &TenantId) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .filter(|product| &product.tenant_id == tenant_id && product.active)
            .cloned()
            .collect())
    }

    async fn find_product(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .products
            .iter()
            .find(|product| &product.tenant_id == tenant_id && &product.id == product_id)
            .cloned())
    }

    async fn stock_level(
        &self,
        tenant_id: &TenantId,
        product_id: &ProductId,
    ) -> Result<i64, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.stock.get(&(tenant_id.clone(), product_id.clone())).copied().unwrap_or(0))
    }

    async fn active_faqs(&self, tenant_id: &TenantId) -> Result<Vec<Faq>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .faqs
            .iter()
            .filter(|faq| &faq.tenant_id == tenant_id && faq.active)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.state.read().await.conversations.get(id).cloned())
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        let messages = state.messages.get(id).map(Vec::as_slice).unwrap_or_default();
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn commit_turn(&self, commit: TurnCommit) -> Result<CommittedTurn, RepositoryError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut state = self.state.write().await;
        let mut conversation = commit.conversation;

        match state.conversations.get(&conversation.id) {
            Some(_) if commit.is_new => {
                return Err(RepositoryError::Conflict(format!(
                    "conversation `{}` already exists",
                    conversation.id
                )));
            }
            Some(stored)
                if stored.version != conversation.version
                    || stored.tenant_id != conversation.tenant_id =>
            {
                return Err(RepositoryError::Conflict(format!(
                    "conversation `{}` changed since version {}",
                    conversation.id, conversation.version
                )));
            }
            None if !commit.is_new => {
                return Err(RepositoryError::NotFound(format!(
                    "conversation `{}`",
                    conversation.id
                )));
            }
            _ => {}
        }

        if let Some(order) = &commit.order {
            for line in &order.lines {
                let key = (order.tenant_id.clone(), line.product_id.clone());
                let stock = state.stock.get(&key).copied().unwrap_or(0);
                if stock < i64::from(line.quantity) {
                    return Err(RepositoryError::Conflict(format!(
                        "not enough stock of `{}` for order `{}`",
                        line.product_id, order.id
                    )));
                }
            }
        }

        conversation.version = if commit.is_new { 1 } else { conversation.version + 1 };
        conversation.updated_at = commit.agent_message.created_at;
        let committed = CommittedTurn {
            conversation_id: conversation.id.clone(),
            version: conversation.version,
        };

        if let Some(order) = commit.order {
            for line in &order.lines {
                let key = (order.tenant_id.clone(), line.product_id.clone());
                if let Some(stock) = state.stock.get_mut(&key) {
                    *stock -= i64::from(line.quantity);
                }
            }
            state.orders.push(order);
        }
        if let Some(review) = commit.review {
            state.reviews.push(review);
        }

        let messages = state.messages.entry(conversation.id.clone()).or_default();
        messages.push(commit.user_message);
        messages.push(commit.agent_message);
        state.conversations.insert(conversation.id.clone(), conversation);

        Ok(committed)
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryStore {
    async fn orders_for_conversation(
        &self,
        tenant_id: &TenantId,
        conversation_id: &ConversationId,
    ) -> Result<Vec<PlacedOrder>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|order| {
                &order.tenant_id == tenant_id && &order.conversation_id == conversation_id
            })
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ReviewRepository for InMemoryStore {
    async fn reviews_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Review>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.reviews.iter().filter(|review| &review.tenant_id == tenant_id).cloned().collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingRepository for InMemoryStore {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), RepositoryError> {
        let key = (record.tenant_id.clone(), record.collection, record.source_id.clone());
        self.state.write().await.embeddings.insert(key, record);
        Ok(())
    }

    async fn list(
        &self,
        tenant_id: &TenantId,
        collection: Collection,
    ) -> Result<Vec<EmbeddingRecord>, RepositoryError> {
        let state = self.state.read().await;
        let mut records: Vec<EmbeddingRecord> = state
            .embeddings
            .values()
            .filter(|record| &record.tenant_id == tenant_id && record.collection == collection)
            .cloned()
            .collect();
        records.sort_by(|left, right| left.source_id.cmp(&right.source_id));
        Ok(records)
    }

    async fn delete_stale(
        &self,
        tenant_id: &TenantId,
        collection: Collection,
        keep_source_ids: &[String],
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let before = state.embeddings.len();
        state.embeddings.retain(|(tenant, kind, source_id), _| {
            tenant != tenant_id || *kind != collection || keep_source_ids.contains(source_id)
        });
        Ok((before - state.embeddings.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use mostrador_core::domain::conversation::{Conversation, Message};
    use mostrador_core::domain::intent::Intent;
    use mostrador_core::domain::order::{OrderDraft, PlacedOrder};
    use mostrador_core::domain::product::{Product, ProductId};
    use mostrador_core::domain::tenant::TenantId;

    use crate::repositories::{
        CatalogRepository, ConversationRepository, InMemoryStore, OrderRepository,
        RepositoryError, TurnCommit,
    };

    fn pizza(tenant: &str) -> Product {
        Product {
            id: ProductId(format!("{tenant}-pizza")),
            tenant_id: TenantId(tenant.to_owned()),
            name: "Pizza Margherita".to_owned(),
            description: "Tomate, mozzarella, albahaca".to_owned(),
            category: "pizzas".to_owned(),
            price: Decimal::new(12_000, 0),
            active: true,
        }
    }

    fn commit_for(
        conversation: Conversation,
        is_new: bool,
        order: Option<PlacedOrder>,
    ) -> TurnCommit {
        let now = Utc::now();
        TurnCommit {
            user_message: Message::user(conversation.id.clone(), "hola", now),
            agent_message: Message::agent(conversation.id.clone(), "¡Hola!", Intent::Other, now),
            conversation,
            is_new,
            order,
            review: None,
        }
    }

    #[tokio::test]
    async fn catalog_reads_are_tenant_scoped() {
        let store = InMemoryStore::new();
        store.insert_product(pizza("t-a"), 5).await;
        store.insert_product(pizza("t-b"), 9).await;

        let tenant_a = TenantId("t-a".to_owned());
        let products = store.active_products(&tenant_a).await.expect("products");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].tenant_id, tenant_a);

        let foreign = store
            .find_product(&tenant_a, &ProductId("t-b-pizza".to_owned()))
            .await
            .expect("lookup");
        assert!(foreign.is_none());
        assert_eq!(
            store.stock_level(&tenant_a, &ProductId("t-b-pizza".to_owned())).await.expect("stock"),
            0
        );
    }

    #[tokio::test]
    async fn stale_version_is_rejected_without_writes() {
        let store = InMemoryStore::new();
        let conversation = Conversation::start(TenantId("t-a".to_owned()), None, Utc::now());
        let committed = store
            .commit_turn(commit_for(conversation.clone(), true, None))
            .await
            .expect("first commit");
        assert_eq!(committed.version, 1);

        let stale = Conversation { version: 0, ..conversation.clone() };
        let error = store.commit_turn(commit_for(stale, false, None)).await.expect_err("stale");
        assert!(matches!(error, RepositoryError::Conflict(_)));
        assert_eq!(store.message_count(&conversation.id).await, 2);
    }

    #[tokio::test]
    async fn injected_failure_leaves_no_partial_state() {
        let store = InMemoryStore::new();
        let tenant = TenantId("t-a".to_owned());
        store.insert_product(pizza("t-a"), 5).await;
        let conversation = Conversation::start(tenant.clone(), None, Utc::now());

        let mut draft = OrderDraft::new();
        draft.add(&pizza("t-a"), 2).expect("add");
        let order =
            PlacedOrder::from_draft(tenant.clone(), conversation.id.clone(), &draft, Utc::now());

        store.fail_commits(true);
        let result = store.commit_turn(commit_for(conversation.clone(), true, Some(order))).await;
        assert!(result.is_err());

        assert!(store.find_by_id(&conversation.id).await.expect("find").is_none());
        assert!(store
            .orders_for_conversation(&tenant, &conversation.id)
            .await
            .expect("orders")
            .is_empty());
        assert_eq!(
            store.stock_level(&tenant, &ProductId("t-a-pizza".to_owned())).await.expect("stock"),
            5
        );
    }

    #[tokio::test]
    async fn order_beyond_stock_conflicts_without_writes() {
        let store = InMemoryStore::new();
        let tenant = TenantId("t-a".to_owned());
        store.insert_product(pizza("t-a"), 1).await;
        let conversation = Conversation::start(tenant.clone(), None, Utc::now());

        let mut draft = OrderDraft::new();
        draft.add(&pizza("t-a"), 2).expect("add");
        let order =
            PlacedOrder::from_draft(tenant.clone(), conversation.id.clone(), &draft, Utc::now());

        let error = store
            .commit_turn(commit_for(conversation.clone(), true, Some(order)))
            .await
            .expect_err("stock ran out");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        assert!(store.find_by_id(&conversation.id).await.expect("find").is_none());
        assert_eq!(store.message_count(&conversation.id).await, 0);
        assert_eq!(
            store.stock_level(&tenant, &ProductId("t-a-pizza".to_owned())).await.expect("stock"),
            1
        );
    }
}
