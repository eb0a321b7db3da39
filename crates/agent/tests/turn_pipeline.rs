use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use mostrador_agent::{
    AgentRuntime, AgentServices, AgentSettings, KeywordEmbedder, ScriptedLlm, TurnRequest,
    TurnResponse,
};
use mostrador_core::domain::conversation::{ConversationId, OrderSession};
use mostrador_core::domain::faq::{Faq, FaqId};
use mostrador_core::domain::intent::Intent;
use mostrador_core::domain::product::{Product, ProductId};
use mostrador_core::domain::tenant::{
    BusinessHours, Locale, Tenant, TenantId, TenantKind, TenantVoice,
};
use mostrador_core::errors::{ApplicationError, DomainError};
use mostrador_db::{
    ConversationRepository, InMemoryStore, OrderRepository, RepositoryError, ReviewRepository,
    TurnCommit,
};

const TRATTORIA: &str = "trattoria";
const PANADERIA: &str = "panaderia";
const CERRADO: &str = "cerrado";

fn tenant(id: &str, name: &str, kind: TenantKind, hours: BusinessHours) -> Tenant {
    Tenant {
        id: TenantId(id.to_owned()),
        name: name.to_owned(),
        kind,
        timezone: "America/Santiago".to_owned(),
        voice: TenantVoice {
            display_name: name.to_owned(),
            tone: "cercano".to_owned(),
            locale: Locale::Es,
        },
        business_hours: hours,
        address: None,
        payment_methods: Vec::new(),
    }
}

fn product(tenant: &str, id: &str, name: &str, category: &str, price: i64) -> Product {
    Product {
        id: ProductId(id.to_owned()),
        tenant_id: TenantId(tenant.to_owned()),
        name: name.to_owned(),
        description: String::new(),
        category: category.to_owned(),
        price: Decimal::new(price, 0),
        active: true,
    }
}

fn faq(tenant: &str, id: &str, question: &str, answer: &str) -> Faq {
    Faq {
        id: FaqId(id.to_owned()),
        tenant_id: TenantId(tenant.to_owned()),
        question: question.to_owned(),
        answer: answer.to_owned(),
        active: true,
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    llm: ScriptedLlm,
    runtime: AgentRuntime,
}

impl Harness {
    async fn new() -> Self {
        Self::with_llm(ScriptedLlm::unavailable()).await
    }

    async fn with_llm(llm: ScriptedLlm) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let open_week = BusinessHours::default;
        let trattoria = tenant(TRATTORIA, "Trattoria", TenantKind::Restaurant, open_week());
        store.insert_tenant(trattoria).await;
        let panaderia = tenant(PANADERIA, "Panadería Rosa", TenantKind::Bakery, open_week());
        store.insert_tenant(panaderia).await;
        let closed_week: BTreeMap<String, String> =
            ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"]
                .into_iter()
                .map(|day| (day.to_owned(), "closed".to_owned()))
                .collect();
        let closed_week = BusinessHours(closed_week);
        store.insert_tenant(tenant(CERRADO, "Cerrado", TenantKind::Restaurant, closed_week)).await;

        let menu = [
            ("p01", "Pizza Margherita", "pizzas", 12_000),
            ("p02", "Pizza Pepperoni", "pizzas", 13_500),
            ("p08", "Tiramisu", "postres", 5_500),
            ("p11", "Agua Mineral", "bebidas", 2_000),
        ];
        for tenant_id in [TRATTORIA, CERRADO] {
            for (id, name, category, price) in menu {
                store.insert_product(product(tenant_id, id, name, category, price), 10).await;
            }
        }
        store.insert_product(product(PANADERIA, "b01", "Marraqueta", "panes", 1_500), 50).await;
        let delivery =
            faq(TRATTORIA, "f1", "¿Tienen delivery?", "Sí, hacemos delivery en Providencia.");
        store.insert_faq(delivery).await;
        let dispatch = faq(PANADERIA, "f2", "¿Hacen despacho?", "Despachamos solo en Ñuñoa.");
        store.insert_faq(dispatch).await;

        let services = AgentServices::from_store(
            store.clone(),
            Arc::new(llm.clone()),
            Arc::new(KeywordEmbedder::new()),
        );
        let settings = AgentSettings { similarity_floor: 0.5, ..AgentSettings::default() };
        let runtime = AgentRuntime::new(services, settings).expect("runtime");
        for tenant_id in [TRATTORIA, PANADERIA] {
            runtime
                .retrieval()
                .index_tenant(&TenantId(tenant_id.to_owned()), store.as_ref())
                .await
                .expect("index");
        }

        Self { store, llm, runtime }
    }

    async fn send(
        &self,
        tenant_id: &str,
        conversation_id: Option<&ConversationId>,
        message: &str,
    ) -> Result<TurnResponse, ApplicationError> {
        let request = TurnRequest {
            tenant_id: TenantId(tenant_id.to_owned()),
            conversation_id: conversation_id.cloned(),
            message: message.to_owned(),
            user_id: None,
        };
        self.runtime.handle_turn(request, "test-correlation").await
    }

    async fn order_session(&self, id: &ConversationId) -> OrderSession {
        ConversationRepository::find_by_id(self.store.as_ref(), id)
            .await
            .expect("load")
            .expect("conversation exists")
            .metadata
            .order
    }
}

#[tokio::test]
async fn quantity_request_opens_a_draft() {
    let harness = Harness::new().await;

    let response = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");

    assert_eq!(response.intent, Intent::OrderCreate);
    let summary = response.order_summary.expect("summary");
    assert_eq!(summary.line_items.len(), 1);
    assert_eq!(summary.line_items[0].quantity, 2);
    assert_eq!(summary.total, Decimal::new(24_000, 0));
    assert!(response.response_text.contains("$24.000"));
    assert!(!response.requires_confirmation);
}

#[tokio::test]
async fn open_draft_turns_category_request_into_update() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");

    let second = harness
        .send(TRATTORIA, Some(&first.conversation_id), "agrégame una bebida")
        .await
        .expect("turn");

    assert_eq!(second.intent, Intent::OrderUpdate);
    let summary = second.order_summary.expect("summary");
    assert_eq!(summary.line_items.len(), 2);
    assert_eq!(summary.total, Decimal::new(26_000, 0));
    let recomputed: Decimal = summary
        .line_items
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();
    assert_eq!(recomputed, summary.total);
}

#[tokio::test]
async fn second_yes_places_no_second_order() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");
    let id = first.conversation_id;

    let closing = harness.send(TRATTORIA, Some(&id), "eso es todo").await.expect("turn");
    assert!(closing.requires_confirmation);
    assert!(matches!(harness.order_session(&id).await, OrderSession::PendingConfirmation { .. }));

    let placed = harness.send(TRATTORIA, Some(&id), "sí").await.expect("turn");
    assert!(!placed.requires_confirmation);
    assert_eq!(placed.order_summary.map(|summary| summary.total), Some(Decimal::new(24_000, 0)));

    harness.send(TRATTORIA, Some(&id), "sí").await.expect("turn");
    let orders = harness
        .store
        .orders_for_conversation(&TenantId(TRATTORIA.to_owned()), &id)
        .await
        .expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(harness.order_session(&id).await, OrderSession::NoDraft);
}

#[tokio::test]
async fn confirmation_with_an_added_item_returns_to_drafting() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");
    let id = first.conversation_id;
    harness.send(TRATTORIA, Some(&id), "eso es todo").await.expect("turn");

    let response =
        harness.send(TRATTORIA, Some(&id), "sí, agrégame un tiramisu").await.expect("turn");

    assert_eq!(response.intent, Intent::OrderUpdate);
    assert!(!response.requires_confirmation);
    let draft = match harness.order_session(&id).await {
        OrderSession::Drafting { draft } => draft,
        other => panic!("expected drafting, got {other:?}"),
    };
    assert_eq!(draft.quantity_of(&ProductId("p08".to_owned())), 1);
    assert_eq!(draft.quantity_of(&ProductId("p01".to_owned())), 2);
    assert_eq!(draft.total(), Decimal::new(29_500, 0));
    let orders = harness
        .store
        .orders_for_conversation(&TenantId(TRATTORIA.to_owned()), &id)
        .await
        .expect("orders");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn stock_drop_before_confirmation_reopens_draft() {
    let harness = Harness::new().await;
    let first =
        harness.send(TRATTORIA, None, "Quiero 2 pizzas y un tiramisu").await.expect("turn");
    let id = first.conversation_id;
    let closing = harness.send(TRATTORIA, Some(&id), "eso es todo").await.expect("turn");
    assert_eq!(closing.order_summary.map(|summary| summary.total), Some(Decimal::new(29_500, 0)));

    harness
        .store
        .set_stock(&TenantId(TRATTORIA.to_owned()), &ProductId("p08".to_owned()), 0)
        .await;
    let response = harness.send(TRATTORIA, Some(&id), "sí").await.expect("turn");

    assert!(response.response_text.contains("Tiramisu está agotado"));
    assert!(!response.response_text.contains("$29.500"));
    let summary = response.order_summary.expect("summary");
    assert_eq!(summary.total, Decimal::new(24_000, 0));
    assert!(summary.line_items.iter().all(|line| line.product_id.0 != "p08"));
    let draft = match harness.order_session(&id).await {
        OrderSession::Drafting { draft } => draft,
        other => panic!("expected drafting, got {other:?}"),
    };
    assert_eq!(draft.quantity_of(&ProductId("p08".to_owned())), 0);
    let orders = harness
        .store
        .orders_for_conversation(&TenantId(TRATTORIA.to_owned()), &id)
        .await
        .expect("orders");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn yes_while_drafting_does_not_confirm() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");
    let id = first.conversation_id;

    let response = harness.send(TRATTORIA, Some(&id), "sí").await.expect("turn");

    assert!(!response.requires_confirmation);
    assert!(matches!(harness.order_session(&id).await, OrderSession::Drafting { .. }));
    let orders = harness
        .store
        .orders_for_conversation(&TenantId(TRATTORIA.to_owned()), &id)
        .await
        .expect("orders");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn sold_out_product_is_refused() {
    let harness = Harness::new().await;
    harness
        .store
        .set_stock(&TenantId(TRATTORIA.to_owned()), &ProductId("p08".to_owned()), 0)
        .await;

    let response = harness.send(TRATTORIA, None, "quiero un tiramisu").await.expect("turn");

    assert!(response.response_text.contains("agotado"));
    assert!(response.order_summary.is_none());
}

#[tokio::test]
async fn closed_tenant_refuses_orders_without_touching_state() {
    let harness = Harness::new().await;

    let response = harness.send(CERRADO, None, "Quiero 2 pizzas").await.expect("turn");

    assert!(response.response_text.contains("cerrado"));
    assert!(response.order_summary.is_none());
    assert_eq!(harness.order_session(&response.conversation_id).await, OrderSession::NoDraft);
}

#[tokio::test]
async fn faq_answers_stay_inside_the_tenant() {
    let harness = Harness::new().await;

    let response = harness.send(PANADERIA, None, "¿hacen despacho?").await.expect("turn");

    assert_eq!(response.intent, Intent::Faq);
    assert_eq!(response.grounded, Some(true));
    assert_eq!(response.response_text, "Despachamos solo en Ñuñoa.");

    let matches = harness
        .runtime
        .retrieval()
        .retrieve(&TenantId(PANADERIA.to_owned()), "delivery y despacho")
        .await
        .expect("retrieve");
    assert!(!matches.is_empty());
    assert!(matches.iter().all(|found| found.tenant_id.0 == PANADERIA));
}

#[tokio::test]
async fn unknown_topic_is_answered_without_claiming_a_source() {
    let harness = Harness::new().await;

    let response = harness
        .send(TRATTORIA, None, "¿tienen estacionamiento para bicicletas?")
        .await
        .expect("turn");

    assert_eq!(response.intent, Intent::Faq);
    assert_eq!(response.grounded, Some(false));
    assert!(response.response_text.contains("No tengo esa información"));
}

#[tokio::test]
async fn synthesized_reply_uses_the_model_when_available() {
    let llm = ScriptedLlm::new().on("reference facts", "¡Claro! Hacemos delivery en Providencia.");
    let harness = Harness::with_llm(llm).await;

    let response = harness.send(TRATTORIA, None, "¿tienen delivery?").await.expect("turn");

    assert_eq!(response.response_text, "¡Claro! Hacemos delivery en Providencia.");
    assert!(harness.llm.prompts().iter().any(|prompt| prompt.contains("hacemos delivery")));
}

#[tokio::test]
async fn failed_commit_leaves_the_conversation_untouched() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");
    let id = first.conversation_id;
    let before = harness.order_session(&id).await;

    harness.store.fail_commits(true);
    let error = harness.send(TRATTORIA, Some(&id), "eso es todo").await.expect_err("commit fails");
    assert!(matches!(error, ApplicationError::Persistence(_)));
    assert_eq!(harness.store.message_count(&id).await, 2);
    assert_eq!(harness.order_session(&id).await, before);

    harness.store.fail_commits(false);
    let retried = harness.send(TRATTORIA, Some(&id), "eso es todo").await.expect("turn");
    assert!(retried.requires_confirmation);
}

#[tokio::test]
async fn failed_first_turn_writes_nothing() {
    let harness = Harness::new().await;
    harness.store.fail_commits(true);

    let error = harness
        .send(TRATTORIA, None, "La pizza llegó fría, pésimo servicio")
        .await
        .expect_err("commit fails");

    assert!(matches!(error, ApplicationError::Persistence(_)));
    let reviews =
        harness.store.reviews_for_tenant(&TenantId(TRATTORIA.to_owned())).await.expect("reviews");
    assert!(reviews.is_empty());
}

#[tokio::test]
async fn stale_version_commit_is_rejected() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");
    let id = first.conversation_id;
    let stale = ConversationRepository::find_by_id(harness.store.as_ref(), &id)
        .await
        .expect("load")
        .expect("exists");

    harness.send(TRATTORIA, Some(&id), "agrégame una bebida").await.expect("turn");

    let now = chrono::Utc::now();
    let commit = TurnCommit {
        user_message: mostrador_core::Message::user(id.clone(), "eso es todo", now),
        agent_message: mostrador_core::Message::agent(id.clone(), "ok", Intent::OrderUpdate, now),
        conversation: stale,
        is_new: false,
        order: None,
        review: None,
    };
    let error = harness.store.commit_turn(commit).await.expect_err("stale version");
    assert!(matches!(error, RepositoryError::Conflict(_)));
    assert_eq!(harness.store.message_count(&id).await, 4);
}

#[tokio::test]
async fn concurrent_turns_on_one_conversation_are_serialized() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");
    let id = first.conversation_id;

    let (left, right) = tokio::join!(
        harness.send(TRATTORIA, Some(&id), "agrégame una bebida"),
        harness.send(TRATTORIA, Some(&id), "agrégame un tiramisu"),
    );

    left.expect("left turn");
    right.expect("right turn");
    assert_eq!(harness.store.message_count(&id).await, 6);
    let draft = harness.order_session(&id).await.draft().cloned().expect("draft");
    assert_eq!(draft.total(), Decimal::new(24_000 + 2_000 + 5_500, 0));
}

#[tokio::test]
async fn complaint_flags_attention_and_records_review() {
    let harness = Harness::new().await;

    let response = harness
        .send(TRATTORIA, None, "La pizza llegó fría, pésimo servicio")
        .await
        .expect("turn");

    assert_eq!(response.intent, Intent::Complaint);
    let conversation =
        ConversationRepository::find_by_id(harness.store.as_ref(), &response.conversation_id)
            .await
            .expect("load")
            .expect("exists");
    assert!(conversation.metadata.requires_attention);
    let reviews =
        harness.store.reviews_for_tenant(&TenantId(TRATTORIA.to_owned())).await.expect("reviews");
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].rating.value(), 1);
    assert!(reviews[0].requires_attention);
}

#[tokio::test]
async fn review_is_persisted_with_its_rating() {
    let harness = Harness::new().await;

    let response =
        harness.send(TRATTORIA, None, "Les doy 5 estrellas, todo muy rico").await.expect("turn");

    assert_eq!(response.intent, Intent::Review);
    let reviews =
        harness.store.reviews_for_tenant(&TenantId(TRATTORIA.to_owned())).await.expect("reviews");
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].rating.value(), 5);
    assert!(!reviews[0].requires_attention);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_model_call() {
    let harness = Harness::new().await;

    let empty = harness.send(TRATTORIA, None, "   ").await.expect_err("empty");
    assert!(matches!(empty, ApplicationError::Domain(DomainError::InvalidInput(_))));

    let long = "a".repeat(2_001);
    let oversized = harness.send(TRATTORIA, None, &long).await.expect_err("too long");
    assert!(matches!(oversized, ApplicationError::Domain(DomainError::InvalidInput(_))));

    let unknown = harness.send("nadie", None, "hola").await.expect_err("unknown tenant");
    assert!(matches!(unknown, ApplicationError::Domain(DomainError::UnknownTenant(_))));

    let missing = harness
        .send(TRATTORIA, Some(&ConversationId("no-existe".to_owned())), "hola")
        .await
        .expect_err("unknown conversation");
    assert!(matches!(missing, ApplicationError::Domain(DomainError::UnknownConversation(_))));

    assert_eq!(harness.llm.calls(), 0);
}

#[tokio::test]
async fn conversation_cannot_cross_tenants() {
    let harness = Harness::new().await;
    let first = harness.send(TRATTORIA, None, "Quiero 2 pizzas").await.expect("turn");

    let error = harness
        .send(PANADERIA, Some(&first.conversation_id), "quiero una marraqueta")
        .await
        .expect_err("tenant mismatch");

    assert!(matches!(error, ApplicationError::Domain(DomainError::TenantMismatch { .. })));
    assert_eq!(harness.store.message_count(&first.conversation_id).await, 2);
}
