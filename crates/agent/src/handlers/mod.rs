//! Per-intent handlers and the dispatch table. Handlers compute everything in memory and
//! hand back a [`HandlerOutcome`]; nothing here writes to the store.

use chrono::{DateTime, Utc};

use mostrador_core::domain::conversation::{Conversation, ConversationMetadata, Message};
use mostrador_core::domain::intent::Intent;
use mostrador_core::domain::order::{OrderSummary, PlacedOrder};
use mostrador_core::domain::product::Product;
use mostrador_core::domain::review::Review;
use mostrador_core::domain::tenant::{Locale, Tenant};
use mostrador_core::errors::ApplicationError;

use crate::response::Reply;

pub mod complaint;
pub mod faq;
pub mod general;
pub mod order;
pub mod review;

pub use complaint::ComplaintHandler;
pub use faq::FaqHandler;
pub use general::GeneralHandler;
pub use order::OrderHandler;
pub use review::ReviewHandler;

/// Read-only view of one turn. Every lookup a handler makes is scoped by `tenant.id`.
pub struct TurnContext<'a> {
    pub tenant: &'a Tenant,
    pub conversation: &'a Conversation,
    pub utterance: &'a str,
    pub locale: Locale,
    pub now: DateTime<Utc>,
    pub history: &'a [Message],
    /// Active products of the tenant, in catalog order.
    pub catalog: &'a [Product],
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandlerOutcome {
    pub reply: Reply,
    pub metadata: ConversationMetadata,
    pub order: Option<PlacedOrder>,
    pub review: Option<Review>,
    pub requires_confirmation: bool,
    pub order_summary: Option<OrderSummary>,
    pub grounded: Option<bool>,
}

impl HandlerOutcome {
    pub fn reply_only(reply: Reply, metadata: ConversationMetadata) -> Self {
        Self {
            reply,
            metadata,
            order: None,
            review: None,
            requires_confirmation: false,
            order_summary: None,
            grounded: None,
        }
    }
}

pub struct Handlers {
    pub faq: FaqHandler,
    pub order: OrderHandler,
    pub complaint: ComplaintHandler,
    pub review: ReviewHandler,
    pub general: GeneralHandler,
}

impl Handlers {
    pub async fn dispatch(
        &self,
        intent: Intent,
        ctx: &TurnContext<'_>,
    ) -> Result<HandlerOutcome, ApplicationError> {
        match intent {
            Intent::Faq => self.faq.handle(ctx).await,
            Intent::OrderCreate | Intent::OrderUpdate => self.order.handle(ctx).await,
            Intent::Complaint => Ok(self.complaint.handle(ctx)),
            Intent::Review => Ok(self.review.handle(ctx).await),
            Intent::Other => Ok(self.general.handle(ctx)),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use mostrador_core::domain::conversation::Conversation;
    use mostrador_core::domain::product::{Product, ProductId};
    use mostrador_core::domain::tenant::{
        BusinessHours, Locale, Tenant, TenantId, TenantKind, TenantVoice,
    };

    pub fn tenant() -> Tenant {
        Tenant {
            id: TenantId("trattoria".to_owned()),
            name: "Trattoria".to_owned(),
            kind: TenantKind::Restaurant,
            timezone: "America/Santiago".to_owned(),
            voice: TenantVoice {
                display_name: "Trattoria".to_owned(),
                tone: "cálido".to_owned(),
                locale: Locale::Es,
            },
            business_hours: BusinessHours(BTreeMap::new()),
            address: Some("Av. Italia 1234, Providencia".to_owned()),
            payment_methods: vec!["efectivo".to_owned(), "tarjeta".to_owned()],
        }
    }

    pub fn product(id: &str, name: &str, category: &str, price: i64) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            tenant_id: TenantId("trattoria".to_owned()),
            name: name.to_owned(),
            description: String::new(),
            category: category.to_owned(),
            price: Decimal::new(price, 0),
            active: true,
        }
    }

    pub fn catalog() -> Vec<Product> {
        vec![
            product("p01", "Pizza Margherita", "pizzas", 12_000),
            product("p02", "Pizza Pepperoni", "pizzas", 13_500),
            product("p08", "Tiramisu", "postres", 5_500),
            product("p11", "Agua Mineral", "bebidas", 2_000),
        ]
    }

    pub fn conversation() -> Conversation {
        Conversation::start(TenantId("trattoria".to_owned()), None, Utc::now())
    }
}
