//! Domain model for the multi-tenant storefront agent: tenants, catalogs, conversations,
//! order drafts and the order flow, plus configuration and the error taxonomy.
//!
//! Nothing here performs I/O. Persistence lives in `mostrador-db`, model calls in
//! `mostrador-agent`.

pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod gate;

pub use domain::conversation::{
    Conversation, ConversationId, ConversationMetadata, Message, MessageId, OrderSession, Sender,
    UserId,
};
pub use domain::faq::{Faq, FaqId};
pub use domain::intent::Intent;
pub use domain::order::{
    DraftError, LineItem, OrderDraft, OrderId, OrderStatus, OrderSummary, PlacedOrder,
};
pub use domain::product::{Product, ProductId};
pub use domain::retrieval::{Collection, RetrievalMatch};
pub use domain::review::{Rating, Review, ReviewId, Sentiment};
pub use domain::tenant::{BusinessHours, Locale, Tenant, TenantId, TenantKind, TenantVoice};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowEngine, OrderAction, OrderEvent, OrderFlow, OrderState};
