use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::intent::Intent;
use crate::domain::order::{OrderDraft, OrderId};
use crate::domain::tenant::TenantId;
use crate::flows::OrderState;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

/// Append-only turn half. Agent messages carry the intent they answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: Sender,
    pub text: String,
    pub intent: Option<Intent>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(
        conversation_id: ConversationId,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            sender: Sender::User,
            text: text.into(),
            intent: None,
            created_at,
        }
    }

    pub fn agent(
        conversation_id: ConversationId,
        text: impl Into<String>,
        intent: Intent,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            sender: Sender::Agent,
            text: text.into(),
            intent: Some(intent),
            created_at,
        }
    }
}

/// Durable order state of a conversation. Confirmed and cancelled drafts settle back to
/// `NoDraft`, so only the non-terminal states are ever stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrderSession {
    #[default]
    NoDraft,
    Drafting {
        draft: OrderDraft,
    },
    PendingConfirmation {
        draft: OrderDraft,
    },
}

impl OrderSession {
    pub fn state(&self) -> OrderState {
        match self {
            Self::NoDraft => OrderState::NoDraft,
            Self::Drafting { .. } => OrderState::Drafting,
            Self::PendingConfirmation { .. } => OrderState::PendingConfirmation,
        }
    }

    pub fn draft(&self) -> Option<&OrderDraft> {
        match self {
            Self::NoDraft => None,
            Self::Drafting { draft } | Self::PendingConfirmation { draft } => Some(draft),
        }
    }

    pub fn has_open_draft(&self) -> bool {
        !matches!(self, Self::NoDraft)
    }

    /// Rebuilds the stored session for a non-terminal state; terminal states clear it.
    pub fn settle(state: &OrderState, draft: OrderDraft) -> Self {
        match state {
            OrderState::Drafting => Self::Drafting { draft },
            OrderState::PendingConfirmation => Self::PendingConfirmation { draft },
            OrderState::NoDraft | OrderState::Confirmed | OrderState::Cancelled => Self::NoDraft,
        }
    }
}

/// Typed per-conversation pipeline state, written only by the turn dispatcher.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    #[serde(default)]
    pub order: OrderSession,
    #[serde(default)]
    pub last_intent: Option<Intent>,
    #[serde(default)]
    pub requires_attention: bool,
    #[serde(default)]
    pub last_order_id: Option<OrderId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
    pub metadata: ConversationMetadata,
    /// Bumped by every committed turn; commits compare-and-swap on it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn start(tenant_id: TenantId, user_id: Option<UserId>, now: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::generate(),
            tenant_id,
            user_id,
            metadata: ConversationMetadata::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ConversationMetadata, OrderSession};
    use crate::domain::intent::Intent;
    use crate::domain::order::OrderDraft;
    use crate::domain::product::{Product, ProductId};
    use crate::domain::tenant::TenantId;
    use crate::flows::OrderState;

    fn draft_with_pizza() -> OrderDraft {
        let mut draft = OrderDraft::new();
        draft
            .add(
                &Product {
                    id: ProductId("p-1".to_owned()),
                    tenant_id: TenantId("t-1".to_owned()),
                    name: "Pizza Margherita".to_owned(),
                    description: String::new(),
                    category: "pizzas".to_owned(),
                    price: Decimal::new(12_000, 0),
                    active: true,
                },
                1,
            )
            .expect("add");
        draft
    }

    #[test]
    fn metadata_round_trips_through_tagged_json() {
        let metadata = ConversationMetadata {
            order: OrderSession::PendingConfirmation { draft: draft_with_pizza() },
            last_intent: Some(Intent::OrderUpdate),
            requires_attention: false,
            last_order_id: None,
        };

        let json = serde_json::to_value(&metadata).expect("serialize");
        assert_eq!(json["order"]["state"], "pending_confirmation");
        assert_eq!(json["last_intent"], "order_update");

        let restored: ConversationMetadata = serde_json::from_value(json).expect("deserialize");
        assert_eq!(restored, metadata);
    }

    #[test]
    fn empty_metadata_defaults_to_no_draft() {
        let restored: ConversationMetadata =
            serde_json::from_str("{}").expect("deserialize empty object");
        assert_eq!(restored.order, OrderSession::NoDraft);
        assert!(!restored.order.has_open_draft());
    }

    #[test]
    fn terminal_states_settle_to_no_draft() {
        assert_eq!(
            OrderSession::settle(&OrderState::Confirmed, draft_with_pizza()),
            OrderSession::NoDraft
        );
        assert_eq!(
            OrderSession::settle(&OrderState::Cancelled, draft_with_pizza()),
            OrderSession::NoDraft
        );
        assert!(matches!(
            OrderSession::settle(&OrderState::Drafting, draft_with_pizza()),
            OrderSession::Drafting { .. }
        ));
    }
}
