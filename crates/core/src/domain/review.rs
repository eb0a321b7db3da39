use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationId;
use crate::domain::tenant::TenantId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub String);

impl ReviewId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Star rating in `1..=5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvariantViolation(format!("rating {value} outside 1..=5")))
        }
    }

    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }

    pub fn from_rating(rating: Rating) -> Self {
        match rating.value() {
            4..=5 => Self::Positive,
            3 => Self::Neutral,
            _ => Self::Negative,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    pub rating: Rating,
    pub comment: String,
    pub sentiment: Sentiment,
    pub requires_attention: bool,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub const CHAT_SOURCE: &'static str = "chat";

    pub fn from_chat(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        rating: Rating,
        comment: impl Into<String>,
        sentiment: Sentiment,
        is_complaint: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReviewId::generate(),
            tenant_id,
            conversation_id,
            rating,
            comment: comment.into(),
            sentiment,
            requires_attention: is_complaint || rating.value() <= 2,
            source: Self::CHAT_SOURCE.to_owned(),
            created_at,
        }
    }
}
