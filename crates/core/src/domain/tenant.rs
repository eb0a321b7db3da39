use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantKind {
    Restaurant,
    Bakery,
    Minimarket,
    Other,
}

impl TenantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Bakery => "bakery",
            Self::Minimarket => "minimarket",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "restaurant" => Self::Restaurant,
            "bakery" => Self::Bakery,
            "minimarket" => Self::Minimarket,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Es,
    En,
}

impl Locale {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Es => "es",
            Self::En => "en",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value.trim().to_ascii_lowercase().starts_with("en") {
            Self::En
        } else {
            Self::Es
        }
    }
}

/// How the agent speaks on behalf of a tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantVoice {
    pub display_name: String,
    pub tone: String,
    pub locale: Locale,
}

/// Weekly opening hours keyed by lowercase English weekday (`monday` .. `sunday`).
///
/// Each value is either `closed` or comma-separated `HH:MM-HH:MM` windows. An empty map
/// means no hours were configured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessHours(pub BTreeMap<String, String>);

impl BusinessHours {
    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn for_day(&self, day: &str) -> Option<&str> {
        self.0.get(day).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub kind: TenantKind,
    pub timezone: String,
    pub voice: TenantVoice,
    pub business_hours: BusinessHours,
    pub address: Option<String>,
    pub payment_methods: Vec<String>,
}
