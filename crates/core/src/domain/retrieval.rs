use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

/// Tenant-scoped vector collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Faq,
    Product,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faq => "faq",
            Self::Product => "product",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "faq" => Some(Self::Faq),
            "product" => Some(Self::Product),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search hit. Produced per query and never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMatch {
    pub source_id: String,
    pub tenant_id: TenantId,
    pub collection: Collection,
    pub score: f32,
    pub text: String,
}
