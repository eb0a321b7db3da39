use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: Decimal,
    pub active: bool,
}

impl Product {
    /// Text fed to the embedding model for the product collection.
    pub fn embedding_text(&self) -> String {
        format!(
            "{}\n{}\nCategoría: {}\nPrecio: {}",
            self.name, self.description, self.category, self.price
        )
    }
}
