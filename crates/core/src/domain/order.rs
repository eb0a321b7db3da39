use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::conversation::ConversationId;
use crate::domain::product::{Product, ProductId};
use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A product line inside a draft. `unit_price` is captured when the line is first added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("quantity for `{product_id}` must be a positive integer")]
    ZeroQuantity { product_id: ProductId },
    #[error("`{product_id}` is not part of the draft")]
    NotInDraft { product_id: ProductId },
    #[error("quantity for `{product_id}` overflows")]
    QuantityOverflow { product_id: ProductId },
    #[error("draft lists `{product_id}` more than once")]
    DuplicateLine { product_id: ProductId },
}

/// An order in progress.
///
/// Lines are private so every mutation goes through `add`, `remove` and `set_quantity`,
/// which keep quantities positive and product ids unique. The total is always derived
/// from the current lines and never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DraftRecord", into = "DraftRecord")]
pub struct OrderDraft {
    lines: Vec<LineItem>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct DraftRecord {
    lines: Vec<LineItem>,
    #[serde(default)]
    total: Decimal,
}

impl TryFrom<DraftRecord> for OrderDraft {
    type Error = DraftError;

    fn try_from(record: DraftRecord) -> Result<Self, Self::Error> {
        let mut draft = OrderDraft::new();
        for line in record.lines {
            if line.quantity == 0 {
                return Err(DraftError::ZeroQuantity { product_id: line.product_id });
            }
            if draft.position(&line.product_id).is_some() {
                return Err(DraftError::DuplicateLine { product_id: line.product_id });
            }
            draft.lines.push(line);
        }
        Ok(draft)
    }
}

impl From<OrderDraft> for DraftRecord {
    fn from(draft: OrderDraft) -> Self {
        let total = draft.total();
        Self { lines: draft.lines, total }
    }
}

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(LineItem::subtotal).sum()
    }

    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.position(product_id).map(|index| self.lines[index].quantity).unwrap_or(0)
    }

    /// Adds `quantity` units; merges into an existing line keeping its captured price.
    pub fn add(&mut self, product: &Product, quantity: u32) -> Result<&LineItem, DraftError> {
        if quantity == 0 {
            return Err(DraftError::ZeroQuantity { product_id: product.id.clone() });
        }

        let index = match self.position(&product.id) {
            Some(index) => {
                let line = &mut self.lines[index];
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| DraftError::QuantityOverflow {
                        product_id: product.id.clone(),
                    })?;
                index
            }
            None => {
                self.lines.push(LineItem {
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                    quantity,
                    unit_price: product.price,
                });
                self.lines.len() - 1
            }
        };

        Ok(&self.lines[index])
    }

    /// Removes `quantity` units, or the whole line when `quantity` is `None` or covers it.
    pub fn remove(
        &mut self,
        product_id: &ProductId,
        quantity: Option<u32>,
    ) -> Result<LineItem, DraftError> {
        let index = self
            .position(product_id)
            .ok_or_else(|| DraftError::NotInDraft { product_id: product_id.clone() })?;

        match quantity {
            Some(0) => Err(DraftError::ZeroQuantity { product_id: product_id.clone() }),
            Some(units) if units < self.lines[index].quantity => {
                let line = &mut self.lines[index];
                line.quantity -= units;
                Ok(LineItem { quantity: units, ..line.clone() })
            }
            _ => Ok(self.lines.remove(index)),
        }
    }

    /// Sets the quantity of an existing line; zero removes it.
    pub fn set_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Option<&LineItem>, DraftError> {
        let index = self
            .position(product_id)
            .ok_or_else(|| DraftError::NotInDraft { product_id: product_id.clone() })?;

        if quantity == 0 {
            self.lines.remove(index);
            return Ok(None);
        }

        self.lines[index].quantity = quantity;
        Ok(Some(&self.lines[index]))
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary { line_items: self.lines.clone(), total: self.total() }
    }

    fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.lines.iter().position(|line| &line.product_id == product_id)
    }
}

/// Structured payload returned next to the reply whenever a draft is shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub line_items: Vec<LineItem>,
    pub total: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "preparing" => Some(Self::Preparing),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A confirmed draft handed to order persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub conversation_id: ConversationId,
    pub lines: Vec<LineItem>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl PlacedOrder {
    pub fn from_draft(
        tenant_id: TenantId,
        conversation_id: ConversationId,
        draft: &OrderDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            tenant_id,
            conversation_id,
            lines: draft.lines().to_vec(),
            total: draft.total(),
            status: OrderStatus::Pending,
            created_at,
        }
    }
}
