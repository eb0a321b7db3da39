use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Purpose of a single user utterance. Closed set; dispatch matches on it exhaustively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Faq,
    OrderCreate,
    OrderUpdate,
    Complaint,
    Review,
    Other,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown intent `{0}`")]
pub struct UnknownIntent(pub String);

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Faq,
        Intent::OrderCreate,
        Intent::OrderUpdate,
        Intent::Complaint,
        Intent::Review,
        Intent::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faq => "faq",
            Self::OrderCreate => "order_create",
            Self::OrderUpdate => "order_update",
            Self::Complaint => "complaint",
            Self::Review => "review",
            Self::Other => "other",
        }
    }

    pub fn is_order(self) -> bool {
        matches!(self, Self::OrderCreate | Self::OrderUpdate)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = UnknownIntent;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .ok_or(UnknownIntent(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::Intent;

    #[test]
    fn parses_every_wire_name() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>(), Ok(intent));
        }
        assert_eq!(" ORDER_UPDATE ".parse::<Intent>(), Ok(Intent::OrderUpdate));
    }

    #[test]
    fn rejects_names_outside_the_set() {
        assert!("pricing".parse::<Intent>().is_err());
        assert!("".parse::<Intent>().is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&Intent::OrderCreate).expect("serialize");
        assert_eq!(json, "\"order_create\"");
    }
}
