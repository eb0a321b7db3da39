use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaqId(pub String);

impl fmt::Display for FaqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub id: FaqId,
    pub tenant_id: TenantId,
    pub question: String,
    pub answer: String,
    pub active: bool,
}

impl Faq {
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.question, self.answer)
    }
}
