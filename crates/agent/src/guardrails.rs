/// Outcome of screening a raw customer message before any model, retrieval or store call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputPolicy {
    pub max_message_chars: usize,
}

impl Default for InputPolicy {
    fn default() -> Self {
        Self { max_message_chars: 2000 }
    }
}

impl InputPolicy {
    pub fn new(max_message_chars: usize) -> Self {
        Self { max_message_chars }
    }

    pub fn evaluate(&self, message: &str) -> GuardrailDecision {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return GuardrailDecision::Deny {
                reason_code: "empty_message",
                user_message: "message is empty; write a question or an order".to_string(),
            };
        }

        let chars = trimmed.chars().count();
        if chars > self.max_message_chars {
            return GuardrailDecision::Deny {
                reason_code: "message_too_long",
                user_message: format!(
                    "message has {chars} characters; the limit is {}",
                    self.max_message_chars
                ),
            };
        }

        if trimmed.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t')) {
            return GuardrailDecision::Deny {
                reason_code: "control_characters",
                user_message: "message contains control characters".to_string(),
            };
        }

        GuardrailDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::{GuardrailDecision, InputPolicy};

    fn reason(decision: GuardrailDecision) -> &'static str {
        match decision {
            GuardrailDecision::Deny { reason_code, .. } => reason_code,
            GuardrailDecision::Allow => "",
        }
    }

    #[test]
    fn ordinary_message_allowed() {
        let policy = InputPolicy::default();
        assert_eq!(policy.evaluate("¿A qué hora abren?"), GuardrailDecision::Allow);
        assert_eq!(policy.evaluate("línea uno\nlínea dos"), GuardrailDecision::Allow);
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(reason(InputPolicy::default().evaluate("   \n\t")), "empty_message");
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let policy = InputPolicy::new(5);
        assert_eq!(policy.evaluate("ñññññ"), GuardrailDecision::Allow);

        let decision = policy.evaluate("ññññññ");
        let message = match &decision {
            GuardrailDecision::Deny { user_message, .. } => user_message.clone(),
            GuardrailDecision::Allow => String::new(),
        };
        assert_eq!(reason(decision), "message_too_long");
        assert!(message.contains("limit is 5"));
    }

    #[test]
    fn control_characters_denied() {
        assert_eq!(reason(InputPolicy::default().evaluate("hola\u{0007}")), "control_characters");
    }
}
