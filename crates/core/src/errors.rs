use thiserror::Error;

use crate::domain::conversation::ConversationId;
use crate::domain::order::DraftError;
use crate::domain::tenant::TenantId;
use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown tenant `{0}`")]
    UnknownTenant(TenantId),
    #[error("unknown conversation `{0}`")]
    UnknownConversation(ConversationId),
    #[error("conversation `{conversation_id}` does not belong to tenant `{tenant_id}`")]
    TenantMismatch { conversation_id: ConversationId, tenant_id: TenantId },
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The message could not be processed. Check the tenant, conversation and text and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The assistant is temporarily unavailable. Please send your message again shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Integration(_))
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::tenant::TenantId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn unknown_tenant_maps_to_bad_request_with_correlation_id() {
        let interface =
            ApplicationError::from(DomainError::UnknownTenant(TenantId("t-404".to_owned())))
                .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ref message,
            } if correlation_id == "req-1" && message.contains("t-404")
        ));
        assert_eq!(interface.correlation_id(), "req-1");
    }

    #[test]
    fn empty_message_has_user_actionable_text() {
        let interface =
            ApplicationError::from(DomainError::InvalidInput("message is empty".to_owned()))
                .into_interface("req-2");

        assert!(interface.user_message().contains("try again"));
    }

    #[test]
    fn persistence_error_maps_to_retryable_service_unavailable() {
        let error = ApplicationError::Persistence("database is locked".to_owned());
        assert!(error.is_retryable());

        let interface = error.into_interface("req-3");
        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert!(interface.user_message().contains("again"));
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let error = ApplicationError::Configuration("missing llm api key".to_owned());
        assert!(!error.is_retryable());

        let interface = error.into_interface("req-4");
        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
