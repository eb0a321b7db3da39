use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use mostrador_agent::{AgentRuntime, TurnRequest};
use mostrador_core::errors::InterfaceError;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub correlation_id: String,
}

pub struct ChatError(InterfaceError);

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            InterfaceError::BadRequest { message, .. } => {
                (StatusCode::BAD_REQUEST, Some(message.clone()))
            }
            InterfaceError::ServiceUnavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, None),
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(ChatState { runtime })
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<TurnRequest>, JsonRejection>,
) -> Result<Response, ChatError> {
    let correlation_id = Uuid::new_v4().to_string();

    let Json(request) = payload.map_err(|rejection| {
        info!(
            event_name = "http.chat.malformed_body",
            correlation_id = %correlation_id,
            rejection = %rejection.body_text(),
            "chat request body rejected"
        );
        ChatError(InterfaceError::BadRequest {
            message: rejection.body_text(),
            correlation_id: correlation_id.clone(),
        })
    })?;

    match state.runtime.handle_turn(request, &correlation_id).await {
        Ok(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        Err(error) => {
            if error.is_retryable() {
                warn!(
                    event_name = "http.chat.unavailable",
                    correlation_id = %correlation_id,
                    error = %error,
                    "turn failed with a retryable error"
                );
            }
            Err(ChatError(error.into_interface(correlation_id)))
        }
    }
}
