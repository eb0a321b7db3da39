use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use mostrador_core::config::AppConfig;
use mostrador_core::domain::conversation::{Conversation, ConversationId, Message, UserId};
use mostrador_core::domain::intent::Intent;
use mostrador_core::domain::order::OrderSummary;
use mostrador_core::domain::tenant::TenantId;
use mostrador_core::errors::{ApplicationError, DomainError};
use mostrador_db::{
    CatalogRepository, ConversationRepository, EmbeddingRepository, RepositoryError,
    TenantRepository, TurnCommit,
};

use crate::classifier::{ClassifyInput, IntentClassifier};
use crate::embedding::Embedder;
use crate::extraction::OrderExtractor;
use crate::guardrails::{GuardrailDecision, InputPolicy};
use crate::handlers::{
    ComplaintHandler, FaqHandler, GeneralHandler, Handlers, OrderHandler, ReviewHandler,
    TurnContext,
};
use crate::llm::LlmClient;
use crate::response::{detect_locale, PromptLibrary, ResponseGenerator};
use crate::retrieval::RetrievalService;

/// Inbound turn as received from the HTTP or CLI surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub message: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub conversation_id: ConversationId,
    pub response_text: String,
    pub intent: Intent,
    pub requires_confirmation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_summary: Option<OrderSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounded: Option<bool>,
}

/// Store and model capabilities the runtime is assembled from.
#[derive(Clone)]
pub struct AgentServices {
    pub tenants: Arc<dyn TenantRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub embeddings: Arc<dyn EmbeddingRepository>,
    pub llm: Arc<dyn LlmClient>,
    pub embedder: Arc<dyn Embedder>,
}

impl AgentServices {
    /// Wires every repository to one store that implements all of them.
    pub fn from_store<S>(
        store: Arc<S>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn Embedder>,
    ) -> Self
    where
        S: TenantRepository
            + CatalogRepository
            + ConversationRepository
            + EmbeddingRepository
            + 'static,
    {
        Self {
            tenants: store.clone(),
            catalog: store.clone(),
            conversations: store.clone(),
            embeddings: store,
            llm,
            embedder,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentSettings {
    pub max_message_chars: usize,
    pub history_turns: usize,
    pub similarity_floor: f32,
    pub top_k: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_message_chars: config.agent.max_message_chars,
            history_turns: config.agent.history_turns,
            similarity_floor: config.retrieval.similarity_floor,
            top_k: config.retrieval.top_k,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        }
    }
}

/// One async mutex per conversation with a turn in flight. Entries nobody holds are
/// dropped on the next acquire.
#[derive(Default)]
struct ConversationLeases {
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl ConversationLeases {
    fn acquire(&self, id: &ConversationId) -> Arc<Mutex<()>> {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        self.locks.entry(id.clone()).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Turn dispatcher: validates, classifies, runs the matching handler, renders the reply
/// and commits the whole turn at once. Handlers never write; this is the only writer of
/// conversation state.
pub struct AgentRuntime {
    services: AgentServices,
    settings: AgentSettings,
    input_policy: InputPolicy,
    classifier: IntentClassifier,
    handlers: Handlers,
    generator: ResponseGenerator,
    retrieval: RetrievalService,
    leases: ConversationLeases,
}

impl AgentRuntime {
    pub fn new(services: AgentServices, settings: AgentSettings) -> Result<Self, ApplicationError> {
        let prompts = Arc::new(
            PromptLibrary::embedded()
                .map_err(|error| ApplicationError::Configuration(error.to_string()))?,
        );
        let retrieval = RetrievalService::new(
            services.embedder.clone(),
            services.embeddings.clone(),
            settings.similarity_floor,
            settings.top_k,
        );
        let handlers = Handlers {
            faq: FaqHandler::new(retrieval.clone()),
            order: OrderHandler::new(
                OrderExtractor::new(services.llm.clone(), prompts.clone()),
                services.catalog.clone(),
            ),
            complaint: ComplaintHandler,
            review: ReviewHandler::new(services.llm.clone(), prompts.clone()),
            general: GeneralHandler,
        };

        Ok(Self {
            input_policy: InputPolicy::new(settings.max_message_chars),
            classifier: IntentClassifier::new(services.llm.clone(), prompts.clone()),
            generator: ResponseGenerator::new(
                services.llm.clone(),
                prompts,
                settings.max_tokens,
                settings.temperature,
            ),
            handlers,
            retrieval,
            leases: ConversationLeases::default(),
            services,
            settings,
        })
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    pub async fn handle_turn(
        &self,
        request: TurnRequest,
        correlation_id: &str,
    ) -> Result<TurnResponse, ApplicationError> {
        let started = Instant::now();

        if let GuardrailDecision::Deny { reason_code, user_message } =
            self.input_policy.evaluate(&request.message)
        {
            info!(
                event_name = "turn.rejected",
                correlation_id,
                tenant_id = %request.tenant_id,
                reason_code,
                "message failed input validation"
            );
            return Err(DomainError::InvalidInput(user_message).into());
        }
        let utterance = request.message.trim();

        let tenant = self
            .services
            .tenants
            .find_by_id(&request.tenant_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::UnknownTenant(request.tenant_id.clone()))?;

        let lease = request.conversation_id.as_ref().map(|id| self.leases.acquire(id));
        let _guard = match &lease {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let (conversation, is_new) = match &request.conversation_id {
            Some(id) => {
                let conversation = self
                    .services
                    .conversations
                    .find_by_id(id)
                    .await
                    .map_err(persistence)?
                    .ok_or_else(|| DomainError::UnknownConversation(id.clone()))?;
                if conversation.tenant_id != tenant.id {
                    return Err(DomainError::TenantMismatch {
                        conversation_id: id.clone(),
                        tenant_id: tenant.id.clone(),
                    }
                    .into());
                }
                (conversation, false)
            }
            None => {
                (Conversation::start(tenant.id.clone(), request.user_id.clone(), Utc::now()), true)
            }
        };

        let history = if is_new {
            Vec::new()
        } else {
            self.services
                .conversations
                .recent_messages(&conversation.id, self.settings.history_turns * 2)
                .await
                .map_err(persistence)?
        };
        let catalog = self.services.catalog.active_products(&tenant.id).await.map_err(persistence)?;
        let locale = detect_locale(utterance, tenant.voice.locale);

        let classification = self
            .classifier
            .classify(&ClassifyInput {
                utterance,
                history: &history,
                has_open_draft: conversation.metadata.order.has_open_draft(),
                catalog: &catalog,
                voice: &tenant.voice,
                locale,
            })
            .await;
        let intent = classification.intent;

        let now = Utc::now();
        let ctx = TurnContext {
            tenant: &tenant,
            conversation: &conversation,
            utterance,
            locale,
            now,
            history: &history,
            catalog: &catalog,
        };
        let outcome = self.handlers.dispatch(intent, &ctx).await?;
        let rendered = self.generator.render(outcome.reply, &tenant.voice, locale).await;

        let mut updated = conversation.clone();
        updated.metadata = outcome.metadata;
        updated.metadata.last_intent = Some(intent);
        let commit = TurnCommit {
            user_message: Message::user(updated.id.clone(), utterance, now),
            agent_message: Message::agent(
                updated.id.clone(),
                rendered.text.clone(),
                intent,
                Utc::now(),
            ),
            conversation: updated,
            is_new,
            order: outcome.order,
            review: outcome.review,
        };

        let committed = self.services.conversations.commit_turn(commit).await.map_err(|error| {
            error!(
                event_name = "turn.commit_failed",
                correlation_id,
                tenant_id = %tenant.id,
                conversation_id = %conversation.id,
                error = %error,
                "turn discarded, nothing was persisted"
            );
            persistence(error)
        })?;

        info!(
            event_name = "turn.completed",
            correlation_id,
            tenant_id = %tenant.id,
            conversation_id = %committed.conversation_id,
            version = committed.version,
            intent = intent.as_str(),
            classified_by = ?classification.source,
            synthesized = rendered.synthesized,
            message_chars = utterance.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn committed"
        );

        Ok(TurnResponse {
            conversation_id: committed.conversation_id,
            response_text: rendered.text,
            intent,
            requires_confirmation: outcome.requires_confirmation,
            order_summary: outcome.order_summary,
            grounded: outcome.grounded,
        })
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mostrador_core::domain::conversation::ConversationId;

    use super::ConversationLeases;

    #[tokio::test]
    async fn idle_leases_are_dropped() {
        let leases = ConversationLeases::default();
        let first = ConversationId("c-1".to_owned());
        let second = ConversationId("c-2".to_owned());

        let held = leases.acquire(&first);
        let _guard = held.lock().await;
        drop(leases.acquire(&second));
        assert_eq!(leases.len(), 2);

        let again = leases.acquire(&first);
        assert!(Arc::ptr_eq(&held, &again));
        assert_eq!(leases.len(), 1);
    }
}
