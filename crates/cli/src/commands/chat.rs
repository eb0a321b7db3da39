use std::sync::Arc;

use mostrador_agent::{
    AgentRuntime, AgentServices, AgentSettings, HttpLlmClient, LlmClient, ScriptedLlm, TurnRequest,
};
use mostrador_core::config::AppConfig;
use mostrador_core::domain::conversation::ConversationId;
use mostrador_core::domain::tenant::TenantId;
use mostrador_core::errors::ApplicationError;
use mostrador_db::repositories::{
    SqlCatalogRepository, SqlConversationRepository, SqlEmbeddingRepository, SqlTenantRepository,
};
use mostrador_db::DbPool;
use uuid::Uuid;

use crate::commands::embed::embedder;
use crate::commands::{
    async_runtime, load_config, open_database, CommandResult, Failure, EXIT_CONFIG,
    EXIT_DATABASE, EXIT_INPUT, EXIT_RUNTIME,
};
use crate::ChatArgs;

pub fn run(args: &ChatArgs) -> CommandResult {
    let result = load_config().and_then(|config| {
        let runtime = async_runtime()?;
        runtime.block_on(async {
            let pool = open_database(&config).await?;
            let turn = turn(&pool, &config, args).await;
            pool.close().await;
            turn
        })
    });

    match result {
        Ok((text, data)) => CommandResult::success_with_data("chat", text, Some(data)),
        Err(failure) => CommandResult::from_failure("chat", failure),
    }
}

async fn turn(
    pool: &DbPool,
    config: &AppConfig,
    args: &ChatArgs,
) -> Result<(String, serde_json::Value), Failure> {
    let llm: Arc<dyn LlmClient> = if args.offline {
        Arc::new(ScriptedLlm::unavailable())
    } else {
        Arc::new(
            HttpLlmClient::from_config(&config.llm)
                .map_err(|error| ("llm_provider", error.to_string(), EXIT_RUNTIME))?,
        )
    };
    let services = AgentServices {
        tenants: Arc::new(SqlTenantRepository::new(pool.clone())),
        catalog: Arc::new(SqlCatalogRepository::new(pool.clone())),
        conversations: Arc::new(SqlConversationRepository::new(pool.clone())),
        embeddings: Arc::new(SqlEmbeddingRepository::new(pool.clone())),
        llm,
        embedder: embedder(config, args.offline)?,
    };
    let agent = AgentRuntime::new(services, AgentSettings::from_config(config)).map_err(classify)?;

    let request = TurnRequest {
        tenant_id: TenantId(args.tenant.clone()),
        conversation_id: args.conversation.clone().map(ConversationId),
        message: args.message.clone(),
        user_id: None,
    };
    let correlation_id = Uuid::new_v4().to_string();
    let response = agent.handle_turn(request, &correlation_id).await.map_err(classify)?;

    let data = serde_json::to_value(&response)
        .map_err(|error| ("serialization", error.to_string(), EXIT_RUNTIME))?;
    Ok((response.response_text, data))
}

fn classify(error: ApplicationError) -> Failure {
    let (class, exit_code) = match &error {
        ApplicationError::Domain(_) => ("invalid_request", EXIT_INPUT),
        ApplicationError::Persistence(_) => ("persistence", EXIT_DATABASE),
        ApplicationError::Integration(_) => ("integration", EXIT_RUNTIME),
        ApplicationError::Configuration(_) => ("config_validation", EXIT_CONFIG),
    };
    (class, error.to_string(), exit_code)
}

#[cfg(test)]
mod tests {
    use mostrador_core::domain::tenant::TenantId;
    use mostrador_core::errors::{ApplicationError, DomainError};

    use super::classify;

    #[test]
    fn error_classes_map_to_exit_codes() {
        let unknown = classify(DomainError::UnknownTenant(TenantId("nadie".to_owned())).into());
        assert_eq!((unknown.0, unknown.2), ("invalid_request", 1));
        assert!(unknown.1.contains("nadie"));

        let stale = classify(ApplicationError::Persistence("write conflict".to_owned()));
        assert_eq!((stale.0, stale.2), ("persistence", 4));

        let templates = classify(ApplicationError::Configuration("bad template".to_owned()));
        assert_eq!(templates.2, 2);
    }
}
