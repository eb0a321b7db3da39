use std::sync::Arc;

use mostrador_agent::{
    AgentRuntime, AgentServices, AgentSettings, HttpEmbedder, HttpLlmClient, LlmError,
};
use mostrador_core::config::{AppConfig, ConfigError};
use mostrador_core::errors::ApplicationError;
use mostrador_db::repositories::{
    SqlCatalogRepository, SqlConversationRepository, SqlEmbeddingRepository, SqlTenantRepository,
};
use mostrador_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("model client setup failed: {0}")]
    Provider(#[from] LlmError),
    #[error("agent runtime setup failed: {0}")]
    Runtime(#[from] ApplicationError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;

    let services = AgentServices {
        tenants: Arc::new(SqlTenantRepository::new(db_pool.clone())),
        catalog: Arc::new(SqlCatalogRepository::new(db_pool.clone())),
        conversations: Arc::new(SqlConversationRepository::new(db_pool.clone())),
        embeddings: Arc::new(SqlEmbeddingRepository::new(db_pool.clone())),
        llm: Arc::new(HttpLlmClient::from_config(&config.llm)?),
        embedder: Arc::new(HttpEmbedder::from_config(&config.embedding)?),
    };
    let runtime = AgentRuntime::new(services, AgentSettings::from_config(&config))?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        llm_provider = config.llm.provider.as_str(),
        llm_model = %config.llm.model,
        embedding_model = %config.embedding.model,
        "agent runtime assembled"
    );

    Ok(Application { config, db_pool, runtime: Arc::new(runtime) })
}
