use std::sync::Arc;

use mostrador_agent::{Embedder, HttpEmbedder, KeywordEmbedder, RetrievalError, RetrievalService};
use mostrador_core::config::AppConfig;
use mostrador_core::domain::tenant::TenantId;
use mostrador_db::repositories::{SqlCatalogRepository, SqlEmbeddingRepository, SqlTenantRepository};
use mostrador_db::TenantRepository;
use serde_json::{json, Value};

use crate::commands::{
    async_runtime, load_config, open_database, CommandResult, Failure, EXIT_DATABASE, EXIT_INPUT,
    EXIT_RUNTIME,
};

pub fn run(tenant: Option<&str>, offline: bool) -> CommandResult {
    let result = load_config().and_then(|config| {
        let embedder = embedder(&config, offline)?;
        let runtime = async_runtime()?;
        runtime.block_on(async {
            let pool = open_database(&config).await?;
            let indexed = index(&pool, &config, embedder, tenant).await;
            pool.close().await;
            indexed
        })
    });

    match result {
        Ok((model, reports)) => {
            let vectors: u64 = reports
                .iter()
                .map(|report| {
                    report["faqs"].as_u64().unwrap_or(0) + report["products"].as_u64().unwrap_or(0)
                })
                .sum();
            CommandResult::success_with_data(
                "embed",
                format!(
                    "regenerated {vectors} vectors for {} tenant(s) with `{model}`",
                    reports.len()
                ),
                Some(Value::Array(reports)),
            )
        }
        Err(failure) => CommandResult::from_failure("embed", failure),
    }
}

pub(crate) fn embedder(config: &AppConfig, offline: bool) -> Result<Arc<dyn Embedder>, Failure> {
    if offline {
        return Ok(Arc::new(KeywordEmbedder::new()));
    }
    let embedder = HttpEmbedder::from_config(&config.embedding)
        .map_err(|error| ("embedding_provider", error.to_string(), EXIT_RUNTIME))?;
    Ok(Arc::new(embedder))
}

async fn index(
    pool: &mostrador_db::DbPool,
    config: &AppConfig,
    embedder: Arc<dyn Embedder>,
    tenant: Option<&str>,
) -> Result<(String, Vec<Value>), Failure> {
    let tenants = SqlTenantRepository::new(pool.clone());
    let catalog = SqlCatalogRepository::new(pool.clone());
    let retrieval = RetrievalService::new(
        embedder,
        Arc::new(SqlEmbeddingRepository::new(pool.clone())),
        config.retrieval.similarity_floor,
        config.retrieval.top_k,
    );

    let targets: Vec<TenantId> = match tenant {
        Some(id) => {
            let id = TenantId(id.to_owned());
            match tenants.find_by_id(&id).await.map_err(database)? {
                Some(found) => vec![found.id],
                None => {
                    return Err(("unknown_tenant", format!("unknown tenant `{id}`"), EXIT_INPUT))
                }
            }
        }
        None => tenants.list().await.map_err(database)?.into_iter().map(|found| found.id).collect(),
    };

    let mut reports = Vec::with_capacity(targets.len());
    for tenant_id in &targets {
        let report = retrieval.index_tenant(tenant_id, &catalog).await.map_err(|error| match error {
            RetrievalError::Embedding(error) => {
                ("embedding_provider", error.to_string(), EXIT_RUNTIME)
            }
            RetrievalError::Store(error) => database(error),
        })?;
        reports.push(json!({
            "tenant_id": tenant_id.0,
            "faqs": report.faqs_indexed,
            "products": report.products_indexed,
            "stale_removed": report.stale_removed,
        }));
    }

    Ok((retrieval.model().to_owned(), reports))
}

fn database(error: mostrador_db::RepositoryError) -> Failure {
    ("persistence", error.to_string(), EXIT_DATABASE)
}
