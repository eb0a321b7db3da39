use std::collections::HashSet;

use mostrador_core::config::AppConfig;
use mostrador_core::domain::retrieval::Collection;
use mostrador_db::migrations::{self, MIGRATOR};
use mostrador_db::repositories::{SqlCatalogRepository, SqlEmbeddingRepository, SqlTenantRepository};
use mostrador_db::{
    CatalogRepository, DbPool, EmbeddingRepository, RepositoryError, TenantRepository,
};
use serde::Serialize;

use crate::commands::{
    async_runtime, connect, load_config, CommandResult, EXIT_CONFIG, EXIT_DATABASE, EXIT_INPUT,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
    #[serde(skip)]
    exit_code: u8,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into(), exit_code: 0 }
    }

    fn fail(name: &'static str, details: impl Into<String>, exit_code: u8) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into(), exit_code }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: format!("skipped because {reason}"),
            exit_code: 0,
        }
    }
}

pub fn run() -> CommandResult {
    let checks = build_checks();
    let data = serde_json::to_value(&checks).ok();

    match checks.iter().find(|check| check.status == CheckStatus::Fail) {
        None => CommandResult::success_with_data("doctor", "all readiness checks passed", data),
        Some(failed) => CommandResult::failure_with_data(
            "doctor",
            failed.name,
            format!("{}: {}", failed.name, failed.details),
            failed.exit_code,
            data,
        ),
    }
}

fn build_checks() -> Vec<DoctorCheck> {
    let config = match load_config() {
        Ok(config) => config,
        Err((_, message, _)) => {
            return vec![
                DoctorCheck::fail("config_validation", message, EXIT_CONFIG),
                DoctorCheck::skipped("database_connectivity", "configuration did not load"),
                DoctorCheck::skipped("migrations", "configuration did not load"),
                DoctorCheck::skipped("embedding_coverage", "configuration did not load"),
            ];
        }
    };

    let mut checks =
        vec![DoctorCheck::pass("config_validation", "configuration loaded and validated")];
    let runtime = match async_runtime() {
        Ok(runtime) => runtime,
        Err((_, message, exit_code)) => {
            checks.push(DoctorCheck::fail("database_connectivity", message, exit_code));
            return checks;
        }
    };

    runtime.block_on(async {
        let pool = match connect(&config).await {
            Ok(pool) => pool,
            Err((_, message, _)) => {
                checks.push(DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to connect to database: {message}"),
                    EXIT_DATABASE,
                ));
                checks.push(DoctorCheck::skipped("migrations", "the database is unreachable"));
                checks.push(DoctorCheck::skipped(
                    "embedding_coverage",
                    "the database is unreachable",
                ));
                return;
            }
        };
        checks.push(DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ));

        let migrations_ok = match check_migrations(&pool).await {
            Ok(check) => {
                let ok = check.status == CheckStatus::Pass;
                checks.push(check);
                ok
            }
            Err(error) => {
                checks.push(DoctorCheck::fail("migrations", error.to_string(), EXIT_DATABASE));
                false
            }
        };

        if migrations_ok {
            checks.push(match check_embedding_coverage(&pool, &config).await {
                Ok(check) => check,
                Err(error) => {
                    DoctorCheck::fail("embedding_coverage", error.to_string(), EXIT_DATABASE)
                }
            });
        } else {
            checks.push(DoctorCheck::skipped("embedding_coverage", "the schema is not current"));
        }

        pool.close().await;
    });

    checks
}

async fn check_migrations(pool: &DbPool) -> Result<DoctorCheck, sqlx::Error> {
    let applied: HashSet<i64> = migrations::applied_versions(pool).await?.into_iter().collect();
    let pending: Vec<String> = MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .filter(|migration| !applied.contains(&migration.version))
        .map(|migration| format!("{} {}", migration.version, migration.description))
        .collect();

    Ok(if pending.is_empty() {
        DoctorCheck::pass("migrations", format!("{} migration(s) applied", applied.len()))
    } else {
        DoctorCheck::fail(
            "migrations",
            format!("pending migrations: {}; run `mostrador migrate`", pending.join(", ")),
            EXIT_DATABASE,
        )
    })
}

/// Every active FAQ and product of every tenant needs a vector from the configured model.
async fn check_embedding_coverage(
    pool: &DbPool,
    config: &AppConfig,
) -> Result<DoctorCheck, RepositoryError> {
    let tenants = SqlTenantRepository::new(pool.clone());
    let catalog = SqlCatalogRepository::new(pool.clone());
    let embeddings = SqlEmbeddingRepository::new(pool.clone());
    let model = config.embedding.model.as_str();

    let mut gaps = Vec::new();
    for tenant in TenantRepository::list(&tenants).await? {
        let expected: Vec<(Collection, String)> = catalog
            .active_faqs(&tenant.id)
            .await?
            .into_iter()
            .map(|faq| (Collection::Faq, faq.id.0))
            .chain(
                catalog
                    .active_products(&tenant.id)
                    .await?
                    .into_iter()
                    .map(|product| (Collection::Product, product.id.0)),
            )
            .collect();

        let mut covered = HashSet::new();
        for collection in [Collection::Faq, Collection::Product] {
            for record in EmbeddingRepository::list(&embeddings, &tenant.id, collection).await? {
                if record.model == model {
                    covered.insert((collection, record.source_id));
                }
            }
        }

        let missing = expected.iter().filter(|key| !covered.contains(*key)).count();
        if missing > 0 {
            gaps.push(format!("{} ({missing}/{} missing)", tenant.id, expected.len()));
        }
    }

    Ok(if gaps.is_empty() {
        DoctorCheck::pass("embedding_coverage", format!("all sources embedded with `{model}`"))
    } else {
        DoctorCheck::fail(
            "embedding_coverage",
            format!("no `{model}` vectors for {}; run `mostrador embed`", gaps.join(", ")),
            EXIT_INPUT,
        )
    })
}
