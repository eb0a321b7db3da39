use crate::commands::{
    async_runtime, load_config, open_database, CommandResult, EXIT_DATABASE, EXIT_INPUT,
};
use mostrador_db::{DemoSeedDataset, TenantSeedInfo};
use serde_json::json;

pub fn run() -> CommandResult {
    let result = load_config().and_then(|config| {
        let runtime = async_runtime()?;
        runtime.block_on(async {
            let pool = open_database(&config).await?;

            let seeded = DemoSeedDataset::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), EXIT_DATABASE));
            let verified = match seeded {
                Ok(seed) => DemoSeedDataset::verify(&pool)
                    .await
                    .map_err(|error| ("seed_verification", error.to_string(), EXIT_DATABASE))
                    .and_then(|verification| {
                        if verification.all_present {
                            Ok(seed.tenants_seeded)
                        } else {
                            Err((
                                "seed_verification",
                                verification_message(&verification.failed_checks()),
                                EXIT_INPUT,
                            ))
                        }
                    }),
                Err(failure) => Err(failure),
            };

            pool.close().await;
            verified
        })
    });

    match result {
        Ok(tenants) => {
            let message = format!(
                "demo dataset loaded for {} storefronts:\n{}",
                tenants.len(),
                tenant_lines(&tenants)
            );
            let data = tenants
                .iter()
                .map(|tenant| {
                    json!({
                        "tenant_id": tenant.tenant_id,
                        "products": tenant.products,
                        "faqs": tenant.faqs,
                    })
                })
                .collect();
            CommandResult::success_with_data("seed", message, Some(serde_json::Value::Array(data)))
        }
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn tenant_lines(tenants: &[TenantSeedInfo]) -> String {
    tenants
        .iter()
        .map(|tenant| {
            format!("  - {}: {} products, {} faqs", tenant.tenant_id, tenant.products, tenant.faqs)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
