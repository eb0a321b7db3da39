use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Row counts the demo seed must produce per tenant.
const DEMO_TENANTS: &[DemoTenantContract] = &[
    DemoTenantContract { tenant_id: "trattoria", products: 12, faqs: 10 },
    DemoTenantContract { tenant_id: "sushi-zen", products: 13, faqs: 10 },
    DemoTenantContract { tenant_id: "asador-criollo", products: 12, faqs: 10 },
    DemoTenantContract { tenant_id: "dona-rosa", products: 13, faqs: 10 },
    DemoTenantContract { tenant_id: "minimarket-express", products: 15, faqs: 10 },
];

/// Five Santiago storefronts with their catalogs, stock and FAQs.
///
/// Loading is idempotent: catalog rows are upserted by id and existing stock levels are
/// left untouched so a reseed never refills inventory consumed by orders.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let tenants_seeded = DEMO_TENANTS
            .iter()
            .map(|tenant| TenantSeedInfo {
                tenant_id: tenant.tenant_id,
                products: tenant.products,
                faqs: tenant.faqs,
            })
            .collect();
        Ok(SeedResult { tenants_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for tenant in DEMO_TENANTS {
            let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tenant WHERE id = ?)")
                .bind(tenant.tenant_id)
                .fetch_one(pool)
                .await?;
            checks.push((format!("{}:tenant", tenant.tenant_id), exists == 1));

            let products: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM product WHERE tenant_id = ? AND active = 1",
            )
            .bind(tenant.tenant_id)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}:products", tenant.tenant_id), products == tenant.products));

            let unstocked: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM product p
                 LEFT JOIN inventory_item i ON i.product_id = p.id
                 WHERE p.tenant_id = ? AND i.product_id IS NULL",
            )
            .bind(tenant.tenant_id)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{}:inventory", tenant.tenant_id), unstocked == 0));

            let faqs: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM faq WHERE tenant_id = ? AND active = 1")
                    .bind(tenant.tenant_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{}:faqs", tenant.tenant_id), faqs == tenant.faqs));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy)]
struct DemoTenantContract {
    tenant_id: &'static str,
    products: i64,
    faqs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantSeedInfo {
    pub tenant_id: &'static str,
    pub products: i64,
    pub faqs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedResult {
    pub tenants_seeded: Vec<TenantSeedInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks.iter().filter(|(_, ok)| !ok).map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use mostrador_core::domain::tenant::{TenantId, TenantKind};

    use super::DemoSeedDataset;
    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::{
        CatalogRepository, SqlCatalogRepository, SqlTenantRepository, TenantRepository,
    };

    #[tokio::test]
    async fn demo_seed_loads_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");

        let result = DemoSeedDataset::load(&pool).await.expect("load");
        assert_eq!(result.tenants_seeded.len(), 5);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed: {:?}", verification.failed_checks());
    }

    #[tokio::test]
    async fn reseeding_is_idempotent_and_keeps_stock() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        DemoSeedDataset::load(&pool).await.expect("first load");

        sqlx::query(
            "UPDATE inventory_item SET stock_quantity = 1 WHERE product_id = 'trattoria-p01'",
        )
        .execute(&pool)
        .await
        .expect("drain stock");
        DemoSeedDataset::load(&pool).await.expect("second load");

        let catalog = SqlCatalogRepository::new(pool.clone());
        let tenant_id = TenantId("trattoria".to_owned());
        let products = catalog.active_products(&tenant_id).await.expect("products");
        assert_eq!(products.len(), 12);
        let margherita = products.iter().find(|p| p.name == "Pizza Margherita").expect("pizza");
        assert_eq!(catalog.stock_level(&tenant_id, &margherita.id).await.expect("stock"), 1);

        let tenants = SqlTenantRepository::new(pool.clone());
        let bakery = tenants
            .find_by_id(&TenantId("dona-rosa".to_owned()))
            .await
            .expect("lookup")
            .expect("bakery seeded");
        assert_eq!(bakery.kind, TenantKind::Bakery);
        assert_eq!(bakery.business_hours.for_day("sunday"), Some("08:00-14:00"));
        assert_eq!(tenants.list().await.expect("list").len(), 5);
    }
}
