use sqlx::Row;

use mostrador_core::domain::tenant::{
    BusinessHours, Locale, Tenant, TenantId, TenantKind, TenantVoice,
};

use super::{decode_err, RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a tenant profile. Used by seeding and tests.
    pub async fn save(&self, tenant: &Tenant) -> Result<(), RepositoryError> {
        let hours_json = serde_json::to_string(&tenant.business_hours).map_err(decode_err)?;
        let payment_json = serde_json::to_string(&tenant.payment_methods).map_err(decode_err)?;

        sqlx::query(
            "INSERT INTO tenant (id, name, kind, timezone, display_name, tone, locale,
                                 business_hours_json, address, payment_methods_json, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 kind = excluded.kind,
                 timezone = excluded.timezone,
                 display_name = excluded.display_name,
                 tone = excluded.tone,
                 locale = excluded.locale,
                 business_hours_json = excluded.business_hours_json,
                 address = excluded.address,
                 payment_methods_json = excluded.payment_methods_json",
        )
        .bind(&tenant.id.0)
        .bind(&tenant.name)
        .bind(tenant.kind.as_str())
        .bind(&tenant.timezone)
        .bind(&tenant.voice.display_name)
        .bind(&tenant.voice.tone)
        .bind(tenant.voice.locale.as_str())
        .bind(hours_json)
        .bind(&tenant.address)
        .bind(payment_json)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

const TENANT_COLUMNS: &str = "id, name, kind, timezone, display_name, tone, locale,
                              business_hours_json, address, payment_methods_json";

fn row_to_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let name: String = row.try_get("name").map_err(decode_err)?;
    let kind: String = row.try_get("kind").map_err(decode_err)?;
    let timezone: String = row.try_get("timezone").map_err(decode_err)?;
    let display_name: String = row.try_get("display_name").map_err(decode_err)?;
    let tone: String = row.try_get("tone").map_err(decode_err)?;
    let locale: String = row.try_get("locale").map_err(decode_err)?;
    let hours_json: String = row.try_get("business_hours_json").map_err(decode_err)?;
    let address: Option<String> = row.try_get("address").map_err(decode_err)?;
    let payment_json: String = row.try_get("payment_methods_json").map_err(decode_err)?;

    let business_hours: BusinessHours = serde_json::from_str(&hours_json).map_err(decode_err)?;
    let payment_methods: Vec<String> = serde_json::from_str(&payment_json).map_err(decode_err)?;

    Ok(Tenant {
        id: TenantId(id),
        name,
        kind: TenantKind::parse(&kind),
        timezone,
        voice: TenantVoice { display_name, tone, locale: Locale::parse(&locale) },
        business_hours,
        address,
        payment_methods,
    })
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenant WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_tenant(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM tenant ORDER BY name ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_tenant).collect::<Result<Vec<_>, _>>()
    }
}
