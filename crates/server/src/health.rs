use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use mostrador_db::DbPool;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ready = database_reachable(&state.db_pool).await;

    let payload = HealthResponse {
        status: if database_ready { "ok" } else { "degraded" },
        database: if database_ready { "ok" } else { "unreachable" },
        version: env!("CARGO_PKG_VERSION"),
    };

    let status_code = if database_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_reachable(pool: &DbPool) -> bool {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => true,
        Err(error) => {
            warn!(
                event_name = "system.health.database_unreachable",
                error = %error,
                "health probe failed"
            );
            false
        }
    }
}
