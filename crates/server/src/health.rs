use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use opsdesk_db::DbPool;
use serde::Serialize;

use crate::bootstrap::SharedRuntime;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    runtime: SharedRuntime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub agent: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, runtime: SharedRuntime) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, runtime })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let agent = agent_check(&state.runtime);
    let ready = database.status == "ready" && agent.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "opsdesk-server runtime initialized".to_string(),
        },
        database,
        agent,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

// Never waits on the orchestrator; a held lock just means a turn is running.
fn agent_check(runtime: &SharedRuntime) -> HealthCheck {
    match runtime.try_lock() {
        Ok(runtime) if runtime.registry().is_empty() => {
            HealthCheck { status: "degraded", detail: "no operations registered".to_string() }
        }
        Ok(runtime) => HealthCheck {
            status: "ready",
            detail: format!(
                "{} operations registered, {} turns in conversation",
                runtime.registry().len(),
                runtime.conversation().len()
            ),
        },
        Err(_) => {
            HealthCheck { status: "ready", detail: "conversation turn in progress".to_string() }
        }
    }
}
