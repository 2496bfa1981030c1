//! Health endpoints.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::error;

use crate::db::{TicketRepository, UserRepository};
use crate::state::AppState;

/// Reported service version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /health
///
/// Counts both tables and probes the Belgrano Ahorro API. The Ahorro status
/// never fails this check.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let counts = async {
        let tickets = TicketRepository::new(state.pool()).count().await?;
        let users = UserRepository::new(state.pool()).count().await?;
        Ok::<_, crate::db::RepositoryError>((tickets, users))
    }
    .await;

    match counts {
        Ok((total_tickets, total_usuarios)) => {
            let ahorro = state.ahorro().health_check().await;
            let ahorro_status = ahorro
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            (
                StatusCode::OK,
                Json(json!({
                    "status": "healthy",
                    "service": "Belgrano Tickets",
                    "timestamp": Utc::now().to_rfc3339(),
                    "database": "connected",
                    "ahorro_api": ahorro_status,
                    "total_tickets": total_tickets,
                    "total_usuarios": total_usuarios,
                    "version": VERSION,
                })),
            )
        }
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "error": "database unavailable",
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
        }
    }
}

/// GET /health/ready
///
/// Returns 503 if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
