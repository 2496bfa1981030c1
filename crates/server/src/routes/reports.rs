//! Admin reports.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::db::TicketRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// GET /reportes
pub async fn reports(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let tickets = TicketRepository::new(state.pool());
    let counts = tickets.status_counts().await?;
    let por_repartidor: serde_json::Map<String, Value> = tickets
        .courier_stats()
        .await?
        .into_iter()
        .map(|c| (c.nombre, json!(c.counts.total)))
        .collect();

    Ok(Json(json!({
        "total_tickets": counts.total,
        "tickets_pendientes": counts.pendientes,
        "tickets_en_proceso": counts.en_proceso,
        "tickets_entregados": counts.entregados,
        "tickets_cancelados": counts.cancelados,
        "tickets_por_repartidor": por_repartidor,
    })))
}

/// GET /gestion_flota
pub async fn fleet(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let repartidores = TicketRepository::new(state.pool()).courier_stats().await?;
    Ok(Json(json!({
        "total_repartidores": repartidores.len(),
        "repartidores": repartidores,
    })))
}
