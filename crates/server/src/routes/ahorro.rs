//! Proxy endpoints to the Belgrano Ahorro API.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::db::TicketRepository;
use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::Ticket;
use crate::state::AppState;

use super::extract::non_blank;

/// Product listing filter.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub categoria: Option<String>,
}

/// Order status update body.
#[derive(Debug, Deserialize)]
pub struct EstadoBody {
    pub estado: Option<String>,
}

/// Wire shape of a ticket pushed upstream.
fn sync_payload(ticket: &Ticket) -> Value {
    json!({
        "numero_pedido": ticket.numero,
        "ticket_id": ticket.id,
        "estado": ticket.estado,
        "repartidor": ticket.repartidor_nombre,
        "fecha_creacion": ticket.fecha_creacion.to_rfc3339(),
        "datos_completos": ticket,
    })
}

/// GET /api/ahorro/productos
pub async fn productos(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<ProductQuery>,
) -> Json<Value> {
    let productos = state
        .ahorro()
        .get_productos(non_blank(query.categoria.as_deref()))
        .await;
    Json(json!({
        "status": "success",
        "productos": productos,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/ahorro/pedido/{numero}
pub async fn pedido(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    Path(numero): Path<String>,
) -> Result<Json<Value>, AppError> {
    let pedido = state
        .ahorro()
        .get_pedido(&numero)
        .await
        .ok_or_else(|| AppError::NotFound("Pedido no encontrado".to_string()))?;
    Ok(Json(json!({
        "status": "success",
        "pedido": pedido,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// PUT /api/ahorro/pedido/{numero}/estado
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn actualizar_estado(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(numero): Path<String>,
    Json(body): Json<EstadoBody>,
) -> Result<Json<Value>, AppError> {
    let estado = non_blank(body.estado.as_deref())
        .ok_or_else(|| AppError::BadRequest("Estado requerido".to_string()))?;

    if !state.ahorro().actualizar_estado_pedido(&numero, estado).await {
        return Err(AppError::Upstream(
            "No se pudo actualizar el estado".to_string(),
        ));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("Estado actualizado a {estado}"),
        "numero_pedido": numero,
        "estado": estado,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// POST /api/ahorro/sync/tickets
#[instrument(skip_all)]
pub async fn sync_tickets(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let tickets = TicketRepository::new(state.pool()).list_all().await?;
    let payload: Vec<Value> = tickets.iter().map(sync_payload).collect();

    if !state.ahorro().sync_tickets(&payload).await {
        return Err(AppError::Upstream("Error en la sincronización".to_string()));
    }
    info!(count = payload.len(), "Tickets synced to Belgrano Ahorro");
    Ok(Json(json!({
        "status": "success",
        "message": format!("{} tickets sincronizados", payload.len()),
        "tickets_synced": payload.len(),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// GET /api/ahorro/test
pub async fn test_connection(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Json<Value> {
    let health = state.ahorro().health_check().await;
    let productos = state.ahorro().get_productos(None).await;
    Json(json!({
        "status": "success",
        "api_url": state.ahorro().base_url(),
        "health": health,
        "productos_count": productos.len(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
