//! Ticket ingestion endpoint used by the Belgrano Ahorro storefront.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::AppError;
use crate::services::{IngestOutcome, IngestService, Intake, TicketEvent};
use crate::state::AppState;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

fn api_key_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|got| bool::from(got.as_bytes().ct_eq(expected.as_bytes())))
}

/// POST /api/tickets and POST /api/tickets/recibir
///
/// Accepts loose JSON; see [`Intake::from_payload`] for the accepted keys.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if !api_key_matches(&headers, state.config().ahorro.api_key.expose_secret()) {
        warn!("Ticket ingestion rejected: invalid API key");
        return Err(AppError::Unauthorized("API key inválida".to_string()));
    }

    let payload: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| AppError::BadRequest("Datos no recibidos".to_string()))?
    };
    let intake = Intake::from_payload(&payload)?;

    match IngestService::new(state.pool()).ingest(intake).await? {
        IngestOutcome::Existing(id) => Ok((
            StatusCode::OK,
            Json(json!({
                "exito": true,
                "ticket_id": id,
                "idempotent": true,
            })),
        )
            .into_response()),
        IngestOutcome::Created(ticket) => {
            state.events().publish(TicketEvent::created(&ticket));
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "exito": true,
                    "ticket_id": ticket.id,
                    "numero": ticket.numero,
                    "repartidor_asignado": ticket.repartidor_nombre,
                })),
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_api_key_matching() {
        let mut headers = HeaderMap::new();
        assert!(!api_key_matches(&headers, "secret"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secreto"));
        assert!(!api_key_matches(&headers, "secret"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(api_key_matches(&headers, "secret"));
    }
}
