//! Ticket panel handlers.
//!
//! Admins act on every ticket. Couriers only see and modify tickets
//! assigned to them; anything else is a 403.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use belgrano_tickets_core::{Priority, TicketId, TicketStatus, UserId};

use crate::db::{TicketRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::ticket::{Courier, TicketUpdate, note_line};
use crate::models::{CurrentUser, Ticket};
use crate::pdf;
use crate::services::TicketEvent;
use crate::state::AppState;

use super::extract::{JsonOrForm, non_blank};

/// Status/priority/instructions update.
#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
    pub estado: Option<String>,
    pub prioridad: Option<String>,
    pub indicaciones: Option<String>,
}

impl StatusForm {
    fn into_update(self) -> Result<TicketUpdate, AppError> {
        let estado = non_blank(self.estado.as_deref())
            .map(|s| {
                s.parse::<TicketStatus>()
                    .map_err(|_| AppError::BadRequest(format!("Estado inválido: {s}")))
            })
            .transpose()?;
        let prioridad = non_blank(self.prioridad.as_deref())
            .map(|s| {
                s.parse::<Priority>()
                    .map_err(|_| AppError::BadRequest(format!("Prioridad inválida: {s}")))
            })
            .transpose()?;

        Ok(TicketUpdate {
            estado,
            prioridad,
            indicaciones: self.indicaciones,
        })
    }
}

/// Courier assignment.
#[derive(Debug, Deserialize)]
pub struct AssignForm {
    pub repartidor_id: Option<i64>,
}

/// Courier note.
#[derive(Debug, Deserialize)]
pub struct NoteForm {
    #[serde(default)]
    pub nota: String,
}

/// Load a ticket the user may see.
async fn visible_ticket(
    state: &AppState,
    id: i64,
    user: &CurrentUser,
) -> Result<Ticket, AppError> {
    let ticket = TicketRepository::new(state.pool())
        .get_by_id(TicketId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket no encontrado".to_string()))?;

    if !ticket.is_visible_to(user) {
        return Err(AppError::Forbidden(
            "No tenés permiso para acceder a este ticket".to_string(),
        ));
    }
    Ok(ticket)
}

/// GET /panel
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn panel(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Value>, AppError> {
    let tickets = TicketRepository::new(state.pool());

    if user.is_admin() {
        let all = tickets.list_all().await?;
        let repartidores = tickets.active_couriers().await?;
        Ok(Json(json!({
            "usuario": user,
            "total": all.len(),
            "tickets": all,
            "repartidores": repartidores
                .into_iter()
                .map(|c| json!({"id": c.id, "nombre": c.nombre}))
                .collect::<Vec<_>>(),
        })))
    } else {
        let own = tickets.list_for_courier(user.id).await?;
        Ok(Json(json!({
            "usuario": user,
            "total": own.len(),
            "tickets": own,
        })))
    }
}

/// GET /ticket/{id}
pub async fn detail(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Json<Ticket>, AppError> {
    visible_ticket(&state, id, &user).await.map(Json)
}

/// POST /ticket/{id}/estado
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    JsonOrForm(form): JsonOrForm<StatusForm>,
) -> Result<Json<Value>, AppError> {
    let ticket = visible_ticket(&state, id, &user).await?;
    let update = form.into_update()?;

    let ticket = if update.is_empty() {
        ticket
    } else {
        TicketRepository::new(state.pool())
            .update(ticket.id, &update, Utc::now())
            .await?
    };

    info!(ticket_id = %ticket.id, estado = %ticket.estado, prioridad = %ticket.prioridad, "Ticket updated");
    state.events().publish(TicketEvent::updated(&ticket));

    Ok(Json(json!({
        "exito": true,
        "mensaje": "Ticket actualizado correctamente",
    })))
}

/// POST /ticket/{id}/asignar
#[instrument(skip(state, _admin, form))]
pub async fn assign(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
    JsonOrForm(form): JsonOrForm<AssignForm>,
) -> Result<Json<Value>, AppError> {
    let repartidor_id = form
        .repartidor_id
        .ok_or_else(|| AppError::BadRequest("repartidor_id es requerido".to_string()))?;

    let courier = UserRepository::new(state.pool())
        .get_by_id(UserId::new(repartidor_id))
        .await?
        .filter(crate::models::User::is_available_courier)
        .ok_or_else(|| AppError::BadRequest("Repartidor inválido o inactivo".to_string()))?;

    let courier = Courier {
        id: courier.id,
        nombre: courier.nombre,
    };
    let ticket = TicketRepository::new(state.pool())
        .assign(TicketId::new(id), &courier, Utc::now())
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound("Ticket no encontrado".to_string())
            }
            other => other.into(),
        })?;

    info!(ticket_id = %ticket.id, repartidor_id = %courier.id, "Ticket assigned");
    state.events().publish(TicketEvent::TicketAsignado {
        ticket_id: ticket.id,
        repartidor_id: courier.id,
        repartidor_nombre: courier.nombre.clone(),
    });

    Ok(Json(json!({
        "exito": true,
        "mensaje": format!("Ticket asignado a {}", courier.nombre),
    })))
}

/// POST /ticket/{id}/nota
pub async fn add_note(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    JsonOrForm(form): JsonOrForm<NoteForm>,
) -> Result<Json<Value>, AppError> {
    let nota = form.nota.trim();
    if nota.is_empty() {
        return Err(AppError::BadRequest("La nota no puede estar vacía".to_string()));
    }

    let ticket = visible_ticket(&state, id, &user).await?;
    let notes = TicketRepository::new(state.pool())
        .append_note(ticket.id, &note_line(nota, Utc::now()))
        .await?;

    info!(ticket_id = %ticket.id, user_id = %user.id, "Note added");
    Ok(Json(json!({
        "exito": true,
        "mensaje": "Nota agregada correctamente",
        "notas": notes,
    })))
}

/// POST /ticket/{id}/eliminar
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let id = TicketId::new(id);
    TicketRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound("Ticket no encontrado".to_string())
            }
            other => other.into(),
        })?;

    info!(ticket_id = %id, admin_id = %admin.id, "Ticket deleted");
    state
        .events()
        .publish(TicketEvent::TicketEliminado { ticket_id: id });

    Ok(Json(json!({
        "exito": true,
        "mensaje": "Ticket eliminado correctamente",
    })))
}

/// GET /ticket/{id}/pdf
pub async fn pdf(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let ticket = visible_ticket(&state, id, &user).await?;
    let bytes = pdf::render_ticket(&ticket, Utc::now())?;
    let disposition = format!("attachment; filename=\"ticket_{}.pdf\"", ticket.numero);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_form_validation() {
        let update = StatusForm {
            estado: Some("entregado".to_string()),
            prioridad: Some(String::new()),
            indicaciones: Some(String::new()),
        }
        .into_update()
        .unwrap();
        assert_eq!(update.estado, Some(TicketStatus::Entregado));
        assert_eq!(update.prioridad, None);
        assert_eq!(update.indicaciones.as_deref(), Some(""));

        let err = StatusForm {
            estado: Some("en-camino".to_string()),
            ..StatusForm::default()
        }
        .into_update()
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
