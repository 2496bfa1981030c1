//! System settings (admin).

use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

use super::extract::{JsonOrForm, non_blank};

/// Setting write form.
#[derive(Debug, Deserialize)]
pub struct SettingForm {
    #[serde(default)]
    pub clave: String,
    #[serde(default)]
    pub valor: String,
    pub descripcion: Option<String>,
}

/// GET /configuracion
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let settings = SettingsRepository::new(state.pool()).list().await?;
    Ok(Json(json!({
        "total": settings.len(),
        "configuraciones": settings,
    })))
}

/// POST /configuracion
///
/// Creates or overwrites one key. A blank description keeps the stored one.
#[instrument(skip(state, admin, form), fields(user_id = %admin.id, clave = %form.clave))]
pub async fn set(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonOrForm(form): JsonOrForm<SettingForm>,
) -> Result<Json<Value>, AppError> {
    let clave = form.clave.trim();
    if clave.is_empty() {
        return Err(AppError::BadRequest("La clave es requerida".to_string()));
    }

    let setting = SettingsRepository::new(state.pool())
        .set(clave, form.valor.trim(), non_blank(form.descripcion.as_deref()))
        .await?;
    info!("Setting updated");

    Ok(Json(json!({
        "exito": true,
        "configuracion": setting,
    })))
}
