//! `DevOps` panel: login, monitoring and manual sync.
//!
//! The panel has its own credential pair from configuration and a separate
//! session flag, independent of panel users.

use axum::{Json, extract::State};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use subtle::ConstantTimeEq;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::db::CatalogRepository;
use crate::error::AppError;
use crate::middleware::{RequireDevops, clear_devops, set_devops_authenticated};
use crate::state::AppState;

use super::extract::JsonOrForm;
use super::health::VERSION;

/// Catalog endpoints listed by the health document.
const ENDPOINTS: [&str; 8] = [
    "/api/devops/negocios",
    "/api/devops/productos",
    "/api/devops/ofertas",
    "/api/devops/precios",
    "/api/devops/sucursales",
    "/api/devops/categorias",
    "/devops/sync",
    "/devops/health",
];

/// `DevOps` login form.
#[derive(Debug, Deserialize)]
pub struct DevopsLoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn ct_eq(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// POST /devops/login
#[instrument(skip_all, fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonOrForm(form): JsonOrForm<DevopsLoginForm>,
) -> Result<Json<Value>, AppError> {
    let devops = &state.config().devops;
    // Evaluate both comparisons so timing does not reveal which one failed.
    let user_ok = ct_eq(form.username.trim(), &devops.username);
    let pass_ok = ct_eq(&form.password, devops.password.expose_secret());

    if !(user_ok & pass_ok) {
        warn!("DevOps login failed");
        return Err(AppError::Unauthorized("Credenciales inválidas".to_string()));
    }

    set_devops_authenticated(&session).await?;
    info!("DevOps login");
    Ok(Json(json!({
        "status": "success",
        "message": "Login exitoso",
    })))
}

/// GET /devops/logout
///
/// Only the `DevOps` flag is dropped; a panel login in the same session
/// survives.
pub async fn logout(session: Session) -> Result<Json<Value>, AppError> {
    clear_devops(&session).await?;
    info!("DevOps logout");
    Ok(Json(json!({
        "status": "success",
        "message": "Logout exitoso",
    })))
}

/// GET /devops/health (public)
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "DevOps API funcionando correctamente",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION,
        "endpoints": ENDPOINTS,
    }))
}

/// GET /devops/status
pub async fn status(
    State(state): State<AppState>,
    _devops: RequireDevops,
) -> Result<Json<Value>, AppError> {
    let counts = CatalogRepository::new(state.catalog_pool()).counts().await?;
    let config = state.config();

    Ok(Json(json!({
        "status": "success",
        "data": {
            "timestamp": Utc::now().to_rfc3339(),
            "services": {
                "web_server": "running",
                "database": "connected",
                "api_client": "active",
            },
            "catalog": counts,
            "configuration": {
                "belgrano_ahorro_url": config.ahorro.base_url,
                "api_prefix": config.ahorro.api_prefix,
                "api_key_configured": !config.ahorro.api_key.expose_secret().is_empty(),
                "timeout_seconds": config.ahorro.timeout.as_secs(),
            },
        },
    })))
}

/// GET /devops/info
pub async fn info(_devops: RequireDevops) -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Información del sistema DevOps",
        "data": {
            "service": "Belgrano Tickets DevOps",
            "version": VERSION,
            "description": "Gestión del catálogo y sincronización con Belgrano Ahorro",
            "features": [
                "Monitoreo de salud del sistema",
                "Gestión de negocios, productos, sucursales y ofertas",
                "Historial de precios",
                "Sincronización con API externa",
            ],
            "endpoints": ENDPOINTS,
        },
    }))
}

fn counted(count: i64, what: &str) -> Value {
    json!({
        "status": "success",
        "count": count,
        "message": format!("{count} {what} disponibles"),
    })
}

/// Overall outcome of a set of checks.
fn overall(checks: &[&Value]) -> &'static str {
    let ok = checks.iter().filter(|c| c["status"] == "success").count();
    if ok == checks.len() {
        "success"
    } else if ok > 0 {
        "partial"
    } else {
        "error"
    }
}

/// POST /devops/sync
#[instrument(skip_all)]
pub async fn sync(
    State(state): State<AppState>,
    _devops: RequireDevops,
) -> Json<Value> {
    let counts = CatalogRepository::new(state.catalog_pool()).counts().await;
    let (ofertas, negocios) = match counts {
        Ok(c) => (counted(c.ofertas, "ofertas"), counted(c.negocios, "negocios")),
        Err(e) => {
            let message = e.to_string();
            warn!(error = %message, "Catalog counts failed");
            let failed = json!({"status": "error", "error": message});
            (failed.clone(), failed)
        }
    };

    let ahorro = if state.ahorro().is_healthy().await {
        json!({"status": "success", "url": state.ahorro().base_url()})
    } else {
        json!({"status": "error", "url": state.ahorro().base_url()})
    };

    let overall_status = overall(&[&ofertas, &negocios, &ahorro]);
    info!(overall_status, "DevOps sync finished");

    Json(json!({
        "status": "success",
        "message": "Sincronización completada",
        "data": {
            "timestamp": Utc::now().to_rfc3339(),
            "ofertas": ofertas,
            "negocios": negocios,
            "ahorro_api": ahorro,
            "overall_status": overall_status,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status() {
        let ok = json!({"status": "success"});
        let bad = json!({"status": "error"});
        assert_eq!(overall(&[&ok, &ok]), "success");
        assert_eq!(overall(&[&ok, &bad]), "partial");
        assert_eq!(overall(&[&bad, &bad]), "error");
    }
}
