//! Panel login, logout and password change.

use axum::{
    Json,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{AppError, set_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

use super::extract::JsonOrForm;

/// Landing page after login.
pub const PANEL_PATH: &str = "/panel";

const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="es">
<head><meta charset="utf-8"><title>Belgrano Tickets</title></head>
<body>
<h1>Belgrano Tickets</h1>
<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Contraseña <input type="password" name="password" required></label>
<button type="submit">Ingresar</button>
</form>
</body>
</html>
"#;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Password change form data.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub password_actual: String,
    #[serde(default)]
    pub password_nuevo: String,
    #[serde(default)]
    pub password_confirmar: String,
}

/// GET /login
pub async fn login_page(session: Session) -> Response {
    let logged_in = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .is_some();
    if logged_in {
        Redirect::to(PANEL_PATH).into_response()
    } else {
        Html(LOGIN_PAGE).into_response()
    }
}

/// POST /login
#[instrument(skip(state, session, form), fields(email = %form.email.trim()))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonOrForm(form): JsonOrForm<LoginForm>,
) -> Result<Json<Value>, AppError> {
    let email = form.email.trim();
    let password = form.password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Email y contraseña son requeridos".to_string(),
        ));
    }

    let user = match AuthService::new(state.pool()).login(email, password).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Login failed");
            return Err(e.into());
        }
    };

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current).await?;
    set_sentry_user(user.id.as_i64(), user.email.as_str());
    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(json!({
        "exito": true,
        "redirect": PANEL_PATH,
        "usuario": current,
    })))
}

/// GET /logout
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = clear_current_user(&session).await {
        warn!(error = %e, "Failed to clear session on logout");
    }
    Redirect::to(crate::middleware::auth::LOGIN_PATH)
}

/// POST /cambiar_password
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonOrForm(form): JsonOrForm<ChangePasswordForm>,
) -> Result<Json<Value>, AppError> {
    if form.password_actual.is_empty()
        || form.password_nuevo.is_empty()
        || form.password_confirmar.is_empty()
    {
        return Err(AppError::BadRequest(
            "Todos los campos son requeridos".to_string(),
        ));
    }

    AuthService::new(state.pool())
        .change_password(
            user.id,
            &form.password_actual,
            &form.password_nuevo,
            &form.password_confirmar,
        )
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                AppError::BadRequest("La contraseña actual es incorrecta".to_string())
            }
            other => other.into(),
        })?;

    Ok(Json(json!({
        "exito": true,
        "mensaje": "Contraseña actualizada correctamente",
    })))
}
