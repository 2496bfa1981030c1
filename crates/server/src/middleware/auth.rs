//! Authentication extractors.
//!
//! Panel routes use [`RequireUser`] or [`RequireAdmin`]; the `DevOps` surface
//! uses [`RequireDevops`], which is backed by a separate session flag and
//! its own credential pair.

use axum::{
    Json,
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Where unauthenticated browser requests are sent.
pub const LOGIN_PATH: &str = "/login";

/// Rejection for panel extractors.
#[derive(Debug)]
pub enum AuthRejection {
    /// Not logged in, browser request.
    RedirectToLogin,
    /// Not logged in, API request.
    Unauthorized,
    /// Logged in without the required role.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "No autenticado"})),
            )
                .into_response(),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Acceso no permitido"})),
            )
                .into_response(),
        }
    }
}

async fn current_user(parts: &Parts) -> Result<CurrentUser, AuthRejection> {
    // Nested routers see a stripped URI; decide on the path the client sent.
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map_or_else(|| parts.uri.path(), |uri| uri.0.path());
    let not_logged_in = || {
        if path.starts_with("/api/") {
            AuthRejection::Unauthorized
        } else {
            AuthRejection::RedirectToLogin
        }
    };

    let session = parts.extensions.get::<Session>().ok_or_else(not_logged_in)?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .ok_or_else(not_logged_in)
}

/// Extractor that requires a logged-in panel user of any role.
///
/// ```rust,ignore
/// async fn panel(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hola, {}", user.nombre)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts).await.map(Self)
    }
}

/// Extractor that requires a logged-in administrator.
///
/// Logged-in couriers get 403 rather than a redirect.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts).await?;
        if !user.is_admin() {
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(user))
    }
}

/// Rejection for the `DevOps` extractor.
#[derive(Debug)]
pub struct DevopsRejection;

impl IntoResponse for DevopsRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "No autorizado", "code": 401})),
        )
            .into_response()
    }
}

/// Extractor that requires a `DevOps` login.
pub struct RequireDevops;

impl<S> FromRequestParts<S> for RequireDevops
where
    S: Send + Sync,
{
    type Rejection = DevopsRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<Session>().ok_or(DevopsRejection)?;
        let authenticated = session
            .get::<bool>(session_keys::DEVOPS_AUTHENTICATED)
            .await
            .ok()
            .flatten()
            .unwrap_or(false);

        if authenticated {
            Ok(Self)
        } else {
            Err(DevopsRejection)
        }
    }
}

/// Store the logged-in user in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Log out: drop the whole session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Mark the session as `DevOps`-authenticated.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_devops_authenticated(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::DEVOPS_AUTHENTICATED, true).await
}

/// Remove the `DevOps` flag, keeping any panel login.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_devops(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<bool>(session_keys::DEVOPS_AUTHENTICATED)
        .await?;
    Ok(())
}
