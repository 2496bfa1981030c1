//! User management (admin only).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use belgrano_tickets_core::{Email, Role, UserId};

use crate::db::users::{NewUser, UserChanges};
use crate::db::{RepositoryError, TicketRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::auth::{hash_password, validate_password};
use crate::state::AppState;

use super::extract::{JsonOrForm, non_blank};

/// Username that can never be deleted.
const PROTECTED_USERNAME: &str = "admin";

/// New user form.
#[derive(Debug, Deserialize)]
pub struct CreateUserForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub nombre: Option<String>,
}

/// Edit user form. Missing fields keep their current value.
#[derive(Debug, Deserialize)]
pub struct EditUserForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub nombre: Option<String>,
    /// New password; blank keeps the current one.
    pub password: Option<String>,
    /// Checkbox (`on`) from forms, boolean from JSON.
    pub activo: Option<Value>,
}

fn parse_email(s: &str) -> Result<Email, AppError> {
    Email::parse(s).map_err(|_| AppError::BadRequest("Email inválido".to_string()))
}

fn parse_role(s: &str) -> Result<Role, AppError> {
    s.parse()
        .map_err(|_| AppError::BadRequest(format!("Rol inválido: {s}")))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "on" | "true" | "1" | "si" | "sí"
        ),
        _ => false,
    }
}

fn duplicate(e: RepositoryError) -> AppError {
    match e {
        RepositoryError::Conflict(_) => {
            AppError::Conflict("El nombre de usuario o email ya existe".to_string())
        }
        RepositoryError::NotFound => AppError::NotFound("Usuario no encontrado".to_string()),
        other => other.into(),
    }
}

/// GET /usuarios
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let usuarios = UserRepository::new(state.pool()).list_all().await?;
    Ok(Json(json!({
        "total": usuarios.len(),
        "usuarios": usuarios,
    })))
}

/// POST /usuarios
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonOrForm(form): JsonOrForm<CreateUserForm>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (Some(username), Some(email), Some(password), Some(role), Some(nombre)) = (
        non_blank(form.username.as_deref()),
        non_blank(form.email.as_deref()),
        non_blank(form.password.as_deref()),
        non_blank(form.role.as_deref()),
        non_blank(form.nombre.as_deref()),
    ) else {
        return Err(AppError::BadRequest(
            "Todos los campos son requeridos".to_string(),
        ));
    };

    let email = parse_email(email)?;
    let role = parse_role(role)?;
    validate_password(password)?;

    let user = UserRepository::new(state.pool())
        .create(&NewUser {
            username: username.to_string(),
            email,
            password_hash: hash_password(password)?,
            role,
            nombre: nombre.to_string(),
            activo: true,
        })
        .await
        .map_err(duplicate)?;

    info!(user_id = %user.id, role = %user.role, admin_id = %admin.id, "User created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "exito": true,
            "mensaje": format!("Usuario {} creado correctamente", user.username),
            "usuario": user,
        })),
    ))
}

/// POST /usuarios/{id}/editar
pub async fn edit(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    JsonOrForm(form): JsonOrForm<EditUserForm>,
) -> Result<Json<Value>, AppError> {
    let users = UserRepository::new(state.pool());
    let id = UserId::new(id);
    let current = users
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

    let changes = UserChanges {
        username: non_blank(form.username.as_deref()).map_or(current.username, String::from),
        email: non_blank(form.email.as_deref())
            .map(parse_email)
            .transpose()?
            .unwrap_or(current.email),
        role: non_blank(form.role.as_deref())
            .map(parse_role)
            .transpose()?
            .unwrap_or(current.role),
        nombre: non_blank(form.nombre.as_deref()).map_or(current.nombre, String::from),
        activo: form.activo.as_ref().map_or(current.activo, truthy),
    };

    let password_hash = match non_blank(form.password.as_deref()) {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let user = users.update(id, &changes).await.map_err(duplicate)?;
    if let Some(hash) = password_hash {
        users.set_password_hash(id, &hash).await?;
    }

    info!(user_id = %user.id, admin_id = %admin.id, activo = user.activo, "User updated");
    Ok(Json(json!({
        "exito": true,
        "mensaje": "Usuario actualizado correctamente",
        "usuario": user,
    })))
}

/// POST /usuarios/{id}/eliminar
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let users = UserRepository::new(state.pool());
    let id = UserId::new(id);
    let user = users
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Usuario no encontrado".to_string()))?;

    if user.username == PROTECTED_USERNAME {
        return Err(AppError::BadRequest(
            "No se puede eliminar el usuario admin".to_string(),
        ));
    }
    let assigned = TicketRepository::new(state.pool())
        .count_assigned_to(id)
        .await?;
    if assigned > 0 {
        return Err(AppError::BadRequest(format!(
            "El usuario tiene {assigned} tickets asignados"
        )));
    }

    users.delete(id).await.map_err(duplicate)?;
    info!(user_id = %id, admin_id = %admin.id, "User deleted");
    Ok(Json(json!({
        "exito": true,
        "mensaje": "Usuario eliminado correctamente",
    })))
}
