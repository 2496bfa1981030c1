//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use belgrano_tickets_core::{Email, Role, UserId};

/// A panel user: an administrator or a delivery courier.
///
/// The password hash is deliberately not part of this type; it is only
/// read through [`crate::db::UserRepository::get_credentials`].
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login handle (`admin`, `repartidor1`, ...).
    pub username: String,
    /// Email address, used to log in.
    pub email: Email,
    /// Permission level.
    pub role: Role,
    /// Display name.
    pub nombre: String,
    /// Inactive users cannot log in or receive tickets.
    pub activo: bool,
    /// When the user was created.
    pub fecha_creacion: DateTime<Utc>,
}

impl User {
    /// Whether this user can be assigned tickets.
    #[must_use]
    pub fn is_available_courier(&self) -> bool {
        self.activo && self.role == Role::Flota
    }
}
