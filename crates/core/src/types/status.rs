//! Roles, ticket states, and other closed vocabularies.
//!
//! All of these travel as lowercase Spanish strings on the wire and in the
//! database (`"en_proceso"`, `"flota"`), so each enum has a `snake_case`
//! serde/sqlx representation plus `Display` and `FromStr`.

use serde::{Deserialize, Serialize};

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlite", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access: every ticket, reports, user management.
    Admin,
    /// Delivery courier. Sees only tickets assigned to them.
    Flota,
}

impl Role {
    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Flota => "flota",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "flota" => Ok(Self::Flota),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Delivery lifecycle state of a ticket.
///
/// `Pendiente` is the initial state; `Entregado` and `Cancelado` are
/// conventionally terminal. Transitions between any two states are
/// accepted: the panel lets staff correct mistakes (e.g. re-open a ticket
/// marked delivered by accident), so predecessor state is not checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlite", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlite", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Pendiente,
    EnProceso,
    Entregado,
    Cancelado,
}

impl TicketStatus {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Pendiente,
        Self::EnProceso,
        Self::Entregado,
        Self::Cancelado,
    ];

    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pendiente => "pendiente",
            Self::EnProceso => "en_proceso",
            Self::Entregado => "entregado",
            Self::Cancelado => "cancelado",
        }
    }

    /// Whether the ticket no longer needs courier attention.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Entregado | Self::Cancelado)
    }

    /// Whether moving into this state stamps the delivery timestamp.
    #[must_use]
    pub const fn stamps_delivery(&self) -> bool {
        matches!(self, Self::Entregado)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(Self::Pendiente),
            "en_proceso" => Ok(Self::EnProceso),
            "entregado" => Ok(Self::Entregado),
            "cancelado" => Ok(Self::Cancelado),
            _ => Err(format!("invalid ticket status: {s}")),
        }
    }
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlite", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlite", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Baja,
    #[default]
    Normal,
    Alta,
    Urgente,
}

impl Priority {
    /// Wire/database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Baja => "baja",
            Self::Normal => "normal",
            Self::Alta => "alta",
            Self::Urgente => "urgente",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baja" => Ok(Self::Baja),
            "normal" => Ok(Self::Normal),
            "alta" => Ok(Self::Alta),
            "urgente" => Ok(Self::Urgente),
            _ => Err(format!("invalid priority: {s}")),
        }
    }
}

/// Kind of customer that placed an order upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    #[default]
    Cliente,
    /// Merchant orders are always dispatched with high priority.
    Comerciante,
}

impl ClientKind {
    /// Lenient parse: anything that is not `comerciante` is a regular customer.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("comerciante") {
            Self::Comerciante
        } else {
            Self::Cliente
        }
    }
}

/// Catalog entity that can carry an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Business,
    Branch,
    Product,
}

impl EntityType {
    /// Every entity type.
    pub const ALL: [Self; 3] = [Self::Business, Self::Branch, Self::Product];

    /// Path segment / form value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Branch => "branch",
            Self::Product => "product",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business" => Ok(Self::Business),
            "branch" => Ok(Self::Branch),
            "product" => Ok(Self::Product),
            _ => Err(format!("invalid entity type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_status_string_roundtrip() {
        for status in TicketStatus::ALL {
            assert_eq!(status.as_str().parse::<TicketStatus>(), Ok(status));
        }
        assert!("en-camino".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn test_ticket_status_serde_matches_display() {
        let json = serde_json::to_string(&TicketStatus::EnProceso).unwrap_or_default();
        assert_eq!(json, "\"en_proceso\"");
    }

    #[test]
    fn test_only_entregado_stamps_delivery() {
        let stamping: Vec<_> = TicketStatus::ALL
            .into_iter()
            .filter(TicketStatus::stamps_delivery)
            .collect();
        assert_eq!(stamping, vec![TicketStatus::Entregado]);
    }

    #[test]
    fn test_closed_states() {
        assert!(TicketStatus::Entregado.is_closed());
        assert!(TicketStatus::Cancelado.is_closed());
        assert!(!TicketStatus::Pendiente.is_closed());
        assert!(!TicketStatus::EnProceso.is_closed());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(TicketStatus::default(), TicketStatus::Pendiente);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("flota".parse::<Role>(), Ok(Role::Flota));
        assert!("super_admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_client_kind_from_wire() {
        assert_eq!(ClientKind::from_wire("comerciante"), ClientKind::Comerciante);
        assert_eq!(ClientKind::from_wire(" Comerciante "), ClientKind::Comerciante);
        assert_eq!(ClientKind::from_wire("cliente"), ClientKind::Cliente);
        assert_eq!(ClientKind::from_wire(""), ClientKind::Cliente);
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!("branch".parse::<EntityType>(), Ok(EntityType::Branch));
        assert!("sucursal".parse::<EntityType>().is_err());
    }
}
