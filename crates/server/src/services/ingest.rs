//! Ticket ingestion from the Belgrano Ahorro storefront.
//!
//! Upstream senders are inconsistent about field names (`cliente` vs
//! `cliente_nombre`, `notas` vs `indicaciones`), so the payload is read as
//! loose JSON and normalized here before anything touches the database.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, instrument};

use belgrano_tickets_core::{ClientKind, Money, Priority, TicketId, TicketStatus};

use crate::db::{RepositoryError, TicketRepository};
use crate::models::ProductLine;
use crate::models::ticket::{Courier, NewTicket, Ticket};

/// Payload problems reported back to the sender.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Datos no recibidos")]
    Empty,

    #[error("Productos inválidos: {0}")]
    InvalidProducts(String),

    #[error("Total inválido")]
    InvalidTotal,

    #[error("Estado inválido: {0}")]
    InvalidStatus(String),

    #[error("Prioridad inválida: {0}")]
    InvalidPriority(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of an ingestion call.
#[derive(Debug)]
pub enum IngestOutcome {
    /// A ticket with this number already existed; nothing was written.
    Existing(TicketId),
    /// A new ticket was stored.
    Created(Ticket),
}

/// Normalized ingestion payload.
#[derive(Debug, Clone)]
pub struct Intake {
    /// Explicit order number, if the sender provided one.
    pub numero: Option<String>,
    pub cliente_nombre: String,
    pub cliente_direccion: String,
    pub cliente_telefono: String,
    pub cliente_email: String,
    pub productos: Vec<ProductLine>,
    pub total: Money,
    pub estado: TicketStatus,
    pub prioridad: Priority,
    pub indicaciones: String,
    pub tipo_cliente: ClientKind,
}

/// First non-blank string among `keys`.
fn text(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| payload.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

impl Intake {
    /// Normalize a raw JSON payload.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::Empty` for `null`, non-objects and `{}`.
    /// Returns the matching `Invalid*` variant for malformed products,
    /// totals, states or priorities.
    pub fn from_payload(payload: &Value) -> Result<Self, IngestError> {
        let Some(object) = payload.as_object() else {
            return Err(IngestError::Empty);
        };
        if object.is_empty() {
            return Err(IngestError::Empty);
        }

        let productos: Vec<ProductLine> = match payload.get("productos") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value(raw.clone())
                .map_err(|e| IngestError::InvalidProducts(e.to_string()))?,
        };

        let total = match payload.get("total") {
            None | Some(Value::Null) => productos.iter().map(ProductLine::subtotal).sum(),
            Some(raw) => {
                serde_json::from_value::<Money>(raw.clone()).map_err(|_| IngestError::InvalidTotal)?
            }
        };

        let estado = text(payload, &["estado"])
            .map(|s| s.parse().map_err(|_| IngestError::InvalidStatus(s)))
            .transpose()?
            .unwrap_or_default();

        let tipo_cliente = text(payload, &["tipo_cliente"])
            .map_or(ClientKind::Cliente, |s| ClientKind::from_wire(&s));
        let prioridad = text(payload, &["prioridad"])
            .map(|s| s.parse().map_err(|_| IngestError::InvalidPriority(s)))
            .transpose()?
            .unwrap_or_default();
        let prioridad = if tipo_cliente == ClientKind::Comerciante {
            Priority::Alta
        } else {
            prioridad
        };

        Ok(Self {
            numero: text(payload, &["numero", "numero_pedido"]),
            cliente_nombre: text(payload, &["cliente_nombre", "cliente"])
                .unwrap_or_else(|| "Cliente".to_string()),
            cliente_direccion: text(payload, &["cliente_direccion", "direccion"])
                .unwrap_or_else(|| "Sin dirección".to_string()),
            cliente_telefono: text(payload, &["cliente_telefono", "telefono"])
                .unwrap_or_else(|| "Sin teléfono".to_string()),
            cliente_email: text(payload, &["cliente_email", "email"])
                .unwrap_or_else(|| "sin@email.com".to_string()),
            productos,
            total,
            estado,
            prioridad,
            indicaciones: text(payload, &["indicaciones", "notas"]).unwrap_or_default(),
            tipo_cliente,
        })
    }

    fn into_new_ticket(self, numero: String, courier: Option<Courier>) -> NewTicket {
        NewTicket {
            numero,
            cliente_nombre: self.cliente_nombre,
            cliente_direccion: self.cliente_direccion,
            cliente_telefono: self.cliente_telefono,
            cliente_email: self.cliente_email,
            productos: self.productos,
            total: self.total,
            estado: self.estado,
            prioridad: self.prioridad,
            indicaciones: self.indicaciones,
            courier,
        }
    }
}

/// Order number used when the sender did not provide one.
#[must_use]
pub fn generated_numero(at: DateTime<Utc>) -> String {
    format!("TICKET-{}", at.format("%Y%m%d%H%M%S"))
}

/// Ticket ingestion service.
pub struct IngestService<'a> {
    tickets: TicketRepository<'a>,
}

impl<'a> IngestService<'a> {
    /// Create a new ingestion service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            tickets: TicketRepository::new(pool),
        }
    }

    /// Store a ticket unless one with the same number exists.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::Repository` if the database fails.
    #[instrument(skip(self, intake), fields(numero = ?intake.numero))]
    pub async fn ingest(&self, intake: Intake) -> Result<IngestOutcome, IngestError> {
        if let Some(numero) = &intake.numero
            && let Some(existing) = self.tickets.get_by_numero(numero).await?
        {
            info!(ticket_id = %existing.id, "Duplicate ticket number, returning existing ticket");
            return Ok(IngestOutcome::Existing(existing.id));
        }

        let numero = intake
            .numero
            .clone()
            .unwrap_or_else(|| generated_numero(Utc::now()));
        let courier = self.pick_courier().await?;
        let tipo_cliente = intake.tipo_cliente;
        let new = intake.into_new_ticket(numero.clone(), courier);

        match self.tickets.create(&new).await {
            Ok(ticket) => {
                info!(
                    ticket_id = %ticket.id,
                    numero = %ticket.numero,
                    prioridad = %ticket.prioridad,
                    tipo_cliente = ?tipo_cliente,
                    repartidor = ticket.repartidor_nombre.as_deref().unwrap_or("-"),
                    "Ticket received"
                );
                Ok(IngestOutcome::Created(ticket))
            }
            // A concurrent request stored the same number first.
            Err(RepositoryError::Conflict(_)) => {
                let existing = self
                    .tickets
                    .get_by_numero(&numero)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                Ok(IngestOutcome::Existing(existing.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pick a random active courier, preferring those without an open
    /// `alta` ticket.
    async fn pick_courier(&self) -> Result<Option<Courier>, RepositoryError> {
        let mut candidates = self.tickets.couriers_without_open_priority().await?;
        if candidates.is_empty() {
            candidates = self.tickets.active_couriers().await?;
        }
        Ok(candidates.choose(&mut rand::rng()).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::users::NewUser;
    use crate::db::{UserRepository, create_pool, init_ticket_schema};
    use belgrano_tickets_core::{Email, Role};
    use chrono::TimeZone;
    use secrecy::SecretString;
    use serde_json::json;

    async fn pool() -> SqlitePool {
        let pool = create_pool(&SecretString::from("sqlite::memory:"))
            .await
            .unwrap();
        init_ticket_schema(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_empty_payloads_rejected() {
        assert!(matches!(Intake::from_payload(&Value::Null), Err(IngestError::Empty)));
        assert!(matches!(Intake::from_payload(&json!({})), Err(IngestError::Empty)));
        assert!(matches!(Intake::from_payload(&json!([1])), Err(IngestError::Empty)));
    }

    #[test]
    fn test_field_fallbacks() {
        let intake = Intake::from_payload(&json!({
            "numero_pedido": "PED-9",
            "cliente": "Ana",
            "direccion": "Cabildo 100",
            "notas": "Dejar en portería",
            "productos": [{"nombre": "Leche", "cantidad": 3, "precio": 900}]
        }))
        .unwrap();

        assert_eq!(intake.numero.as_deref(), Some("PED-9"));
        assert_eq!(intake.cliente_nombre, "Ana");
        assert_eq!(intake.cliente_direccion, "Cabildo 100");
        assert_eq!(intake.cliente_telefono, "Sin teléfono");
        assert_eq!(intake.cliente_email, "sin@email.com");
        assert_eq!(intake.indicaciones, "Dejar en portería");
        assert_eq!(intake.total, "2700".parse().unwrap());
        assert_eq!(intake.estado, TicketStatus::Pendiente);
        assert_eq!(intake.prioridad, Priority::Normal);
    }

    #[test]
    fn test_string_and_fractional_quantities_are_accepted() {
        let intake = Intake::from_payload(&json!({
            "productos": [
                {"nombre": "Pan", "cantidad": "2", "precio": 500},
                {"nombre": "Queso", "cantidad": 1.5, "precio": 4000}
            ]
        }))
        .unwrap();

        assert_eq!(intake.total, "7000".parse().unwrap());
        let stored = serde_json::to_value(&intake.productos).unwrap();
        assert_eq!(stored[0]["cantidad"], "2");
        assert_eq!(stored[1]["cantidad"], 1.5);
    }

    #[test]
    fn test_merchant_forces_alta() {
        let intake = Intake::from_payload(&json!({
            "cliente_nombre": "Kiosco",
            "prioridad": "baja",
            "tipo_cliente": "comerciante"
        }))
        .unwrap();
        assert_eq!(intake.prioridad, Priority::Alta);
        assert_eq!(intake.tipo_cliente, ClientKind::Comerciante);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Intake::from_payload(&json!({"estado": "en-camino"})),
            Err(IngestError::InvalidStatus(_))
        ));
        assert!(matches!(
            Intake::from_payload(&json!({"prioridad": "maxima"})),
            Err(IngestError::InvalidPriority(_))
        ));
        assert!(matches!(
            Intake::from_payload(&json!({"productos": "yerba"})),
            Err(IngestError::InvalidProducts(_))
        ));
        assert!(matches!(
            Intake::from_payload(&json!({"total": "mucho"})),
            Err(IngestError::InvalidTotal)
        ));
    }

    #[test]
    fn test_generated_numero_format() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(generated_numero(at), "TICKET-20250102030405");
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent_and_assigns() {
        let pool = pool().await;
        let courier = UserRepository::new(&pool)
            .create(&NewUser {
                username: "repartidor1".to_string(),
                email: Email::parse("repartidor1@belgranoahorro.com").unwrap(),
                password_hash: "x".to_string(),
                role: Role::Flota,
                nombre: "Repartidor 1".to_string(),
                activo: true,
            })
            .await
            .unwrap();
        let service = IngestService::new(&pool);
        let payload = json!({"numero": "PED-1", "cliente_nombre": "Ana"});

        let first = service
            .ingest(Intake::from_payload(&payload).unwrap())
            .await
            .unwrap();
        let IngestOutcome::Created(ticket) = first else {
            panic!("expected a new ticket");
        };
        assert_eq!(ticket.asignado_a, Some(courier.id));
        assert_eq!(ticket.repartidor_nombre.as_deref(), Some("Repartidor 1"));
        assert!(ticket.fecha_asignacion.is_some());

        let second = service
            .ingest(Intake::from_payload(&payload).unwrap())
            .await
            .unwrap();
        assert!(matches!(second, IngestOutcome::Existing(id) if id == ticket.id));
        assert_eq!(TicketRepository::new(&pool).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_without_couriers_leaves_unassigned() {
        let pool = pool().await;
        let outcome = IngestService::new(&pool)
            .ingest(Intake::from_payload(&json!({"cliente": "Ana"})).unwrap())
            .await
            .unwrap();
        let IngestOutcome::Created(ticket) = outcome else {
            panic!("expected a new ticket");
        };
        assert!(ticket.asignado_a.is_none());
        assert!(ticket.numero.starts_with("TICKET-"));
    }
}
