//! Ticket domain types.

use core::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use belgrano_tickets_core::{Money, Priority, TicketId, TicketStatus, UserId};

use super::CurrentUser;

/// One product line of an order.
///
/// Upstream payloads carry extra keys (SKU, `negocio`, `sucursal`, ...);
/// they are kept verbatim in `extra` so a stored ticket returns exactly
/// what was ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub cantidad: Quantity,
    #[serde(default)]
    pub precio: Money,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Product quantity as sent by the storefront.
///
/// Accepts `2`, `1.5` or `"2"`. The received JSON value is what gets stored
/// and returned; totals use the decimal reading. Missing or `null` means one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Quantity {
    raw: Value,
    #[serde(skip)]
    amount: Decimal,
}

impl Quantity {
    /// Read a JSON value as a quantity.
    ///
    /// # Errors
    ///
    /// Returns a message for non-numeric or negative values.
    pub fn from_value(raw: Value) -> Result<Self, String> {
        let amount = match &raw {
            Value::Null => return Ok(Self::default()),
            Value::Number(n) => {
                let text = n.to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .ok()
            }
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        };
        match amount {
            Some(amount) if !amount.is_sign_negative() => Ok(Self { raw, amount }),
            _ => Err(format!("cantidad inválida: {raw}")),
        }
    }

    /// Decimal value used for subtotals.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::from(1_u32)
    }
}

impl From<u32> for Quantity {
    fn from(n: u32) -> Self {
        Self {
            raw: Value::from(n),
            amount: Decimal::from(n),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.amount.normalize())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::from_value(Value::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }
}

impl ProductLine {
    /// `precio * cantidad`.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.precio.times(self.cantidad.amount())
    }

    /// Human label for an extra attribute such as `negocio` or `sucursal`.
    ///
    /// Accepts a plain string, a number, or an object with a `nombre` key.
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<String> {
        match self.extra.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(obj) => obj
                .get("nombre")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            _ => None,
        }
    }
}

/// A delivery ticket.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: TicketId,
    /// Unique order number (`TICKET-20250101120000` when generated locally).
    pub numero: String,
    pub cliente_nombre: String,
    pub cliente_direccion: String,
    pub cliente_telefono: String,
    pub cliente_email: String,
    pub productos: Vec<ProductLine>,
    pub total: Money,
    pub estado: TicketStatus,
    pub prioridad: Priority,
    /// Free-text delivery instructions.
    pub indicaciones: String,
    /// Courier the ticket is assigned to, if any.
    pub asignado_a: Option<UserId>,
    /// Courier display name at assignment time.
    pub repartidor_nombre: Option<String>,
    pub fecha_creacion: DateTime<Utc>,
    pub fecha_asignacion: Option<DateTime<Utc>>,
    /// Stamped whenever the status is set to `entregado`.
    pub fecha_entrega: Option<DateTime<Utc>>,
    /// Courier notes, one timestamped entry per line.
    pub notas_repartidor: String,
}

impl Ticket {
    /// Admins see every ticket; couriers only their own.
    #[must_use]
    pub fn is_visible_to(&self, user: &CurrentUser) -> bool {
        user.is_admin() || self.asignado_a == Some(user.id)
    }

    /// Sum of product subtotals.
    #[must_use]
    pub fn products_total(&self) -> Money {
        self.productos.iter().map(ProductLine::subtotal).sum()
    }
}

/// Data for inserting a ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub numero: String,
    pub cliente_nombre: String,
    pub cliente_direccion: String,
    pub cliente_telefono: String,
    pub cliente_email: String,
    pub productos: Vec<ProductLine>,
    pub total: Money,
    pub estado: TicketStatus,
    pub prioridad: Priority,
    pub indicaciones: String,
    pub courier: Option<Courier>,
}

/// Assignment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Courier {
    pub id: UserId,
    pub nombre: String,
}

/// Partial update applied from the panel.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub estado: Option<TicketStatus>,
    pub prioridad: Option<Priority>,
    /// `Some("")` clears the instructions.
    pub indicaciones: Option<String>,
}

impl TicketUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.estado.is_none() && self.prioridad.is_none() && self.indicaciones.is_none()
    }
}

/// One timestamped courier note line: `YYYY-MM-DD HH:MM: <note>`.
#[must_use]
pub fn note_line(note: &str, at: DateTime<Utc>) -> String {
    format!("{}: {}", at.format("%Y-%m-%d %H:%M"), note.trim())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_product_line_defaults_and_extra() {
        let line: ProductLine = serde_json::from_value(serde_json::json!({
            "nombre": "Yerba 1kg",
            "precio": 2500.5,
            "negocio": {"id": 3, "nombre": "Almacén Centro"},
            "sku": "YB-1"
        }))
        .unwrap();

        assert_eq!(line.cantidad.amount(), Decimal::ONE);
        assert_eq!(line.subtotal(), "2500.5".parse().unwrap());
        assert_eq!(line.detail("negocio").as_deref(), Some("Almacén Centro"));
        assert_eq!(line.detail("sucursal"), None);
        assert_eq!(line.extra.get("sku"), Some(&serde_json::json!("YB-1")));
    }

    #[test]
    fn test_product_line_reserializes_extra_keys() {
        let input = serde_json::json!({"nombre": "Pan", "cantidad": 2, "precio": 100, "sucursal": "Norte"});
        let line: ProductLine = serde_json::from_value(input).unwrap();
        let out = serde_json::to_value(&line).unwrap();
        assert_eq!(out["sucursal"], "Norte");
        assert_eq!(out["cantidad"], 2);
    }

    #[test]
    fn test_quantity_accepts_strings_and_decimals_and_keeps_raw_value() {
        let lines: Vec<ProductLine> = serde_json::from_value(serde_json::json!([
            {"nombre": "Pan", "cantidad": "2", "precio": 100},
            {"nombre": "Queso", "cantidad": 1.5, "precio": "1000"},
            {"nombre": "Sal", "cantidad": null, "precio": 50}
        ]))
        .unwrap();

        assert_eq!(lines[0].subtotal(), "200".parse().unwrap());
        assert_eq!(lines[1].subtotal(), "1500".parse().unwrap());
        assert_eq!(lines[2].cantidad.amount(), Decimal::ONE);
        assert_eq!(lines[1].cantidad.to_string(), "1.5");

        let out = serde_json::to_value(&lines).unwrap();
        assert_eq!(out[0]["cantidad"], "2");
        assert_eq!(out[1]["cantidad"], 1.5);
    }

    #[test]
    fn test_quantity_rejects_non_numeric_and_negative() {
        for bad in [
            serde_json::json!("dos"),
            serde_json::json!(-1),
            serde_json::json!(true),
            serde_json::json!({"n": 1}),
        ] {
            assert!(Quantity::from_value(bad.clone()).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_note_line_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).unwrap();
        assert_eq!(
            note_line(" Cliente ausente ", at),
            "2025-03-14 09:05: Cliente ausente"
        );
    }

    #[test]
    fn test_ticket_update_is_empty() {
        assert!(TicketUpdate::default().is_empty());
        let update = TicketUpdate {
            indicaciones: Some(String::new()),
            ..TicketUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
