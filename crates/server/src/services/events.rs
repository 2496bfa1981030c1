//! In-process ticket event broadcasting.
//!
//! Handlers publish after a successful write; every connected
//! `/api/events` client receives a copy. Slow clients that fall behind the
//! channel capacity skip the missed events rather than blocking publishers.

use serde::Serialize;
use tokio::sync::broadcast;

use belgrano_tickets_core::{Priority, TicketId, TicketStatus, UserId};

use crate::models::Ticket;

/// Events buffered per subscriber before lagging.
const CHANNEL_CAPACITY: usize = 64;

/// A change to the ticket list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketEvent {
    NuevoTicket {
        ticket_id: TicketId,
        numero: String,
        cliente_nombre: String,
        prioridad: Priority,
        repartidor: Option<String>,
    },
    TicketActualizado {
        ticket_id: TicketId,
        estado: TicketStatus,
        prioridad: Priority,
    },
    TicketAsignado {
        ticket_id: TicketId,
        repartidor_id: UserId,
        repartidor_nombre: String,
    },
    TicketEliminado {
        ticket_id: TicketId,
    },
}

impl TicketEvent {
    /// SSE `event:` name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NuevoTicket { .. } => "nuevo_ticket",
            Self::TicketActualizado { .. } => "ticket_actualizado",
            Self::TicketAsignado { .. } => "ticket_asignado",
            Self::TicketEliminado { .. } => "ticket_eliminado",
        }
    }

    /// `nuevo_ticket` for a freshly stored ticket.
    #[must_use]
    pub fn created(ticket: &Ticket) -> Self {
        Self::NuevoTicket {
            ticket_id: ticket.id,
            numero: ticket.numero.clone(),
            cliente_nombre: ticket.cliente_nombre.clone(),
            prioridad: ticket.prioridad,
            repartidor: ticket.repartidor_nombre.clone(),
        }
    }

    /// `ticket_actualizado` after a status/priority change.
    #[must_use]
    pub const fn updated(ticket: &Ticket) -> Self {
        Self::TicketActualizado {
            ticket_id: ticket.id,
            estado: ticket.estado,
            prioridad: ticket.prioridad,
        }
    }
}

/// Fan-out channel for [`TicketEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TicketEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send an event to every current subscriber.
    ///
    /// Having no subscribers is normal and not an error.
    pub fn publish(&self, event: TicketEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "Event published"),
            Err(_) => tracing::trace!(event = name, "No event subscribers"),
        }
    }

    /// Start receiving events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(TicketEvent::TicketEliminado {
            ticket_id: TicketId::new(7),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "ticket_eliminado");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"type": "ticket_eliminado", "ticket_id": 7})
        );
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        EventBus::new().publish(TicketEvent::TicketEliminado {
            ticket_id: TicketId::new(1),
        });
    }
}
