//! Server-sent ticket events.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::middleware::RequireUser;
use crate::models::CurrentUser;
use crate::services::TicketEvent;
use crate::state::AppState;

/// Couriers only hear about new tickets handed to them; every other event
/// carries ids only.
fn is_visible(event: &TicketEvent, user: &CurrentUser) -> bool {
    match event {
        TicketEvent::NuevoTicket { repartidor, .. } => {
            user.is_admin() || repartidor.as_deref() == Some(user.nombre.as_str())
        }
        TicketEvent::TicketAsignado { repartidor_id, .. } => {
            user.is_admin() || *repartidor_id == user.id
        }
        TicketEvent::TicketActualizado { .. } | TicketEvent::TicketEliminado { .. } => true,
    }
}

/// GET /api/events
pub async fn stream(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events().subscribe();
    debug!(user_id = %user.id, "Event stream opened");

    let events = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !is_visible(&event, &user) {
                        continue;
                    }
                    let data = serde_json::to_string(&event).unwrap_or_else(|_| {
                        r#"{"type":"error","message":"Failed to serialize event"}"#.to_string()
                    });
                    yield Ok(Event::default().event(event.name()).data(data));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user.id, skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use belgrano_tickets_core::{Email, Priority, Role, TicketId, UserId};

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(2),
            username: "repartidor1".to_string(),
            email: Email::parse("repartidor1@belgranoahorro.com").unwrap(),
            nombre: "Repartidor 1".to_string(),
            role,
        }
    }

    #[test]
    fn test_courier_event_filtering() {
        let courier = user(Role::Flota);
        let admin = user(Role::Admin);
        let other = TicketEvent::NuevoTicket {
            ticket_id: TicketId::new(1),
            numero: "A".to_string(),
            cliente_nombre: "Ana".to_string(),
            prioridad: Priority::Normal,
            repartidor: Some("Repartidor 2".to_string()),
        };
        let mine = TicketEvent::TicketAsignado {
            ticket_id: TicketId::new(1),
            repartidor_id: UserId::new(2),
            repartidor_nombre: "Repartidor 1".to_string(),
        };

        assert!(!is_visible(&other, &courier));
        assert!(is_visible(&other, &admin));
        assert!(is_visible(&mine, &courier));
        assert!(is_visible(
            &TicketEvent::TicketEliminado {
                ticket_id: TicketId::new(1)
            },
            &courier
        ));
    }
}
