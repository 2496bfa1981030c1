//! Ticket repository.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use belgrano_tickets_core::{Money, Priority, TicketId, TicketStatus, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::ticket::{Courier, NewTicket, ProductLine, Ticket, TicketUpdate};

const TICKET_COLUMNS: &str = "id, numero, cliente_nombre, cliente_direccion, cliente_telefono, \
     cliente_email, productos, total, estado, prioridad, indicaciones, asignado_a, \
     repartidor_nombre, fecha_creacion, fecha_asignacion, fecha_entrega, notas_repartidor";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: i64,
    numero: String,
    cliente_nombre: String,
    cliente_direccion: String,
    cliente_telefono: String,
    cliente_email: String,
    productos: String,
    total: String,
    estado: TicketStatus,
    prioridad: Priority,
    indicaciones: String,
    asignado_a: Option<i64>,
    repartidor_nombre: Option<String>,
    fecha_creacion: DateTime<Utc>,
    fecha_asignacion: Option<DateTime<Utc>>,
    fecha_entrega: Option<DateTime<Utc>>,
    notas_repartidor: String,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = RepositoryError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let productos: Vec<ProductLine> = serde_json::from_str(&row.productos).map_err(|e| {
            RepositoryError::DataCorruption(format!("ticket {} productos: {e}", row.id))
        })?;
        let total: Money = row.total.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("ticket {} total: {e}", row.id))
        })?;

        Ok(Self {
            id: TicketId::new(row.id),
            numero: row.numero,
            cliente_nombre: row.cliente_nombre,
            cliente_direccion: row.cliente_direccion,
            cliente_telefono: row.cliente_telefono,
            cliente_email: row.cliente_email,
            productos,
            total,
            estado: row.estado,
            prioridad: row.prioridad,
            indicaciones: row.indicaciones,
            asignado_a: row.asignado_a.map(UserId::new),
            repartidor_nombre: row.repartidor_nombre,
            fecha_creacion: row.fecha_creacion,
            fecha_asignacion: row.fecha_asignacion,
            fecha_entrega: row.fecha_entrega,
            notas_repartidor: row.notas_repartidor,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CountsRow {
    total: i64,
    pendientes: i64,
    en_proceso: i64,
    entregados: i64,
    cancelados: i64,
}

impl From<CountsRow> for StatusCounts {
    fn from(row: CountsRow) -> Self {
        Self {
            total: row.total,
            pendientes: row.pendientes,
            en_proceso: row.en_proceso,
            entregados: row.entregados,
            cancelados: row.cancelados,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CourierStatsRow {
    id: i64,
    username: String,
    nombre: String,
    #[sqlx(flatten)]
    counts: CountsRow,
}

#[derive(Debug, sqlx::FromRow)]
struct CourierRow {
    id: i64,
    nombre: String,
}

impl From<CourierRow> for Courier {
    fn from(row: CourierRow) -> Self {
        Self {
            id: UserId::new(row.id),
            nombre: row.nombre,
        }
    }
}

// Aggregates shared by the global and per-courier reports.
const COUNT_COLUMNS: &str = r"
    COUNT(t.id) AS total,
    COALESCE(SUM(CASE WHEN t.estado = 'pendiente' THEN 1 ELSE 0 END), 0) AS pendientes,
    COALESCE(SUM(CASE WHEN t.estado = 'en_proceso' THEN 1 ELSE 0 END), 0) AS en_proceso,
    COALESCE(SUM(CASE WHEN t.estado = 'entregado' THEN 1 ELSE 0 END), 0) AS entregados,
    COALESCE(SUM(CASE WHEN t.estado = 'cancelado' THEN 1 ELSE 0 END), 0) AS cancelados
";

// =============================================================================
// Outputs
// =============================================================================

/// Ticket totals by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: i64,
    pub pendientes: i64,
    pub en_proceso: i64,
    pub entregados: i64,
    pub cancelados: i64,
}

/// Ticket totals for one courier.
#[derive(Debug, Clone, Serialize)]
pub struct CourierStats {
    pub id: UserId,
    pub username: String,
    pub nombre: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ticket database operations.
pub struct TicketRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TicketRepository<'a> {
    /// Create a new ticket repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a ticket, assigning it to `new.courier` when present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number already exists.
    pub async fn create(&self, new: &NewTicket) -> Result<Ticket, RepositoryError> {
        let productos = serde_json::to_string(&new.productos)
            .map_err(|e| RepositoryError::DataCorruption(format!("productos: {e}")))?;
        let now = Utc::now();
        let assigned_at = new.courier.as_ref().map(|_| now);

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            INSERT INTO tickets (
                numero, cliente_nombre, cliente_direccion, cliente_telefono, cliente_email,
                productos, total, estado, prioridad, indicaciones,
                asignado_a, repartidor_nombre, fecha_creacion, fecha_asignacion
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(&new.numero)
        .bind(&new.cliente_nombre)
        .bind(&new.cliente_direccion)
        .bind(&new.cliente_telefono)
        .bind(&new.cliente_email)
        .bind(productos)
        .bind(new.total.to_storage())
        .bind(new.estado)
        .bind(new.prioridad)
        .bind(&new.indicaciones)
        .bind(new.courier.as_ref().map(|c| c.id))
        .bind(new.courier.as_ref().map(|c| c.nombre.as_str()))
        .bind(now)
        .bind(assigned_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "ticket number"))?;

        row.try_into()
    }

    /// Get a ticket by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if stored JSON or amounts are invalid.
    pub async fn get_by_id(&self, id: TicketId) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a ticket by its order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_numero(&self, numero: &str) -> Result<Option<Ticket>, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE numero = ?"
        ))
        .bind(numero)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// All tickets, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Ticket>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY fecha_creacion DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Tickets assigned to one courier, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_courier(&self, courier: UserId) -> Result<Vec<Ticket>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE asignado_a = ? \
             ORDER BY fecha_creacion DESC, id DESC"
        ))
        .bind(courier)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Apply a partial update. Setting `entregado` stamps `fecha_entrega`
    /// with `at`, every time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket does not exist.
    pub async fn update(
        &self,
        id: TicketId,
        update: &TicketUpdate,
        at: DateTime<Utc>,
    ) -> Result<Ticket, RepositoryError> {
        let delivered_at = update
            .estado
            .filter(TicketStatus::stamps_delivery)
            .map(|_| at);

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            UPDATE tickets SET
                estado = COALESCE(?, estado),
                prioridad = COALESCE(?, prioridad),
                indicaciones = COALESCE(?, indicaciones),
                fecha_entrega = COALESCE(?, fecha_entrega)
            WHERE id = ?
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(update.estado)
        .bind(update.prioridad)
        .bind(update.indicaciones.as_deref())
        .bind(delivered_at)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Assign a ticket to a courier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket does not exist.
    pub async fn assign(
        &self,
        id: TicketId,
        courier: &Courier,
        at: DateTime<Utc>,
    ) -> Result<Ticket, RepositoryError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r"
            UPDATE tickets
            SET asignado_a = ?, repartidor_nombre = ?, fecha_asignacion = ?
            WHERE id = ?
            RETURNING {TICKET_COLUMNS}
            "
        ))
        .bind(courier.id)
        .bind(&courier.nombre)
        .bind(at)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Append one line to the courier notes and return the new notes.
    ///
    /// The append happens in a single statement, so concurrent notes never
    /// overwrite each other. Trailing whitespace of the existing notes is
    /// dropped before the newline.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket does not exist.
    pub async fn append_note(&self, id: TicketId, line: &str) -> Result<String, RepositoryError> {
        sqlx::query_scalar::<_, String>(
            r"
            UPDATE tickets
            SET notas_repartidor = CASE
                WHEN trim(COALESCE(notas_repartidor, ''), char(32, 9, 10, 13)) = '' THEN ?
                ELSE rtrim(notas_repartidor, char(32, 9, 10, 13)) || char(10) || ?
            END
            WHERE id = ?
            RETURNING notas_repartidor
            ",
        )
        .bind(line)
        .bind(line)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a ticket.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the ticket does not exist.
    pub async fn delete(&self, id: TicketId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count all tickets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Number of tickets currently assigned to a user, in any state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_assigned_to(&self, user: UserId) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets WHERE asignado_a = ?")
                .bind(user)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Totals by status across all tickets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        let row = sqlx::query_as::<_, CountsRow>(&format!(
            "SELECT {COUNT_COLUMNS} FROM tickets t"
        ))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Totals by status for every active courier, including couriers with
    /// no tickets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn courier_stats(&self) -> Result<Vec<CourierStats>, RepositoryError> {
        let rows = sqlx::query_as::<_, CourierStatsRow>(&format!(
            r"
            SELECT u.id, u.username, u.nombre, {COUNT_COLUMNS}
            FROM users u
            LEFT JOIN tickets t ON t.asignado_a = u.id
            WHERE u.role = 'flota' AND u.activo = 1
            GROUP BY u.id, u.username, u.nombre
            ORDER BY u.nombre
            "
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CourierStats {
                id: UserId::new(row.id),
                username: row.username,
                nombre: row.nombre,
                counts: row.counts.into(),
            })
            .collect())
    }

    /// Active couriers that hold no open `alta` ticket.
    ///
    /// Open means neither delivered nor cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn couriers_without_open_priority(&self) -> Result<Vec<Courier>, RepositoryError> {
        let rows = sqlx::query_as::<_, CourierRow>(
            r"
            SELECT u.id, u.nombre
            FROM users u
            WHERE u.role = 'flota' AND u.activo = 1
              AND NOT EXISTS (
                SELECT 1 FROM tickets t
                WHERE t.asignado_a = u.id
                  AND t.prioridad = 'alta'
                  AND t.estado NOT IN ('entregado', 'cancelado')
              )
            ORDER BY u.id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every active courier.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_couriers(&self) -> Result<Vec<Courier>, RepositoryError> {
        let rows = sqlx::query_as::<_, CourierRow>(
            "SELECT id, nombre FROM users WHERE role = 'flota' AND activo = 1 ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::users::NewUser;
    use crate::db::{UserRepository, create_pool, init_ticket_schema};
    use belgrano_tickets_core::{Email, Role};
    use secrecy::SecretString;

    async fn pool() -> SqlitePool {
        let pool = create_pool(&SecretString::from("sqlite::memory:"))
            .await
            .unwrap();
        init_ticket_schema(&pool).await.unwrap();
        pool
    }

    async fn courier(pool: &SqlitePool, username: &str) -> Courier {
        let user = UserRepository::new(pool)
            .create(&NewUser {
                username: username.to_string(),
                email: Email::parse(&format!("{username}@belgranoahorro.com")).unwrap(),
                password_hash: "x".to_string(),
                role: Role::Flota,
                nombre: format!("Repartidor {username}"),
                activo: true,
            })
            .await
            .unwrap();
        Courier {
            id: user.id,
            nombre: user.nombre,
        }
    }

    fn new_ticket(numero: &str) -> NewTicket {
        NewTicket {
            numero: numero.to_string(),
            cliente_nombre: "Ana".to_string(),
            cliente_direccion: "Belgrano 123".to_string(),
            cliente_telefono: "11-5555".to_string(),
            cliente_email: "ana@mail.com".to_string(),
            productos: vec![
                serde_json::from_value(serde_json::json!({"nombre": "Yerba", "cantidad": 2, "precio": 1250.25}))
                    .unwrap(),
            ],
            total: "2500.5".parse().unwrap(),
            estado: TicketStatus::Pendiente,
            prioridad: Priority::Normal,
            indicaciones: "Tocar timbre".to_string(),
            courier: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let pool = pool().await;
        let repo = TicketRepository::new(&pool);

        let created = repo.create(&new_ticket("PED-1")).await.unwrap();
        let loaded = repo.get_by_numero("PED-1").await.unwrap().unwrap();

        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.total, "2500.5".parse().unwrap());
        assert_eq!(loaded.productos, created.productos);
        assert_eq!(loaded.estado, TicketStatus::Pendiente);
        assert!(loaded.asignado_a.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_numero_conflicts() {
        let pool = pool().await;
        let repo = TicketRepository::new(&pool);
        repo.create(&new_ticket("PED-1")).await.unwrap();
        let result = repo.create(&new_ticket("PED-1")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_stamps_delivery_only_for_entregado() {
        let pool = pool().await;
        let repo = TicketRepository::new(&pool);
        let ticket = repo.create(&new_ticket("PED-1")).await.unwrap();
        let now = Utc::now();

        let update = TicketUpdate {
            estado: Some(TicketStatus::EnProceso),
            ..TicketUpdate::default()
        };
        let t = repo.update(ticket.id, &update, now).await.unwrap();
        assert_eq!(t.estado, TicketStatus::EnProceso);
        assert!(t.fecha_entrega.is_none());
        assert_eq!(t.indicaciones, "Tocar timbre");

        let update = TicketUpdate {
            estado: Some(TicketStatus::Entregado),
            indicaciones: Some(String::new()),
            ..TicketUpdate::default()
        };
        let t = repo.update(ticket.id, &update, now).await.unwrap();
        assert!(t.fecha_entrega.is_some());
        assert_eq!(t.indicaciones, "");
    }

    #[tokio::test]
    async fn test_assign_and_list_for_courier() {
        let pool = pool().await;
        let repo = TicketRepository::new(&pool);
        let c1 = courier(&pool, "r1").await;
        let c2 = courier(&pool, "r2").await;

        let t1 = repo.create(&new_ticket("PED-1")).await.unwrap();
        repo.create(&new_ticket("PED-2")).await.unwrap();
        let assigned = repo.assign(t1.id, &c1, Utc::now()).await.unwrap();
        assert_eq!(assigned.asignado_a, Some(c1.id));
        assert_eq!(assigned.repartidor_nombre.as_deref(), Some(c1.nombre.as_str()));

        assert_eq!(repo.list_for_courier(c1.id).await.unwrap().len(), 1);
        assert!(repo.list_for_courier(c2.id).await.unwrap().is_empty());
        assert_eq!(repo.count_assigned_to(c1.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_append_note_keeps_every_line() {
        let pool = pool().await;
        let repo = TicketRepository::new(&pool);
        let ticket = repo.create(&new_ticket("PED-1")).await.unwrap();

        let first = repo.append_note(ticket.id, "10:00: Cliente ausente").await.unwrap();
        assert_eq!(first, "10:00: Cliente ausente");
        let second = repo.append_note(ticket.id, "10:30: Entregado").await.unwrap();
        assert_eq!(second, "10:00: Cliente ausente\n10:30: Entregado");

        let missing = repo.append_note(TicketId::new(9999), "x").await;
        assert!(matches!(missing, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_concurrent_notes_are_not_lost() {
        let path = std::env::temp_dir().join(format!("bt-notes-{}.db", uuid::Uuid::new_v4()));
        let pool = create_pool(&SecretString::from(format!("sqlite://{}", path.display())))
            .await
            .unwrap();
        init_ticket_schema(&pool).await.unwrap();
        let repo = TicketRepository::new(&pool);
        let ticket = repo.create(&new_ticket("PED-1")).await.unwrap();

        let notes: Vec<String> = (0..8).map(|n| format!("nota {n}")).collect();
        let results =
            futures::future::join_all(notes.iter().map(|n| repo.append_note(ticket.id, n))).await;
        assert!(results.iter().all(Result::is_ok));

        let stored = repo.get_by_id(ticket.id).await.unwrap().unwrap().notas_repartidor;
        for note in &notes {
            assert!(stored.lines().any(|l| l == note), "{note} lost");
        }

        pool.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_couriers_without_open_priority() {
        let pool = pool().await;
        let repo = TicketRepository::new(&pool);
        let busy = courier(&pool, "busy").await;
        let free = courier(&pool, "free").await;

        let mut urgent = new_ticket("PED-ALTA");
        urgent.prioridad = Priority::Alta;
        urgent.courier = Some(busy.clone());
        repo.create(&urgent).await.unwrap();

        let available = repo.couriers_without_open_priority().await.unwrap();
        assert_eq!(available, vec![free.clone()]);
        assert_eq!(repo.active_couriers().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_status_counts_and_courier_stats() {
        let pool = pool().await;
        let repo = TicketRepository::new(&pool);
        let c1 = courier(&pool, "r1").await;
        courier(&pool, "r2").await;

        let mut t = new_ticket("PED-1");
        t.courier = Some(c1.clone());
        let t1 = repo.create(&t).await.unwrap();
        repo.create(&new_ticket("PED-2")).await.unwrap();
        let update = TicketUpdate {
            estado: Some(TicketStatus::Entregado),
            ..TicketUpdate::default()
        };
        repo.update(t1.id, &update, Utc::now()).await.unwrap();

        let counts = repo.status_counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.pendientes, 1);
        assert_eq!(counts.entregados, 1);

        let stats = repo.courier_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        let r1 = stats.iter().find(|s| s.id == c1.id).unwrap();
        assert_eq!(r1.counts.total, 1);
        assert_eq!(r1.counts.entregados, 1);
        let r2 = stats.iter().find(|s| s.id != c1.id).unwrap();
        assert_eq!(r2.counts.total, 0);
    }
}
