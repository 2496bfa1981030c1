//! Key/value settings (`configuracion` table).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use belgrano_tickets_core::SettingId;

use super::RepositoryError;

/// A stored setting.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Setting {
    pub id: SettingId,
    pub clave: String,
    pub valor: String,
    pub descripcion: Option<String>,
    pub fecha_actualizacion: DateTime<Utc>,
}

/// Repository for the settings table.
pub struct SettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Read one value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, clave: &str) -> Result<Option<String>, RepositoryError> {
        let valor = sqlx::query_scalar::<_, String>("SELECT valor FROM configuracion WHERE clave = ?")
            .bind(clave)
            .fetch_optional(self.pool)
            .await?;
        Ok(valor)
    }

    /// Insert or overwrite a value. A `None` description keeps the
    /// existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn set(
        &self,
        clave: &str,
        valor: &str,
        descripcion: Option<&str>,
    ) -> Result<Setting, RepositoryError> {
        let setting = sqlx::query_as::<_, Setting>(
            r"
            INSERT INTO configuracion (clave, valor, descripcion, fecha_actualizacion)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (clave) DO UPDATE SET
                valor = excluded.valor,
                descripcion = COALESCE(excluded.descripcion, configuracion.descripcion),
                fecha_actualizacion = excluded.fecha_actualizacion
            RETURNING id, clave, valor, descripcion, fecha_actualizacion
            ",
        )
        .bind(clave)
        .bind(valor)
        .bind(descripcion)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;
        Ok(setting)
    }

    /// All settings ordered by key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Setting>, RepositoryError> {
        let settings = sqlx::query_as::<_, Setting>(
            "SELECT id, clave, valor, descripcion, fecha_actualizacion FROM configuracion ORDER BY clave",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(settings)
    }
}
