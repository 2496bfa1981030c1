//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::ahorro::{AhorroClient, AhorroError};
use crate::config::AppConfig;
use crate::services::{EventBus, ImageStore};

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: SqlitePool,
    catalog_pool: SqlitePool,
    ahorro: AhorroClient,
    events: EventBus,
    images: ImageStore,
}

impl AppState {
    /// Create the application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration
    /// * `pool` - Pool for users, tickets and settings
    /// * `catalog_pool` - Pool for the `DevOps` catalog (may share a file)
    ///
    /// # Errors
    ///
    /// Returns an error if the Ahorro HTTP client cannot be built.
    pub fn new(
        config: AppConfig,
        pool: SqlitePool,
        catalog_pool: SqlitePool,
    ) -> Result<Self, AhorroError> {
        let ahorro = AhorroClient::new(&config.ahorro)?;
        let images = ImageStore::new(config.uploads.folder.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog_pool,
                ahorro,
                events: EventBus::new(),
                images,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Pool for users, tickets and settings.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Pool for the catalog tables.
    #[must_use]
    pub fn catalog_pool(&self) -> &SqlitePool {
        &self.inner.catalog_pool
    }

    #[must_use]
    pub fn ahorro(&self) -> &AhorroClient {
        &self.inner.ahorro
    }

    /// Ticket event broadcaster.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.inner.images
    }
}
