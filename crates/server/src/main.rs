//! Belgrano Tickets - delivery ticket panel and `DevOps` catalog.
//!
//! # Architecture
//!
//! - Axum web framework, JSON handlers
//! - `SQLite` via sqlx: one database for users/tickets/sessions, one for the
//!   catalog (both may share a file)
//! - tower-sessions with a `SQLite` store
//! - Belgrano Ahorro REST API for catalog and order sync

#![cfg_attr(not(test), forbid(unsafe_code))]

use belgrano_tickets::app::build_app;
use belgrano_tickets::config::AppConfig;
use belgrano_tickets::db::{self, init_catalog_schema, init_ticket_schema};
use belgrano_tickets::middleware::create_session_store;
use belgrano_tickets::services::seed::{seed_default_settings, seed_default_users};
use belgrano_tickets::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &AppConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "belgrano_tickets=info,tower_http=debug".into());

    // JSON on Fly.io or when asked for, text locally
    let json = std::env::var("FLY_APP_NAME").is_ok()
        || std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    for warning in config.production_warnings() {
        tracing::warn!("{warning}");
    }

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    init_ticket_schema(&pool)
        .await
        .expect("Failed to apply ticket schema");

    let catalog_pool = db::create_pool(&config.catalog_database_url)
        .await
        .expect("Failed to create catalog pool");
    init_catalog_schema(&catalog_pool)
        .await
        .expect("Failed to apply catalog schema");
    tracing::info!("Databases ready");

    match seed_default_users(&pool).await {
        Ok(0) => {}
        Ok(created) => tracing::info!(created, "Seeded default accounts"),
        Err(e) => tracing::error!(error = %e, "Failed to seed default accounts"),
    }
    if let Err(e) = seed_default_settings(&pool).await {
        tracing::error!(error = %e, "Failed to seed default settings");
    }

    let store = create_session_store(&pool)
        .await
        .expect("Failed to create session store");

    let addr = config.socket_addr();
    let state = AppState::new(config, pool, catalog_pool)
        .expect("Failed to create application state");
    let app = build_app(state, store);

    tracing::info!("belgrano-tickets listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
