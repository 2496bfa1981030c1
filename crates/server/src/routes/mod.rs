//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Health document (DB counts, Ahorro status)
//! GET  /health/ready                - Readiness (SELECT 1)
//!
//! # Auth
//! GET  /login                       - Login page
//! POST /login                       - Login (form or JSON)
//! GET  /logout                      - Logout
//! POST /cambiar_password            - Change own password
//!
//! # Tickets (logged in; couriers limited to their own)
//! GET  /panel                       - Ticket list
//! GET  /ticket/{id}                 - Ticket detail
//! POST /ticket/{id}/estado          - Status, priority, instructions
//! POST /ticket/{id}/asignar         - Assign courier (admin)
//! POST /ticket/{id}/nota            - Append courier note
//! POST /ticket/{id}/eliminar        - Delete (admin)
//! GET  /ticket/{id}/pdf             - PDF export
//! GET  /api/events                  - Server-sent ticket events
//!
//! # Ingestion (X-API-Key)
//! POST /api/tickets                 - Receive a ticket
//! POST /api/tickets/recibir         - Alias
//!
//! # Admin
//! GET  /reportes                    - Status and courier totals
//! GET  /gestion_flota               - Per-courier status breakdown
//! GET  /usuarios                    - List users
//! POST /usuarios                    - Create user
//! POST /usuarios/{id}/editar        - Edit user
//! POST /usuarios/{id}/eliminar      - Delete user
//! GET  /configuracion               - List settings
//! POST /configuracion               - Set one setting
//!
//! # Belgrano Ahorro proxy
//! GET  /api/ahorro/productos        - Products (admin)
//! GET  /api/ahorro/pedido/{n}       - Order lookup
//! PUT  /api/ahorro/pedido/{n}/estado - Push order status
//! POST /api/ahorro/sync/tickets     - Push all tickets (admin)
//! GET  /api/ahorro/test             - Connectivity probe (admin)
//!
//! # DevOps
//! POST /devops/login                - DevOps login
//! GET  /devops/logout               - DevOps logout
//! GET  /devops/health               - Public health
//! GET  /devops/status               - Catalog counts and configuration
//! GET  /devops/info                 - Service description
//! POST /devops/sync                 - Local counts plus Ahorro probe
//! *    /api/devops/{negocios,productos,ofertas,sucursales}
//! GET  /api/devops/categorias
//! GET|POST|PUT /api/devops/precios
//! POST /upload-image                - Catalog image upload (DevOps)
//! ```

pub mod ahorro;
pub mod auth;
pub mod devops;
pub mod devops_api;
pub mod events;
pub mod extract;
pub mod health;
pub mod ingest;
pub mod reports;
pub mod settings;
pub mod tickets;
pub mod uploads;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;

/// Panel auth routes.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/cambiar_password", post(auth::change_password))
}

/// Ticket routes.
fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/panel", get(tickets::panel))
        .route("/ticket/{id}", get(tickets::detail))
        .route("/ticket/{id}/estado", post(tickets::update_status))
        .route("/ticket/{id}/asignar", post(tickets::assign))
        .route("/ticket/{id}/nota", post(tickets::add_note))
        .route("/ticket/{id}/eliminar", post(tickets::delete))
        .route("/ticket/{id}/pdf", get(tickets::pdf))
        .route("/api/tickets", post(ingest::receive))
        .route("/api/tickets/recibir", post(ingest::receive))
        .route("/api/events", get(events::stream))
}

/// Admin reports and user management.
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/reportes", get(reports::reports))
        .route("/gestion_flota", get(reports::fleet))
        .route("/usuarios", get(users::list).post(users::create))
        .route("/usuarios/{id}/editar", post(users::edit))
        .route("/usuarios/{id}/eliminar", post(users::delete))
        .route("/configuracion", get(settings::list).post(settings::set))
}

/// Belgrano Ahorro proxy routes.
fn ahorro_routes() -> Router<AppState> {
    Router::new()
        .route("/productos", get(ahorro::productos))
        .route("/pedido/{numero}", get(ahorro::pedido))
        .route("/pedido/{numero}/estado", axum::routing::put(ahorro::actualizar_estado))
        .route("/sync/tickets", post(ahorro::sync_tickets))
        .route("/test", get(ahorro::test_connection))
}

/// `DevOps` panel routes.
fn devops_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(devops::login))
        .route("/logout", get(devops::logout))
        .route("/health", get(devops::health))
        .route("/status", get(devops::status))
        .route("/info", get(devops::info))
        .route("/sync", post(devops::sync))
}

/// `DevOps` catalog REST API.
fn devops_api_routes() -> Router<AppState> {
    use devops_api as api;

    Router::new()
        .route(
            "/negocios",
            get(api::list_businesses)
                .post(api::create_business)
                .put(api::put_not_implemented)
                .delete(api::delete_not_implemented),
        )
        .route(
            "/productos",
            get(api::list_products)
                .post(api::create_product)
                .put(api::put_not_implemented)
                .delete(api::delete_not_implemented),
        )
        .route(
            "/ofertas",
            get(api::list_offers)
                .post(api::create_offer)
                .put(api::put_not_implemented)
                .delete(api::delete_not_implemented),
        )
        .route(
            "/sucursales",
            get(api::list_branches)
                .post(api::create_branch)
                .put(api::put_not_implemented)
                .delete(api::delete_not_implemented),
        )
        .route("/categorias", get(api::list_categories))
        .route(
            "/precios",
            get(api::list_prices)
                .post(api::update_price)
                .put(api::update_price),
        )
        .route("/health", get(devops::health))
}

/// Create all routes.
///
/// `upload_limit` caps the multipart body of `/upload-image`.
pub fn routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { axum::response::Redirect::to("/panel") }))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(auth_routes())
        .merge(ticket_routes())
        .merge(admin_routes())
        .nest("/api/ahorro", ahorro_routes())
        .nest("/devops", devops_routes())
        .nest("/api/devops", devops_api_routes())
        .route(
            "/upload-image",
            post(uploads::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
}
