//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (when configured)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID
//! 4. Security headers
//! 5. Session layer (tower-sessions with `SQLite` store)
//!
//! Authorization is per handler through the extractors in [`auth`].

pub mod auth;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    RequireAdmin, RequireDevops, RequireUser, clear_current_user, clear_devops, set_current_user,
    set_devops_authenticated,
};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{SESSION_COOKIE_NAME, create_session_layer, create_session_store};
