//! Business logic layered over the repositories.

pub mod auth;
pub mod events;
pub mod ingest;
pub mod seed;
pub mod uploads;

pub use auth::{AuthError, AuthService};
pub use events::{EventBus, TicketEvent};
pub use ingest::{IngestError, IngestOutcome, IngestService, Intake};
pub use uploads::{ImageStore, UploadError, UploadForm};
