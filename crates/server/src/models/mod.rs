//! Domain models.
//!
//! Validated types handed out by the repositories. Row structs stay private
//! to the `db` module.

pub mod catalog;
pub mod session;
pub mod ticket;
pub mod user;

pub use session::{CurrentUser, keys as session_keys};
pub use ticket::{ProductLine, Quantity, Ticket};
pub use user::User;
