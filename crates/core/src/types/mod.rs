//! Domain types for Belgrano Tickets.

pub mod email;
pub mod id;
pub mod money;
pub mod password;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use password::PasswordScheme;
pub use status::*;
