//! Outbound client for the Belgrano Ahorro storefront API.
//!
//! One client instance is built at start-up and shared through
//! [`crate::state::AppState`]. Public operations never fail: network, HTTP,
//! and decoding errors are logged and turned into empty values, matching
//! how the panel treats the storefront as optional.

mod client;
mod error;

pub use client::AhorroClient;
pub use error::AhorroError;
