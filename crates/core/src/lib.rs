//! Belgrano Tickets Core - Shared domain types.
//!
//! Used by every crate in the workspace:
//! - `belgrano-tickets` - HTTP server (ticket panel, ingestion API, `DevOps` catalog)
//! - `cli` - Schema setup and credential maintenance
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Enable the `sqlite` feature to get `sqlx` encoding
//! for IDs, emails, and the status enums.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money, roles, ticket states

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
