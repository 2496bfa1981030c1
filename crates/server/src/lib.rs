//! Belgrano Tickets server library.
//!
//! Delivery-ticket panel for Belgrano Ahorro: staff log in, couriers work
//! their assigned tickets, the storefront pushes new orders through the
//! ingestion API, and a separate `DevOps` surface manages the retail
//! catalog.
//!
//! The router is built by [`app::build_app`] so the binary and the
//! integration tests run the same stack.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod ahorro;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pdf;
pub mod routes;
pub mod services;
pub mod state;
