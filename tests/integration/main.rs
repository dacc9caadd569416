//! Integration tests for the epochal markets service.
//!
//! Everything runs in-process against the in-memory store and the simulated
//! contract layer. Run with: cargo test --test integration

mod common;
mod flows;
mod reconciler;
mod store_http;
