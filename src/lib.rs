//! Epoch-scoped football prediction markets.
//!
//! Each match is split into six 15-minute epochs starting a quarter hour
//! before kick-off, with trading paused during the fourth. Users stake on the
//! goal and cards outcome of an epoch; pools resolve on chain.
//!
//! ```text
//! minute  -15      0      15      30      45      60      75
//!          | ep 1  | ep 2  | ep 3  | ep 4  | ep 5  | ep 6  | closed
//!                                  paused
//! ```
//!
//! # Modules
//!
//! - [`market`]: market model, epoch clock and categorization
//! - [`backend`]: persistence store client and in-memory store
//! - [`chain`]: contract call layer and simulator
//! - [`reconciler`]: the live market table
//! - [`flows`]: market creation, staking and claims
//! - [`sports`]: upcoming-match feed
//! - [`api`]: HTTP status API and persistence shim
//! - [`config`]: configuration loading from environment
//! - [`error`]: unified error types
//! - [`metrics`]: Prometheus metrics
//! - [`signing`]: wallet key handling
//! - [`utils`]: utility functions

pub mod api;
pub mod backend;
pub mod chain;
pub mod config;
pub mod error;
pub mod flows;
pub mod market;
pub mod metrics;
pub mod reconciler;
pub mod signing;
pub mod sports;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
