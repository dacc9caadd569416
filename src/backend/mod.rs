//! Persistence store: wire types, the store seam and its backings.

pub mod client;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

pub use client::BackendClient;
pub use memory::InMemoryMarketStore;
pub use sqlite::SqliteMarketStore;
pub use store::{MarketStore, RECENT_LIMIT};
pub use types::{MarketRecord, DEFAULT_IMAGE};
