//! HTTP API module: status and market views, metrics, and the persistence
//! shim store.

pub mod handlers;
pub mod routes;
pub mod store;

pub use handlers::{AppState, MarketView};
pub use routes::create_router;
pub use store::store_router;
