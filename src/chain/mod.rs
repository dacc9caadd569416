//! Contract call layer.
//!
//! The market, factory and receipt-token contracts sit behind the
//! [`ChainReader`] and [`ChainWriter`] traits. [`SimulatedChain`] backs both
//! in tests and in simulation mode.

pub mod client;
pub mod confirm;
pub mod events;
pub mod sim;
pub mod types;

pub use client::{ChainReader, ChainWriter};
pub use confirm::{wait_for_receipt, ConfirmationPolicy};
pub use events::{find_market_created, transfer_token_ids};
pub use sim::SimulatedChain;
pub use types::{
    BetCall, BetMetadata, CreateMarketCall, LogEntry, PoolDetails, ReceiptStatus, TxHandle,
    TxReceipt,
};
