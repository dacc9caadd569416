//! Transaction flows: market creation, staking and claiming.
//!
//! Validation and wallet failures surface before anything is sent. Once a
//! transaction is out, creation degrades to a lower-confidence outcome while
//! stake and claim report a distinct error.

pub mod claim;
pub mod creation;
pub mod stake;

pub use claim::{ClaimFlow, ClaimReceipt};
pub use creation::{CreateMarketRequest, CreationOutcome, MarketCreationFlow, PendingCreation};
pub use stake::{to_wei, StakeFlow, StakeReceipt, StakeRequest};
