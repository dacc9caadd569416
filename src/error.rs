//! Unified error types for the market service.

use thiserror::Error;

use crate::chain::TxHandle;
use crate::market::TradingStatus;

/// Unified error type for the market service.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Backend store error.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Contract read/write error.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Market creation error.
    #[error("market creation error: {0}")]
    Creation(#[from] CreationError),

    /// Claim error.
    #[error("claim error: {0}")]
    Claim(#[from] ClaimError),

    /// Stake placement error.
    #[error("stake error: {0}")]
    Stake(#[from] StakeError),

    /// Wallet key error.
    #[error("wallet error: {0}")]
    Wallet(#[from] WalletError),

    /// Match feed error.
    #[error("sports feed error: {0}")]
    Sports(#[from] SportsError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence store errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Store could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// Store answered with an error status.
    #[error("backend returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the body, if any.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to parse backend response: {0}")]
    Parse(String),

    /// Record rejected before it was sent.
    #[error("invalid market record: {0}")]
    InvalidRecord(String),

    /// Local store database failed.
    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Contract call layer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A read call failed.
    #[error("contract read {call} failed: {reason}")]
    Read {
        /// Name of the call.
        call: &'static str,
        /// Reason for failure.
        reason: String,
    },

    /// The collaborator does not implement this call.
    #[error("contract call {0} is not supported")]
    Unsupported(&'static str),

    /// A transaction could not be submitted.
    #[error("transaction submission failed: {0}")]
    Submission(String),

    /// No receipt arrived within the confirmation window.
    #[error("transaction {tx} not confirmed within {waited_secs}s")]
    ConfirmationTimeout {
        /// Transaction that timed out.
        tx: TxHandle,
        /// Seconds waited.
        waited_secs: u64,
    },
}

/// Market creation errors. Only raised before a transaction is sent.
#[derive(Error, Debug)]
pub enum CreationError {
    /// A required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Match start time is not a positive unix timestamp.
    #[error("invalid match start time: {0}")]
    InvalidStartTime(i64),

    /// No wallet connected.
    #[error("please connect your wallet to create markets")]
    WalletNotConnected,

    /// Transaction submission failed.
    #[error("failed to submit market creation: {0}")]
    Submission(#[source] ChainError),
}

/// Claim errors.
#[derive(Error, Debug)]
pub enum ClaimError {
    /// Market id is not a contract address.
    #[error("market {id} has no contract address")]
    NoMarketAddress {
        /// Market id.
        id: String,
    },

    /// No wallet connected.
    #[error("please connect your wallet to claim winnings")]
    WalletNotConnected,

    /// Receipt-token contract lookup failed.
    #[error("could not resolve receipt token contract: {0}")]
    ReceiptContract(#[source] ChainError),

    /// Neither the owner read nor the transfer-log scan worked.
    #[error("could not list bet receipts: {0}")]
    Enumeration(#[source] ChainError),

    /// Wallet holds no receipt tokens at all.
    #[error("wallet holds no bet receipts")]
    NoReceipts,

    /// Wallet holds receipts, none for this market and epoch.
    #[error("no bet receipt for this market in epoch {epoch}")]
    NoMatchingReceipt {
        /// Requested epoch.
        epoch: u8,
    },

    /// Transaction submission failed.
    #[error("failed to submit claim: {0}")]
    Submission(#[source] ChainError),

    /// Confirmation wait failed.
    #[error("claim confirmation failed: {0}")]
    Confirmation(#[source] ChainError),

    /// Transaction mined but reverted.
    #[error("claim transaction {tx} reverted")]
    Reverted {
        /// Reverted transaction.
        tx: TxHandle,
    },
}

/// Stake placement errors.
#[derive(Error, Debug)]
pub enum StakeError {
    /// Market id is not a contract address.
    #[error("market {id} has no contract address")]
    NoMarketAddress {
        /// Market id.
        id: String,
    },

    /// No wallet connected.
    #[error("please connect your wallet to place a bet")]
    WalletNotConnected,

    /// Betting is not open for the current epoch.
    #[error("betting is {status} (epoch {epoch:?})")]
    TradingClosed {
        /// Current trading status.
        status: TradingStatus,
        /// Current epoch, if any.
        epoch: Option<u8>,
    },

    /// Stake amount invalid.
    #[error("invalid stake amount: {0}")]
    InvalidAmount(String),

    /// Outcome index out of range for the event type.
    #[error("invalid outcome {0}")]
    InvalidOutcome(u8),

    /// Transaction submission failed.
    #[error("failed to submit bet: {0}")]
    Submission(#[source] ChainError),

    /// Confirmation wait failed.
    #[error("bet confirmation failed: {0}")]
    Confirmation(#[source] ChainError),

    /// Transaction mined but reverted.
    #[error("bet transaction {tx} reverted")]
    Reverted {
        /// Reverted transaction.
        tx: TxHandle,
    },
}

/// Wallet key errors.
#[derive(Error, Debug)]
pub enum WalletError {
    /// Key is not valid hex of the right length.
    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// Match feed errors.
#[derive(Error, Debug)]
pub enum SportsError {
    /// Request failed.
    #[error("sports api request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with an error status.
    #[error("sports api returned HTTP {0}")]
    Status(u16),

    /// Base URL unusable.
    #[error("invalid sports api url: {0}")]
    InvalidUrl(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
