//! Contract-layer data types.

use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::market::EventType;

/// Handle of a submitted transaction.
///
/// Every write call returns this one shape, whatever the wallet library
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHandle(pub B256);

impl TxHandle {
    /// Transaction hash.
    pub fn hash(&self) -> B256 {
        self.0
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<B256> for TxHandle {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

/// Execution status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum ReceiptStatus {
    /// Executed successfully.
    Success,
    /// Reverted.
    Reverted,
}

impl ReceiptStatus {
    /// Interpret any of the encodings RPC providers use for status.
    ///
    /// Numeric `1`, `true`, `"success"`, `"0x1"` and `"1"` mean success.
    pub fn from_value(value: &Value) -> Self {
        let success = match value {
            Value::Number(n) => n.as_u64() == Some(1),
            Value::Bool(b) => *b,
            Value::String(s) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("success") || s.eq_ignore_ascii_case("0x1") || s == "1"
            }
            _ => false,
        };
        if success {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Reverted
        }
    }

    /// Whether the transaction succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ReceiptStatus::Success)
    }
}

impl From<Value> for ReceiptStatus {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl From<ReceiptStatus> for String {
    fn from(status: ReceiptStatus) -> Self {
        match status {
            ReceiptStatus::Success => "success".to_string(),
            ReceiptStatus::Reverted => "reverted".to_string(),
        }
    }
}

/// A raw event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics; topic 0 is the event signature hash.
    pub topics: Vec<B256>,
    /// Non-indexed payload.
    pub data: Bytes,
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Transaction this receipt belongs to.
    pub tx: TxHandle,
    /// Block the transaction was mined in.
    pub block_number: Option<u64>,
    /// Execution status.
    pub status: ReceiptStatus,
    /// Emitted logs, from any contract.
    pub logs: Vec<LogEntry>,
}

/// One epoch pool of one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDetails {
    /// Total staked in the pool.
    pub total_stake: U256,
    /// Stake per outcome index.
    pub outcome_stakes: [U256; 2],
    /// Whether the pool has been resolved.
    pub resolved: bool,
    /// Winning outcome index, meaningful once resolved.
    pub winning_outcome: u8,
}

/// Bet recorded against a receipt token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetMetadata {
    /// Market the bet was placed on.
    pub market: Address,
    /// Event type.
    pub event_type: EventType,
    /// Epoch the bet belongs to.
    pub epoch_index: u8,
    /// Chosen outcome.
    pub outcome: u8,
    /// Stake in wei.
    pub stake_amount: U256,
}

/// Arguments of the factory's market-creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMarketCall {
    /// Free-text match description.
    pub match_details: String,
    /// Kick-off, unix seconds.
    pub match_start_time: i64,
    /// Home team.
    pub team_a: String,
    /// Away team.
    pub team_b: String,
}

/// Arguments of a stake-placing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetCall {
    /// Event type.
    pub event_type: EventType,
    /// Epoch the stake is for.
    pub epoch_index: u8,
    /// Chosen outcome.
    pub outcome: u8,
}
