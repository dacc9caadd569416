//! Bounded transaction confirmation.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::client::ChainReader;
use super::types::{TxHandle, TxReceipt};
use crate::error::ChainError;
use crate::metrics;

/// Default confirmation timeout (10 minutes).
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Default receipt polling interval.
pub const DEFAULT_CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long, and how often, to wait for a receipt.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    /// Give up after this long.
    pub timeout: Duration,
    /// Pause between receipt reads.
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_CONFIRMATION_POLL_INTERVAL,
        }
    }
}

impl ConfirmationPolicy {
    /// Build from configured seconds/milliseconds.
    pub fn from_config(timeout_secs: u64, poll_interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }
}

/// Poll for the receipt of `tx` until it appears or the policy times out.
///
/// Read errors are logged and retried within the window.
#[instrument(skip(reader, policy), fields(tx = %tx))]
pub async fn wait_for_receipt(
    reader: &dyn ChainReader,
    tx: TxHandle,
    policy: &ConfirmationPolicy,
) -> Result<TxReceipt, ChainError> {
    let start = Instant::now();

    let poll = async {
        loop {
            match reader.transaction_receipt(tx).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => debug!("Receipt not available yet"),
                Err(e) => warn!(error = %e, "Error reading transaction receipt"),
            }
            sleep(policy.poll_interval).await;
        }
    };

    match tokio::time::timeout(policy.timeout, poll).await {
        Ok(receipt) => {
            metrics::record_confirmation_latency(start);
            Ok(receipt)
        }
        Err(_) => {
            warn!(timeout_secs = policy.timeout.as_secs(), "Transaction confirmation timed out");
            Err(ChainError::ConfirmationTimeout {
                tx,
                waited_secs: policy.timeout.as_secs(),
            })
        }
    }
}
