//! Wallet key handling.
//!
//! The service never signs on its own behalf; the key only identifies the
//! connected wallet, resolved once at startup.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use tracing::debug;

use crate::error::WalletError;

/// Create a signer from a hex-encoded private key, with or without `0x`.
pub fn create_signer(private_key: &str) -> Result<PrivateKeySigner, WalletError> {
    let key = private_key.strip_prefix("0x").unwrap_or(private_key);
    let bytes = hex::decode(key)
        .map_err(|e| WalletError::InvalidKey(format!("invalid hex: {e}")))?;

    if bytes.len() != 32 {
        return Err(WalletError::InvalidKey(format!(
            "must be 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&bytes);

    PrivateKeySigner::from_bytes(&key_bytes.into())
        .map_err(|e| WalletError::InvalidKey(e.to_string()))
}

/// Wallet address of a private key.
pub fn wallet_address(private_key: &str) -> Result<Address, WalletError> {
    let address = create_signer(private_key)?.address();
    debug!(%address, "Derived wallet address");
    Ok(address)
}

/// Connected wallet, if a key is configured.
pub fn connected_wallet(private_key: Option<&str>) -> Result<Option<Address>, WalletError> {
    private_key.map(wallet_address).transpose()
}
