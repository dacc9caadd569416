//! Event log matching by signature hash.

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use once_cell::sync::Lazy;

use super::types::LogEntry;

/// Factory event announcing a new market; the address is the first indexed topic.
pub const MARKET_CREATED_SIGNATURE: &str = "MarketCreated(address,string,uint256)";

/// Receipt-token transfer; the token id is the third indexed topic.
pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Topic 0 of [`MARKET_CREATED_SIGNATURE`].
pub static MARKET_CREATED_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(MARKET_CREATED_SIGNATURE.as_bytes()));

/// Topic 0 of [`TRANSFER_SIGNATURE`].
pub static TRANSFER_TOPIC: Lazy<B256> = Lazy::new(|| keccak256(TRANSFER_SIGNATURE.as_bytes()));

/// Address of the market announced in `logs`, ignoring logs of any other
/// event or shape regardless of their position.
pub fn find_market_created(logs: &[LogEntry]) -> Option<Address> {
    logs.iter()
        .filter(|log| log.topics.first() == Some(&*MARKET_CREATED_TOPIC))
        .find_map(|log| log.topics.get(1).map(|topic| Address::from_word(*topic)))
}

/// Token ids transferred to `recipient`, in log order, without duplicates.
pub fn transfer_token_ids(logs: &[LogEntry], recipient: Address) -> Vec<U256> {
    let recipient_topic = recipient.into_word();
    let mut ids = Vec::new();
    for log in logs {
        if log.topics.len() < 4 || log.topics[0] != *TRANSFER_TOPIC {
            continue;
        }
        if log.topics[2] != recipient_topic {
            continue;
        }
        let id = U256::from_be_bytes(log.topics[3].0);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Build a `MarketCreated` log.
pub fn market_created_log(factory: Address, market: Address) -> LogEntry {
    LogEntry {
        address: factory,
        topics: vec![*MARKET_CREATED_TOPIC, market.into_word()],
        data: Bytes::new(),
    }
}

/// Build a `Transfer` log.
pub fn transfer_log(contract: Address, from: Address, to: Address, token_id: U256) -> LogEntry {
    LogEntry {
        address: contract,
        topics: vec![
            *TRANSFER_TOPIC,
            from.into_word(),
            to.into_word(),
            B256::from(token_id.to_be_bytes::<32>()),
        ],
        data: Bytes::new(),
    }
}
