use async_trait::async_trait;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::{
    error::{ClaimError, Result},
    lockdrop::types::EthAddress,
};

/// Name of the lock event emitted by the lockdrop contract
pub const LOCKED_EVENT: &str = "Locked";

/// Solidity signature of [`LOCKED_EVENT`]; `owner` is the only indexed field
pub const LOCKED_EVENT_SIGNATURE: &str = "Locked(address,uint256,uint256,address,address)";

/// Block bound of an event query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

impl BlockTag {
    fn to_rpc(self) -> Value {
        match self {
            BlockTag::Number(n) => Value::String(format!("0x{:x}", n)),
            BlockTag::Latest => Value::String("latest".to_string()),
        }
    }
}

/// Decoded contract event, field values rendered as strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub return_values: HashMap<String, String>,
    pub transaction_hash: String,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub hash: String,
    pub from: EthAddress,
}

/// What the lock source needs from a source-chain client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceChain: Send + Sync {
    async fn get_past_events(
        &self,
        event_name: &str,
        from_block: BlockTag,
        to_block: BlockTag,
    ) -> Result<Vec<EventLog>>;

    async fn get_transaction(&self, hash: &str) -> Result<TransactionInfo>;
}

/// JSON-RPC client for the lockdrop contract on an Ethereum node
pub struct EthereumRpcClient {
    url: String,
    contract: EthAddress,
    client: reqwest::Client,
}

impl EthereumRpcClient {
    pub fn new(url: &str, contract: EthAddress) -> Self {
        Self {
            url: url.to_string(),
            contract,
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and return the `result` field
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClaimError::SourceUnavailable(format!("{} ({}): {}", method, self.url, e)))?;

        let json: Value = resp
            .json()
            .await
            .map_err(|e| ClaimError::SourceUnavailable(format!("{}: bad response: {}", method, e)))?;

        if let Some(err) = json.get("error") {
            return Err(ClaimError::SourceUnavailable(format!("{}: RPC error: {}", method, err)));
        }

        Ok(json["result"].clone())
    }
}

#[async_trait]
impl SourceChain for EthereumRpcClient {
    async fn get_past_events(
        &self,
        event_name: &str,
        from_block: BlockTag,
        to_block: BlockTag,
    ) -> Result<Vec<EventLog>> {
        if event_name != LOCKED_EVENT {
            return Err(ClaimError::InvalidParameter(format!(
                "unsupported contract event: {}",
                event_name
            )));
        }

        let filter = json!({
            "address": self.contract.to_string(),
            "fromBlock": from_block.to_rpc(),
            "toBlock": to_block.to_rpc(),
            "topics": [locked_topic()],
        });

        let result = self.call("eth_getLogs", json!([filter])).await?;
        let logs = result
            .as_array()
            .ok_or_else(|| ClaimError::SourceUnavailable("eth_getLogs: expected an array".to_string()))?;

        debug!("eth_getLogs returned {} {} logs", logs.len(), event_name);
        Ok(decode_locked_logs(logs))
    }

    async fn get_transaction(&self, hash: &str) -> Result<TransactionInfo> {
        let result = self.call("eth_getTransactionByHash", json!([hash])).await?;

        if result.is_null() {
            return Err(ClaimError::SourceUnavailable(format!("transaction {} not found", hash)));
        }

        let from = result["from"]
            .as_str()
            .ok_or_else(|| ClaimError::SourceUnavailable(format!("transaction {} has no sender", hash)))?;

        Ok(TransactionInfo {
            hash: hash.to_string(),
            from: from.parse()?,
        })
    }
}

/// Topic 0 of the `Locked` event
pub fn locked_topic() -> String {
    let hash = Keccak256::digest(LOCKED_EVENT_SIGNATURE.as_bytes());
    format!("0x{}", hex::encode(hash))
}

/// Decode a batch of `Locked` logs, skipping entries that cannot be decoded
pub fn decode_locked_logs(logs: &[Value]) -> Vec<EventLog> {
    logs.iter()
        .filter_map(|log| match decode_locked_log(log) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(
                    "Skipping undecodable Locked log {}: {}",
                    log["transactionHash"].as_str().unwrap_or("<no hash>"),
                    e
                );
                None
            }
        })
        .collect()
}

/// Decode one `eth_getLogs` entry of the `Locked` event.
///
/// Data layout: `eth`, `duration`, `lock`, `introducer`, one 32-byte word each.
pub fn decode_locked_log(log: &Value) -> Result<EventLog> {
    let data = hex_field(log, "data")?;
    if data.len() < 4 * 32 {
        return Err(ClaimError::InvalidParameter(format!(
            "Locked event data too short: {} bytes",
            data.len()
        )));
    }
    let word = |i: usize| &data[i * 32..(i + 1) * 32];

    let mut return_values = HashMap::new();
    return_values.insert("eth".to_string(), word_to_u128(word(0))?.to_string());
    return_values.insert("duration".to_string(), word_to_u128(word(1))?.to_string());
    return_values.insert("lock".to_string(), word_to_address(word(2)).to_string());
    return_values.insert("introducer".to_string(), word_to_address(word(3)).to_string());

    if let Some(owner) = log["topics"].get(1).and_then(Value::as_str) {
        let topic = crate::lockdrop::types::decode_hex(owner)?;
        if topic.len() == 32 {
            return_values.insert("owner".to_string(), word_to_address(&topic).to_string());
        }
    }

    let transaction_hash = log["transactionHash"]
        .as_str()
        .ok_or_else(|| ClaimError::InvalidParameter("log without transactionHash".to_string()))?
        .to_string();

    let block_number = parse_quantity(
        log["blockNumber"]
            .as_str()
            .ok_or_else(|| ClaimError::InvalidParameter("log without blockNumber".to_string()))?,
    )?;

    Ok(EventLog {
        return_values,
        transaction_hash,
        block_number,
    })
}

fn hex_field(log: &Value, name: &str) -> Result<Vec<u8>> {
    let raw = log[name]
        .as_str()
        .ok_or_else(|| ClaimError::InvalidParameter(format!("log without {}", name)))?;
    crate::lockdrop::types::decode_hex(raw)
}

fn parse_quantity(s: &str) -> Result<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ClaimError::InvalidParameter(format!("bad quantity {}: {}", s, e)))
}

fn word_to_u128(word: &[u8]) -> Result<u128> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(ClaimError::InvalidParameter(
            "uint256 value does not fit in 128 bits".to_string(),
        ));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn word_to_address(word: &[u8]) -> EthAddress {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..32]);
    EthAddress::from_bytes(bytes)
}
