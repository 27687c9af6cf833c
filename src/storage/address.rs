use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::{
    chain::address::Ss58Address,
    error::{ClaimError, Result},
    lockdrop::types::decode_hex,
    storage::db::KeyValueCache,
};

const KEY_PREFIX: &str = "claim-addr:";

/// Reward recipient per locker public key.
///
/// Entries live in a process-lifetime map in front of a durable cache. Only
/// addresses that pass SS58 validation are ever written, and an entry that no
/// longer validates reads back as absent. The derived default address is never
/// written, so it cannot overwrite an address the user set.
pub struct RecipientAddressStore {
    backend: Arc<dyn KeyValueCache>,
    memory: RwLock<HashMap<String, String>>,
    prefix: u8,
}

impl RecipientAddressStore {
    pub fn new(backend: Arc<dyn KeyValueCache>, prefix: u8) -> Self {
        Self {
            backend,
            memory: RwLock::new(HashMap::new()),
            prefix,
        }
    }

    /// Saved address for `public_key`, if one is set and still valid
    pub fn load(&self, public_key: &str) -> Option<Ss58Address> {
        let key = match cache_key(public_key) {
            Ok(key) => key,
            Err(e) => {
                debug!("No address for malformed public key {}: {}", public_key, e);
                return None;
            }
        };

        let cached = self
            .memory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();

        let raw = match cached {
            Some(raw) => raw,
            None => match self.backend.get(&key) {
                Ok(Some(raw)) => raw,
                Ok(None) => return None,
                Err(e) => {
                    warn!("Address cache read failed for {}: {}", key, e);
                    return None;
                }
            },
        };

        match Ss58Address::parse(&raw, self.prefix) {
            Ok(address) => {
                self.memory
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, raw);
                Some(address)
            }
            Err(e) => {
                debug!("Ignoring cached address for {}: {}", key, e);
                None
            }
        }
    }

    /// Validate and persist `address` as the recipient for `public_key`
    pub fn save(&self, public_key: &str, address: &str) -> Result<Ss58Address> {
        let key = cache_key(public_key)?;
        let parsed = Ss58Address::parse(address, self.prefix)?;
        let encoded = parsed.encode();

        self.backend.set(&key, &encoded)?;
        self.memory
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, encoded);

        info!("Recipient for {} set to {}", public_key, parsed);
        Ok(parsed)
    }

    /// Address the destination chain maps `public_key` to by default
    pub fn default_for(&self, public_key: &str) -> Result<Ss58Address> {
        let bytes = decode_hex(public_key)?;
        Ss58Address::from_public_key(self.prefix, &bytes)
    }

    /// Saved address, or the default one when none is set
    pub fn resolve(&self, public_key: &str) -> Result<Ss58Address> {
        match self.load(public_key) {
            Some(address) => Ok(address),
            None => self.default_for(public_key),
        }
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

fn cache_key(public_key: &str) -> Result<String> {
    let bytes = decode_hex(public_key)?;
    if bytes.is_empty() {
        return Err(ClaimError::InvalidParameter("empty public key".to_string()));
    }
    Ok(format!("{}0x{}", KEY_PREFIX, hex::encode(bytes)))
}
