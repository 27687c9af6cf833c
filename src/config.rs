use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClaimError, Result};
use crate::lockdrop::{pow::NonceSearch, types::EthAddress};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub ethereum: EthereumConfig,
    pub plasm: PlasmConfig,
    pub claim: ClaimConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub contract_address: String,
    #[serde(default)]
    pub from_block: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlasmConfig {
    pub network: Network,
}

/// Destination network of the lockdrop rewards
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Plasm,
    Dusty,
}

impl Network {
    /// SS58 address prefix
    pub fn ss58_prefix(&self) -> u8 {
        match self {
            Network::Plasm | Network::Dusty => 5,
        }
    }

    pub fn token_symbol(&self) -> &'static str {
        match self {
            Network::Plasm => "PLM",
            Network::Dusty => "PLD",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClaimConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_difficulty")]
    pub pow_difficulty_bits: u8,
    #[serde(default = "default_max_attempts")]
    pub pow_max_attempts: u64,
    #[serde(default = "default_pow_timeout")]
    pub pow_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    15
}

fn default_difficulty() -> u8 {
    8
}

fn default_max_attempts() -> u64 {
    1 << 24
}

fn default_pow_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("LOCKDROP").separator("__"))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.claim.poll_interval_secs == 0 {
            return Err(ClaimError::Config("poll_interval_secs must be positive".into()));
        }
        if self.claim.pow_max_attempts == 0 {
            return Err(ClaimError::Config("pow_max_attempts must be positive".into()));
        }
        if self.claim.pow_difficulty_bits > 64 {
            return Err(ClaimError::Config(format!(
                "pow_difficulty_bits {} exceeds 64",
                self.claim.pow_difficulty_bits
            )));
        }
        self.contract_address()?;
        Ok(())
    }

    pub fn contract_address(&self) -> Result<EthAddress> {
        EthAddress::from_str(&self.ethereum.contract_address).map_err(|e| {
            ClaimError::Config(format!(
                "Invalid contract address {}: {}",
                self.ethereum.contract_address, e
            ))
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.claim.poll_interval_secs)
    }

    pub fn pow_timeout(&self) -> Duration {
        Duration::from_secs(self.claim.pow_timeout_secs)
    }

    pub fn nonce_search(&self) -> NonceSearch {
        NonceSearch::new(self.claim.pow_difficulty_bits, self.claim.pow_max_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            ethereum: EthereumConfig {
                rpc_url: "http://localhost:8545".into(),
                contract_address: "0x458dabf1eff8fcdfbf0896a6bd1f457c01e2ffd6".into(),
                from_block: 0,
            },
            plasm: PlasmConfig {
                network: Network::Dusty,
            },
            claim: ClaimConfig {
                poll_interval_secs: default_poll_interval(),
                pow_difficulty_bits: default_difficulty(),
                pow_max_attempts: default_max_attempts(),
                pow_timeout_secs: default_pow_timeout(),
            },
            database: DatabaseConfig {
                path: "lockdrop.db".into(),
            },
        }
    }

    #[test]
    fn test_valid_config() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.plasm.network.ss58_prefix(), 5);
        assert_eq!(config.plasm.network.token_symbol(), "PLD");
    }

    #[test]
    fn test_rejects_zero_interval_and_attempts() {
        let mut config = sample();
        config.claim.poll_interval_secs = 0;
        assert!(matches!(config.validate(), Err(ClaimError::Config(_))));

        let mut config = sample();
        config.claim.pow_max_attempts = 0;
        assert!(matches!(config.validate(), Err(ClaimError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_contract_address() {
        let mut config = sample();
        config.ethereum.contract_address = "0x1234".into();
        assert!(matches!(config.validate(), Err(ClaimError::Config(_))));
    }

    #[test]
    fn test_claim_defaults_from_toml() {
        let source = r#"
            [ethereum]
            rpc_url = "http://localhost:8545"
            contract_address = "0x458dabf1eff8fcdfbf0896a6bd1f457c01e2ffd6"

            [plasm]
            network = "Plasm"

            [claim]

            [database]
            path = "lockdrop.db"
        "#;
        let config: Config = toml::from_str(source).unwrap();
        assert_eq!(config.claim.poll_interval_secs, 15);
        assert_eq!(config.claim.pow_difficulty_bits, 8);
        assert_eq!(config.ethereum.from_block, 0);
        assert_eq!(config.plasm.network, Network::Plasm);
    }
}
