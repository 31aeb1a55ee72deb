use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use poll_ledger::{Address, ParseHexError};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Chain identifier, as reported by the wallet.
pub type NetworkId = u64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read address book: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed address book: {0}")]
    Json(#[from] serde_json::Error),
    #[error("network key {0:?} is not a number")]
    InvalidNetwork(String),
    #[error("bad address for network {network}: {source}")]
    InvalidAddress {
        network: NetworkId,
        source: ParseHexError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    address: String,
    chain_id: Option<NetworkId>,
    chain_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    address: Address,
    chain_id: Option<NetworkId>,
    chain_name: Option<String>,
}

/// Where the poll lives on the active network, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deployment {
    pub network: Option<NetworkId>,
    pub ledger: Option<Address>,
    pub chain_name: Option<String>,
}

impl Deployment {
    pub fn is_configured(&self) -> bool {
        self.ledger.is_some()
    }
}

/// Deployed poll addresses per network.
///
/// The JSON form is an object keyed by decimal network id:
///
/// ```json
/// { "31337": { "address": "0x…", "chainId": 31337, "chainName": "hardhat" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<NetworkId, Entry>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(json)?;
        let mut book = Self::new();
        for (key, entry) in raw {
            let network: NetworkId = key
                .parse()
                .map_err(|_| ConfigError::InvalidNetwork(key.clone()))?;
            let address = entry
                .address
                .parse()
                .map_err(|source| ConfigError::InvalidAddress { network, source })?;
            book.entries.insert(
                network,
                Entry {
                    address,
                    chain_id: entry.chain_id,
                    chain_name: entry.chain_name,
                },
            );
        }
        Ok(book)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading address book");
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn insert(&mut self, network: NetworkId, address: Address, chain_name: Option<String>) {
        self.entries.insert(
            network,
            Entry {
                address,
                chain_id: Some(network),
                chain_name,
            },
        );
    }

    /// Looks up the poll for `network`. A missing entry, or one holding the
    /// zero address, yields a deployment without a ledger.
    pub fn resolve(&self, network: Option<NetworkId>) -> Deployment {
        let Some(network) = network else {
            return Deployment::default();
        };
        match self.entries.get(&network) {
            Some(entry) if !entry.address.is_zero() => Deployment {
                network: Some(entry.chain_id.unwrap_or(network)),
                ledger: Some(entry.address),
                chain_name: entry.chain_name.clone(),
            },
            _ => Deployment {
                network: Some(network),
                ..Deployment::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOK: &str = r#"{
        "11155111": {
            "address": "0x1111111111111111111111111111111111111111111111111111111111111111",
            "chainId": 11155111,
            "chainName": "sepolia"
        },
        "31337": {
            "address": "0x0000000000000000000000000000000000000000000000000000000000000000",
            "chainName": "hardhat"
        }
    }"#;

    #[test]
    fn resolves_configured_network() {
        let book = AddressBook::from_json_str(BOOK).unwrap();
        let deployment = book.resolve(Some(11155111));
        assert_eq!(deployment.ledger, Some(Address([0x11; 32])));
        assert_eq!(deployment.chain_name.as_deref(), Some("sepolia"));
        assert!(deployment.is_configured());
    }

    #[test]
    fn zero_address_means_not_deployed() {
        let book = AddressBook::from_json_str(BOOK).unwrap();
        let deployment = book.resolve(Some(31337));
        assert_eq!(deployment.network, Some(31337));
        assert!(!deployment.is_configured());
    }

    #[test]
    fn unknown_or_missing_network_is_not_an_error() {
        let book = AddressBook::from_json_str(BOOK).unwrap();
        assert_eq!(book.resolve(Some(1)).network, Some(1));
        assert!(!book.resolve(Some(1)).is_configured());
        assert_eq!(book.resolve(None), Deployment::default());
    }

    #[test]
    fn rejects_bad_keys_and_addresses() {
        let err = AddressBook::from_json_str(r#"{ "main": { "address": "0x00" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNetwork(key) if key == "main"));

        let err = AddressBook::from_json_str(r#"{ "5": { "address": "0x1234" } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress { network: 5, .. }));

        let err = AddressBook::from_json_str("[]").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn inserted_entries_resolve() {
        let mut book = AddressBook::new();
        book.insert(7, Address([7; 32]), None);
        assert_eq!(book.resolve(Some(7)).ledger, Some(Address([7; 32])));
    }
}
