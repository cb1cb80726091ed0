//! Network configuration, deployment registry and contract address resolution.

use std::{collections::BTreeMap, fs, path::Path, str::FromStr};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};

pub const ETH_SEPOLIA: u64 = 11_155_111;
pub const ARB_SEPOLIA: u64 = 421_614;
pub const BASE_SEPOLIA: u64 = 84_532;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing {path}: {reason}")]
    Parse { path: String, reason: String },
}

impl ConfigError {
    /// Label used for documents that were not read from a file.
    pub const INLINE: &'static str = "<inline>";

    fn parse(reason: impl Into<String>) -> Self {
        ConfigError::Parse {
            path: Self::INLINE.to_string(),
            reason: reason.into(),
        }
    }

    /// Attribute a parse failure to the file it came from.
    fn at(self, file: &Path) -> Self {
        match self {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: file.display().to_string(),
                reason,
            },
            other => other,
        }
    }
}

/// Contracts a network knows about. Any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default)]
    pub bridge: Option<Address>,
    #[serde(default)]
    pub confidential_token: Option<Address>,
    #[serde(default)]
    pub plain_token: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    /// Short identifier, e.g. `arb-sepolia`.
    pub id: String,
    pub chain_id: u64,
    /// LayerZero endpoint id used by the bridge's messaging layer.
    pub layerzero_eid: u32,
    #[serde(default)]
    pub contracts: ContractAddresses,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub networks: Vec<Network>,
}

impl NetworkConfig {
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Built-in testnets, without contract addresses.
    pub fn testnets() -> Self {
        let network = |name: &str, id: &str, chain_id, layerzero_eid| Network {
            name: name.to_string(),
            id: id.to_string(),
            chain_id,
            layerzero_eid,
            contracts: ContractAddresses::default(),
        };
        Self {
            networks: vec![
                network("Ethereum Sepolia", "eth-sepolia", ETH_SEPOLIA, 40161),
                network("Arbitrum Sepolia", "arb-sepolia", ARB_SEPOLIA, 40231),
                network("Base Sepolia", "base-sepolia", BASE_SEPOLIA, 40245),
            ],
        }
    }

    pub fn network(&self, chain_id: u64) -> Option<&Network> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    pub fn require(&self, chain_id: u64) -> Result<&Network> {
        self.network(chain_id).ok_or(Error::ChainNotConfigured(chain_id))
    }
}

/// Peer chain used when a caller does not pick a destination.
pub fn default_destination_chain(origin_chain_id: u64) -> u64 {
    match origin_chain_id {
        ETH_SEPOLIA => ARB_SEPOLIA,
        _ => ETH_SEPOLIA,
    }
}

/// Contract names as recorded in the deployments document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKey {
    Bridge,
    ConfidentialToken,
    PlainToken,
}

impl ContractKey {
    pub const fn deployment_name(self) -> &'static str {
        match self {
            ContractKey::Bridge => "FhenixBridge",
            ContractKey::ConfidentialToken => "eERC20",
            ContractKey::PlainToken => "SimpleERC20",
        }
    }

    fn from_config(self, contracts: &ContractAddresses) -> Option<Address> {
        match self {
            ContractKey::Bridge => contracts.bridge,
            ContractKey::ConfidentialToken => contracts.confidential_token,
            ContractKey::PlainToken => contracts.plain_token,
        }
    }
}

/// Deployments document:
/// `{ "network": .., "updated_at": .., "deployments": { name: { "address": .. } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentRegistry {
    pub network: Option<String>,
    addresses: BTreeMap<String, Address>,
}

impl DeploymentRegistry {
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw).map_err(|err| err.at(path))
    }

    pub fn from_json(raw: &str) -> std::result::Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let root: Value = serde_json::from_str(raw).map_err(|e| ConfigError::parse(e.to_string()))?;

        let network = root.get("network").and_then(Value::as_str).map(str::to_string);
        let mut addresses = BTreeMap::new();
        if let Some(entries) = root.get("deployments").and_then(Value::as_object) {
            for (name, entry) in entries {
                let Some(raw_address) = entry.get("address").and_then(Value::as_str) else {
                    continue;
                };
                let address = Address::from_str(raw_address).map_err(|_| {
                    ConfigError::parse(format!(
                        "deployment {name} has invalid address {raw_address:?}"
                    ))
                })?;
                addresses.insert(name.clone(), address);
            }
        }
        Ok(Self { network, addresses })
    }

    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.addresses.insert(name.into(), address);
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.addresses.get(name).copied()
    }
}

/// Resolves contract addresses: explicit argument, then deployments, then network config.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    chain_id: u64,
    config: NetworkConfig,
    deployments: Option<DeploymentRegistry>,
}

impl AddressResolver {
    pub fn new(
        chain_id: u64,
        config: NetworkConfig,
        deployments: Option<DeploymentRegistry>,
    ) -> Self {
        Self {
            chain_id,
            config,
            deployments,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Never returns the zero address; an explicit zero counts as "not given".
    pub fn resolve(&self, key: ContractKey, explicit: Option<Address>) -> Result<Address> {
        let from_deployments = || {
            self.deployments
                .as_ref()
                .and_then(|d| d.get(key.deployment_name()))
        };
        let from_config = || {
            self.config
                .network(self.chain_id)
                .and_then(|n| key.from_config(&n.contracts))
        };

        explicit
            .filter(|a| *a != Address::ZERO)
            .or_else(|| from_deployments().filter(|a| *a != Address::ZERO))
            .or_else(|| from_config().filter(|a| *a != Address::ZERO))
            .ok_or_else(|| Error::AddressNotFound {
                key: format!("{} (chain {})", key.deployment_name(), self.chain_id),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYMENTS: &str = r#"{
        "network": "arb-sepolia",
        "updated_at": "2025-01-01T00:00:00Z",
        "deployments": {
            "eERC20": { "address": "0x1111111111111111111111111111111111111111", "rpc_url": "http://localhost" },
            "FhenixBridge": { "address": "0x0000000000000000000000000000000000000000" },
            "notes": { "comment": "no address" }
        }
    }"#;

    fn config_with_token(token: Address) -> NetworkConfig {
        let mut config = NetworkConfig::testnets();
        for n in &mut config.networks {
            if n.chain_id == ARB_SEPOLIA {
                n.contracts.confidential_token = Some(token);
                n.contracts.bridge = Some(Address::repeat_byte(0x0b));
            }
        }
        config
    }

    #[test]
    fn testnets_and_default_destination() {
        let config = NetworkConfig::testnets();
        assert_eq!(config.network(BASE_SEPOLIA).unwrap().layerzero_eid, 40245);
        assert!(config.network(1).is_none());
        assert!(matches!(config.require(1), Err(Error::ChainNotConfigured(1))));

        assert_eq!(default_destination_chain(ETH_SEPOLIA), ARB_SEPOLIA);
        assert_eq!(default_destination_chain(ARB_SEPOLIA), ETH_SEPOLIA);
        assert_eq!(default_destination_chain(BASE_SEPOLIA), ETH_SEPOLIA);
    }

    #[test]
    fn network_config_parses_json() {
        let raw = r#"{ "networks": [ {
            "name": "Arbitrum Sepolia", "id": "arb-sepolia", "chain_id": 421614, "layerzero_eid": 40231,
            "contracts": { "bridge": "0x2222222222222222222222222222222222222222" }
        } ] }"#;
        let config: NetworkConfig = serde_json::from_str(raw).unwrap();
        let n = config.network(ARB_SEPOLIA).unwrap();
        assert_eq!(n.contracts.bridge, Some(Address::repeat_byte(0x22)));
        assert_eq!(n.contracts.confidential_token, None);
    }

    #[test]
    fn registry_reads_deployer_layout() {
        let reg = DeploymentRegistry::from_json(DEPLOYMENTS).unwrap();
        assert_eq!(reg.network.as_deref(), Some("arb-sepolia"));
        assert_eq!(reg.get("eERC20"), Some(Address::repeat_byte(0x11)));
        assert_eq!(reg.get("notes"), None);
        assert!(DeploymentRegistry::from_json("").unwrap().get("eERC20").is_none());
    }

    #[test]
    fn registry_errors_are_typed_and_name_their_file() {
        let err = DeploymentRegistry::from_json("{ not json").unwrap_err();
        assert!(matches!(&err, ConfigError::Parse { path, .. } if path == ConfigError::INLINE));

        let raw = r#"{ "deployments": { "eERC20": { "address": "0x12" } } }"#;
        match DeploymentRegistry::from_json(raw) {
            Err(ConfigError::Parse { reason, .. }) => assert!(reason.contains("eERC20")),
            other => panic!("unexpected {other:?}"),
        }

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("deployments.arb-sepolia.json");
        std::fs::write(&file, raw).unwrap();
        match DeploymentRegistry::load(&file) {
            Err(ConfigError::Parse { path, .. }) => {
                assert!(path.ends_with("deployments.arb-sepolia.json"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resolution_order() {
        let reg = DeploymentRegistry::from_json(DEPLOYMENTS).unwrap();
        let config_token = Address::repeat_byte(0x99);
        let resolver =
            AddressResolver::new(ARB_SEPOLIA, config_with_token(config_token), Some(reg));

        let explicit = Address::repeat_byte(0x77);
        assert_eq!(
            resolver.resolve(ContractKey::ConfidentialToken, Some(explicit)).unwrap(),
            explicit
        );
        assert_eq!(
            resolver.resolve(ContractKey::ConfidentialToken, Some(Address::ZERO)).unwrap(),
            Address::repeat_byte(0x11)
        );
        // Zero in the registry falls through to config.
        assert_eq!(
            resolver.resolve(ContractKey::Bridge, None).unwrap(),
            Address::repeat_byte(0x0b)
        );

        let resolver = AddressResolver::new(ARB_SEPOLIA, config_with_token(config_token), None);
        assert_eq!(resolver.resolve(ContractKey::ConfidentialToken, None).unwrap(), config_token);
    }

    #[test]
    fn missing_address_names_the_key() {
        let resolver = AddressResolver::new(BASE_SEPOLIA, NetworkConfig::testnets(), None);
        match resolver.resolve(ContractKey::PlainToken, None) {
            Err(Error::AddressNotFound { key }) => assert!(key.contains("SimpleERC20")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
