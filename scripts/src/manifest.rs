//! The per-network record of deployed implementations, the proxy admin,
//! proxies, and completed migrations.
//!
//! One JSON file is kept per network so that a later run against the same
//! network can reuse what is already on chain.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::primitives::{Address, TxHash, B256};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{JSON_EXTENSION, MANIFEST_VERSION},
    errors::ScriptError,
};

/// A contract deployed by these scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// The name of the deployed contract
    pub contract: String,
    /// The address it was deployed to
    pub address: Address,
    /// The hash of the deployment transaction
    pub tx_hash: TxHash,
}

/// The kind of proxy deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    /// An OpenZeppelin `TransparentUpgradeableProxy`
    Transparent,
}

/// A deployed proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRecord {
    /// The contract the proxy forwards to
    pub contract: String,
    /// The proxy's address
    pub address: Address,
    /// The hash of the proxy deployment transaction
    pub tx_hash: TxHash,
    /// The kind of proxy
    pub kind: ProxyKind,
}

/// The deployment history of one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// The format version of the manifest file
    pub manifest_version: String,
    /// The proxy admin shared by every proxy on the network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<DeploymentRecord>,
    /// Every proxy deployed, oldest first
    #[serde(default)]
    pub proxies: Vec<ProxyRecord>,
    /// Deployed implementations, keyed by the hash of their creation code
    #[serde(default)]
    pub impls: BTreeMap<String, DeploymentRecord>,
    /// The number of the last migration that ran to completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_migration: Option<u32>,
    /// Where the manifest is stored
    #[serde(skip)]
    path: PathBuf,
}

impl Manifest {
    /// The path of the manifest for `network` in `dir`
    pub fn path_for(dir: &Path, network: &str) -> PathBuf {
        dir.join(format!("{}.{}", network, JSON_EXTENSION))
    }

    /// An empty manifest stored at `path`
    pub fn empty(path: PathBuf) -> Self {
        Self {
            manifest_version: MANIFEST_VERSION.to_string(),
            admin: None,
            proxies: Vec::new(),
            impls: BTreeMap::new(),
            last_completed_migration: None,
            path,
        }
    }

    /// Load the manifest for `network`, starting empty if none exists yet
    pub fn load(dir: &Path, network: &str) -> Result<Self, ScriptError> {
        let path = Self::path_for(dir, network);
        if !path.exists() {
            return Ok(Self::empty(path));
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ReadManifest(format!("{}: {}", path.display(), e)))?;
        let mut manifest: Manifest = serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ReadManifest(format!("{}: {}", path.display(), e)))?;
        manifest.path = path;

        Ok(manifest)
    }

    /// Persist the manifest, creating its directory if needed
    pub fn save(&self) -> Result<(), ScriptError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ScriptError::WriteManifest(e.to_string()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).map_err(|e| ScriptError::Serde(e.to_string()))?;
        fs::write(&self.path, contents)
            .map_err(|e| ScriptError::WriteManifest(format!("{}: {}", self.path.display(), e)))
    }

    /// Where the manifest is stored
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded implementation with the given code hash
    pub fn implementation(&self, code_hash: &B256) -> Option<&DeploymentRecord> {
        self.impls.get(&code_hash.to_string())
    }

    /// Record a deployed implementation
    pub fn record_implementation(&mut self, code_hash: &B256, record: DeploymentRecord) {
        self.impls.insert(code_hash.to_string(), record);
    }

    /// Forget a recorded implementation whose code is no longer on chain
    pub fn forget_implementation(&mut self, code_hash: &B256) {
        self.impls.remove(&code_hash.to_string());
    }

    /// Record a deployed proxy
    pub fn record_proxy(&mut self, record: ProxyRecord) {
        self.proxies.push(record);
    }

    /// Mark migration `number` as completed
    pub fn complete_migration(&mut self, number: u32) {
        self.last_completed_migration = Some(number);
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};

    use super::*;

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(dir.path(), "bsc").unwrap();

        assert!(manifest.admin.is_none());
        assert!(manifest.proxies.is_empty());
        assert!(manifest.impls.is_empty());
        assert_eq!(manifest.last_completed_migration, None);
        assert_eq!(manifest.path(), dir.path().join("bsc.json"));
    }

    #[test]
    fn test_manifest_persists_history() {
        let dir = tempfile::tempdir().unwrap();
        let code_hash = b256!("0x1111111111111111111111111111111111111111111111111111111111111111");
        let tx_hash = b256!("0x2222222222222222222222222222222222222222222222222222222222222222");
        let implementation = DeploymentRecord {
            contract: "BunnyMinterV2".to_string(),
            address: address!("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            tx_hash,
        };

        let mut manifest = Manifest::load(dir.path(), "development").unwrap();
        manifest.record_implementation(&code_hash, implementation.clone());
        manifest.record_proxy(ProxyRecord {
            contract: "BunnyMinterV2".to_string(),
            address: address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
            tx_hash,
            kind: ProxyKind::Transparent,
        });
        manifest.complete_migration(1);
        manifest.save().unwrap();

        let reloaded = Manifest::load(dir.path(), "development").unwrap();
        assert_eq!(reloaded, manifest);
        assert_eq!(reloaded.implementation(&code_hash), Some(&implementation));
        assert_eq!(reloaded.last_completed_migration, Some(1));
    }

    #[test]
    fn test_manifests_are_per_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::load(dir.path(), "bsc").unwrap();
        manifest.complete_migration(1);
        manifest.save().unwrap();

        let other = Manifest::load(dir.path(), "bsc_testnet").unwrap();
        assert_eq!(other.last_completed_migration, None);
    }

    #[test]
    fn test_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bsc.json"), "{ not json").unwrap();

        assert!(matches!(
            Manifest::load(dir.path(), "bsc"),
            Err(ScriptError::ReadManifest(_))
        ));
    }
}
