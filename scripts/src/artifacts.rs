//! Compiled contract artifacts, stored as one JSON file per contract

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::{
    json_abi::JsonAbi,
    primitives::{keccak256, Bytes, B256},
};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{JSON_EXTENSION, LINK_PLACEHOLDER_PREFIX},
    errors::ScriptError,
};

/// The compiler that produced an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    /// The compiler name, e.g. `solc`
    pub name: String,
    /// The full compiler version
    pub version: String,
}

/// A compiled contract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// The contract's name
    pub contract_name: String,
    /// The path of the source file the contract was compiled from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// The contract's ABI
    pub abi: JsonAbi,
    /// The creation bytecode, hex encoded
    pub bytecode: String,
    /// The runtime bytecode, hex encoded
    pub deployed_bytecode: String,
    /// The compiler that produced the artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerInfo>,
}

impl Artifact {
    /// The path of the artifact for `contract_name` in `build_dir`
    pub fn path(build_dir: &Path, contract_name: &str) -> PathBuf {
        build_dir.join(format!("{}.{}", contract_name, JSON_EXTENSION))
    }

    /// Load the artifact for `contract_name` from `build_dir`
    pub fn load(build_dir: &Path, contract_name: &str) -> Result<Self, ScriptError> {
        let path = Self::path(build_dir, contract_name);
        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ReadArtifact(format!("{}: {}", path.display(), e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))
    }

    /// Load every artifact in `build_dir`, sorted by contract name
    pub fn load_all(build_dir: &Path) -> Result<Vec<Self>, ScriptError> {
        let entries = fs::read_dir(build_dir)
            .map_err(|e| ScriptError::ReadArtifact(format!("{}: {}", build_dir.display(), e)))?;

        let mut artifacts = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| ScriptError::ReadArtifact(e.to_string()))?
                .path();
            if !path.extension().is_some_and(|ext| ext == JSON_EXTENSION) {
                continue;
            }

            let contents = fs::read_to_string(&path)
                .map_err(|e| ScriptError::ReadArtifact(format!("{}: {}", path.display(), e)))?;
            let artifact = serde_json::from_str(&contents)
                .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))?;
            artifacts.push(artifact);
        }

        artifacts.sort_by(|a: &Artifact, b| a.contract_name.cmp(&b.contract_name));
        Ok(artifacts)
    }

    /// Write the artifact into `build_dir`, creating the directory if needed
    pub fn save(&self, build_dir: &Path) -> Result<PathBuf, ScriptError> {
        fs::create_dir_all(build_dir)
            .map_err(|e| ScriptError::ContractCompilation(e.to_string()))?;

        let path = Self::path(build_dir, &self.contract_name);
        let contents =
            serde_json::to_string_pretty(self).map_err(|e| ScriptError::Serde(e.to_string()))?;
        fs::write(&path, contents)
            .map_err(|e| ScriptError::ContractCompilation(format!("{}: {}", path.display(), e)))?;

        Ok(path)
    }

    /// The creation bytecode, ready to be sent in a deployment transaction
    pub fn creation_code(&self) -> Result<Bytes, ScriptError> {
        self.decode_code(&self.bytecode, "bytecode")
    }

    /// The runtime bytecode
    pub fn runtime_code(&self) -> Result<Bytes, ScriptError> {
        self.decode_code(&self.deployed_bytecode, "deployedBytecode")
    }

    /// The hash identifying this version of the contract's code
    pub fn code_hash(&self) -> Result<B256, ScriptError> {
        Ok(keccak256(self.creation_code()?))
    }

    /// Decode a hex bytecode field, rejecting unlinked or empty code
    fn decode_code(&self, code: &str, field: &str) -> Result<Bytes, ScriptError> {
        if code.contains(LINK_PLACEHOLDER_PREFIX) {
            return Err(ScriptError::ArtifactParsing(format!(
                "{} {} references unlinked libraries",
                self.contract_name, field
            )));
        }

        let bytes = Bytes::from_str(code).map_err(|e| {
            ScriptError::ArtifactParsing(format!("{} {}: {}", self.contract_name, field, e))
        })?;
        if bytes.is_empty() {
            return Err(ScriptError::ArtifactParsing(format!(
                "{} has no {}, is it abstract or an interface?",
                self.contract_name, field
            )));
        }

        Ok(bytes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an artifact with the given name, ABI JSON and code
    pub(crate) fn mock_artifact(name: &str, abi: &str, bytecode: &str) -> Artifact {
        Artifact {
            contract_name: name.to_string(),
            source_path: None,
            abi: serde_json::from_str(abi).unwrap(),
            bytecode: bytecode.to_string(),
            deployed_bytecode: bytecode.to_string(),
            compiler: None,
        }
    }

    #[test]
    fn test_parse_truffle_artifact() {
        let json = r#"{
            "contractName": "BunnyMinterV2",
            "abi": [
                {"type": "function", "name": "initialize", "inputs": [], "outputs": [], "stateMutability": "nonpayable"}
            ],
            "bytecode": "0x6080604052",
            "deployedBytecode": "0x60806040",
            "updatedAt": "2021-05-01T00:00:00.000Z",
            "networks": {}
        }"#;

        let artifact: Artifact = serde_json::from_str(json).unwrap();
        assert_eq!(artifact.contract_name, "BunnyMinterV2");
        assert!(artifact.abi.function("initialize").is_some());
        assert_eq!(artifact.creation_code().unwrap().len(), 5);
        assert_eq!(artifact.runtime_code().unwrap().len(), 4);
    }

    #[test]
    fn test_unlinked_bytecode_rejected() {
        let artifact = mock_artifact(
            "Linked",
            "[]",
            "0x6080__$1234567890abcdef1234567890abcdef12$__6040",
        );
        assert!(matches!(
            artifact.creation_code(),
            Err(ScriptError::ArtifactParsing(_))
        ));
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let artifact = mock_artifact("IThing", "[]", "0x");
        assert!(matches!(
            artifact.creation_code(),
            Err(ScriptError::ArtifactParsing(_))
        ));
    }

    #[test]
    fn test_save_and_load_all() {
        let dir = tempfile::tempdir().unwrap();
        mock_artifact("Zeta", "[]", "0x01").save(dir.path()).unwrap();
        mock_artifact("Alpha", "[]", "0x02").save(dir.path()).unwrap();
        fs::write(dir.path().join("README.md"), "not an artifact").unwrap();

        let loaded = Artifact::load(dir.path(), "Zeta").unwrap();
        assert_eq!(loaded.bytecode, "0x01");

        let names: Vec<_> = Artifact::load_all(dir.path())
            .unwrap()
            .into_iter()
            .map(|a| a.contract_name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Artifact::load(dir.path(), "Missing"),
            Err(ScriptError::ReadArtifact(_))
        ));
    }
}
