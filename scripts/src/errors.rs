//! Definitions of errors that can occur during the execution of the deployment scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use bunny_config::errors::ConfigError;

/// Errors that can occur during the execution of the deployment scripts
#[derive(Debug)]
pub enum ScriptError {
    /// Error resolving the deployment configuration
    Config(ConfigError),
    /// Error reading a contract artifact
    ReadArtifact(String),
    /// Error parsing a contract artifact
    ArtifactParsing(String),
    /// Error reading the deployment manifest
    ReadManifest(String),
    /// Error writing the deployment manifest
    WriteManifest(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// The node reports a different network than the one configured
    NetworkMismatch {
        /// The configured network id
        expected: String,
        /// The network id reported by the node
        actual: u64,
    },
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// A transaction was mined but reverted
    TransactionReverted(String),
    /// A transaction was not mined within the configured number of blocks
    TransactionTimeout(String),
    /// A deployed proxy does not point at the expected contracts
    ProxyVerification(String),
    /// The dry run found the deployment cannot succeed
    DryRun(String),
    /// The locally available compiler is not the configured version
    CompilerVersionMismatch {
        /// The configured version
        expected: String,
        /// The output of `solc --version`
        actual: String,
    },
    /// Error compiling the Solidity sources
    ContractCompilation(String),
    /// A contract exceeds the deployable code size
    ContractSize(String),
    /// Error de/serializing JSON
    Serde(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Config(e) => write!(f, "configuration error: {}", e),
            ScriptError::ReadArtifact(s) => write!(f, "error reading artifact: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ReadManifest(s) => write!(f, "error reading manifest: {}", s),
            ScriptError::WriteManifest(s) => write!(f, "error writing manifest: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::NetworkMismatch { expected, actual } => write!(
                f,
                "network id mismatch: expected {}, node reports {}",
                expected, actual
            ),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::TransactionReverted(s) => write!(f, "transaction reverted: {}", s),
            ScriptError::TransactionTimeout(s) => write!(f, "transaction timed out: {}", s),
            ScriptError::ProxyVerification(s) => write!(f, "error verifying proxy: {}", s),
            ScriptError::DryRun(s) => write!(f, "dry run failed: {}", s),
            ScriptError::CompilerVersionMismatch { expected, actual } => write!(
                f,
                "solc version mismatch: expected {}, found `{}`",
                expected, actual
            ),
            ScriptError::ContractCompilation(s) => write!(f, "error compiling contracts: {}", s),
            ScriptError::ContractSize(s) => write!(f, "contract too large: {}", s),
            ScriptError::Serde(s) => write!(f, "error de/serializing JSON: {}", s),
        }
    }
}

impl Error for ScriptError {}

impl From<ConfigError> for ScriptError {
    fn from(e: ConfigError) -> Self {
        ScriptError::Config(e)
    }
}
