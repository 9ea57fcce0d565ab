//! Deployed code size of the compiled contracts

use std::path::Path;

use itertools::Itertools;
use tracing::warn;

use crate::{
    artifacts::Artifact,
    constants::{LINK_PLACEHOLDER_PREFIX, MAX_CONTRACT_SIZE},
    errors::ScriptError,
};

/// The runtime code size of one contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSize {
    /// The contract's name
    pub name: String,
    /// The size of its runtime code, in bytes
    pub bytes: usize,
}

impl ContractSize {
    /// Whether the contract is too large to deploy
    pub fn exceeds_limit(&self) -> bool {
        self.bytes > MAX_CONTRACT_SIZE
    }
}

/// The runtime code size of every artifact with code, largest first
pub fn contract_sizes(artifacts: &[Artifact]) -> Result<Vec<ContractSize>, ScriptError> {
    let mut sizes = Vec::new();
    for artifact in artifacts {
        if let Some(bytes) = runtime_size(artifact)? {
            sizes.push(ContractSize {
                name: artifact.contract_name.clone(),
                bytes,
            });
        }
    }

    Ok(sizes
        .into_iter()
        .sorted_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.name.cmp(&b.name)))
        .collect())
}

/// The runtime code size of `artifact`, or `None` for interfaces and
/// abstract contracts
fn runtime_size(artifact: &Artifact) -> Result<Option<usize>, ScriptError> {
    let hex = artifact.deployed_bytecode.trim_start_matches("0x");
    if hex.is_empty() {
        return Ok(None);
    }

    // Unlinked placeholders are as long as the addresses replacing them
    if hex.contains(LINK_PLACEHOLDER_PREFIX) {
        return Ok(Some(hex.len() / 2));
    }

    artifact.runtime_code().map(|code| Some(code.len()))
}

/// Render sizes as a table, in KiB
pub fn format_report(sizes: &[ContractSize]) -> String {
    let width = sizes
        .iter()
        .map(|size| size.name.len())
        .max()
        .unwrap_or(0);

    sizes
        .iter()
        .map(|size| {
            format!(
                "{:<width$}  {:>7.2} KiB{}",
                size.name,
                size.bytes as f64 / 1024.0,
                if size.exceeds_limit() { "  (exceeds limit)" } else { "" },
                width = width
            )
        })
        .join("\n")
}

/// Measure the artifacts in `build_dir`. With `check`, fail if any contract
/// exceeds the EIP-170 limit.
pub fn contract_size_report(build_dir: &Path, check: bool) -> Result<Vec<ContractSize>, ScriptError> {
    let sizes = contract_sizes(&Artifact::load_all(build_dir)?)?;

    let oversized = sizes
        .iter()
        .filter(|size| size.exceeds_limit())
        .map(|size| size.name.as_str())
        .collect_vec();
    if !oversized.is_empty() {
        let names = oversized.join(", ");
        if check {
            return Err(ScriptError::ContractSize(names));
        }
        warn!("contracts exceeding {} bytes: {}", MAX_CONTRACT_SIZE, names);
    }

    Ok(sizes)
}
