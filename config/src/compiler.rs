//! Solidity compiler settings

use serde_json::{json, Value};

/// Optimizer settings passed to solc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerSettings {
    /// Whether the optimizer runs at all
    pub enabled: bool,
    /// The expected number of executions of each opcode over the contract's lifetime
    pub runs: u32,
}

/// The settings every contract in the project is compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerSettings {
    /// The exact solc version required
    pub version: &'static str,
    /// The target EVM version
    pub evm_version: &'static str,
    /// Optimizer settings
    pub optimizer: OptimizerSettings,
    /// Import remappings, in solc's `prefix=target` form
    pub remappings: &'static [&'static str],
}

/// The project's solc configuration
pub const SOLC: CompilerSettings = CompilerSettings {
    version: "0.6.12",
    evm_version: "istanbul",
    optimizer: OptimizerSettings {
        enabled: true,
        runs: 200,
    },
    remappings: &["@openzeppelin/=node_modules/@openzeppelin/"],
};

impl CompilerSettings {
    /// The `settings` object of a solc standard-JSON input
    pub fn standard_json_settings(&self) -> Value {
        json!({
            "evmVersion": self.evm_version,
            "optimizer": {
                "enabled": self.optimizer.enabled,
                "runs": self.optimizer.runs,
            },
            "remappings": self.remappings,
            "outputSelection": {
                "*": {
                    "*": ["abi", "evm.bytecode.object", "evm.deployedBytecode.object"],
                },
            },
        })
    }
}
