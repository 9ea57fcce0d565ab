//! Constants used in the deployment scripts

use std::time::Duration;

/// The contract deployed behind a proxy by the first migration
pub const BUNNY_MINTER_CONTRACT: &str = "BunnyMinterV2";

/// The initializer called through the proxy on deployment
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// The name of the proxy admin artifact
pub const PROXY_ADMIN_CONTRACT: &str = "ProxyAdmin";

/// The name of the transparent proxy artifact
pub const PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";

/// The default directory holding compiled contract artifacts
pub const DEFAULT_BUILD_DIR: &str = "build/contracts";

/// The default directory holding Solidity sources
pub const DEFAULT_CONTRACTS_DIR: &str = "contracts";

/// The OpenZeppelin proxy sources, compiled with the project so the proxy
/// artifacts are available to deployments. Paths match the `@openzeppelin/`
/// remapping so imports of the same files resolve to the same source units.
pub const PROXY_SOURCES: &[&str] = &[
    "node_modules/@openzeppelin/contracts/proxy/ProxyAdmin.sol",
    "node_modules/@openzeppelin/contracts/proxy/TransparentUpgradeableProxy.sol",
];

/// The default directory holding per-network deployment manifests
pub const DEFAULT_MANIFEST_DIR: &str = ".openzeppelin";

/// The extension of artifact and manifest files
pub const JSON_EXTENSION: &str = "json";

/// The extension of Solidity source files
pub const SOLIDITY_EXTENSION: &str = "sol";

/// The version of the deployment manifest format
pub const MANIFEST_VERSION: &str = "3.2";

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The storage slot containing the implementation contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// How often to poll the node for a transaction receipt
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The longest expected gap between blocks. Waiting for a transaction gives up
/// after this much time per timeout block, even if the chain stops producing blocks.
pub const MAX_BLOCK_INTERVAL: Duration = Duration::from_secs(15);

/// The maximum size of deployed contract code, per EIP-170
pub const MAX_CONTRACT_SIZE: usize = 24_576;

/// The name of the solc binary
pub const SOLC_COMMAND: &str = "solc";

/// The prefix of a library placeholder in unlinked bytecode
pub const LINK_PLACEHOLDER_PREFIX: &str = "__";
