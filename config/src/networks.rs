//! The table of networks contracts can be deployed to.
//!
//! Each entry carries everything needed to open a connection and submit
//! transactions: the RPC endpoint, the expected network id, where signing
//! authority comes from, and the fixed gas parameters. A deployment run
//! selects exactly one entry by name.

use std::fmt::{self, Display};

use crate::errors::ConfigError;

/// One gwei, in wei
pub const GWEI: u128 = 1_000_000_000;

/// The gas limit used when a network does not set one
pub const DEFAULT_GAS_LIMIT: u64 = 6_721_975;

/// The number of blocks to wait for a transaction to be mined when a network
/// does not set one
pub const DEFAULT_TIMEOUT_BLOCKS: u64 = 50;

/// The name of the network selected when none is given
pub const DEFAULT_NETWORK: &str = "development";

/// Where the RPC node of a network is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// A node addressed by protocol, host and port
    Node {
        /// The URL scheme, e.g. `http`
        protocol: &'static str,
        /// The node's host name
        host: &'static str,
        /// The node's port
        port: u16,
    },
    /// A node addressed by a full URL
    Url(&'static str),
}

impl Endpoint {
    /// Render the endpoint as an RPC URL
    pub fn url(&self) -> String {
        match self {
            Endpoint::Node {
                protocol,
                host,
                port,
            } => format!("{}://{}:{}", protocol, host, port),
            Endpoint::Url(url) => url.to_string(),
        }
    }
}

/// The network id a node is expected to report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkId {
    /// Any network id is accepted
    Any,
    /// Only this network id is accepted
    Exact(u64),
}

impl NetworkId {
    /// Whether a node reporting `id` satisfies this expectation
    pub fn matches(&self, id: u64) -> bool {
        match self {
            NetworkId::Any => true,
            NetworkId::Exact(expected) => *expected == id,
        }
    }
}

impl Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Any => write!(f, "*"),
            NetworkId::Exact(id) => write!(f, "{}", id),
        }
    }
}

/// Where transactions sent to a network get their signature from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerSource {
    /// The node signs with its own unlocked accounts
    NodeAccounts,
    /// Transactions are signed locally with the keys from the environment
    PrivateKeys,
}

/// Fixed gas parameters for every transaction sent to a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    /// The gas limit of each transaction
    pub limit: u64,
    /// The gas price, in wei
    pub price: u128,
}

impl GasParams {
    /// The most a single transaction can cost, in wei
    pub fn max_fee(&self) -> u128 {
        self.limit as u128 * self.price
    }
}

/// The connection parameters of a single network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    /// The name used to select this network
    pub name: &'static str,
    /// The RPC endpoint
    pub endpoint: Endpoint,
    /// The network id the node must report
    pub network_id: NetworkId,
    /// Where signing authority comes from
    pub signer: SignerSource,
    /// Gas limit and price
    pub gas: GasParams,
    /// Blocks to wait after a transaction is mined before treating it as final
    pub confirmations: u64,
    /// Blocks to wait for a transaction to be mined before giving up
    pub timeout_blocks: u64,
    /// Whether to skip the dry run before deploying
    pub skip_dry_run: bool,
}

/// Every configured network
pub const NETWORKS: &[NetworkConfig] = &[
    NetworkConfig {
        name: "development",
        endpoint: Endpoint::Node {
            protocol: "http",
            host: "localhost",
            port: 8545,
        },
        network_id: NetworkId::Any,
        signer: SignerSource::NodeAccounts,
        gas: GasParams {
            limit: 5_000_000,
            price: 5 * GWEI,
        },
        confirmations: 0,
        timeout_blocks: DEFAULT_TIMEOUT_BLOCKS,
        skip_dry_run: false,
    },
    NetworkConfig {
        name: "bsc",
        endpoint: Endpoint::Url("https://bsc-dataseed.binance.org"),
        network_id: NetworkId::Exact(56),
        signer: SignerSource::PrivateKeys,
        gas: GasParams {
            limit: 6_000_000,
            price: 20 * GWEI,
        },
        confirmations: 0,
        timeout_blocks: DEFAULT_TIMEOUT_BLOCKS,
        skip_dry_run: false,
    },
    NetworkConfig {
        name: "bsc_testnet",
        endpoint: Endpoint::Url("https://data-seed-prebsc-1-s2.binance.org:8545"),
        network_id: NetworkId::Exact(97),
        signer: SignerSource::PrivateKeys,
        gas: GasParams {
            limit: DEFAULT_GAS_LIMIT,
            price: 10 * GWEI,
        },
        confirmations: 3,
        timeout_blocks: 200,
        skip_dry_run: true,
    },
];

/// Look up a network by name
pub fn resolve_network(name: &str) -> Result<&'static NetworkConfig, ConfigError> {
    NETWORKS
        .iter()
        .find(|network| network.name == name)
        .ok_or_else(|| ConfigError::UnknownNetwork(name.to_string()))
}
