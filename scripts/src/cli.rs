//! Definitions of CLI arguments and commands for the deployment scripts

use std::path::{Path, PathBuf};

use bunny_config::networks::{NetworkConfig, DEFAULT_NETWORK};
use clap::{Args, Parser, Subcommand};

use crate::{
    commands::{compile_contracts, contract_size, list_networks, migrate, upgrade},
    constants::{
        BUNNY_MINTER_CONTRACT, DEFAULT_BUILD_DIR, DEFAULT_CONTRACTS_DIR, DEFAULT_MANIFEST_DIR,
    },
    errors::ScriptError,
};

/// Compile, deploy and upgrade the Bunny contracts
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The network to run against
    #[arg(short, long, global = true, default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Directory holding compiled contract artifacts
    #[arg(long, global = true, default_value = DEFAULT_BUILD_DIR)]
    pub build_dir: PathBuf,

    /// Directory holding the per-network deployment manifests
    #[arg(long, global = true, default_value = DEFAULT_MANIFEST_DIR)]
    pub manifest_dir: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The available commands
#[derive(Subcommand)]
pub enum Command {
    /// Run pending migrations
    Migrate(MigrateArgs),
    /// Upgrade a proxy to a new implementation
    Upgrade(UpgradeArgs),
    /// Compile the Solidity sources
    Compile(CompileArgs),
    /// Report contract code sizes
    ContractSize(ContractSizeArgs),
    /// List the configured networks
    Networks,
}

impl Command {
    /// Run the command against `network`
    pub async fn run(
        self,
        network: &NetworkConfig,
        build_dir: &Path,
        manifest_dir: &Path,
    ) -> Result<(), ScriptError> {
        match self {
            Command::Migrate(args) => migrate(args, network, build_dir, manifest_dir).await,
            Command::Upgrade(args) => upgrade(args, network, build_dir, manifest_dir).await,
            Command::Compile(args) => compile_contracts(args, build_dir),
            Command::ContractSize(args) => contract_size(args, build_dir),
            Command::Networks => {
                list_networks();
                Ok(())
            }
        }
    }
}

/// Run the migrations that have not yet completed on the network.
///
/// The first migration deploys `BunnyMinterV2` behind a
/// [`TransparentUpgradeableProxy`](https://docs.openzeppelin.com/contracts/3.x/api/proxy#TransparentUpgradeableProxy),
/// administered by the network's `ProxyAdmin`, and calls `initialize()` through the proxy.
#[derive(Args)]
pub struct MigrateArgs {
    /// Run every migration, including those already completed
    #[arg(long)]
    pub reset: bool,

    /// Only check that the pending migrations can run, sending nothing
    #[arg(long, conflicts_with = "skip_dry_run")]
    pub dry_run: bool,

    /// Skip the dry run even if the network asks for one
    #[arg(long)]
    pub skip_dry_run: bool,
}

/// Upgrade a proxy to the current build of a contract
#[derive(Args)]
pub struct UpgradeArgs {
    /// Address of the proxy contract
    #[arg(long)]
    pub proxy: String,

    /// The contract to upgrade to
    #[arg(short, long, default_value = BUNNY_MINTER_CONTRACT)]
    pub contract: String,

    /// Optional function of the new implementation to call through the proxy
    /// when upgrading
    #[arg(long)]
    pub call: Option<String>,

    /// Arguments of the function given with `--call`, in order
    #[arg(long = "arg", requires = "call")]
    pub args: Vec<String>,
}

/// Compile the Solidity sources into artifacts
#[derive(Args)]
pub struct CompileArgs {
    /// Directory holding the Solidity sources
    #[arg(long, default_value = DEFAULT_CONTRACTS_DIR)]
    pub contracts_dir: PathBuf,

    /// Path to the solc binary
    #[arg(long, env = "SOLC")]
    pub solc: Option<String>,
}

/// Report the deployed code size of every compiled contract
#[derive(Args)]
pub struct ContractSizeArgs {
    /// Fail if any contract exceeds the deployable size
    #[arg(long)]
    pub check: bool,
}
