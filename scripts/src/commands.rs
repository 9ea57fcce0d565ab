//! Implementations of the various deployment scripts

use std::{path::Path, str::FromStr};

use alloy::primitives::{utils::format_ether, Address, U256};
use bunny_config::{
    compiler::SOLC,
    keys::load_signing_keys,
    networks::{NetworkConfig, SignerSource, GWEI, NETWORKS},
};
use itertools::Itertools;
use tracing::info;

use crate::{
    cli::{CompileArgs, ContractSizeArgs, MigrateArgs, UpgradeArgs},
    client::setup_client,
    compile::compile,
    deployer::{ChainDeployer, TxOutcome},
    dry_run::dry_run,
    errors::ScriptError,
    manifest::Manifest,
    migrations::{pending_migrations, run_migrations},
    proxy::{upgrade_proxy, UpgradeCall},
    size::{contract_size_report, format_report},
};

/// Run the pending migrations on `network`, dry running them first unless
/// the network or the arguments say otherwise
pub async fn migrate(
    args: MigrateArgs,
    network: &NetworkConfig,
    build_dir: &Path,
    manifest_dir: &Path,
) -> Result<(), ScriptError> {
    let mut manifest = Manifest::load(manifest_dir, network.name)?;
    let pending = pending_migrations(&manifest, args.reset);
    if pending.is_empty() {
        info!("network `{}` is up to date", network.name);
        return Ok(());
    }

    let deployer = connect(network).await?;

    if should_dry_run(&args, network) {
        let report = dry_run(&deployer, build_dir, &manifest, &pending).await?;
        info!(
            "dry run passed: {} transactions from {:#x}, costing at most {} of {} available",
            report.transactions,
            report.sender,
            format_ether(report.required_balance),
            format_ether(report.balance)
        );

        if args.dry_run {
            return Ok(());
        }
    }

    let transactions = run_migrations(&deployer, build_dir, &mut manifest, &pending).await?;
    log_summary(&transactions, network);

    Ok(())
}

/// Whether `migrate` dry runs first: always with `--dry-run`, otherwise
/// unless the network or `--skip-dry-run` skips it
fn should_dry_run(args: &MigrateArgs, network: &NetworkConfig) -> bool {
    args.dry_run || !(network.skip_dry_run || args.skip_dry_run)
}

/// Upgrade a proxy on `network` to the current build of a contract
pub async fn upgrade(
    args: UpgradeArgs,
    network: &NetworkConfig,
    build_dir: &Path,
    manifest_dir: &Path,
) -> Result<(), ScriptError> {
    let proxy = Address::from_str(&args.proxy)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
    let call = args.call.map(|function| UpgradeCall {
        function,
        args: args.args,
    });

    let mut manifest = Manifest::load(manifest_dir, network.name)?;
    let deployer = connect(network).await?;

    let upgraded = upgrade_proxy(
        &deployer,
        build_dir,
        &mut manifest,
        proxy,
        &args.contract,
        call.as_ref(),
    )
    .await?;
    log_summary(&upgraded.transactions, network);

    Ok(())
}

/// Compile the Solidity sources into `build_dir`
pub fn compile_contracts(args: CompileArgs, build_dir: &Path) -> Result<(), ScriptError> {
    let written = compile(&args.contracts_dir, build_dir, args.solc.as_deref(), &SOLC)?;
    info!(
        "wrote {} artifacts to {}",
        written.len(),
        build_dir.display()
    );

    Ok(())
}

/// Print the code size of every artifact in `build_dir`
pub fn contract_size(args: ContractSizeArgs, build_dir: &Path) -> Result<(), ScriptError> {
    let sizes = contract_size_report(build_dir, args.check)?;
    println!("{}", format_report(&sizes));

    Ok(())
}

/// Print the network table
pub fn list_networks() {
    let rows = NETWORKS
        .iter()
        .map(|network| {
            format!(
                "{:<12} id {:<3} {} (gas {} @ {} gwei, {} confirmations{})",
                network.name,
                network.network_id.to_string(),
                network.endpoint.url(),
                network.gas.limit,
                network.gas.price / GWEI,
                network.confirmations,
                if network.skip_dry_run {
                    ", no dry run"
                } else {
                    ""
                }
            )
        })
        .join("\n");

    println!("{}", rows);
}

/// Connect to `network`, reading the signing key from the environment when
/// the network signs locally
async fn connect(network: &NetworkConfig) -> Result<ChainDeployer, ScriptError> {
    let keys = match network.signer {
        SignerSource::PrivateKeys => Some(load_signing_keys()?),
        SignerSource::NodeAccounts => None,
    };

    setup_client(network, keys.as_ref()).await
}

/// Log the number of transactions sent and what they cost
fn log_summary(transactions: &[TxOutcome], network: &NetworkConfig) {
    let gas_used: u64 = transactions.iter().map(|tx| tx.gas_used).sum();
    let cost = U256::from(gas_used) * U256::from(network.gas.price);

    info!(
        "sent {} transactions on `{}`: {} gas, {} total cost",
        transactions.len(),
        network.name,
        gas_used,
        format_ether(cost)
    );
}
