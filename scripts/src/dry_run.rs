//! A preflight check of pending migrations that sends no transactions

use std::path::Path;

use alloy::primitives::{utils::format_ether, Address, U256};
use tracing::info;

use crate::{
    deployer::Deployer, errors::ScriptError, manifest::Manifest, migrations::Migration,
    proxy::plan_deploy_proxy,
};

/// What the pending migrations would cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunReport {
    /// The account the transactions would be sent from
    pub sender: Address,
    /// The number of transactions the migrations would send
    pub transactions: u64,
    /// The balance needed to pay for every transaction at the gas limit
    pub required_balance: U256,
    /// The sender's balance
    pub balance: U256,
}

/// Check that `migrations` can run: artifacts and initializers are valid,
/// each implementation deployment fits within the gas limit, and the sender
/// can pay for every transaction at the gas limit
pub async fn dry_run<D: Deployer>(
    deployer: &D,
    build_dir: &Path,
    manifest: &Manifest,
    migrations: &[Migration],
) -> Result<DryRunReport, ScriptError> {
    let gas = deployer.gas();
    let mut transactions = 0;

    for migration in migrations {
        let plan =
            plan_deploy_proxy(deployer, build_dir, manifest, &migration.proxy_request()).await?;

        if let Some(code) = plan.implementation_code.clone() {
            let estimate = deployer.estimate_deploy(code).await?;
            if estimate > gas.limit {
                return Err(ScriptError::DryRun(format!(
                    "migration {} needs {} gas to deploy its implementation, the limit is {}",
                    migration, estimate, gas.limit
                )));
            }
            info!("{}: implementation deployment estimated at {} gas", migration, estimate);
        }

        transactions += plan.transactions();
    }

    let required_balance = U256::from(gas.max_fee()) * U256::from(transactions);
    let balance = deployer.balance().await?;
    if balance < required_balance {
        return Err(ScriptError::DryRun(format!(
            "{:#x} holds {}, but {} transactions may cost up to {}",
            deployer.sender(),
            format_ether(balance),
            transactions,
            format_ether(required_balance)
        )));
    }

    Ok(DryRunReport {
        sender: deployer.sender(),
        transactions,
        required_balance,
        balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deployer::tests::MockDeployer, migrations::MIGRATIONS, proxy::tests::write_build};

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let build = tempfile::tempdir().unwrap();
        let manifests = tempfile::tempdir().unwrap();
        write_build(build.path(), "0x6001");
        let manifest = Manifest::load(manifests.path(), "development").unwrap();
        let deployer = MockDeployer::new();

        let report = dry_run(&deployer, build.path(), &manifest, MIGRATIONS)
            .await
            .unwrap();

        assert_eq!(report.transactions, 3);
        // 3 transactions at 5M gas and 5 gwei
        assert_eq!(report.required_balance, U256::from(75_000_000_000_000_000u128));
        assert!(deployer.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_insufficient_funds() {
        let build = tempfile::tempdir().unwrap();
        let manifests = tempfile::tempdir().unwrap();
        write_build(build.path(), "0x6001");
        let manifest = Manifest::load(manifests.path(), "development").unwrap();
        let mut deployer = MockDeployer::new();
        deployer.balance = U256::from(1);

        let res = dry_run(&deployer, build.path(), &manifest, MIGRATIONS).await;
        assert!(matches!(res, Err(ScriptError::DryRun(_))));
    }

    #[tokio::test]
    async fn test_dry_run_gas_limit_exceeded() {
        let build = tempfile::tempdir().unwrap();
        let manifests = tempfile::tempdir().unwrap();
        write_build(build.path(), "0x6001");
        let manifest = Manifest::load(manifests.path(), "development").unwrap();
        let mut deployer = MockDeployer::new();
        deployer.deploy_gas = 5_000_001;

        let res = dry_run(&deployer, build.path(), &manifest, MIGRATIONS).await;
        assert!(matches!(res, Err(ScriptError::DryRun(_))));
    }

    #[tokio::test]
    async fn test_dry_run_without_pending_migrations() {
        let build = tempfile::tempdir().unwrap();
        let manifests = tempfile::tempdir().unwrap();
        let manifest = Manifest::load(manifests.path(), "development").unwrap();
        let deployer = MockDeployer::new();

        let report = dry_run(&deployer, build.path(), &manifest, &[]).await.unwrap();
        assert_eq!(report.transactions, 0);
        assert_eq!(report.required_balance, U256::ZERO);
    }
}
