//! The ordered deployment steps of the project and the bookkeeping of which
//! have already run on a network

use std::{
    fmt::{self, Display},
    path::Path,
};

use tracing::info;

use crate::{
    constants::{BUNNY_MINTER_CONTRACT, DEFAULT_INITIALIZER},
    deployer::{Deployer, TxOutcome},
    errors::ScriptError,
    manifest::Manifest,
    proxy::{deploy_proxy, ProxyRequest},
};

/// A numbered deployment step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// Deploy `BunnyMinterV2` behind an upgradeable proxy
    DeployBunnyToken,
}

/// Every migration, in the order they run
pub const MIGRATIONS: &[Migration] = &[Migration::DeployBunnyToken];

impl Migration {
    /// The migration's position in the sequence, starting at 1
    pub fn number(&self) -> u32 {
        match self {
            Migration::DeployBunnyToken => 1,
        }
    }

    /// The migration's name
    pub fn name(&self) -> &'static str {
        match self {
            Migration::DeployBunnyToken => "deploy_bunny_token",
        }
    }

    /// The proxy deployment the migration makes
    pub fn proxy_request(&self) -> ProxyRequest {
        match self {
            Migration::DeployBunnyToken => ProxyRequest {
                contract: BUNNY_MINTER_CONTRACT.to_string(),
                args: vec![],
                initializer: Some(DEFAULT_INITIALIZER.to_string()),
            },
        }
    }

    /// Run the migration, returning the transactions it sent
    pub async fn run<D: Deployer>(
        &self,
        deployer: &D,
        build_dir: &Path,
        manifest: &mut Manifest,
    ) -> Result<Vec<TxOutcome>, ScriptError> {
        let deployment = deploy_proxy(deployer, build_dir, manifest, &self.proxy_request()).await?;
        Ok(deployment.transactions)
    }
}

impl Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.number(), self.name())
    }
}

/// The migrations still to run on the network `manifest` belongs to.
/// With `reset`, every migration runs again.
pub fn pending_migrations(manifest: &Manifest, reset: bool) -> Vec<Migration> {
    let last_completed = if reset {
        0
    } else {
        manifest.last_completed_migration.unwrap_or(0)
    };

    MIGRATIONS
        .iter()
        .copied()
        .filter(|migration| migration.number() > last_completed)
        .collect()
}

/// Run `migrations` in order, recording each in the manifest as soon as it
/// completes. The first failure stops the run.
pub async fn run_migrations<D: Deployer>(
    deployer: &D,
    build_dir: &Path,
    manifest: &mut Manifest,
    migrations: &[Migration],
) -> Result<Vec<TxOutcome>, ScriptError> {
    let mut transactions = Vec::new();

    for migration in migrations {
        info!("running migration {}", migration);
        let sent = migration.run(deployer, build_dir, manifest).await?;
        transactions.extend(sent);

        manifest.complete_migration(migration.number());
        manifest.save()?;
    }

    Ok(transactions)
}
