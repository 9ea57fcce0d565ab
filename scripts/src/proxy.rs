//! Deployment and upgrade of contracts behind transparent upgradeable proxies.
//!
//! A proxied deployment consists of three contracts:
//! - the implementation, holding the logic
//! - a `ProxyAdmin`, shared by every proxy on the network, which alone may upgrade them
//! - a [`TransparentUpgradeableProxy`](https://docs.openzeppelin.com/contracts/3.x/api/proxy#TransparentUpgradeableProxy),
//!   which forwards calls to the implementation and runs the initializer in its constructor
//!
//! Implementations and the admin already recorded in the network's manifest are
//! reused as long as their code is still on chain. Every call to [`deploy_proxy`]
//! creates a new proxy.

use std::path::Path;

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    primitives::{Address, Bytes, B256},
    sol_types::{SolCall, SolValue},
};
use tracing::{info, warn};

use crate::{
    artifacts::Artifact,
    constants::{
        NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT, PROXY_ADMIN_CONTRACT,
        PROXY_ADMIN_STORAGE_SLOT, PROXY_CONTRACT, PROXY_IMPLEMENTATION_STORAGE_SLOT,
    },
    deployer::{Deployer, TxOutcome},
    errors::ScriptError,
    manifest::{DeploymentRecord, Manifest, ProxyKind, ProxyRecord},
    solidity::IProxyAdmin,
};

/// A request to deploy a contract behind a new proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// The name of the implementation contract's artifact
    pub contract: String,
    /// The initializer arguments, as strings coerced to the ABI types
    pub args: Vec<String>,
    /// The function called through the proxy on deployment, if any
    pub initializer: Option<String>,
}

/// A call made through the proxy as part of an upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCall {
    /// The function to call on the new implementation
    pub function: String,
    /// The call arguments, as strings coerced to the ABI types
    pub args: Vec<String>,
}

/// The contracts making up a proxied deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// The proxy users interact with
    pub proxy: Address,
    /// The implementation the proxy forwards to
    pub implementation: Address,
    /// The admin allowed to upgrade the proxy
    pub admin: Address,
    /// The transactions sent, in order
    pub transactions: Vec<TxOutcome>,
}

/// The transactions a proxy deployment will send, given what is already on chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPlan {
    /// The implementation's creation code, if it needs deploying
    pub implementation_code: Option<Bytes>,
    /// Whether the proxy admin needs deploying
    pub deploy_admin: bool,
}

impl ProxyPlan {
    /// The number of transactions the deployment will send
    pub fn transactions(&self) -> u64 {
        // The proxy itself is always deployed
        1 + self.implementation_code.is_some() as u64 + self.deploy_admin as u64
    }
}

/// Work out what [`deploy_proxy`] would send for `request` without sending
/// anything, validating the artifacts and initializer on the way
pub async fn plan_deploy_proxy<D: Deployer>(
    deployer: &D,
    build_dir: &Path,
    manifest: &Manifest,
    request: &ProxyRequest,
) -> Result<ProxyPlan, ScriptError> {
    let artifact = Artifact::load(build_dir, &request.contract)?;
    encode_function_call(&artifact, request.initializer.as_deref(), &request.args)?;
    load_proxy_artifact(build_dir, PROXY_ADMIN_CONTRACT)?.creation_code()?;
    load_proxy_artifact(build_dir, PROXY_CONTRACT)?.creation_code()?;

    let implementation_code = match manifest.implementation(&artifact.code_hash()?) {
        Some(record) if is_deployed(deployer, record.address).await? => None,
        _ => Some(artifact.creation_code()?),
    };
    let deploy_admin = match manifest.admin.as_ref() {
        Some(record) => !is_deployed(deployer, record.address).await?,
        None => true,
    };

    Ok(ProxyPlan {
        implementation_code,
        deploy_admin,
    })
}

/// Deploy `request.contract` behind a new transparent proxy, running the
/// initializer through the proxy
pub async fn deploy_proxy<D: Deployer>(
    deployer: &D,
    build_dir: &Path,
    manifest: &mut Manifest,
    request: &ProxyRequest,
) -> Result<ProxyDeployment, ScriptError> {
    let artifact = Artifact::load(build_dir, &request.contract)?;
    let init_data = encode_function_call(&artifact, request.initializer.as_deref(), &request.args)?;
    let admin_artifact = load_proxy_artifact(build_dir, PROXY_ADMIN_CONTRACT)?;
    let proxy_artifact = load_proxy_artifact(build_dir, PROXY_CONTRACT)?;

    let mut transactions = Vec::new();

    let (implementation, impl_tx) = deploy_implementation(deployer, manifest, &artifact).await?;
    transactions.extend(impl_tx);

    let (admin, admin_tx) = ensure_proxy_admin(deployer, manifest, &admin_artifact).await?;
    transactions.extend(admin_tx);

    let proxy_code = proxy_creation_code(&proxy_artifact, implementation, admin, init_data)?;
    let deployed = deployer.deploy(PROXY_CONTRACT, proxy_code).await?;
    transactions.push(deployed.tx);

    manifest.record_proxy(ProxyRecord {
        contract: artifact.contract_name.clone(),
        address: deployed.address,
        tx_hash: deployed.tx.tx_hash,
        kind: ProxyKind::Transparent,
    });
    manifest.save()?;

    verify_proxy(deployer, deployed.address, implementation, Some(admin)).await?;
    info!(
        "{} proxy deployed at {:#x} (implementation {:#x}, admin {:#x})",
        artifact.contract_name, deployed.address, implementation, admin
    );

    Ok(ProxyDeployment {
        proxy: deployed.address,
        implementation,
        admin,
        transactions,
    })
}

/// Point an existing proxy at the current build of `contract`, optionally
/// calling a function on it through the proxy in the same transaction
pub async fn upgrade_proxy<D: Deployer>(
    deployer: &D,
    build_dir: &Path,
    manifest: &mut Manifest,
    proxy: Address,
    contract: &str,
    call: Option<&UpgradeCall>,
) -> Result<ProxyDeployment, ScriptError> {
    let admin = manifest
        .admin
        .as_ref()
        .map(|record| record.address)
        .ok_or_else(|| {
            ScriptError::ProxyVerification("no proxy admin recorded for this network".to_string())
        })?;

    let current_admin = read_address_slot(deployer, proxy, PROXY_ADMIN_STORAGE_SLOT).await?;
    if current_admin != admin {
        return Err(ScriptError::ProxyVerification(format!(
            "proxy {:#x} is administered by {:#x}, not the recorded admin {:#x}",
            proxy, current_admin, admin
        )));
    }

    let artifact = Artifact::load(build_dir, contract)?;
    let call_data = match call {
        Some(call) => Some(encode_function_call(
            &artifact,
            Some(&call.function),
            &call.args,
        )?),
        None => None,
    };

    let mut transactions = Vec::new();
    let (implementation, impl_tx) = deploy_implementation(deployer, manifest, &artifact).await?;
    transactions.extend(impl_tx);

    let upgrade_data: Bytes = match call_data {
        Some(data) => IProxyAdmin::upgradeAndCallCall {
            proxy,
            implementation,
            data,
        }
        .abi_encode()
        .into(),
        None => IProxyAdmin::upgradeCall {
            proxy,
            implementation,
        }
        .abi_encode()
        .into(),
    };
    let upgrade_tx = deployer
        .send_call(PROXY_ADMIN_CONTRACT, admin, upgrade_data)
        .await?;
    transactions.push(upgrade_tx);

    if let Some(record) = manifest.proxies.iter_mut().find(|p| p.address == proxy) {
        record.contract = artifact.contract_name.clone();
    }
    manifest.save()?;

    verify_proxy(deployer, proxy, implementation, None).await?;
    info!(
        "proxy {:#x} upgraded to {} at {:#x}",
        proxy, artifact.contract_name, implementation
    );

    Ok(ProxyDeployment {
        proxy,
        implementation,
        admin,
        transactions,
    })
}

/// Encode a call to `function` with string arguments coerced to the types of
/// the matching ABI overload. No function means no call and empty calldata.
pub fn encode_function_call(
    artifact: &Artifact,
    function: Option<&str>,
    args: &[String],
) -> Result<Bytes, ScriptError> {
    let Some(name) = function else {
        if !args.is_empty() {
            return Err(ScriptError::CalldataConstruction(
                "arguments given without an initializer".to_string(),
            ));
        }
        return Ok(Bytes::new());
    };

    let overloads = artifact.abi.function(name).ok_or_else(|| {
        ScriptError::CalldataConstruction(format!(
            "{} has no function `{}`",
            artifact.contract_name, name
        ))
    })?;

    let mut candidates = overloads.iter().filter(|f| f.inputs.len() == args.len());
    let function = match (candidates.next(), candidates.next()) {
        (Some(function), None) => function,
        (None, _) => {
            return Err(ScriptError::CalldataConstruction(format!(
                "{}.{} takes no overload with {} arguments",
                artifact.contract_name,
                name,
                args.len()
            )))
        }
        (Some(_), Some(_)) => {
            return Err(ScriptError::CalldataConstruction(format!(
                "{}.{} is ambiguous with {} arguments",
                artifact.contract_name,
                name,
                args.len()
            )))
        }
    };

    let values = function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            param
                .resolve()
                .and_then(|ty| ty.coerce_str(arg))
                .map_err(|e| {
                    ScriptError::CalldataConstruction(format!("argument `{}`: {}", param.name, e))
                })
        })
        .collect::<Result<Vec<DynSolValue>, _>>()?;

    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

/// The creation code of a proxy for `implementation`, administered by
/// `admin`, calling the implementation with `data` on construction
pub fn proxy_creation_code(
    proxy_artifact: &Artifact,
    implementation: Address,
    admin: Address,
    data: Bytes,
) -> Result<Bytes, ScriptError> {
    let mut code = proxy_artifact.creation_code()?.to_vec();
    code.extend((implementation, admin, data).abi_encode_params());
    Ok(code.into())
}

/// Load one of the OpenZeppelin proxy artifacts, saying how to build it if missing
fn load_proxy_artifact(build_dir: &Path, contract: &str) -> Result<Artifact, ScriptError> {
    Artifact::load(build_dir, contract).map_err(|e| match e {
        ScriptError::ReadArtifact(msg) => ScriptError::ReadArtifact(format!(
            "{}; {} is built by `compile` once @openzeppelin/contracts is installed",
            msg, contract
        )),
        e => e,
    })
}

/// Deploy the implementation in `artifact`, unless the same code is already
/// recorded and still on chain
async fn deploy_implementation<D: Deployer>(
    deployer: &D,
    manifest: &mut Manifest,
    artifact: &Artifact,
) -> Result<(Address, Option<TxOutcome>), ScriptError> {
    let code_hash = artifact.code_hash()?;

    if let Some(record) = manifest.implementation(&code_hash) {
        let address = record.address;
        if is_deployed(deployer, address).await? {
            info!(
                "reusing {} implementation at {:#x}",
                artifact.contract_name, address
            );
            return Ok((address, None));
        }

        warn!(
            "recorded {} implementation at {:#x} has no code, redeploying",
            artifact.contract_name, address
        );
        manifest.forget_implementation(&code_hash);
    }

    let deployed = deployer
        .deploy(&artifact.contract_name, artifact.creation_code()?)
        .await?;
    manifest.record_implementation(
        &code_hash,
        DeploymentRecord {
            contract: artifact.contract_name.clone(),
            address: deployed.address,
            tx_hash: deployed.tx.tx_hash,
        },
    );
    manifest.save()?;
    info!(
        "{} implementation deployed at {:#x}",
        artifact.contract_name, deployed.address
    );

    Ok((deployed.address, Some(deployed.tx)))
}

/// Return the network's proxy admin, deploying it if none is recorded or the
/// recorded one is gone
async fn ensure_proxy_admin<D: Deployer>(
    deployer: &D,
    manifest: &mut Manifest,
    admin_artifact: &Artifact,
) -> Result<(Address, Option<TxOutcome>), ScriptError> {
    if let Some(address) = manifest.admin.as_ref().map(|record| record.address) {
        if is_deployed(deployer, address).await? {
            return Ok((address, None));
        }
        warn!("recorded proxy admin at {:#x} has no code, redeploying", address);
    }

    let deployed = deployer
        .deploy(PROXY_ADMIN_CONTRACT, admin_artifact.creation_code()?)
        .await?;
    manifest.admin = Some(DeploymentRecord {
        contract: PROXY_ADMIN_CONTRACT.to_string(),
        address: deployed.address,
        tx_hash: deployed.tx.tx_hash,
    });
    manifest.save()?;
    info!("proxy admin deployed at {:#x}", deployed.address);

    Ok((deployed.address, Some(deployed.tx)))
}

/// Check the EIP-1967 slots of `proxy` point at the expected contracts
async fn verify_proxy<D: Deployer>(
    deployer: &D,
    proxy: Address,
    implementation: Address,
    admin: Option<Address>,
) -> Result<(), ScriptError> {
    let actual = read_address_slot(deployer, proxy, PROXY_IMPLEMENTATION_STORAGE_SLOT).await?;
    if actual != implementation {
        return Err(ScriptError::ProxyVerification(format!(
            "proxy {:#x} points at {:#x}, expected implementation {:#x}",
            proxy, actual, implementation
        )));
    }

    if let Some(admin) = admin {
        let actual = read_address_slot(deployer, proxy, PROXY_ADMIN_STORAGE_SLOT).await?;
        if actual != admin {
            return Err(ScriptError::ProxyVerification(format!(
                "proxy {:#x} is administered by {:#x}, expected {:#x}",
                proxy, actual, admin
            )));
        }
    }

    Ok(())
}

/// Read an address stored in one of the proxy's EIP-1967 slots
async fn read_address_slot<D: Deployer>(
    deployer: &D,
    proxy: Address,
    slot: &str,
) -> Result<Address, ScriptError> {
    let slot: B256 = slot
        .parse()
        .map_err(|e| ScriptError::ContractInteraction(format!("invalid slot {}: {}", slot, e)))?;
    let value = deployer.storage_at(proxy, slot).await?;

    Ok(Address::from_slice(
        &value[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..NUM_BYTES_STORAGE_SLOT],
    ))
}

/// Whether there is code at `address`
async fn is_deployed<D: Deployer>(deployer: &D, address: Address) -> Result<bool, ScriptError> {
    Ok(!deployer.code_at(address).await?.is_empty())
}
