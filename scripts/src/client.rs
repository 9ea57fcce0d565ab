//! Connecting to the selected network

use std::str::FromStr;

use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use bunny_config::{
    keys::SigningKeys,
    networks::{NetworkConfig, SignerSource},
};
use tracing::info;

use crate::{deployer::ChainDeployer, errors::ScriptError};

/// Connect to `network` and return a deployer sending from the deployer
/// account: the first signing key for networks signed locally, or the
/// node's first account otherwise.
///
/// Fails if the node reports a network id other than the configured one.
pub async fn setup_client(
    network: &NetworkConfig,
    keys: Option<&SigningKeys>,
) -> Result<ChainDeployer, ScriptError> {
    let url = Url::parse(&network.endpoint.url())
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

    let (provider, sender) = match network.signer {
        SignerSource::PrivateKeys => {
            let keys = keys.ok_or_else(|| {
                ScriptError::ClientInitialization(format!(
                    "network `{}` requires a private key",
                    network.name
                ))
            })?;
            let signer = PrivateKeySigner::from_str(keys.deployer())
                .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
            let sender = signer.address();
            let provider = ProviderBuilder::new().wallet(signer).connect_http(url);

            (DynProvider::new(provider), sender)
        }
        SignerSource::NodeAccounts => {
            let provider = DynProvider::new(ProviderBuilder::new().connect_http(url));
            let sender = provider
                .get_accounts()
                .await
                .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?
                .first()
                .copied()
                .ok_or_else(|| {
                    ScriptError::ClientInitialization(
                        "node has no unlocked accounts".to_string(),
                    )
                })?;

            (provider, sender)
        }
    };

    let network_id = provider
        .get_net_version()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    if !network.network_id.matches(network_id) {
        return Err(ScriptError::NetworkMismatch {
            expected: network.network_id.to_string(),
            actual: network_id,
        });
    }

    info!(
        "connected to `{}` (network id {}) as {:#x}",
        network.name, network_id, sender
    );

    Ok(ChainDeployer::new(provider, sender, network))
}
