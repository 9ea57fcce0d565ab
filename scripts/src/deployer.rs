//! The seam between deployment logic and the chain.
//!
//! [`Deployer`] is everything the deployment routines need from a network
//! connection with signing authority. [`ChainDeployer`] implements it over an
//! alloy provider.

use std::time::Duration;

use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash, B256, U256},
    providers::{DynProvider, Provider},
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use bunny_config::networks::{GasParams, NetworkConfig};
use tracing::{debug, info};

use crate::{
    constants::{MAX_BLOCK_INTERVAL, RECEIPT_POLL_INTERVAL},
    errors::ScriptError,
};

/// The outcome of a mined, successful transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    /// The transaction hash
    pub tx_hash: TxHash,
    /// The gas the transaction consumed
    pub gas_used: u64,
}

/// A contract created by a deployment transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployed {
    /// The address of the new contract
    pub address: Address,
    /// The deployment transaction
    pub tx: TxOutcome,
}

/// A connection to a network with the authority to send transactions
#[allow(async_fn_in_trait)]
pub trait Deployer {
    /// The account transactions are sent from
    fn sender(&self) -> Address;

    /// The gas parameters attached to every transaction
    fn gas(&self) -> GasParams;

    /// Send a contract creation transaction and wait for it to be final
    async fn deploy(&self, label: &str, code: Bytes) -> Result<Deployed, ScriptError>;

    /// Send a call to `to` and wait for it to be final
    async fn send_call(&self, label: &str, to: Address, data: Bytes)
        -> Result<TxOutcome, ScriptError>;

    /// Read a storage slot of a contract
    async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError>;

    /// Read the code deployed at an address
    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError>;

    /// Estimate the gas needed to deploy `code`
    async fn estimate_deploy(&self, code: Bytes) -> Result<u64, ScriptError>;

    /// The sender's balance, in wei
    async fn balance(&self) -> Result<U256, ScriptError>;
}

/// A [`Deployer`] sending real transactions through an alloy provider
pub struct ChainDeployer {
    /// The provider, with a wallet attached when signing locally
    provider: DynProvider,
    /// The account transactions are sent from
    sender: Address,
    /// Fixed gas parameters of the network
    gas: GasParams,
    /// Blocks to wait after mining before a transaction is final
    confirmations: u64,
    /// Blocks to wait for a transaction to be mined
    timeout_blocks: u64,
}

impl ChainDeployer {
    /// Create a deployer for `network` sending from `sender`
    pub fn new(provider: DynProvider, sender: Address, network: &NetworkConfig) -> Self {
        Self {
            provider,
            sender,
            gas: network.gas,
            confirmations: network.confirmations,
            timeout_blocks: network.timeout_blocks,
        }
    }

    /// A transaction request from the sender with the network's gas parameters
    fn base_tx(&self) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.sender)
            .with_gas_limit(self.gas.limit)
            .with_gas_price(self.gas.price)
    }

    /// Send a transaction and wait until it is mined and confirmed
    async fn send_and_confirm(
        &self,
        label: &str,
        tx: TransactionRequest,
    ) -> Result<TransactionReceipt, ScriptError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractInteraction(format!("{}: {}", label, e)))?;
        let tx_hash = *pending.tx_hash();
        info!("{}: sent transaction {:#x}", label, tx_hash);

        self.wait_for_receipt(label, tx_hash).await
    }

    /// Poll for the receipt of `tx_hash`, failing if it reverts or is not
    /// mined within the timeout, then wait for the required confirmations.
    /// Gives up if the chain stalls for longer than the timeout allows.
    async fn wait_for_receipt(
        &self,
        label: &str,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, ScriptError> {
        let sent_at = self.block_number().await?;
        let started = tokio::time::Instant::now();

        loop {
            let head = self.block_number().await?;
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

            match receipt {
                Some(receipt) => {
                    if !receipt.status() {
                        return Err(ScriptError::TransactionReverted(format!(
                            "{}: {:#x}",
                            label, tx_hash
                        )));
                    }

                    let mined_at = receipt.block_number.unwrap_or(head);
                    if confirmations_reached(mined_at, head, self.confirmations) {
                        return Ok(receipt);
                    }
                    debug!(
                        "{}: mined in block {}, waiting for {} confirmations",
                        label, mined_at, self.confirmations
                    );
                }
                None if timed_out(sent_at, head, self.timeout_blocks) => {
                    return Err(ScriptError::TransactionTimeout(format!(
                        "{}: {:#x} not mined within {} blocks",
                        label, tx_hash, self.timeout_blocks
                    )));
                }
                None => {}
            }

            if stalled(started.elapsed(), self.timeout_blocks) {
                return Err(ScriptError::TransactionTimeout(format!(
                    "{}: {:#x} not final after {}s, is the node producing blocks?",
                    label,
                    tx_hash,
                    started.elapsed().as_secs()
                )));
            }

            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    /// The current block number
    async fn block_number(&self) -> Result<u64, ScriptError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }
}

impl Deployer for ChainDeployer {
    fn sender(&self) -> Address {
        self.sender
    }

    fn gas(&self) -> GasParams {
        self.gas
    }

    async fn deploy(&self, label: &str, code: Bytes) -> Result<Deployed, ScriptError> {
        let tx = self.base_tx().with_deploy_code(code);
        let receipt = self.send_and_confirm(label, tx).await?;

        let address = receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment(format!(
                "{}: receipt of {:#x} has no contract address",
                label, receipt.transaction_hash
            ))
        })?;

        Ok(Deployed {
            address,
            tx: TxOutcome {
                tx_hash: receipt.transaction_hash,
                gas_used: receipt.gas_used,
            },
        })
    }

    async fn send_call(
        &self,
        label: &str,
        to: Address,
        data: Bytes,
    ) -> Result<TxOutcome, ScriptError> {
        let tx = self.base_tx().with_to(to).with_input(data);
        let receipt = self.send_and_confirm(label, tx).await?;

        Ok(TxOutcome {
            tx_hash: receipt.transaction_hash,
            gas_used: receipt.gas_used,
        })
    }

    async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError> {
        let value = self
            .provider
            .get_storage_at(address, U256::from_be_bytes(slot.0))
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        Ok(B256::from(value.to_be_bytes::<32>()))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn estimate_deploy(&self, code: Bytes) -> Result<u64, ScriptError> {
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_deploy_code(code);

        self.provider
            .estimate_gas(tx)
            .await
            .map_err(|e| ScriptError::DryRun(e.to_string()))
    }

    async fn balance(&self) -> Result<U256, ScriptError> {
        self.provider
            .get_balance(self.sender)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }
}

/// Whether a transaction mined in block `mined_at` has `required`
/// confirmations once the chain head is at `head`
pub fn confirmations_reached(mined_at: u64, head: u64, required: u64) -> bool {
    head.saturating_sub(mined_at) >= required
}

/// Whether a transaction sent when the head was at `sent_at` has waited
/// longer than `timeout_blocks` without being mined
pub fn timed_out(sent_at: u64, head: u64, timeout_blocks: u64) -> bool {
    head.saturating_sub(sent_at) >= timeout_blocks
}

/// Whether waiting `elapsed` for a transaction exceeds the time
/// `timeout_blocks` blocks should take
pub fn stalled(elapsed: Duration, timeout_blocks: u64) -> bool {
    let blocks = u32::try_from(timeout_blocks).unwrap_or(u32::MAX);
    elapsed >= MAX_BLOCK_INTERVAL.saturating_mul(blocks)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use alloy::{primitives::keccak256, sol_types::SolCall, sol_types::SolValue};

    use super::*;
    use crate::{
        constants::{PROXY_CONTRACT, PROXY_IMPLEMENTATION_STORAGE_SLOT, PROXY_ADMIN_STORAGE_SLOT},
        solidity::IProxyAdmin,
    };

    /// Parse a storage slot constant
    fn slot(hex: &str) -> B256 {
        hex.parse().unwrap()
    }

    #[test]
    fn test_confirmations() {
        // No confirmations required: final as soon as mined
        assert!(confirmations_reached(100, 100, 0));
        // Three confirmations: final once three blocks were built on top
        assert!(!confirmations_reached(100, 102, 3));
        assert!(confirmations_reached(100, 103, 3));
        // A head behind the receipt's block is not confirmed
        assert!(!confirmations_reached(100, 99, 1));
    }

    #[test]
    fn test_timeout() {
        assert!(!timed_out(10, 10, 200));
        assert!(!timed_out(10, 209, 200));
        assert!(timed_out(10, 210, 200));
    }

    #[test]
    fn test_stalled() {
        // 50 blocks at most 15s apart
        assert!(!stalled(Duration::from_secs(749), 50));
        assert!(stalled(Duration::from_secs(750), 50));
        // A zero block timeout gives up immediately
        assert!(stalled(Duration::ZERO, 0));
    }

    /// A request sent through the [`MockDeployer`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Request {
        /// A contract creation
        Deploy {
            /// The label of the deployment
            label: String,
            /// The creation code sent
            code: Bytes,
        },
        /// A call to a contract
        Call {
            /// The label of the call
            label: String,
            /// The called contract
            to: Address,
            /// The calldata sent
            data: Bytes,
        },
    }

    /// A [`Deployer`] that records requests and emulates the chain state the
    /// proxy contracts would produce
    pub(crate) struct MockDeployer {
        /// Every transaction sent, in order
        pub requests: RefCell<Vec<Request>>,
        /// Contract code by address
        pub code: RefCell<HashMap<Address, Bytes>>,
        /// Storage slots by address
        pub storage: RefCell<HashMap<(Address, B256), B256>>,
        /// The deployer's balance
        pub balance: U256,
        /// The gas each deployment is estimated to use
        pub deploy_gas: u64,
        /// Whether proxies write the EIP-1967 slots on deployment and upgrade
        pub honest_proxies: bool,
        /// The length of the proxy creation code preceding its constructor arguments
        pub proxy_code_len: usize,
    }

    impl MockDeployer {
        /// A deployer with a large balance whose proxies behave
        pub(crate) fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                code: RefCell::new(HashMap::new()),
                storage: RefCell::new(HashMap::new()),
                balance: U256::from(10u128.pow(21)),
                deploy_gas: 1_000_000,
                honest_proxies: true,
                proxy_code_len: 4,
            }
        }

        /// The calls sent, by label
        pub(crate) fn call_labels(&self) -> Vec<String> {
            self.requests
                .borrow()
                .iter()
                .filter_map(|r| match r {
                    Request::Call { label, .. } => Some(label.clone()),
                    Request::Deploy { .. } => None,
                })
                .collect()
        }

        /// The deployments sent, by label
        pub(crate) fn deploy_labels(&self) -> Vec<String> {
            self.requests
                .borrow()
                .iter()
                .filter_map(|r| match r {
                    Request::Deploy { label, .. } => Some(label.clone()),
                    Request::Call { .. } => None,
                })
                .collect()
        }

        /// Set a storage slot
        pub(crate) fn set_storage(&self, address: Address, slot: B256, value: B256) {
            self.storage.borrow_mut().insert((address, slot), value);
        }
    }

    impl Deployer for MockDeployer {
        fn sender(&self) -> Address {
            Address::repeat_byte(0xde)
        }

        fn gas(&self) -> GasParams {
            GasParams {
                limit: 5_000_000,
                price: 5_000_000_000,
            }
        }

        async fn deploy(&self, label: &str, code: Bytes) -> Result<Deployed, ScriptError> {
            let mut requests = self.requests.borrow_mut();
            let nonce = requests.len() as u64;
            requests.push(Request::Deploy {
                label: label.to_string(),
                code: code.clone(),
            });

            let address = self.sender().create(nonce);
            self.code.borrow_mut().insert(address, code.clone());

            // Emulate the proxy constructor writing the EIP-1967 slots
            if label == PROXY_CONTRACT && self.honest_proxies {
                let (logic, admin, _data) = <(Address, Address, Bytes)>::abi_decode_params(
                    &code[self.proxy_code_len..],
                )
                .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;
                self.set_storage(address, slot(PROXY_IMPLEMENTATION_STORAGE_SLOT), logic.into_word());
                self.set_storage(address, slot(PROXY_ADMIN_STORAGE_SLOT), admin.into_word());
            }

            Ok(Deployed {
                address,
                tx: TxOutcome {
                    tx_hash: keccak256(&code),
                    gas_used: 100_000,
                },
            })
        }

        async fn send_call(
            &self,
            label: &str,
            to: Address,
            data: Bytes,
        ) -> Result<TxOutcome, ScriptError> {
            self.requests.borrow_mut().push(Request::Call {
                label: label.to_string(),
                to,
                data: data.clone(),
            });

            if self.honest_proxies {
                let upgrade = IProxyAdmin::upgradeCall::abi_decode(&data)
                    .map(|call| (call.proxy, call.implementation))
                    .or_else(|_| {
                        IProxyAdmin::upgradeAndCallCall::abi_decode(&data)
                            .map(|call| (call.proxy, call.implementation))
                    });
                if let Ok((proxy, implementation)) = upgrade {
                    self.set_storage(
                        proxy,
                        slot(PROXY_IMPLEMENTATION_STORAGE_SLOT),
                        implementation.into_word(),
                    );
                }
            }

            Ok(TxOutcome {
                tx_hash: keccak256(&data),
                gas_used: 50_000,
            })
        }

        async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError> {
            Ok(self
                .storage
                .borrow()
                .get(&(address, slot))
                .copied()
                .unwrap_or_default())
        }

        async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError> {
            Ok(self
                .code
                .borrow()
                .get(&address)
                .cloned()
                .unwrap_or_default())
        }

        async fn estimate_deploy(&self, _code: Bytes) -> Result<u64, ScriptError> {
            Ok(self.deploy_gas)
        }

        async fn balance(&self) -> Result<U256, ScriptError> {
            Ok(self.balance)
        }
    }
}
