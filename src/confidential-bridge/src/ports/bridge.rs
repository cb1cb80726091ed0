use alloy_primitives::{Address, U256};
use fhe_bridge_types::{BridgeIntent, EncryptedInput, TransferPermit};
use std::future::Future;

use super::{ChainError, TxReceipt};

/// Arguments of the bridge contract's `bridge(...)` entry point.
#[derive(Debug, Clone)]
pub struct BridgeRequest {
    pub sender: Address,
    pub receiver: Address,
    pub relayer: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub input_amount: EncryptedInput,
    pub output_amount: EncryptedInput,
    pub destination_chain_id: EncryptedInput,
    /// Authorises the bridge to pull `input_amount` from `sender`.
    pub permit: TransferPermit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSubmission {
    pub intent_id: U256,
    pub receipt: TxReceipt,
}

/// Port for the bridge contract on one chain.
///
/// Implementations:
/// - `EvmBridge` (ethers JSON-RPC, id taken from the `IntentCreated` event)
/// - `MockBridge` for testing
pub trait BridgeContract: Send + Sync {
    fn address(&self) -> Address;

    /// Chain this bridge lives on.
    fn chain_id(&self) -> u64;

    fn bridge(
        &self,
        request: &BridgeRequest,
    ) -> impl Future<Output = Result<BridgeSubmission, ChainError>> + Send;

    /// `None` when the contract has no record of `id`.
    fn get_intent(
        &self,
        id: U256,
    ) -> impl Future<Output = Result<Option<BridgeIntent>, ChainError>> + Send;

    /// Pay out `intent` from the caller's balance, authorised by `permit`.
    fn fulfill(
        &self,
        intent: &BridgeIntent,
        permit: &TransferPermit,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;
}
