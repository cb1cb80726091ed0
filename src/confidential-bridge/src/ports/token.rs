use alloy_primitives::{Address, U256};
use fhe_bridge_types::{CiphertextHandle, Claim, Eip712Domain, EncryptedInput, TransferPermit};
use std::future::Future;

use super::{ChainError, TxReceipt};

/// Port for the confidential (FHE-wrapped) token contract.
///
/// Implementations:
/// - `EvmConfidentialToken` (ethers JSON-RPC)
/// - `MockConfidentialToken` for testing
pub trait ConfidentialToken: Send + Sync {
    fn address(&self) -> Address;

    /// Account the client sends transactions from.
    fn caller(&self) -> Address;

    /// Public balance indicator (not the real balance).
    fn balance_of(&self, account: Address) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Handle to the encrypted balance. Zero for accounts that never held a balance.
    fn confidential_balance_of(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<CiphertextHandle, ChainError>> + Send;

    /// Current permit nonce of `owner`.
    fn nonces(&self, owner: Address) -> impl Future<Output = Result<U256, ChainError>> + Send;

    fn eip712_domain(&self) -> impl Future<Output = Result<Eip712Domain, ChainError>> + Send;

    /// Address of the underlying plaintext ERC20.
    fn underlying(&self) -> impl Future<Output = Result<Address, ChainError>> + Send;

    /// Pull `amount` underlying from the caller and credit `to` confidentially.
    fn wrap(
        &self,
        to: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Burn `amount` from the caller and open a claim for `to`.
    fn unwrap(
        &self,
        to: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Move `value` from `owner` to `to`. Without a permit the caller must be an operator.
    fn confidential_transfer_from(
        &self,
        owner: Address,
        to: Address,
        value: &EncryptedInput,
        permit: Option<&TransferPermit>,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    fn get_user_claims(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<Vec<Claim>, ChainError>> + Send;

    fn get_claim(&self, ct_hash: U256) -> impl Future<Output = Result<Claim, ChainError>> + Send;

    fn claim_unwrapped(
        &self,
        ct_hash: U256,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Claim every decrypted claim of the caller.
    fn claim_all_unwrapped(&self) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    fn is_operator(
        &self,
        holder: Address,
        spender: Address,
    ) -> impl Future<Output = Result<bool, ChainError>> + Send;

    /// Allow `operator` to move the caller's balance until the unix timestamp `until`.
    fn set_operator(
        &self,
        operator: Address,
        until: u64,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;
}

/// Port for the plaintext ERC20 underlying a confidential token.
pub trait PlainToken: Send + Sync {
    fn address(&self) -> Address;

    fn balance_of(&self, account: Address) -> impl Future<Output = Result<U256, ChainError>> + Send;

    fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;

    fn approve(
        &self,
        spender: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;

    /// Permissioned; reverts when the caller is not a minter.
    fn mint(
        &self,
        to: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;
}
