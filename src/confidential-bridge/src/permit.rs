//! Permit Builder: signs an EIP-712 `Permit` that commits to a ciphertext handle.
//!
//! The builder reads the owner's nonce when the caller does not supply one. Two permits built
//! concurrently for the same owner read the same nonce and only the first consumed succeeds, so
//! callers issuing permits in parallel must serialise per owner themselves.

use alloy_primitives::{Address, U256};
use fhe_bridge_types::{
    CiphertextHandle, EncryptedInput, PermitError, TransferPermit, DEFAULT_PERMIT_TTL,
};
use tracing::{debug, info};

use crate::{
    eip712::permit_digest,
    errors::{Error, Result},
    now_unix,
    ports::{ConfidentialToken, TxReceipt, TypedDataSigner},
};

#[derive(Debug, Clone)]
pub struct PermitRequest {
    pub owner: Address,
    pub spender: Address,
    pub value_hash: CiphertextHandle,
    /// Read from the token when `None`.
    pub nonce: Option<U256>,
    /// `now + DEFAULT_PERMIT_TTL` when `None`.
    pub deadline: Option<U256>,
}

impl PermitRequest {
    pub fn new(owner: Address, spender: Address, value_hash: CiphertextHandle) -> Self {
        Self {
            owner,
            spender,
            value_hash,
            nonce: None,
            deadline: None,
        }
    }
}

pub struct PermitBuilder<'a, T, S> {
    token: &'a T,
    signer: &'a S,
}

impl<'a, T: ConfidentialToken, S: TypedDataSigner> PermitBuilder<'a, T, S> {
    pub fn new(token: &'a T, signer: &'a S) -> Self {
        Self { token, signer }
    }

    pub async fn build(&self, request: PermitRequest) -> Result<TransferPermit> {
        let signer = self.signer.address();
        if signer != request.owner {
            return Err(Error::SignerMismatch {
                signer,
                expected: request.owner,
            });
        }

        let domain = self.token.eip712_domain().await?;
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self.token.nonces(request.owner).await?,
        };
        let deadline = request
            .deadline
            .unwrap_or_else(|| U256::from(now_unix() + DEFAULT_PERMIT_TTL));

        let digest = permit_digest(
            &domain,
            request.owner,
            request.spender,
            request.value_hash,
            nonce,
            deadline,
        );
        let signature = self.signer.sign_hash(digest).await?;

        debug!(
            owner = %request.owner,
            spender = %request.spender,
            value_hash = %request.value_hash,
            %nonce,
            %deadline,
            "signed transfer permit"
        );

        Ok(TransferPermit {
            owner: request.owner,
            spender: request.spender,
            value_hash: request.value_hash,
            nonce,
            deadline,
            signature,
        })
    }
}

impl From<PermitError> for Error {
    fn from(err: PermitError) -> Self {
        match err {
            PermitError::Expired { deadline, now } => Error::PermitExpired { deadline, now },
            PermitError::StaleNonce { expected, found } => Error::StaleNonce { expected, found },
        }
    }
}

/// Spend `permit` from the token client's caller: move `value` from the permit owner to `to`.
///
/// Binding, expiry and nonce are checked against the token before anything is sent.
pub async fn transfer_from<T: ConfidentialToken>(
    token: &T,
    permit: &TransferPermit,
    to: Address,
    value: &EncryptedInput,
) -> Result<TxReceipt> {
    let caller = token.caller();
    if permit.spender != caller {
        return Err(Error::AddressMismatch {
            what: "permit spender",
            expected: permit.spender,
            found: caller,
        });
    }
    if permit.value_hash != value.handle() {
        return Err(Error::HandleMismatch {
            expected: permit.value_hash,
            found: value.handle(),
        });
    }
    let nonce = token.nonces(permit.owner).await?;
    permit.is_valid_at(now_unix(), nonce)?;

    let receipt = token
        .confidential_transfer_from(permit.owner, to, value, Some(permit))
        .await?;
    info!(
        owner = %permit.owner,
        %to,
        value_hash = %permit.value_hash,
        tx = %receipt.tx_hash,
        "confidential transfer"
    );
    Ok(receipt)
}
