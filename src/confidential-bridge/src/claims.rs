//! Claim sub-flow: unwrap requests become claimable once the decryption backend has processed
//! them (`Pending -> Ready`, driven externally) and are then claimed (`Ready -> Claimed`).

use std::time::Duration;

use alloy_primitives::{Address, U256};
use fhe_bridge_types::{Claim, ClaimStatus};
use tracing::{debug, info, warn};

use crate::{
    errors::{Error, Result},
    ports::{ConfidentialToken, TxReceipt},
};

/// Outcome of [`ClaimManager::claim_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReport {
    /// Claims that were ready and are now claimed.
    pub ready: usize,
    /// Claims still waiting for decryption.
    pub pending: usize,
    pub claimed_amount: U256,
    /// `None` when nothing was ready and no transaction was sent.
    pub receipt: Option<TxReceipt>,
}

#[derive(Debug, Clone, Copy)]
pub struct UnwrapOptions {
    /// Claim ready entries after the unwrap lands.
    pub auto_claim: bool,
    /// Wait before looking for ready claims.
    pub settle_delay: Duration,
}

impl Default for UnwrapOptions {
    fn default() -> Self {
        Self {
            auto_claim: true,
            settle_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrapOutcome {
    pub receipt: TxReceipt,
    /// Present when auto-claim ran.
    pub claims: Option<ClaimReport>,
}

pub struct ClaimManager<'a, T> {
    token: &'a T,
}

impl<'a, T: ConfidentialToken> ClaimManager<'a, T> {
    pub fn new(token: &'a T) -> Self {
        Self { token }
    }

    pub async fn claims(&self, account: Address) -> Result<Vec<Claim>> {
        let claims = self.token.get_user_claims(account).await?;
        debug!(%account, count = claims.len(), "fetched claims");
        Ok(claims)
    }

    /// Claim a single decrypted entry. Preconditions are checked before any transaction is sent.
    pub async fn claim_one(&self, ct_hash: U256) -> Result<Claim> {
        let claim = self.token.get_claim(ct_hash).await?;
        if !claim.exists() {
            return Err(Error::ClaimNotFound { ct_hash });
        }
        match claim.status() {
            ClaimStatus::Claimed => return Err(Error::ClaimAlreadyClaimed { ct_hash }),
            ClaimStatus::Pending => return Err(Error::ClaimNotDecrypted { ct_hash }),
            ClaimStatus::Inconsistent => return Err(Error::ClaimInconsistent { ct_hash }),
            ClaimStatus::Ready => {}
        }

        self.token.claim_unwrapped(ct_hash).await.map_err(|err| {
            if err.is_idempotent_noop() {
                Error::ClaimAlreadyClaimed { ct_hash }
            } else {
                Error::Chain(err)
            }
        })?;
        info!(%ct_hash, to = %claim.to, "claimed unwrapped balance");

        Ok(Claim {
            claimed: true,
            ..claim
        })
    }

    /// Claim every ready entry of `account` in one transaction.
    ///
    /// The contract claims for the transaction sender, so `account` must be the token client's
    /// caller.
    pub async fn claim_all(&self, account: Address) -> Result<ClaimReport> {
        let caller = self.token.caller();
        if account != caller {
            return Err(Error::SignerMismatch {
                signer: caller,
                expected: account,
            });
        }

        let claims = self.token.get_user_claims(account).await?;
        let ready: Vec<&Claim> = claims.iter().filter(|c| c.is_ready()).collect();
        let pending = claims.iter().filter(|c| c.status() == ClaimStatus::Pending).count();
        for broken in claims.iter().filter(|c| c.status() == ClaimStatus::Inconsistent) {
            warn!(ct_hash = %broken.ct_hash, "claim marked claimed but never decrypted");
        }
        let claimed_amount = ready
            .iter()
            .fold(U256::ZERO, |sum, c| sum.saturating_add(c.decrypted_amount));

        if ready.is_empty() {
            debug!(%account, pending, "no claims ready");
            return Ok(ClaimReport {
                ready: 0,
                pending,
                claimed_amount: U256::ZERO,
                receipt: None,
            });
        }

        let receipt = self.token.claim_all_unwrapped().await?;
        info!(
            %account,
            ready = ready.len(),
            pending,
            tx = %receipt.tx_hash,
            "claimed all ready claims"
        );
        debug!(%account, amount = %claimed_amount, "claimed amount");

        Ok(ClaimReport {
            ready: ready.len(),
            pending,
            claimed_amount,
            receipt: Some(receipt),
        })
    }

    /// Unwrap `amount` to `to` and, optionally, claim whatever is ready after a short wait.
    pub async fn unwrap(
        &self,
        to: Address,
        amount: U256,
        options: UnwrapOptions,
    ) -> Result<UnwrapOutcome> {
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        let receipt = self.token.unwrap(to, amount).await?;
        info!(%to, token = %self.token.address(), tx = %receipt.tx_hash, "unwrap submitted");

        // Only the caller's own claims can be claimed in bulk.
        let claims = if options.auto_claim && to == self.token.caller() {
            tokio::time::sleep(options.settle_delay).await;
            Some(self.claim_all(to).await?)
        } else {
            None
        };
        Ok(UnwrapOutcome { receipt, claims })
    }
}
