use alloc::string::String;

use alloy_primitives::{Address, B256, U256};

use crate::handle::CiphertextHandle;

/// Default permit lifetime when the caller does not choose a deadline (24 hours).
pub const DEFAULT_PERMIT_TTL: u64 = 24 * 60 * 60;

/// EIP-712 domain as reported by the token's `eip712Domain()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: U256,
    pub verifying_contract: Address,
}

/// Canonical `(v, r, s)` split of a secp256k1 signature. `v` is 27 or 28.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermitSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// Single-use authorisation for one confidential transfer-from.
///
/// The signed payload commits to `value_hash`, never to a plaintext amount.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPermit {
    pub owner: Address,
    pub spender: Address,
    pub value_hash: CiphertextHandle,
    /// Owner nonce at signing time. Not part of the on-chain struct; the contract reads it.
    pub nonce: U256,
    pub deadline: U256,
    pub signature: PermitSignature,
}

/// Reasons a consumer rejects a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitError {
    Expired { deadline: U256, now: u64 },
    StaleNonce { expected: U256, found: U256 },
}

impl TransferPermit {
    /// Deadline is inclusive: a permit is still valid at `now == deadline`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.deadline < U256::from(now)
    }

    /// Consumer-side check: not expired and signed over the owner's current nonce.
    pub fn is_valid_at(&self, now: u64, on_chain_nonce: U256) -> Result<(), PermitError> {
        if self.is_expired(now) {
            return Err(PermitError::Expired { deadline: self.deadline, now });
        }
        if self.nonce != on_chain_nonce {
            return Err(PermitError::StaleNonce {
                expected: on_chain_nonce,
                found: self.nonce,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permit(deadline: u64, nonce: u64) -> TransferPermit {
        TransferPermit {
            owner: Address::repeat_byte(1),
            spender: Address::repeat_byte(2),
            value_hash: CiphertextHandle::ZERO,
            nonce: U256::from(nonce),
            deadline: U256::from(deadline),
            signature: PermitSignature::default(),
        }
    }

    #[test]
    fn deadline_is_inclusive_of_now() {
        let now = 1_700_000_000;
        assert!(!permit(now, 0).is_expired(now));
        assert!(permit(now - 1, 0).is_expired(now));
        assert_eq!(
            permit(now - 1, 0).is_valid_at(now, U256::ZERO),
            Err(PermitError::Expired { deadline: U256::from(now - 1), now })
        );
    }

    #[test]
    fn nonce_must_match_on_chain() {
        let now = 1_700_000_000;
        assert_eq!(permit(now, 3).is_valid_at(now, U256::from(3u64)), Ok(()));
        assert_eq!(
            permit(now, 3).is_valid_at(now, U256::from(4u64)),
            Err(PermitError::StaleNonce { expected: U256::from(4u64), found: U256::from(3u64) })
        );
    }
}
