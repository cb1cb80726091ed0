use alloy_primitives::{Address, U256};

/// A pending unwrap (confidential -> plaintext), keyed by `ct_hash`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Claim {
    pub ct_hash: U256,
    pub to: Address,
    pub requested_amount: U256,
    pub decrypted_amount: U256,
    /// Set by the decryption backend, not by this crate.
    pub decrypted: bool,
    pub claimed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimStatus {
    /// Waiting for decryption.
    Pending,
    /// Decrypted, not yet claimed.
    Ready,
    Claimed,
    /// Marked claimed without a decryption result; the contract state is broken.
    Inconsistent,
}

impl Claim {
    /// Contracts return a zeroed struct for unknown hashes.
    pub fn exists(&self) -> bool {
        self.to != Address::ZERO
    }

    pub fn status(&self) -> ClaimStatus {
        match (self.decrypted, self.claimed) {
            (true, true) => ClaimStatus::Claimed,
            (false, true) => ClaimStatus::Inconsistent,
            (true, false) => ClaimStatus::Ready,
            (false, false) => ClaimStatus::Pending,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ClaimStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        let mut c = Claim {
            to: Address::repeat_byte(9),
            requested_amount: U256::from(10u64),
            ..Default::default()
        };
        assert!(c.exists());
        assert_eq!(c.status(), ClaimStatus::Pending);
        c.decrypted = true;
        assert!(c.is_ready());
        c.claimed = true;
        assert_eq!(c.status(), ClaimStatus::Claimed);
        assert!(!Claim::default().exists());
    }

    #[test]
    fn claimed_before_decryption_is_not_reported_as_claimed() {
        let c = Claim {
            to: Address::repeat_byte(9),
            claimed: true,
            ..Default::default()
        };
        assert_eq!(c.status(), ClaimStatus::Inconsistent);
        assert!(!c.is_ready());
    }
}
