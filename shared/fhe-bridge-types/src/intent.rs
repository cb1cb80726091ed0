use alloy_primitives::{Address, U256};

use crate::handle::CiphertextHandle;

/// Fill status as stored by the bridge contract (`uint8`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilledStatus {
    #[default]
    Pending = 0,
    Filled = 1,
}

impl TryFrom<u8> for FilledStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FilledStatus::Pending),
            1 => Ok(FilledStatus::Filled),
            other => Err(other),
        }
    }
}

/// A cross-chain transfer request, field order matching the on-chain struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeIntent {
    pub sender: Address,
    pub receiver: Address,
    pub relayer: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub input_amount: CiphertextHandle,
    /// Committed by the sender; only the relayer may unseal it.
    pub output_amount: CiphertextHandle,
    pub id: U256,
    pub origin_chain_id: u32,
    pub destination_chain_id: u32,
    pub filled_status: FilledStatus,
    pub solver_paid: bool,
    pub timeout: U256,
}

/// Errors from local intent transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentError {
    AlreadyFilled,
}

impl BridgeIntent {
    /// Contracts return a zeroed struct for unknown ids.
    pub fn exists(&self) -> bool {
        self.sender != Address::ZERO
    }

    pub fn is_filled(&self) -> bool {
        self.filled_status == FilledStatus::Filled
    }

    /// Pending -> Filled. Never reverses.
    pub fn mark_filled(&mut self) -> Result<(), IntentError> {
        if self.is_filled() {
            return Err(IntentError::AlreadyFilled);
        }
        self.filled_status = FilledStatus::Filled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> BridgeIntent {
        BridgeIntent {
            sender: Address::repeat_byte(0x11),
            receiver: Address::repeat_byte(0x22),
            relayer: Address::repeat_byte(0x33),
            input_token: Address::repeat_byte(0x44),
            output_token: Address::repeat_byte(0x55),
            input_amount: CiphertextHandle::from_raw(U256::from(1u64)),
            output_amount: CiphertextHandle::from_raw(U256::from(2u64)),
            id: U256::from(7u64),
            origin_chain_id: 421614,
            destination_chain_id: 11155111,
            filled_status: FilledStatus::Pending,
            solver_paid: false,
            timeout: U256::ZERO,
        }
    }

    #[test]
    fn fill_is_monotonic() {
        let mut i = intent();
        assert!(!i.is_filled());
        i.mark_filled().unwrap();
        assert!(i.is_filled());
        assert_eq!(i.mark_filled(), Err(IntentError::AlreadyFilled));
        assert!(i.is_filled());
    }

    #[test]
    fn zeroed_intent_does_not_exist() {
        let mut i = intent();
        assert!(i.exists());
        i.sender = Address::ZERO;
        assert!(!i.exists());
    }

    #[test]
    fn filled_status_from_u8() {
        assert_eq!(FilledStatus::try_from(0), Ok(FilledStatus::Pending));
        assert_eq!(FilledStatus::try_from(1), Ok(FilledStatus::Filled));
        assert_eq!(FilledStatus::try_from(9), Err(9));
    }
}
