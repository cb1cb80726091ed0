//! Ciphertext handle metadata packing.
//!
//! A handle is a 256-bit word. The high 240 bits are the pre-image hash produced by the
//! encryption backend; the low 16 bits carry metadata:
//!
//! - bits 15..8: `trivial flag (1 bit) | uint type class (7 bits)`
//! - bits 7..0: security zone, as the two's-complement byte of an `int8`
//!
//! On-chain contracts apply the same masks, so off-chain tooling must produce bit-identical
//! words before a handle is signed over or submitted.

use alloc::vec::Vec;
use core::fmt;

use alloy_primitives::U256;

use crate::fhe_type::FheType;

/// Clears the low 2 bytes of a 256-bit word (reserved for metadata).
pub const HASH_MASK_FOR_METADATA: U256 =
    U256::from_limbs([!0xffffu64, u64::MAX, u64::MAX, u64::MAX]);

/// Lowest byte: security zone (`type(uint8).max`).
pub const SECURITY_ZONE_MASK: u8 = 0xff;

/// 7-bit uint type mask.
pub const UINT_TYPE_MASK: u8 = 0xff >> 1;

/// 1-bit trivially-encrypted flag (MSB of the metadata byte).
pub const TRIVIALLY_ENCRYPTED_MASK: u8 = 0xff - UINT_TYPE_MASK;

/// Opaque 256-bit reference to an encrypted integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CiphertextHandle(U256);

/// Metadata carried in the low 16 bits of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandleMetadata {
    pub security_zone: i8,
    pub uint_type: u8,
    pub is_trivial: bool,
}

impl CiphertextHandle {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn from_raw(word: U256) -> Self {
        Self(word)
    }

    pub const fn into_raw(self) -> U256 {
        self.0
    }

    pub const fn as_u256(&self) -> &U256 {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Pack metadata into `preimage`.
    ///
    /// `uint_type` is masked to 7 bits; callers validate the range beforehand
    /// (see [`FheType`] for the known classes).
    pub fn pack(preimage: U256, security_zone: i8, uint_type: u8, is_trivial: bool) -> Self {
        let hash = preimage & HASH_MASK_FOR_METADATA;
        let zone_byte = security_zone as u8 & SECURITY_ZONE_MASK;
        let metadata = (u16::from(type_byte(is_trivial, uint_type)) << 8) | u16::from(zone_byte);
        Self(hash | U256::from(metadata))
    }

    /// Re-pack this handle's pre-image with new metadata.
    pub fn with_metadata(self, security_zone: i8, uint_type: u8, is_trivial: bool) -> Self {
        Self::pack(self.0, security_zone, uint_type, is_trivial)
    }

    pub fn metadata(&self) -> HandleMetadata {
        let low = self.0.as_limbs()[0];
        let type_byte = (low >> 8) as u8;
        HandleMetadata {
            security_zone: low as u8 as i8,
            uint_type: type_byte & UINT_TYPE_MASK,
            is_trivial: type_byte & TRIVIALLY_ENCRYPTED_MASK != 0,
        }
    }

    /// High 240 bits, with the metadata bytes zeroed.
    pub fn preimage(&self) -> U256 {
        self.0 & HASH_MASK_FOR_METADATA
    }

    pub fn security_zone(&self) -> i8 {
        self.metadata().security_zone
    }

    pub fn uint_type(&self) -> u8 {
        self.metadata().uint_type
    }

    pub fn is_trivial(&self) -> bool {
        self.metadata().is_trivial
    }

    /// The encoded uint type, if it names a known class.
    pub fn fhe_type(&self) -> Option<FheType> {
        FheType::try_from(self.uint_type()).ok()
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }
}

/// Free-function form of [`CiphertextHandle::pack`].
pub fn pack(
    preimage: U256,
    security_zone: i8,
    uint_type: u8,
    is_trivial: bool,
) -> CiphertextHandle {
    CiphertextHandle::pack(preimage, security_zone, uint_type, is_trivial)
}

/// Free-function form of [`CiphertextHandle::metadata`].
pub fn unpack(handle: CiphertextHandle) -> HandleMetadata {
    handle.metadata()
}

/// Narrow a wider zone value the way Solidity's `int8(x)` does: keep the low byte and
/// reinterpret it as signed.
pub fn narrow_security_zone(zone: i32) -> i8 {
    ((zone << 24) >> 24) as i8
}

fn type_byte(is_trivial: bool, uint_type: u8) -> u8 {
    let flag = if is_trivial { TRIVIALLY_ENCRYPTED_MASK } else { 0x00 };
    flag | (uint_type & UINT_TYPE_MASK)
}

impl From<U256> for CiphertextHandle {
    fn from(word: U256) -> Self {
        Self(word)
    }
}

impl From<CiphertextHandle> for U256 {
    fn from(handle: CiphertextHandle) -> Self {
        handle.0
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in self.to_be_bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Errors when parsing a handle from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleParseError {
    Empty,
    InvalidDigits,
}

impl core::str::FromStr for CiphertextHandle {
    type Err = HandleParseError;

    /// Accepts `0x`-prefixed hex or decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HandleParseError::Empty);
        }
        let word = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(s, 10),
        }
        .map_err(|_| HandleParseError::InvalidDigits)?;
        Ok(Self(word))
    }
}

/// An encrypted input as returned by the co-processor client, before metadata is appended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedInput {
    pub ct_hash: U256,
    pub security_zone: u8,
    pub utype: FheType,
    /// Co-processor signature attesting the input.
    pub signature: Vec<u8>,
}

impl EncryptedInput {
    /// The handle contracts will see for this input.
    pub fn handle(&self) -> CiphertextHandle {
        append_metadata_to_input(self)
    }
}

/// Append metadata to a co-processor input. Inputs are never trivially encrypted.
pub fn append_metadata_to_input(input: &EncryptedInput) -> CiphertextHandle {
    CiphertextHandle::pack(
        input.ct_hash,
        narrow_security_zone(i32::from(input.security_zone)),
        input.utype.as_u8(),
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn word(hex: &str) -> U256 {
        U256::from_str_radix(hex, 16).unwrap()
    }

    #[test]
    fn pack_clears_low_bits_for_zero_metadata() {
        let hash = U256::from(0xffffu64);
        let packed = CiphertextHandle::pack(hash, 0, 0, false);
        assert_eq!(packed.into_raw(), U256::ZERO);

        let hash = word("abcdef000000000000000000000000000000000000000000000000000000ffff");
        let packed = CiphertextHandle::pack(hash, 0, 0, false);
        assert_eq!(
            packed.into_raw(),
            word("abcdef0000000000000000000000000000000000000000000000000000000000")
        );
    }

    #[test]
    fn security_zone_encodes_as_twos_complement_byte() {
        let minus_one = CiphertextHandle::pack(U256::ZERO, -1, 0, false);
        assert_eq!(minus_one.into_raw(), U256::from(0xffu64));

        let five = CiphertextHandle::pack(U256::ZERO, 5, 0, false);
        assert_eq!(five.into_raw(), U256::from(0x05u64));

        let min = CiphertextHandle::pack(U256::ZERO, i8::MIN, 0, false);
        assert_eq!(min.into_raw(), U256::from(0x80u64));
        assert_eq!(min.security_zone(), i8::MIN);
    }

    #[test]
    fn metadata_byte_layout() {
        let h = CiphertextHandle::pack(U256::ZERO, 0, FheType::Uint128.as_u8(), true);
        assert_eq!(h.into_raw(), U256::from(0x8600u64));
        assert!(h.is_trivial());
        assert_eq!(h.fhe_type(), Some(FheType::Uint128));
    }

    #[test]
    fn oversized_uint_type_is_truncated() {
        let h = CiphertextHandle::pack(U256::ZERO, 0, 0xff, false);
        assert_eq!(h.uint_type(), 0x7f);
        assert!(!h.is_trivial());
    }

    #[test]
    fn narrowing_matches_solidity_int8_cast() {
        assert_eq!(narrow_security_zone(-1), -1);
        assert_eq!(narrow_security_zone(255), -1);
        assert_eq!(narrow_security_zone(256), 0);
        assert_eq!(narrow_security_zone(127), 127);
        assert_eq!(narrow_security_zone(128), -128);
    }

    #[test]
    fn input_metadata_is_non_trivial() {
        let input = EncryptedInput {
            ct_hash: word("1234000000000000000000000000000000000000000000000000000000001234"),
            security_zone: 0xfe,
            utype: FheType::Uint64,
            signature: Vec::new(),
        };
        let h = input.handle();
        assert_eq!(h.security_zone(), -2);
        assert_eq!(h.fhe_type(), Some(FheType::Uint64));
        assert!(!h.is_trivial());
        assert_eq!(
            h.preimage(),
            word("1234000000000000000000000000000000000000000000000000000000000000")
        );
    }

    #[test]
    fn parses_hex_and_decimal() {
        let a: CiphertextHandle = "0x0500".parse().unwrap();
        let b: CiphertextHandle = "1280".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!("".parse::<CiphertextHandle>(), Err(HandleParseError::Empty));
        assert_eq!("0xzz".parse::<CiphertextHandle>(), Err(HandleParseError::InvalidDigits));
    }

    #[test]
    fn display_is_full_width_hex() {
        let h = CiphertextHandle::from_raw(U256::from(0x0105u64));
        let s = alloc::format!("{h}");
        assert_eq!(s.len(), 66);
        assert!(s.ends_with("0105"));
    }

    proptest! {
        #[test]
        fn pack_unpack_preserves_fields_and_preimage(
            limbs in any::<[u64; 4]>(),
            zone in any::<i8>(),
            uint_type in 0u8..128,
            trivial in any::<bool>(),
        ) {
            let hash = U256::from_limbs(limbs);
            let packed = CiphertextHandle::pack(hash, zone, uint_type, trivial);

            prop_assert_eq!(
                packed.metadata(),
                HandleMetadata { security_zone: zone, uint_type, is_trivial: trivial }
            );
            prop_assert_eq!(packed.preimage(), hash & HASH_MASK_FOR_METADATA);
            prop_assert_eq!(packed, CiphertextHandle::pack(hash, zone, uint_type, trivial));
        }
    }
}
