/// Encrypted integer classes, numbered as the co-processor numbers them.
///
/// The number is what lands in the 7-bit type field of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FheType {
    Bool = 0,
    Uint4 = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    Uint128 = 6,
    Uint160 = 7,
    Uint256 = 8,
}

impl FheType {
    /// Addresses are encrypted as 160-bit integers.
    pub const ADDRESS: FheType = FheType::Uint160;

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Width in bits of the plaintext domain.
    pub const fn bits(self) -> u32 {
        match self {
            FheType::Bool => 1,
            FheType::Uint4 => 4,
            FheType::Uint8 => 8,
            FheType::Uint16 => 16,
            FheType::Uint32 => 32,
            FheType::Uint64 => 64,
            FheType::Uint128 => 128,
            FheType::Uint160 => 160,
            FheType::Uint256 => 256,
        }
    }
}

impl TryFrom<u8> for FheType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use FheType::*;
        let t = match value {
            0 => Bool,
            1 => Uint4,
            2 => Uint8,
            3 => Uint16,
            4 => Uint32,
            5 => Uint64,
            6 => Uint128,
            7 => Uint160,
            8 => Uint256,
            other => return Err(other),
        };
        Ok(t)
    }
}
