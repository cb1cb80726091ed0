//! EIP-712 digest for confidential transfer permits.
//!
//! Must match the token contract's `Permit` verification, with `value_hash` being the packed
//! ciphertext handle rather than a plaintext amount.

use alloy_primitives::{Address, B256, U256};
use fhe_bridge_types::{CiphertextHandle, Eip712Domain};
use sha3::{Digest, Keccak256};

pub const EIP712_DOMAIN_TYPE: &[u8] =
    b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const PERMIT_TYPE: &[u8] =
    b"Permit(address owner,address spender,uint256 value_hash,uint256 nonce,uint256 deadline)";

pub fn keccak256_bytes(bytes: &[u8]) -> B256 {
    let mut h = Keccak256::new();
    h.update(bytes);
    B256::from_slice(h.finalize().as_slice())
}

fn address_word(address: Address) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[12..32].copy_from_slice(address.as_slice());
    padded
}

pub fn domain_separator(domain: &Eip712Domain) -> B256 {
    let mut buf = Vec::with_capacity(32 * 5);
    buf.extend_from_slice(keccak256_bytes(EIP712_DOMAIN_TYPE).as_slice());
    buf.extend_from_slice(keccak256_bytes(domain.name.as_bytes()).as_slice());
    buf.extend_from_slice(keccak256_bytes(domain.version.as_bytes()).as_slice());
    buf.extend_from_slice(&domain.chain_id.to_be_bytes::<32>());
    buf.extend_from_slice(&address_word(domain.verifying_contract));
    keccak256_bytes(&buf)
}

pub fn permit_struct_hash(
    owner: Address,
    spender: Address,
    value_hash: CiphertextHandle,
    nonce: U256,
    deadline: U256,
) -> B256 {
    let mut buf = Vec::with_capacity(32 * 6);
    buf.extend_from_slice(keccak256_bytes(PERMIT_TYPE).as_slice());
    buf.extend_from_slice(&address_word(owner));
    buf.extend_from_slice(&address_word(spender));
    buf.extend_from_slice(&value_hash.to_be_bytes());
    buf.extend_from_slice(&nonce.to_be_bytes::<32>());
    buf.extend_from_slice(&deadline.to_be_bytes::<32>());
    keccak256_bytes(&buf)
}

/// `keccak256("\x19\x01" || domainSeparator || structHash)`.
pub fn permit_digest(
    domain: &Eip712Domain,
    owner: Address,
    spender: Address,
    value_hash: CiphertextHandle,
    nonce: U256,
    deadline: U256,
) -> B256 {
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(domain_separator(domain).as_slice());
    let struct_hash = permit_struct_hash(owner, spender, value_hash, nonce, deadline);
    buf.extend_from_slice(struct_hash.as_slice());
    keccak256_bytes(&buf)
}
