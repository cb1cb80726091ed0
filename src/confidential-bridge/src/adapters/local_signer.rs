use alloy_primitives::{Address, B256};
use fhe_bridge_types::PermitSignature;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::{
    eip712::keccak256_bytes,
    ports::{SignerError, TypedDataSigner},
};

/// In-process secp256k1 key. Suitable for relayer processes that hold their key in env/config.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner").field("address", &self.address).finish_non_exhaustive()
    }
}

/// Ethereum address of a public key: last 20 bytes of keccak(uncompressed point without prefix).
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256_bytes(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

impl LocalSigner {
    pub fn new(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        let raw = private_key.trim();
        let raw = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let key =
            SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key))
    }

    pub fn sign_digest(&self, digest: B256) -> Result<PermitSignature, SignerError> {
        let (signature, recid) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        let (r, s) = signature.split_bytes();
        Ok(PermitSignature {
            v: 27 + recid.to_byte(),
            r: B256::from_slice(r.as_slice()),
            s: B256::from_slice(s.as_slice()),
        })
    }
}

impl TypedDataSigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_hash(&self, digest: B256) -> Result<PermitSignature, SignerError> {
        self.sign_digest(digest)
    }
}

/// Address that produced `signature` over `digest`, if the signature is well formed.
pub fn recover_signer(digest: B256, signature: &PermitSignature) -> Option<Address> {
    let recid = RecoveryId::from_byte(signature.v.checked_sub(27)?)?;
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(signature.r.as_slice());
    rs[32..].copy_from_slice(signature.s.as_slice());
    let signature = Signature::from_slice(&rs).ok()?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recid).ok()?;
    Some(address_of(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    // Well-known test vector (also used by web3.js docs).
    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn derives_the_ethereum_address() {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        assert_eq!(signer.address, address!("2c7536E3605D9C16a7a3D7b1898e529396a65c23"));
    }

    #[test]
    fn signatures_recover_to_the_signer() {
        let signer = LocalSigner::from_hex(KEY).unwrap();
        let digest = keccak256_bytes(b"confidential permit");
        let sig = signer.sign_digest(digest).unwrap();
        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(recover_signer(digest, &sig), Some(signer.address));

        let other = keccak256_bytes(b"another digest");
        assert_ne!(recover_signer(other, &sig), Some(signer.address));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(LocalSigner::from_hex("0x1234"), Err(SignerError::InvalidKey(_))));
        assert!(matches!(LocalSigner::from_hex("zz"), Err(SignerError::InvalidKey(_))));
    }
}
