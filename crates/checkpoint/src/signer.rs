//! Signing and sender recovery for gossip messages
//!
//! The wire signature envelope is `pubkey(32) || sig(64)`. Recovering the
//! sender means verifying the ed25519 signature over the content hash and
//! deriving the address from the attached public key, so a forged envelope
//! can never recover to a committee member's address.

use ed25519_dalek::{
    Signer as DalekSigner, Signature, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use l2_chain::{Address, Hash};
use rand::rngs::OsRng;
use rand::RngCore;

/// Length of the wire signature envelope
pub const ENVELOPE_LENGTH: usize = PUBLIC_KEY_LENGTH + SIGNATURE_LENGTH;

/// Signing, sender recovery, and local identity
pub trait Signer: Send + Sync {
    /// Sign a content hash with the local key
    fn sign(&self, hash: &Hash) -> anyhow::Result<Vec<u8>>;

    /// Recover the sender address from a content hash and signature envelope
    ///
    /// Fails if the envelope is malformed or the signature does not verify.
    fn recover_address(&self, hash: &Hash, signature: &[u8]) -> anyhow::Result<Address>;

    /// Address of the local key
    fn local_address(&self) -> Address;
}

/// Derive the 20-byte address of an ed25519 public key
pub fn address_of(key: &VerifyingKey) -> Address {
    let digest = Hash::digest(key.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest.as_bytes()[..20]);
    Address::new(bytes)
}

/// Ed25519-backed signer
pub struct Ed25519Signer {
    key: SigningKey,
    address: Address,
}

impl Ed25519Signer {
    pub fn new(key: SigningKey) -> Self {
        let address = address_of(&key.verifying_key());
        Self { key, address }
    }

    /// Build a signer from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(&seed))
    }

    /// Generate a signer with a fresh random key
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// The local public key
    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, hash: &Hash) -> anyhow::Result<Vec<u8>> {
        let signature = self.key.sign(hash.as_bytes());

        let mut envelope = Vec::with_capacity(ENVELOPE_LENGTH);
        envelope.extend_from_slice(self.key.verifying_key().as_bytes());
        envelope.extend_from_slice(&signature.to_bytes());
        Ok(envelope)
    }

    fn recover_address(&self, hash: &Hash, signature: &[u8]) -> anyhow::Result<Address> {
        if signature.len() != ENVELOPE_LENGTH {
            anyhow::bail!(
                "signature envelope must be {ENVELOPE_LENGTH} bytes, got {}",
                signature.len()
            );
        }

        let key_bytes: [u8; PUBLIC_KEY_LENGTH] = signature[..PUBLIC_KEY_LENGTH]
            .try_into()
            .expect("length checked above");
        let sig_bytes: [u8; SIGNATURE_LENGTH] = signature[PUBLIC_KEY_LENGTH..]
            .try_into()
            .expect("length checked above");

        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| anyhow::anyhow!("invalid public key in envelope: {e}"))?;
        key.verify(hash.as_bytes(), &Signature::from_bytes(&sig_bytes))
            .map_err(|e| anyhow::anyhow!("signature verification failed: {e}"))?;

        Ok(address_of(&key))
    }

    fn local_address(&self) -> Address {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_recover() {
        let signer = Ed25519Signer::from_seed([7u8; 32]);
        let hash = Hash::digest(b"checkpoint content");

        let envelope = signer.sign(&hash).unwrap();
        assert_eq!(envelope.len(), ENVELOPE_LENGTH);

        let recovered = signer.recover_address(&hash, &envelope).unwrap();
        assert_eq!(recovered, signer.local_address());
    }

    #[test]
    fn test_recovery_is_public_material_only() {
        // Any node can recover a peer's address without the peer's key
        let alice = Ed25519Signer::from_seed([1u8; 32]);
        let bob = Ed25519Signer::from_seed([2u8; 32]);
        let hash = Hash::digest(b"content");

        let envelope = alice.sign(&hash).unwrap();
        let recovered = bob.recover_address(&hash, &envelope).unwrap();
        assert_eq!(recovered, alice.local_address());
    }

    #[test]
    fn test_recover_rejects_wrong_hash() {
        let signer = Ed25519Signer::from_seed([3u8; 32]);
        let envelope = signer.sign(&Hash::digest(b"signed content")).unwrap();

        assert!(signer
            .recover_address(&Hash::digest(b"other content"), &envelope)
            .is_err());
    }

    #[test]
    fn test_recover_rejects_malformed_envelope() {
        let signer = Ed25519Signer::from_seed([4u8; 32]);
        let hash = Hash::digest(b"content");

        assert!(signer.recover_address(&hash, &[0u8; 12]).is_err());

        let mut envelope = signer.sign(&hash).unwrap();
        envelope[40] ^= 0xff; // corrupt the signature half
        assert!(signer.recover_address(&hash, &envelope).is_err());
    }

    #[test]
    fn test_distinct_seeds_distinct_addresses() {
        let a = Ed25519Signer::from_seed([5u8; 32]);
        let b = Ed25519Signer::from_seed([6u8; 32]);
        assert_ne!(a.local_address(), b.local_address());
        assert!(!a.local_address().is_zero());
    }
}
