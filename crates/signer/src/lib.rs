//! Incremental multiset hash over byte chunks, finalized into a secp256k1
//! signature. See spec §4.2.
//!
//! The accumulator is an elliptic-curve multiset hash (ECMH) over
//! Ristretto255: each `update(chunk)` hashes the chunk to a group element
//! via a domain-separated hash-to-point and adds it to a running sum. Because
//! group addition is commutative and associative, the final accumulator is
//! independent of how the caller chose to chunk the input.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::traits::Identity;
use secp256k1::{ecdsa::RecoverableSignature, Message, SecretKey, SECP256K1};
use sha2::Sha512;
use thiserror::Error;

/// Domain separation tag mixed into every hash-to-point call so this
/// accumulator can never collide with an ECMH built for another purpose.
const DOMAIN_TAG: &[u8] = b"basin-ecmh-v1";

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("secp256k1 signing failed: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// A 65-byte recoverable secp256k1 signature: `r (32) || s (32) || v (1)`.
pub type SignatureBytes = [u8; 65];

/// Incremental ECMH accumulator plus the key used to sign it on `finalize`.
pub struct Signer {
    accumulator: RistrettoPoint,
    private_key: SecretKey,
}

impl Signer {
    pub fn new(private_key: SecretKey) -> Self {
        Self {
            accumulator: RistrettoPoint::identity(),
            private_key,
        }
    }

    /// Folds one chunk of bytes into the running accumulator. Order of
    /// `update` calls and the chunk boundaries chosen do not affect the
    /// final accumulator value.
    pub fn update(&mut self, chunk: &[u8]) {
        self.accumulator += hash_to_point(chunk);
    }

    /// The accumulator's canonical 32-byte encoding at this point in time,
    /// without consuming the signer. Exposed mainly for testing the
    /// chunking-independence invariant.
    pub fn accumulator_bytes(&self) -> [u8; 32] {
        self.accumulator.compress().to_bytes()
    }

    /// Serializes the accumulator and produces a signature over it,
    /// consuming the signer (its state is tied to one attempted byte
    /// stream; a retried upload starts a fresh `Signer`).
    pub fn finalize(self) -> Result<SignatureBytes, SignerError> {
        let digest = self.accumulator_bytes();
        let message = Message::from_digest(digest);
        let recoverable = SECP256K1.sign_ecdsa_recoverable(&message, &self.private_key);
        let (recovery_id, compact) = recoverable.serialize_compact();

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&compact);
        out[64] = recovery_id.to_i32() as u8;
        Ok(out)
    }
}

fn hash_to_point(chunk: &[u8]) -> RistrettoPoint {
    let mut input = Vec::with_capacity(DOMAIN_TAG.len() + chunk.len());
    input.extend_from_slice(DOMAIN_TAG);
    input.extend_from_slice(chunk);
    RistrettoPoint::hash_from_bytes::<Sha512>(&input)
}

/// Recovers nothing on its own, but lets callers verify a signature they
/// received against a known accumulator and a claimed recoverable signature,
/// mirroring what the vault service does server-side.
pub fn verify(
    accumulator: &[u8; 32],
    signature: &RecoverableSignature,
    expected_pubkey: &secp256k1::PublicKey,
) -> Result<bool, SignerError> {
    let message = Message::from_digest(*accumulator);
    let recovered = SECP256K1.recover_ecdsa(&message, signature)?;
    Ok(recovered == *expected_pubkey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn random_key() -> SecretKey {
        SecretKey::new(&mut thread_rng())
    }

    #[test]
    fn chunking_is_order_dependent_only_on_content_not_boundaries() {
        let key = random_key();
        let mut one_shot = Signer::new(key);
        one_shot.update(b"HelloWorld");

        let mut chunked = Signer::new(key);
        chunked.update(b"Hello");
        chunked.update(b"World");

        assert_eq!(one_shot.accumulator_bytes(), chunked.accumulator_bytes());
    }

    #[test]
    fn distinct_inputs_yield_distinct_nonzero_accumulators() {
        let key = random_key();
        let mut hello = Signer::new(key);
        hello.update(b"Hello");

        let mut world = Signer::new(key);
        world.update(b"World");

        assert_ne!(hello.accumulator_bytes(), world.accumulator_bytes());
        assert_ne!(hello.accumulator_bytes(), [0u8; 32]);
    }

    #[test]
    fn finalize_is_verifiable_against_public_key() {
        let key = random_key();
        let pubkey = key.public_key(SECP256K1);

        let mut signer = Signer::new(key);
        signer.update(b"payload bytes");
        let accumulator = signer.accumulator_bytes();

        let mut signer = Signer::new(key);
        signer.update(b"payload bytes");
        let sig_bytes = signer.finalize().expect("signing should succeed");

        let (recovery_id, compact) = (
            secp256k1::ecdsa::RecoveryId::from_i32(sig_bytes[64] as i32).unwrap(),
            &sig_bytes[..64],
        );
        let recoverable =
            RecoverableSignature::from_compact(compact, recovery_id).expect("valid signature");

        assert!(verify(&accumulator, &recoverable, &pubkey).unwrap());
    }
}
