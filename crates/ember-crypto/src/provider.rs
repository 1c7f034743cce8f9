//! # External Crypto Provider
//!
//! bn254, BLS12-381, and KZG operations are supplied by an external library
//! behind this trait. The provider is installed once per process before any
//! EVM that needs EIP-2537 or EIP-4844 is constructed; construction without
//! it fails rather than panicking at dispatch time.

use crate::errors::CryptoError;
use crate::hashing::sha256;
use ember_types::Hash;
use std::sync::OnceLock;

/// Size of one blob in bytes (4096 field elements of 32 bytes).
pub const BYTES_PER_BLOB: usize = 4096 * 32;

/// Size of a KZG commitment or proof.
pub const BYTES_PER_COMMITMENT: usize = 48;

/// BLS12-381 group operations exposed by EIP-2537.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlsOperation {
    /// G1 point addition.
    G1Add,
    /// G1 scalar multiplication.
    G1Mul,
    /// G1 multi-scalar multiplication.
    G1Msm,
    /// G2 point addition.
    G2Add,
    /// G2 scalar multiplication.
    G2Mul,
    /// G2 multi-scalar multiplication.
    G2Msm,
    /// Pairing check.
    PairingCheck,
    /// Map a field element to G1.
    MapFpToG1,
    /// Map an Fp2 element to G2.
    MapFp2ToG2,
}

/// The operations Ember delegates to an external curve/commitment library.
pub trait CryptoProvider: Send + Sync {
    /// bn254 (alt_bn128) point addition over the 128-byte precompile input.
    fn bn254_add(&self, input: &[u8]) -> Result<[u8; 64], CryptoError>;

    /// bn254 scalar multiplication over the 96-byte precompile input.
    fn bn254_mul(&self, input: &[u8]) -> Result<[u8; 64], CryptoError>;

    /// bn254 pairing check over concatenated point pairs.
    fn bn254_pairing(&self, input: &[u8]) -> Result<bool, CryptoError>;

    /// One of the EIP-2537 BLS12-381 group operations.
    fn bls12_381(&self, op: BlsOperation, input: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verifies a single KZG opening proof (EIP-4844 point evaluation).
    fn verify_kzg_proof(
        &self,
        commitment: &[u8; 48],
        z: &[u8; 32],
        y: &[u8; 32],
        proof: &[u8; 48],
    ) -> Result<bool, CryptoError>;

    /// Batch-verifies blob commitments against their proofs.
    fn verify_blob_kzg_proof_batch(
        &self,
        blobs: &[Vec<u8>],
        commitments: &[[u8; 48]],
        proofs: &[[u8; 48]],
    ) -> Result<bool, CryptoError>;
}

static PROVIDER: OnceLock<Box<dyn CryptoProvider>> = OnceLock::new();

/// Installs the process-wide provider. The first call wins; later calls are
/// no-ops that report whether this call performed the installation.
pub fn install_provider(provider: Box<dyn CryptoProvider>) -> bool {
    PROVIDER.set(provider).is_ok()
}

/// Returns true once a provider has been installed.
#[must_use]
pub fn provider_installed() -> bool {
    PROVIDER.get().is_some()
}

/// Fetches the installed provider.
///
/// # Errors
///
/// Returns `NotInitialized` when no provider was installed.
pub fn provider() -> Result<&'static dyn CryptoProvider, CryptoError> {
    PROVIDER
        .get()
        .map(|boxed| boxed.as_ref())
        .ok_or(CryptoError::NotInitialized)
}

/// Computes the versioned hash of a KZG commitment:
/// `version || sha256(commitment)[1..]`.
#[must_use]
pub fn compute_versioned_hash(commitment: &[u8; 48], version: u8) -> Hash {
    let mut digest = sha256(commitment);
    digest[0] = version;
    Hash::new(digest)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_hash_replaces_first_byte() {
        let commitment = [7u8; 48];
        let hash = compute_versioned_hash(&commitment, 0x01);
        assert_eq!(hash.as_bytes()[0], 0x01);

        let plain = sha256(&commitment);
        assert_eq!(&hash.as_bytes()[1..], &plain[1..]);
    }

    #[test]
    fn provider_is_absent_until_installed() {
        // Runs before any test in this binary installs one.
        if !provider_installed() {
            assert_eq!(
                provider().err(),
                Some(CryptoError::NotInitialized)
            );
        }
    }
}
