//! # Test Support
//!
//! A deterministic mock of the external crypto provider so codec, EVM, and
//! assembler tests can exercise bn254/BLS/KZG paths without a curve library.

use ember_crypto::{install_provider, BlsOperation, CryptoError, CryptoProvider};

/// Version byte the mock (and mainnet) KZG scheme uses.
pub const MOCK_KZG_VERSION: u8 = 0x01;

/// Blob content the mock batch verifier rejects.
pub const MOCK_INVALID_BLOB: &[u8] = b"invalid-blob";

/// Deterministic stand-in for the external curve/commitment library.
#[derive(Debug, Default)]
pub struct MockCryptoProvider;

impl CryptoProvider for MockCryptoProvider {
    fn bn254_add(&self, input: &[u8]) -> Result<[u8; 64], CryptoError> {
        // XOR-fold both points; enough to observe data flow in tests.
        let mut out = [0u8; 64];
        for (i, byte) in input.iter().take(128).enumerate() {
            out[i % 64] ^= byte;
        }
        Ok(out)
    }

    fn bn254_mul(&self, input: &[u8]) -> Result<[u8; 64], CryptoError> {
        let mut out = [0u8; 64];
        for (i, byte) in input.iter().take(96).enumerate() {
            out[i % 64] ^= byte.rotate_left(1);
        }
        Ok(out)
    }

    fn bn254_pairing(&self, input: &[u8]) -> Result<bool, CryptoError> {
        if input.len() % 192 != 0 {
            return Err(CryptoError::MalformedInput("pairing input"));
        }
        Ok(input.iter().all(|&b| b == 0))
    }

    fn bls12_381(&self, _op: BlsOperation, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(input.to_vec())
    }

    fn verify_kzg_proof(
        &self,
        _commitment: &[u8; 48],
        _z: &[u8; 32],
        _y: &[u8; 32],
        proof: &[u8; 48],
    ) -> Result<bool, CryptoError> {
        Ok(proof != &[0u8; 48])
    }

    fn verify_blob_kzg_proof_batch(
        &self,
        blobs: &[Vec<u8>],
        commitments: &[[u8; 48]],
        proofs: &[[u8; 48]],
    ) -> Result<bool, CryptoError> {
        if blobs.len() != commitments.len() || blobs.len() != proofs.len() {
            return Err(CryptoError::MalformedInput("batch length mismatch"));
        }
        Ok(blobs.iter().all(|blob| blob != MOCK_INVALID_BLOB))
    }
}

/// Installs the mock provider (first caller wins; safe to call repeatedly).
pub fn install_mock_kzg() {
    let _ = install_provider(Box::new(MockCryptoProvider));
}
