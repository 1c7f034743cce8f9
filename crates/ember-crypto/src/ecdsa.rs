//! # secp256k1 ECDSA
//!
//! Deterministic (RFC 6979) signing and public-key recovery over 32-byte
//! prehashes, plus the range constants transaction validation needs.
//! Low-S normalization (EIP-2) is applied at signing time; high-S signatures
//! are rejected at recovery time by the transaction layer.

use crate::errors::CryptoError;
use crate::hashing::keccak256;
use ember_types::{Address, U256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

/// secp256k1 curve order `n`.
pub const SECP256K1_N: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
    0x41, 0x41,
];

/// `n / 2`, the EIP-2 malleability boundary.
pub const SECP256K1_N_HALF: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B,
    0x20, 0xA0,
];

/// The curve order as a `U256`.
#[must_use]
pub fn secp256k1_n() -> U256 {
    U256::from_big_endian(&SECP256K1_N)
}

/// Half the curve order as a `U256`.
#[must_use]
pub fn secp256k1_n_half() -> U256 {
    U256::from_big_endian(&SECP256K1_N_HALF)
}

/// A recoverable signature over a 32-byte prehash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// r component.
    pub r: [u8; 32],
    /// s component (always in the lower half of the order).
    pub s: [u8; 32],
    /// Recovery id (0 or 1).
    pub recovery_id: u8,
}

/// Signs a 32-byte prehash with the given secret key.
///
/// The returned signature is low-S normalized; the recovery id parity is
/// flipped accordingly.
///
/// # Errors
///
/// Returns `InvalidSecretKey` if the key is not a valid scalar.
pub fn sign_hash(msg_hash: &[u8; 32], secret_key: &[u8; 32]) -> Result<RecoverableSignature, CryptoError> {
    let signing_key =
        SigningKey::from_bytes(secret_key.into()).map_err(|_| CryptoError::InvalidSecretKey)?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(msg_hash)
        .map_err(|_| CryptoError::InvalidSignature)?;

    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    };

    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    Ok(RecoverableSignature {
        r,
        s,
        recovery_id: recovery_id.to_byte(),
    })
}

/// Recovers the uncompressed public key (64 bytes, no 0x04 prefix) that
/// signed `msg_hash`.
///
/// # Errors
///
/// Returns `InvalidRecoveryId` for recovery ids other than 0/1 and
/// `RecoveryFailed` when no valid point exists.
pub fn recover_public_key(
    msg_hash: &[u8; 32],
    r: &[u8; 32],
    s: &[u8; 32],
    recovery_id: u8,
) -> Result<[u8; 64], CryptoError> {
    if recovery_id > 1 {
        return Err(CryptoError::InvalidRecoveryId(recovery_id));
    }
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r);
    compact[32..].copy_from_slice(s);

    let signature =
        Signature::from_slice(&compact).map_err(|_| CryptoError::InvalidSignature)?;
    let rec_id =
        RecoveryId::from_byte(recovery_id).ok_or(CryptoError::InvalidRecoveryId(recovery_id))?;

    let verifying_key = VerifyingKey::recover_from_prehash(msg_hash, &signature, rec_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    let point = verifying_key.to_encoded_point(false);
    let bytes = point.as_bytes();
    // SEC1 uncompressed: 0x04 || x || y
    let mut out = [0u8; 64];
    out.copy_from_slice(&bytes[1..65]);
    Ok(out)
}

/// Derives the address of an uncompressed public key:
/// the low 20 bytes of its Keccak-256 digest.
#[must_use]
pub fn public_key_to_address(public_key: &[u8; 64]) -> Address {
    let digest = keccak256(public_key);
    Address::from_slice(&digest.as_bytes()[12..]).expect("12..32 is 20 bytes")
}

/// Derives the address controlled by a secret key.
///
/// # Errors
///
/// Returns `InvalidSecretKey` if the key is not a valid scalar.
pub fn secret_key_to_address(secret_key: &[u8; 32]) -> Result<Address, CryptoError> {
    let signing_key =
        SigningKey::from_bytes(secret_key.into()).map_err(|_| CryptoError::InvalidSecretKey)?;
    let point = signing_key.verifying_key().to_encoded_point(false);
    let mut public = [0u8; 64];
    public.copy_from_slice(&point.as_bytes()[1..65]);
    Ok(public_key_to_address(&public))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 0x42;
        key
    }

    #[test]
    fn sign_then_recover_yields_signer_address() {
        let secret = test_key();
        let msg_hash = keccak256(b"ember signing test").0;

        let signature = sign_hash(&msg_hash, &secret).unwrap();
        let public = recover_public_key(
            &msg_hash,
            &signature.r,
            &signature.s,
            signature.recovery_id,
        )
        .unwrap();

        assert_eq!(
            public_key_to_address(&public),
            secret_key_to_address(&secret).unwrap()
        );
    }

    #[test]
    fn signatures_are_low_s() {
        let secret = test_key();
        for i in 0u8..16 {
            let msg_hash = keccak256(&[i]).0;
            let signature = sign_hash(&msg_hash, &secret).unwrap();
            assert!(U256::from_big_endian(&signature.s) <= secp256k1_n_half());
        }
    }

    #[test]
    fn signing_is_deterministic() {
        let secret = test_key();
        let msg_hash = keccak256(b"same message").0;
        assert_eq!(
            sign_hash(&msg_hash, &secret).unwrap(),
            sign_hash(&msg_hash, &secret).unwrap()
        );
    }

    #[test]
    fn bad_recovery_id_is_rejected() {
        let secret = test_key();
        let msg_hash = keccak256(b"x").0;
        let signature = sign_hash(&msg_hash, &secret).unwrap();
        let result = recover_public_key(&msg_hash, &signature.r, &signature.s, 4);
        assert_eq!(result, Err(CryptoError::InvalidRecoveryId(4)));
    }

    #[test]
    fn zero_secret_key_is_rejected() {
        let msg_hash = [1u8; 32];
        assert_eq!(
            sign_hash(&msg_hash, &[0u8; 32]),
            Err(CryptoError::InvalidSecretKey)
        );
    }
}
