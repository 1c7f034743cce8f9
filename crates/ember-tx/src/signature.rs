//! # Transaction Signatures
//!
//! The (v, r, s) triple with the legacy / EIP-155 / typed-parity rules, plus
//! sender recovery over a signing hash.

use crate::errors::TxError;
use ember_crypto::{
    public_key_to_address, recover_public_key, secp256k1_n_half, sign_hash,
};
use ember_types::{u256_to_be_bytes, Address, Hash, U256};
use serde::{Deserialize, Serialize};

/// A transaction signature.
///
/// For typed transactions `v` is the y-parity (0 or 1); for legacy
/// transactions it is the raw 27/28 or EIP-155 encoded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    /// Parity or legacy v.
    pub v: u64,
    /// r component.
    pub r: U256,
    /// s component.
    pub s: U256,
}

impl TxSignature {
    /// Validates `s` against the EIP-2 malleability bound.
    ///
    /// # Errors
    ///
    /// Returns `HighS` when `s > n/2`.
    pub fn check_low_s(&self) -> Result<(), TxError> {
        if self.s > secp256k1_n_half() {
            return Err(TxError::HighS);
        }
        Ok(())
    }

    /// Validates a typed-transaction parity value.
    ///
    /// # Errors
    ///
    /// Returns `YParityInvalid` for values other than 0/1.
    pub fn check_y_parity(&self) -> Result<(), TxError> {
        if self.v > 1 {
            return Err(TxError::YParityInvalid(self.v));
        }
        Ok(())
    }

    /// Recovery id for a typed transaction (`v` is the parity itself).
    ///
    /// # Errors
    ///
    /// Returns `YParityInvalid` for values other than 0/1.
    pub fn typed_recovery_id(&self) -> Result<u8, TxError> {
        self.check_y_parity()?;
        Ok(self.v as u8)
    }

    /// Recovery id and derived chain id for a legacy transaction.
    ///
    /// Pre-EIP-155: `v ∈ {27, 28}`, no chain id. Post-EIP-155:
    /// `v = chain_id * 2 + 35 + parity`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidV` for values outside both encodings.
    pub fn legacy_recovery_id(&self) -> Result<(u8, Option<u64>), TxError> {
        match self.v {
            27 | 28 => Ok(((self.v - 27) as u8, None)),
            v if v >= 35 => Ok((((v - 35) % 2) as u8, Some((v - 35) / 2))),
            v => Err(TxError::InvalidV(v)),
        }
    }

    /// Recovers the uncompressed signer public key.
    ///
    /// # Errors
    ///
    /// Propagates signature-format and recovery failures.
    pub fn recover_public_key(
        &self,
        signing_hash: &Hash,
        recovery_id: u8,
    ) -> Result<[u8; 64], TxError> {
        self.check_low_s()?;
        let r = u256_to_be_bytes(self.r);
        let s = u256_to_be_bytes(self.s);
        Ok(recover_public_key(signing_hash.as_bytes(), &r, &s, recovery_id)?)
    }

    /// Recovers the signer address.
    ///
    /// # Errors
    ///
    /// Propagates signature-format and recovery failures.
    pub fn recover_address(
        &self,
        signing_hash: &Hash,
        recovery_id: u8,
    ) -> Result<Address, TxError> {
        let public = self.recover_public_key(signing_hash, recovery_id)?;
        Ok(public_key_to_address(&public))
    }
}

/// Signs a signing hash, producing a typed-parity signature.
///
/// # Errors
///
/// Propagates key errors.
pub fn sign_typed(signing_hash: &Hash, secret_key: &[u8; 32]) -> Result<TxSignature, TxError> {
    let signature = sign_hash(signing_hash.as_bytes(), secret_key)?;
    Ok(TxSignature {
        v: u64::from(signature.recovery_id),
        r: U256::from_big_endian(&signature.r),
        s: U256::from_big_endian(&signature.s),
    })
}

/// Signs a signing hash, producing a legacy signature: 27/28 without a chain
/// id, EIP-155 encoded with one.
///
/// # Errors
///
/// Propagates key errors.
pub fn sign_legacy(
    signing_hash: &Hash,
    secret_key: &[u8; 32],
    chain_id: Option<u64>,
) -> Result<TxSignature, TxError> {
    let signature = sign_hash(signing_hash.as_bytes(), secret_key)?;
    let parity = u64::from(signature.recovery_id);
    let v = match chain_id {
        Some(id) => id * 2 + 35 + parity,
        None => 27 + parity,
    };
    Ok(TxSignature {
        v,
        r: U256::from_big_endian(&signature.r),
        s: U256::from_big_endian(&signature.s),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ember_crypto::keccak256;

    fn secret() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 7;
        key
    }

    #[test]
    fn legacy_v_encodings() {
        let sig = TxSignature {
            v: 28,
            r: U256::one(),
            s: U256::one(),
        };
        assert_eq!(sig.legacy_recovery_id().unwrap(), (1, None));

        let sig = TxSignature {
            v: 1 * 2 + 35,
            r: U256::one(),
            s: U256::one(),
        };
        assert_eq!(sig.legacy_recovery_id().unwrap(), (0, Some(1)));

        let sig = TxSignature {
            v: 30,
            r: U256::one(),
            s: U256::one(),
        };
        assert_eq!(sig.legacy_recovery_id().unwrap_err(), TxError::InvalidV(30));
    }

    #[test]
    fn high_s_is_rejected() {
        let sig = TxSignature {
            v: 0,
            r: U256::one(),
            s: secp256k1_n_half() + U256::one(),
        };
        assert_eq!(sig.check_low_s().unwrap_err(), TxError::HighS);
    }

    #[test]
    fn y_parity_bounds() {
        let sig = TxSignature {
            v: 2,
            r: U256::one(),
            s: U256::one(),
        };
        assert_eq!(sig.check_y_parity().unwrap_err(), TxError::YParityInvalid(2));
    }

    #[test]
    fn typed_sign_and_recover() {
        let hash = keccak256(b"typed payload");
        let sig = sign_typed(&hash, &secret()).unwrap();
        let recovered = sig
            .recover_address(&hash, sig.typed_recovery_id().unwrap())
            .unwrap();
        assert_eq!(
            recovered,
            ember_crypto::secret_key_to_address(&secret()).unwrap()
        );
    }

    #[test]
    fn eip155_sign_and_recover() {
        let hash = keccak256(b"legacy payload");
        let sig = sign_legacy(&hash, &secret(), Some(1)).unwrap();
        assert!(sig.v == 37 || sig.v == 38);

        let (recovery_id, chain_id) = sig.legacy_recovery_id().unwrap();
        assert_eq!(chain_id, Some(1));
        let recovered = sig.recover_address(&hash, recovery_id).unwrap();
        assert_eq!(
            recovered,
            ember_crypto::secret_key_to_address(&secret()).unwrap()
        );
    }
}
