//! # Crypto Error Types

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Secret key is not a valid scalar.
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// Signature components are out of range or malformed.
    #[error("invalid signature")]
    InvalidSignature,

    /// Recovery id is not 0 or 1.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Public-key recovery failed.
    #[error("public key recovery failed")]
    RecoveryFailed,

    /// Input to a provider operation is malformed.
    #[error("malformed provider input: {0}")]
    MalformedInput(&'static str),

    /// The external provider (bn254 / BLS12-381 / KZG) has not been installed.
    #[error("crypto provider not initialized")]
    NotInitialized,

    /// A provider operation failed internally.
    #[error("provider operation failed: {0}")]
    ProviderFailure(&'static str),
}
