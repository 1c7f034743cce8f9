//! # Ember Crypto
//!
//! The cryptographic surface of the Ember stack: Keccak/SHA-2/RIPEMD digests,
//! secp256k1 signing and recovery, the BLAKE2b compression function, and the
//! pluggable provider interface for bn254, BLS12-381, and KZG operations.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod blake2;
pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod provider;

pub use blake2::blake2_compress;
pub use ecdsa::{
    public_key_to_address, recover_public_key, secp256k1_n, secp256k1_n_half,
    secret_key_to_address, sign_hash, RecoverableSignature, SECP256K1_N, SECP256K1_N_HALF,
};
pub use errors::CryptoError;
pub use hashing::{keccak256, ripemd160, sha256};
pub use provider::{
    compute_versioned_hash, install_provider, provider, provider_installed, BlsOperation,
    CryptoProvider, BYTES_PER_BLOB, BYTES_PER_COMMITMENT,
};
