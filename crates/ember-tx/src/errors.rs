//! # Transaction Error Types

use ember_crypto::CryptoError;
use thiserror::Error;

/// Errors from transaction decoding, validation, and signing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    /// Malformed RLP payload.
    #[error("invalid transaction RLP: {0}")]
    InvalidRlp(String),

    /// Envelope type byte does not match the expected variant.
    #[error("wrong transaction type: expected {expected:#04x}, got {actual:#04x}")]
    WrongTxType {
        /// Expected envelope byte.
        expected: u8,
        /// Observed envelope byte.
        actual: u8,
    },

    /// The envelope type byte is not a known transaction type.
    #[error("unknown transaction type: {0:#04x}")]
    UnknownTxType(u8),

    /// A scalar field carries leading zero bytes.
    #[error("leading zero bytes in field {0}")]
    LeadingZero(&'static str),

    /// A fixed-size field has the wrong length.
    #[error("length mismatch in field {field}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Field name.
        field: &'static str,
        /// Expected byte length.
        expected: usize,
        /// Observed byte length.
        actual: usize,
    },

    /// Transaction chain id does not match the chain.
    #[error("chain id mismatch: tx {tx}, chain {chain}")]
    ChainIdMismatch {
        /// Chain id carried by the transaction.
        tx: u64,
        /// Chain id of the configured chain.
        chain: u64,
    },

    /// Legacy `v` value is not a valid pre- or post-EIP-155 encoding.
    #[error("invalid legacy v value: {0}")]
    InvalidV(u64),

    /// Typed-transaction parity is neither 0 nor 1.
    #[error("invalid y parity: {0}")]
    YParityInvalid(u64),

    /// Signature `s` exceeds half the curve order (EIP-2).
    #[error("signature s value exceeds secp256k1 n/2")]
    HighS,

    /// `gas_limit * fee` overflows 256 bits.
    #[error("gas limit times fee overflows 2^256 - 1")]
    GasOverflow,

    /// `max_fee_per_gas < max_priority_fee_per_gas`.
    #[error("max fee per gas is less than max priority fee per gas")]
    MaxFeeLessThanPriority,

    /// Blob transaction carries no or too many versioned hashes.
    #[error("blob count {count} outside 1..={limit}")]
    BlobCountOutOfRange {
        /// Number of versioned hashes.
        count: usize,
        /// Per-transaction blob limit.
        limit: usize,
    },

    /// A versioned hash does not start with the KZG version byte or does not
    /// match its commitment.
    #[error("versioned hash mismatch at index {0}")]
    VersionedHashMismatch(usize),

    /// Blob transactions must have a recipient.
    #[error("blob transaction without recipient")]
    BlobTxMissingTo,

    /// Network-wrapper blob/commitment/proof counts disagree.
    #[error("blob wrapper length mismatch")]
    BlobWrapperLengthMismatch,

    /// Batch KZG verification failed.
    #[error("kzg proof verification failed")]
    KzgProofInvalid,

    /// The transaction's type is not activated on the configured chain.
    #[error("transaction type {0} not activated on this chain")]
    TxTypeNotActivated(u8),

    /// Operation requires a signature the transaction does not carry.
    #[error("transaction is not signed")]
    Unsigned,

    /// Signing or recovery failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
