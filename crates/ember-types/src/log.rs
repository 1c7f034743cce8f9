//! # Logs and the 2048-bit Log Bloom
//!
//! Execution logs (LOG0..LOG4) and the per-receipt/per-header bloom filter
//! that indexes them.

use crate::primitives::{Address, Bytes, Hash};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Maximum number of topics a log can carry.
pub const MAX_TOPICS: usize = 4;

/// A log record emitted during execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Address of the contract that emitted the log.
    pub address: Address,
    /// Indexed topics (at most four).
    pub topics: Vec<Hash>,
    /// Unindexed payload.
    pub data: Bytes,
}

impl Log {
    /// Creates a new log record.
    #[must_use]
    pub fn new(address: Address, topics: Vec<Hash>, data: Bytes) -> Self {
        debug_assert!(topics.len() <= MAX_TOPICS);
        Self {
            address,
            topics,
            data,
        }
    }
}

impl Encodable for Log {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3)
            .append(&self.address)
            .append_list(&self.topics)
            .append(&self.data);
    }
}

impl Decodable for Log {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let topics: Vec<Hash> = rlp.list_at(1)?;
        if topics.len() > MAX_TOPICS {
            return Err(DecoderError::Custom("too many log topics"));
        }
        Ok(Self {
            address: rlp.val_at(0)?,
            topics,
            data: rlp.val_at(2)?,
        })
    }
}

// =============================================================================
// BLOOM (2048 bits)
// =============================================================================

/// The 2048-bit log bloom filter.
///
/// Each input sets three bits, derived from the first six bytes of its
/// Keccak-256 digest taken as three 11-bit indices.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Bloom(pub [u8; 256]);

impl Bloom {
    /// The empty bloom.
    pub const ZERO: Self = Self([0u8; 256]);

    /// Sets the three bits for one raw input.
    pub fn accrue(&mut self, input: &[u8]) {
        let digest: [u8; 32] = Keccak256::digest(input).into();
        for pair in 0..3 {
            let index =
                (usize::from(digest[pair * 2]) << 8 | usize::from(digest[pair * 2 + 1])) % 2048;
            self.0[255 - index / 8] |= 1 << (index % 8);
        }
    }

    /// Folds a log's address and topics into the bloom.
    pub fn accrue_log(&mut self, log: &Log) {
        self.accrue(log.address.as_bytes());
        for topic in &log.topics {
            self.accrue(topic.as_bytes());
        }
    }

    /// Merges another bloom into this one.
    pub fn accrue_bloom(&mut self, other: &Bloom) {
        for (byte, other_byte) in self.0.iter_mut().zip(other.0.iter()) {
            *byte |= other_byte;
        }
    }

    /// Returns true if the three bits for `input` are all set.
    #[must_use]
    pub fn contains_input(&self, input: &[u8]) -> bool {
        let digest: [u8; 32] = Keccak256::digest(input).into();
        (0..3).all(|pair| {
            let index =
                (usize::from(digest[pair * 2]) << 8 | usize::from(digest[pair * 2 + 1])) % 2048;
            self.0[255 - index / 8] & (1 << (index % 8)) != 0
        })
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Builds the bloom covering a slice of logs.
    #[must_use]
    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Self {
        let mut bloom = Self::ZERO;
        for log in logs {
            bloom.accrue_log(log);
        }
        bloom
    }
}

impl Default for Bloom {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "Bloom(0)");
        }
        write!(f, "Bloom(0x")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...)")
    }
}

impl Serialize for Bloom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(2 + 512);
        out.push_str("0x");
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        serializer.serialize_str(&out)
    }
}

impl<'de> Deserialize<'de> for Bloom {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let hex = text.strip_prefix("0x").unwrap_or(&text);
        if hex.len() != 512 {
            return Err(D::Error::custom("bloom must be 256 bytes"));
        }
        let mut bytes = [0u8; 256];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let text = std::str::from_utf8(chunk).map_err(D::Error::custom)?;
            bytes[i] = u8::from_str_radix(text, 16).map_err(D::Error::custom)?;
        }
        Ok(Self(bytes))
    }
}

impl Encodable for Bloom {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl Decodable for Bloom {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            if bytes.len() != 256 {
                return Err(DecoderError::RlpInvalidLength);
            }
            let mut out = [0u8; 256];
            out.copy_from_slice(bytes);
            Ok(Self(out))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
