//! # Transaction Receipts
//!
//! Post-Byzantium receipts: a status flag, cumulative gas, the log bloom, and
//! the logs themselves. Typed transactions wrap the receipt RLP in the same
//! one-byte envelope as the transaction itself.

use crate::log::{Bloom, Log};
use crate::primitives::Bytes;
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// A transaction execution receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction envelope type (0 for legacy).
    pub tx_type: u8,
    /// 1 on success, 0 on failure.
    pub status: u8,
    /// Gas used by the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Bloom over this receipt's logs.
    pub bloom: Bloom,
    /// Logs emitted by the transaction.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Builds a receipt, deriving the bloom from the logs.
    #[must_use]
    pub fn new(tx_type: u8, success: bool, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        Self {
            tx_type,
            status: u8::from(success),
            cumulative_gas_used,
            bloom: Bloom::from_logs(&logs),
            logs,
        }
    }

    /// Returns true if the transaction succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }

    fn rlp_payload(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(4);
        s.append(&self.status)
            .append(&self.cumulative_gas_used)
            .append(&self.bloom)
            .append_list(&self.logs);
        s.out().to_vec()
    }

    /// Wire encoding: bare RLP for legacy, `type || rlp(...)` otherwise.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let payload = self.rlp_payload();
        if self.tx_type == 0 {
            Bytes::from_vec(payload)
        } else {
            let mut out = Vec::with_capacity(1 + payload.len());
            out.push(self.tx_type);
            out.extend_from_slice(&payload);
            Bytes::from_vec(out)
        }
    }

    /// Decodes a wire-encoded receipt.
    ///
    /// # Errors
    ///
    /// Returns a decoder error on malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecoderError> {
        if bytes.is_empty() {
            return Err(DecoderError::RlpIsTooShort);
        }
        let (tx_type, payload) = if bytes[0] <= 0x7f {
            (bytes[0], &bytes[1..])
        } else {
            (0u8, bytes)
        };

        let rlp = Rlp::new(payload);
        if rlp.item_count()? != 4 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            tx_type,
            status: rlp.val_at(0)?,
            cumulative_gas_used: rlp.val_at(1)?,
            bloom: rlp.val_at(2)?,
            logs: rlp.list_at(3)?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{Address, Hash};

    fn sample_receipt(tx_type: u8) -> Receipt {
        let log = Log::new(
            Address::new([5; 20]),
            vec![Hash::new([6; 32])],
            Bytes::from_slice(b"evt"),
        );
        Receipt::new(tx_type, true, 54_321, vec![log])
    }

    #[test]
    fn legacy_receipt_round_trip() {
        let receipt = sample_receipt(0);
        let encoded = receipt.encode();
        assert!(encoded.as_slice()[0] >= 0xc0);
        assert_eq!(Receipt::decode(encoded.as_slice()).unwrap(), receipt);
    }

    #[test]
    fn typed_receipt_carries_envelope_byte() {
        let receipt = sample_receipt(2);
        let encoded = receipt.encode();
        assert_eq!(encoded.as_slice()[0], 2);
        assert_eq!(Receipt::decode(encoded.as_slice()).unwrap(), receipt);
    }

    #[test]
    fn bloom_covers_log_address() {
        let receipt = sample_receipt(1);
        assert!(receipt.bloom.contains_input(&[5u8; 20]));
    }

    #[test]
    fn failed_receipt_status_zero() {
        let receipt = Receipt::new(0, false, 21_000, vec![]);
        assert!(!receipt.succeeded());
        assert!(receipt.bloom.is_zero());
    }
}
