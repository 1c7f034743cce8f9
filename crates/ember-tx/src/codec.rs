//! # RLP Field Decoding Helpers
//!
//! Strict decoding of transaction fields: canonical scalars (no leading
//! zeros), exact-width addresses and slots, and structured access lists.

use crate::errors::TxError;
use ember_types::{AccessList, AccessListItem, Address, Bytes, Hash, StorageKey, U256};
use rlp::{Rlp, RlpStream};

pub(crate) fn rlp_error(field: &'static str, error: rlp::DecoderError) -> TxError {
    TxError::InvalidRlp(format!("{field}: {error:?}"))
}

pub(crate) fn item_bytes(
    rlp: &Rlp<'_>,
    index: usize,
    field: &'static str,
) -> Result<Vec<u8>, TxError> {
    let item = rlp.at(index).map_err(|e| rlp_error(field, e))?;
    if item.is_list() {
        return Err(TxError::InvalidRlp(format!("{field}: expected value")));
    }
    item.data()
        .map(<[u8]>::to_vec)
        .map_err(|e| rlp_error(field, e))
}

pub(crate) fn decode_u64(
    rlp: &Rlp<'_>,
    index: usize,
    field: &'static str,
) -> Result<u64, TxError> {
    let bytes = item_bytes(rlp, index, field)?;
    if bytes.first() == Some(&0) {
        return Err(TxError::LeadingZero(field));
    }
    if bytes.len() > 8 {
        return Err(TxError::LengthMismatch {
            field,
            expected: 8,
            actual: bytes.len(),
        });
    }
    let mut value = 0u64;
    for byte in bytes {
        value = value << 8 | u64::from(byte);
    }
    Ok(value)
}

pub(crate) fn decode_u256(
    rlp: &Rlp<'_>,
    index: usize,
    field: &'static str,
) -> Result<U256, TxError> {
    let bytes = item_bytes(rlp, index, field)?;
    if bytes.first() == Some(&0) {
        return Err(TxError::LeadingZero(field));
    }
    if bytes.len() > 32 {
        return Err(TxError::LengthMismatch {
            field,
            expected: 32,
            actual: bytes.len(),
        });
    }
    Ok(U256::from_big_endian(&bytes))
}

pub(crate) fn decode_bytes(
    rlp: &Rlp<'_>,
    index: usize,
    field: &'static str,
) -> Result<Bytes, TxError> {
    item_bytes(rlp, index, field).map(Bytes::from_vec)
}

pub(crate) fn decode_optional_address(
    rlp: &Rlp<'_>,
    index: usize,
    field: &'static str,
) -> Result<Option<Address>, TxError> {
    let bytes = item_bytes(rlp, index, field)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    Address::from_slice(&bytes)
        .map(Some)
        .ok_or(TxError::LengthMismatch {
            field,
            expected: 20,
            actual: bytes.len(),
        })
}

pub(crate) fn decode_access_list(rlp: &Rlp<'_>, index: usize) -> Result<AccessList, TxError> {
    let list = rlp.at(index).map_err(|e| rlp_error("accessList", e))?;
    if !list.is_list() {
        return Err(TxError::InvalidRlp("accessList: expected list".to_string()));
    }
    let mut items = Vec::new();
    for entry in list.iter() {
        if entry.item_count().map_err(|e| rlp_error("accessList", e))? != 2 {
            return Err(TxError::InvalidRlp(
                "accessList entry: expected [address, keys]".to_string(),
            ));
        }
        let address_bytes = entry
            .at(0)
            .and_then(|r| r.data().map(<[u8]>::to_vec))
            .map_err(|e| rlp_error("accessList.address", e))?;
        let address = Address::from_slice(&address_bytes).ok_or(TxError::LengthMismatch {
            field: "accessList.address",
            expected: 20,
            actual: address_bytes.len(),
        })?;

        let keys_rlp = entry.at(1).map_err(|e| rlp_error("accessList.keys", e))?;
        let mut keys = Vec::new();
        for key in keys_rlp.iter() {
            let key_bytes = key
                .data()
                .map(<[u8]>::to_vec)
                .map_err(|e| rlp_error("accessList.key", e))?;
            let key = StorageKey::from_slice(&key_bytes).ok_or(TxError::LengthMismatch {
                field: "accessList.key",
                expected: 32,
                actual: key_bytes.len(),
            })?;
            keys.push(key);
        }
        items.push(AccessListItem::new(address, keys));
    }
    Ok(AccessList(items))
}

pub(crate) fn decode_hash_list(
    rlp: &Rlp<'_>,
    index: usize,
    field: &'static str,
) -> Result<Vec<Hash>, TxError> {
    let list = rlp.at(index).map_err(|e| rlp_error(field, e))?;
    let mut hashes = Vec::new();
    for item in list.iter() {
        let bytes = item.data().map_err(|e| rlp_error(field, e))?;
        let hash = Hash::from_slice(bytes).ok_or(TxError::LengthMismatch {
            field,
            expected: 32,
            actual: bytes.len(),
        })?;
        hashes.push(hash);
    }
    Ok(hashes)
}

/// Minimal big-endian bytes of a scalar (empty for zero).
pub(crate) fn scalar_bytes(value: U256) -> Bytes {
    if value.is_zero() {
        return Bytes::new();
    }
    let bytes = ember_types::u256_to_be_bytes(value);
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(31);
    Bytes::from_slice(&bytes[first..])
}

pub(crate) fn u64_bytes(value: u64) -> Bytes {
    scalar_bytes(U256::from(value))
}

pub(crate) fn address_bytes(to: Option<Address>) -> Bytes {
    to.map_or_else(Bytes::new, |address| Bytes::from_slice(address.as_bytes()))
}

pub(crate) fn append_optional_address(stream: &mut RlpStream, to: Option<Address>) {
    match to {
        Some(address) => {
            stream.append(&address);
        }
        None => {
            stream.append_empty_data();
        }
    }
}

/// Expects an RLP list of exactly `count` items.
pub(crate) fn expect_list<'a>(
    bytes: &'a [u8],
    count: usize,
    what: &'static str,
) -> Result<Rlp<'a>, TxError> {
    let rlp = Rlp::new(bytes);
    if !rlp.is_list() {
        return Err(TxError::InvalidRlp(format!("{what}: expected list")));
    }
    let items = rlp.item_count().map_err(|e| rlp_error(what, e))?;
    if items != count {
        return Err(TxError::InvalidRlp(format!(
            "{what}: expected {count} fields, got {items}"
        )));
    }
    Ok(rlp)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zero_scalars_are_rejected() {
        let mut stream = RlpStream::new_list(1);
        stream.append(&vec![0u8, 1u8]);
        let out = stream.out();
        let rlp = Rlp::new(&out);
        assert_eq!(
            decode_u64(&rlp, 0, "nonce").unwrap_err(),
            TxError::LeadingZero("nonce")
        );
        assert_eq!(
            decode_u256(&rlp, 0, "value").unwrap_err(),
            TxError::LeadingZero("value")
        );
    }

    #[test]
    fn empty_scalar_is_zero() {
        let mut stream = RlpStream::new_list(1);
        stream.append_empty_data();
        let out = stream.out();
        let rlp = Rlp::new(&out);
        assert_eq!(decode_u64(&rlp, 0, "nonce").unwrap(), 0);
    }

    #[test]
    fn short_address_is_rejected() {
        let mut stream = RlpStream::new_list(1);
        stream.append(&vec![1u8; 19]);
        let out = stream.out();
        let rlp = Rlp::new(&out);
        assert!(matches!(
            decode_optional_address(&rlp, 0, "to").unwrap_err(),
            TxError::LengthMismatch { expected: 20, .. }
        ));
    }

    #[test]
    fn access_list_round_trip() {
        let list = AccessList(vec![AccessListItem::new(
            Address::new([3; 20]),
            vec![StorageKey::new([4; 32])],
        )]);
        let mut stream = RlpStream::new_list(1);
        stream.append(&list);
        let out = stream.out();
        let rlp = Rlp::new(&out);
        assert_eq!(decode_access_list(&rlp, 0).unwrap(), list);
    }
}
