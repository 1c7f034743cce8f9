//! # 0x01–0x04: ecrecover, SHA-256, RIPEMD-160, identity

use super::{charge, padded, price, success};
use crate::table::PrecompileOutcome;
use ember_common::Common;
use ember_crypto::{public_key_to_address, recover_public_key, secp256k1_n};
use ember_types::U256;

fn per_word_gas(base: u64, per_word: u64, length: usize) -> u64 {
    base + per_word * (length as u64).div_ceil(32)
}

/// 0x01: signature recovery. Invalid inputs return empty output, not an
/// error.
pub(super) fn ecrecover(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let gas = match charge(price(common, "ecrecoverGas"), gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };

    let data = padded(input, 128);
    let mut msg_hash = [0u8; 32];
    msg_hash.copy_from_slice(&data[..32]);

    // v is a 32-byte big-endian 27 or 28.
    if data[32..63].iter().any(|&b| b != 0) {
        return success(gas, Vec::new());
    }
    let v = data[63];
    if v != 27 && v != 28 {
        return success(gas, Vec::new());
    }

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&data[64..96]);
    s.copy_from_slice(&data[96..128]);

    let r_scalar = U256::from_big_endian(&r);
    let s_scalar = U256::from_big_endian(&s);
    let order = secp256k1_n();
    if r_scalar.is_zero() || s_scalar.is_zero() || r_scalar >= order || s_scalar >= order {
        return success(gas, Vec::new());
    }

    match recover_public_key(&msg_hash, &r, &s, v - 27) {
        Ok(public_key) => {
            let address = public_key_to_address(&public_key);
            let mut out = vec![0u8; 32];
            out[12..].copy_from_slice(address.as_bytes());
            success(gas, out)
        }
        Err(_) => success(gas, Vec::new()),
    }
}

/// 0x02: SHA-256.
pub(super) fn sha256(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let cost = per_word_gas(
        price(common, "sha256Gas"),
        price(common, "sha256WordGas"),
        input.len(),
    );
    match charge(cost, gas_limit) {
        Ok(gas) => success(gas, ember_crypto::sha256(input).to_vec()),
        Err(outcome) => outcome,
    }
}

/// 0x03: RIPEMD-160, left-padded to 32 bytes.
pub(super) fn ripemd160(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let cost = per_word_gas(
        price(common, "ripemd160Gas"),
        price(common, "ripemd160WordGas"),
        input.len(),
    );
    match charge(cost, gas_limit) {
        Ok(gas) => {
            let digest = ember_crypto::ripemd160(input);
            let mut out = vec![0u8; 32];
            out[12..].copy_from_slice(&digest);
            success(gas, out)
        }
        Err(outcome) => outcome,
    }
}

/// 0x04: identity.
pub(super) fn identity(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let cost = per_word_gas(
        price(common, "identityGas"),
        price(common, "identityWordGas"),
        input.len(),
    );
    match charge(cost, gas_limit) {
        Ok(gas) => success(gas, input.to_vec()),
        Err(outcome) => outcome,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::PrecompileOutput;
    use ember_common::{ChainConfig, Hardfork};
    use ember_crypto::{keccak256, secret_key_to_address, sign_hash};

    fn common() -> Common {
        Common::new(ChainConfig::dev(Hardfork::London))
    }

    fn expect_output(outcome: PrecompileOutcome) -> PrecompileOutput {
        match outcome {
            PrecompileOutcome::Success(out) => out,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn ecrecover_valid_signature() {
        let mut secret = [0u8; 32];
        secret[31] = 9;
        let msg_hash = keccak256(b"ecrecover vector");
        let signature = sign_hash(msg_hash.as_bytes(), &secret).unwrap();

        let mut input = Vec::with_capacity(128);
        input.extend_from_slice(msg_hash.as_bytes());
        let mut v = [0u8; 32];
        v[31] = 27 + signature.recovery_id;
        input.extend_from_slice(&v);
        input.extend_from_slice(&signature.r);
        input.extend_from_slice(&signature.s);

        let out = expect_output(ecrecover(&input, 10_000, &common()));
        assert_eq!(out.gas_used, 3_000);
        assert_eq!(
            &out.output.as_slice()[12..],
            secret_key_to_address(&secret).unwrap().as_bytes()
        );
    }

    #[test]
    fn ecrecover_bad_v_returns_empty() {
        let input = [1u8; 128];
        let out = expect_output(ecrecover(&input, 10_000, &common()));
        assert!(out.output.is_empty());
        assert_eq!(out.gas_used, 3_000);
    }

    #[test]
    fn sha256_known_cost_and_digest() {
        let out = expect_output(sha256(b"abc", 10_000, &common()));
        assert_eq!(out.gas_used, 60 + 12);
        assert_eq!(
            hex::encode(out.output.as_slice()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn ripemd_output_is_left_padded() {
        let out = expect_output(ripemd160(b"abc", 10_000, &common()));
        assert_eq!(out.output.len(), 32);
        assert_eq!(&out.output.as_slice()[..12], &[0u8; 12]);
    }

    #[test]
    fn precompile_oog_consumes_limit() {
        assert!(matches!(
            sha256(b"abc", 10, &common()),
            PrecompileOutcome::OutOfGas
        ));
    }
}
