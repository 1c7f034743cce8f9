//! # 0x06–0x08: bn254 (alt_bn128) Curve Operations
//!
//! The curve arithmetic itself lives behind the installed crypto provider;
//! this module owns the gas schedule and input shaping.

use super::{charge, padded, price, success};
use crate::errors::VmError;
use crate::table::PrecompileOutcome;
use ember_common::Common;
use ember_crypto::provider;

pub(super) fn add(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let gas = match charge(price(common, "bn254AddGas"), gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };
    let Ok(curve) = provider() else {
        return PrecompileOutcome::Failure(VmError::CryptoNotInitialized);
    };
    match curve.bn254_add(&padded(input, 128)) {
        Ok(point) => success(gas, point.to_vec()),
        Err(_) => PrecompileOutcome::Failure(VmError::PrecompileFailure("bn254 add")),
    }
}

pub(super) fn mul(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let gas = match charge(price(common, "bn254MulGas"), gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };
    let Ok(curve) = provider() else {
        return PrecompileOutcome::Failure(VmError::CryptoNotInitialized);
    };
    match curve.bn254_mul(&padded(input, 96)) {
        Ok(point) => success(gas, point.to_vec()),
        Err(_) => PrecompileOutcome::Failure(VmError::PrecompileFailure("bn254 mul")),
    }
}

pub(super) fn pairing(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    if input.len() % 192 != 0 {
        return PrecompileOutcome::Failure(VmError::PrecompileFailure(
            "bn254 pairing input not a multiple of 192",
        ));
    }
    let pairs = (input.len() / 192) as u64;
    let cost = price(common, "bn254PairingGas")
        + pairs * price(common, "bn254PairingWordGas");
    let gas = match charge(cost, gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };
    let Ok(curve) = provider() else {
        return PrecompileOutcome::Failure(VmError::CryptoNotInitialized);
    };
    match curve.bn254_pairing(input) {
        Ok(result) => {
            let mut out = vec![0u8; 32];
            out[31] = u8::from(result);
            success(gas, out)
        }
        Err(_) => PrecompileOutcome::Failure(VmError::PrecompileFailure("bn254 pairing")),
    }
}

// =============================================================================
// TESTS
// =============================================================================
