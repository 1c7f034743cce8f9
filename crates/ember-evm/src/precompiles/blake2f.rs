//! # 0x09: BLAKE2b Compression (EIP-152)

use super::{charge, price, success};
use crate::errors::VmError;
use crate::table::PrecompileOutcome;
use ember_common::Common;
use ember_crypto::blake2_compress;

/// Exact input length: rounds(4) + h(64) + m(128) + t(16) + f(1).
const INPUT_LENGTH: usize = 213;

pub(super) fn run(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    if input.len() != INPUT_LENGTH {
        return PrecompileOutcome::Failure(VmError::PrecompileFailure(
            "blake2f input must be 213 bytes",
        ));
    }
    let final_flag = input[212];
    if final_flag > 1 {
        return PrecompileOutcome::Failure(VmError::PrecompileFailure(
            "blake2f final flag must be boolean",
        ));
    }

    let rounds = u32::from_be_bytes(input[0..4].try_into().expect("4 bytes"));
    let cost = u64::from(rounds) * price(common, "blake2RoundGas");
    let gas = match charge(cost, gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };

    let mut h = [0u64; 8];
    for (i, word) in h.iter_mut().enumerate() {
        *word = u64::from_le_bytes(input[4 + i * 8..12 + i * 8].try_into().expect("8 bytes"));
    }
    let mut m = [0u64; 16];
    for (i, word) in m.iter_mut().enumerate() {
        *word = u64::from_le_bytes(input[68 + i * 8..76 + i * 8].try_into().expect("8 bytes"));
    }
    let t = [
        u64::from_le_bytes(input[196..204].try_into().expect("8 bytes")),
        u64::from_le_bytes(input[204..212].try_into().expect("8 bytes")),
    ];

    blake2_compress(rounds, &mut h, &m, &t, final_flag == 1);

    let mut out = Vec::with_capacity(64);
    for word in h {
        out.extend_from_slice(&word.to_le_bytes());
    }
    success(gas, out)
}

// =============================================================================
// TESTS
// =============================================================================
