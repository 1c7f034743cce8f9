//! # 0x05: Modular Exponentiation
//!
//! Byzantium pricing uses the piecewise quadratic complexity with the
//! `modexpGquaddivisor` of 20; EIP-2565 (Berlin) switches to word-squared
//! complexity, divisor 3, and a 200-gas floor. Operand lengths are capped to
//! keep the in-process bignum bounded.

use super::{charge, success};
use crate::errors::VmError;
use crate::table::PrecompileOutcome;
use ember_common::{Common, ParamTopic};
use num_bigint::BigUint;
use ember_types::U256;

/// Upper bound on operand lengths accepted by this implementation.
const MAX_OPERAND_BYTES: usize = 1_024;

/// EIP-2565 gas floor.
const MIN_GAS: u64 = 200;

fn read_length(input: &[u8], offset: usize) -> usize {
    let mut word = [0u8; 32];
    for (i, byte) in word.iter_mut().enumerate() {
        if let Some(value) = input.get(offset + i) {
            *byte = *value;
        }
    }
    let value = U256::from_big_endian(&word);
    if value > U256::from(MAX_OPERAND_BYTES) {
        usize::MAX
    } else {
        value.as_usize()
    }
}

fn read_operand(input: &[u8], offset: usize, length: usize) -> Vec<u8> {
    let mut out = vec![0u8; length];
    for (i, byte) in out.iter_mut().enumerate() {
        if let Some(value) = input.get(offset + i) {
            *byte = *value;
        }
    }
    out
}

fn multiplication_complexity(common: &Common, max_len: u64) -> u64 {
    if common.is_activated_eip(2565) {
        let words = max_len.div_ceil(8);
        words * words
    } else if max_len <= 64 {
        max_len * max_len
    } else if max_len <= 1_024 {
        max_len * max_len / 4 + 96 * max_len - 3_072
    } else {
        max_len * max_len / 16 + 480 * max_len - 199_680
    }
}

fn iteration_count(exp_head: &BigUint, exp_len: u64) -> u64 {
    let head_bits = exp_head.bits();
    let head_iterations = head_bits.saturating_sub(1);
    if exp_len <= 32 {
        head_iterations
    } else {
        8 * (exp_len - 32) + head_iterations
    }
}

/// Runs the modexp precompile.
#[must_use]
pub(super) fn run(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let base_len = read_length(input, 0);
    let exp_len = read_length(input, 32);
    let mod_len = read_length(input, 64);
    if base_len == usize::MAX || exp_len == usize::MAX || mod_len == usize::MAX {
        return PrecompileOutcome::Failure(VmError::PrecompileFailure(
            "modexp operand too large",
        ));
    }

    // The head of the exponent (first 32 bytes) drives iteration pricing.
    let exp_head_len = exp_len.min(32);
    let exp_head = BigUint::from_bytes_be(&read_operand(input, 96 + base_len, exp_head_len));

    let divisor = common
        .param(ParamTopic::GasPrices, "modexpGquaddivisor")
        .as_u64()
        .max(1);
    let complexity = multiplication_complexity(common, base_len.max(mod_len) as u64);
    let iterations = iteration_count(&exp_head, exp_len as u64).max(1);
    let mut gas = complexity.saturating_mul(iterations) / divisor;
    if common.is_activated_eip(2565) {
        gas = gas.max(MIN_GAS);
    }

    let gas = match charge(gas, gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };

    if mod_len == 0 {
        return success(gas, Vec::new());
    }

    let base = BigUint::from_bytes_be(&read_operand(input, 96, base_len));
    let exponent = BigUint::from_bytes_be(&read_operand(input, 96 + base_len, exp_len));
    let modulus = BigUint::from_bytes_be(&read_operand(input, 96 + base_len + exp_len, mod_len));

    let result = if modulus == BigUint::default() {
        vec![0u8; mod_len]
    } else {
        let value = base.modpow(&exponent, &modulus);
        let bytes = value.to_bytes_be();
        let mut out = vec![0u8; mod_len];
        out[mod_len - bytes.len()..].copy_from_slice(&bytes);
        out
    };
    success(gas, result)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::PrecompileOutput;
    use ember_common::ChainConfig;
    use ember_common::Hardfork;

    fn common() -> Common {
        Common::new(ChainConfig::dev(Hardfork::Berlin))
    }

    fn build_input(base: &[u8], exp: &[u8], modulus: &[u8]) -> Vec<u8> {
        let mut input = Vec::new();
        for length in [base.len(), exp.len(), modulus.len()] {
            let mut word = [0u8; 32];
            word[24..].copy_from_slice(&(length as u64).to_be_bytes());
            input.extend_from_slice(&word);
        }
        input.extend_from_slice(base);
        input.extend_from_slice(exp);
        input.extend_from_slice(modulus);
        input
    }

    fn expect_output(outcome: PrecompileOutcome) -> PrecompileOutput {
        match outcome {
            PrecompileOutcome::Success(out) => out,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn three_to_the_two_mod_five() {
        let input = build_input(&[3], &[2], &[5]);
        let out = expect_output(run(&input, 10_000, &common()));
        assert_eq!(out.output.as_slice(), &[4]);
        assert_eq!(out.gas_used, MIN_GAS);
    }

    #[test]
    fn zero_modulus_yields_zeros() {
        let input = build_input(&[3], &[2], &[0, 0]);
        let out = expect_output(run(&input, 10_000, &common()));
        assert_eq!(out.output.as_slice(), &[0, 0]);
    }

    #[test]
    fn output_is_left_padded_to_modulus_width() {
        let input = build_input(&[2], &[3], &[0, 0, 0, 100]);
        let out = expect_output(run(&input, 10_000, &common()));
        assert_eq!(out.output.as_slice(), &[0, 0, 0, 8]);
    }

    #[test]
    fn byzantium_pricing_uses_quad_divisor() {
        let byzantium = Common::new(ChainConfig::dev(Hardfork::Byzantium));
        let input = build_input(&[3; 64], &[0xff], &[7; 64]);
        let out = expect_output(run(&input, 100_000, &byzantium));
        // f(64) = 4096, iterations = 7, divisor 20.
        assert_eq!(out.gas_used, 4_096 * 7 / 20);
    }

    #[test]
    fn oversized_operands_are_rejected() {
        let mut input = vec![0u8; 32];
        input[0] = 0xff; // enormous base length
        assert!(matches!(
            run(&input, u64::MAX, &common()),
            PrecompileOutcome::Failure(_)
        ));
    }
}
