//! # 0x0c–0x14: BLS12-381 Group Operations (EIP-2537)
//!
//! Gas comes from the EIP-2537 parameter set; the group arithmetic is
//! delegated to the installed provider. Unavailable in builds without one.

use super::{charge, price, success};
use crate::errors::VmError;
use crate::table::{BuiltinPrecompile, PrecompileOutcome};
use ember_common::Common;
use ember_crypto::{provider, BlsOperation};

const G1_POINT: usize = 128;
const G2_POINT: usize = 256;
const SCALAR: usize = 32;
const PAIR: usize = G1_POINT + G2_POINT;

fn operation_of(which: BuiltinPrecompile) -> BlsOperation {
    match which {
        BuiltinPrecompile::BlsG1Add => BlsOperation::G1Add,
        BuiltinPrecompile::BlsG1Mul => BlsOperation::G1Mul,
        BuiltinPrecompile::BlsG1Msm => BlsOperation::G1Msm,
        BuiltinPrecompile::BlsG2Add => BlsOperation::G2Add,
        BuiltinPrecompile::BlsG2Mul => BlsOperation::G2Mul,
        BuiltinPrecompile::BlsG2Msm => BlsOperation::G2Msm,
        BuiltinPrecompile::BlsPairing => BlsOperation::PairingCheck,
        BuiltinPrecompile::BlsMapFpToG1 => BlsOperation::MapFpToG1,
        _ => BlsOperation::MapFp2ToG2,
    }
}

fn gas_for(which: BuiltinPrecompile, input_len: usize, common: &Common) -> Option<u64> {
    let check = |expected: usize| input_len == expected;
    let multiple = |unit: usize| input_len != 0 && input_len % unit == 0;
    match which {
        BuiltinPrecompile::BlsG1Add => {
            check(2 * G1_POINT).then(|| price(common, "bls12381G1AddGas"))
        }
        BuiltinPrecompile::BlsG1Mul => {
            check(G1_POINT + SCALAR).then(|| price(common, "bls12381G1MulGas"))
        }
        BuiltinPrecompile::BlsG1Msm => multiple(G1_POINT + SCALAR).then(|| {
            price(common, "bls12381G1MulGas") * (input_len / (G1_POINT + SCALAR)) as u64
        }),
        BuiltinPrecompile::BlsG2Add => {
            check(2 * G2_POINT).then(|| price(common, "bls12381G2AddGas"))
        }
        BuiltinPrecompile::BlsG2Mul => {
            check(G2_POINT + SCALAR).then(|| price(common, "bls12381G2MulGas"))
        }
        BuiltinPrecompile::BlsG2Msm => multiple(G2_POINT + SCALAR).then(|| {
            price(common, "bls12381G2MulGas") * (input_len / (G2_POINT + SCALAR)) as u64
        }),
        BuiltinPrecompile::BlsPairing => multiple(PAIR).then(|| {
            price(common, "bls12381PairingBaseGas")
                + price(common, "bls12381PairingPerPairGas") * (input_len / PAIR) as u64
        }),
        BuiltinPrecompile::BlsMapFpToG1 => {
            check(64).then(|| price(common, "bls12381MapG1Gas"))
        }
        _ => check(128).then(|| price(common, "bls12381MapG2Gas")),
    }
}

pub(super) fn run(
    which: BuiltinPrecompile,
    input: &[u8],
    gas_limit: u64,
    common: &Common,
) -> PrecompileOutcome {
    let Some(cost) = gas_for(which, input.len(), common) else {
        return PrecompileOutcome::Failure(VmError::PrecompileFailure("bls input length"));
    };
    let gas = match charge(cost, gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };
    let Ok(curve) = provider() else {
        return PrecompileOutcome::Failure(VmError::CryptoNotInitialized);
    };
    match curve.bls12_381(operation_of(which), input) {
        Ok(output) => success(gas, output),
        Err(_) => PrecompileOutcome::Failure(VmError::PrecompileFailure("bls operation")),
    }
}

// =============================================================================
// TESTS
// =============================================================================
