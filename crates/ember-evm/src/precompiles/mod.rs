//! # Precompiled Contracts
//!
//! Host-implemented contracts at the low addresses. Each runs against a gas
//! budget; exhausting it yields an `OutOfGas` outcome that consumes the
//! frame's gas limit rather than an error.

mod blake2f;
mod bn254;
mod bls;
mod hashes;
mod kzg;
mod modexp;

use crate::table::{BuiltinPrecompile, PrecompileOutcome, PrecompileOutput};
use ember_common::{Common, ParamTopic};
use ember_types::Bytes;

pub use crate::table::{CustomPrecompile, PrecompileEntry, PrecompileTable};

/// Reads a named gas price from the chain rules.
pub(crate) fn price(common: &Common, name: &str) -> u64 {
    common.param(ParamTopic::GasPrices, name).as_u64()
}

/// Charges `gas` against `gas_limit`, or reports precompile OOG.
pub(crate) fn charge(gas: u64, gas_limit: u64) -> Result<u64, PrecompileOutcome> {
    if gas > gas_limit {
        Err(PrecompileOutcome::OutOfGas)
    } else {
        Ok(gas)
    }
}

/// Zero-pads (or truncates) the input to a fixed length.
pub(crate) fn padded(input: &[u8], length: usize) -> Vec<u8> {
    let mut out = vec![0u8; length];
    let take = input.len().min(length);
    out[..take].copy_from_slice(&input[..take]);
    out
}

pub(crate) fn success(gas_used: u64, output: Vec<u8>) -> PrecompileOutcome {
    PrecompileOutcome::Success(PrecompileOutput {
        gas_used,
        output: Bytes::from_vec(output),
    })
}

/// Runs a built-in precompile.
#[must_use]
pub fn run_builtin(
    which: BuiltinPrecompile,
    input: &[u8],
    gas_limit: u64,
    common: &Common,
) -> PrecompileOutcome {
    match which {
        BuiltinPrecompile::EcRecover => hashes::ecrecover(input, gas_limit, common),
        BuiltinPrecompile::Sha256 => hashes::sha256(input, gas_limit, common),
        BuiltinPrecompile::Ripemd160 => hashes::ripemd160(input, gas_limit, common),
        BuiltinPrecompile::Identity => hashes::identity(input, gas_limit, common),
        BuiltinPrecompile::ModExp => modexp::run(input, gas_limit, common),
        BuiltinPrecompile::Bn254Add => bn254::add(input, gas_limit, common),
        BuiltinPrecompile::Bn254Mul => bn254::mul(input, gas_limit, common),
        BuiltinPrecompile::Bn254Pairing => bn254::pairing(input, gas_limit, common),
        BuiltinPrecompile::Blake2F => blake2f::run(input, gas_limit, common),
        BuiltinPrecompile::KzgPointEvaluation => kzg::point_evaluation(input, gas_limit, common),
        BuiltinPrecompile::BlsG1Add
        | BuiltinPrecompile::BlsG1Mul
        | BuiltinPrecompile::BlsG1Msm
        | BuiltinPrecompile::BlsG2Add
        | BuiltinPrecompile::BlsG2Mul
        | BuiltinPrecompile::BlsG2Msm
        | BuiltinPrecompile::BlsPairing
        | BuiltinPrecompile::BlsMapFpToG1
        | BuiltinPrecompile::BlsMapFp2ToG2 => bls::run(which, input, gas_limit, common),
    }
}

// =============================================================================
// TESTS
// =============================================================================
