//! # 0x0a: KZG Point Evaluation (EIP-4844)

use super::{charge, price, success};
use crate::errors::VmError;
use crate::table::PrecompileOutcome;
use ember_common::{Common, ParamTopic};
use ember_crypto::{compute_versioned_hash, provider};

/// Input: versioned_hash(32) ‖ z(32) ‖ y(32) ‖ commitment(48) ‖ proof(48).
const INPUT_LENGTH: usize = 192;

/// Field elements per blob, first half of the success output.
const FIELD_ELEMENTS_PER_BLOB: u64 = 4_096;

/// BLS12-381 scalar field modulus, second half of the success output.
const BLS_MODULUS: [u8; 32] = [
    0x73, 0xed, 0xa7, 0x53, 0x29, 0x9d, 0x7d, 0x48, 0x33, 0x39, 0xd8, 0x08, 0x09, 0xa1, 0xd8,
    0x05, 0x53, 0xbd, 0xa4, 0x02, 0xff, 0xfe, 0x5b, 0xfe, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00,
    0x00, 0x01,
];

pub(super) fn point_evaluation(input: &[u8], gas_limit: u64, common: &Common) -> PrecompileOutcome {
    let gas = match charge(price(common, "kzgPointEvaluationGas"), gas_limit) {
        Ok(gas) => gas,
        Err(outcome) => return outcome,
    };
    if input.len() != INPUT_LENGTH {
        return PrecompileOutcome::Failure(VmError::PrecompileFailure(
            "point evaluation input must be 192 bytes",
        ));
    }

    let versioned_hash = &input[0..32];
    let z: [u8; 32] = input[32..64].try_into().expect("32 bytes");
    let y: [u8; 32] = input[64..96].try_into().expect("32 bytes");
    let commitment: [u8; 48] = input[96..144].try_into().expect("48 bytes");
    let proof: [u8; 48] = input[144..192].try_into().expect("48 bytes");

    let version = common
        .param(ParamTopic::Sharding, "blobCommitmentVersionKzg")
        .as_u64() as u8;
    if compute_versioned_hash(&commitment, version).as_bytes() != versioned_hash {
        return PrecompileOutcome::Failure(VmError::PrecompileFailure(
            "commitment does not match versioned hash",
        ));
    }

    let Ok(kzg) = provider() else {
        return PrecompileOutcome::Failure(VmError::CryptoNotInitialized);
    };
    match kzg.verify_kzg_proof(&commitment, &z, &y, &proof) {
        Ok(true) => {
            let mut out = vec![0u8; 64];
            out[24..32].copy_from_slice(&FIELD_ELEMENTS_PER_BLOB.to_be_bytes());
            out[32..].copy_from_slice(&BLS_MODULUS);
            success(gas, out)
        }
        Ok(false) => {
            PrecompileOutcome::Failure(VmError::PrecompileFailure("kzg proof invalid"))
        }
        Err(_) => PrecompileOutcome::Failure(VmError::PrecompileFailure("kzg verification error")),
    }
}

// =============================================================================
// TESTS
// =============================================================================
