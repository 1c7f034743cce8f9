//! # Protocol Parameter Tables
//!
//! Delta tables keyed by (topic, name). Each hardfork and each registered EIP
//! contributes the parameters it changed; resolution walks active EIPs first,
//! then the hardfork chain newest-to-oldest, defaulting to zero.

use crate::hardfork::Hardfork;
use serde::{Deserialize, Serialize};

/// Parameter namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamTopic {
    /// Block-level gas accounting.
    GasConfig,
    /// Per-operation and per-byte gas prices.
    GasPrices,
    /// Interpreter limits.
    Vm,
    /// Blob (EIP-4844) parameters.
    Sharding,
}

/// One (topic, name) → value entry.
pub type ParamDelta = (ParamTopic, &'static str, u64);

/// Registry record for an activatable EIP.
pub struct EipSpec {
    /// The EIP number.
    pub number: u64,
    /// Earliest hardfork the EIP may be activated on.
    pub minimum_hardfork: Hardfork,
    /// EIPs that must be active alongside this one.
    pub required_eips: &'static [u64],
    /// Parameters the EIP introduces or changes.
    pub params: &'static [ParamDelta],
}

/// Parameters changed by each hardfork, beyond what its introduced EIPs carry.
#[must_use]
pub fn hardfork_params(hardfork: Hardfork) -> &'static [ParamDelta] {
    use ParamTopic::{GasConfig, GasPrices, Vm};
    match hardfork {
        Hardfork::Chainstart => &[
            (GasConfig, "minGasLimit", 5_000),
            (GasConfig, "gasLimitBoundDivisor", 1_024),
            (GasConfig, "maxRefundQuotient", 2),
            (GasPrices, "tx", 21_000),
            (GasPrices, "txCreation", 32_000),
            (GasPrices, "txDataZero", 4),
            (GasPrices, "txDataNonZero", 68),
            (GasPrices, "codeDepositCost", 200),
            (GasPrices, "callStipend", 2_300),
            (GasPrices, "expByte", 10),
            (GasPrices, "ecrecoverGas", 3_000),
            (GasPrices, "sha256Gas", 60),
            (GasPrices, "sha256WordGas", 12),
            (GasPrices, "ripemd160Gas", 600),
            (GasPrices, "ripemd160WordGas", 120),
            (GasPrices, "identityGas", 15),
            (GasPrices, "identityWordGas", 3),
            (Vm, "stackLimit", 1_024),
            (Vm, "callCreateDepth", 1_024),
        ],
        Hardfork::SpuriousDragon => &[
            (GasPrices, "expByte", 50),
            (Vm, "maxCodeSize", 24_576),
        ],
        Hardfork::Byzantium => &[
            (GasPrices, "modexpGquaddivisor", 20),
            (GasPrices, "bn254AddGas", 500),
            (GasPrices, "bn254MulGas", 40_000),
            (GasPrices, "bn254PairingGas", 100_000),
            (GasPrices, "bn254PairingWordGas", 80_000),
        ],
        Hardfork::Istanbul => &[
            (GasPrices, "txDataNonZero", 16),
            (GasPrices, "bn254AddGas", 150),
            (GasPrices, "bn254MulGas", 6_000),
            (GasPrices, "bn254PairingGas", 45_000),
            (GasPrices, "bn254PairingWordGas", 34_000),
            (GasPrices, "blake2RoundGas", 1),
        ],
        _ => &[],
    }
}

const EIP_1153: EipSpec = EipSpec {
    number: 1153,
    minimum_hardfork: Hardfork::London,
    required_eips: &[],
    params: &[],
};

const EIP_1559: EipSpec = EipSpec {
    number: 1559,
    minimum_hardfork: Hardfork::Berlin,
    required_eips: &[2930],
    params: &[
        (ParamTopic::GasConfig, "baseFeeMaxChangeDenominator", 8),
        (ParamTopic::GasConfig, "elasticityMultiplier", 2),
        (ParamTopic::GasConfig, "initialBaseFee", 1_000_000_000),
    ],
};

const EIP_2537: EipSpec = EipSpec {
    number: 2537,
    minimum_hardfork: Hardfork::Chainstart,
    required_eips: &[],
    params: &[
        (ParamTopic::GasPrices, "bls12381G1AddGas", 500),
        (ParamTopic::GasPrices, "bls12381G1MulGas", 12_000),
        (ParamTopic::GasPrices, "bls12381G2AddGas", 800),
        (ParamTopic::GasPrices, "bls12381G2MulGas", 45_000),
        (ParamTopic::GasPrices, "bls12381PairingBaseGas", 65_000),
        (ParamTopic::GasPrices, "bls12381PairingPerPairGas", 43_000),
        (ParamTopic::GasPrices, "bls12381MapG1Gas", 5_500),
        (ParamTopic::GasPrices, "bls12381MapG2Gas", 75_000),
    ],
};

const EIP_2565: EipSpec = EipSpec {
    number: 2565,
    minimum_hardfork: Hardfork::Byzantium,
    required_eips: &[],
    params: &[(ParamTopic::GasPrices, "modexpGquaddivisor", 3)],
};

const EIP_2929: EipSpec = EipSpec {
    number: 2929,
    minimum_hardfork: Hardfork::Chainstart,
    required_eips: &[],
    params: &[
        (ParamTopic::GasPrices, "coldSloadGas", 2_100),
        (ParamTopic::GasPrices, "coldAccountAccessGas", 2_600),
        (ParamTopic::GasPrices, "warmStorageReadGas", 100),
    ],
};

const EIP_2930: EipSpec = EipSpec {
    number: 2930,
    minimum_hardfork: Hardfork::Istanbul,
    required_eips: &[2929],
    params: &[
        (ParamTopic::GasPrices, "accessListAddressCost", 2_400),
        (ParamTopic::GasPrices, "accessListStorageKeyCost", 1_900),
    ],
};

const EIP_3198: EipSpec = EipSpec {
    number: 3198,
    minimum_hardfork: Hardfork::Istanbul,
    required_eips: &[1559],
    params: &[],
};

const EIP_3529: EipSpec = EipSpec {
    number: 3529,
    minimum_hardfork: Hardfork::Berlin,
    required_eips: &[2929],
    params: &[(ParamTopic::GasConfig, "maxRefundQuotient", 5)],
};

const EIP_3540: EipSpec = EipSpec {
    number: 3540,
    minimum_hardfork: Hardfork::London,
    required_eips: &[3541],
    params: &[],
};

const EIP_3541: EipSpec = EipSpec {
    number: 3541,
    minimum_hardfork: Hardfork::Berlin,
    required_eips: &[],
    params: &[],
};

const EIP_3651: EipSpec = EipSpec {
    number: 3651,
    minimum_hardfork: Hardfork::London,
    required_eips: &[],
    params: &[],
};

const EIP_3670: EipSpec = EipSpec {
    number: 3670,
    minimum_hardfork: Hardfork::London,
    required_eips: &[3540],
    params: &[],
};

const EIP_3855: EipSpec = EipSpec {
    number: 3855,
    minimum_hardfork: Hardfork::Chainstart,
    required_eips: &[],
    params: &[],
};

const EIP_3860: EipSpec = EipSpec {
    number: 3860,
    minimum_hardfork: Hardfork::SpuriousDragon,
    required_eips: &[],
    params: &[
        (ParamTopic::Vm, "maxInitCodeSize", 49_152),
        (ParamTopic::GasPrices, "initcodeWordCost", 2),
    ],
};

const EIP_4399: EipSpec = EipSpec {
    number: 4399,
    minimum_hardfork: Hardfork::London,
    required_eips: &[],
    params: &[],
};

const EIP_4844: EipSpec = EipSpec {
    number: 4844,
    minimum_hardfork: Hardfork::Paris,
    required_eips: &[1559, 4895],
    params: &[
        (ParamTopic::Sharding, "blobCommitmentVersionKzg", 1),
        (ParamTopic::Sharding, "dataGasPerBlob", 131_072),
        (ParamTopic::Sharding, "targetDataGasPerBlock", 393_216),
        (ParamTopic::Sharding, "maxDataGasPerBlock", 786_432),
        (ParamTopic::Sharding, "dataGasPriceUpdateFraction", 3_338_477),
        (ParamTopic::Sharding, "minDataGasPrice", 1),
        (ParamTopic::Sharding, "limitBlobsPerTx", 6),
        (ParamTopic::Sharding, "limitBlobsPerBlock", 6),
        (ParamTopic::GasPrices, "kzgPointEvaluationGas", 50_000),
        (ParamTopic::GasPrices, "blobHashGas", 3),
    ],
};

const EIP_4895: EipSpec = EipSpec {
    number: 4895,
    minimum_hardfork: Hardfork::Paris,
    required_eips: &[],
    params: &[],
};

const EIP_5656: EipSpec = EipSpec {
    number: 5656,
    minimum_hardfork: Hardfork::Shanghai,
    required_eips: &[],
    params: &[],
};

const EIP_6780: EipSpec = EipSpec {
    number: 6780,
    minimum_hardfork: Hardfork::London,
    required_eips: &[],
    params: &[],
};

/// Looks up the registry record for an EIP, if it is activatable.
#[must_use]
pub fn eip_spec(eip: u64) -> Option<&'static EipSpec> {
    match eip {
        1153 => Some(&EIP_1153),
        1559 => Some(&EIP_1559),
        2537 => Some(&EIP_2537),
        2565 => Some(&EIP_2565),
        2929 => Some(&EIP_2929),
        2930 => Some(&EIP_2930),
        3198 => Some(&EIP_3198),
        3529 => Some(&EIP_3529),
        3540 => Some(&EIP_3540),
        3541 => Some(&EIP_3541),
        3651 => Some(&EIP_3651),
        3670 => Some(&EIP_3670),
        3855 => Some(&EIP_3855),
        3860 => Some(&EIP_3860),
        4399 => Some(&EIP_4399),
        4844 => Some(&EIP_4844),
        4895 => Some(&EIP_4895),
        5656 => Some(&EIP_5656),
        6780 => Some(&EIP_6780),
        _ => None,
    }
}

/// Searches a delta table.
#[must_use]
pub fn find_param(deltas: &[ParamDelta], topic: ParamTopic, name: &str) -> Option<u64> {
    deltas
        .iter()
        .find(|(t, n, _)| *t == topic && *n == name)
        .map(|(_, _, value)| *value)
}

// =============================================================================
// TESTS
// =============================================================================
