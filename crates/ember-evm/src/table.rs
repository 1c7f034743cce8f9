//! # Opcode and Precompile Tables
//!
//! Both tables are pure functions of the active rules (hardfork + EIPs +
//! custom overrides). The EVM rebuilds them whenever its `Common` reports a
//! new generation, so a hardfork change can never be observed through a
//! stale table.

use crate::errors::VmError;
use crate::gas::costs;
use crate::opcodes::Opcode;
use ember_common::{Common, Hardfork};
use ember_types::{Address, Bytes};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// OPCODE TABLE
// =============================================================================

/// Replaces or deletes one opcode slot.
#[derive(Clone, Debug)]
pub struct OpcodeOverride {
    /// The opcode byte being overridden.
    pub byte: u8,
    /// False deletes the opcode.
    pub enabled: bool,
    /// Overrides the static gas charge.
    pub base_gas: Option<u64>,
}

/// Per-byte availability and static gas, resolved for one rule set.
#[derive(Clone)]
pub struct OpcodeTable {
    enabled: [bool; 256],
    base_gas: [u64; 256],
}

impl OpcodeTable {
    /// Builds the table for the given rules and overrides.
    #[must_use]
    pub fn for_rules(common: &Common, overrides: &[OpcodeOverride]) -> Self {
        let mut enabled = [false; 256];
        let mut base_gas = [0u64; 256];

        for byte in 0u8..=255 {
            let index = byte as usize;
            if Opcode::decode(byte).is_none() {
                continue;
            }
            enabled[index] = Self::available(byte, common);
            base_gas[index] = Self::static_gas(byte);
        }

        for over in overrides {
            let index = over.byte as usize;
            enabled[index] = over.enabled;
            if let Some(gas) = over.base_gas {
                base_gas[index] = gas;
            }
        }

        Self { enabled, base_gas }
    }

    fn available(byte: u8, common: &Common) -> bool {
        match byte {
            0xf4 => common.gte_hardfork(Hardfork::Homestead),
            0x3d | 0x3e | 0xfa | 0xfd => common.gte_hardfork(Hardfork::Byzantium),
            0x1b..=0x1d | 0x3f | 0xf5 => common.gte_hardfork(Hardfork::Constantinople),
            0x46 | 0x47 => common.gte_hardfork(Hardfork::Istanbul),
            0x48 => common.is_activated_eip(3198),
            0x49 => common.is_activated_eip(4844),
            0x5c | 0x5d => common.is_activated_eip(1153),
            0x5e => common.is_activated_eip(5656),
            0x5f => common.is_activated_eip(3855),
            _ => true,
        }
    }

    fn static_gas(byte: u8) -> u64 {
        match byte {
            // Halting and dynamic-only opcodes charge nothing up front.
            0x00 | 0x0a | 0x20 | 0x31 | 0x3b | 0x3c | 0x3f | 0x54 | 0x55 | 0xa0..=0xa4
            | 0xf1 | 0xf2 | 0xf3 | 0xf4 | 0xfa | 0xfd | 0xfe | 0xff => 0,
            0x01 | 0x03 | 0x10..=0x1d | 0x35 | 0x37 | 0x39 | 0x3e | 0x51..=0x53 | 0x5e
            | 0x60..=0x9f => costs::VERY_LOW,
            0x02 | 0x04..=0x07 | 0x0b | 0x47 => costs::LOW,
            0x08 | 0x09 | 0x56 => costs::MID,
            0x57 => costs::HIGH,
            0x30 | 0x32..=0x34 | 0x36 | 0x38 | 0x3a | 0x3d | 0x41..=0x46 | 0x48 | 0x50
            | 0x58..=0x5a | 0x5f => costs::BASE,
            0x40 => costs::BLOCKHASH,
            0x49 => 3,
            0x5b => costs::JUMPDEST,
            0x5c | 0x5d => costs::WARM_ACCESS,
            0xf0 | 0xf5 => costs::CREATE,
            _ => 0,
        }
    }

    /// True if the byte names an opcode under these rules.
    #[must_use]
    pub fn is_enabled(&self, byte: u8) -> bool {
        self.enabled[byte as usize]
    }

    /// The static gas charged before the opcode's own logic runs.
    #[must_use]
    pub fn base_gas(&self, byte: u8) -> u64 {
        self.base_gas[byte as usize]
    }
}

// =============================================================================
// PRECOMPILE TABLE
// =============================================================================

/// Built-in precompiles, in address order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinPrecompile {
    /// 0x01
    EcRecover,
    /// 0x02
    Sha256,
    /// 0x03
    Ripemd160,
    /// 0x04
    Identity,
    /// 0x05 (Byzantium; EIP-2565 gas from Berlin)
    ModExp,
    /// 0x06
    Bn254Add,
    /// 0x07
    Bn254Mul,
    /// 0x08
    Bn254Pairing,
    /// 0x09 (Istanbul)
    Blake2F,
    /// 0x0a (EIP-4844)
    KzgPointEvaluation,
    /// 0x0c (EIP-2537)
    BlsG1Add,
    /// 0x0d
    BlsG1Mul,
    /// 0x0e
    BlsG1Msm,
    /// 0x0f
    BlsG2Add,
    /// 0x10
    BlsG2Mul,
    /// 0x11
    BlsG2Msm,
    /// 0x12
    BlsPairing,
    /// 0x13
    BlsMapFpToG1,
    /// 0x14
    BlsMapFp2ToG2,
}

const BUILTINS: [(u8, BuiltinPrecompile); 19] = [
    (0x01, BuiltinPrecompile::EcRecover),
    (0x02, BuiltinPrecompile::Sha256),
    (0x03, BuiltinPrecompile::Ripemd160),
    (0x04, BuiltinPrecompile::Identity),
    (0x05, BuiltinPrecompile::ModExp),
    (0x06, BuiltinPrecompile::Bn254Add),
    (0x07, BuiltinPrecompile::Bn254Mul),
    (0x08, BuiltinPrecompile::Bn254Pairing),
    (0x09, BuiltinPrecompile::Blake2F),
    (0x0a, BuiltinPrecompile::KzgPointEvaluation),
    (0x0c, BuiltinPrecompile::BlsG1Add),
    (0x0d, BuiltinPrecompile::BlsG1Mul),
    (0x0e, BuiltinPrecompile::BlsG1Msm),
    (0x0f, BuiltinPrecompile::BlsG2Add),
    (0x10, BuiltinPrecompile::BlsG2Mul),
    (0x11, BuiltinPrecompile::BlsG2Msm),
    (0x12, BuiltinPrecompile::BlsPairing),
    (0x13, BuiltinPrecompile::BlsMapFpToG1),
    (0x14, BuiltinPrecompile::BlsMapFp2ToG2),
];

fn builtin_available(precompile: BuiltinPrecompile, common: &Common) -> bool {
    match precompile {
        BuiltinPrecompile::EcRecover
        | BuiltinPrecompile::Sha256
        | BuiltinPrecompile::Ripemd160
        | BuiltinPrecompile::Identity => true,
        BuiltinPrecompile::ModExp
        | BuiltinPrecompile::Bn254Add
        | BuiltinPrecompile::Bn254Mul
        | BuiltinPrecompile::Bn254Pairing => common.gte_hardfork(Hardfork::Byzantium),
        BuiltinPrecompile::Blake2F => common.gte_hardfork(Hardfork::Istanbul),
        BuiltinPrecompile::KzgPointEvaluation => common.is_activated_eip(4844),
        _ => common.is_activated_eip(2537),
    }
}

/// Output of a successful precompile run.
#[derive(Clone, Debug)]
pub struct PrecompileOutput {
    /// Gas consumed.
    pub gas_used: u64,
    /// Returned bytes.
    pub output: Bytes,
}

/// Terminal state of a precompile invocation.
#[derive(Clone, Debug)]
pub enum PrecompileOutcome {
    /// Ran to completion.
    Success(PrecompileOutput),
    /// Gas limit exhausted; the frame's gas limit is consumed.
    OutOfGas,
    /// Input rejected; consumes all gas like any exceptional halt.
    Failure(VmError),
}

/// A user-supplied precompile body.
pub type CustomPrecompile = Arc<dyn Fn(&[u8], u64, &Common) -> PrecompileOutcome + Send + Sync>;

/// What the dispatcher finds at an address.
#[derive(Clone)]
pub enum PrecompileEntry {
    /// One of the built-in contracts.
    Builtin(BuiltinPrecompile),
    /// A custom contract (takes precedence over builtins).
    Custom(CustomPrecompile),
}

/// The active precompile set for one rule set.
#[derive(Clone, Default)]
pub struct PrecompileTable {
    entries: BTreeMap<Address, PrecompileEntry>,
}

impl PrecompileTable {
    /// Builds the active set. Customs are applied last: `Some` installs or
    /// replaces, `None` deletes whatever was at that address.
    #[must_use]
    pub fn for_rules(
        common: &Common,
        customs: &BTreeMap<Address, Option<CustomPrecompile>>,
    ) -> Self {
        let mut entries = BTreeMap::new();
        for (low_byte, precompile) in BUILTINS {
            if builtin_available(precompile, common) {
                let mut raw = [0u8; 20];
                raw[19] = low_byte;
                entries.insert(Address::new(raw), PrecompileEntry::Builtin(precompile));
            }
        }
        for (address, custom) in customs {
            match custom {
                Some(body) => {
                    entries.insert(*address, PrecompileEntry::Custom(body.clone()));
                }
                None => {
                    entries.remove(address);
                }
            }
        }
        Self { entries }
    }

    /// Looks up the entry at an address.
    #[must_use]
    pub fn lookup(&self, address: Address) -> Option<&PrecompileEntry> {
        self.entries.get(&address)
    }

    /// True if the address hosts an active precompile.
    #[must_use]
    pub fn is_precompile(&self, address: Address) -> bool {
        self.entries.contains_key(&address)
    }

    /// Active addresses, used to seed the warm set at transaction start.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries.keys().copied()
    }

    /// Number of active precompiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no precompile is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Both rule-derived tables, rebuilt together on a hardfork change.
#[derive(Clone)]
pub struct Tables {
    /// Opcode availability and static gas.
    pub opcodes: OpcodeTable,
    /// Active precompiles.
    pub precompiles: PrecompileTable,
}

// =============================================================================
// TESTS
// =============================================================================
