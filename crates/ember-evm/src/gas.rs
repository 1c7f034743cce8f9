//! # Gas Metering
//!
//! Static opcode costs plus the hardfork-sensitive schedules: EIP-2929
//! warm/cold access, SSTORE net metering with EIP-3529 refund rules, EIP-150
//! 63/64 call forwarding, and the refund cap.

use ember_common::{Common, Hardfork, ParamTopic};
use ember_types::U256;

/// Flat gas costs that never changed.
pub mod costs {
    /// Cheapest tier (ADDRESS, CALLER, ...).
    pub const BASE: u64 = 2;
    /// Arithmetic tier (ADD, SUB, PUSH, DUP, SWAP).
    pub const VERY_LOW: u64 = 3;
    /// MUL/DIV tier.
    pub const LOW: u64 = 5;
    /// ADDMOD/MULMOD tier.
    pub const MID: u64 = 8;
    /// JUMPI.
    pub const HIGH: u64 = 10;
    /// JUMPDEST marker.
    pub const JUMPDEST: u64 = 1;
    /// KECCAK256 base.
    pub const KECCAK256: u64 = 30;
    /// KECCAK256 per word.
    pub const KECCAK256_WORD: u64 = 6;
    /// Copy operations, per word.
    pub const COPY_WORD: u64 = 3;
    /// LOG base.
    pub const LOG: u64 = 375;
    /// LOG per topic.
    pub const LOG_TOPIC: u64 = 375;
    /// LOG per data byte.
    pub const LOG_DATA: u64 = 8;
    /// EXP base.
    pub const EXP: u64 = 10;
    /// BLOCKHASH.
    pub const BLOCKHASH: u64 = 20;
    /// CREATE/CREATE2 base.
    pub const CREATE: u64 = 32_000;
    /// Stipend granted to a value-bearing call.
    pub const CALL_STIPEND: u64 = 2_300;
    /// Surcharge for transferring value in a call.
    pub const CALL_VALUE: u64 = 9_000;
    /// Surcharge for calling into a nonexistent account with value.
    pub const CALL_NEW_ACCOUNT: u64 = 25_000;
    /// SELFDESTRUCT base (Tangerine Whistle onward).
    pub const SELFDESTRUCT: u64 = 5_000;
    /// SELFDESTRUCT refund, removed by EIP-3529.
    pub const SELFDESTRUCT_REFUND: u64 = 24_000;
    /// SSTORE zero → non-zero.
    pub const SSTORE_SET: u64 = 20_000;
    /// SSTORE non-zero → non-zero (pre-Berlin full price).
    pub const SSTORE_RESET: u64 = 5_000;
    /// Minimum gas an SSTORE needs on the stack sentry (EIP-2200).
    pub const SSTORE_SENTRY: u64 = 2_300;
    /// Cold storage-slot surcharge (EIP-2929).
    pub const COLD_SLOAD: u64 = 2_100;
    /// Cold account surcharge (EIP-2929).
    pub const COLD_ACCOUNT: u64 = 2_600;
    /// Warm access (EIP-2929).
    pub const WARM_ACCESS: u64 = 100;
}

/// EXP dynamic cost: base plus per-byte of exponent.
#[must_use]
pub fn exp_gas(common: &Common, exponent: U256) -> u64 {
    let per_byte = common.param(ParamTopic::GasPrices, "expByte").as_u64();
    if exponent.is_zero() {
        return costs::EXP;
    }
    let byte_len = (exponent.bits() as u64).div_ceil(8);
    costs::EXP + per_byte * byte_len
}

/// KECCAK256 dynamic cost.
#[must_use]
pub fn keccak_gas(length: usize) -> u64 {
    costs::KECCAK256 + costs::KECCAK256_WORD * (length as u64).div_ceil(32)
}

/// Copy cost for CALLDATACOPY/CODECOPY/RETURNDATACOPY/MCOPY.
#[must_use]
pub fn copy_gas(length: usize) -> u64 {
    costs::COPY_WORD * (length as u64).div_ceil(32)
}

/// LOG dynamic cost.
#[must_use]
pub fn log_gas(length: usize, topics: usize) -> u64 {
    costs::LOG + costs::LOG_TOPIC * topics as u64 + costs::LOG_DATA * length as u64
}

/// Account access cost (BALANCE, EXTCODESIZE, EXTCODECOPY, EXTCODEHASH).
#[must_use]
pub fn account_access_gas(common: &Common, cold: bool) -> u64 {
    if common.is_activated_eip(2929) {
        if cold {
            costs::COLD_ACCOUNT
        } else {
            costs::WARM_ACCESS
        }
    } else if common.gte_hardfork(Hardfork::TangerineWhistle) {
        700
    } else {
        20
    }
}

/// SLOAD cost.
#[must_use]
pub fn sload_gas(common: &Common, cold: bool) -> u64 {
    if common.is_activated_eip(2929) {
        if cold {
            costs::COLD_SLOAD
        } else {
            costs::WARM_ACCESS
        }
    } else if common.gte_hardfork(Hardfork::Istanbul) {
        800
    } else if common.gte_hardfork(Hardfork::TangerineWhistle) {
        200
    } else {
        50
    }
}

/// Base cost of the CALL family before value/new-account surcharges.
#[must_use]
pub fn call_base_gas(common: &Common, cold: bool) -> u64 {
    if common.is_activated_eip(2929) {
        if cold {
            costs::COLD_ACCOUNT
        } else {
            costs::WARM_ACCESS
        }
    } else if common.gte_hardfork(Hardfork::TangerineWhistle) {
        700
    } else {
        40
    }
}

/// Gas actually forwarded to a child call: EIP-150 caps the request at
/// 63/64 of what remains after the base charge.
#[must_use]
pub fn forwarded_call_gas(common: &Common, available: u64, requested: U256) -> u64 {
    let capped = if common.gte_hardfork(Hardfork::TangerineWhistle) {
        available - available / 64
    } else {
        available
    };
    if requested > U256::from(capped) {
        capped
    } else {
        requested.as_u64()
    }
}

/// SSTORE cost and refund delta given the slot's original (start-of-tx),
/// current, and new values. The EIP-2929 cold surcharge is charged by the
/// caller; this is the net-metered portion.
#[must_use]
pub fn sstore_gas(common: &Common, original: U256, current: U256, new: U256) -> (u64, i64) {
    let clear_refund = if common.is_activated_eip(3529) {
        4_800
    } else {
        15_000
    };

    // Pre-Istanbul: the simple two-price schedule.
    if !common.gte_hardfork(Hardfork::Istanbul) {
        return if current.is_zero() && !new.is_zero() {
            (costs::SSTORE_SET, 0)
        } else if !current.is_zero() && new.is_zero() {
            (costs::SSTORE_RESET, clear_refund as i64)
        } else {
            (costs::SSTORE_RESET, 0)
        };
    }

    // EIP-2200 net metering; warm-read price depends on EIP-2929.
    let noop_gas = if common.is_activated_eip(2929) {
        costs::WARM_ACCESS
    } else {
        800
    };
    let reset_gas = if common.is_activated_eip(2929) {
        costs::SSTORE_RESET - costs::COLD_SLOAD
    } else {
        costs::SSTORE_RESET
    };

    if new == current {
        return (noop_gas, 0);
    }

    if current == original {
        if original.is_zero() {
            return (costs::SSTORE_SET, 0);
        }
        let refund = if new.is_zero() { clear_refund as i64 } else { 0 };
        return (reset_gas, refund);
    }

    // Dirty slot: charge the warm-read price and settle refunds.
    let mut refund = 0i64;
    if !original.is_zero() {
        if current.is_zero() {
            refund -= clear_refund as i64;
        }
        if new.is_zero() {
            refund += clear_refund as i64;
        }
    }
    if new == original {
        if original.is_zero() {
            refund += (costs::SSTORE_SET - noop_gas) as i64;
        } else {
            refund += (reset_gas - noop_gas) as i64;
        }
    }
    (noop_gas, refund)
}

/// SELFDESTRUCT cost before the EIP-2929 cold surcharge.
#[must_use]
pub fn selfdestruct_gas(common: &Common, beneficiary_exists: bool, transfers_value: bool) -> u64 {
    if !common.gte_hardfork(Hardfork::TangerineWhistle) {
        return 0;
    }
    let mut gas = costs::SELFDESTRUCT;
    let charge_new_account = if common.gte_hardfork(Hardfork::SpuriousDragon) {
        !beneficiary_exists && transfers_value
    } else {
        !beneficiary_exists
    };
    if charge_new_account {
        gas += costs::CALL_NEW_ACCOUNT;
    }
    gas
}

/// Applies the refund cap: `gas_used / maxRefundQuotient` (2 before London,
/// 5 after EIP-3529).
#[must_use]
pub fn capped_refund(common: &Common, gas_used: u64, refund: u64) -> u64 {
    let quotient = common
        .param(ParamTopic::GasConfig, "maxRefundQuotient")
        .as_u64()
        .max(1);
    refund.min(gas_used / quotient)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::ChainConfig;

    fn at(hardfork: Hardfork) -> Common {
        Common::new(ChainConfig::dev(hardfork))
    }

    #[test]
    fn exp_gas_scales_with_exponent_bytes() {
        let common = at(Hardfork::London);
        assert_eq!(exp_gas(&common, U256::zero()), 10);
        assert_eq!(exp_gas(&common, U256::from(255)), 10 + 50);
        assert_eq!(exp_gas(&common, U256::from(256)), 10 + 100);
    }

    #[test]
    fn pre_spurious_exp_byte_price() {
        let common = at(Hardfork::Homestead);
        assert_eq!(exp_gas(&common, U256::from(255)), 10 + 10);
    }

    #[test]
    fn access_costs_by_era() {
        assert_eq!(account_access_gas(&at(Hardfork::Homestead), true), 20);
        assert_eq!(account_access_gas(&at(Hardfork::Istanbul), true), 700);
        assert_eq!(account_access_gas(&at(Hardfork::Berlin), true), 2_600);
        assert_eq!(account_access_gas(&at(Hardfork::Berlin), false), 100);

        assert_eq!(sload_gas(&at(Hardfork::Homestead), true), 50);
        assert_eq!(sload_gas(&at(Hardfork::Istanbul), true), 800);
        assert_eq!(sload_gas(&at(Hardfork::Berlin), true), 2_100);
        assert_eq!(sload_gas(&at(Hardfork::Berlin), false), 100);
    }

    #[test]
    fn eip150_caps_forwarded_gas() {
        let common = at(Hardfork::Berlin);
        assert_eq!(forwarded_call_gas(&common, 6400, U256::MAX), 6300);
        assert_eq!(forwarded_call_gas(&common, 6400, U256::from(1000)), 1000);

        let frontier = at(Hardfork::Homestead);
        assert_eq!(forwarded_call_gas(&frontier, 6400, U256::from(6400)), 6400);
    }

    #[test]
    fn sstore_fresh_set_and_clear() {
        let common = at(Hardfork::London);
        let zero = U256::zero();
        let one = U256::one();

        // 0 -> 1 on a clean slot
        assert_eq!(sstore_gas(&common, zero, zero, one), (20_000, 0));
        // 1 -> 0 on a clean slot refunds the 3529 amount
        assert_eq!(sstore_gas(&common, one, one, zero), (2_900, 4_800));
        // no-op
        assert_eq!(sstore_gas(&common, one, one, one), (100, 0));
    }

    #[test]
    fn sstore_dirty_slot_restores_refund() {
        let common = at(Hardfork::London);
        let zero = U256::zero();
        let one = U256::one();
        let two = U256::from(2u64);

        // original=1, already written to 2, now back to 1: refund reset diff
        let (gas, refund) = sstore_gas(&common, one, two, one);
        assert_eq!(gas, 100);
        assert_eq!(refund, 2_800);

        // original=1, current=0 (cleared earlier), now to 2: claw back clear refund
        let (gas, refund) = sstore_gas(&common, one, zero, two);
        assert_eq!(gas, 100);
        assert_eq!(refund, -4_800);
    }

    #[test]
    fn sstore_pre_istanbul_schedule() {
        let common = at(Hardfork::Byzantium);
        let zero = U256::zero();
        let one = U256::one();
        assert_eq!(sstore_gas(&common, zero, zero, one), (20_000, 0));
        assert_eq!(sstore_gas(&common, one, one, zero), (5_000, 15_000));
        assert_eq!(sstore_gas(&common, one, one, one), (5_000, 0));
    }

    #[test]
    fn refund_cap_changes_at_london() {
        let pre = at(Hardfork::Berlin);
        assert_eq!(capped_refund(&pre, 1_000, 900), 500);
        let post = at(Hardfork::London);
        assert_eq!(capped_refund(&post, 1_000, 900), 200);
    }

    #[test]
    fn selfdestruct_new_account_surcharge() {
        let common = at(Hardfork::London);
        assert_eq!(selfdestruct_gas(&common, true, true), 5_000);
        assert_eq!(selfdestruct_gas(&common, false, false), 5_000);
        assert_eq!(selfdestruct_gas(&common, false, true), 30_000);
        assert_eq!(selfdestruct_gas(&at(Hardfork::Homestead), false, true), 0);
    }
}
