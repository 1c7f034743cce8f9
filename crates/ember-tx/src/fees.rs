//! # Intrinsic Gas and Fee Math

use ember_common::{Common, Hardfork, ParamTopic};
use ember_types::{AccessList, U256};

/// Intrinsic gas of a transaction: the base charge, creation surcharge,
/// calldata byte costs, access-list costs (every occurrence charged, no
/// deduplication), and initcode word costs for creates from Shanghai on.
#[must_use]
pub fn intrinsic_gas(
    common: &Common,
    data: &[u8],
    is_create: bool,
    access_list: Option<&AccessList>,
) -> u64 {
    let price = |name: &str| common.param(ParamTopic::GasPrices, name).as_u64();

    let mut gas = price("tx");
    if is_create {
        gas += price("txCreation");
    }

    let zero_bytes = data.iter().filter(|&&b| b == 0).count() as u64;
    let nonzero_bytes = data.len() as u64 - zero_bytes;
    gas += zero_bytes * price("txDataZero");
    gas += nonzero_bytes * price("txDataNonZero");

    if let Some(list) = access_list {
        gas += list.address_count() as u64 * price("accessListAddressCost");
        gas += list.storage_key_count() as u64 * price("accessListStorageKeyCost");
    }

    if is_create && (common.gte_hardfork(Hardfork::Shanghai) || common.is_activated_eip(3860)) {
        let words = (data.len() as u64).div_ceil(32);
        gas += words * price("initcodeWordCost");
    }

    gas
}

/// `gas_limit * fee` must fit in 256 bits.
#[must_use]
pub fn fee_overflows(gas_limit: u64, fee: U256) -> bool {
    fee.checked_mul(U256::from(gas_limit)).is_none()
}

/// The miner tip of a fee-market transaction at a given base fee:
/// `min(max_fee - base_fee, max_priority_fee)`.
#[must_use]
pub fn effective_priority_fee(max_fee: U256, max_priority_fee: U256, base_fee: U256) -> U256 {
    max_fee
        .saturating_sub(base_fee)
        .min(max_priority_fee)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::ChainConfig;
    use ember_types::{AccessListItem, Address, StorageKey};

    fn berlin_common() -> Common {
        Common::new(ChainConfig::dev(Hardfork::Berlin))
    }

    #[test]
    fn plain_transfer_costs_21000() {
        let common = berlin_common();
        assert_eq!(intrinsic_gas(&common, &[], false, None), 21_000);
    }

    #[test]
    fn access_list_tx_scenario() {
        // data = 0x010200, one address with one storage key.
        let common = berlin_common();
        let list = AccessList(vec![AccessListItem::new(
            Address::new([1; 20]),
            vec![StorageKey::new([2; 32])],
        )]);
        let gas = intrinsic_gas(&common, &[0x01, 0x02, 0x00], false, Some(&list));
        assert_eq!(gas, 21_000 + 2 * 16 + 4 + 2_400 + 1_900);
    }

    #[test]
    fn duplicate_access_list_entries_are_charged_twice() {
        let common = berlin_common();
        let item = AccessListItem::new(Address::new([1; 20]), vec![StorageKey::new([2; 32])]);
        let single = AccessList(vec![item.clone()]);
        let double = AccessList(vec![item.clone(), item]);

        let gas_single = intrinsic_gas(&common, &[], false, Some(&single));
        let gas_double = intrinsic_gas(&common, &[], false, Some(&double));
        assert_eq!(gas_double - gas_single, 2_400 + 1_900);
    }

    #[test]
    fn shanghai_charges_initcode_words() {
        let common = Common::new(ChainConfig::dev(Hardfork::Shanghai));
        let data = vec![1u8; 33]; // two words
        let gas = intrinsic_gas(&common, &data, true, None);
        assert_eq!(gas, 21_000 + 32_000 + 33 * 16 + 2 * 2);

        let pre_shanghai = berlin_common();
        let gas = intrinsic_gas(&pre_shanghai, &data, true, None);
        assert_eq!(gas, 21_000 + 32_000 + 33 * 16);
    }

    #[test]
    fn pre_istanbul_calldata_pricing() {
        let common = Common::new(ChainConfig::dev(Hardfork::Byzantium));
        let gas = intrinsic_gas(&common, &[0xff], false, None);
        assert_eq!(gas, 21_000 + 68);
    }

    #[test]
    fn overflow_detection() {
        assert!(fee_overflows(u64::MAX, U256::MAX));
        assert!(!fee_overflows(21_000, U256::from(1_000_000_000u64)));
    }

    #[test]
    fn effective_priority_fee_is_clamped() {
        let fee = effective_priority_fee(U256::from(100), U256::from(10), U256::from(95));
        assert_eq!(fee, U256::from(5));
        let fee = effective_priority_fee(U256::from(100), U256::from(10), U256::from(50));
        assert_eq!(fee, U256::from(10));
    }
}
