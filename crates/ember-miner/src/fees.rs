//! # Header Fee Derivation
//!
//! EIP-1559 base-fee adjustment and EIP-4844 excess-data-gas tracking, both
//! computed from the parent header.

use ember_common::{Common, ParamTopic};
use ember_types::{BlockHeader, U256};

/// Base fee of the block following `parent` (EIP-1559).
#[must_use]
pub fn next_base_fee(common: &Common, parent: &BlockHeader) -> U256 {
    let initial = common.param(ParamTopic::GasConfig, "initialBaseFee");
    let Some(parent_base) = parent.base_fee_per_gas else {
        // First fee-market block.
        return initial;
    };

    let elasticity = common
        .param(ParamTopic::GasConfig, "elasticityMultiplier")
        .as_u64()
        .max(1);
    let denominator = common
        .param(ParamTopic::GasConfig, "baseFeeMaxChangeDenominator")
        .as_u64()
        .max(1);
    let target = parent.gas_limit / elasticity;

    if parent.gas_used == target || target == 0 {
        return parent_base;
    }

    if parent.gas_used > target {
        let delta = U256::from(parent.gas_used - target);
        let change = parent_base * delta / U256::from(target) / U256::from(denominator);
        parent_base + change.max(U256::one())
    } else {
        let delta = U256::from(target - parent.gas_used);
        let change = parent_base * delta / U256::from(target) / U256::from(denominator);
        parent_base.saturating_sub(change)
    }
}

/// Excess data gas of the block following `parent` (EIP-4844).
#[must_use]
pub fn next_excess_data_gas(common: &Common, parent: &BlockHeader) -> u64 {
    let target = common
        .param(ParamTopic::Sharding, "targetDataGasPerBlock")
        .as_u64();
    let excess = parent.excess_data_gas.unwrap_or(0);
    let used = parent.data_gas_used.unwrap_or(0);
    (excess + used).saturating_sub(target)
}

/// Data-gas price for a given excess, via the EIP-4844 capped exponential.
#[must_use]
pub fn data_gas_price(common: &Common, excess_data_gas: u64) -> U256 {
    let minimum = common.param(ParamTopic::Sharding, "minDataGasPrice");
    let fraction = common
        .param(ParamTopic::Sharding, "dataGasPriceUpdateFraction")
        .as_u64()
        .max(1);
    fake_exponential(minimum, U256::from(excess_data_gas), U256::from(fraction))
}

/// `factor * e^(numerator / denominator)` with integer Taylor expansion.
fn fake_exponential(factor: U256, numerator: U256, denominator: U256) -> U256 {
    let mut output = U256::zero();
    let mut accum = factor * denominator;
    let mut i = U256::one();
    while !accum.is_zero() {
        output += accum;
        accum = accum * numerator / (denominator * i);
        i += U256::one();
    }
    output / denominator
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::{ChainConfig, Hardfork};

    fn common() -> Common {
        Common::new(ChainConfig::dev(Hardfork::London))
    }

    fn parent(gas_limit: u64, gas_used: u64, base_fee: u64) -> BlockHeader {
        BlockHeader {
            gas_limit,
            gas_used,
            base_fee_per_gas: Some(U256::from(base_fee)),
            ..BlockHeader::default()
        }
    }

    #[test]
    fn base_fee_stays_put_at_target() {
        // gas_used == gas_limit / elasticity
        let header = parent(30_000_000, 15_000_000, 1_000_000_000);
        assert_eq!(
            next_base_fee(&common(), &header),
            U256::from(1_000_000_000u64)
        );
    }

    #[test]
    fn full_block_raises_by_one_eighth() {
        // gas_used == 2 * target → +1/denominator
        let header = parent(30_000_000, 30_000_000, 1_000_000_000);
        assert_eq!(
            next_base_fee(&common(), &header),
            U256::from(1_125_000_000u64)
        );
    }

    #[test]
    fn empty_block_lowers_by_one_eighth() {
        let header = parent(30_000_000, 0, 1_000_000_000);
        assert_eq!(
            next_base_fee(&common(), &header),
            U256::from(875_000_000u64)
        );
    }

    #[test]
    fn pre_london_parent_gets_initial_base_fee() {
        let header = BlockHeader {
            gas_limit: 30_000_000,
            gas_used: 10_000_000,
            ..BlockHeader::default()
        };
        assert_eq!(
            next_base_fee(&common(), &header),
            U256::from(1_000_000_000u64)
        );
    }

    #[test]
    fn excess_data_gas_accumulates_above_target() {
        let cancun = Common::new(ChainConfig::dev(Hardfork::Cancun));
        let mut header = BlockHeader::default();
        header.data_gas_used = Some(786_432); // six blobs
        header.excess_data_gas = Some(0);
        // 786432 - 393216 target = 393216
        assert_eq!(next_excess_data_gas(&cancun, &header), 393_216);

        header.data_gas_used = Some(131_072);
        assert_eq!(next_excess_data_gas(&cancun, &header), 0);
    }

    #[test]
    fn data_gas_price_starts_at_minimum_and_grows() {
        let cancun = Common::new(ChainConfig::dev(Hardfork::Cancun));
        assert_eq!(data_gas_price(&cancun, 0), U256::one());
        let elevated = data_gas_price(&cancun, 10 * 393_216);
        assert!(elevated > U256::one());
    }
}
