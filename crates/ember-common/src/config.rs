//! # Chain Configuration
//!
//! A chain is identified by its ids and its hardfork schedule. Each scheduled
//! hardfork carries exactly one kind of activation condition: a block number,
//! a timestamp, or (for the merge only) a total-difficulty threshold.

use crate::errors::CommonError;
use crate::hardfork::Hardfork;
use ember_types::U256;
use serde::{Deserialize, Serialize};

/// One entry in a chain's hardfork schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledHardfork {
    /// The hardfork being scheduled.
    pub hardfork: Hardfork,
    /// Activation block number.
    pub block: Option<u64>,
    /// Activation timestamp (seconds).
    pub timestamp: Option<u64>,
    /// Total-difficulty threshold (merge hardfork only).
    pub total_difficulty: Option<U256>,
}

impl ScheduledHardfork {
    /// Schedules activation at a block number.
    #[must_use]
    pub fn at_block(hardfork: Hardfork, block: u64) -> Self {
        Self {
            hardfork,
            block: Some(block),
            timestamp: None,
            total_difficulty: None,
        }
    }

    /// Schedules activation at a timestamp.
    #[must_use]
    pub fn at_timestamp(hardfork: Hardfork, timestamp: u64) -> Self {
        Self {
            hardfork,
            block: None,
            timestamp: Some(timestamp),
            total_difficulty: None,
        }
    }

    /// Schedules the merge at a total-difficulty threshold.
    #[must_use]
    pub fn at_total_difficulty(hardfork: Hardfork, ttd: U256) -> Self {
        Self {
            hardfork,
            block: None,
            timestamp: None,
            total_difficulty: Some(ttd),
        }
    }

    /// The block-or-timestamp activation point, if one is set.
    #[must_use]
    pub fn activation_point(&self) -> Option<u64> {
        self.block.or(self.timestamp)
    }

    /// Returns true if this entry is gated only by total difficulty.
    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.total_difficulty.is_some() && self.block.is_none() && self.timestamp.is_none()
    }

    /// Returns true if any activation condition is set.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.block.is_some() || self.timestamp.is_some() || self.total_difficulty.is_some()
    }
}

/// Static description of a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Human-readable chain name.
    pub name: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// devp2p network id.
    pub network_id: u64,
    /// Hardfork assumed when none is selected explicitly.
    pub default_hardfork: Hardfork,
    /// Hardfork schedule, in activation order.
    pub scheduled: Vec<ScheduledHardfork>,
}

impl ChainConfig {
    /// Builds and validates a chain configuration.
    ///
    /// # Errors
    ///
    /// Returns `MultipleMergeHardforks` if more than one entry carries a
    /// total-difficulty threshold.
    pub fn new(
        name: impl Into<String>,
        chain_id: u64,
        network_id: u64,
        default_hardfork: Hardfork,
        scheduled: Vec<ScheduledHardfork>,
    ) -> Result<Self, CommonError> {
        let merge_count = scheduled
            .iter()
            .filter(|entry| entry.total_difficulty.is_some())
            .count();
        if merge_count > 1 {
            return Err(CommonError::MultipleMergeHardforks);
        }
        Ok(Self {
            name: name.into(),
            chain_id,
            network_id,
            default_hardfork,
            scheduled,
        })
    }

    /// The Ethereum mainnet schedule.
    #[must_use]
    pub fn mainnet() -> Self {
        let ttd = U256::from_dec_str("58750000000000000000000").expect("valid decimal");
        Self {
            name: "mainnet".to_string(),
            chain_id: 1,
            network_id: 1,
            default_hardfork: Hardfork::Shanghai,
            scheduled: vec![
                ScheduledHardfork::at_block(Hardfork::Chainstart, 0),
                ScheduledHardfork::at_block(Hardfork::Homestead, 1_150_000),
                ScheduledHardfork::at_block(Hardfork::TangerineWhistle, 2_463_000),
                ScheduledHardfork::at_block(Hardfork::SpuriousDragon, 2_675_000),
                ScheduledHardfork::at_block(Hardfork::Byzantium, 4_370_000),
                ScheduledHardfork::at_block(Hardfork::Constantinople, 7_280_000),
                ScheduledHardfork::at_block(Hardfork::Petersburg, 7_280_000),
                ScheduledHardfork::at_block(Hardfork::Istanbul, 9_069_000),
                ScheduledHardfork::at_block(Hardfork::MuirGlacier, 9_200_000),
                ScheduledHardfork::at_block(Hardfork::Berlin, 12_244_000),
                ScheduledHardfork::at_block(Hardfork::London, 12_965_000),
                ScheduledHardfork::at_block(Hardfork::ArrowGlacier, 13_773_000),
                ScheduledHardfork::at_block(Hardfork::GrayGlacier, 15_050_000),
                ScheduledHardfork::at_total_difficulty(Hardfork::Paris, ttd),
                ScheduledHardfork::at_timestamp(Hardfork::Shanghai, 1_681_338_455),
                ScheduledHardfork::at_timestamp(Hardfork::Cancun, 1_710_338_135),
            ],
        }
    }

    /// A single-hardfork development chain: everything active from genesis.
    #[must_use]
    pub fn dev(hardfork: Hardfork) -> Self {
        Self {
            name: "dev".to_string(),
            chain_id: 1337,
            network_id: 1337,
            default_hardfork: hardfork,
            scheduled: vec![ScheduledHardfork::at_block(hardfork, 0)],
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_ttd_entries_are_rejected() {
        let result = ChainConfig::new(
            "bad",
            1,
            1,
            Hardfork::Paris,
            vec![
                ScheduledHardfork::at_total_difficulty(Hardfork::Paris, U256::from(1)),
                ScheduledHardfork::at_total_difficulty(Hardfork::Shanghai, U256::from(2)),
            ],
        );
        assert_eq!(result.unwrap_err(), CommonError::MultipleMergeHardforks);
    }

    #[test]
    fn mainnet_has_exactly_one_merge() {
        let config = ChainConfig::mainnet();
        let merges = config.scheduled.iter().filter(|s| s.is_merge()).count();
        assert_eq!(merges, 1);
    }

    #[test]
    fn activation_point_prefers_block() {
        let entry = ScheduledHardfork::at_block(Hardfork::Berlin, 5);
        assert_eq!(entry.activation_point(), Some(5));
        let entry = ScheduledHardfork::at_timestamp(Hardfork::Shanghai, 99);
        assert_eq!(entry.activation_point(), Some(99));
    }
}
