//! # Common — the chain parameter resolver
//!
//! One `Common` instance answers every "what are the rules right now"
//! question: active hardfork, activated EIPs, protocol parameters, fork
//! hashes. It is immutable except for `set_hardfork` / `set_eips`, which bump
//! a generation counter and notify registered observers so dependent tables
//! (opcodes, precompiles) can rebuild.

use crate::config::{ChainConfig, ScheduledHardfork};
use crate::errors::CommonError;
use crate::hardfork::{Hardfork, ALL_HARDFORKS};
use crate::params::{eip_spec, find_param, hardfork_params, ParamTopic};
use ember_types::{Hash, U256};
use tracing::debug;

/// Inputs for hardfork selection. All fields are optional; absent fields
/// restrict which activation conditions participate.
#[derive(Clone, Copy, Debug, Default)]
pub struct HardforkQuery {
    /// Block number of the context being asked about.
    pub block_number: Option<u64>,
    /// Block timestamp.
    pub timestamp: Option<u64>,
    /// Total difficulty at the parent.
    pub total_difficulty: Option<U256>,
}

impl HardforkQuery {
    /// Selection by block number only.
    #[must_use]
    pub fn by_block(block_number: u64) -> Self {
        Self {
            block_number: Some(block_number),
            ..Self::default()
        }
    }
}

/// Callback invoked when the active hardfork changes.
pub type HardforkObserver = Box<dyn Fn(Hardfork) + Send + Sync>;

/// Chain + hardfork + EIP parameter resolver.
pub struct Common {
    config: ChainConfig,
    hardfork: Hardfork,
    eips: Vec<u64>,
    generation: u64,
    observers: Vec<HardforkObserver>,
}

impl Common {
    /// Creates a resolver on the given chain, at its default hardfork.
    #[must_use]
    pub fn new(config: ChainConfig) -> Self {
        let hardfork = config.default_hardfork;
        Self {
            config,
            hardfork,
            eips: Vec::new(),
            generation: 0,
            observers: Vec::new(),
        }
    }

    /// Creates a resolver with a specific hardfork selected.
    #[must_use]
    pub fn with_hardfork(config: ChainConfig, hardfork: Hardfork) -> Self {
        let mut common = Self::new(config);
        common.hardfork = hardfork;
        common
    }

    /// The chain configuration.
    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// EIP-155 chain id.
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    /// devp2p network id.
    #[must_use]
    pub fn network_id(&self) -> u64 {
        self.config.network_id
    }

    /// The currently selected hardfork.
    #[must_use]
    pub fn hardfork(&self) -> Hardfork {
        self.hardfork
    }

    /// User-activated EIPs, in activation order.
    #[must_use]
    pub fn eips(&self) -> &[u64] {
        &self.eips
    }

    /// Structural-change counter; bumped by `set_hardfork` / `set_eips`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Registers a hardfork-change observer.
    pub fn on_hardfork_change(&mut self, observer: HardforkObserver) {
        self.observers.push(observer);
    }

    /// Selects a hardfork. Notifies observers and invalidates caches.
    pub fn set_hardfork(&mut self, hardfork: Hardfork) {
        if self.hardfork == hardfork {
            return;
        }
        debug!(from = %self.hardfork, to = %hardfork, "hardfork changed");
        self.hardfork = hardfork;
        self.generation += 1;
        for observer in &self.observers {
            observer(hardfork);
        }
    }

    /// Selects the hardfork matching a block/timestamp/TD query.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Common::hardfork_by`].
    pub fn set_hardfork_by(&mut self, query: HardforkQuery) -> Result<Hardfork, CommonError> {
        let hardfork = self.hardfork_by(query)?;
        self.set_hardfork(hardfork);
        Ok(hardfork)
    }

    /// Activates user-supplied EIPs on top of the current hardfork.
    ///
    /// # Errors
    ///
    /// - `UnknownEip` for EIPs outside the registry.
    /// - `EipMinimumHardfork` when the current hardfork is too old.
    /// - `EipPrerequisiteMissing` when a required EIP is neither listed nor
    ///   implied by the hardfork.
    pub fn set_eips(&mut self, eips: Vec<u64>) -> Result<(), CommonError> {
        for &eip in &eips {
            let spec = eip_spec(eip).ok_or(CommonError::UnknownEip(eip))?;
            if self.hardfork < spec.minimum_hardfork {
                return Err(CommonError::EipMinimumHardfork {
                    eip,
                    minimum: spec.minimum_hardfork,
                });
            }
            for &required in spec.required_eips {
                let active = eips.contains(&required) || self.hardfork_implies_eip(required);
                if !active {
                    return Err(CommonError::EipPrerequisiteMissing {
                        eip,
                        missing: required,
                    });
                }
            }
        }
        self.eips = eips;
        self.generation += 1;
        Ok(())
    }

    // =========================================================================
    // PARAMETER RESOLUTION
    // =========================================================================

    /// Resolves a parameter: active EIPs (in order) first, then the hardfork
    /// chain newest-to-oldest, then zero.
    #[must_use]
    pub fn param(&self, topic: ParamTopic, name: &str) -> U256 {
        for &eip in &self.eips {
            if let Some(value) = self.param_by_eip(topic, name, eip) {
                return value;
            }
        }
        self.param_by_hardfork(topic, name, self.hardfork)
    }

    /// Resolves a parameter as of a specific hardfork, ignoring user EIPs.
    #[must_use]
    pub fn param_by_hardfork(&self, topic: ParamTopic, name: &str, hardfork: Hardfork) -> U256 {
        for &hf in ALL_HARDFORKS.iter().rev() {
            if hf > hardfork {
                continue;
            }
            if let Some(value) = find_param(hardfork_params(hf), topic, name) {
                return U256::from(value);
            }
            for &eip in hf.introduced_eips() {
                if let Some(spec) = eip_spec(eip) {
                    if let Some(value) = find_param(spec.params, topic, name) {
                        return U256::from(value);
                    }
                }
            }
        }
        U256::zero()
    }

    /// Resolves a parameter from a single EIP's table.
    #[must_use]
    pub fn param_by_eip(&self, topic: ParamTopic, name: &str, eip: u64) -> Option<U256> {
        let spec = eip_spec(eip)?;
        find_param(spec.params, topic, name).map(U256::from)
    }

    /// Returns true if the EIP is user-activated or implied by the hardfork.
    #[must_use]
    pub fn is_activated_eip(&self, eip: u64) -> bool {
        self.eips.contains(&eip) || self.hardfork_implies_eip(eip)
    }

    /// Returns true if the current hardfork is `hardfork` or later.
    #[must_use]
    pub fn gte_hardfork(&self, hardfork: Hardfork) -> bool {
        self.hardfork >= hardfork
    }

    fn hardfork_implies_eip(&self, eip: u64) -> bool {
        ALL_HARDFORKS
            .iter()
            .filter(|&&hf| hf <= self.hardfork)
            .any(|hf| hf.introduced_eips().contains(&eip))
    }

    // =========================================================================
    // HARDFORK SELECTION
    // =========================================================================

    /// Selects the hardfork active at the queried point.
    ///
    /// # Errors
    ///
    /// - `MustHaveHardforkAtZero` when the point precedes every scheduled
    ///   hardfork.
    /// - `HardforkMismatch` when the supplied total difficulty contradicts
    ///   the block-derived hardfork.
    pub fn hardfork_by(&self, query: HardforkQuery) -> Result<Hardfork, CommonError> {
        // 1. Only scheduled hardforks participate.
        let scheduled: Vec<&ScheduledHardfork> = self
            .config
            .scheduled
            .iter()
            .filter(|entry| entry.is_scheduled())
            .collect();
        if scheduled.is_empty() {
            return Err(CommonError::MustHaveHardforkAtZero);
        }

        // 2. First hardfork whose activation strictly exceeds the inputs.
        let exceeds = |entry: &ScheduledHardfork| -> bool {
            if let Some(block) = entry.block {
                return match query.block_number {
                    Some(number) => block > number,
                    None => false,
                };
            }
            if let Some(ts) = entry.timestamp {
                return match query.timestamp {
                    Some(t) => ts > t,
                    None => false,
                };
            }
            false // TTD-gated entries never exceed by comparison
        };
        let first_exceeding = scheduled
            .iter()
            .position(|entry| exceeds(entry))
            .unwrap_or(scheduled.len());
        if first_exceeding == 0 {
            return Err(CommonError::MustHaveHardforkAtZero);
        }

        // 3. Step back one; skip timestamp-only entries if no timestamp given.
        let mut index = first_exceeding - 1;
        if query.timestamp.is_none() {
            while index > 0 && scheduled[index].block.is_none() && scheduled[index].timestamp.is_some()
            {
                index -= 1;
            }
        }

        // 4. Merge resolution by total difficulty.
        let merge_index = scheduled.iter().position(|entry| entry.is_merge());
        if let (Some(td), Some(merge_at)) = (query.total_difficulty, merge_index) {
            let ttd = scheduled[merge_at]
                .total_difficulty
                .expect("merge entry carries a ttd");
            if index == merge_at {
                if td < ttd {
                    if merge_at == 0 {
                        return Err(CommonError::MustHaveHardforkAtZero);
                    }
                    index = merge_at - 1;
                }
            } else if td >= ttd && index < merge_at {
                return Err(CommonError::HardforkMismatch);
            } else if td < ttd && index > merge_at {
                return Err(CommonError::HardforkMismatch);
            }
        } else if let Some(merge_at) = merge_index {
            // No TD supplied: a TTD-only entry cannot be selected on its own.
            if index == merge_at && merge_at > 0 {
                index = merge_at - 1;
            }
        }

        // 5. Resolve activation ties toward the later hardfork.
        while index + 1 < scheduled.len() {
            let here = scheduled[index];
            let next = scheduled[index + 1];
            let tied = (here.block.is_some() && here.block == next.block)
                || (here.timestamp.is_some() && here.timestamp == next.timestamp);
            if tied {
                index += 1;
            } else {
                break;
            }
        }

        Ok(scheduled[index].hardfork)
    }

    /// Activation block of a hardfork, if block-scheduled.
    #[must_use]
    pub fn hardfork_block(&self, hardfork: Hardfork) -> Option<u64> {
        self.scheduled_entry(hardfork).and_then(|entry| entry.block)
    }

    /// Activation timestamp of a hardfork, if timestamp-scheduled.
    #[must_use]
    pub fn hardfork_timestamp(&self, hardfork: Hardfork) -> Option<u64> {
        self.scheduled_entry(hardfork)
            .and_then(|entry| entry.timestamp)
    }

    /// Activation point of the next scheduled hardfork after `hardfork` with
    /// a strictly later activation.
    #[must_use]
    pub fn next_hardfork_block_or_timestamp(&self, hardfork: Hardfork) -> Option<u64> {
        let position = self
            .config
            .scheduled
            .iter()
            .position(|entry| entry.hardfork == hardfork)?;
        let current = self.config.scheduled[position].activation_point()?;
        self.config.scheduled[position + 1..]
            .iter()
            .filter_map(ScheduledHardfork::activation_point)
            .find(|&point| point > current)
    }

    fn scheduled_entry(&self, hardfork: Hardfork) -> Option<&ScheduledHardfork> {
        self.config
            .scheduled
            .iter()
            .find(|entry| entry.hardfork == hardfork)
    }

    // =========================================================================
    // FORK HASH (EIP-2124)
    // =========================================================================

    /// CRC32 fork identifier: genesis hash followed by every activation point
    /// up to and including `hardfork`, skipping the merge entry, genesis-time
    /// activations, and duplicates.
    ///
    /// # Errors
    ///
    /// Returns `UnknownHardfork` if the hardfork is not in this chain's
    /// schedule.
    pub fn fork_hash(&self, hardfork: Hardfork, genesis_hash: &Hash) -> Result<[u8; 4], CommonError> {
        let position = self
            .config
            .scheduled
            .iter()
            .position(|entry| entry.hardfork == hardfork)
            .ok_or_else(|| CommonError::UnknownHardfork(hardfork.name().to_string()))?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(genesis_hash.as_bytes());

        let mut previous: u64 = 0;
        for entry in &self.config.scheduled[..=position] {
            if entry.is_merge() {
                continue;
            }
            let Some(point) = entry.activation_point() else {
                continue;
            };
            if point == 0 || point == previous {
                continue;
            }
            hasher.update(&point.to_be_bytes());
            previous = point;
        }

        Ok(hasher.finalize().to_be_bytes())
    }
}

impl Clone for Common {
    /// Deep copy of configuration and activation state. Observers are not
    /// carried over: a copy starts with an empty observer list.
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            hardfork: self.hardfork,
            eips: self.eips.clone(),
            generation: self.generation,
            observers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Common {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Common")
            .field("chain", &self.config.name)
            .field("chain_id", &self.config.chain_id)
            .field("hardfork", &self.hardfork)
            .field("eips", &self.eips)
            .field("generation", &self.generation)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduledHardfork;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn three_fork_chain() -> Common {
        let config = ChainConfig::new(
            "testnet",
            5,
            5,
            Hardfork::London,
            vec![
                ScheduledHardfork::at_block(Hardfork::Chainstart, 0),
                ScheduledHardfork::at_block(Hardfork::Berlin, 2),
                ScheduledHardfork::at_block(Hardfork::London, 3),
            ],
        )
        .unwrap();
        Common::new(config)
    }

    #[test]
    fn hardfork_by_block_walks_the_schedule() {
        let common = three_fork_chain();
        let by_block = |n: u64| common.hardfork_by(HardforkQuery::by_block(n)).unwrap();
        assert_eq!(by_block(0), Hardfork::Chainstart);
        assert_eq!(by_block(1), Hardfork::Chainstart);
        assert_eq!(by_block(2), Hardfork::Berlin);
        assert_eq!(by_block(3), Hardfork::London);
        assert_eq!(by_block(4), Hardfork::London);
    }

    #[test]
    fn hardfork_by_block_is_monotone() {
        let common = Common::new(ChainConfig::mainnet());
        let mut previous = Hardfork::Chainstart;
        for block in [0u64, 1, 1_150_000, 2_675_000, 9_069_000, 12_965_000, 15_050_000] {
            let hf = common.hardfork_by(HardforkQuery::by_block(block)).unwrap();
            assert!(hf >= previous, "hardfork regressed at block {block}");
            previous = hf;
        }
    }

    #[test]
    fn shared_activation_resolves_to_later_fork() {
        let common = Common::new(ChainConfig::mainnet());
        let hf = common
            .hardfork_by(HardforkQuery::by_block(7_280_000))
            .unwrap();
        assert_eq!(hf, Hardfork::Petersburg);
    }

    #[test]
    fn merge_is_selected_by_total_difficulty() {
        let common = Common::new(ChainConfig::mainnet());
        let ttd = U256::from_dec_str("58750000000000000000000").unwrap();

        let pre = common
            .hardfork_by(HardforkQuery {
                block_number: Some(15_537_000),
                timestamp: None,
                total_difficulty: Some(ttd - U256::one()),
            })
            .unwrap();
        assert_eq!(pre, Hardfork::GrayGlacier);

        let post = common
            .hardfork_by(HardforkQuery {
                block_number: Some(15_537_394),
                timestamp: None,
                total_difficulty: Some(ttd),
            })
            .unwrap();
        assert_eq!(post, Hardfork::Paris);
    }

    #[test]
    fn timestamp_selects_post_merge_forks() {
        let common = Common::new(ChainConfig::mainnet());
        let hf = common
            .hardfork_by(HardforkQuery {
                block_number: Some(17_034_870),
                timestamp: Some(1_681_338_455),
                total_difficulty: None,
            })
            .unwrap();
        assert_eq!(hf, Hardfork::Shanghai);
    }

    #[test]
    fn td_conflicting_with_block_fails() {
        let common = Common::new(ChainConfig::mainnet());
        // Pre-merge TD but a timestamp that selects Shanghai.
        let result = common.hardfork_by(HardforkQuery {
            block_number: Some(17_034_870),
            timestamp: Some(1_681_338_455),
            total_difficulty: Some(U256::from(1)),
        });
        assert_eq!(result.unwrap_err(), CommonError::HardforkMismatch);
    }

    #[test]
    fn block_before_schedule_fails() {
        let config = ChainConfig::new(
            "late",
            9,
            9,
            Hardfork::Berlin,
            vec![ScheduledHardfork::at_block(Hardfork::Berlin, 10)],
        )
        .unwrap();
        let common = Common::new(config);
        assert_eq!(
            common.hardfork_by(HardforkQuery::by_block(3)).unwrap_err(),
            CommonError::MustHaveHardforkAtZero
        );
    }

    #[test]
    fn param_resolution_prefers_user_eips() {
        let mut common = three_fork_chain();
        // London resolves the Berlin-era divisor by hardfork.
        assert_eq!(
            common.param(ParamTopic::GasPrices, "modexpGquaddivisor"),
            U256::from(3)
        );
        common.set_hardfork(Hardfork::Byzantium);
        assert_eq!(
            common.param(ParamTopic::GasPrices, "modexpGquaddivisor"),
            U256::from(20)
        );
        common.set_eips(vec![2565]).unwrap();
        assert_eq!(
            common.param(ParamTopic::GasPrices, "modexpGquaddivisor"),
            U256::from(3)
        );
    }

    #[test]
    fn unknown_param_defaults_to_zero() {
        let common = three_fork_chain();
        assert_eq!(
            common.param(ParamTopic::Vm, "noSuchParameter"),
            U256::zero()
        );
    }

    #[test]
    fn eip_activation_validates_prerequisites() {
        let mut common = Common::with_hardfork(ChainConfig::mainnet(), Hardfork::Istanbul);
        // 3670 requires 3540, which is not listed or implied by Istanbul.
        assert!(matches!(
            common.set_eips(vec![3670]),
            Err(CommonError::EipMinimumHardfork { .. })
        ));
        common.set_hardfork(Hardfork::London);
        assert_eq!(
            common.set_eips(vec![3670]),
            Err(CommonError::EipPrerequisiteMissing {
                eip: 3670,
                missing: 3540
            })
        );
        common.set_eips(vec![3540, 3670]).unwrap();
        assert!(common.is_activated_eip(3670));
    }

    #[test]
    fn unknown_eip_is_rejected() {
        let mut common = three_fork_chain();
        assert_eq!(
            common.set_eips(vec![424_242]),
            Err(CommonError::UnknownEip(424_242))
        );
    }

    #[test]
    fn hardfork_implies_its_eips() {
        let common = Common::with_hardfork(ChainConfig::mainnet(), Hardfork::Cancun);
        assert!(common.is_activated_eip(1153));
        assert!(common.is_activated_eip(1559));
        assert!(common.is_activated_eip(2929));
        assert!(!common.is_activated_eip(2537));
    }

    #[test]
    fn fork_hash_matches_mainnet_vectors() {
        let common = Common::new(ChainConfig::mainnet());
        let genesis = Hash::new(
            hex::decode("d4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3")
                .unwrap()
                .try_into()
                .unwrap(),
        );
        // EIP-2124 published vectors for mainnet.
        assert_eq!(
            common.fork_hash(Hardfork::Chainstart, &genesis).unwrap(),
            [0xfc, 0x64, 0xec, 0x04]
        );
        assert_eq!(
            common.fork_hash(Hardfork::Homestead, &genesis).unwrap(),
            [0x97, 0xc2, 0xc3, 0x4c]
        );
        // Later forks keep changing the digest.
        assert_ne!(
            common.fork_hash(Hardfork::Berlin, &genesis).unwrap(),
            common.fork_hash(Hardfork::London, &genesis).unwrap()
        );
    }

    #[test]
    fn fork_hash_stable_under_future_forks() {
        let genesis = Hash::new([0xaa; 32]);
        let short = three_fork_chain();

        let mut extended_schedule = short.config().scheduled.clone();
        extended_schedule.push(ScheduledHardfork::at_timestamp(Hardfork::Shanghai, 999_999));
        let extended = Common::new(
            ChainConfig::new("testnet2", 5, 5, Hardfork::London, extended_schedule).unwrap(),
        );

        assert_eq!(
            short.fork_hash(Hardfork::Berlin, &genesis).unwrap(),
            extended.fork_hash(Hardfork::Berlin, &genesis).unwrap()
        );
    }

    #[test]
    fn observers_fire_on_hardfork_change() {
        let mut common = three_fork_chain();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        common.on_hardfork_change(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let generation = common.generation();
        common.set_hardfork(Hardfork::Berlin);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(common.generation() > generation);

        // Setting the same hardfork again is a no-op.
        common.set_hardfork(Hardfork::Berlin);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clone_drops_observers() {
        let mut common = three_fork_chain();
        common.on_hardfork_change(Box::new(|_| {}));
        let mut copy = common.clone();
        // The copy must not fire the original's observer.
        copy.set_hardfork(Hardfork::Berlin);
        assert_eq!(copy.hardfork(), Hardfork::Berlin);
        assert_eq!(common.hardfork(), Hardfork::London);
    }

    #[test]
    fn next_hardfork_activation() {
        let common = three_fork_chain();
        assert_eq!(
            common.next_hardfork_block_or_timestamp(Hardfork::Chainstart),
            Some(2)
        );
        assert_eq!(
            common.next_hardfork_block_or_timestamp(Hardfork::Berlin),
            Some(3)
        );
        assert_eq!(
            common.next_hardfork_block_or_timestamp(Hardfork::London),
            None
        );
    }
}
