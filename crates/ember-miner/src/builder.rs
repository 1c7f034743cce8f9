//! # Pending-Block Builder
//!
//! Payload lifecycle: `start` registers a job and returns a stable 8-byte
//! id, repeated `build` calls assemble candidate blocks that only ever
//! improve, and `stop` cancels. The fill loop pops per-sender heads from a
//! tip-ordered heap, executes each candidate on a forked state, and honors
//! the block gas ceiling, the blob budget, a deadline, and the cancellation
//! flag between transactions.

use crate::errors::BuildError;
use crate::fees::{data_gas_price, next_base_fee, next_excess_data_gas};
use ember_common::{Common, HardforkQuery, Hardfork, ParamTopic};
use ember_evm::{BlockEnv, Evm, VmError};
use ember_pool::{PooledTransaction, SharedTxPool};
use ember_state::{fork_state, MemoryStateManager, StateManager};
use ember_tx::{Transaction, TxType};
use ember_types::{
    Address, Block, BlockHeader, Bloom, Bytes, Hash, Receipt, Withdrawal, EMPTY_UNCLE_HASH, U256,
};
use ember_crypto::keccak256;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace};

/// Smallest gas a transaction can need; below this the block is full.
const MIN_TX_GAS: u64 = 21_000;

/// Requested attributes of the block under construction.
#[derive(Clone, Debug, Default)]
pub struct PayloadAttributes {
    /// Timestamp of the new block.
    pub timestamp: u64,
    /// Fee recipient (coinbase).
    pub suggested_fee_recipient: Address,
    /// Randomness beacon value.
    pub prev_randao: Hash,
    /// Gas limit override; the parent's limit when absent.
    pub gas_limit: Option<u64>,
    /// Withdrawals to apply (Shanghai onward).
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Extra data for the header.
    pub extra_data: Bytes,
}

/// Stable identifier of one build job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadId(pub [u8; 8]);

impl std::fmt::Display for PayloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x")?;
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Sidecar data for every blob transaction in the block, inclusion-ordered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobBundle {
    /// All blobs.
    pub blobs: Vec<Bytes>,
    /// All commitments.
    pub commitments: Vec<[u8; 48]>,
    /// All proofs.
    pub proofs: Vec<[u8; 48]>,
}

/// One assembled candidate block.
#[derive(Clone, Debug)]
pub struct BuiltPayload {
    /// The sealed block.
    pub block: Block,
    /// Receipts, with block-cumulative gas.
    pub receipts: Vec<Receipt>,
    /// Total priority fees collected by the coinbase.
    pub fees: U256,
    /// Sidecars for included blob transactions.
    pub blob_bundle: Option<BlobBundle>,
}

struct BuildJob {
    parent: BlockHeader,
    attributes: PayloadAttributes,
    cancelled: Arc<AtomicBool>,
    best: Option<BuiltPayload>,
}

struct HeapEntry {
    tip: U256,
    sequence: u64,
    tx: PooledTransaction,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.tip == other.tip && self.sequence == other.sequence
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on tip; older admissions win ties.
        self.tip
            .cmp(&other.tip)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// Derives the payload id: an 8-byte digest over parent hash, timestamp,
/// randao, fee recipient, and (when present) the withdrawals commitment.
#[must_use]
pub fn payload_id(parent: &BlockHeader, attributes: &PayloadAttributes) -> PayloadId {
    let mut preimage = Vec::new();
    preimage.extend_from_slice(parent.hash().as_bytes());
    preimage.extend_from_slice(&attributes.timestamp.to_be_bytes());
    preimage.extend_from_slice(attributes.prev_randao.as_bytes());
    preimage.extend_from_slice(attributes.suggested_fee_recipient.as_bytes());
    if let Some(withdrawals) = &attributes.withdrawals {
        preimage.extend_from_slice(withdrawals_digest(withdrawals).as_bytes());
    }
    let digest = keccak256(&preimage);
    let mut id = [0u8; 8];
    id.copy_from_slice(&digest.as_bytes()[..8]);
    PayloadId(id)
}

fn ordered_digest<'a>(items: impl Iterator<Item = &'a [u8]>) -> Hash {
    let mut preimage = Vec::new();
    for item in items {
        preimage.extend_from_slice(&(item.len() as u64).to_be_bytes());
        preimage.extend_from_slice(item);
    }
    keccak256(&preimage)
}

fn withdrawals_digest(withdrawals: &[Withdrawal]) -> Hash {
    let encoded: Vec<Vec<u8>> = withdrawals
        .iter()
        .map(|w| rlp::encode(w).to_vec())
        .collect();
    ordered_digest(encoded.iter().map(Vec::as_slice))
}

/// The pending-block assembler.
pub struct PendingBlockBuilder {
    common: Common,
    pool: SharedTxPool,
    state: MemoryStateManager,
    jobs: HashMap<PayloadId, BuildJob>,
}

impl PendingBlockBuilder {
    /// Creates a builder over the canonical state and the shared pool.
    #[must_use]
    pub fn new(common: Common, pool: SharedTxPool, state: MemoryStateManager) -> Self {
        Self {
            common,
            pool,
            state,
            jobs: HashMap::new(),
        }
    }

    /// Registers a build job. Repeated calls with the same parent and
    /// attributes return the same id.
    pub fn start(&mut self, parent: BlockHeader, attributes: PayloadAttributes) -> PayloadId {
        let id = payload_id(&parent, &attributes);
        self.jobs.entry(id).or_insert_with(|| {
            debug!(payload = %id, number = parent.number + 1, "payload job registered");
            BuildJob {
                parent,
                attributes,
                cancelled: Arc::new(AtomicBool::new(false)),
                best: None,
            }
        });
        id
    }

    /// Cancels a job. Idempotent; unknown ids are ignored. A build running
    /// in another task observes the flag between transactions and returns
    /// its best-so-far result.
    pub fn stop(&mut self, id: PayloadId) {
        if let Some(job) = self.jobs.get(&id) {
            job.cancelled.store(true, AtomicOrdering::SeqCst);
            debug!(payload = %id, "payload job cancelled");
        }
    }

    /// The cancellation flag of a job, for wiring into external watchers.
    #[must_use]
    pub fn cancellation(&self, id: PayloadId) -> Option<Arc<AtomicBool>> {
        self.jobs.get(&id).map(|job| Arc::clone(&job.cancelled))
    }

    /// Assembles a candidate block for a job and returns the best payload
    /// seen so far (candidates only ever improve the returned fees).
    ///
    /// # Errors
    ///
    /// `UnknownPayload` for unregistered ids, `Cancelled` when stopped
    /// before any candidate existed, and infrastructure failures.
    #[instrument(skip(self, deadline), fields(payload = %id))]
    pub async fn build(
        &mut self,
        id: PayloadId,
        deadline: Option<Instant>,
    ) -> Result<BuiltPayload, BuildError> {
        let (parent, attributes, cancelled, best_fees) = {
            let job = self.jobs.get(&id).ok_or(BuildError::UnknownPayload)?;
            (
                job.parent.clone(),
                job.attributes.clone(),
                Arc::clone(&job.cancelled),
                job.best.as_ref().map(|best| best.fees),
            )
        };

        if cancelled.load(AtomicOrdering::SeqCst) {
            let job = self.jobs.get(&id).expect("job checked above");
            return job.best.clone().ok_or(BuildError::Cancelled);
        }

        let candidate = self
            .assemble(&parent, &attributes, &cancelled, deadline)
            .await?;

        let job = self.jobs.get_mut(&id).ok_or(BuildError::UnknownPayload)?;
        match best_fees {
            Some(fees) if fees > candidate.fees => {}
            _ => job.best = Some(candidate),
        }
        Ok(job.best.clone().expect("best set above"))
    }

    #[allow(clippy::too_many_lines)]
    async fn assemble(
        &self,
        parent: &BlockHeader,
        attributes: &PayloadAttributes,
        cancelled: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<BuiltPayload, BuildError> {
        let number = parent.number + 1;

        // Rules for the child block; selection failures keep current rules.
        let mut rules = self.common.clone();
        let _ = rules.set_hardfork_by(HardforkQuery {
            block_number: Some(number),
            timestamp: Some(attributes.timestamp),
            total_difficulty: None,
        });

        let fee_market = rules.is_activated_eip(1559);
        let base_fee = fee_market.then(|| next_base_fee(&rules, parent));
        let blobs_active = rules.is_activated_eip(4844);
        let excess_data_gas = blobs_active.then(|| next_excess_data_gas(&rules, parent));
        let gas_limit = attributes.gas_limit.unwrap_or(parent.gas_limit);
        let post_merge = rules.gte_hardfork(Hardfork::Paris);

        let mut blobs_remaining = rules
            .param(ParamTopic::Sharding, "limitBlobsPerBlock")
            .as_u64() as usize;
        let mut data_gas_remaining = rules
            .param(ParamTopic::Sharding, "maxDataGasPerBlock")
            .as_u64();

        let mut fork = fork_state(&self.state).await;
        let block_env = BlockEnv {
            number,
            timestamp: attributes.timestamp,
            coinbase: attributes.suggested_fee_recipient,
            gas_limit,
            difficulty: if post_merge {
                U256::zero()
            } else {
                parent.difficulty
            },
            prev_randao: attributes.prev_randao,
            base_fee: base_fee.unwrap_or_default(),
            data_gas_price: excess_data_gas
                .map(|excess| data_gas_price(&rules, excess))
                .unwrap_or_default(),
        };
        let mut evm = Evm::new(rules.clone(), Box::new(fork.clone()), block_env)?;

        let tip_base = base_fee.unwrap_or_default();
        let mut heap: BinaryHeap<HeapEntry> = self
            .pool
            .read()
            .ready()
            .into_iter()
            .map(|tx| HeapEntry {
                tip: tx.tip(tip_base),
                sequence: tx.sequence,
                tx,
            })
            .collect();

        let mut gas_remaining = gas_limit;
        let mut cumulative_gas = 0u64;
        let mut fees = U256::zero();
        let mut data_gas_used = 0u64;
        let mut transactions: Vec<Bytes> = Vec::new();
        let mut receipts: Vec<Receipt> = Vec::new();
        let mut bundle = BlobBundle::default();

        while gas_remaining >= MIN_TX_GAS {
            if cancelled.load(AtomicOrdering::SeqCst) {
                debug!("cancellation observed, returning best-so-far");
                break;
            }
            if deadline.is_some_and(|at| Instant::now() >= at) {
                debug!("deadline reached");
                break;
            }
            let Some(entry) = heap.pop() else { break };
            let pooled = entry.tx;

            // Rule-incompatible transactions are skipped without eviction.
            let type_active = match pooled.tx.tx_type() {
                TxType::Legacy => true,
                TxType::AccessList => rules.is_activated_eip(2930),
                TxType::FeeMarket => rules.is_activated_eip(1559),
                TxType::Blob => blobs_active,
            };
            if !type_active {
                trace!(hash = %pooled.hash, "skipping rule-incompatible transaction");
                continue;
            }
            if pooled.tx.gas_limit() > gas_remaining {
                trace!(hash = %pooled.hash, "skipping: does not fit remaining gas");
                continue;
            }
            let blob_info = pooled.tx.as_blob().map(|blob| {
                (blob.blob_count(), blob.data_gas(&rules))
            });
            if let Some((count, data_gas)) = blob_info {
                if count > blobs_remaining || data_gas > data_gas_remaining {
                    trace!(hash = %pooled.hash, "deferring blob transaction: budget exhausted");
                    continue;
                }
            }

            // Execute against a checkpoint of the forked state so an
            // excluded transaction leaves no residue.
            fork.checkpoint().await?;
            match evm.run_tx(&pooled.tx).await {
                Ok(result) => {
                    let dropped = matches!(
                        &result.exec.exception,
                        Some(error) if !matches!(error, VmError::Revert)
                    );
                    if dropped {
                        fork.revert().await?;
                        let _ = self.pool.write().remove(&pooled.hash);
                        debug!(hash = %pooled.hash, "dropped failing transaction from pool");
                        continue;
                    }
                    fork.commit().await?;

                    cumulative_gas += result.total_gas_spent;
                    gas_remaining -= result.total_gas_spent;
                    let tip = result.effective_gas_price.saturating_sub(tip_base);
                    fees += tip * U256::from(result.total_gas_spent);

                    if let Some((count, data_gas)) = blob_info {
                        blobs_remaining -= count;
                        data_gas_remaining -= data_gas;
                        data_gas_used += data_gas;
                        if let Some(sidecar) = self.pool.read().sidecar(&pooled.hash) {
                            bundle.blobs.extend(sidecar.blobs.iter().cloned());
                            bundle
                                .commitments
                                .extend(sidecar.commitments.iter().copied());
                            bundle.proofs.extend(sidecar.proofs.iter().copied());
                        }
                    }

                    receipts.push(Receipt::new(
                        result.receipt.tx_type,
                        result.receipt.succeeded(),
                        cumulative_gas,
                        result.receipt.logs.clone(),
                    ));
                    transactions.push(pooled.tx.serialize().map_err(|e| {
                        BuildError::Encoding(e.to_string())
                    })?);

                    // Advance this sender's head.
                    if let Some(next) = self
                        .pool
                        .read()
                        .get_by_sender_nonce(pooled.sender, pooled.nonce + 1)
                    {
                        heap.push(HeapEntry {
                            tip: next.tip(tip_base),
                            sequence: next.sequence,
                            tx: next,
                        });
                    }
                }
                Err(error) => {
                    fork.revert().await?;
                    let _ = self.pool.write().remove(&pooled.hash);
                    debug!(hash = %pooled.hash, %error, "dropped invalid transaction from pool");
                }
            }
        }

        // EIP-4895: withdrawals are applied after the transactions.
        if rules.is_activated_eip(4895) {
            if let Some(withdrawals) = &attributes.withdrawals {
                for withdrawal in withdrawals {
                    let balance = fork
                        .get_account(withdrawal.address)
                        .await?
                        .unwrap_or_default()
                        .balance;
                    fork.modify_account_fields(
                        withdrawal.address,
                        ember_state::AccountFields {
                            balance: Some(balance + withdrawal.amount_wei()),
                            ..ember_state::AccountFields::default()
                        },
                    )
                    .await?;
                }
            }
        }

        let state_root = fork.get_state_root().await?;
        let logs_bloom = receipts.iter().fold(Bloom::ZERO, |mut bloom, receipt| {
            bloom.accrue_bloom(&receipt.bloom);
            bloom
        });
        let transactions_root =
            ordered_digest(transactions.iter().map(ember_types::Bytes::as_slice));
        let receipt_encodings: Vec<Bytes> = receipts.iter().map(Receipt::encode).collect();
        let receipts_root = ordered_digest(receipt_encodings.iter().map(Bytes::as_slice));

        let shanghai = rules.is_activated_eip(4895);
        let header = BlockHeader {
            parent_hash: parent.hash(),
            uncle_hash: EMPTY_UNCLE_HASH,
            coinbase: attributes.suggested_fee_recipient,
            state_root,
            transactions_root,
            receipts_root,
            logs_bloom,
            difficulty: if post_merge {
                U256::zero()
            } else {
                parent.difficulty
            },
            number,
            gas_limit,
            gas_used: cumulative_gas,
            timestamp: attributes.timestamp,
            extra_data: attributes.extra_data.clone(),
            mix_hash: attributes.prev_randao,
            nonce: [0u8; 8],
            base_fee_per_gas: base_fee,
            withdrawals_root: shanghai
                .then(|| withdrawals_digest(attributes.withdrawals.as_deref().unwrap_or(&[]))),
            data_gas_used: blobs_active.then_some(data_gas_used),
            excess_data_gas,
        };

        debug!(
            number,
            txs = transactions.len(),
            gas_used = cumulative_gas,
            %fees,
            "candidate block assembled"
        );

        Ok(BuiltPayload {
            block: Block::new(
                header,
                transactions,
                shanghai.then(|| attributes.withdrawals.clone().unwrap_or_default()),
            ),
            receipts,
            fees,
            blob_bundle: blobs_active.then_some(bundle),
        })
    }
}
