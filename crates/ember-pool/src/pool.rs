//! # Transaction Pool
//!
//! Per-sender nonce-ordered queues with hash and sender indices. Admission
//! verifies chain compatibility, sender funds, nonce ordering, and the
//! base-fee floor; a same-nonce replacement must raise the tip by the
//! configured bump. Blob transactions enter only through their verified
//! network wrapper so the sidecar is available at block-build time.

use crate::errors::PoolError;
use ember_common::Common;
use ember_state::StateManager;
use ember_tx::{BlobTxNetworkWrapper, Transaction, TxType, TypedTransaction};
use ember_types::{Address, Bytes, Hash, U256};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Blob sidecar retained for pending blob transactions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobSidecar {
    /// The blobs themselves.
    pub blobs: Vec<Bytes>,
    /// One commitment per blob.
    pub commitments: Vec<[u8; 48]>,
    /// One proof per blob.
    pub proofs: Vec<[u8; 48]>,
}

/// Pool tuning knobs.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum pooled transactions.
    pub max_transactions: usize,
    /// Maximum pending transactions per sender.
    pub max_per_account: usize,
    /// Admission floor as a percentage of the current base fee.
    pub base_fee_floor_percent: u64,
    /// Required tip increase for a same-nonce replacement, in percent.
    pub replacement_bump_percent: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: 4_096,
            max_per_account: 64,
            base_fee_floor_percent: 100,
            replacement_bump_percent: 10,
        }
    }
}

/// A pooled transaction with its derived metadata.
#[derive(Clone, Debug)]
pub struct PooledTransaction {
    /// The transaction itself.
    pub tx: TypedTransaction,
    /// Transaction hash.
    pub hash: Hash,
    /// Recovered sender.
    pub sender: Address,
    /// Sender nonce.
    pub nonce: u64,
    /// Admission sequence number (monotone, for stable ordering).
    pub sequence: u64,
}

impl PooledTransaction {
    /// The tip this transaction pays at a base fee.
    #[must_use]
    pub fn tip(&self, base_fee: U256) -> U256 {
        self.tx.effective_priority_fee(base_fee)
    }
}

/// The nonce-ordered transaction pool.
pub struct TxPool {
    config: PoolConfig,
    common: Common,
    by_hash: HashMap<Hash, PooledTransaction>,
    by_sender: HashMap<Address, BTreeMap<u64, Hash>>,
    sidecars: HashMap<Hash, BlobSidecar>,
    sequence: u64,
}

impl TxPool {
    /// Creates an empty pool bound to a chain rule set.
    #[must_use]
    pub fn new(config: PoolConfig, common: Common) -> Self {
        Self {
            config,
            common,
            by_hash: HashMap::new(),
            by_sender: HashMap::new(),
            sidecars: HashMap::new(),
            sequence: 0,
        }
    }

    /// Number of pooled transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Returns true if no transaction is pooled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Looks a transaction up by hash.
    #[must_use]
    pub fn get(&self, hash: &Hash) -> Option<&PooledTransaction> {
        self.by_hash.get(hash)
    }

    /// The sidecar of a pooled blob transaction.
    #[must_use]
    pub fn sidecar(&self, hash: &Hash) -> Option<&BlobSidecar> {
        self.sidecars.get(hash)
    }

    /// Admits a non-blob transaction.
    ///
    /// # Errors
    ///
    /// Every admission-contract violation maps to a [`PoolError`].
    pub async fn add(
        &mut self,
        tx: TypedTransaction,
        state: &dyn StateManager,
        base_fee: U256,
    ) -> Result<Hash, PoolError> {
        if tx.tx_type() == TxType::Blob {
            return Err(PoolError::RulesMismatch(
                "blob transactions must arrive with their sidecar",
            ));
        }
        self.admit(tx, None, state, base_fee).await
    }

    /// Admits a blob transaction through its verified network wrapper
    /// (lengths, batch KZG proof, and versioned hashes were checked when the
    /// wrapper was decoded).
    ///
    /// # Errors
    ///
    /// Same admission contract as [`TxPool::add`], plus Cancun gating.
    pub async fn add_blob(
        &mut self,
        wrapper: BlobTxNetworkWrapper,
        state: &dyn StateManager,
        base_fee: U256,
    ) -> Result<Hash, PoolError> {
        if !self.common.is_activated_eip(4844) {
            return Err(PoolError::RulesMismatch("blob transactions need EIP-4844"));
        }
        let sidecar = BlobSidecar {
            blobs: wrapper.blobs,
            commitments: wrapper.commitments,
            proofs: wrapper.proofs,
        };
        let hash = self
            .admit(TypedTransaction::Blob(wrapper.tx), Some(sidecar), state, base_fee)
            .await?;
        Ok(hash)
    }

    async fn admit(
        &mut self,
        tx: TypedTransaction,
        sidecar: Option<BlobSidecar>,
        state: &dyn StateManager,
        base_fee: U256,
    ) -> Result<Hash, PoolError> {
        if tx.chain_id() != self.common.chain_id() {
            return Err(PoolError::RulesMismatch("chain id mismatch"));
        }
        match tx.tx_type() {
            TxType::Legacy => {}
            TxType::AccessList if self.common.is_activated_eip(2930) => {}
            TxType::FeeMarket if self.common.is_activated_eip(1559) => {}
            TxType::Blob if self.common.is_activated_eip(4844) => {}
            _ => return Err(PoolError::RulesMismatch("transaction type not active")),
        }

        let hash = tx.hash()?;
        if self.by_hash.contains_key(&hash) {
            return Err(PoolError::AlreadyKnown(hash));
        }

        // Base-fee floor: the fee cap must reach the configured fraction of
        // the current base fee.
        let floor = base_fee * U256::from(self.config.base_fee_floor_percent) / U256::from(100u64);
        if tx.max_fee_per_gas() < floor {
            return Err(PoolError::FeeBelowBase);
        }

        let sender = tx.sender_address()?;
        let account = state.get_account(sender).await?.unwrap_or_default();
        if tx.nonce() < account.nonce {
            return Err(PoolError::NonceTooLow {
                tx: tx.nonce(),
                account: account.nonce,
            });
        }
        let required = tx.upfront_cost(None, &self.common);
        if account.balance < required {
            return Err(PoolError::InsufficientFunds {
                required,
                available: account.balance,
            });
        }

        // Same-nonce replacement must out-tip the incumbent by the bump.
        let incumbent = self
            .by_sender
            .get(&sender)
            .and_then(|queue| queue.get(&tx.nonce()))
            .copied();
        if let Some(existing_hash) = incumbent {
            let existing = &self.by_hash[&existing_hash];
            let bump = U256::from(100 + self.config.replacement_bump_percent);
            let required_tip = existing.tip(base_fee) * bump / U256::from(100u64);
            let new_tip = tx.effective_priority_fee(base_fee);
            if new_tip < required_tip {
                return Err(PoolError::ReplacementUnderpriced {
                    required: required_tip,
                });
            }
            self.remove(&existing_hash)?;
        } else {
            let sender_count = self.by_sender.get(&sender).map_or(0, BTreeMap::len);
            if sender_count >= self.config.max_per_account {
                return Err(PoolError::AccountLimitReached {
                    limit: self.config.max_per_account,
                });
            }
            if self.by_hash.len() >= self.config.max_transactions {
                return Err(PoolError::PoolFull {
                    capacity: self.config.max_transactions,
                });
            }
        }

        debug!(hash = %hash, sender = %sender, nonce = tx.nonce(), "transaction admitted");
        self.sequence += 1;
        let pooled = PooledTransaction {
            nonce: tx.nonce(),
            tx,
            hash,
            sender,
            sequence: self.sequence,
        };
        self.by_sender
            .entry(sender)
            .or_default()
            .insert(pooled.nonce, hash);
        if let Some(sidecar) = sidecar {
            self.sidecars.insert(hash, sidecar);
        }
        self.by_hash.insert(hash, pooled);
        Ok(hash)
    }

    /// Removes a transaction by hash.
    ///
    /// # Errors
    ///
    /// `NotFound` if the hash is not pooled.
    pub fn remove(&mut self, hash: &Hash) -> Result<PooledTransaction, PoolError> {
        let pooled = self
            .by_hash
            .remove(hash)
            .ok_or(PoolError::NotFound(*hash))?;
        if let Some(queue) = self.by_sender.get_mut(&pooled.sender) {
            queue.remove(&pooled.nonce);
            if queue.is_empty() {
                self.by_sender.remove(&pooled.sender);
            }
        }
        self.sidecars.remove(hash);
        Ok(pooled)
    }

    /// All pending transactions of one sender, nonce-ordered.
    #[must_use]
    pub fn by_sender(&self, sender: Address) -> Vec<&PooledTransaction> {
        self.by_sender
            .get(&sender)
            .map(|queue| queue.values().map(|hash| &self.by_hash[hash]).collect())
            .unwrap_or_default()
    }

    /// Each sender's lowest-nonce pending transaction.
    #[must_use]
    pub fn ready(&self) -> Vec<PooledTransaction> {
        self.by_sender
            .values()
            .filter_map(|queue| queue.values().next())
            .map(|hash| self.by_hash[hash].clone())
            .collect()
    }

    /// The pending transaction of `sender` at exactly `nonce`.
    #[must_use]
    pub fn get_by_sender_nonce(&self, sender: Address, nonce: u64) -> Option<PooledTransaction> {
        self.by_sender
            .get(&sender)
            .and_then(|queue| queue.get(&nonce))
            .map(|hash| self.by_hash[hash].clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================
