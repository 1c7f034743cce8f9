//! # Journaled State
//!
//! The EVM-facing state handle. Wraps a [`StateManager`] backend and layers
//! the transaction-scoped bookkeeping on top: warm address/slot sets
//! (EIP-2929), the created-contracts set (EIP-6780), selfdestruct marks,
//! logs, the refund counter, and transient storage. Checkpoints bracket all
//! of it; a revert undoes backend writes and the scoped sets together, while
//! transient storage keeps its own independent stack.

use crate::errors::StateError;
use crate::journal::Journal;
use crate::ports::{AccountFields, StateManager};
use crate::transient::TransientStorage;
use ember_types::{Account, Address, Bytes, Hash, Log, StorageKey, StorageValue, U256};
use std::collections::{HashMap, HashSet};
use tracing::trace;

#[derive(Clone, Debug)]
enum TxEntry {
    WarmAddress(Address),
    WarmSlot(Address, StorageKey),
    LogAppended,
    RefundAdd(u64),
    RefundSub(u64),
    Created(Address),
    SelfdestructMark(Address),
}

/// Journaled view over a state backend plus per-transaction scratch sets.
pub struct JournaledState {
    backend: Box<dyn StateManager>,
    journal: Journal<TxEntry>,
    transient: TransientStorage,
    warm_addresses: HashSet<Address>,
    warm_slots: HashSet<(Address, StorageKey)>,
    created: HashSet<Address>,
    selfdestructs: HashSet<Address>,
    logs: Vec<Log>,
    refund: u64,
    original_storage: HashMap<(Address, StorageKey), StorageValue>,
}

impl JournaledState {
    /// Wraps a backend.
    #[must_use]
    pub fn new(backend: Box<dyn StateManager>) -> Self {
        Self {
            backend,
            journal: Journal::new(),
            transient: TransientStorage::new(),
            warm_addresses: HashSet::new(),
            warm_slots: HashSet::new(),
            created: HashSet::new(),
            selfdestructs: HashSet::new(),
            logs: Vec::new(),
            refund: 0,
            original_storage: HashMap::new(),
        }
    }

    /// The wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &dyn StateManager {
        self.backend.as_ref()
    }

    // =========================================================================
    // CHECKPOINT BRACKETS
    // =========================================================================

    /// Opens a checkpoint across backend, scoped sets, and transient storage.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn checkpoint(&mut self) -> Result<(), StateError> {
        self.backend.checkpoint().await?;
        self.journal.checkpoint();
        self.transient.checkpoint();
        Ok(())
    }

    /// Commits the youngest checkpoint everywhere.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnbalanced` on an unmatched commit.
    pub async fn commit(&mut self) -> Result<(), StateError> {
        self.backend.commit().await?;
        self.journal.commit()?;
        self.transient.commit()
    }

    /// Reverts the youngest checkpoint everywhere, undoing scoped-set changes
    /// newest-first.
    ///
    /// # Errors
    ///
    /// Returns `JournalUnbalanced` on an unmatched revert.
    pub async fn revert(&mut self) -> Result<(), StateError> {
        trace!(depth = self.journal.depth(), "reverting state checkpoint");
        self.backend.revert().await?;
        for entry in self.journal.revert()? {
            match entry {
                TxEntry::WarmAddress(address) => {
                    self.warm_addresses.remove(&address);
                }
                TxEntry::WarmSlot(address, key) => {
                    self.warm_slots.remove(&(address, key));
                }
                TxEntry::LogAppended => {
                    self.logs.pop();
                }
                TxEntry::RefundAdd(delta) => {
                    self.refund = self.refund.saturating_sub(delta);
                }
                TxEntry::RefundSub(delta) => {
                    self.refund = self.refund.saturating_add(delta);
                }
                TxEntry::Created(address) => {
                    self.created.remove(&address);
                }
                TxEntry::SelfdestructMark(address) => {
                    self.selfdestructs.remove(&address);
                }
            }
        }
        self.transient.revert()
    }

    /// Clears all transaction-scoped data. Called between transactions.
    pub fn finish_tx(&mut self) {
        self.journal = Journal::new();
        self.transient.clear();
        self.warm_addresses.clear();
        self.warm_slots.clear();
        self.created.clear();
        self.selfdestructs.clear();
        self.logs.clear();
        self.refund = 0;
        self.original_storage.clear();
    }

    // =========================================================================
    // ACCOUNTS / STORAGE / CODE
    // =========================================================================

    /// Reads an account from the backend.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get_account(&self, address: Address) -> Result<Option<Account>, StateError> {
        self.backend.get_account(address).await
    }

    /// Balance of an account, zero if absent.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get_balance(&self, address: Address) -> Result<U256, StateError> {
        Ok(self
            .get_account(address)
            .await?
            .map_or_else(U256::zero, |a| a.balance))
    }

    /// Nonce of an account, zero if absent.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get_nonce(&self, address: Address) -> Result<u64, StateError> {
        Ok(self.get_account(address).await?.map_or(0, |a| a.nonce))
    }

    /// Writes an account record.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn put_account(
        &mut self,
        address: Address,
        account: Option<Account>,
    ) -> Result<(), StateError> {
        self.backend.put_account(address, account).await
    }

    /// Deletes an account and its storage.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn delete_account(&mut self, address: Address) -> Result<(), StateError> {
        self.backend.delete_account(address).await
    }

    /// Adds to an account's balance, creating it if absent.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let balance = self.get_balance(address).await?;
        self.backend
            .modify_account_fields(
                address,
                AccountFields {
                    balance: Some(balance.saturating_add(amount)),
                    ..AccountFields::default()
                },
            )
            .await
    }

    /// Subtracts from an account's balance (saturating; callers check funds).
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let balance = self.get_balance(address).await?;
        self.backend
            .modify_account_fields(
                address,
                AccountFields {
                    balance: Some(balance.saturating_sub(amount)),
                    ..AccountFields::default()
                },
            )
            .await
    }

    /// Bumps an account's nonce by one.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        let nonce = self.get_nonce(address).await?;
        self.backend
            .modify_account_fields(
                address,
                AccountFields {
                    nonce: Some(nonce + 1),
                    ..AccountFields::default()
                },
            )
            .await
    }

    /// Reads contract code.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get_code(&self, address: Address) -> Result<Bytes, StateError> {
        self.backend.get_contract_code(address).await
    }

    /// Stores contract code.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn put_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        self.backend.put_contract_code(address, code).await
    }

    /// Reads a storage slot.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        self.backend.get_contract_storage(address, key).await
    }

    /// Writes a storage slot.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn put_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        self.backend.put_contract_storage(address, key, value).await
    }

    /// The value a slot held at the start of the transaction. Cached on
    /// first access; SSTORE net metering depends on it.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get_original_storage(
        &mut self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        if let Some(value) = self.original_storage.get(&(address, key)) {
            return Ok(*value);
        }
        let value = self.get_storage(address, key).await?;
        self.original_storage.insert((address, key), value);
        Ok(value)
    }

    /// Clears an account's storage (CREATE onto an address with storage).
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn clear_storage(&mut self, address: Address) -> Result<(), StateError> {
        self.backend.clear_contract_storage(address).await
    }

    /// State root of the backend.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn state_root(&self) -> Result<Hash, StateError> {
        self.backend.get_state_root().await
    }

    // =========================================================================
    // WARM SETS (EIP-2929)
    // =========================================================================

    /// Warms an address; returns true if it was cold.
    pub fn add_warmed_address(&mut self, address: Address) -> bool {
        let was_cold = self.warm_addresses.insert(address);
        if was_cold {
            self.journal.record(TxEntry::WarmAddress(address));
        }
        was_cold
    }

    /// Returns true if the address is warm.
    #[must_use]
    pub fn is_warm_address(&self, address: Address) -> bool {
        self.warm_addresses.contains(&address)
    }

    /// Warms a storage slot; returns true if it was cold.
    pub fn add_warmed_slot(&mut self, address: Address, key: StorageKey) -> bool {
        let was_cold = self.warm_slots.insert((address, key));
        if was_cold {
            self.journal.record(TxEntry::WarmSlot(address, key));
        }
        was_cold
    }

    /// Returns true if the slot is warm.
    #[must_use]
    pub fn is_warm_slot(&self, address: Address, key: StorageKey) -> bool {
        self.warm_slots.contains(&(address, key))
    }

    // =========================================================================
    // CREATED / SELFDESTRUCT SETS (EIP-6780)
    // =========================================================================

    /// Marks an address as created in this transaction.
    pub fn mark_created(&mut self, address: Address) {
        if self.created.insert(address) {
            self.journal.record(TxEntry::Created(address));
        }
    }

    /// Returns true if the address was created in this transaction.
    #[must_use]
    pub fn is_created(&self, address: Address) -> bool {
        self.created.contains(&address)
    }

    /// The created-addresses set.
    #[must_use]
    pub fn created_addresses(&self) -> &HashSet<Address> {
        &self.created
    }

    /// Marks an address for selfdestruct.
    pub fn mark_selfdestruct(&mut self, address: Address) {
        if self.selfdestructs.insert(address) {
            self.journal.record(TxEntry::SelfdestructMark(address));
        }
    }

    /// The selfdestruct set.
    #[must_use]
    pub fn selfdestruct_set(&self) -> &HashSet<Address> {
        &self.selfdestructs
    }

    // =========================================================================
    // LOGS AND REFUNDS
    // =========================================================================

    /// Appends a log.
    pub fn add_log(&mut self, log: Log) {
        self.logs.push(log);
        self.journal.record(TxEntry::LogAppended);
    }

    /// Logs emitted so far.
    #[must_use]
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Takes ownership of the logs.
    pub fn take_logs(&mut self) -> Vec<Log> {
        std::mem::take(&mut self.logs)
    }

    /// Adds to the refund counter.
    pub fn add_refund(&mut self, amount: u64) {
        self.refund = self.refund.saturating_add(amount);
        self.journal.record(TxEntry::RefundAdd(amount));
    }

    /// Subtracts from the refund counter.
    pub fn sub_refund(&mut self, amount: u64) {
        self.refund = self.refund.saturating_sub(amount);
        self.journal.record(TxEntry::RefundSub(amount));
    }

    /// The accumulated refund.
    #[must_use]
    pub fn refund(&self) -> u64 {
        self.refund
    }

    // =========================================================================
    // TRANSIENT STORAGE (EIP-1153)
    // =========================================================================

    /// Reads transient storage.
    #[must_use]
    pub fn transient_load(&self, address: Address, key: StorageKey) -> StorageValue {
        self.transient.load(address, key)
    }

    /// Writes transient storage.
    pub fn transient_store(&mut self, address: Address, key: StorageKey, value: StorageValue) {
        self.transient.store(address, key, value);
    }
}

// =============================================================================
// TESTS
// =============================================================================
