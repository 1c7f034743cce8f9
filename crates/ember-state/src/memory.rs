//! # In-Memory Backends
//!
//! HashMap-backed implementations of the state and blockchain ports, used by
//! tests, the dev miner, and pending-block simulation. The account/storage
//! maps are guarded by a lock and shared between shallow copies; the undo
//! journal makes checkpoint/commit/revert exact.
//!
//! The state root is a flat digest over the sorted maps, not a
//! Merkle-Patricia commitment.

use crate::errors::StateError;
use crate::journal::Journal;
use crate::ports::{AccountFields, Blockchain, StateManager};
use async_trait::async_trait;
use ember_crypto::keccak256;
use ember_types::{
    Account, Address, Block, BlockHeader, Bytes, Hash, StorageKey, StorageValue, KECCAK_EMPTY,
    U256,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum StateEntry {
    AccountPut {
        address: Address,
        previous: Option<Account>,
    },
    StoragePut {
        address: Address,
        key: StorageKey,
        previous: StorageValue,
    },
    StorageCleared {
        address: Address,
        slots: Vec<(StorageKey, StorageValue)>,
    },
}

#[derive(Clone, Default)]
struct Store {
    accounts: HashMap<Address, Account>,
    storage: HashMap<(Address, StorageKey), StorageValue>,
    code: HashMap<Hash, Bytes>,
    journal: Journal<StateEntry>,
    snapshots: HashMap<Hash, Snapshot>,
}

#[derive(Clone, Default)]
struct Snapshot {
    accounts: HashMap<Address, Account>,
    storage: HashMap<(Address, StorageKey), StorageValue>,
    code: HashMap<Hash, Bytes>,
}

impl Store {
    fn flat_digest(&self) -> Hash {
        let mut accounts: Vec<_> = self.accounts.iter().collect();
        accounts.sort_by_key(|(address, _)| **address);
        let mut storage: Vec<_> = self
            .storage
            .iter()
            .filter(|(_, value)| !value.is_zero())
            .collect();
        storage.sort_by_key(|((address, key), _)| (*address, *key));

        let mut preimage = Vec::new();
        for (address, account) in accounts {
            preimage.extend_from_slice(address.as_bytes());
            preimage.extend_from_slice(&account.nonce.to_be_bytes());
            preimage.extend_from_slice(&ember_types::u256_to_be_bytes(account.balance));
            preimage.extend_from_slice(account.code_hash.as_bytes());
        }
        for ((address, key), value) in storage {
            preimage.extend_from_slice(address.as_bytes());
            preimage.extend_from_slice(key.as_bytes());
            preimage.extend_from_slice(value.as_bytes());
        }
        keccak256(&preimage)
    }

    fn undo(&mut self, entry: StateEntry) {
        match entry {
            StateEntry::AccountPut { address, previous } => match previous {
                Some(account) => {
                    self.accounts.insert(address, account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            },
            StateEntry::StoragePut {
                address,
                key,
                previous,
            } => {
                if previous.is_zero() {
                    self.storage.remove(&(address, key));
                } else {
                    self.storage.insert((address, key), previous);
                }
            }
            StateEntry::StorageCleared { address, slots } => {
                for (key, value) in slots {
                    self.storage.insert((address, key), value);
                }
            }
        }
    }
}

/// In-memory [`StateManager`]. Cheap to clone: shallow copies share the store.
#[derive(Clone, Default)]
pub struct MemoryStateManager {
    store: Arc<RwLock<Store>>,
}

impl MemoryStateManager {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/dev helper: seed an account without journaling.
    pub fn seed_account(&self, address: Address, account: Account) {
        self.store.write().accounts.insert(address, account);
    }

    /// Test/dev helper: seed a storage slot without journaling.
    pub fn seed_storage(&self, address: Address, key: StorageKey, value: StorageValue) {
        self.store.write().storage.insert((address, key), value);
    }

    /// Test/dev helper: seed code without journaling.
    pub fn seed_code(&self, address: Address, code: Bytes) {
        let mut store = self.store.write();
        let code_hash = keccak256(code.as_slice());
        let entry = store.accounts.entry(address).or_default();
        entry.code_hash = code_hash;
        store.code.insert(code_hash, code);
    }

    fn record_account(&self, store: &mut Store, address: Address) {
        let previous = store.accounts.get(&address).copied();
        store.journal.record(StateEntry::AccountPut { address, previous });
    }
}

#[async_trait]
impl StateManager for MemoryStateManager {
    async fn get_account(&self, address: Address) -> Result<Option<Account>, StateError> {
        Ok(self.store.read().accounts.get(&address).copied())
    }

    async fn put_account(
        &mut self,
        address: Address,
        account: Option<Account>,
    ) -> Result<(), StateError> {
        let mut store = self.store.write();
        self.record_account(&mut store, address);
        match account {
            Some(account) => {
                store.accounts.insert(address, account);
            }
            None => {
                store.accounts.remove(&address);
            }
        }
        Ok(())
    }

    async fn delete_account(&mut self, address: Address) -> Result<(), StateError> {
        let mut store = self.store.write();
        self.record_account(&mut store, address);
        store.accounts.remove(&address);

        let slots: Vec<_> = store
            .storage
            .iter()
            .filter(|((slot_address, _), _)| *slot_address == address)
            .map(|((_, key), value)| (*key, *value))
            .collect();
        store.storage.retain(|(slot_address, _), _| *slot_address != address);
        store
            .journal
            .record(StateEntry::StorageCleared { address, slots });
        Ok(())
    }

    async fn modify_account_fields(
        &mut self,
        address: Address,
        fields: AccountFields,
    ) -> Result<(), StateError> {
        let mut store = self.store.write();
        self.record_account(&mut store, address);
        let account = store.accounts.entry(address).or_default();
        if let Some(nonce) = fields.nonce {
            account.nonce = nonce;
        }
        if let Some(balance) = fields.balance {
            account.balance = balance;
        }
        if let Some(code_hash) = fields.code_hash {
            account.code_hash = code_hash;
        }
        if let Some(storage_root) = fields.storage_root {
            account.storage_root = storage_root;
        }
        Ok(())
    }

    async fn put_contract_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        let mut store = self.store.write();
        self.record_account(&mut store, address);
        let code_hash = if code.is_empty() {
            KECCAK_EMPTY
        } else {
            keccak256(code.as_slice())
        };
        store.accounts.entry(address).or_default().code_hash = code_hash;
        if code_hash != KECCAK_EMPTY {
            store.code.insert(code_hash, code);
        }
        Ok(())
    }

    async fn get_contract_code(&self, address: Address) -> Result<Bytes, StateError> {
        let store = self.store.read();
        let Some(account) = store.accounts.get(&address) else {
            return Ok(Bytes::new());
        };
        Ok(store
            .code
            .get(&account.code_hash)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_contract_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError> {
        Ok(self
            .store
            .read()
            .storage
            .get(&(address, key))
            .copied()
            .unwrap_or(StorageValue::ZERO))
    }

    async fn put_contract_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError> {
        let mut store = self.store.write();
        let previous = store
            .storage
            .get(&(address, key))
            .copied()
            .unwrap_or(StorageValue::ZERO);
        store.journal.record(StateEntry::StoragePut {
            address,
            key,
            previous,
        });
        if value.is_zero() {
            store.storage.remove(&(address, key));
        } else {
            store.storage.insert((address, key), value);
        }
        Ok(())
    }

    async fn clear_contract_storage(&mut self, address: Address) -> Result<(), StateError> {
        let mut store = self.store.write();
        let slots: Vec<_> = store
            .storage
            .iter()
            .filter(|((slot_address, _), _)| *slot_address == address)
            .map(|((_, key), value)| (*key, *value))
            .collect();
        store.storage.retain(|(slot_address, _), _| *slot_address != address);
        store
            .journal
            .record(StateEntry::StorageCleared { address, slots });
        Ok(())
    }

    async fn checkpoint(&mut self) -> Result<(), StateError> {
        self.store.write().journal.checkpoint();
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StateError> {
        self.store.write().journal.commit()
    }

    async fn revert(&mut self) -> Result<(), StateError> {
        let mut store = self.store.write();
        let entries = store.journal.revert()?;
        for entry in entries {
            store.undo(entry);
        }
        Ok(())
    }

    async fn get_state_root(&self) -> Result<Hash, StateError> {
        let mut store = self.store.write();
        let root = store.flat_digest();
        let snapshot = Snapshot {
            accounts: store.accounts.clone(),
            storage: store.storage.clone(),
            code: store.code.clone(),
        };
        store.snapshots.insert(root, snapshot);
        Ok(root)
    }

    async fn set_state_root(&mut self, root: Hash) -> Result<(), StateError> {
        let mut store = self.store.write();
        let snapshot = store
            .snapshots
            .get(&root)
            .cloned()
            .ok_or(StateError::UnknownStateRoot)?;
        store.accounts = snapshot.accounts;
        store.storage = snapshot.storage;
        store.code = snapshot.code;
        store.journal = Journal::new();
        Ok(())
    }

    fn shallow_copy(&self) -> Box<dyn StateManager> {
        Box::new(self.clone())
    }
}

/// Deep-copies a state manager's current contents into an isolated instance.
///
/// Pending-block simulation executes against such a copy so the canonical
/// state never observes speculative writes.
pub async fn fork_state(state: &MemoryStateManager) -> MemoryStateManager {
    let store = state.store.read();
    let forked = Store {
        accounts: store.accounts.clone(),
        storage: store.storage.clone(),
        code: store.code.clone(),
        journal: Journal::new(),
        snapshots: HashMap::new(),
    };
    MemoryStateManager {
        store: Arc::new(RwLock::new(forked)),
    }
}

// =============================================================================
// IN-MEMORY BLOCKCHAIN
// =============================================================================

#[derive(Default)]
struct ChainStore {
    by_number: HashMap<u64, Block>,
    by_hash: HashMap<Hash, Block>,
    total_difficulty: HashMap<Hash, U256>,
    head: Option<Hash>,
}

/// In-memory [`Blockchain`] used by tests and the dev assembler.
#[derive(Clone, Default)]
pub struct MemoryBlockchain {
    store: Arc<RwLock<ChainStore>>,
}

impl MemoryBlockchain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain seeded with a genesis block.
    #[must_use]
    pub fn with_genesis(genesis: Block) -> Self {
        let chain = Self::new();
        {
            let mut store = chain.store.write();
            let hash = genesis.hash();
            store
                .total_difficulty
                .insert(hash, genesis.header.difficulty);
            store.by_number.insert(genesis.number(), genesis.clone());
            store.by_hash.insert(hash, genesis);
            store.head = Some(hash);
        }
        chain
    }
}

#[async_trait]
impl Blockchain for MemoryBlockchain {
    async fn get_block_by_number(&self, number: u64) -> Result<Option<Block>, StateError> {
        Ok(self.store.read().by_number.get(&number).cloned())
    }

    async fn get_block_by_hash(&self, hash: Hash) -> Result<Option<Block>, StateError> {
        Ok(self.store.read().by_hash.get(&hash).cloned())
    }

    async fn put_block(&mut self, block: Block) -> Result<(), StateError> {
        let mut store = self.store.write();
        let hash = block.hash();
        let parent_td = store
            .total_difficulty
            .get(&block.header.parent_hash)
            .copied()
            .unwrap_or_default();
        store
            .total_difficulty
            .insert(hash, parent_td + block.header.difficulty);
        store.by_number.insert(block.number(), block.clone());
        store.by_hash.insert(hash, block);
        store.head = Some(hash);
        Ok(())
    }

    async fn get_total_difficulty(&self, hash: Hash) -> Result<U256, StateError> {
        Ok(self
            .store
            .read()
            .total_difficulty
            .get(&hash)
            .copied()
            .unwrap_or_default())
    }

    async fn get_canonical_head_header(&self) -> Result<BlockHeader, StateError> {
        self.get_canonical_head_block().await.map(|b| b.header)
    }

    async fn get_canonical_head_block(&self) -> Result<Block, StateError> {
        let store = self.store.read();
        store
            .head
            .and_then(|hash| store.by_hash.get(&hash).cloned())
            .ok_or_else(|| StateError::Backend("empty chain".to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    #[tokio::test]
    async fn revert_restores_accounts_and_storage() {
        let mut state = MemoryStateManager::new();
        state.seed_account(addr(1), Account::new_eoa(U256::from(100), 0));

        state.checkpoint().await.unwrap();
        state
            .modify_account_fields(
                addr(1),
                AccountFields {
                    balance: Some(U256::from(50)),
                    ..AccountFields::default()
                },
            )
            .await
            .unwrap();
        state
            .put_contract_storage(addr(1), StorageKey::new([9; 32]), StorageValue::new([7; 32]))
            .await
            .unwrap();
        state.revert().await.unwrap();

        let account = state.get_account(addr(1)).await.unwrap().unwrap();
        assert_eq!(account.balance, U256::from(100));
        assert_eq!(
            state
                .get_contract_storage(addr(1), StorageKey::new([9; 32]))
                .await
                .unwrap(),
            StorageValue::ZERO
        );
    }

    #[tokio::test]
    async fn commit_equals_sequential_application() {
        let mut state = MemoryStateManager::new();
        state.checkpoint().await.unwrap();
        state
            .put_account(addr(2), Some(Account::new_eoa(U256::from(7), 1)))
            .await
            .unwrap();
        state.checkpoint().await.unwrap();
        state
            .modify_account_fields(
                addr(2),
                AccountFields {
                    nonce: Some(2),
                    ..AccountFields::default()
                },
            )
            .await
            .unwrap();
        state.commit().await.unwrap();
        state.commit().await.unwrap();

        let account = state.get_account(addr(2)).await.unwrap().unwrap();
        assert_eq!(account.nonce, 2);
        assert_eq!(account.balance, U256::from(7));
    }

    #[tokio::test]
    async fn delete_account_clears_storage_and_reverts() {
        let mut state = MemoryStateManager::new();
        state.seed_account(addr(3), Account::new_eoa(U256::from(1), 0));
        state.checkpoint().await.unwrap();
        state
            .put_contract_storage(addr(3), StorageKey::new([1; 32]), StorageValue::new([1; 32]))
            .await
            .unwrap();
        state.commit().await.unwrap();

        state.checkpoint().await.unwrap();
        state.delete_account(addr(3)).await.unwrap();
        assert!(state.get_account(addr(3)).await.unwrap().is_none());
        state.revert().await.unwrap();

        assert!(state.get_account(addr(3)).await.unwrap().is_some());
        assert_eq!(
            state
                .get_contract_storage(addr(3), StorageKey::new([1; 32]))
                .await
                .unwrap(),
            StorageValue::new([1; 32])
        );
    }

    #[tokio::test]
    async fn state_root_round_trips_through_snapshot() {
        let mut state = MemoryStateManager::new();
        state.seed_account(addr(4), Account::new_eoa(U256::from(5), 0));
        let root = state.get_state_root().await.unwrap();

        state
            .put_account(addr(5), Some(Account::new_eoa(U256::from(9), 0)))
            .await
            .unwrap();
        assert_ne!(state.get_state_root().await.unwrap(), root);

        state.set_state_root(root).await.unwrap();
        assert!(state.get_account(addr(5)).await.unwrap().is_none());
        assert_eq!(state.get_state_root().await.unwrap(), root);
    }

    #[tokio::test]
    async fn shallow_copy_shares_the_store() {
        let state = MemoryStateManager::new();
        state.seed_account(addr(6), Account::new_eoa(U256::from(1), 0));
        let copy = state.shallow_copy();
        assert!(copy.get_account(addr(6)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn forked_state_is_isolated() {
        let state = MemoryStateManager::new();
        state.seed_account(addr(7), Account::new_eoa(U256::from(1), 0));
        let mut fork = fork_state(&state).await;
        fork.put_account(addr(8), Some(Account::default())).await.unwrap();

        assert!(state.get_account(addr(8)).await.unwrap().is_none());
        assert!(fork.get_account(addr(7)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn blockchain_tracks_head_and_difficulty() {
        let genesis = Block::new(
            BlockHeader {
                difficulty: U256::from(100),
                ..BlockHeader::default()
            },
            vec![],
            None,
        );
        let genesis_hash = genesis.hash();
        let mut chain = MemoryBlockchain::with_genesis(genesis);

        let child = Block::new(
            BlockHeader {
                parent_hash: genesis_hash,
                number: 1,
                difficulty: U256::from(50),
                ..BlockHeader::default()
            },
            vec![],
            None,
        );
        let child_hash = child.hash();
        chain.put_block(child).await.unwrap();

        assert_eq!(
            chain.get_total_difficulty(child_hash).await.unwrap(),
            U256::from(150)
        );
        assert_eq!(chain.get_canonical_head_header().await.unwrap().number, 1);
        assert!(chain.get_block_by_number(0).await.unwrap().is_some());
    }
}
