//! # State and Blockchain Ports
//!
//! The interfaces the EVM and block assembler consume. Backends (in-memory
//! here, disk-backed elsewhere) implement these traits; state reads are the
//! only suspension points of an execution.

use crate::errors::StateError;
use async_trait::async_trait;
use ember_types::{Account, Address, Block, BlockHeader, Bytes, Hash, StorageKey, StorageValue, U256};

/// Partial account update for `modify_account_fields`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccountFields {
    /// New nonce, if changing.
    pub nonce: Option<u64>,
    /// New balance, if changing.
    pub balance: Option<U256>,
    /// New code hash, if changing.
    pub code_hash: Option<Hash>,
    /// New storage root, if changing.
    pub storage_root: Option<Hash>,
}

/// The world-state interface consumed by the EVM.
#[async_trait]
pub trait StateManager: Send + Sync {
    /// Reads an account; `None` if it never existed.
    async fn get_account(&self, address: Address) -> Result<Option<Account>, StateError>;

    /// Writes (or with `None`, clears) an account record.
    async fn put_account(
        &mut self,
        address: Address,
        account: Option<Account>,
    ) -> Result<(), StateError>;

    /// Deletes an account and its storage.
    async fn delete_account(&mut self, address: Address) -> Result<(), StateError>;

    /// Applies a partial update, creating the account if absent.
    async fn modify_account_fields(
        &mut self,
        address: Address,
        fields: AccountFields,
    ) -> Result<(), StateError>;

    /// Stores contract code and updates the account's code hash.
    async fn put_contract_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError>;

    /// Reads contract code; empty for accounts without code.
    async fn get_contract_code(&self, address: Address) -> Result<Bytes, StateError>;

    /// Reads a storage slot; zero if unset.
    async fn get_contract_storage(
        &self,
        address: Address,
        key: StorageKey,
    ) -> Result<StorageValue, StateError>;

    /// Writes a storage slot (zero deletes).
    async fn put_contract_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), StateError>;

    /// Clears every storage slot of an account.
    async fn clear_contract_storage(&mut self, address: Address) -> Result<(), StateError>;

    /// Opens a checkpoint.
    async fn checkpoint(&mut self) -> Result<(), StateError>;

    /// Commits the youngest checkpoint into its parent.
    async fn commit(&mut self) -> Result<(), StateError>;

    /// Reverts to the youngest checkpoint.
    async fn revert(&mut self) -> Result<(), StateError>;

    /// A commitment over the current flat state.
    async fn get_state_root(&self) -> Result<Hash, StateError>;

    /// Restores a previously obtained state root.
    async fn set_state_root(&mut self, root: Hash) -> Result<(), StateError>;

    /// Duplicates handle metadata while sharing the underlying store.
    fn shallow_copy(&self) -> Box<dyn StateManager>;
}

/// Chain-history interface: headers and blocks by number or hash.
#[async_trait]
pub trait Blockchain: Send + Sync {
    /// Block by number.
    async fn get_block_by_number(&self, number: u64) -> Result<Option<Block>, StateError>;

    /// Block by hash.
    async fn get_block_by_hash(&self, hash: Hash) -> Result<Option<Block>, StateError>;

    /// Appends a block to the canonical chain.
    async fn put_block(&mut self, block: Block) -> Result<(), StateError>;

    /// Total difficulty accumulated at a block hash.
    async fn get_total_difficulty(&self, hash: Hash) -> Result<U256, StateError>;

    /// Header of the canonical head.
    async fn get_canonical_head_header(&self) -> Result<BlockHeader, StateError>;

    /// The canonical head block.
    async fn get_canonical_head_block(&self) -> Result<Block, StateError>;
}
