//! # Messages, Environments, and Results
//!
//! A `Message` is one call frame's worth of work. Frames move through
//! `Entered → Running → Halt{normal, revert, exception}`; only a normal halt
//! commits its checkpoint.

use crate::errors::VmError;
use ember_types::{Address, Bytes, Hash, Log, Receipt, U256};
use std::collections::HashSet;

/// Call-depth limit.
pub const CALL_DEPTH_LIMIT: u64 = 1024;

/// One EVM call frame's inputs.
#[derive(Clone, Debug)]
pub struct Message {
    /// Immediate caller of this frame.
    pub caller: Address,
    /// Target; `None` is a create.
    pub to: Option<Address>,
    /// Wei transferred (or the apparent value under DELEGATECALL).
    pub value: U256,
    /// Calldata, or initcode for creates.
    pub data: Bytes,
    /// Gas available to this frame.
    pub gas_limit: u64,
    /// Frame depth (0 for the outermost call).
    pub depth: u64,
    /// True inside STATICCALL.
    pub is_static: bool,
    /// True for DELEGATECALL frames (no value transfer, caller context).
    pub is_delegatecall: bool,
    /// CREATE2 salt.
    pub salt: Option<Hash>,
    /// Where the executed code lives when it differs from `to`
    /// (DELEGATECALL / CALLCODE).
    pub code_address: Option<Address>,
}

impl Message {
    /// A plain outermost call.
    #[must_use]
    pub fn call(caller: Address, to: Address, value: U256, data: Bytes, gas_limit: u64) -> Self {
        Self {
            caller,
            to: Some(to),
            value,
            data,
            gas_limit,
            depth: 0,
            is_static: false,
            is_delegatecall: false,
            salt: None,
            code_address: None,
        }
    }

    /// An outermost create.
    #[must_use]
    pub fn create(caller: Address, value: U256, initcode: Bytes, gas_limit: u64) -> Self {
        Self {
            caller,
            to: None,
            value,
            data: initcode,
            gas_limit,
            depth: 0,
            is_static: false,
            is_delegatecall: false,
            salt: None,
            code_address: None,
        }
    }

    /// True if this frame creates a contract.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

/// Terminal state of a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Normal halt; the frame's checkpoint commits.
    Success,
    /// REVERT: state rolled back, return data and remaining gas survive.
    Revert,
    /// Exceptional halt: all frame gas consumed, effects dropped.
    Exception(VmError),
}

/// What one frame hands back to its parent.
#[derive(Clone, Debug)]
pub(crate) struct FrameResult {
    pub outcome: FrameOutcome,
    pub gas_used: u64,
    pub return_value: Bytes,
    pub created_address: Option<Address>,
}

/// Result of executing a message to completion.
#[derive(Clone, Debug)]
pub struct ExecResult {
    /// Gas consumed by execution (before refunds are applied).
    pub execution_gas_used: u64,
    /// RETURN / REVERT payload, or deployed code for creates.
    pub return_value: Bytes,
    /// The exception, if the frame did not halt normally.
    pub exception: Option<VmError>,
    /// Logs emitted by surviving frames.
    pub logs: Vec<Log>,
    /// Addresses that executed SELFDESTRUCT.
    pub selfdestruct_set: HashSet<Address>,
    /// Addresses created during this execution.
    pub created_addresses: HashSet<Address>,
    /// Accumulated (uncapped) refund.
    pub gas_refund: u64,
}

impl ExecResult {
    /// True when the frame halted normally.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exception.is_none()
    }
}

/// Result of `run_call`.
#[derive(Clone, Debug)]
pub struct CallResult {
    /// Address of the created contract, for create messages.
    pub created_address: Option<Address>,
    /// The execution result.
    pub exec: ExecResult,
}

/// Result of `run_tx`.
#[derive(Clone, Debug)]
pub struct TxResult {
    /// The transaction receipt (cumulative gas covers this tx only).
    pub receipt: Receipt,
    /// The inner execution result.
    pub exec: ExecResult,
    /// Gas charged after the refund cap.
    pub total_gas_spent: u64,
    /// Wei deducted from the sender for gas.
    pub amount_spent: U256,
    /// The per-gas price actually paid.
    pub effective_gas_price: U256,
    /// Blob gas consumed (type-3 transactions).
    pub blob_gas_used: Option<u64>,
    /// Address of the created contract, for create transactions.
    pub created_address: Option<Address>,
}

/// Block-level environment visible to opcodes.
#[derive(Clone, Debug, Default)]
pub struct BlockEnv {
    /// Block height.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Fee recipient.
    pub coinbase: Address,
    /// Block gas ceiling.
    pub gas_limit: u64,
    /// Pre-merge difficulty (DIFFICULTY opcode).
    pub difficulty: U256,
    /// Post-merge randomness beacon (PREVRANDAO opcode).
    pub prev_randao: Hash,
    /// EIP-1559 base fee.
    pub base_fee: U256,
    /// EIP-4844 data-gas price derived from the parent's excess.
    pub data_gas_price: U256,
}

/// Transaction-level environment visible to opcodes.
#[derive(Clone, Debug, Default)]
pub struct TxEnv {
    /// Transaction origin (ORIGIN opcode).
    pub origin: Address,
    /// Effective gas price (GASPRICE opcode).
    pub gas_price: U256,
    /// Blob versioned hashes (BLOBHASH opcode).
    pub versioned_hashes: Vec<Hash>,
}

/// Knobs for constructing an EVM.
#[derive(Clone, Debug, Default)]
pub struct EvmOpts {
    /// Skip the EIP-3860 initcode length ceiling (the per-word gas is still
    /// charged).
    pub allow_unlimited_init_code: bool,
    /// Skip sender balance validation in `run_tx`.
    pub skip_balance: bool,
    /// Skip sender nonce validation in `run_tx`.
    pub skip_nonce: bool,
}
