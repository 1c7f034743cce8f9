//! # The EVM
//!
//! Owns the rule set, the journaled state, and the rule-derived tables, and
//! drives message dispatch: `run_call` for one message, `run_code` for raw
//! bytecode, `run_tx` for a full signed transaction with fee accounting.
//!
//! Tables are rebuilt whenever the owned `Common` reports a new generation,
//! so `set_hardfork` invalidates them before the next run.

use crate::eof;
use crate::errors::VmError;
use crate::interpreter::Interpreter;
use crate::message::{
    BlockEnv, CallResult, EvmOpts, ExecResult, FrameOutcome, FrameResult, Message, TxEnv, TxResult,
};
use crate::precompiles::run_builtin;
use crate::table::{
    CustomPrecompile, OpcodeOverride, OpcodeTable, PrecompileEntry, PrecompileTable, Tables,
};
use crate::gas;
use ember_common::{Common, Hardfork, ParamTopic};
use ember_crypto::{keccak256, provider_installed};
use ember_state::{Blockchain, JournaledState, StateManager};
use ember_tx::{Transaction, TypedTransaction};
use ember_types::{Address, Bytes, Hash, Receipt, U256};
use rlp::RlpStream;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, trace};

/// CREATE address: `keccak(rlp([caller, nonce]))[12..]`.
#[must_use]
pub fn create_address(caller: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&caller).append(&nonce);
    let digest = keccak256(&stream.out());
    Address::from_slice(&digest.as_bytes()[12..]).expect("20 bytes")
}

/// CREATE2 address: `keccak(0xff ‖ caller ‖ salt ‖ keccak(initcode))[12..]`.
#[must_use]
pub fn create2_address(caller: Address, salt: Hash, initcode: &[u8]) -> Address {
    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xff);
    preimage.extend_from_slice(caller.as_bytes());
    preimage.extend_from_slice(salt.as_bytes());
    preimage.extend_from_slice(keccak256(initcode).as_bytes());
    let digest = keccak256(&preimage);
    Address::from_slice(&digest.as_bytes()[12..]).expect("20 bytes")
}

/// Inputs for `run_code`.
#[derive(Clone, Debug, Default)]
pub struct CodeOpts {
    /// Bytecode to execute.
    pub code: Bytes,
    /// Calldata.
    pub data: Bytes,
    /// Gas budget.
    pub gas_limit: u64,
    /// Context address.
    pub address: Address,
    /// Caller address.
    pub caller: Address,
    /// Apparent value.
    pub value: U256,
}

/// The execution engine.
pub struct Evm {
    pub(crate) common: Common,
    pub(crate) state: JournaledState,
    pub(crate) block: BlockEnv,
    pub(crate) tx_env: TxEnv,
    pub(crate) opts: EvmOpts,
    pub(crate) tables: Tables,
    pub(crate) blockchain: Option<Box<dyn Blockchain>>,
    overrides: Vec<OpcodeOverride>,
    customs: BTreeMap<Address, Option<CustomPrecompile>>,
    tables_generation: u64,
}

impl Evm {
    /// Builds an EVM over a state backend.
    ///
    /// # Errors
    ///
    /// `CryptoNotInitialized` when the active rules include EIP-2537 or
    /// EIP-4844 and no crypto provider has been installed.
    pub fn new(
        common: Common,
        backend: Box<dyn StateManager>,
        block: BlockEnv,
    ) -> Result<Self, VmError> {
        if (common.is_activated_eip(4844) || common.is_activated_eip(2537))
            && !provider_installed()
        {
            return Err(VmError::CryptoNotInitialized);
        }
        let tables = Tables {
            opcodes: OpcodeTable::for_rules(&common, &[]),
            precompiles: PrecompileTable::for_rules(&common, &BTreeMap::new()),
        };
        let tables_generation = common.generation();
        Ok(Self {
            common,
            state: JournaledState::new(backend),
            block,
            tx_env: TxEnv::default(),
            opts: EvmOpts::default(),
            tables,
            blockchain: None,
            overrides: Vec::new(),
            customs: BTreeMap::new(),
            tables_generation,
        })
    }

    /// Sets construction options.
    #[must_use]
    pub fn with_opts(mut self, opts: EvmOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Attaches a chain-history backend for the BLOCKHASH opcode.
    #[must_use]
    pub fn with_blockchain(mut self, blockchain: Box<dyn Blockchain>) -> Self {
        self.blockchain = Some(blockchain);
        self
    }

    /// Installs, replaces, or (with `None`) deletes a custom precompile.
    pub fn set_custom_precompile(&mut self, address: Address, body: Option<CustomPrecompile>) {
        self.customs.insert(address, body);
        self.rebuild_tables();
    }

    /// Installs an opcode override.
    pub fn set_opcode_override(&mut self, over: OpcodeOverride) {
        self.overrides.push(over);
        self.rebuild_tables();
    }

    /// The rule set.
    #[must_use]
    pub fn common(&self) -> &Common {
        &self.common
    }

    /// Switches hardfork; tables rebuild before the next run.
    pub fn set_hardfork(&mut self, hardfork: Hardfork) {
        self.common.set_hardfork(hardfork);
    }

    /// The journaled state handle.
    #[must_use]
    pub fn state(&self) -> &JournaledState {
        &self.state
    }

    /// Mutable access to the journaled state (seeding accounts in tests,
    /// applying withdrawals in the assembler).
    pub fn state_mut(&mut self) -> &mut JournaledState {
        &mut self.state
    }

    /// The block environment.
    #[must_use]
    pub fn block_env(&self) -> &BlockEnv {
        &self.block
    }

    /// Replaces the block environment (the assembler reuses one EVM across
    /// candidate blocks).
    pub fn set_block_env(&mut self, block: BlockEnv) {
        self.block = block;
    }

    fn rebuild_tables(&mut self) {
        self.tables = Tables {
            opcodes: OpcodeTable::for_rules(&self.common, &self.overrides),
            precompiles: PrecompileTable::for_rules(&self.common, &self.customs),
        };
        self.tables_generation = self.common.generation();
    }

    fn refresh_tables(&mut self) -> Result<(), VmError> {
        if self.tables_generation != self.common.generation() {
            debug!(generation = self.common.generation(), "rebuilding rule tables");
            self.rebuild_tables();
        }
        if (self.common.is_activated_eip(4844) || self.common.is_activated_eip(2537))
            && !provider_installed()
        {
            return Err(VmError::CryptoNotInitialized);
        }
        Ok(())
    }

    // =========================================================================
    // ENTRY POINTS
    // =========================================================================

    /// Runs one message against the current state.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only; execution faults are reported inside
    /// the result.
    pub async fn run_call(&mut self, message: Message) -> Result<CallResult, VmError> {
        self.refresh_tables()?;
        if message.depth == 0 && message.is_create() {
            self.state.increment_nonce(message.caller).await?;
        }
        let frame = self.execute_message(message).await?;
        Ok(CallResult {
            created_address: frame.created_address,
            exec: self.collect_exec(&frame),
        })
    }

    /// Runs raw bytecode without call/create dispatch around it.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only.
    pub async fn run_code(&mut self, opts: CodeOpts) -> Result<ExecResult, VmError> {
        self.refresh_tables()?;
        self.state.checkpoint().await?;
        let mut interpreter = Interpreter::new(
            opts.address,
            opts.caller,
            opts.value,
            opts.data,
            opts.code,
            opts.gas_limit,
            0,
            false,
        );
        let frame = match interpreter.run(self).await {
            Ok(()) => {
                let outcome = interpreter.outcome();
                if outcome == FrameOutcome::Success {
                    self.state.commit().await?;
                } else {
                    self.state.revert().await?;
                }
                FrameResult {
                    outcome,
                    gas_used: interpreter.gas_limit - interpreter.gas_remaining,
                    return_value: interpreter.output.clone(),
                    created_address: None,
                }
            }
            Err(VmError::State(error)) => return Err(VmError::State(error)),
            Err(error) => {
                self.state.revert().await?;
                FrameResult {
                    outcome: FrameOutcome::Exception(error),
                    gas_used: opts.gas_limit,
                    return_value: Bytes::new(),
                    created_address: None,
                }
            }
        };
        Ok(self.collect_exec(&frame))
    }

    fn collect_exec(&self, frame: &FrameResult) -> ExecResult {
        ExecResult {
            execution_gas_used: frame.gas_used,
            return_value: frame.return_value.clone(),
            exception: match &frame.outcome {
                FrameOutcome::Success => None,
                FrameOutcome::Revert => Some(VmError::Revert),
                FrameOutcome::Exception(error) => Some(error.clone()),
            },
            logs: self.state.logs().to_vec(),
            selfdestruct_set: self.state.selfdestruct_set().clone(),
            created_addresses: self.state.created_addresses().clone(),
            gas_refund: self.state.refund(),
        }
    }

    // =========================================================================
    // TRANSACTION RUNNER
    // =========================================================================

    /// Validates and executes a signed transaction: upfront charging, warm
    /// seeding, message execution, refund, coinbase payment, selfdestruct
    /// sweep, and receipt assembly.
    ///
    /// # Errors
    ///
    /// Transaction-validation errors surface here; execution faults are
    /// inside the result's `exec`.
    pub async fn run_tx(&mut self, tx: &TypedTransaction) -> Result<TxResult, VmError> {
        self.refresh_tables()?;

        let sender = tx.sender_address()?;
        let fee_market = self.common.is_activated_eip(1559);
        if fee_market && tx.max_fee_per_gas() < self.block.base_fee {
            return Err(VmError::FeeCapTooLow);
        }
        let base_fee = fee_market.then_some(self.block.base_fee);
        let effective_gas_price = match base_fee {
            Some(base) => base + tx.effective_priority_fee(base),
            None => tx.max_fee_per_gas(),
        };

        let account = self.state.get_account(sender).await?.unwrap_or_default();
        if !self.opts.skip_nonce && account.nonce != tx.nonce() {
            return Err(VmError::NonceMismatch {
                tx: tx.nonce(),
                account: account.nonce,
            });
        }

        let intrinsic = tx.intrinsic_gas(&self.common);
        if tx.gas_limit() < intrinsic {
            return Err(VmError::IntrinsicGasTooLow {
                limit: tx.gas_limit(),
                intrinsic,
            });
        }

        let blob_gas_used = tx.as_blob().map(|blob| blob.data_gas(&self.common));
        let mut blob_charge = U256::zero();
        if let Some(blob) = tx.as_blob() {
            if blob.max_fee_per_data_gas() < self.block.data_gas_price {
                return Err(VmError::FeeCapTooLow);
            }
            blob_charge = self.block.data_gas_price * U256::from(blob.data_gas(&self.common));
        }

        if !self.opts.skip_balance {
            let required = tx.upfront_cost(None, &self.common);
            if account.balance < required {
                return Err(VmError::InsufficientBalance {
                    required,
                    available: account.balance,
                });
            }
        }

        // Buy gas and bump the nonce.
        let gas_charge = effective_gas_price * U256::from(tx.gas_limit()) + blob_charge;
        self.state.sub_balance(sender, gas_charge).await?;
        self.state.increment_nonce(sender).await?;

        // Seed the warm sets (EIP-2929 scope: whole transaction).
        if self.common.is_activated_eip(2929) {
            let precompile_addresses: Vec<Address> =
                self.tables.precompiles.addresses().collect();
            for address in precompile_addresses {
                self.state.add_warmed_address(address);
            }
            self.state.add_warmed_address(sender);
            if let Some(to) = tx.to() {
                self.state.add_warmed_address(to);
            }
            if self.common.is_activated_eip(3651) {
                self.state.add_warmed_address(self.block.coinbase);
            }
            if let Some(list) = tx.access_list() {
                for item in list.iter() {
                    self.state.add_warmed_address(item.address);
                    for key in &item.storage_keys {
                        self.state.add_warmed_slot(item.address, *key);
                    }
                }
            }
        }

        self.tx_env = TxEnv {
            origin: sender,
            gas_price: effective_gas_price,
            versioned_hashes: tx
                .as_blob()
                .map(|blob| blob.versioned_hashes().to_vec())
                .unwrap_or_default(),
        };

        trace!(sender = %sender, nonce = tx.nonce(), gas_limit = tx.gas_limit(), "running transaction");

        let message = Message {
            caller: sender,
            to: tx.to(),
            value: tx.value(),
            data: tx.data().clone(),
            gas_limit: tx.gas_limit() - intrinsic,
            depth: 0,
            is_static: false,
            is_delegatecall: false,
            salt: None,
            code_address: None,
        };
        let frame = self.execute_message(message).await?;

        // Refund-capped gas settlement.
        let execution_gas_used = intrinsic + frame.gas_used;
        let refund = gas::capped_refund(&self.common, execution_gas_used, self.state.refund());
        let total_gas_spent = execution_gas_used - refund;
        let amount_spent = effective_gas_price * U256::from(total_gas_spent) + blob_charge;

        let leftover = U256::from(tx.gas_limit() - total_gas_spent) * effective_gas_price;
        self.state.add_balance(sender, leftover).await?;

        let tip_per_gas = if fee_market {
            effective_gas_price - self.block.base_fee
        } else {
            effective_gas_price
        };
        self.state
            .add_balance(self.block.coinbase, tip_per_gas * U256::from(total_gas_spent))
            .await?;

        // Sweep selfdestructed accounts (the set already honors EIP-6780).
        let doomed: Vec<Address> = self.state.selfdestruct_set().iter().copied().collect();
        for address in doomed {
            self.state.delete_account(address).await?;
        }

        let exec = self.collect_exec(&frame);
        let receipt = Receipt::new(
            tx.tx_type().byte(),
            exec.success(),
            total_gas_spent,
            exec.logs.clone(),
        );
        self.state.finish_tx();

        Ok(TxResult {
            receipt,
            exec,
            total_gas_spent,
            amount_spent,
            effective_gas_price,
            blob_gas_used,
            created_address: frame.created_address,
        })
    }

    // =========================================================================
    // MESSAGE DISPATCH
    // =========================================================================

    /// Executes one frame: checkpoint, create/call branch, commit or revert.
    /// Boxed for recursion through the interpreter's call opcodes.
    pub(crate) fn execute_message<'a>(
        &'a mut self,
        message: Message,
    ) -> Pin<Box<dyn Future<Output = Result<FrameResult, VmError>> + Send + 'a>> {
        Box::pin(async move {
            self.state.checkpoint().await?;
            let result = if message.is_create() {
                self.create_frame(message).await
            } else {
                self.call_frame(message).await
            };
            match result {
                Ok(frame) => {
                    if frame.outcome == FrameOutcome::Success {
                        self.state.commit().await?;
                    } else {
                        self.state.revert().await?;
                    }
                    Ok(frame)
                }
                Err(error) => {
                    self.state.revert().await?;
                    Err(error)
                }
            }
        })
    }

    async fn create_frame(&mut self, message: Message) -> Result<FrameResult, VmError> {
        let exceptional = |error: VmError, gas_limit: u64| FrameResult {
            outcome: FrameOutcome::Exception(error),
            gas_used: gas_limit,
            return_value: Bytes::new(),
            created_address: None,
        };

        // EIP-3860 length ceiling (the per-word gas was charged at the
        // opcode or intrinsic-gas site).
        if (self.common.gte_hardfork(Hardfork::Shanghai) || self.common.is_activated_eip(3860))
            && !self.opts.allow_unlimited_init_code
        {
            let max = self.common.param(ParamTopic::Vm, "maxInitCodeSize").as_usize();
            if message.data.len() > max {
                return Ok(exceptional(
                    VmError::InitcodeSizeViolation {
                        size: message.data.len(),
                        max,
                    },
                    message.gas_limit,
                ));
            }
        }

        // The caller's nonce was bumped before dispatch; derive from n - 1.
        let target = match message.salt {
            Some(salt) => create2_address(message.caller, salt, message.data.as_slice()),
            None => {
                let nonce = self.state.get_nonce(message.caller).await?;
                create_address(message.caller, nonce.saturating_sub(1))
            }
        };
        self.state.add_warmed_address(target);

        if let Some(existing) = self.state.get_account(target).await? {
            if existing.nonce > 0 || existing.has_code() {
                return Ok(exceptional(
                    VmError::CreateCollision(target),
                    message.gas_limit,
                ));
            }
        }

        self.state.mark_created(target);
        self.state.clear_storage(target).await?;

        if !message.value.is_zero() {
            let balance = self.state.get_balance(message.caller).await?;
            if balance < message.value {
                return Ok(exceptional(
                    VmError::InsufficientBalance {
                        required: message.value,
                        available: balance,
                    },
                    message.gas_limit,
                ));
            }
            self.state.sub_balance(message.caller, message.value).await?;
            self.state.add_balance(target, message.value).await?;
        }
        if self.common.gte_hardfork(Hardfork::SpuriousDragon) {
            self.state.increment_nonce(target).await?;
        }
        debug!(address = %target, depth = message.depth, "new contract");

        let mut interpreter = Interpreter::new(
            target,
            message.caller,
            message.value,
            Bytes::new(),
            message.data,
            message.gas_limit,
            message.depth,
            false,
        );
        match interpreter.run(self).await {
            Ok(()) => {}
            Err(VmError::State(error)) => return Err(VmError::State(error)),
            Err(error) => return Ok(exceptional(error, message.gas_limit)),
        }
        if interpreter.outcome() == FrameOutcome::Revert {
            return Ok(FrameResult {
                outcome: FrameOutcome::Revert,
                gas_used: message.gas_limit - interpreter.gas_remaining,
                return_value: interpreter.output.clone(),
                created_address: Some(target),
            });
        }

        // Code deposit and deployed-code validation.
        let mut code = interpreter.output.clone();
        let deposit = self
            .common
            .param(ParamTopic::GasPrices, "codeDepositCost")
            .as_u64()
            * code.len() as u64;
        if deposit > interpreter.gas_remaining {
            if self.common.gte_hardfork(Hardfork::Homestead) {
                return Ok(exceptional(VmError::CodestoreOutOfGas, message.gas_limit));
            }
            // Frontier dismisses the failure: the account exists with empty
            // code and the frame commits, keeping accumulated refunds.
            code = Bytes::new();
        } else if !code.is_empty() {
            interpreter.gas_remaining -= deposit;

            if self.common.gte_hardfork(Hardfork::SpuriousDragon) {
                let max = self.common.param(ParamTopic::Vm, "maxCodeSize").as_usize();
                if code.len() > max {
                    return Ok(exceptional(
                        VmError::CodesizeExceedsMax {
                            size: code.len(),
                            max,
                        },
                        message.gas_limit,
                    ));
                }
            }
            if code.as_slice()[0] == eof::EOF_PREFIX {
                if self.common.is_activated_eip(3540) {
                    let checked = if self.common.is_activated_eip(3670) {
                        eof::validate_container(code.as_slice(), &self.tables.opcodes).map(|_| ())
                    } else {
                        eof::parse_container(code.as_slice()).map(|_| ())
                    };
                    if let Err(error) = checked {
                        return Ok(exceptional(error, message.gas_limit));
                    }
                } else if self.common.is_activated_eip(3541) {
                    return Ok(exceptional(
                        VmError::InvalidBytecodeResult,
                        message.gas_limit,
                    ));
                }
            }
            self.state.put_code(target, code.clone()).await?;
        }

        Ok(FrameResult {
            outcome: FrameOutcome::Success,
            gas_used: message.gas_limit - interpreter.gas_remaining,
            return_value: code,
            created_address: Some(target),
        })
    }

    async fn call_frame(&mut self, message: Message) -> Result<FrameResult, VmError> {
        let to = message.to.expect("call frame has a target");

        if !message.is_delegatecall && !message.value.is_zero() {
            let balance = self.state.get_balance(message.caller).await?;
            if balance < message.value {
                return Ok(FrameResult {
                    outcome: FrameOutcome::Exception(VmError::InsufficientBalance {
                        required: message.value,
                        available: balance,
                    }),
                    gas_used: message.gas_limit,
                    return_value: Bytes::new(),
                    created_address: None,
                });
            }
            self.state.sub_balance(message.caller, message.value).await?;
            self.state.add_balance(to, message.value).await?;
        }

        let code_address = message.code_address.unwrap_or(to);

        if let Some(entry) = self.tables.precompiles.lookup(code_address).cloned() {
            let outcome = match entry {
                PrecompileEntry::Builtin(builtin) => run_builtin(
                    builtin,
                    message.data.as_slice(),
                    message.gas_limit,
                    &self.common,
                ),
                PrecompileEntry::Custom(body) => {
                    body(message.data.as_slice(), message.gas_limit, &self.common)
                }
            };
            return Ok(match outcome {
                crate::table::PrecompileOutcome::Success(output) => FrameResult {
                    outcome: FrameOutcome::Success,
                    gas_used: output.gas_used,
                    return_value: output.output,
                    created_address: None,
                },
                crate::table::PrecompileOutcome::OutOfGas => FrameResult {
                    outcome: FrameOutcome::Exception(VmError::OutOfGas),
                    gas_used: message.gas_limit,
                    return_value: Bytes::new(),
                    created_address: None,
                },
                crate::table::PrecompileOutcome::Failure(error) => FrameResult {
                    outcome: FrameOutcome::Exception(error),
                    gas_used: message.gas_limit,
                    return_value: Bytes::new(),
                    created_address: None,
                },
            });
        }

        let code = self.state.get_code(code_address).await?;
        if code.is_empty() {
            return Ok(FrameResult {
                outcome: FrameOutcome::Success,
                gas_used: 0,
                return_value: Bytes::new(),
                created_address: None,
            });
        }

        let mut interpreter = Interpreter::new(
            to,
            message.caller,
            message.value,
            message.data,
            code,
            message.gas_limit,
            message.depth,
            message.is_static,
        );
        match interpreter.run(self).await {
            Ok(()) => Ok(FrameResult {
                outcome: interpreter.outcome(),
                gas_used: message.gas_limit - interpreter.gas_remaining,
                return_value: interpreter.output.clone(),
                created_address: None,
            }),
            Err(VmError::State(error)) => Err(VmError::State(error)),
            Err(error) => Ok(FrameResult {
                outcome: FrameOutcome::Exception(error),
                gas_used: message.gas_limit,
                return_value: Bytes::new(),
                created_address: None,
            }),
        }
    }
}
