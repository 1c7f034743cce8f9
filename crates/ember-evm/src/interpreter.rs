//! # Bytecode Interpreter
//!
//! One `Interpreter` drives one call frame: operand stack, frame memory,
//! program counter, and gas. State reads await the state port; calls and
//! creates recurse through [`crate::evm::Evm::execute_message`]. A frame
//! halts by STOP/RETURN (normal), REVERT, or an execution fault.

use crate::errors::VmError;
use crate::evm::Evm;
use crate::gas;
use crate::memory::Memory;
use crate::message::{FrameOutcome, Message, CALL_DEPTH_LIMIT};
use crate::opcodes::{analyze_jump_dests, Opcode};
use crate::stack::Stack;
use ember_common::{Hardfork, ParamTopic};
use ember_crypto::keccak256;
use ember_types::{u256_to_be_bytes, Address, Bytes, Hash, StorageKey, StorageValue, U256, U512};

/// Frame-local execution state.
pub(crate) struct Interpreter {
    /// Storage/context address of this frame.
    pub address: Address,
    /// Immediate caller.
    pub caller: Address,
    /// Apparent value.
    pub value: U256,
    /// Calldata for this frame.
    pub calldata: Bytes,
    /// Code being executed.
    pub code: Bytes,
    /// True inside STATICCALL.
    pub is_static: bool,
    /// Frame depth.
    pub depth: u64,
    pub(crate) pc: usize,
    pub(crate) stack: Stack,
    pub(crate) memory: Memory,
    pub(crate) return_data: Bytes,
    pub(crate) output: Bytes,
    pub(crate) gas_limit: u64,
    pub(crate) gas_remaining: u64,
    jump_dests: Vec<bool>,
    stopped: bool,
    reverted: bool,
}

impl Interpreter {
    pub(crate) fn new(
        address: Address,
        caller: Address,
        value: U256,
        calldata: Bytes,
        code: Bytes,
        gas_limit: u64,
        depth: u64,
        is_static: bool,
    ) -> Self {
        let jump_dests = analyze_jump_dests(code.as_slice());
        Self {
            address,
            caller,
            value,
            calldata,
            code,
            is_static,
            depth,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Bytes::new(),
            output: Bytes::new(),
            gas_limit,
            gas_remaining: gas_limit,
            jump_dests,
            stopped: false,
            reverted: false,
        }
    }

    /// The frame's terminal state after `run` returned `Ok`.
    pub(crate) fn outcome(&self) -> FrameOutcome {
        if self.reverted {
            FrameOutcome::Revert
        } else {
            FrameOutcome::Success
        }
    }

    fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        if amount > self.gas_remaining {
            self.gas_remaining = 0;
            return Err(VmError::OutOfGas);
        }
        self.gas_remaining -= amount;
        Ok(())
    }

    fn require_mutable(&self) -> Result<(), VmError> {
        if self.is_static {
            return Err(VmError::StaticStateChange);
        }
        Ok(())
    }

    /// Converts a `(offset, length)` word pair into usizes; any offset is
    /// legal when the length is zero.
    fn span(offset: U256, length: U256) -> Result<(usize, usize), VmError> {
        let length_usize = if length > U256::from(u32::MAX) {
            return Err(VmError::MemoryLimitExceeded {
                requested: usize::MAX,
            });
        } else {
            length.as_usize()
        };
        if length_usize == 0 {
            return Ok((0, 0));
        }
        if offset > U256::from(u32::MAX) {
            return Err(VmError::MemoryLimitExceeded {
                requested: usize::MAX,
            });
        }
        Ok((offset.as_usize(), length_usize))
    }

    fn expand_and_charge(&mut self, offset: usize, length: usize) -> Result<(), VmError> {
        let cost = self.memory.expand_region(offset, length)?;
        self.consume_gas(cost)
    }

    /// Runs the frame to a halt. `Err` carries execution faults; state-port
    /// failures surface as `VmError::State` and abort the whole run.
    pub(crate) async fn run(&mut self, evm: &mut Evm) -> Result<(), VmError> {
        while !self.stopped && self.pc < self.code.len() {
            let byte = self.code.as_slice()[self.pc];
            if !evm.tables.opcodes.is_enabled(byte) {
                return Err(VmError::InvalidOpcode(byte));
            }
            let opcode = Opcode::decode(byte).ok_or(VmError::InvalidOpcode(byte))?;
            self.consume_gas(evm.tables.opcodes.base_gas(byte))?;
            self.step(opcode, evm).await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    async fn step(&mut self, opcode: Opcode, evm: &mut Evm) -> Result<(), VmError> {
        self.pc += 1;

        match opcode {
            // =================================================================
            // ARITHMETIC
            // =================================================================
            Opcode::Stop => self.stopped = true,
            Opcode::Add => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(a.overflowing_add(b).0)?;
            }
            Opcode::Mul => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(a.overflowing_mul(b).0)?;
            }
            Opcode::Sub => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(a.overflowing_sub(b).0)?;
            }
            Opcode::Div => {
                let (a, b) = self.stack.pop2()?;
                self.stack
                    .push(if b.is_zero() { U256::zero() } else { a / b })?;
            }
            Opcode::SDiv => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(signed_div(a, b))?;
            }
            Opcode::Mod => {
                let (a, b) = self.stack.pop2()?;
                self.stack
                    .push(if b.is_zero() { U256::zero() } else { a % b })?;
            }
            Opcode::SMod => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(signed_mod(a, b))?;
            }
            Opcode::AddMod => {
                let (a, b, n) = self.stack.pop3()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    let sum = U512::from(a) + U512::from(b);
                    u512_low(sum % U512::from(n))
                };
                self.stack.push(result)?;
            }
            Opcode::MulMod => {
                let (a, b, n) = self.stack.pop3()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    let product = U512::from(a) * U512::from(b);
                    u512_low(product % U512::from(n))
                };
                self.stack.push(result)?;
            }
            Opcode::Exp => {
                let (base, exponent) = self.stack.pop2()?;
                self.consume_gas(gas::exp_gas(&evm.common, exponent))?;
                self.stack.push(exp_by_squaring(base, exponent))?;
            }
            Opcode::SignExtend => {
                let (k, x) = self.stack.pop2()?;
                // k >= 31 already covers the full width.
                let result = if k < U256::from(31) {
                    let bit_index = 8 * k.as_usize() + 7;
                    let mask = (U256::one() << (bit_index + 1)) - 1;
                    if x.bit(bit_index) {
                        x | !mask
                    } else {
                        x & mask
                    }
                } else {
                    x
                };
                self.stack.push(result)?;
            }

            // =================================================================
            // COMPARISON & BITWISE
            // =================================================================
            Opcode::Lt => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push_bool(a < b)?;
            }
            Opcode::Gt => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push_bool(a > b)?;
            }
            Opcode::SLt => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push_bool(signed_lt(a, b))?;
            }
            Opcode::SGt => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push_bool(signed_lt(b, a))?;
            }
            Opcode::Eq => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push_bool(a == b)?;
            }
            Opcode::IsZero => {
                let a = self.stack.pop()?;
                self.stack.push_bool(a.is_zero())?;
            }
            Opcode::And => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(a & b)?;
            }
            Opcode::Or => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(a | b)?;
            }
            Opcode::Xor => {
                let (a, b) = self.stack.pop2()?;
                self.stack.push(a ^ b)?;
            }
            Opcode::Not => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }
            Opcode::Byte => {
                let (i, x) = self.stack.pop2()?;
                let result = if i < U256::from(32) {
                    U256::from(u256_to_be_bytes(x)[i.as_usize()])
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }
            Opcode::Shl => {
                let (shift, value) = self.stack.pop2()?;
                let result = if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value << shift.as_usize()
                };
                self.stack.push(result)?;
            }
            Opcode::Shr => {
                let (shift, value) = self.stack.pop2()?;
                let result = if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value >> shift.as_usize()
                };
                self.stack.push(result)?;
            }
            Opcode::Sar => {
                let (shift, value) = self.stack.pop2()?;
                self.stack.push(arithmetic_shr(value, shift))?;
            }

            // =================================================================
            // KECCAK256
            // =================================================================
            Opcode::Keccak256 => {
                let (offset, length) = self.stack.pop2()?;
                let (offset, length) = Self::span(offset, length)?;
                self.expand_and_charge(offset, length)?;
                self.consume_gas(gas::keccak_gas(length))?;
                let digest = keccak256(&self.memory.read(offset, length));
                self.stack.push(digest.to_u256())?;
            }

            // =================================================================
            // ENVIRONMENT
            // =================================================================
            Opcode::Address => self.stack.push(self.address.to_u256())?,
            Opcode::Balance => {
                let address = Address::from_u256(self.stack.pop()?);
                let cold = evm.state.add_warmed_address(address);
                self.consume_gas(gas::account_access_gas(&evm.common, cold))?;
                let balance = evm.state.get_balance(address).await?;
                self.stack.push(balance)?;
            }
            Opcode::Origin => self.stack.push(evm.tx_env.origin.to_u256())?,
            Opcode::Caller => self.stack.push(self.caller.to_u256())?,
            Opcode::CallValue => self.stack.push(self.value)?,
            Opcode::CallDataLoad => {
                let offset = self.stack.pop()?;
                let mut word = [0u8; 32];
                if offset <= U256::from(u32::MAX) {
                    let offset = offset.as_usize();
                    for (i, byte) in word.iter_mut().enumerate() {
                        if let Some(value) = self.calldata.as_slice().get(offset + i) {
                            *byte = *value;
                        }
                    }
                }
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::CallDataSize => self.stack.push(U256::from(self.calldata.len()))?,
            Opcode::CallDataCopy => {
                let (dest, src, length) = self.stack.pop3()?;
                let (dest, length) = Self::span(dest, length)?;
                self.expand_and_charge(dest, length)?;
                self.consume_gas(gas::copy_gas(length))?;
                let bytes = sliced_padded(self.calldata.as_slice(), src, length);
                self.memory.write(dest, &bytes);
            }
            Opcode::CodeSize => self.stack.push(U256::from(self.code.len()))?,
            Opcode::CodeCopy => {
                let (dest, src, length) = self.stack.pop3()?;
                let (dest, length) = Self::span(dest, length)?;
                self.expand_and_charge(dest, length)?;
                self.consume_gas(gas::copy_gas(length))?;
                let bytes = sliced_padded(self.code.as_slice(), src, length);
                self.memory.write(dest, &bytes);
            }
            Opcode::GasPrice => self.stack.push(evm.tx_env.gas_price)?,
            Opcode::ExtCodeSize => {
                let address = Address::from_u256(self.stack.pop()?);
                let cold = evm.state.add_warmed_address(address);
                self.consume_gas(gas::account_access_gas(&evm.common, cold))?;
                let code = evm.state.get_code(address).await?;
                self.stack.push(U256::from(code.len()))?;
            }
            Opcode::ExtCodeCopy => {
                let address = Address::from_u256(self.stack.pop()?);
                let (dest, src, length) = self.stack.pop3()?;
                let cold = evm.state.add_warmed_address(address);
                self.consume_gas(gas::account_access_gas(&evm.common, cold))?;
                let (dest, length) = Self::span(dest, length)?;
                self.expand_and_charge(dest, length)?;
                self.consume_gas(gas::copy_gas(length))?;
                let code = evm.state.get_code(address).await?;
                let bytes = sliced_padded(code.as_slice(), src, length);
                self.memory.write(dest, &bytes);
            }
            Opcode::ReturnDataSize => self.stack.push(U256::from(self.return_data.len()))?,
            Opcode::ReturnDataCopy => {
                let (dest, src, length) = self.stack.pop3()?;
                let (dest, length) = Self::span(dest, length)?;
                let end = src
                    .checked_add(U256::from(length))
                    .ok_or(VmError::ReturnDataOutOfBounds)?;
                if end > U256::from(self.return_data.len()) {
                    return Err(VmError::ReturnDataOutOfBounds);
                }
                self.expand_and_charge(dest, length)?;
                self.consume_gas(gas::copy_gas(length))?;
                let src = src.as_usize();
                let bytes = self.return_data.as_slice()[src..src + length].to_vec();
                self.memory.write(dest, &bytes);
            }
            Opcode::ExtCodeHash => {
                let address = Address::from_u256(self.stack.pop()?);
                let cold = evm.state.add_warmed_address(address);
                self.consume_gas(gas::account_access_gas(&evm.common, cold))?;
                let hash = match evm.state.get_account(address).await? {
                    Some(account) if !account.is_empty() => account.code_hash.to_u256(),
                    _ => U256::zero(),
                };
                self.stack.push(hash)?;
            }

            // =================================================================
            // BLOCK
            // =================================================================
            Opcode::BlockHash => {
                let number = self.stack.pop()?;
                let current = evm.block.number;
                let mut hash = Hash::ZERO;
                if number < U256::from(current)
                    && number >= U256::from(current.saturating_sub(256))
                {
                    if let Some(chain) = &evm.blockchain {
                        if let Some(block) = chain.get_block_by_number(number.as_u64()).await? {
                            hash = block.hash();
                        }
                    }
                }
                self.stack.push(hash.to_u256())?;
            }
            Opcode::Coinbase => self.stack.push(evm.block.coinbase.to_u256())?,
            Opcode::Timestamp => self.stack.push(U256::from(evm.block.timestamp))?,
            Opcode::Number => self.stack.push(U256::from(evm.block.number))?,
            Opcode::PrevRandao => {
                // EIP-4399: DIFFICULTY returns the randomness beacon after
                // the merge.
                let value = if evm.common.is_activated_eip(4399) {
                    evm.block.prev_randao.to_u256()
                } else {
                    evm.block.difficulty
                };
                self.stack.push(value)?;
            }
            Opcode::GasLimit => self.stack.push(U256::from(evm.block.gas_limit))?,
            Opcode::ChainId => self.stack.push(U256::from(evm.common.chain_id()))?,
            Opcode::SelfBalance => {
                let balance = evm.state.get_balance(self.address).await?;
                self.stack.push(balance)?;
            }
            Opcode::BaseFee => self.stack.push(evm.block.base_fee)?,
            Opcode::BlobHash => {
                let index = self.stack.pop()?;
                let hash = if index < U256::from(evm.tx_env.versioned_hashes.len()) {
                    evm.tx_env.versioned_hashes[index.as_usize()].to_u256()
                } else {
                    U256::zero()
                };
                self.stack.push(hash)?;
            }

            // =================================================================
            // STACK, MEMORY, STORAGE, FLOW
            // =================================================================
            Opcode::Pop => {
                self.stack.pop()?;
            }
            Opcode::MLoad => {
                let offset = Self::span(self.stack.pop()?, U256::from(32))?.0;
                self.expand_and_charge(offset, 32)?;
                let word = self.memory.read_word(offset);
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::MStore => {
                let (offset, value) = self.stack.pop2()?;
                let offset = Self::span(offset, U256::from(32))?.0;
                self.expand_and_charge(offset, 32)?;
                self.memory.write(offset, &u256_to_be_bytes(value));
            }
            Opcode::MStore8 => {
                let (offset, value) = self.stack.pop2()?;
                let offset = Self::span(offset, U256::one())?.0;
                self.expand_and_charge(offset, 1)?;
                self.memory.write_byte(offset, value.byte(0));
            }
            Opcode::SLoad => {
                let key = StorageKey::from_u256(self.stack.pop()?);
                let cold = evm.state.add_warmed_slot(self.address, key);
                self.consume_gas(gas::sload_gas(&evm.common, cold))?;
                let value = evm.state.get_storage(self.address, key).await?;
                self.stack.push(value.to_u256())?;
            }
            Opcode::SStore => {
                self.require_mutable()?;
                if evm.common.gte_hardfork(Hardfork::Istanbul)
                    && self.gas_remaining <= gas::costs::SSTORE_SENTRY
                {
                    return Err(VmError::OutOfGas);
                }
                let (key, value) = self.stack.pop2()?;
                let key = StorageKey::from_u256(key);

                if evm.common.is_activated_eip(2929) && evm.state.add_warmed_slot(self.address, key)
                {
                    self.consume_gas(gas::costs::COLD_SLOAD)?;
                }
                let original = evm
                    .state
                    .get_original_storage(self.address, key)
                    .await?
                    .to_u256();
                let current = evm.state.get_storage(self.address, key).await?.to_u256();
                let (cost, refund) = gas::sstore_gas(&evm.common, original, current, value);
                self.consume_gas(cost)?;
                match refund.cmp(&0) {
                    std::cmp::Ordering::Greater => evm.state.add_refund(refund as u64),
                    std::cmp::Ordering::Less => evm.state.sub_refund(refund.unsigned_abs()),
                    std::cmp::Ordering::Equal => {}
                }
                evm.state
                    .put_storage(self.address, key, StorageValue::from_u256(value))
                    .await?;
            }
            Opcode::Jump => {
                let dest = self.stack.pop()?;
                self.jump_to(dest)?;
            }
            Opcode::JumpI => {
                let (dest, condition) = self.stack.pop2()?;
                if !condition.is_zero() {
                    self.jump_to(dest)?;
                }
            }
            Opcode::Pc => self.stack.push(U256::from(self.pc - 1))?,
            Opcode::MSize => self.stack.push(U256::from(self.memory.len()))?,
            Opcode::Gas => self.stack.push(U256::from(self.gas_remaining))?,
            Opcode::JumpDest => {}

            // =================================================================
            // TRANSIENT STORAGE (EIP-1153) & MCOPY (EIP-5656)
            // =================================================================
            Opcode::TLoad => {
                let key = StorageKey::from_u256(self.stack.pop()?);
                let value = evm.state.transient_load(self.address, key);
                self.stack.push(value.to_u256())?;
            }
            Opcode::TStore => {
                self.require_mutable()?;
                let (key, value) = self.stack.pop2()?;
                evm.state.transient_store(
                    self.address,
                    StorageKey::from_u256(key),
                    StorageValue::from_u256(value),
                );
            }
            Opcode::MCopy => {
                let (dest, src, length) = self.stack.pop3()?;
                let (dest, length) = Self::span(dest, length)?;
                if length > 0 {
                    let (src, _) = Self::span(src, U256::from(length as u64))?;
                    self.expand_and_charge(dest.max(src), length)?;
                    self.consume_gas(gas::copy_gas(length))?;
                    self.memory.copy_within(dest, src, length);
                } else {
                    self.consume_gas(gas::copy_gas(0))?;
                }
            }

            // =================================================================
            // PUSH / DUP / SWAP / LOG
            // =================================================================
            Opcode::Push0 => self.stack.push(U256::zero())?,
            Opcode::Push(width) => {
                let width = width as usize;
                let end = (self.pc + width).min(self.code.len());
                let mut word = [0u8; 32];
                let available = end - self.pc;
                word[32 - width..32 - width + available]
                    .copy_from_slice(&self.code.as_slice()[self.pc..end]);
                self.stack.push(U256::from_big_endian(&word))?;
                self.pc += width;
            }
            Opcode::Dup(depth) => self.stack.dup(depth as usize)?,
            Opcode::Swap(depth) => self.stack.swap(depth as usize)?,
            Opcode::Log(topic_count) => {
                self.require_mutable()?;
                let (offset, length) = self.stack.pop2()?;
                let mut topics = Vec::with_capacity(topic_count as usize);
                for _ in 0..topic_count {
                    topics.push(Hash::from_u256(self.stack.pop()?));
                }
                let (offset, length) = Self::span(offset, length)?;
                self.expand_and_charge(offset, length)?;
                self.consume_gas(gas::log_gas(length, topic_count as usize))?;
                let data = Bytes::from_vec(self.memory.read(offset, length));
                evm.state
                    .add_log(ember_types::Log::new(self.address, topics, data));
            }

            // =================================================================
            // CALLS AND CREATES
            // =================================================================
            Opcode::Create => self.do_create(evm, false).await?,
            Opcode::Create2 => self.do_create(evm, true).await?,
            Opcode::Call => self.do_call(evm, CallKind::Call).await?,
            Opcode::CallCode => self.do_call(evm, CallKind::CallCode).await?,
            Opcode::DelegateCall => self.do_call(evm, CallKind::DelegateCall).await?,
            Opcode::StaticCall => self.do_call(evm, CallKind::StaticCall).await?,

            // =================================================================
            // HALTS
            // =================================================================
            Opcode::Return => {
                let (offset, length) = self.stack.pop2()?;
                let (offset, length) = Self::span(offset, length)?;
                self.expand_and_charge(offset, length)?;
                self.output = Bytes::from_vec(self.memory.read(offset, length));
                self.stopped = true;
            }
            Opcode::Revert => {
                let (offset, length) = self.stack.pop2()?;
                let (offset, length) = Self::span(offset, length)?;
                self.expand_and_charge(offset, length)?;
                self.output = Bytes::from_vec(self.memory.read(offset, length));
                self.stopped = true;
                self.reverted = true;
            }
            Opcode::Invalid => return Err(VmError::InvalidOpcode(0xfe)),
            Opcode::SelfDestruct => self.do_selfdestruct(evm).await?,
        }

        Ok(())
    }

    fn jump_to(&mut self, dest: U256) -> Result<(), VmError> {
        if dest > U256::from(u32::MAX) {
            return Err(VmError::InvalidJump(usize::MAX));
        }
        let dest = dest.as_usize();
        if !self.jump_dests.get(dest).copied().unwrap_or(false) {
            return Err(VmError::InvalidJump(dest));
        }
        self.pc = dest;
        Ok(())
    }

    // =========================================================================
    // CREATE / CREATE2
    // =========================================================================

    async fn do_create(&mut self, evm: &mut Evm, is_create2: bool) -> Result<(), VmError> {
        self.require_mutable()?;
        let (value, offset, length) = self.stack.pop3()?;
        let salt = if is_create2 {
            Some(Hash::from_u256(self.stack.pop()?))
        } else {
            None
        };
        let (offset, length) = Self::span(offset, length)?;
        self.expand_and_charge(offset, length)?;

        let words = (length as u64).div_ceil(32);
        if evm.common.gte_hardfork(Hardfork::Shanghai) || evm.common.is_activated_eip(3860) {
            let word_cost = evm
                .common
                .param(ParamTopic::GasPrices, "initcodeWordCost")
                .as_u64();
            self.consume_gas(words * word_cost)?;
        }
        if is_create2 {
            self.consume_gas(words * gas::costs::KECCAK256_WORD)?;
        }

        let initcode = Bytes::from_vec(self.memory.read(offset, length));
        self.return_data = Bytes::new();

        let balance = evm.state.get_balance(self.address).await?;
        if balance < value || self.depth + 1 > CALL_DEPTH_LIMIT {
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        // All-but-one-64th is forwarded; the creator's nonce bumps first so
        // the child address derives from nonce - 1.
        let forwarded = if evm.common.gte_hardfork(Hardfork::TangerineWhistle) {
            self.gas_remaining - self.gas_remaining / 64
        } else {
            self.gas_remaining
        };
        self.consume_gas(forwarded)?;
        evm.state.increment_nonce(self.address).await?;

        let message = Message {
            caller: self.address,
            to: None,
            value,
            data: initcode,
            gas_limit: forwarded,
            depth: self.depth + 1,
            is_static: false,
            is_delegatecall: false,
            salt,
            code_address: None,
        };
        let frame = evm.execute_message(message).await?;
        self.gas_remaining += forwarded - frame.gas_used;
        match frame.outcome {
            FrameOutcome::Success => {
                let created = frame.created_address.unwrap_or(Address::ZERO);
                self.stack.push(created.to_u256())?;
            }
            FrameOutcome::Revert => {
                self.return_data = frame.return_value;
                self.stack.push(U256::zero())?;
            }
            FrameOutcome::Exception(_) => {
                self.stack.push(U256::zero())?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // CALL FAMILY
    // =========================================================================

    async fn do_call(&mut self, evm: &mut Evm, kind: CallKind) -> Result<(), VmError> {
        let requested = self.stack.pop()?;
        let target = Address::from_u256(self.stack.pop()?);
        let value = match kind {
            CallKind::Call | CallKind::CallCode => self.stack.pop()?,
            CallKind::DelegateCall | CallKind::StaticCall => U256::zero(),
        };
        let (in_offset, in_length) = {
            let (a, b) = self.stack.pop2()?;
            Self::span(a, b)?
        };
        let (out_offset, out_length) = {
            let (a, b) = self.stack.pop2()?;
            Self::span(a, b)?
        };

        if kind == CallKind::Call && !value.is_zero() {
            self.require_mutable()?;
        }

        self.expand_and_charge(in_offset, in_length)?;
        self.expand_and_charge(out_offset, out_length)?;

        let cold = evm.state.add_warmed_address(target);
        let mut upfront = gas::call_base_gas(&evm.common, cold);
        let transfers_value = !value.is_zero() && matches!(kind, CallKind::Call | CallKind::CallCode);
        if transfers_value {
            upfront += gas::costs::CALL_VALUE;
        }
        if kind == CallKind::Call && !value.is_zero() {
            let beneficiary_missing = evm
                .state
                .get_account(target)
                .await?
                .map_or(true, |account| account.is_empty());
            if beneficiary_missing {
                upfront += gas::costs::CALL_NEW_ACCOUNT;
            }
        }
        self.consume_gas(upfront)?;

        let deducted = gas::forwarded_call_gas(&evm.common, self.gas_remaining, requested);
        self.consume_gas(deducted)?;
        let stipend = if transfers_value {
            gas::costs::CALL_STIPEND
        } else {
            0
        };
        let callee_gas = deducted + stipend;

        self.return_data = Bytes::new();

        // Depth and balance failures refund the deducted gas and push 0.
        let balance = evm.state.get_balance(self.address).await?;
        if self.depth + 1 > CALL_DEPTH_LIMIT || (transfers_value && balance < value) {
            self.gas_remaining += deducted;
            self.stack.push(U256::zero())?;
            return Ok(());
        }

        let calldata = Bytes::from_vec(self.memory.read(in_offset, in_length));
        let message = match kind {
            CallKind::Call => Message {
                caller: self.address,
                to: Some(target),
                value,
                data: calldata,
                gas_limit: callee_gas,
                depth: self.depth + 1,
                is_static: self.is_static,
                is_delegatecall: false,
                salt: None,
                code_address: None,
            },
            CallKind::CallCode => Message {
                caller: self.address,
                to: Some(self.address),
                value,
                data: calldata,
                gas_limit: callee_gas,
                depth: self.depth + 1,
                is_static: self.is_static,
                is_delegatecall: false,
                salt: None,
                code_address: Some(target),
            },
            CallKind::DelegateCall => Message {
                caller: self.caller,
                to: Some(self.address),
                value: self.value,
                data: calldata,
                gas_limit: callee_gas,
                depth: self.depth + 1,
                is_static: self.is_static,
                is_delegatecall: true,
                salt: None,
                code_address: Some(target),
            },
            CallKind::StaticCall => Message {
                caller: self.address,
                to: Some(target),
                value: U256::zero(),
                data: calldata,
                gas_limit: callee_gas,
                depth: self.depth + 1,
                is_static: true,
                is_delegatecall: false,
                salt: None,
                code_address: None,
            },
        };

        let frame = evm.execute_message(message).await?;
        self.gas_remaining += callee_gas - frame.gas_used;
        match frame.outcome {
            FrameOutcome::Success | FrameOutcome::Revert => {
                let take = frame.return_value.len().min(out_length);
                if take > 0 {
                    let bytes = frame.return_value.as_slice()[..take].to_vec();
                    self.memory.write(out_offset, &bytes);
                }
                let succeeded = matches!(frame.outcome, FrameOutcome::Success);
                self.return_data = frame.return_value;
                self.stack.push_bool(succeeded)?;
            }
            FrameOutcome::Exception(_) => {
                self.stack.push(U256::zero())?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // SELFDESTRUCT
    // =========================================================================

    async fn do_selfdestruct(&mut self, evm: &mut Evm) -> Result<(), VmError> {
        self.require_mutable()?;
        let beneficiary = Address::from_u256(self.stack.pop()?);
        let balance = evm.state.get_balance(self.address).await?;

        if evm.common.is_activated_eip(2929) && evm.state.add_warmed_address(beneficiary) {
            self.consume_gas(gas::costs::COLD_ACCOUNT)?;
        }
        let beneficiary_exists = evm
            .state
            .get_account(beneficiary)
            .await?
            .is_some_and(|account| !account.is_empty());
        self.consume_gas(gas::selfdestruct_gas(
            &evm.common,
            beneficiary_exists,
            !balance.is_zero(),
        ))?;

        if !evm.common.is_activated_eip(3529)
            && !evm.state.selfdestruct_set().contains(&self.address)
        {
            evm.state.add_refund(gas::costs::SELFDESTRUCT_REFUND);
        }

        // EIP-6780: only contracts created in this transaction are deleted;
        // everything else just moves its balance.
        let deletes = !evm.common.is_activated_eip(6780) || evm.state.is_created(self.address);
        evm.state.sub_balance(self.address, balance).await?;
        if beneficiary != self.address || !deletes {
            evm.state.add_balance(beneficiary, balance).await?;
        }
        if deletes {
            evm.state.mark_selfdestruct(self.address);
        }

        self.stopped = true;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallKind {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

// =============================================================================
// WORD HELPERS
// =============================================================================

fn u512_low(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

fn sliced_padded(source: &[u8], offset: U256, length: usize) -> Vec<u8> {
    let mut out = vec![0u8; length];
    if offset <= U256::from(u32::MAX) {
        let offset = offset.as_usize();
        for (i, byte) in out.iter_mut().enumerate() {
            if let Some(value) = source.get(offset + i) {
                *byte = *value;
            }
        }
    }
    out
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (a.bit(255), b.bit(255)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_negative = a.bit(255);
    let b_negative = b.bit(255);
    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if b_negative { twos_complement(b) } else { b };
    let quotient = a_abs / b_abs;
    if a_negative == b_negative {
        quotient
    } else {
        twos_complement(quotient)
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_negative = a.bit(255);
    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if b.bit(255) { twos_complement(b) } else { b };
    let remainder = a_abs % b_abs;
    if a_negative {
        twos_complement(remainder)
    } else {
        remainder
    }
}

fn arithmetic_shr(value: U256, shift: U256) -> U256 {
    let negative = value.bit(255);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.as_usize();
    let shifted = value >> shift;
    if negative && shift > 0 {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

fn exp_by_squaring(base: U256, mut exponent: U256) -> U256 {
    let mut result = U256::one();
    let mut base = base;
    while !exponent.is_zero() {
        if exponent.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        exponent >>= 1;
        base = base.overflowing_mul(base).0;
    }
    result
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_division_rules() {
        let neg_one = twos_complement(U256::one());
        let neg_two = twos_complement(U256::from(2u64));

        assert_eq!(signed_div(neg_two, U256::from(2u64)), neg_one);
        assert_eq!(signed_div(neg_two, neg_one), U256::from(2u64));
        assert_eq!(signed_div(U256::from(7u64), U256::zero()), U256::zero());

        assert_eq!(signed_mod(neg_two, neg_one), U256::zero());
        let neg_three = twos_complement(U256::from(3u64));
        assert_eq!(signed_mod(neg_three, U256::from(2u64)), neg_one);
    }

    #[test]
    fn arithmetic_shift_preserves_sign() {
        let neg = twos_complement(U256::from(8u64));
        assert_eq!(arithmetic_shr(neg, U256::from(2u64)), twos_complement(U256::from(2u64)));
        assert_eq!(arithmetic_shr(neg, U256::from(300u64)), U256::MAX);
        assert_eq!(
            arithmetic_shr(U256::from(8u64), U256::from(2u64)),
            U256::from(2u64)
        );
    }

    #[test]
    fn exp_by_squaring_matches_pow() {
        assert_eq!(exp_by_squaring(U256::from(2u64), U256::zero()), U256::one());
        assert_eq!(
            exp_by_squaring(U256::from(3u64), U256::from(5u64)),
            U256::from(243u64)
        );
    }

    #[test]
    fn signed_comparison() {
        let neg_one = twos_complement(U256::one());
        assert!(signed_lt(neg_one, U256::one()));
        assert!(!signed_lt(U256::one(), neg_one));
        assert!(!signed_lt(U256::one(), U256::one()));
    }
}
