//! # Opcode Decoding
//!
//! Byte-to-opcode decoding. Whether a decoded opcode is *available* under
//! the active rules is the opcode table's concern, not the decoder's.

/// A decoded EVM instruction. Families with an index (PUSH/DUP/SWAP/LOG)
/// carry it as payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// 0x00
    Stop,
    /// 0x01
    Add,
    /// 0x02
    Mul,
    /// 0x03
    Sub,
    /// 0x04
    Div,
    /// 0x05
    SDiv,
    /// 0x06
    Mod,
    /// 0x07
    SMod,
    /// 0x08
    AddMod,
    /// 0x09
    MulMod,
    /// 0x0a
    Exp,
    /// 0x0b
    SignExtend,
    /// 0x10
    Lt,
    /// 0x11
    Gt,
    /// 0x12
    SLt,
    /// 0x13
    SGt,
    /// 0x14
    Eq,
    /// 0x15
    IsZero,
    /// 0x16
    And,
    /// 0x17
    Or,
    /// 0x18
    Xor,
    /// 0x19
    Not,
    /// 0x1a
    Byte,
    /// 0x1b
    Shl,
    /// 0x1c
    Shr,
    /// 0x1d
    Sar,
    /// 0x20
    Keccak256,
    /// 0x30
    Address,
    /// 0x31
    Balance,
    /// 0x32
    Origin,
    /// 0x33
    Caller,
    /// 0x34
    CallValue,
    /// 0x35
    CallDataLoad,
    /// 0x36
    CallDataSize,
    /// 0x37
    CallDataCopy,
    /// 0x38
    CodeSize,
    /// 0x39
    CodeCopy,
    /// 0x3a
    GasPrice,
    /// 0x3b
    ExtCodeSize,
    /// 0x3c
    ExtCodeCopy,
    /// 0x3d
    ReturnDataSize,
    /// 0x3e
    ReturnDataCopy,
    /// 0x3f
    ExtCodeHash,
    /// 0x40
    BlockHash,
    /// 0x41
    Coinbase,
    /// 0x42
    Timestamp,
    /// 0x43
    Number,
    /// 0x44 — DIFFICULTY pre-merge, PREVRANDAO after (EIP-4399)
    PrevRandao,
    /// 0x45
    GasLimit,
    /// 0x46
    ChainId,
    /// 0x47
    SelfBalance,
    /// 0x48
    BaseFee,
    /// 0x49 (EIP-4844)
    BlobHash,
    /// 0x50
    Pop,
    /// 0x51
    MLoad,
    /// 0x52
    MStore,
    /// 0x53
    MStore8,
    /// 0x54
    SLoad,
    /// 0x55
    SStore,
    /// 0x56
    Jump,
    /// 0x57
    JumpI,
    /// 0x58
    Pc,
    /// 0x59
    MSize,
    /// 0x5a
    Gas,
    /// 0x5b
    JumpDest,
    /// 0x5c (EIP-1153)
    TLoad,
    /// 0x5d (EIP-1153)
    TStore,
    /// 0x5e (EIP-5656)
    MCopy,
    /// 0x5f (EIP-3855)
    Push0,
    /// 0x60..=0x7f, carrying the byte count 1..=32
    Push(u8),
    /// 0x80..=0x8f, carrying the depth 1..=16
    Dup(u8),
    /// 0x90..=0x9f, carrying the depth 1..=16
    Swap(u8),
    /// 0xa0..=0xa4, carrying the topic count 0..=4
    Log(u8),
    /// 0xf0
    Create,
    /// 0xf1
    Call,
    /// 0xf2
    CallCode,
    /// 0xf3
    Return,
    /// 0xf4
    DelegateCall,
    /// 0xf5
    Create2,
    /// 0xfa
    StaticCall,
    /// 0xfd
    Revert,
    /// 0xfe
    Invalid,
    /// 0xff
    SelfDestruct,
}

impl Opcode {
    /// Decodes a byte. `None` means the byte has never named an opcode.
    #[must_use]
    pub fn decode(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Stop,
            0x01 => Self::Add,
            0x02 => Self::Mul,
            0x03 => Self::Sub,
            0x04 => Self::Div,
            0x05 => Self::SDiv,
            0x06 => Self::Mod,
            0x07 => Self::SMod,
            0x08 => Self::AddMod,
            0x09 => Self::MulMod,
            0x0a => Self::Exp,
            0x0b => Self::SignExtend,
            0x10 => Self::Lt,
            0x11 => Self::Gt,
            0x12 => Self::SLt,
            0x13 => Self::SGt,
            0x14 => Self::Eq,
            0x15 => Self::IsZero,
            0x16 => Self::And,
            0x17 => Self::Or,
            0x18 => Self::Xor,
            0x19 => Self::Not,
            0x1a => Self::Byte,
            0x1b => Self::Shl,
            0x1c => Self::Shr,
            0x1d => Self::Sar,
            0x20 => Self::Keccak256,
            0x30 => Self::Address,
            0x31 => Self::Balance,
            0x32 => Self::Origin,
            0x33 => Self::Caller,
            0x34 => Self::CallValue,
            0x35 => Self::CallDataLoad,
            0x36 => Self::CallDataSize,
            0x37 => Self::CallDataCopy,
            0x38 => Self::CodeSize,
            0x39 => Self::CodeCopy,
            0x3a => Self::GasPrice,
            0x3b => Self::ExtCodeSize,
            0x3c => Self::ExtCodeCopy,
            0x3d => Self::ReturnDataSize,
            0x3e => Self::ReturnDataCopy,
            0x3f => Self::ExtCodeHash,
            0x40 => Self::BlockHash,
            0x41 => Self::Coinbase,
            0x42 => Self::Timestamp,
            0x43 => Self::Number,
            0x44 => Self::PrevRandao,
            0x45 => Self::GasLimit,
            0x46 => Self::ChainId,
            0x47 => Self::SelfBalance,
            0x48 => Self::BaseFee,
            0x49 => Self::BlobHash,
            0x50 => Self::Pop,
            0x51 => Self::MLoad,
            0x52 => Self::MStore,
            0x53 => Self::MStore8,
            0x54 => Self::SLoad,
            0x55 => Self::SStore,
            0x56 => Self::Jump,
            0x57 => Self::JumpI,
            0x58 => Self::Pc,
            0x59 => Self::MSize,
            0x5a => Self::Gas,
            0x5b => Self::JumpDest,
            0x5c => Self::TLoad,
            0x5d => Self::TStore,
            0x5e => Self::MCopy,
            0x5f => Self::Push0,
            0x60..=0x7f => Self::Push(byte - 0x5f),
            0x80..=0x8f => Self::Dup(byte - 0x7f),
            0x90..=0x9f => Self::Swap(byte - 0x8f),
            0xa0..=0xa4 => Self::Log(byte - 0xa0),
            0xf0 => Self::Create,
            0xf1 => Self::Call,
            0xf2 => Self::CallCode,
            0xf3 => Self::Return,
            0xf4 => Self::DelegateCall,
            0xf5 => Self::Create2,
            0xfa => Self::StaticCall,
            0xfd => Self::Revert,
            0xfe => Self::Invalid,
            0xff => Self::SelfDestruct,
            _ => return None,
        })
    }

    /// PUSH data length for a byte, zero for non-PUSH bytes.
    #[must_use]
    pub fn push_data_len(byte: u8) -> usize {
        if (0x60..=0x7f).contains(&byte) {
            (byte - 0x5f) as usize
        } else {
            0
        }
    }

    /// Opcodes that validly end an execution path (EIP-3670).
    #[must_use]
    pub fn is_terminating(byte: u8) -> bool {
        matches!(byte, 0x00 | 0xf3 | 0xfd | 0xfe | 0xff)
    }
}

/// Finds every valid JUMPDEST position, skipping PUSH immediates.
#[must_use]
pub fn analyze_jump_dests(code: &[u8]) -> Vec<bool> {
    let mut dests = vec![false; code.len()];
    let mut i = 0;
    while i < code.len() {
        let byte = code[i];
        if byte == 0x5b {
            dests[i] = true;
        }
        i += 1 + Opcode::push_data_len(byte);
    }
    dests
}

// =============================================================================
// TESTS
// =============================================================================
