//! # EOF v1 Container Validation
//!
//! EIP-3540 header parsing (magic `0xEF00`, version 1, sized code/data
//! sections, zero terminator) and EIP-3670 code validation (no undefined
//! opcodes, no truncated PUSH data, terminating final instruction).

use crate::errors::VmError;
use crate::opcodes::Opcode;
use crate::table::OpcodeTable;

/// First magic byte, also the EIP-3541 reserved prefix.
pub const EOF_PREFIX: u8 = 0xef;

const EOF_MAGIC: [u8; 2] = [0xef, 0x00];
const EOF_VERSION: u8 = 0x01;
const KIND_CODE: u8 = 0x01;
const KIND_DATA: u8 = 0x02;
const KIND_TERMINATOR: u8 = 0x00;

/// A parsed EOF v1 container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EofContainer {
    /// Offset of the code section body.
    pub code_offset: usize,
    /// Code section length.
    pub code_size: usize,
    /// Data section length (zero if absent).
    pub data_size: usize,
}

/// Parses an EOF v1 header.
///
/// # Errors
///
/// `InvalidEofFormat` describing the first structural violation.
pub fn parse_container(code: &[u8]) -> Result<EofContainer, VmError> {
    if code.len() < 2 || code[..2] != EOF_MAGIC {
        return Err(VmError::InvalidEofFormat("bad magic"));
    }
    if code.len() < 3 || code[2] != EOF_VERSION {
        return Err(VmError::InvalidEofFormat("unsupported version"));
    }

    let mut cursor = 3;
    let mut code_size: Option<usize> = None;
    let mut data_size = 0usize;

    loop {
        let kind = *code
            .get(cursor)
            .ok_or(VmError::InvalidEofFormat("truncated section header"))?;
        cursor += 1;
        match kind {
            KIND_TERMINATOR => break,
            KIND_CODE | KIND_DATA => {
                let bytes = code
                    .get(cursor..cursor + 2)
                    .ok_or(VmError::InvalidEofFormat("truncated section size"))?;
                let size = usize::from(bytes[0]) << 8 | usize::from(bytes[1]);
                cursor += 2;
                if kind == KIND_CODE {
                    if code_size.is_some() {
                        return Err(VmError::InvalidEofFormat("duplicate code section"));
                    }
                    if size == 0 {
                        return Err(VmError::InvalidEofFormat("empty code section"));
                    }
                    code_size = Some(size);
                } else {
                    if code_size.is_none() {
                        return Err(VmError::InvalidEofFormat("data section before code"));
                    }
                    if data_size != 0 {
                        return Err(VmError::InvalidEofFormat("duplicate data section"));
                    }
                    if size == 0 {
                        return Err(VmError::InvalidEofFormat("empty data section"));
                    }
                    data_size = size;
                }
            }
            _ => return Err(VmError::InvalidEofFormat("unknown section kind")),
        }
    }

    let code_size = code_size.ok_or(VmError::InvalidEofFormat("missing code section"))?;
    let body_len = code.len() - cursor;
    if body_len != code_size + data_size {
        return Err(VmError::InvalidEofFormat("container size mismatch"));
    }

    Ok(EofContainer {
        code_offset: cursor,
        code_size,
        data_size,
    })
}

/// EIP-3670: every opcode defined, PUSH data in bounds, and the final
/// instruction terminating.
///
/// # Errors
///
/// `InvalidEofFormat` naming the violation.
pub fn validate_code(code: &[u8], table: &OpcodeTable) -> Result<(), VmError> {
    let mut i = 0;
    let mut last_opcode = None;
    while i < code.len() {
        let byte = code[i];
        if !table.is_enabled(byte) {
            return Err(VmError::InvalidEofFormat("undefined opcode"));
        }
        last_opcode = Some(byte);
        let push_len = Opcode::push_data_len(byte);
        if push_len > 0 && i + 1 + push_len > code.len() {
            return Err(VmError::InvalidEofFormat("truncated push data"));
        }
        i += 1 + push_len;
    }
    match last_opcode {
        Some(byte) if Opcode::is_terminating(byte) => Ok(()),
        _ => Err(VmError::InvalidEofFormat("missing terminating instruction")),
    }
}

/// Full container validation: header plus code-section rules.
///
/// # Errors
///
/// `InvalidEofFormat` from either phase.
pub fn validate_container(code: &[u8], table: &OpcodeTable) -> Result<EofContainer, VmError> {
    let container = parse_container(code)?;
    let body = &code[container.code_offset..container.code_offset + container.code_size];
    validate_code(body, table)?;
    Ok(container)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ember_common::{ChainConfig, Common, Hardfork};

    fn table() -> OpcodeTable {
        OpcodeTable::for_rules(&Common::new(ChainConfig::dev(Hardfork::London)), &[])
    }

    fn container(code: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = vec![0xef, 0x00, 0x01, 0x01];
        out.extend_from_slice(&(code.len() as u16).to_be_bytes());
        if !data.is_empty() {
            out.push(0x02);
            out.extend_from_slice(&(data.len() as u16).to_be_bytes());
        }
        out.push(0x00);
        out.extend_from_slice(code);
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn valid_container_parses() {
        let bytes = container(&[0x60, 0x01, 0x00], b"data");
        let parsed = parse_container(&bytes).unwrap();
        assert_eq!(parsed.code_size, 3);
        assert_eq!(parsed.data_size, 4);
        validate_container(&bytes, &table()).unwrap();
    }

    #[test]
    fn bad_magic_and_version() {
        assert_eq!(
            parse_container(&[0xef, 0x01, 0x01]).unwrap_err(),
            VmError::InvalidEofFormat("bad magic")
        );
        assert_eq!(
            parse_container(&[0xef, 0x00, 0x02]).unwrap_err(),
            VmError::InvalidEofFormat("unsupported version")
        );
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let mut bytes = container(&[0x00], &[]);
        bytes.push(0xaa); // trailing garbage
        assert_eq!(
            parse_container(&bytes).unwrap_err(),
            VmError::InvalidEofFormat("container size mismatch")
        );
    }

    #[test]
    fn undefined_opcode_fails_3670() {
        let bytes = container(&[0x0c, 0x00], &[]);
        assert_eq!(
            validate_container(&bytes, &table()).unwrap_err(),
            VmError::InvalidEofFormat("undefined opcode")
        );
    }

    #[test]
    fn truncated_push_fails_3670() {
        let bytes = container(&[0x61, 0x01], &[]); // PUSH2 with one byte
        assert_eq!(
            validate_container(&bytes, &table()).unwrap_err(),
            VmError::InvalidEofFormat("truncated push data")
        );
    }

    #[test]
    fn non_terminating_tail_fails_3670() {
        let bytes = container(&[0x60, 0x01, 0x01], &[]); // ends with ADD
        assert_eq!(
            validate_container(&bytes, &table()).unwrap_err(),
            VmError::InvalidEofFormat("missing terminating instruction")
        );
    }
}
