//! Protocol opcode table.
//!
//! The embedded protocol marks its operations with single-letter pushes
//! inside an OP_RETURN output (and, for collection attachments, inside a
//! tapscript witness). This module fixes those symbol bytes and provides the
//! total resolver used for opcode-immediate-or-hex fields.

use crate::script::{Opcode, ScriptToken};

/// Protocol marker `p`.
pub const SYM_P: &[u8] = &[0x50];
/// Deploy operation `d`.
pub const SYM_D: &[u8] = &[0x44];
/// Mint operation `m`.
pub const SYM_M: &[u8] = &[0x4d];
/// Transfer operation `t`.
pub const SYM_T: &[u8] = &[0x54];
/// Collection attachment marker `a`.
pub const SYM_A: &[u8] = &[0x41];
/// Inline-content marker `i`.
pub const SYM_I: &[u8] = &[0x49];
/// Reference-content marker `r`.
pub const SYM_R: &[u8] = &[0x52];
/// Sequence-number marker `n`.
pub const SYM_N: &[u8] = &[0x4e];
/// Beneficiary marker `b`.
pub const SYM_B: &[u8] = &[0x42];
/// Trait-blob marker `tr`.
pub const SYM_TR: &[u8] = &[0x54, 0x52];

/// The protocol operation named by the second OP_RETURN push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolOp {
    Deploy,
    Mint,
    Transfer,
}

impl ProtocolOp {
    /// Classifies an opcode token as a protocol operation, if it is one.
    pub fn from_token(token: &ScriptToken) -> Option<Self> {
        if token.is_push_of(SYM_D) {
            Some(ProtocolOp::Deploy)
        } else if token.is_push_of(SYM_M) {
            Some(ProtocolOp::Mint)
        } else if token.is_push_of(SYM_T) {
            Some(ProtocolOp::Transfer)
        } else {
            None
        }
    }
}

/// Resolves an opcode-immediate-or-hex field to an unsigned integer.
///
/// OP_0..OP_16 resolve to 0..16; a data push is read as a big-endian hex
/// integer. Anything else (including pushes too wide for u64) resolves to
/// `None`.
pub fn resolve_immediate(token: &ScriptToken) -> Option<u64> {
    match token {
        ScriptToken::Op(Opcode::OpN(n)) => Some(*n as u64),
        ScriptToken::Push(bytes) => {
            if bytes.is_empty() || bytes.len() > 8 {
                return None;
            }
            let mut value = 0u64;
            for byte in bytes {
                value = (value << 8) | *byte as u64;
            }
            Some(value)
        }
        ScriptToken::Op(_) => None,
    }
}
