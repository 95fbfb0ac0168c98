//! Output script decoding.
//!
//! Turns a raw script into an ordered token stream of named opcodes and
//! literal data pushes. The decoder is deliberately tolerant: a truncated
//! push ends decoding with the tokens accumulated so far, so callers can
//! treat "no recognizable signature" and "malformed script" the same way.

/// A named opcode appearing in a decoded script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// OP_0 through OP_16; the payload is the pushed small integer.
    OpN(u8),
    Op1Negate,
    OpIf,
    OpEndIf,
    OpReturn,
    OpCheckSig,
    /// Any opcode the protocol does not interpret.
    Other(u8),
}

/// One element of a decoded script: either a named opcode or a data push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptToken {
    Op(Opcode),
    Push(Vec<u8>),
}

impl ScriptToken {
    /// Returns the pushed bytes when this token is a literal push.
    pub fn as_push(&self) -> Option<&[u8]> {
        match self {
            ScriptToken::Push(bytes) => Some(bytes),
            ScriptToken::Op(_) => None,
        }
    }

    /// True when this token is the given named opcode.
    pub fn is_op(&self, op: Opcode) -> bool {
        matches!(self, ScriptToken::Op(o) if *o == op)
    }

    /// True for OP_RETURN.
    pub fn is_op_return(&self) -> bool {
        self.is_op(Opcode::OpReturn)
    }

    /// True when this token is a push equal to the given bytes.
    pub fn is_push_of(&self, bytes: &[u8]) -> bool {
        matches!(self, ScriptToken::Push(p) if p.as_slice() == bytes)
    }
}

/// Decodes a raw script into its token stream.
pub fn decode_script(bytes: &[u8]) -> Vec<ScriptToken> {
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let opcode = bytes[i];
        i += 1;

        match opcode {
            0x00 => tokens.push(ScriptToken::Op(Opcode::OpN(0))),
            0x01..=0x4b => {
                let len = opcode as usize;
                if i + len > bytes.len() {
                    break;
                }
                tokens.push(ScriptToken::Push(bytes[i..i + len].to_vec()));
                i += len;
            }
            0x4c => {
                if i >= bytes.len() {
                    break;
                }
                let len = bytes[i] as usize;
                i += 1;
                if i + len > bytes.len() {
                    break;
                }
                tokens.push(ScriptToken::Push(bytes[i..i + len].to_vec()));
                i += len;
            }
            0x4d => {
                if i + 2 > bytes.len() {
                    break;
                }
                let len = u16::from_le_bytes([bytes[i], bytes[i + 1]]) as usize;
                i += 2;
                if i + len > bytes.len() {
                    break;
                }
                tokens.push(ScriptToken::Push(bytes[i..i + len].to_vec()));
                i += len;
            }
            0x4e => {
                if i + 4 > bytes.len() {
                    break;
                }
                let len =
                    u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]])
                        as usize;
                i += 4;
                if i + len > bytes.len() {
                    break;
                }
                tokens.push(ScriptToken::Push(bytes[i..i + len].to_vec()));
                i += len;
            }
            0x4f => tokens.push(ScriptToken::Op(Opcode::Op1Negate)),
            0x51..=0x60 => tokens.push(ScriptToken::Op(Opcode::OpN(opcode - 0x50))),
            0x63 => tokens.push(ScriptToken::Op(Opcode::OpIf)),
            0x68 => tokens.push(ScriptToken::Op(Opcode::OpEndIf)),
            0x6a => tokens.push(ScriptToken::Op(Opcode::OpReturn)),
            0xac => tokens.push(ScriptToken::Op(Opcode::OpCheckSig)),
            other => tokens.push(ScriptToken::Op(Opcode::Other(other))),
        }
    }

    tokens
}

/// Decodes a hex-encoded script. Invalid hex yields an empty token stream.
pub fn decode_script_hex(script_hex: &str) -> Vec<ScriptToken> {
    match hex::decode(script_hex) {
        Ok(bytes) => decode_script(&bytes),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_op_return_with_pushes() {
        // OP_RETURN <0x50> <0x44>
        let tokens = decode_script(&[0x6a, 0x01, 0x50, 0x01, 0x44]);
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].is_op_return());
        assert!(tokens[1].is_push_of(&[0x50]));
        assert!(tokens[2].is_push_of(&[0x44]));
    }

    #[test]
    fn test_decode_small_ints() {
        let tokens = decode_script(&[0x00, 0x51, 0x60]);
        assert_eq!(
            tokens,
            vec![
                ScriptToken::Op(Opcode::OpN(0)),
                ScriptToken::Op(Opcode::OpN(1)),
                ScriptToken::Op(Opcode::OpN(16)),
            ]
        );
    }

    #[test]
    fn test_decode_pushdata1() {
        let mut script = vec![0x4c, 0x03];
        script.extend_from_slice(b"abc");
        let tokens = decode_script(&script);
        assert_eq!(tokens, vec![ScriptToken::Push(b"abc".to_vec())]);
    }

    #[test]
    fn test_truncated_push_is_partial_not_fatal() {
        // Push of 5 bytes but only 2 available.
        let tokens = decode_script(&[0x6a, 0x05, 0xaa, 0xbb]);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_op_return());
    }

    #[test]
    fn test_invalid_hex_is_empty() {
        assert!(decode_script_hex("zz").is_empty());
        assert!(decode_script_hex("").is_empty());
    }

    #[test]
    fn test_taproot_output_script() {
        // OP_1 <32-byte program>
        let mut script = vec![0x51, 0x20];
        script.extend_from_slice(&[7u8; 32]);
        let tokens = decode_script(&script);
        assert_eq!(tokens[0], ScriptToken::Op(Opcode::OpN(1)));
        assert_eq!(tokens[1].as_push().map(|p| p.len()), Some(32));
    }
}
