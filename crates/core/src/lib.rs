//! Pipe Core Module
//!
//! Pure protocol primitives shared by the indexer crates: script decoding,
//! the protocol opcode table, numeric canonicalization of decimal amounts and
//! bijective base-26 tickers. Everything here is side-effect free; malformed
//! input yields an empty or partial result, never a panic.

pub mod amount;
pub mod opcodes;
pub mod script;
pub mod ticker;

pub use amount::{amount_text, canonicalize, clean_float, count_decimals, format_minor};
pub use opcodes::{resolve_immediate, ProtocolOp, SYM_A, SYM_B, SYM_D, SYM_I, SYM_M, SYM_N, SYM_P, SYM_R, SYM_T, SYM_TR};
pub use script::{decode_script, decode_script_hex, Opcode, ScriptToken};
pub use ticker::{ticker_from_push, ticker_to_int};
