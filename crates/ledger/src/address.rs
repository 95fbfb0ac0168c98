//! Output script to address derivation.
//!
//! Non-standard scripts have no address form; callers treat `None` as "this
//! output cannot hold tokens" and skip or abort the operation at hand.

use bitcoin::{Address, Network, ScriptBuf};

/// Derives the address of an output script given as raw bytes.
pub fn from_script_bytes(bytes: Vec<u8>, network: Network) -> Option<String> {
    let script = ScriptBuf::from_bytes(bytes);
    Address::from_script(&script, network)
        .ok()
        .map(|address| address.to_string())
}

/// Derives the address of a hex-encoded output script.
pub fn from_script_hex(script_hex: &str, network: Network) -> Option<String> {
    from_script_bytes(hex::decode(script_hex).ok()?, network)
}

/// Derives the taproot collection address from a 32-byte internal key push,
/// by forming the corresponding `OP_1 <key>` output script.
pub fn taproot_from_internal_key(key: &[u8], network: Network) -> Option<String> {
    if key.len() != 32 {
        return None;
    }
    let mut script = Vec::with_capacity(34);
    script.push(0x51);
    script.push(0x20);
    script.extend_from_slice(key);
    from_script_bytes(script, network)
}
