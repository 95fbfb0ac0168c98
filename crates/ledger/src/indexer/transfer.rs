//! Transfer handling: reassign already-issued balances among a
//! transaction's outputs under the conservation invariant.

use super::Indexer;
use crate::address;
use crate::entities::TokenUtxo;
use crate::keys;
use crate::Result;
use pipe_config::MAX_TOKEN_ID;
use pipe_core::amount::{amount_text, canonicalize, count_decimals};
use pipe_core::opcodes::resolve_immediate;
use pipe_core::script::{decode_script_hex, ScriptToken};
use pipe_core::ticker::ticker_from_push;
use pipe_rpc_client::RpcTransaction;
use std::collections::HashMap;
use tracing::error;

impl Indexer {
    /// Signature: `OP_RETURN p t (<ticker> <id> <output> <amount>)+`, odd
    /// token count, at least one full quadruple.
    ///
    /// Candidate credits are validated as a whole before anything applies:
    /// an output reused by two quadruples voids the transfer, and a
    /// signature whose credits exceed its actually-consumed inputs discards
    /// it entirely. Consumed balance not reassigned is burned.
    pub(crate) async fn index_transfer(
        &self,
        tx: &RpcTransaction,
        tokens: &[ScriptToken],
    ) -> Result<()> {
        if tokens.len() % 2 == 0 {
            return Ok(());
        }
        if tokens.len() < 7 {
            return Ok(());
        }
        if (tokens.len() - 3) % 4 != 0 {
            return Ok(());
        }

        let mut candidates: Vec<TokenUtxo> = Vec::new();
        let mut used_outputs: Vec<u64> = Vec::new();

        let mut i = 3;
        while i < tokens.len() {
            let Some(ticker_push) = tokens[i].as_push() else {
                return Ok(());
            };
            if ticker_push.is_empty() {
                return Ok(());
            }
            let ticker = ticker_from_push(ticker_push);
            if ticker.is_empty() {
                return Ok(());
            }

            let Some(id) = resolve_immediate(&tokens[i + 1]) else {
                return Ok(());
            };
            if id > MAX_TOKEN_ID {
                return Ok(());
            }
            let Some(output) = resolve_immediate(&tokens[i + 2]) else {
                return Ok(());
            };

            let Some(amount_push) = tokens[i + 3].as_push() else {
                return Ok(());
            };
            let text = amount_text(amount_push, self.block, self.config.legacy_block_end);

            // Shape rules reject the whole transfer even for an unknown pair.
            if text.starts_with('0') && !text.starts_with("0.") {
                return Ok(());
            }
            if text.contains('.') && text.ends_with('0') {
                return Ok(());
            }
            if text.ends_with('.') {
                return Ok(());
            }

            // A quadruple naming an undeployed pair is dropped, not fatal.
            if let Some(deployment) = self.get_deployment(&ticker, id).await? {
                if count_decimals(&text) > deployment.dec as usize {
                    return Ok(());
                }
                let Some(amount) = canonicalize(&text, deployment.dec) else {
                    return Ok(());
                };

                let Some(out) = tx.vout.get(output as usize) else {
                    return Ok(());
                };
                let out_tokens = decode_script_hex(&out.script_pub_key.hex);
                if Self::output_is_op_return(&out_tokens) {
                    return Ok(());
                }

                match address::from_script_hex(&out.script_pub_key.hex, self.network) {
                    Some(to_address) => {
                        if used_outputs.contains(&output) {
                            candidates.clear();
                            break;
                        }
                        candidates.push(TokenUtxo {
                            addr: to_address,
                            txid: tx.txid.clone(),
                            vout: output as u32,
                            tick: deployment.tick.clone(),
                            id: deployment.id,
                            amt: amount,
                        });
                        used_outputs.push(output);
                    }
                    None => {
                        error!("No address for transfer target output in {}", tx.txid);
                    }
                }
            }

            i += 4;
        }

        if candidates.is_empty() {
            return Ok(());
        }

        // Per-signature sums of what this transaction actually consumed,
        // read from the spent records its inputs just produced.
        let mut consumed: HashMap<(String, u64), u128> = HashMap::new();
        for input in &tx.vin {
            let Some((txid, vout)) = input.outpoint() else {
                continue;
            };
            let key = keys::spent(&keys::utxo(txid, vout));
            let spent = match self.ledger.get_json::<TokenUtxo>(&key).await {
                Ok(Some(utxo)) => utxo,
                _ => continue,
            };
            *consumed.entry((spent.tick.clone(), spent.id)).or_insert(0) += spent.amt as u128;
        }

        let mut credited: HashMap<(String, u64), u128> = HashMap::new();
        for utxo in &candidates {
            *credited.entry((utxo.tick.clone(), utxo.id)).or_insert(0) += utxo.amt as u128;
        }

        for (sig, credit) in &credited {
            match consumed.get(sig) {
                Some(total) if credit <= total => {}
                // Tokens are never created by a transfer.
                _ => return Ok(()),
            }
        }

        for utxo in &candidates {
            self.credit_output(utxo).await?;
        }

        Ok(())
    }
}
