//! Mint handling: issue undistributed supply, bounded by the remaining
//! amount of the deployment.

use super::Indexer;
use crate::address;
use crate::entities::TokenUtxo;
use crate::keys;
use crate::Result;
use pipe_config::MAX_TOKEN_ID;
use pipe_core::amount::{amount_text, canonicalize};
use pipe_core::opcodes::resolve_immediate;
use pipe_core::script::{decode_script_hex, ScriptToken};
use pipe_core::ticker::ticker_from_push;
use pipe_rpc_client::RpcTransaction;
use tracing::error;

impl Indexer {
    /// Signature: `OP_RETURN p m <ticker> <id> <output> <amount>`.
    ///
    /// A requested amount above the remaining supply is silently clipped to
    /// it; everything else invalid discards the operation.
    pub(crate) async fn index_mint(
        &self,
        tx: &RpcTransaction,
        tokens: &[ScriptToken],
    ) -> Result<()> {
        if tokens.len() != 7 {
            return Ok(());
        }

        let Some(ticker_push) = tokens[3].as_push() else {
            return Ok(());
        };
        if ticker_push.is_empty() {
            return Ok(());
        }
        let ticker = ticker_from_push(ticker_push);
        if ticker.is_empty() {
            return Ok(());
        }

        let Some(id) = resolve_immediate(&tokens[4]) else {
            return Ok(());
        };
        if id > MAX_TOKEN_ID {
            return Ok(());
        }
        let Some(output) = resolve_immediate(&tokens[5]) else {
            return Ok(());
        };

        let Some(amount_push) = tokens[6].as_push() else {
            return Ok(());
        };
        let text = amount_text(amount_push, self.block, self.config.legacy_block_end);

        let Some(mut deployment) = self.get_deployment(&ticker, id).await? else {
            return Ok(());
        };
        let Some(mut mint) = canonicalize(&text, deployment.dec) else {
            return Ok(());
        };

        let Some(out) = tx.vout.get(output as usize) else {
            return Ok(());
        };
        let out_tokens = decode_script_hex(&out.script_pub_key.hex);
        if Self::output_is_op_return(&out_tokens) {
            return Ok(());
        }

        if deployment.rem == 0 {
            return Ok(());
        }
        if mint > deployment.lim || deployment.lim > deployment.max {
            return Ok(());
        }
        if mint > deployment.rem {
            mint = deployment.rem;
        }
        deployment.rem -= mint;

        let Some(to_address) = address::from_script_hex(&out.script_pub_key.hex, self.network)
        else {
            error!("No address for mint target output in {}", tx.txid);
            return Ok(());
        };

        self.ledger
            .put_deployment(&keys::deployment(&ticker, id), &deployment)
            .await?;
        self.credit_output(&TokenUtxo {
            addr: to_address,
            txid: tx.txid.clone(),
            vout: output as u32,
            tick: deployment.tick.clone(),
            id: deployment.id,
            amt: mint,
        })
        .await
    }
}
