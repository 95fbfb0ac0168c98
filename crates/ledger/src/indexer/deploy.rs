//! Deploy handling: create a (ticker, id) token, and record a collection
//! attachment when an input witness carries the annex grammar.
//!
//! Annex grammar inside the tapscript:
//! `<key> OP_CHECKSIG .. p a (i <mime> <data> | r <ref>) .. n <num1> <num2>
//! [b <out>] [t <traits..> | tr <blob>] .. OP_ENDIF`. A matching witness
//! that then violates the grammar aborts the whole deployment.

use super::Indexer;
use crate::address;
use crate::entities::{CollectionAttachment, Deployment, TokenUtxo};
use crate::keys;
use crate::projection::SUPPORTED_MIMES;
use crate::Result;
use pipe_config::{MAX_COLLECTION_NUMBER, MAX_DECIMALS, MAX_TOKEN_ID};
use pipe_core::amount::{amount_text, canonicalize};
use pipe_core::opcodes::{resolve_immediate, SYM_A, SYM_B, SYM_I, SYM_N, SYM_P, SYM_R, SYM_T, SYM_TR};
use pipe_core::script::{decode_script_hex, Opcode, ScriptToken};
use pipe_rpc_client::RpcTransaction;
use tracing::warn;

struct BeneficiaryMint {
    output: usize,
    address: String,
}

enum AnnexScan {
    /// Witness matched the annex prefix but a recoverable step failed;
    /// try the next input.
    Skip,
    /// Grammar violation; the whole deployment is discarded.
    Abort,
    Found {
        address: String,
        number: u64,
        beneficiary: Option<BeneficiaryMint>,
    },
}

impl Indexer {
    /// Signature: `OP_RETURN p d <ticker> <id> <output> <decimals> <max>
    /// <limit>` (9 tokens).
    pub(crate) async fn index_deploy(
        &self,
        blockhash: &str,
        op_return_vout: u32,
        tx: &RpcTransaction,
        tokens: &[ScriptToken],
    ) -> Result<()> {
        if tokens.len() != 9 {
            return Ok(());
        }

        let Some(ticker_push) = tokens[3].as_push() else {
            return Ok(());
        };
        if ticker_push.is_empty() {
            return Ok(());
        }
        let ticker = pipe_core::ticker::ticker_from_push(ticker_push);

        let Some(id) = resolve_immediate(&tokens[4]) else {
            return Ok(());
        };
        if id > MAX_TOKEN_ID {
            return Ok(());
        }
        let Some(output) = resolve_immediate(&tokens[5]) else {
            return Ok(());
        };
        let Some(decimals) = resolve_immediate(&tokens[6]) else {
            return Ok(());
        };
        if decimals > MAX_DECIMALS {
            return Ok(());
        }
        let decimals = decimals as u8;

        // At most one deployment per pair.
        if self.get_deployment(&ticker, id).await?.is_some() {
            return Ok(());
        }

        let Some(max_push) = tokens[7].as_push() else {
            return Ok(());
        };
        let Some(limit_push) = tokens[8].as_push() else {
            return Ok(());
        };
        let max_text = amount_text(max_push, self.block, self.config.legacy_block_end);
        let limit_text = amount_text(limit_push, self.block, self.config.legacy_block_end);

        let Some(max) = canonicalize(&max_text, decimals) else {
            return Ok(());
        };
        let Some(limit) = canonicalize(&limit_text, decimals) else {
            return Ok(());
        };

        let Some(out) = tx.vout.get(output as usize) else {
            return Ok(());
        };
        let out_tokens = decode_script_hex(&out.script_pub_key.hex);
        if Self::output_is_op_return(&out_tokens) {
            return Ok(());
        }
        let Some(to_address) = address::from_script_hex(&out.script_pub_key.hex, self.network)
        else {
            return Ok(());
        };

        let mut deployment = Deployment {
            tick: ticker.clone(),
            id,
            dec: decimals,
            max,
            lim: limit,
            rem: max,
            tx: tx.txid.clone(),
            vo: op_return_vout,
            bvo: output as u32,
            baddr: to_address.clone(),
            col: None,
            colnum: None,
            blck: self.block,
            blckh: blockhash.to_string(),
        };

        let mut beneficiary = None;

        for input in &tx.vin {
            if input.txinwitness.len() != 3 {
                continue;
            }
            let annex = decode_script_hex(&input.txinwitness[1]);
            if annex.len() < 12 || !annex[4].is_push_of(SYM_P) || !annex[5].is_push_of(SYM_A) {
                continue;
            }

            match self.scan_annex(&annex, tx, &deployment).await? {
                AnnexScan::Skip => continue,
                AnnexScan::Abort => return Ok(()),
                AnnexScan::Found {
                    address,
                    number,
                    beneficiary: found,
                } => {
                    deployment.col = Some(address);
                    deployment.colnum = Some(number);
                    beneficiary = found;
                    break;
                }
            }
        }

        if let Some(beneficiary) = beneficiary {
            if tx.vout.get(beneficiary.output).is_none() {
                return Ok(());
            }
            if deployment.lim > deployment.max {
                return Ok(());
            }
            // The drawn amount is the per-mint limit, clipped like a mint.
            let mint = deployment.lim.min(deployment.rem);
            deployment.rem -= mint;

            self.credit_output(&TokenUtxo {
                addr: beneficiary.address,
                txid: tx.txid.clone(),
                vout: beneficiary.output as u32,
                tick: ticker.clone(),
                id,
                amt: mint,
            })
            .await?;
        }

        let deployment_key = keys::deployment(&ticker, id);
        self.ledger.put_deployment(&deployment_key, &deployment).await?;
        self.ledger
            .put(
                &keys::deployment_by_address(&to_address, &ticker, id),
                &deployment_key,
            )
            .await?;
        Ok(())
    }

    /// Validates one matching witness against the annex grammar and records
    /// the collection attachment.
    async fn scan_annex(
        &self,
        annex: &[ScriptToken],
        tx: &RpcTransaction,
        draft: &Deployment,
    ) -> Result<AnnexScan> {
        let is_inline = annex[6].is_push_of(SYM_I);
        let is_reference = annex[6].is_push_of(SYM_R);
        if !is_inline && !is_reference {
            return Ok(AnnexScan::Abort);
        }

        let mut mime = None;
        let mut reference = None;

        if is_inline {
            let Some(mime_push) = annex[7].as_push() else {
                return Ok(AnnexScan::Abort);
            };
            mime = Some(mime_push.iter().map(|b| *b as char).collect::<String>());

            let Some(data) = annex[8].as_push() else {
                return Ok(AnnexScan::Abort);
            };
            if data.is_empty() || data[0] == 0 {
                return Ok(AnnexScan::Abort);
            }
        } else {
            let Some(ref_push) = annex[8].as_push() else {
                return Ok(AnnexScan::Abort);
            };
            let text = String::from_utf8_lossy(ref_push).into_owned();
            if text.is_empty() || text.contains('\0') {
                return Ok(AnnexScan::Abort);
            }
            reference = Some(text);

            if !annex[9].is_push_of(SYM_N) {
                return Ok(AnnexScan::Abort);
            }
        }

        let Some(n_pos) = annex.iter().position(|t| t.is_push_of(SYM_N)) else {
            return Ok(AnnexScan::Abort);
        };
        if n_pos == 0 || annex.get(n_pos + 2).is_none() {
            return Ok(AnnexScan::Abort);
        }

        let Some(num1) = resolve_immediate(&annex[n_pos + 1]) else {
            return Ok(AnnexScan::Abort);
        };
        let Some(num2) = resolve_immediate(&annex[n_pos + 2]) else {
            return Ok(AnnexScan::Abort);
        };
        if num1 > num2 || num1 > MAX_COLLECTION_NUMBER || num2 > MAX_COLLECTION_NUMBER {
            return Ok(AnnexScan::Abort);
        }

        let mut beneficiary = None;

        match annex.get(n_pos + 3) {
            Some(marker) if marker.is_push_of(SYM_B) => {
                let target = annex.get(n_pos + 4);
                let named_output = target.is_some_and(|t| !t.is_op(Opcode::OpN(0)));
                if named_output {
                    let Some(position) = target.and_then(resolve_immediate) else {
                        return Ok(AnnexScan::Abort);
                    };
                    // Declared 1-based.
                    let Some(position) = (position as usize).checked_sub(1) else {
                        return Ok(AnnexScan::Abort);
                    };
                    let Some(out) = tx.vout.get(position) else {
                        return Ok(AnnexScan::Abort);
                    };
                    let out_tokens = decode_script_hex(&out.script_pub_key.hex);
                    if Self::output_is_op_return(&out_tokens) {
                        return Ok(AnnexScan::Abort);
                    }
                    let Some(address) =
                        address::from_script_hex(&out.script_pub_key.hex, self.network)
                    else {
                        return Ok(AnnexScan::Skip);
                    };
                    beneficiary = Some(BeneficiaryMint {
                        output: position,
                        address,
                    });
                }
            }
            Some(_) => return Ok(AnnexScan::Abort),
            None => {}
        }

        let mut traits = None;

        if let Some(marker) = annex.get(n_pos + 5) {
            if marker.is_push_of(SYM_T) {
                let mut pairs = Vec::new();
                for token in annex
                    .iter()
                    .take(annex.len().saturating_sub(2))
                    .skip(n_pos + 6)
                {
                    let Some(push) = token.as_push() else {
                        return Ok(AnnexScan::Abort);
                    };
                    let text = String::from_utf8_lossy(push).into_owned();
                    if text.is_empty() || text.contains('\0') {
                        return Ok(AnnexScan::Abort);
                    }
                    pairs.push(text);
                }
                if pairs.len() % 2 != 0 {
                    return Ok(AnnexScan::Abort);
                }
                traits = Some(crate::entities::Traits::Pairs(pairs));
            } else if marker.is_push_of(SYM_TR) {
                let Some(push) = annex.get(n_pos + 6).and_then(|t| t.as_push()) else {
                    return Ok(AnnexScan::Abort);
                };
                let text = String::from_utf8_lossy(push).into_owned();
                if text.is_empty() || text.contains('\0') {
                    return Ok(AnnexScan::Abort);
                }
                traits = Some(crate::entities::Traits::Blob(text));
            }
        }

        if !annex[1].is_op(Opcode::OpCheckSig)
            || !annex.last().is_some_and(|t| t.is_op(Opcode::OpEndIf))
        {
            return Ok(AnnexScan::Abort);
        }

        // The leading push is the taproot internal key.
        let Some(internal_key) = annex[0].as_push() else {
            return Ok(AnnexScan::Skip);
        };
        let Some(collection_address) =
            address::taproot_from_internal_key(internal_key, self.network)
        else {
            return Ok(AnnexScan::Skip);
        };

        let collection_key = keys::collection(&collection_address, num1);
        if self.ledger.contains(&collection_key).await? {
            // Sequence number already taken for this collection.
            return Ok(AnnexScan::Abort);
        }

        let max_key = keys::collection_max(&collection_address);
        let current_max: Option<u64> = self
            .ledger
            .get(&max_key)
            .await?
            .and_then(|value| value.parse().ok());
        if current_max.map_or(true, |current| num2 > current) {
            self.ledger.put(&max_key, &num2.to_string()).await?;
        }

        if let Some(mime) = &mime {
            if !SUPPORTED_MIMES.contains(&mime.as_str()) {
                warn!(
                    "Unsupported mime type {} for collection {}",
                    mime, collection_address
                );
            }
        }

        let attachment = CollectionAttachment {
            tick: draft.tick.clone(),
            id: draft.id,
            dec: draft.dec,
            max: draft.max,
            lim: draft.lim,
            rem: draft.max,
            tx: draft.tx.clone(),
            vo: draft.vo,
            bvo: draft.bvo,
            baddr: draft.baddr.clone(),
            col: collection_address.clone(),
            colnum: num1,
            blck: self.block,
            traits,
            mime,
            metadata: Some(Self::inline_metadata(annex)),
            reference,
        };
        self.ledger.put_attachment(&collection_key, &attachment).await?;

        Ok(AnnexScan::Found {
            address: collection_address,
            number: num1,
            beneficiary,
        })
    }

    /// Concatenated push hex between the inline-content marker (after its
    /// mime push) and the sequence-number marker.
    fn inline_metadata(annex: &[ScriptToken]) -> String {
        let mut metadata = String::new();
        let mut started = false;
        let mut mime_seen = false;

        for token in annex {
            if token.is_push_of(SYM_N) {
                break;
            }
            if started {
                if mime_seen {
                    if let Some(push) = token.as_push() {
                        metadata.push_str(&hex::encode(push));
                    }
                } else {
                    mime_seen = true;
                }
            }
            if token.is_push_of(SYM_I) {
                started = true;
            }
        }

        metadata
    }
}
