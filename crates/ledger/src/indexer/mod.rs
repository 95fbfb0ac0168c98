//! Per-block scanning and the checkpoint state machine.
//!
//! Transactions apply in declared order, one fully-committed block at a
//! time. The control keys form the recovery protocol: `bchk` is bumped and
//! `mrk` set before a block is applied, `b`/`bh` written and `mrk` cleared
//! after. A leftover `mrk` means the last block is not safely committed and
//! is treated as operationally fatal rather than silently reprocessed.

mod deploy;
mod mint;
mod transfer;

use crate::address;
use crate::entities::{Balance, CollectionAttachment, Deployment, TokenUtxo};
use crate::keys;
use crate::projection::ProjectionSync;
use crate::store::BlockLedger;
use crate::{Error, Result};
use pipe_config::IndexerConfig;
use pipe_core::opcodes::{ProtocolOp, SYM_P};
use pipe_core::script::{decode_script_hex, ScriptToken};
use pipe_persistence::KvStore;
use pipe_rpc_client::{ChainClient, RpcTransaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one indexing cycle, reacted to by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// `bchk` is at or past the current height; advance without reprocessing.
    AlreadyAnalysed,
    /// The pending-reorg flag is set; roll back the recent window.
    Reorg,
    Ok,
}

/// The block processor.
pub struct Indexer {
    config: IndexerConfig,
    network: bitcoin::Network,
    client: ChainClient,
    ledger: BlockLedger,
    block: u64,
}

impl Indexer {
    pub fn new(
        config: IndexerConfig,
        store: Arc<dyn KvStore>,
        projection: Arc<dyn ProjectionSync>,
    ) -> Result<Self> {
        let client = ChainClient::new(&config.rpc_url)?;
        Ok(Self {
            network: config.network.to_bitcoin(),
            block: config.genesis_height,
            config,
            client,
            ledger: BlockLedger::new(store, projection),
        })
    }

    /// Resumes from the last committed height, or stays at the genesis
    /// height when nothing has been committed yet.
    pub async fn init(&mut self) -> Result<()> {
        info!("Indexer started");
        if let Some(last) = self.parsed_control(keys::LAST_BLOCK).await? {
            self.block = last + 1;
        }
        Ok(())
    }

    /// Waits for quiescence: polls until the in-progress marker clears.
    /// Never clears the marker itself; a crashed block needs intervention.
    pub async fn close(&self) {
        loop {
            match self.ledger.control_contains(keys::MARKER).await {
                Ok(false) => {
                    info!("Indexer stopped");
                    return;
                }
                _ => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    }

    pub fn current_height(&self) -> u64 {
        self.block
    }

    pub fn set_height(&mut self, height: u64) {
        self.block = height;
    }

    pub fn ledger(&self) -> &BlockLedger {
        &self.ledger
    }

    /// Chain tip height; 0 while the chain is unreachable.
    pub async fn chain_height(&self) -> u64 {
        self.client.get_chain_height().await
    }

    pub async fn must_index(&self) -> bool {
        self.chain_height().await > self.block
    }

    /// Advances one height after an already-analysed cycle, gated on the
    /// chain being ahead.
    pub async fn fix_block(&mut self) {
        if self.chain_height().await > self.block {
            self.block += 1;
        }
    }

    /// Unwinds the recent reorg window: deletes every write tagged inside
    /// it, resets the checkpoint to the window start, and clears the flag.
    pub async fn cleanup(&mut self) -> Result<()> {
        let to = self.block;
        let from = to.saturating_sub(self.config.reorg_window);
        debug!("Cleaning up from block {} to {}", from, to);

        for height in from..=to {
            self.ledger.remove_all(height).await?;
        }

        self.block = from;
        self.ledger
            .control_put(keys::BLOCK_CHECK, &from.to_string())
            .await?;
        self.ledger
            .control_put(keys::LAST_BLOCK, &from.to_string())
            .await?;
        // The recorded tip hash belongs to the unwound branch.
        self.ledger.control_delete(keys::LAST_BLOCK_HASH).await?;
        self.ledger.control_delete(keys::REORG).await?;
        Ok(())
    }

    /// Indexes the current height and self-drives through any backlog with
    /// a short pause between blocks.
    pub async fn index(&mut self) -> Result<IndexOutcome> {
        loop {
            match self.index_once().await? {
                IndexOutcome::Ok => {
                    if self.must_index().await {
                        tokio::time::sleep(Duration::from_millis(self.config.catchup_pause_ms))
                            .await;
                        self.block += 1;
                        continue;
                    }
                    return Ok(IndexOutcome::Ok);
                }
                other => return Ok(other),
            }
        }
    }

    /// One indexing cycle for the current height.
    pub async fn index_once(&mut self) -> Result<IndexOutcome> {
        self.ledger.set_height(self.block);

        if let Some(check) = self.parsed_control(keys::BLOCK_CHECK).await? {
            if check >= self.block {
                warn!("Block {} already analysed", self.block);
                return Ok(IndexOutcome::AlreadyAnalysed);
            }
        }

        if self.ledger.control_contains(keys::REORG).await? {
            warn!("Reorg detected at block {}", self.block.saturating_sub(1));
            return Ok(IndexOutcome::Reorg);
        }

        // Parent-hash comparison flags the reorg for the next cycle; the
        // current block still proceeds.
        if self.block > 0 {
            let prev_hash = self
                .client
                .get_block_hash(self.block - 1)
                .await
                .ok_or(Error::ChainUnavailable)?;
            if let Some(recorded) = self.ledger.control_get(keys::LAST_BLOCK_HASH).await? {
                if prev_hash != recorded {
                    self.ledger.control_put(keys::REORG, "").await?;
                }
            }
        }

        debug!("Start indexing block {}", self.block);

        let blockhash = self
            .client
            .get_block_hash(self.block)
            .await
            .ok_or(Error::ChainUnavailable)?;
        let block = self
            .client
            .get_block(&blockhash)
            .await
            .ok_or(Error::ChainUnavailable)?;

        self.process_block(&blockhash, &block.tx).await?;

        debug!("Done indexing block {}", self.block);
        Ok(IndexOutcome::Ok)
    }

    /// Applies one block's transactions under the marker protocol. A single
    /// invalid transaction is logged and skipped; the block continues.
    pub async fn process_block(&mut self, blockhash: &str, txs: &[RpcTransaction]) -> Result<()> {
        self.ledger.set_height(self.block);
        self.ledger.control_put(keys::MARKER, "").await?;
        self.ledger
            .control_put(keys::BLOCK_CHECK, &self.block.to_string())
            .await?;

        for tx in txs {
            if let Err(e) = self.process_transaction(blockhash, tx).await {
                warn!("Skipping transaction {}: {}", tx.txid, e);
            }
        }

        self.ledger
            .control_put(keys::LAST_BLOCK, &self.block.to_string())
            .await?;
        self.ledger
            .control_put(keys::LAST_BLOCK_HASH, blockhash)
            .await?;
        self.ledger.control_delete(keys::MARKER).await?;
        Ok(())
    }

    async fn process_transaction(&mut self, blockhash: &str, tx: &RpcTransaction) -> Result<()> {
        let mut op_return_vout = None;
        let mut op_return_count = 0u32;

        for (index, out) in tx.vout.iter().enumerate() {
            let tokens = decode_script_hex(&out.script_pub_key.hex);
            if tokens.first().is_some_and(|t| t.is_op_return()) {
                op_return_vout = Some(index);
                op_return_count += 1;
            }
        }

        // Inputs are consumed before dispatch; the first-seen signature and
        // its total feed the fallback path.
        let (first_sig, consumed) = self.spend_inputs(tx).await?;

        let dispatch = op_return_vout.and_then(|index| {
            let tokens = decode_script_hex(&tx.vout[index].script_pub_key.hex);
            if tokens.len() > 2 && tokens[0].is_op_return() && tokens[1].is_push_of(SYM_P) {
                ProtocolOp::from_token(&tokens[2]).map(|op| (op, index as u32, tokens))
            } else {
                None
            }
        });

        match dispatch {
            Some((op, vout, tokens)) if op_return_count == 1 && tx.vout.len() >= 2 => match op {
                ProtocolOp::Deploy => self.index_deploy(blockhash, vout, tx, &tokens).await,
                ProtocolOp::Mint => self.index_mint(tx, &tokens).await,
                ProtocolOp::Transfer => self.index_transfer(tx, &tokens).await,
            },
            _ => self.associate_fallback(tx, first_sig, consumed).await,
        }
    }

    /// Moves every consumed token-bearing input to its spent record and
    /// debits the owner balance, floored at zero. Returns the first distinct
    /// (ticker, id) signature seen and its accumulated amount.
    async fn spend_inputs(&self, tx: &RpcTransaction) -> Result<(Option<(String, u64)>, u128)> {
        let mut first_sig: Option<(String, u64)> = None;
        let mut consumed: u128 = 0;

        for input in &tx.vin {
            let Some((txid, vout)) = input.outpoint() else {
                continue;
            };
            let key = keys::utxo(txid, vout);
            let old = match self.ledger.get_json::<TokenUtxo>(&key).await {
                Ok(Some(utxo)) => utxo,
                _ => continue,
            };

            let balance_key = keys::balance(&old.addr, &old.tick, old.id);
            let amount = self.ledger.get_amount(&balance_key).await?;
            let debited = amount.saturating_sub(old.amt);
            self.ledger.put(&balance_key, &debited.to_string()).await?;
            self.ledger.put_spent(&old).await?;

            let sig = (old.tick.clone(), old.id);
            match &first_sig {
                None => {
                    first_sig = Some(sig);
                    consumed += old.amt as u128;
                }
                Some(existing) if *existing == sig => consumed += old.amt as u128,
                Some(_) => {}
            }
        }

        Ok((first_sig, consumed))
    }

    /// Associates consumed tokens of the first input signature with the
    /// first addressable output when the transaction carries no valid
    /// protocol signature. Other consumed signatures are burned.
    async fn associate_fallback(
        &self,
        tx: &RpcTransaction,
        first_sig: Option<(String, u64)>,
        consumed: u128,
    ) -> Result<()> {
        let Some((ticker, id)) = first_sig else {
            return Ok(());
        };
        if consumed == 0 {
            return Ok(());
        }
        let amount = u64::try_from(consumed).unwrap_or(u64::MAX);

        let Some(deployment) = self.get_deployment(&ticker, id).await? else {
            return Ok(());
        };

        for (index, out) in tx.vout.iter().enumerate() {
            let tokens = decode_script_hex(&out.script_pub_key.hex);
            if tokens.first().is_some_and(|t| t.is_op_return()) {
                continue;
            }
            let Some(to_address) = address::from_script_hex(&out.script_pub_key.hex, self.network)
            else {
                continue;
            };

            let balance_key = keys::balance(&to_address, &deployment.tick, deployment.id);
            let current = self.ledger.get_amount(&balance_key).await?;
            self.ledger
                .put(&balance_key, &current.saturating_add(amount).to_string())
                .await?;
            self.ledger
                .put_utxo(&TokenUtxo {
                    addr: to_address,
                    txid: tx.txid.clone(),
                    vout: index as u32,
                    tick: deployment.tick.clone(),
                    id: deployment.id,
                    amt: amount,
                })
                .await?;
            break;
        }

        Ok(())
    }

    /// Credits a target output: bumps the owner balance and records the
    /// live UTXO.
    pub(crate) async fn credit_output(&self, utxo: &TokenUtxo) -> Result<()> {
        let balance_key = keys::balance(&utxo.addr, &utxo.tick, utxo.id);
        let current = self.ledger.get_amount(&balance_key).await?;
        self.ledger
            .put(&balance_key, &current.saturating_add(utxo.amt).to_string())
            .await?;
        self.ledger.put_utxo(utxo).await
    }

    pub async fn get_deployment(&self, ticker: &str, id: u64) -> Result<Option<Deployment>> {
        self.ledger.get_json(&keys::deployment(ticker, id)).await
    }

    pub async fn get_balance(
        &self,
        address: &str,
        ticker: &str,
        id: u64,
    ) -> Result<Option<Balance>> {
        let Some(deployment) = self.get_deployment(ticker, id).await? else {
            return Ok(None);
        };
        let Some(raw) = self.ledger.get(&keys::balance(address, ticker, id)).await? else {
            return Ok(None);
        };
        let amount = raw.parse().unwrap_or(0);
        Ok(Some(Balance::new(&deployment, amount)))
    }

    pub async fn get_collectible(
        &self,
        address: &str,
        number: u64,
    ) -> Result<Option<CollectionAttachment>> {
        self.ledger.get_json(&keys::collection(address, number)).await
    }

    pub async fn get_collectible_max(&self, address: &str) -> Result<Option<u64>> {
        Ok(self
            .ledger
            .get(&keys::collection_max(address))
            .await?
            .and_then(|value| value.parse().ok()))
    }

    /// Resolves an output script token stream to its OP_RETURN status.
    pub(crate) fn output_is_op_return(tokens: &[ScriptToken]) -> bool {
        tokens.first().is_some_and(|t| t.is_op_return())
    }

    async fn parsed_control(&self, key: &str) -> Result<Option<u64>> {
        Ok(self
            .ledger
            .control_get(key)
            .await?
            .and_then(|value| value.parse().ok()))
    }
}
