//! Periodic task orchestration.
//!
//! Two independent tasks: block indexing and the supply audit. Each holds
//! its own re-entrancy guard so it never overlaps with itself; the two may
//! run concurrently with each other. Shutdown lets an in-progress cycle
//! finish, then waits for the in-progress marker to clear.

use pipe_config::SchedulerConfig;
use pipe_ledger::{audit_supply, IndexOutcome, Indexer, ProjectionSync};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

pub struct Scheduler {
    indexer: Arc<Mutex<Indexer>>,
    projection: Arc<dyn ProjectionSync>,
    config: SchedulerConfig,
    indexing: Arc<AtomicBool>,
    auditing: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        indexer: Indexer,
        projection: Arc<dyn ProjectionSync>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            indexer: Arc::new(Mutex::new(indexer)),
            projection,
            config,
            indexing: Arc::new(AtomicBool::new(false)),
            auditing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs both tasks until Ctrl-C, then drains them and waits for the
    /// ledger to reach quiescence.
    pub async fn run(self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ledger = self.indexer.lock().await.ledger().clone();

        let index_task = tokio::spawn(Self::index_loop(
            self.indexer.clone(),
            self.indexing.clone(),
            Duration::from_secs(self.config.index_interval_secs),
            shutdown_rx.clone(),
        ));

        let audit_task = tokio::spawn(Self::audit_loop(
            ledger,
            self.projection.clone(),
            self.auditing.clone(),
            Duration::from_secs(self.config.audit_interval_secs),
            shutdown_rx,
        ));

        info!("Scheduler started");

        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to listen for shutdown signal");
        }
        info!("Shutting down");

        let _ = shutdown_tx.send(true);
        let _ = index_task.await;
        let _ = audit_task.await;

        self.indexer.lock().await.close().await;
        info!("Scheduler stopped");
    }

    async fn index_loop(
        indexer: Arc<Mutex<Indexer>>,
        indexing: Arc<AtomicBool>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if indexing.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                    Self::index_cycle(&indexer).await;
                    indexing.store(false, Ordering::SeqCst);
                }
                _ = shutdown.changed() => return,
            }
        }
    }

    async fn index_cycle(indexer: &Mutex<Indexer>) {
        let mut indexer = indexer.lock().await;
        if !indexer.must_index().await {
            return;
        }
        match indexer.index().await {
            Ok(IndexOutcome::Reorg) => {
                if let Err(e) = indexer.cleanup().await {
                    error!("Rollback failed: {}", e);
                }
            }
            Ok(IndexOutcome::AlreadyAnalysed) => indexer.fix_block().await,
            Ok(IndexOutcome::Ok) => {}
            Err(e) => warn!("Indexing cycle deferred: {}", e),
        }
    }

    async fn audit_loop(
        ledger: pipe_ledger::BlockLedger,
        projection: Arc<dyn ProjectionSync>,
        auditing: Arc<AtomicBool>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if auditing.swap(true, Ordering::SeqCst) {
                        continue;
                    }
                    if let Err(e) = audit_supply(&ledger, projection.as_ref()).await {
                        warn!("Supply audit failed: {}", e);
                    }
                    auditing.store(false, Ordering::SeqCst);
                }
                _ = shutdown.changed() => return,
            }
        }
    }
}
