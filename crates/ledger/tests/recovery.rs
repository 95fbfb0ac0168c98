//! Checkpoint, reorg rollback, and crash-marker behavior.

mod common;

use common::*;
use pipe_ledger::{keys, IndexOutcome};
use std::time::Duration;

const TICK_AB: &[u8] = &[0x1c];
const TICK_C: &[u8] = &[0x03];

#[tokio::test]
async fn test_init_resumes_after_committed_block() {
    let (mut indexer, _) = indexer();
    indexer
        .ledger()
        .control_put(keys::LAST_BLOCK, "810123")
        .await
        .unwrap();

    indexer.init().await.unwrap();
    assert_eq!(indexer.current_height(), 810_124);
}

#[tokio::test]
async fn test_init_starts_at_genesis_on_empty_store() {
    let (mut indexer, _) = indexer();
    indexer.init().await.unwrap();
    assert_eq!(indexer.current_height(), pipe_config::GENESIS_HEIGHT);
}

#[tokio::test]
async fn test_process_block_commits_checkpoint() {
    let (mut indexer, _) = indexer();
    indexer.set_height(810_100);
    indexer.process_block("hash100", &[]).await.unwrap();

    let ledger = indexer.ledger();
    assert_eq!(
        ledger.control_get(keys::LAST_BLOCK).await.unwrap().as_deref(),
        Some("810100")
    );
    assert_eq!(
        ledger
            .control_get(keys::LAST_BLOCK_HASH)
            .await
            .unwrap()
            .as_deref(),
        Some("hash100")
    );
    assert_eq!(
        ledger
            .control_get(keys::BLOCK_CHECK)
            .await
            .unwrap()
            .as_deref(),
        Some("810100")
    );
    assert!(!ledger.control_contains(keys::MARKER).await.unwrap());
}

#[tokio::test]
async fn test_already_analysed_before_any_rpc() {
    let (mut indexer, _) = indexer();
    indexer.set_height(810_100);
    indexer
        .ledger()
        .control_put(keys::BLOCK_CHECK, "810100")
        .await
        .unwrap();

    let outcome = indexer.index_once().await.unwrap();
    assert!(matches!(outcome, IndexOutcome::AlreadyAnalysed));
}

#[tokio::test]
async fn test_reorg_flag_short_circuits_cycle() {
    let (mut indexer, _) = indexer();
    indexer.set_height(810_100);
    indexer
        .ledger()
        .control_put(keys::REORG, "")
        .await
        .unwrap();

    let outcome = indexer.index_once().await.unwrap();
    assert!(matches!(outcome, IndexOutcome::Reorg));
}

#[tokio::test]
async fn test_cleanup_unwinds_recent_window() {
    let (mut indexer, projection) = indexer();

    // A deployment older than the reorg window survives the rollback.
    indexer.set_height(810_080);
    let old = tx(
        "d0",
        vec![input("aa", 0)],
        &[&p2wpkh(1), &deploy_script(TICK_C, 1, 0, 0, "100", "100")],
    );
    indexer.process_block("hash080", &[old]).await.unwrap();

    indexer.set_height(810_100);
    let deploy = tx(
        "d1",
        vec![input("aa", 1)],
        &[&p2wpkh(1), &deploy_script(TICK_AB, 1, 0, 2, "100", "10")],
    );
    indexer.process_block("hash100", &[deploy]).await.unwrap();

    indexer.set_height(810_101);
    let mint = tx(
        "m1",
        vec![input("bb", 0)],
        &[&p2wpkh(2), &mint_script(TICK_AB, 1, 0, "10")],
    );
    indexer.process_block("hash101", &[mint]).await.unwrap();

    indexer.set_height(810_105);
    indexer
        .ledger()
        .control_put(keys::REORG, "")
        .await
        .unwrap();
    indexer.cleanup().await.unwrap();

    // Everything written inside the window is gone.
    assert!(indexer.get_deployment("ab", 1).await.unwrap().is_none());
    assert!(indexer.ledger().get("utxo_m1_0").await.unwrap().is_none());
    assert!(indexer
        .get_balance(&address_of(&p2wpkh(2)), "ab", 1)
        .await
        .unwrap()
        .is_none());
    assert!(projection.deployment("ab", 1).is_none());
    assert_eq!(projection.utxo_count(), 0);

    // The older deployment is untouched.
    assert!(indexer.get_deployment("c", 1).await.unwrap().is_some());

    // Checkpoint rewound to the window start; the stale tip hash and the
    // flag are cleared.
    let from = 810_105 - pipe_config::REORG_WINDOW;
    assert_eq!(indexer.current_height(), from);
    let ledger = indexer.ledger();
    assert_eq!(
        ledger.control_get(keys::LAST_BLOCK).await.unwrap().as_deref(),
        Some(from.to_string().as_str())
    );
    assert_eq!(
        ledger
            .control_get(keys::BLOCK_CHECK)
            .await
            .unwrap()
            .as_deref(),
        Some(from.to_string().as_str())
    );
    assert!(ledger
        .control_get(keys::LAST_BLOCK_HASH)
        .await
        .unwrap()
        .is_none());
    assert!(!ledger.control_contains(keys::REORG).await.unwrap());
}

#[tokio::test]
async fn test_cleanup_reindex_restores_state() {
    let (mut indexer, _) = indexer();

    indexer.set_height(810_100);
    let deploy = tx(
        "d1",
        vec![input("aa", 0)],
        &[&p2wpkh(1), &deploy_script(TICK_AB, 1, 0, 2, "100", "10")],
    );
    indexer
        .process_block("hash100", &[deploy.clone()])
        .await
        .unwrap();

    indexer.set_height(810_105);
    indexer.cleanup().await.unwrap();
    assert!(indexer.get_deployment("ab", 1).await.unwrap().is_none());

    // Replaying the surviving branch rebuilds the record.
    indexer.set_height(810_100);
    indexer
        .process_block("hash100b", &[deploy])
        .await
        .unwrap();
    let deployment = indexer.get_deployment("ab", 1).await.unwrap().unwrap();
    assert_eq!(deployment.blckh, "hash100b");
}

#[tokio::test]
async fn test_crash_marker_blocks_shutdown() {
    let (indexer, _) = indexer();
    indexer
        .ledger()
        .control_put(keys::MARKER, "")
        .await
        .unwrap();

    let blocked = tokio::time::timeout(Duration::from_millis(300), indexer.close()).await;
    assert!(blocked.is_err());

    indexer
        .ledger()
        .control_delete(keys::MARKER)
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), indexer.close())
        .await
        .expect("close returns once the marker clears");
}

#[tokio::test]
async fn test_failing_transaction_does_not_poison_block() {
    let (mut indexer, _) = indexer();
    indexer.set_height(810_100);

    // Garbage script hex decodes to nothing; the block still commits.
    let garbage = tx("g1", vec![input("aa", 0)], &["zz-not-hex"]);
    let deploy = tx(
        "d1",
        vec![input("aa", 1)],
        &[&p2wpkh(1), &deploy_script(TICK_AB, 1, 0, 2, "100", "10")],
    );
    indexer
        .process_block("hash100", &[garbage, deploy])
        .await
        .unwrap();

    assert!(indexer.get_deployment("ab", 1).await.unwrap().is_some());
    assert_eq!(
        indexer
            .ledger()
            .control_get(keys::LAST_BLOCK)
            .await
            .unwrap()
            .as_deref(),
        Some("810100")
    );
}
