use crate::common::test_utils::{candidates, Workspace};
use crate::common::{runner, FakeProber};
use canister_research::core::ResearchRecord;
use canister_research::store::ResultStore;
use serde_json::json;

fn seed_store(ws: &Workspace) {
    let records: Vec<ResearchRecord> = vec![
        serde_json::from_value(json!({
            "canister_id": "A", "project": "ODIN.fun", "category": "token",
            "reason": null, "notes": "", "is_token": true,
            "token_name": "A", "token_symbol": "a•ODIN", "ledger_id": null,
            "last_researched": "2025-11-01"
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "canister_id": "B", "project": null, "category": null,
            "reason": "no_candid_metadata", "notes": "", "is_token": false,
            "token_name": null, "token_symbol": null, "ledger_id": null,
            "last_researched": "2025-11-01"
        }))
        .unwrap(),
    ];
    ResultStore::from_records(records)
        .unwrap()
        .save(&ws.paths)
        .unwrap();
}

fn write_stale_progress(ws: &Workspace) {
    let stale = json!({
        "total_canisters": 4, "researched": 3, "identified": 3,
        "unknown_documented": 0, "remaining": 1,
        "last_canister_id": "C", "last_updated": "2025-11-01T10:00:00Z"
    });
    std::fs::write(&ws.progress, stale.to_string()).unwrap();
}

#[test]
fn remaining_comes_from_membership_not_stale_counters() {
    let ws = Workspace::new();
    seed_store(&ws);
    write_stale_progress(&ws);

    let store = ResultStore::load(&ws.paths).unwrap();
    let universe = candidates(&["A", "B", "C", "D"]);
    let mut tracker = ws.tracker(10);
    let pending = tracker.start(&universe, &store);

    let ids: Vec<&str> = pending.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["C", "D"]);
    assert_eq!(tracker.progress().researched, 2);
    assert_eq!(tracker.progress().remaining, 2);
}

#[tokio::test]
async fn restarted_batch_probes_only_missing_candidates() {
    let ws = Workspace::new();
    seed_store(&ws);
    write_stale_progress(&ws);

    let prober = FakeProber::new().token("C", "Chain Key Ether", "ckETH");
    let runner = runner(prober, None);
    let mut store = ResultStore::load(&ws.paths).unwrap();
    let mut tracker = ws.tracker(10);

    let summary = runner
        .run(&candidates(&["A", "B", "C", "D"]), &mut store, &mut tracker)
        .await
        .unwrap();

    assert_eq!(runner.collector().prober().probed(), vec!["C", "D"]);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.progress.researched, 4);
    assert_eq!(summary.progress.identified, 2);
    assert_eq!(summary.progress.unknown_documented, 2);
    assert_eq!(summary.progress.remaining, 0);

    let saved = ResultStore::load(&ws.paths).unwrap();
    let identified: Vec<&str> = saved.identified().iter().map(|r| r.canister_id.as_str()).collect();
    assert_eq!(identified, vec!["A", "C"]);
    // legacy reason names are read and written back canonically
    let unknown = std::fs::read_to_string(&ws.paths.unknown).unwrap();
    assert!(unknown.contains("\"no_descriptor\""));
    assert!(!unknown.contains("no_candid_metadata"));
}

#[tokio::test]
async fn rerun_of_finished_batch_changes_nothing() {
    let ws = Workspace::new();
    let universe = candidates(&["X", "Y"]);
    let prober = FakeProber::new().token("X", "Chain Key Bitcoin", "ckBTC");

    let first = runner(prober, None);
    let mut store = ResultStore::new();
    first
        .run(&universe, &mut store, &mut ws.tracker(10))
        .await
        .unwrap();
    let identified = std::fs::read(&ws.paths.identified).unwrap();
    let unknown = std::fs::read(&ws.paths.unknown).unwrap();

    let second = runner(FakeProber::new(), None);
    let mut store = ResultStore::load(&ws.paths).unwrap();
    let summary = second
        .run(&universe, &mut store, &mut ws.tracker(10))
        .await
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert!(second.collector().prober().calls().is_empty());
    assert_eq!(std::fs::read(&ws.paths.identified).unwrap(), identified);
    assert_eq!(std::fs::read(&ws.paths.unknown).unwrap(), unknown);
}
