use crate::common::test_utils::{candidates, Workspace, OPAQUE_DESCRIPTOR};
use crate::common::{runner, FakeProber};
use canister_research::core::RecordStatus;
use canister_research::reconcile::merge;
use canister_research::store::{ResultStore, StorePaths};

/// Two runs over overlapping slices of the universe, the second one
/// identifying a candidate the first could not.
async fn two_runs(ws: &Workspace) -> (ResultStore, ResultStore) {
    let first = runner(
        FakeProber::new()
            .token("A", "Chain Key Bitcoin", "ckBTC")
            .descriptor("B", OPAQUE_DESCRIPTOR),
        None,
    );
    let mut store_a = ResultStore::new();
    first
        .run(&candidates(&["A", "B"]), &mut store_a, &mut ws.tracker(10))
        .await
        .unwrap();

    let other = Workspace::new();
    let second = runner(
        FakeProber::new()
            .token("B", "Odin Thing", "thing•ODIN")
            .token("C", "Chain Key Ether", "ckETH"),
        None,
    );
    let mut store_b = ResultStore::new();
    second
        .run(&candidates(&["B", "C"]), &mut store_b, &mut other.tracker(10))
        .await
        .unwrap();
    (store_a, store_b)
}

#[tokio::test]
async fn merge_promotes_and_computes_unresearched() {
    let ws = Workspace::new();
    let (a, b) = two_runs(&ws).await;
    assert_eq!(a.status_of(&"B".into()), Some(RecordStatus::Unknown));

    let view = merge(&[b.clone(), a.clone()]);
    assert_eq!(view.status_of(&"B".into()), Some(RecordStatus::Identified));
    assert_eq!(view.identified().count(), 3);
    assert_eq!(view.unknown().count(), 0);
    assert_eq!(view.category_counts().get("token"), Some(&3));

    let universe = candidates(&["E", "A", "B", "C", "D"]);
    let ids: Vec<&str> = view
        .unresearched(&universe)
        .iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(ids, vec!["E", "D"]);
}

#[tokio::test]
async fn merging_twice_is_byte_identical() {
    let ws = Workspace::new();
    let (a, b) = two_runs(&ws).await;
    let stores = [a, b];

    let first = merge(&stores).to_json().unwrap();
    let second = merge(&stores).to_json().unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[tokio::test]
async fn merged_view_round_trips_through_store_files() {
    let ws = Workspace::new();
    let (a, b) = two_runs(&ws).await;
    let view = merge(&[a, b]);
    let fingerprint = view.fingerprint().unwrap();

    let out = StorePaths::new(ws.path("merged/identified.json"), ws.path("merged/unknown.json"));
    view.save(&out).unwrap();

    let reloaded = ResultStore::load(&out).unwrap();
    assert_eq!(reloaded.len(), 3);
    assert_eq!(merge(&[reloaded]).fingerprint().unwrap(), fingerprint);
}
