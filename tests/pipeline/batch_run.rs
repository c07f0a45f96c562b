use crate::common::test_utils::{candidates, run_date, Workspace, ASSET_DESCRIPTOR, OPAQUE_DESCRIPTOR};
use crate::common::{runner, FakeProber, RecordingSink};
use canister_research::core::{Category, UnknownReason};
use canister_research::config::ResearchConfig;
use canister_research::core::ResearchRecord;
use canister_research::store::ResultStore;
use canister_research::{Classifier, ResearchError};

fn scripted() -> FakeProber {
    FakeProber::new()
        .token("odin-a", "Xyz", "xyz•ODIN")
        .token("ckbtc", "ckBTC", "ckBTC")
        .index("icp-index", "icp-ledger")
        .token("icp-ledger", "Internet Computer", "ICP")
        .descriptor("assets", ASSET_DESCRIPTOR)
        .descriptor("greeter", OPAQUE_DESCRIPTOR)
        .token("mystery", "Mystery", "MYS")
        .unreachable("down")
}

const UNIVERSE: &[&str] = &[
    "odin-a", "ckbtc", "icp-index", "assets", "silent", "greeter", "mystery", "down",
];

#[tokio::test]
async fn full_batch_partitions_results_and_writes_labels() {
    let ws = Workspace::new();
    let sink = RecordingSink::new();
    let runner = runner(scripted(), Some(&sink));
    let mut store = ResultStore::new();
    let mut tracker = ws.tracker(3);

    let summary = runner
        .run(&candidates(UNIVERSE), &mut store, &mut tracker)
        .await
        .unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.processed, 8);
    assert_eq!(summary.identified, 4);
    assert_eq!(summary.unknown, 4);
    assert_eq!(summary.sink_failures, 0);

    let identified = Workspace::read_records(&ws.paths.identified);
    let projects: Vec<(&str, &str)> = identified
        .iter()
        .map(|r| (r.canister_id.as_str(), r.project.as_deref().unwrap()))
        .collect();
    assert_eq!(
        projects,
        vec![
            ("odin-a", "ODIN.fun"),
            ("ckbtc", "ckBTC Ledger"),
            ("icp-index", "ICP Index"),
            ("assets", "Asset Canister"),
        ]
    );
    assert!(identified.iter().all(|r| r.reason.is_none()));
    assert_eq!(identified[2].category, Some(Category::NnsInfrastructure));
    assert_eq!(identified[2].ledger_id.as_ref().map(|l| l.as_str()), Some("icp-ledger"));
    assert!(identified.iter().all(|r| r.last_researched == run_date()));

    let unknown = Workspace::read_records(&ws.paths.unknown);
    let reasons: Vec<(&str, UnknownReason)> = unknown
        .iter()
        .map(|r| (r.canister_id.as_str(), r.reason.unwrap()))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("silent", UnknownReason::NoDescriptor),
            ("greeter", UnknownReason::DescriptorUnrecognized),
            ("mystery", UnknownReason::TokenUnknownProject),
            ("down", UnknownReason::NoDescriptor),
        ]
    );
    assert!(unknown.iter().all(|r| r.project.is_none()));
    assert_eq!(unknown[2].token_symbol.as_deref(), Some("MYS"));
    assert_eq!(unknown[1].descriptor_excerpt.as_deref(), Some(OPAQUE_DESCRIPTOR));

    // labels go out only for identified results, in processing order
    let labeled: Vec<String> = sink.labels().into_iter().map(|(id, _)| id).collect();
    assert_eq!(labeled, vec!["odin-a", "ckbtc", "icp-index", "assets"]);

    let progress: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&ws.progress).unwrap()).unwrap();
    assert_eq!(progress["total_canisters"], 8);
    assert_eq!(progress["researched"], 8);
    assert_eq!(progress["identified"], 4);
    assert_eq!(progress["unknown_documented"], 4);
    assert_eq!(progress["remaining"], 0);
    assert_eq!(progress["last_canister_id"], "down");
}

#[tokio::test]
async fn unknown_reasons_use_canonical_names_on_disk() {
    let ws = Workspace::new();
    let runner = runner(scripted(), None);
    let mut store = ResultStore::new();
    let mut tracker = ws.tracker(10);

    runner
        .run(&candidates(&["silent", "greeter"]), &mut store, &mut tracker)
        .await
        .unwrap();

    let raw = std::fs::read_to_string(&ws.paths.unknown).unwrap();
    assert!(raw.contains("\"reason\": \"no_descriptor\""));
    assert!(raw.contains("\"reason\": \"descriptor_unrecognized\""));
    let identified = std::fs::read_to_string(&ws.paths.identified).unwrap();
    assert_eq!(identified.trim(), "[]");
}

#[tokio::test]
async fn sink_failure_keeps_identified_record() {
    let ws = Workspace::new();
    let sink = RecordingSink::new().failing_for("ckbtc");
    let runner = runner(scripted(), Some(&sink));
    let mut store = ResultStore::new();
    let mut tracker = ws.tracker(10);

    let summary = runner
        .run(&candidates(&["ckbtc", "odin-a"]), &mut store, &mut tracker)
        .await
        .unwrap();

    assert_eq!(summary.sink_failures, 1);
    assert_eq!(summary.identified, 2);
    assert_eq!(sink.writes().len(), 2);
    let saved = ResultStore::load(&ws.paths).unwrap();
    assert_eq!(saved.identified().len(), 2);

    // a later re-sync retries the write
    let retry = RecordingSink::new();
    let report = canister_research::sink::resync(&saved, &retry).await;
    assert_eq!(report.succeeded, 2);
    assert_eq!(retry.labels()[0], ("ckbtc".to_string(), "ckBTC Ledger".to_string()));
}

#[tokio::test]
async fn unwritable_output_aborts_before_any_probe() {
    let ws = Workspace::new();
    std::fs::create_dir_all(&ws.paths.identified).unwrap();
    let runner = runner(scripted(), None);
    let mut store = ResultStore::new();
    let mut tracker = ws.tracker(10);

    let result = runner
        .run(&candidates(UNIVERSE), &mut store, &mut tracker)
        .await;

    assert!(result.is_err());
    assert!(runner.collector().prober().calls().is_empty());
    assert!(!ws.paths.unknown.exists());
    assert!(!ws.progress.exists());
}

#[tokio::test]
async fn candidates_are_processed_in_input_order() {
    let ws = Workspace::new();
    let runner = runner(scripted(), None);
    let mut store = ResultStore::new();
    let mut tracker = ws.tracker(10);

    let order = ["greeter", "odin-a", "silent", "assets"];
    runner
        .run(&candidates(&order), &mut store, &mut tracker)
        .await
        .unwrap();

    assert_eq!(runner.collector().prober().probed(), order);
}

#[tokio::test]
async fn checkpoint_lands_on_disk_before_the_run_ends() {
    let ws = Workspace::new();
    let prober = scripted().snapshot_on("assets", &ws.paths.identified);
    let runner = runner(prober, None);
    let mut store = ResultStore::new();
    let mut tracker = ws.tracker(2);

    runner
        .run(&candidates(&["odin-a", "ckbtc", "assets", "silent"]), &mut store, &mut tracker)
        .await
        .unwrap();

    // the third descriptor probe starts after the first interval's flush
    let text = runner
        .collector()
        .prober()
        .snapshot()
        .expect("identified file written by the first checkpoint");
    let flushed: Vec<ResearchRecord> = serde_json::from_str(&text).unwrap();
    let ids: Vec<&str> = flushed.iter().map(|r| r.canister_id.as_str()).collect();
    assert_eq!(ids, vec!["odin-a", "ckbtc"]);

    assert_eq!(Workspace::read_records(&ws.paths.identified).len(), 3);
}

#[test]
fn blank_descriptor_project_in_config_is_refused() {
    let text = r#"
[[rules.descriptor_rules]]
name = "blank"
markers = ["foo", "bar"]
project = ""
category = "other"
"#;
    let err = ResearchConfig::from_toml_str(text)
        .and_then(|config| Classifier::new(config.rules))
        .unwrap_err();
    assert!(matches!(err, ResearchError::Config(_)));
}
