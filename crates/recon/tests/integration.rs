use std::path::PathBuf;

use shipledger_recon::loader::CsvSources;
use shipledger_recon::{run, ClusterStore, NoProgress, ReconConfig, ReconError, ReconResult};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("recon.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn run_with(config: &ReconConfig, existing: Vec<shipledger_recon::Cluster>) -> ReconResult {
    let mut sources = CsvSources::open(&fixtures_dir(), &config.data).unwrap();
    run(config, existing, sources.sources(), &mut NoProgress).unwrap()
}

fn cluster_with<'a>(result: &'a ReconResult, tracking: &str) -> &'a shipledger_recon::Cluster {
    result
        .clusters
        .iter()
        .find(|c| c.trackings.contains(tracking))
        .unwrap_or_else(|| panic!("no cluster holds {tracking}"))
}

// -------------------------------------------------------------------------
// Full pass over the fixture files
// -------------------------------------------------------------------------

#[test]
fn fixture_run_clusters() {
    let result = run_with(&fixture_config(), Vec::new());

    assert_eq!(result.meta.config_name, "March shipments");
    // personal group and the reconcile=no row are excluded
    assert_eq!(result.summary.trackings_ingested, 8);
    assert_eq!(result.summary.clusters, 5);
    assert_eq!(result.summary.po_merges, 1);
    assert_eq!(result.summary.tuple_merges, 1);
    assert!(result.summary.order_failures.is_empty());

    let billed_together = cluster_with(&result, "1Z001");
    assert!(billed_together.trackings.contains("1Z002"));
    assert_eq!(billed_together.expected_cost, 150.0);
    assert_eq!(billed_together.tracked_cost, 150.0);
    assert_eq!(billed_together.email_ids.len(), 2);

    let shared_order = cluster_with(&result, "1Z004");
    assert!(shared_order.trackings.contains("1Z005"));
    assert_eq!(shared_order.last_ship_date, "2024-03-06");
    assert_eq!(shared_order.expected_cost, 1050.0);
    assert_eq!(shared_order.tracked_cost, 1050.0);
    assert!(shared_order.non_reimbursed_trackings.is_empty());

    let shared_po = cluster_with(&result, "9400A");
    assert!(shared_po.trackings.contains("9400B"));
    assert!(shared_po.purchase_orders.contains("PO-77"));
    assert_eq!(shared_po.tracked_cost, 50.0);

    assert!(result.clusters.iter().all(|c| !c.trackings.contains("P001")));
    assert!(result.clusters.iter().all(|c| !c.trackings.contains("1Z999")));
}

#[test]
fn fixture_run_discrepancies() {
    let result = run_with(&fixture_config(), Vec::new());

    assert_eq!(result.summary.discrepancies, 2);
    assert_eq!(result.summary.total_expected, 1345.0);
    assert_eq!(result.summary.total_tracked, 1270.0);

    // largest shortfall first
    let first = &result.discrepancies[0];
    assert!(first.trackings.contains("9400C"));
    assert_eq!(first.shortfall, 70.0);
    assert_eq!(first.cancelled_items, vec!["USB hub".to_string()]);
    assert!(first.purchase_orders.contains("PO-88"));

    let second = &result.discrepancies[1];
    assert!(second.trackings.contains("1Z003"));
    assert_eq!(second.shortfall, 5.0);
}

#[test]
fn fixture_run_unknowns() {
    let result = run_with(&fixture_config(), Vec::new());

    assert_eq!(result.unknowns.tuples, vec![("usa".to_string(), "1Z404".to_string())]);
    assert_eq!(result.unknowns.purchase_orders, vec!["PO-88".to_string()]);
    assert_eq!(result.unknowns.po_trackings, vec!["9400Z".to_string()]);
}

#[test]
fn tolerance_hides_small_shortfalls() {
    let toml = std::fs::read_to_string(fixtures_dir().join("recon.toml"))
        .unwrap()
        .replace("print_unknowns = true", "print_unknowns = true\ntolerance = 5.0");
    let config = ReconConfig::from_toml(&toml).unwrap();
    let result = run_with(&config, Vec::new());

    // 1Z003 is short by exactly 5.00, which is not more than the tolerance
    assert_eq!(result.discrepancies.len(), 1);
    assert!(result.discrepancies[0].trackings.contains("9400C"));
}

#[test]
fn scoped_run_leaves_other_groups_untouched() {
    let config = fixture_config().with_scope(vec!["bfmr".into()]).unwrap();
    let result = run_with(&config, Vec::new());

    assert_eq!(result.meta.groups, Some(vec!["bfmr".to_string()]));
    // usa portal was not consulted, so usa clusters carry no tracked cost
    assert_eq!(cluster_with(&result, "1Z003").tracked_cost, 0.0);
    assert_eq!(cluster_with(&result, "9400A").tracked_cost, 50.0);
    assert!(result.unknowns.tuples.is_empty());
}

// -------------------------------------------------------------------------
// Collisions and upstream failures
// -------------------------------------------------------------------------

#[test]
fn colliding_reimbursements_abort() {
    let mut config = fixture_config();
    config.data.non_portal_po_costs = Some("colliding_po_costs.csv".into());

    let mut sources = CsvSources::open(&fixtures_dir(), &config.data).unwrap();
    let err = run(&config, Vec::new(), sources.sources(), &mut NoProgress).unwrap_err();
    match err {
        ReconError::ReimbursementCollision { purchase_orders, tuples } => {
            assert_eq!(purchase_orders, vec!["PO-77".to_string()]);
            assert!(tuples.is_empty());
        }
        other => panic!("expected collision, got {other}"),
    }
}

#[test]
fn missing_cancellation_file_is_not_fatal() {
    let mut config = fixture_config();
    config.data.cancellations = Some("nope.csv".into());
    let result = run_with(&config, Vec::new());
    assert!(cluster_with(&result, "9400C").cancelled_items.is_empty());
}

#[test]
fn missing_trackings_file_fails_open() {
    let mut config = fixture_config();
    config.data.trackings = "nope.csv".into();
    let err = CsvSources::open(&fixtures_dir(), &config.data).err().unwrap();
    assert!(matches!(err, ReconError::ReadFile { .. }), "{err}");
}

// -------------------------------------------------------------------------
// Store round trip and resume
// -------------------------------------------------------------------------

#[test]
fn resume_from_store_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = ClusterStore::new(dir.path().join("clusters.json"));
    let config = fixture_config();

    let first = run_with(&config, Vec::new());
    store.save(first.clusters.clone()).unwrap();

    let seeded = store.load().unwrap();
    assert_eq!(seeded.len(), first.clusters.len());

    let second = run_with(&config, seeded);
    assert_eq!(second.summary.clusters, first.summary.clusters);
    assert_eq!(second.summary.po_merges, 0);
    assert_eq!(second.summary.tuple_merges, 0);
    assert_eq!(second.summary.total_expected, first.summary.total_expected);
    assert_eq!(second.summary.total_tracked, first.summary.total_tracked);
    assert_eq!(second.discrepancies.len(), first.discrepancies.len());
}

#[test]
fn result_serializes_to_json() {
    let result = run_with(&fixture_config(), Vec::new());
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["summary"]["clusters"], 5);
    assert_eq!(json["discrepancies"][0]["shortfall"], 70.0);
    assert!(json["meta"]["engine_version"].is_string());
}
