// Property-based tests for the merge passes.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeSet;

use proptest::prelude::*;
use shipledger_recon::costs::find_discrepancies;
use shipledger_recon::dedupe::dedupe_clusters;
use shipledger_recon::po_merge::merge_by_purchase_orders;
use shipledger_recon::tuple_merge::{merge_by_tracking_tuples, ClusterIndex};
use shipledger_recon::{Cluster, TrackingTuple};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

const GROUPS: [&str; 2] = ["usa", "bfmr"];

fn names(prefix: &str, picks: &BTreeSet<u8>) -> BTreeSet<String> {
    picks.iter().map(|n| format!("{prefix}{n}")).collect()
}

/// Clusters drawing trackings from a small shared pool, so overlaps are common.
fn arb_overlapping_clusters() -> impl Strategy<Value = Vec<Cluster>> {
    prop::collection::vec(
        (0..GROUPS.len(), prop::collection::btree_set(0u8..12, 0..4)),
        0..12,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .map(|(group, trackings)| Cluster {
                group: Some(GROUPS[group].to_string()),
                trackings: names("t", &trackings),
                ..Cluster::default()
            })
            .collect()
    })
}

/// Clusters with private, non-empty tracking sets and a random pick of shared POs.
fn arb_disjoint_clusters() -> impl Strategy<Value = Vec<Cluster>> {
    prop::collection::vec(
        (
            0..GROUPS.len(),
            1usize..4,
            prop::collection::btree_set(0u8..6, 0..3),
        ),
        1..12,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (group, n_trackings, pos))| Cluster {
                group: Some(GROUPS[group].to_string()),
                orders: BTreeSet::from([format!("o{i}")]),
                trackings: (0..n_trackings).map(|j| format!("t{i}_{j}")).collect(),
                purchase_orders: names("PO", &pos),
                ..Cluster::default()
            })
            .collect()
    })
}

fn all_trackings(clusters: &[Cluster]) -> BTreeSet<String> {
    clusters.iter().flat_map(|c| c.trackings.iter().cloned()).collect()
}

// ===========================================================================
// Dedupe
// ===========================================================================

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn dedupe_is_idempotent(clusters in arb_overlapping_clusters()) {
        let once = dedupe_clusters(clusters);
        let twice = dedupe_clusters(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn dedupe_leaves_disjoint_clusters(clusters in arb_overlapping_clusters()) {
        let out = dedupe_clusters(clusters.clone());
        for (i, a) in out.iter().enumerate() {
            prop_assert!(!a.trackings.is_empty());
            for b in &out[i + 1..] {
                prop_assert!(a.trackings.is_disjoint(&b.trackings),
                    "{:?} overlaps {:?}", a.trackings, b.trackings);
            }
        }
        // Survivors keep their input order.
        let mut input = clusters.iter();
        for kept in &out {
            prop_assert!(input.any(|c| c == kept), "survivor not found in input order");
        }
    }
}

// ===========================================================================
// Purchase-order merge
// ===========================================================================

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn po_merge_reaches_fixed_point(clusters in arb_disjoint_clusters()) {
        let before = all_trackings(&clusters);
        let total: usize = clusters.iter().map(|c| c.trackings.len()).sum();

        let out = merge_by_purchase_orders(clusters);

        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                let linked = a.group == b.group
                    && !a.purchase_orders.is_empty()
                    && !a.purchase_orders.is_disjoint(&b.purchase_orders);
                prop_assert!(!linked, "clusters still share a PO: {:?} / {:?}",
                    a.purchase_orders, b.purchase_orders);
            }
        }
        prop_assert_eq!(all_trackings(&out), before);
        prop_assert_eq!(out.iter().map(|c| c.trackings.len()).sum::<usize>(), total);
        prop_assert_eq!(merge_by_purchase_orders(out.clone()).len(), out.len());
    }
}

// ===========================================================================
// Tuple merge
// ===========================================================================

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn tuple_trackings_resolve_to_one_cluster(
        clusters in arb_disjoint_clusters(),
        picks in prop::collection::vec(prop::collection::vec((0usize..14, 0usize..3), 1..4), 0..8),
    ) {
        let before = all_trackings(&clusters);
        let count = clusters.len();

        // Index 12 and 13 name trackings no cluster holds.
        let tuples: Vec<TrackingTuple> = picks
            .iter()
            .map(|tuple| TrackingTuple::new(tuple.iter().map(|(i, j)| format!("t{i}_{j}"))))
            .collect();

        let mut index = ClusterIndex::build(clusters);
        let merges = merge_by_tracking_tuples(&mut index, tuples.iter());

        for tuple in tuples.iter().filter(|t| t.len() >= 2) {
            let slots: BTreeSet<usize> =
                tuple.trackings().iter().filter_map(|t| index.lookup(t)).collect();
            prop_assert!(slots.len() <= 1, "tuple {} spans slots {:?}", tuple, slots);
            if let Some(&slot) = slots.iter().next() {
                prop_assert!(index.get(slot).is_some(), "tuple {} points at a consumed slot", tuple);
            }
        }

        prop_assert_eq!(index.len(), count - merges);
        let out = index.into_clusters();
        prop_assert_eq!(all_trackings(&out), before);
    }
}

// ===========================================================================
// Discrepancies
// ===========================================================================

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn discrepancies_exceed_tolerance_and_sort(
        costs in prop::collection::vec((0u32..500, 0u32..500), 0..20),
        tolerance in 0u32..50,
    ) {
        let clusters: Vec<Cluster> = costs
            .iter()
            .enumerate()
            .map(|(i, (expected, tracked))| Cluster {
                trackings: BTreeSet::from([format!("t{i}")]),
                expected_cost: f64::from(*expected),
                tracked_cost: f64::from(*tracked),
                ..Cluster::default()
            })
            .collect();
        let tolerance = f64::from(tolerance);

        let found = find_discrepancies(&clusters, tolerance);

        let expected_count = costs
            .iter()
            .filter(|(e, t)| f64::from(*e) > f64::from(*t) + tolerance)
            .count();
        prop_assert_eq!(found.len(), expected_count);
        for d in &found {
            prop_assert!(d.shortfall > tolerance);
        }
        for pair in found.windows(2) {
            prop_assert!(pair[0].shortfall >= pair[1].shortfall);
        }
    }
}
