use std::collections::BTreeMap;

use crate::cluster::Cluster;
use crate::config::ReconConfig;
use crate::costs::{
    apply_non_portal_reimbursements, fill_cancellations, fill_expected_costs, fill_tracked_costs,
    find_discrepancies, portal_cost_maps,
};
use crate::dedupe::dedupe_clusters;
use crate::error::Result;
use crate::model::{PortalData, ReconMeta, ReconResult, Tracking, Unknowns};
use crate::po_merge::{assign_purchase_orders, merge_by_purchase_orders, merge_tracking_pos};
use crate::progress::Progress;
use crate::sources::Sources;
use crate::summary::{compute_summary, PassCounts};
use crate::tracking_merge::{group_trackings, update_clusters};
use crate::tuple_merge::{merge_by_tracking_tuples, ClusterIndex};

/// Run one reconciliation pass.
///
/// `existing` seeds the cluster set (empty for a from-scratch run). Nothing is
/// persisted here; on error the caller discards the in-memory state.
pub fn run(
    config: &ReconConfig,
    existing: Vec<Cluster>,
    sources: Sources<'_>,
    progress: &mut dyn Progress,
) -> Result<ReconResult> {
    let mut counts = PassCounts::default();

    // Tracking ingest
    let trackings = reconcilable(config, sources.trackings.trackings()?);
    counts.trackings_ingested = trackings.len();
    let grouped = group_trackings(trackings);

    let mut clusters = dedupe_clusters(existing);
    let seeded = clusters.len();
    update_clusters(&mut clusters, &grouped);
    log::info!(
        "tracking merge: {} trackings -> {} clusters ({seeded} pre-existing)",
        counts.trackings_ingested,
        clusters.len()
    );

    // Portal + override data. The collision check runs before any cost is applied.
    let scoped = config.scoped_groups();
    progress.begin("portals", scoped.len() as u64);
    let mut portals: BTreeMap<String, PortalData> = BTreeMap::new();
    for group in scoped {
        let data = sources.portals.portal_data(&group)?;
        log::info!(
            "group {group}: {} tuple charges, {} PO costs, {} tracking POs",
            data.tuple_costs.len(),
            data.po_costs.len(),
            data.tracking_pos.len()
        );
        portals.insert(group, data);
        progress.advance(1);
    }
    progress.finish();

    let mut maps = portal_cost_maps(&portals);
    apply_non_portal_reimbursements(&mut maps, sources.overrides.non_portal_reimbursements()?)?;

    // Purchase orders
    let manual_pos = sources.overrides.purchase_order_overrides()?;
    let tracking_pos = merge_tracking_pos(
        std::iter::once(&manual_pos).chain(portals.values().map(|p| &p.tracking_pos)),
    );
    let unknown_po_trackings = assign_purchase_orders(&mut clusters, &tracking_pos);

    let before = clusters.len();
    let mut clusters = merge_by_purchase_orders(clusters);
    counts.po_merges = before - clusters.len();

    counts.order_failures = fill_expected_costs(&mut clusters, &mut *sources.orders, progress);

    // Tuple merge must settle cluster identity before tuple costs are attributed.
    let mut index = ClusterIndex::build(clusters);
    counts.tuple_merges = merge_by_tracking_tuples(&mut index, maps.tuple_costs.keys());
    let cost_report = fill_tracked_costs(&mut index, &maps, config.scope());
    let mut clusters = index.into_clusters();

    match sources.cancellations.cancelled_items() {
        Ok(cancelled) => fill_cancellations(&mut clusters, &cancelled),
        Err(e) => {
            log::warn!("cancellations unavailable, leaving clusters unannotated: {e}");
            fill_cancellations(&mut clusters, &Default::default());
        }
    }

    let before = clusters.len();
    let clusters = dedupe_clusters(clusters);
    counts.duplicates_dropped = before - clusters.len();

    let discrepancies = find_discrepancies(&clusters, config.reconcile.tolerance);
    let unknowns = Unknowns {
        tuples: cost_report.unknown_tuples,
        purchase_orders: cost_report.unknown_purchase_orders,
        po_trackings: unknown_po_trackings,
    };
    if config.reconcile.print_unknowns {
        log_unknowns(&unknowns);
    }

    let summary = compute_summary(&clusters, &discrepancies, counts);
    log::info!(
        "reconciled {} clusters: {} discrepancies, expected {:.2}, tracked {:.2}",
        summary.clusters,
        summary.discrepancies,
        summary.total_expected,
        summary.total_tracked
    );

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            groups: config.reconcile.groups.clone(),
        },
        summary,
        clusters,
        discrepancies,
        unknowns,
    })
}

/// Keep trackings flagged for reconciliation whose group is configured to reconcile.
fn reconcilable(config: &ReconConfig, trackings: Vec<Tracking>) -> Vec<Tracking> {
    let total = trackings.len();
    let kept: Vec<Tracking> = trackings
        .into_iter()
        .filter(|t| {
            t.reconcile
                && t.group
                    .as_deref()
                    .map_or(true, |g| config.group_reconciles(g))
        })
        .collect();
    if kept.len() != total {
        log::info!("{} of {total} trackings are not reconcilable", total - kept.len());
    }
    kept
}

fn log_unknowns(unknowns: &Unknowns) {
    for (group, tracking) in &unknowns.tuples {
        log::warn!("unknown tracking for group {group}: {tracking}");
    }
    for po in &unknowns.purchase_orders {
        log::warn!("no cost reported for PO {po}");
    }
    for tracking in &unknowns.po_trackings {
        log::warn!("PO assigned to unknown tracking {tracking}");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::*;
    use crate::error::{ReconError, SourceError};
    use crate::model::{CostMaps, OrderInfo, TrackingTuple, TupleCost};
    use crate::progress::NoProgress;
    use crate::sources::{PortalSource, StaticOverrides};
    use crate::tracking_merge::tests::tracking;

    const CONFIG: &str = r#"
name = "unit"

[groups.usa]
[groups.bfmr]
[groups.quiet]
reconcile = false

[data]
trackings = "t.csv"
order_prices = "o.csv"
"#;

    struct Fixture {
        trackings: Vec<Tracking>,
        prices: HashMap<String, OrderInfo>,
        portals: HashMap<String, PortalData>,
        overrides: StaticOverrides,
        cancellations: HashMap<String, Vec<String>>,
    }

    impl Fixture {
        fn new() -> Self {
            let price = |cost: f64| OrderInfo { cost, email_id: None };
            Self {
                trackings: vec![
                    tracking("a", "usa", &["o1"], "2024-01-01"),
                    tracking("b", "usa", &["o2"], "2024-01-02"),
                    tracking("c", "usa", &["o3"], "2024-01-03"),
                    tracking("d", "bfmr", &["o4"], "2024-01-04"),
                    tracking("q", "quiet", &["o5"], "2024-01-05"),
                ],
                prices: HashMap::from([
                    ("o1".to_string(), price(6.0)),
                    ("o2".to_string(), price(4.0)),
                    ("o3".to_string(), price(5.0)),
                    ("o4".to_string(), price(50.0)),
                    ("o5".to_string(), price(1.0)),
                ]),
                portals: HashMap::new(),
                overrides: StaticOverrides::default(),
                cancellations: HashMap::new(),
            }
        }

        fn run(&mut self, config: &ReconConfig) -> Result<ReconResult> {
            let sources = Sources {
                trackings: &mut self.trackings,
                orders: &mut self.prices,
                portals: &mut self.portals,
                overrides: &mut self.overrides,
                cancellations: &mut self.cancellations,
            };
            run(config, Vec::new(), sources, &mut NoProgress)
        }
    }

    fn config() -> ReconConfig {
        ReconConfig::from_toml(CONFIG).unwrap()
    }

    #[test]
    fn end_to_end_tuple_chain() {
        let mut fx = Fixture::new();
        let mut usa = PortalData::default();
        usa.tuple_costs.insert(TrackingTuple::new(["a", "b"]), 10.0);
        usa.tuple_costs.insert(TrackingTuple::new(["b", "c"]), 5.0);
        fx.portals.insert("usa".into(), usa);

        let result = fx.run(&config()).unwrap();

        // quiet group is excluded; a,b,c collapse; d stays alone.
        assert_eq!(result.summary.trackings_ingested, 4);
        assert_eq!(result.clusters.len(), 2);
        let abc = result.clusters.iter().find(|c| c.trackings.contains("a")).unwrap();
        assert_eq!(abc.trackings.len(), 3);
        assert_eq!(abc.tracked_cost, 15.0);
        assert_eq!(abc.expected_cost, 15.0);
        assert_eq!(result.summary.tuple_merges, 2);

        // d: expected 50, tracked 0.
        assert_eq!(result.discrepancies.len(), 1);
        assert!(result.discrepancies[0].trackings.contains("d"));
    }

    #[test]
    fn purchase_orders_merge_and_price() {
        let mut fx = Fixture::new();
        let mut usa = PortalData::default();
        usa.tracking_pos.insert("a".into(), BTreeSet::from(["PO1".to_string()]));
        usa.tracking_pos.insert("zz".into(), BTreeSet::from(["PO3".to_string()]));
        usa.po_costs.insert("PO1".into(), 10.0);
        fx.portals.insert("usa".into(), usa);
        fx.overrides
            .purchase_orders
            .insert("b".into(), BTreeSet::from(["PO1".to_string(), "PO2".to_string()]));

        let result = fx.run(&config()).unwrap();

        assert_eq!(result.summary.po_merges, 1);
        let ab = result.clusters.iter().find(|c| c.trackings.contains("a")).unwrap();
        assert!(ab.trackings.contains("b"));
        assert_eq!(ab.tracked_cost, 10.0);
        assert_eq!(result.unknowns.purchase_orders, vec!["PO2".to_string()]);
        assert_eq!(result.unknowns.po_trackings, vec!["zz".to_string()]);
    }

    #[test]
    fn collision_aborts_the_run() {
        let mut fx = Fixture::new();
        let mut usa = PortalData::default();
        usa.po_costs.insert("PO1".into(), 10.0);
        fx.portals.insert("usa".into(), usa);
        fx.overrides.reimbursements = CostMaps {
            po_costs: [("PO1".to_string(), 10.0)].into_iter().collect(),
            ..CostMaps::default()
        };

        let err = fx.run(&config()).unwrap_err();
        assert!(matches!(err, ReconError::ReimbursementCollision { .. }), "{err}");
    }

    #[test]
    fn non_portal_tuple_credits_cluster() {
        let mut fx = Fixture::new();
        fx.overrides.reimbursements.tuple_costs.insert(
            TrackingTuple::new(["d"]),
            TupleCost {
                group: "bfmr".into(),
                cost: 50.0,
            },
        );
        let result = fx.run(&config()).unwrap();
        assert!(result.discrepancies.iter().all(|d| !d.trackings.contains("d")));
    }

    struct FailingPortal;

    impl PortalSource for FailingPortal {
        fn portal_data(&mut self, group: &str) -> std::result::Result<PortalData, SourceError> {
            Err(SourceError::unavailable(group, "login rejected"))
        }
    }

    #[test]
    fn portal_failure_propagates() {
        let mut fx = Fixture::new();
        let mut portal = FailingPortal;
        let sources = Sources {
            trackings: &mut fx.trackings,
            orders: &mut fx.prices,
            portals: &mut portal,
            overrides: &mut fx.overrides,
            cancellations: &mut fx.cancellations,
        };
        let err = run(&config(), Vec::new(), sources, &mut NoProgress).unwrap_err();
        assert!(matches!(err, ReconError::Source(_)), "{err}");
        assert!(err.to_string().contains("login rejected"));
    }

    #[test]
    fn scope_limits_portal_fetches() {
        let mut fx = Fixture::new();
        let mut bfmr = PortalData::default();
        bfmr.tuple_costs.insert(TrackingTuple::new(["d"]), 50.0);
        fx.portals.insert("bfmr".into(), bfmr);

        let config = config().with_scope(vec!["usa".into()]).unwrap();
        let result = fx.run(&config).unwrap();
        // bfmr's portal was never consulted, so d is still short.
        assert!(result.discrepancies.iter().any(|d| d.trackings.contains("d")));
    }

    #[test]
    fn seeded_clusters_are_extended() {
        let mut fx = Fixture::new();
        let mut seed = Cluster::new(Some("usa".into()));
        seed.orders.insert("o1".into());
        seed.trackings.insert("old".into());
        let sources = Sources {
            trackings: &mut fx.trackings,
            orders: &mut fx.prices,
            portals: &mut fx.portals,
            overrides: &mut fx.overrides,
            cancellations: &mut fx.cancellations,
        };
        let result = run(&config(), vec![seed], sources, &mut NoProgress).unwrap();
        let seeded = result.clusters.iter().find(|c| c.trackings.contains("old")).unwrap();
        assert!(seeded.trackings.contains("a"));
    }

    #[test]
    fn cancellations_annotate() {
        let mut fx = Fixture::new();
        fx.cancellations.insert("o4".into(), vec!["Headphones".into()]);
        let result = fx.run(&config()).unwrap();
        let d = result.clusters.iter().find(|c| c.trackings.contains("d")).unwrap();
        assert_eq!(d.cancelled_items, vec!["Headphones".to_string()]);
    }
}
