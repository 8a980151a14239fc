//! Expected and tracked cost fill, reimbursement merging, discrepancy detection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::cluster::Cluster;
use crate::error::{ReconError, Result};
use crate::model::{CostMaps, Discrepancy, PortalData, TrackingTuple, TupleCost};
use crate::progress::Progress;
use crate::sources::OrderInfoSource;
use crate::tuple_merge::ClusterIndex;

/// Recompute expected cost from per-order prices. An order whose price cannot be
/// resolved is logged and left out of the sum. Returns the failed order ids.
pub fn fill_expected_costs(
    clusters: &mut [Cluster],
    orders: &mut dyn OrderInfoSource,
    progress: &mut dyn Progress,
) -> Vec<String> {
    let total: usize = clusters.iter().map(|c| c.orders.len()).sum();
    progress.begin("order costs", total as u64);

    let mut failures = Vec::new();
    for cluster in clusters.iter_mut() {
        cluster.expected_cost = 0.0;
        cluster.email_ids.clear();
        for order_id in &cluster.orders {
            match orders.order_info(order_id) {
                Ok(info) => {
                    cluster.expected_cost += info.cost;
                    if let Some(email_id) = info.email_id {
                        cluster.email_ids.insert(email_id);
                    }
                }
                Err(e) => {
                    log::warn!("cannot price order {order_id}, skipping: {e}");
                    failures.push(order_id.clone());
                }
            }
            progress.advance(1);
        }
    }

    progress.finish();
    failures
}

/// Collapse per-group portal data into the two cost channels, tagging each tuple
/// charge with the group whose portal reported it.
pub fn portal_cost_maps(portals: &BTreeMap<String, PortalData>) -> CostMaps {
    let mut maps = CostMaps::default();
    for (group, data) in portals {
        for (tuple, cost) in &data.tuple_costs {
            maps.tuple_costs.insert(
                tuple.clone(),
                TupleCost {
                    group: group.clone(),
                    cost: *cost,
                },
            );
        }
        maps.po_costs.extend(data.po_costs.iter().map(|(po, cost)| (po.clone(), *cost)));
    }
    maps
}

/// Fold non-portal reimbursements into the portal cost maps. Any tuple or purchase
/// order present in both is a consistency violation; nothing is merged in that case.
pub fn apply_non_portal_reimbursements(portal: &mut CostMaps, non_portal: CostMaps) -> Result<()> {
    let tuples: Vec<(TrackingTuple, String)> = non_portal
        .tuple_costs
        .keys()
        .filter_map(|tuple| {
            portal
                .tuple_costs
                .get(tuple)
                .map(|existing| (tuple.clone(), existing.group.clone()))
        })
        .collect();
    let purchase_orders: Vec<String> = non_portal
        .po_costs
        .keys()
        .filter(|po| portal.po_costs.contains_key(*po))
        .cloned()
        .collect();

    if !tuples.is_empty() || !purchase_orders.is_empty() {
        for (tuple, group) in &tuples {
            log::error!("tracking {tuple} is in non-portal reimbursements and in group {group}'s portal");
        }
        for po in &purchase_orders {
            log::error!("PO {po} is in non-portal reimbursements and in a portal");
        }
        return Err(ReconError::ReimbursementCollision {
            tuples,
            purchase_orders,
        });
    }

    portal.tuple_costs.extend(non_portal.tuple_costs);
    portal.po_costs.extend(non_portal.po_costs);
    Ok(())
}

/// What the tracked-cost pass could not attribute.
#[derive(Debug, Default)]
pub struct TrackedCostReport {
    /// (group, lead tracking) of tuples with no indexed cluster.
    pub unknown_tuples: Vec<(String, String)>,
    /// Purchase orders with no reported cost.
    pub unknown_purchase_orders: Vec<String>,
}

/// Recompute tracked cost from both channels. In-scope clusters are reset first,
/// so running this twice with the same inputs gives the same result.
pub fn fill_tracked_costs(
    index: &mut ClusterIndex,
    maps: &CostMaps,
    scope: Option<&[String]>,
) -> TrackedCostReport {
    for cluster in index.iter_mut() {
        if cluster.in_scope(scope) {
            cluster.non_reimbursed_trackings = cluster.trackings.clone();
            cluster.tracked_cost = 0.0;
        }
    }

    let mut report = TrackedCostReport::default();

    // Tuples were merged beforehand, so the lead tracking identifies the cluster.
    for (tuple, charge) in &maps.tuple_costs {
        let Some(lead) = tuple.lead() else {
            continue;
        };
        let Some(cluster) = index.lookup(lead).and_then(|idx| index.get_mut(idx)) else {
            report.unknown_tuples.push((charge.group.clone(), lead.to_string()));
            continue;
        };
        if !cluster.in_scope(scope) {
            log::debug!("tracking {lead} belongs to an out-of-scope cluster; not credited");
            continue;
        }
        cluster.tracked_cost += charge.cost;
        for tracking in tuple.trackings() {
            cluster.non_reimbursed_trackings.remove(tracking);
        }
    }

    let mut unknown_pos: BTreeSet<String> = BTreeSet::new();
    for cluster in index.iter_mut() {
        if !cluster.in_scope(scope) {
            continue;
        }
        for po in &cluster.purchase_orders {
            match maps.po_costs.get(po) {
                Some(cost) => cluster.tracked_cost += cost,
                None => {
                    unknown_pos.insert(po.clone());
                }
            }
        }
    }
    report.unknown_purchase_orders = unknown_pos.into_iter().collect();
    report
}

/// Annotate clusters with cancelled items of their orders.
pub fn fill_cancellations(clusters: &mut [Cluster], cancellations: &HashMap<String, Vec<String>>) {
    for cluster in clusters.iter_mut() {
        cluster.cancelled_items = cluster
            .orders
            .iter()
            .filter_map(|order| cancellations.get(order))
            .flatten()
            .cloned()
            .collect();
    }
}

/// Clusters whose expected cost exceeds tracked cost by more than `tolerance`,
/// largest shortfall first.
pub fn find_discrepancies(clusters: &[Cluster], tolerance: f64) -> Vec<Discrepancy> {
    let mut found: Vec<Discrepancy> = clusters
        .iter()
        .filter(|c| c.expected_cost > c.tracked_cost + tolerance)
        .map(Discrepancy::from_cluster)
        .collect();
    found.sort_by(|a, b| b.shortfall.total_cmp(&a.shortfall));
    found
}
