use std::collections::BTreeMap;

use crate::cluster::Cluster;
use crate::model::Tracking;

/// Group trackings by buying group, keeping first-seen group order.
/// Trackings without a group are skipped.
pub fn group_trackings(trackings: Vec<Tracking>) -> Vec<(String, Vec<Tracking>)> {
    let mut order: Vec<String> = Vec::new();
    let mut by_group: BTreeMap<String, Vec<Tracking>> = BTreeMap::new();

    for tracking in trackings {
        let Some(group) = tracking.group.clone() else {
            log::warn!(
                "tracking {} has no buying group; skipping",
                tracking.tracking_number
            );
            continue;
        };
        if !by_group.contains_key(&group) {
            order.push(group.clone());
        }
        by_group.entry(group).or_default().push(tracking);
    }

    order
        .into_iter()
        .map(|group| {
            let trackings = by_group.remove(&group).unwrap_or_default();
            (group, trackings)
        })
        .collect()
}

/// Fold tracking records into `clusters`. A tracking joins the first cluster of its
/// group that shares an order id; otherwise it seeds a new cluster. Nothing is removed.
pub fn update_clusters(clusters: &mut Vec<Cluster>, trackings_by_group: &[(String, Vec<Tracking>)]) {
    for (_, trackings) in trackings_by_group {
        for tracking in trackings {
            let idx = match find_cluster(clusters, tracking) {
                Some(idx) => idx,
                None => {
                    clusters.push(Cluster::new(tracking.group.clone()));
                    clusters.len() - 1
                }
            };
            let cluster = &mut clusters[idx];
            cluster.orders.extend(tracking.order_ids.iter().cloned());
            cluster.trackings.insert(tracking.tracking_number.clone());
            cluster.bump_ship_date(&tracking.ship_date);
        }
    }
}

fn find_cluster(clusters: &[Cluster], tracking: &Tracking) -> Option<usize> {
    clusters.iter().position(|cluster| {
        cluster.group == tracking.group
            && tracking.order_ids.iter().any(|o| cluster.orders.contains(o))
    })
}
