use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::cluster::Cluster;

/// Union several tracking -> purchase order maps.
pub fn merge_tracking_pos<'a, I>(maps: I) -> BTreeMap<String, BTreeSet<String>>
where
    I: IntoIterator<Item = &'a BTreeMap<String, BTreeSet<String>>>,
{
    let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for map in maps {
        for (tracking, pos) in map {
            merged.entry(tracking.clone()).or_default().extend(pos.iter().cloned());
        }
    }
    merged
}

/// Attach purchase orders to the clusters holding the given trackings.
/// Returns the trackings that belong to no cluster.
pub fn assign_purchase_orders(
    clusters: &mut [Cluster],
    tracking_pos: &BTreeMap<String, BTreeSet<String>>,
) -> Vec<String> {
    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (idx, cluster) in clusters.iter().enumerate() {
        for tracking in &cluster.trackings {
            owner.entry(tracking.as_str()).or_insert(idx);
        }
    }

    let mut assignments: Vec<(usize, &BTreeSet<String>)> = Vec::new();
    let mut unknown = Vec::new();
    for (tracking, pos) in tracking_pos {
        match owner.get(tracking.as_str()) {
            Some(&idx) => assignments.push((idx, pos)),
            None => unknown.push(tracking.clone()),
        }
    }

    for (idx, pos) in assignments {
        clusters[idx].purchase_orders.extend(pos.iter().cloned());
    }
    unknown
}

/// Fuse clusters of the same group that share a purchase order, repeating until a
/// full pass merges nothing. Clusters without purchase orders never merge here.
pub fn merge_by_purchase_orders(mut clusters: Vec<Cluster>) -> Vec<Cluster> {
    let start = clusters.len();
    let mut iterations = 0;
    loop {
        let prev_len = clusters.len();
        clusters = run_merge_iteration(clusters);
        iterations += 1;
        if clusters.len() == prev_len {
            break;
        }
    }
    log::info!(
        "purchase-order merge: {start} -> {} clusters in {iterations} pass(es)",
        clusters.len()
    );
    clusters
}

fn run_merge_iteration(clusters: Vec<Cluster>) -> Vec<Cluster> {
    let mut result: Vec<Cluster> = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        match find_by_purchase_orders(&cluster, &result) {
            Some(idx) => result[idx].merge_with(cluster),
            None => result.push(cluster),
        }
    }
    result
}

fn find_by_purchase_orders(cluster: &Cluster, placed: &[Cluster]) -> Option<usize> {
    if cluster.purchase_orders.is_empty() {
        return None;
    }
    placed.iter().position(|candidate| {
        candidate.group == cluster.group
            && !candidate.purchase_orders.is_disjoint(&cluster.purchase_orders)
    })
}
