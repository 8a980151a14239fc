use std::collections::HashSet;

use crate::cluster::Cluster;

/// Drop every cluster that shares a tracking with an earlier one. First seen wins;
/// overlapping clusters are discarded, not merged. Clusters with no trackings are
/// dropped as well.
pub fn dedupe_clusters(clusters: Vec<Cluster>) -> Vec<Cluster> {
    let before = clusters.len();
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(before);

    for cluster in clusters {
        if cluster.trackings.is_empty() {
            log::debug!("dropping cluster without trackings: [{cluster}]");
            continue;
        }
        if cluster.trackings.iter().any(|t| seen.contains(t)) {
            log::debug!("dropping duplicate cluster: [{cluster}]");
            continue;
        }
        seen.extend(cluster.trackings.iter().cloned());
        result.push(cluster);
    }

    if result.len() != before {
        log::info!("dedupe: {before} -> {} clusters", result.len());
    }
    result
}
