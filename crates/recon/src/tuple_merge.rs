//! Tracking index and the tuple merge pass.
//!
//! Clusters live in an arena of slots; the index maps tracking numbers to slot
//! positions. A cluster merged away leaves an empty slot, and every tracking that
//! pointed at it is re-pointed at the survivor, so no index entry ever refers to a
//! consumed cluster.

use std::collections::HashMap;

use crate::cluster::Cluster;
use crate::model::TrackingTuple;

#[derive(Debug, Default)]
pub struct ClusterIndex {
    slots: Vec<Option<Cluster>>,
    by_tracking: HashMap<String, usize>,
}

impl ClusterIndex {
    /// Index every tracking of every cluster. When two clusters claim the same
    /// tracking the earlier one keeps it, matching dedupe's first-seen rule.
    pub fn build(clusters: Vec<Cluster>) -> Self {
        let mut by_tracking = HashMap::new();
        for (idx, cluster) in clusters.iter().enumerate() {
            for tracking in &cluster.trackings {
                by_tracking.entry(tracking.clone()).or_insert(idx);
            }
        }
        Self {
            slots: clusters.into_iter().map(Some).collect(),
            by_tracking,
        }
    }

    pub fn lookup(&self, tracking: &str) -> Option<usize> {
        self.by_tracking.get(tracking).copied()
    }

    pub fn get(&self, idx: usize) -> Option<&Cluster> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut Cluster> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cluster> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point `tracking` at the cluster in slot `idx`.
    pub fn point(&mut self, tracking: &str, idx: usize) {
        self.by_tracking.insert(tracking.to_string(), idx);
    }

    /// Move the cluster in `other` into `target`, re-pointing its trackings.
    /// Returns false when either slot is empty or they are the same slot.
    pub fn merge(&mut self, target: usize, other: usize) -> bool {
        if target == other || self.get(target).is_none() {
            return false;
        }
        let Some(absorbed) = self.slots.get_mut(other).and_then(Option::take) else {
            return false;
        };
        for idx in self.by_tracking.values_mut() {
            if *idx == other {
                *idx = target;
            }
        }
        if let Some(survivor) = self.get_mut(target) {
            survivor.merge_with(absorbed);
        }
        true
    }

    pub fn into_clusters(self) -> Vec<Cluster> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Fuse clusters that a portal bills together. Groups are not compared: one charge
/// may cover trackings that were clustered under different groups.
/// Returns the number of merges performed.
pub fn merge_by_tracking_tuples<'a, I>(index: &mut ClusterIndex, tuples: I) -> usize
where
    I: IntoIterator<Item = &'a TrackingTuple>,
{
    let mut merges = 0;
    for tuple in tuples {
        if tuple.len() < 2 {
            continue;
        }

        let mut candidates: Vec<usize> = Vec::new();
        for tracking in tuple.trackings() {
            // Trackings missing from the index are non-reconcilable shipments.
            if let Some(idx) = index.lookup(tracking) {
                if !candidates.contains(&idx) {
                    candidates.push(idx);
                }
            }
        }

        let Some((&first, rest)) = candidates.split_first() else {
            continue;
        };

        for &other in rest {
            let already_held = match (index.get(first), index.get(other)) {
                (Some(f), Some(o)) => f.contains(o),
                _ => true,
            };
            if !already_held && index.merge(first, other) {
                merges += 1;
            }
        }
        for tracking in tuple.trackings() {
            index.point(tracking, first);
        }
    }

    if merges > 0 {
        log::info!("tracking-tuple merge: {merges} merge(s), {} clusters remain", index.len());
    }
    merges
}
