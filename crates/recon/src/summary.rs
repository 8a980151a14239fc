use crate::cluster::Cluster;
use crate::model::{Discrepancy, ReconSummary};

/// Counters gathered while the passes run.
#[derive(Debug, Clone, Default)]
pub struct PassCounts {
    pub trackings_ingested: usize,
    pub po_merges: usize,
    pub tuple_merges: usize,
    pub duplicates_dropped: usize,
    pub order_failures: Vec<String>,
}

/// Compute summary statistics over the final cluster set.
pub fn compute_summary(
    clusters: &[Cluster],
    discrepancies: &[Discrepancy],
    counts: PassCounts,
) -> ReconSummary {
    ReconSummary {
        clusters: clusters.len(),
        trackings_ingested: counts.trackings_ingested,
        po_merges: counts.po_merges,
        tuple_merges: counts.tuple_merges,
        duplicates_dropped: counts.duplicates_dropped,
        discrepancies: discrepancies.len(),
        total_expected: clusters.iter().map(|c| c.expected_cost).sum(),
        total_tracked: clusters.iter().map(|c| c.tracked_cost).sum(),
        order_failures: counts.order_failures,
    }
}
