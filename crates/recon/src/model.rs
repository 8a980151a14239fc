use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single shipment as reported by the tracking feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub tracking_number: String,
    /// Buying group. `None` when the source email carried no group label.
    pub group: Option<String>,
    pub order_ids: Vec<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub email_id: Option<String>,
    pub ship_date: String,
    #[serde(default = "default_reconcile")]
    pub reconcile: bool,
}

fn default_reconcile() -> bool {
    true
}

/// Ordered group of tracking numbers that a portal bills as one charge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingTuple(Vec<String>);

impl TrackingTuple {
    pub fn new<I, S>(trackings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(trackings.into_iter().map(Into::into).collect())
    }

    /// Parse a comma-joined cell, dropping blanks.
    pub fn parse(cell: &str) -> Self {
        Self::new(cell.split(',').map(str::trim).filter(|t| !t.is_empty()))
    }

    /// The tracking the tuple's charge is attributed to.
    pub fn lead(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn trackings(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TrackingTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Charge reported for a tracking tuple, with the group whose portal billed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TupleCost {
    pub group: String,
    pub cost: f64,
}

/// Everything one buying group's portal reports.
#[derive(Debug, Clone, Default)]
pub struct PortalData {
    pub tuple_costs: BTreeMap<TrackingTuple, f64>,
    pub po_costs: BTreeMap<String, f64>,
    pub tracking_pos: BTreeMap<String, BTreeSet<String>>,
}

/// The two cost channels feeding tracked cost.
#[derive(Debug, Clone, Default)]
pub struct CostMaps {
    pub tuple_costs: BTreeMap<TrackingTuple, TupleCost>,
    pub po_costs: BTreeMap<String, f64>,
}

/// Price lookup result for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderInfo {
    pub cost: f64,
    pub email_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A cluster whose expected cost exceeds what the portals account for.
#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    pub group: Option<String>,
    pub orders: BTreeSet<String>,
    pub trackings: BTreeSet<String>,
    pub purchase_orders: BTreeSet<String>,
    pub expected_cost: f64,
    pub tracked_cost: f64,
    pub shortfall: f64,
    pub non_reimbursed_trackings: BTreeSet<String>,
    pub cancelled_items: Vec<String>,
    pub last_ship_date: String,
}

impl Discrepancy {
    pub fn from_cluster(cluster: &Cluster) -> Self {
        Self {
            group: cluster.group.clone(),
            orders: cluster.orders.clone(),
            trackings: cluster.trackings.clone(),
            purchase_orders: cluster.purchase_orders.clone(),
            expected_cost: cluster.expected_cost,
            tracked_cost: cluster.tracked_cost,
            shortfall: cluster.expected_cost - cluster.tracked_cost,
            non_reimbursed_trackings: cluster.non_reimbursed_trackings.clone(),
            cancelled_items: cluster.cancelled_items.clone(),
            last_ship_date: cluster.last_ship_date.clone(),
        }
    }
}

/// References the run could not resolve. Reported, never fatal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Unknowns {
    /// (group, lead tracking) of tuples whose lead tracking has no cluster.
    pub tuples: Vec<(String, String)>,
    /// Purchase orders held by a cluster with no reported cost.
    pub purchase_orders: Vec<String>,
    /// Trackings named by a PO assignment that belong to no cluster.
    pub po_trackings: Vec<String>,
}

impl Unknowns {
    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty() && self.purchase_orders.is_empty() && self.po_trackings.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub clusters: usize,
    pub trackings_ingested: usize,
    pub po_merges: usize,
    pub tuple_merges: usize,
    pub duplicates_dropped: usize,
    pub discrepancies: usize,
    pub total_expected: f64,
    pub total_tracked: f64,
    pub order_failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub clusters: Vec<Cluster>,
    pub discrepancies: Vec<Discrepancy>,
    pub unknowns: Unknowns,
}
