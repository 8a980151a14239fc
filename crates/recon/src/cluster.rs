//! The cluster entity: one logical purchase assembled from shipments.

use std::collections::BTreeSet;
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};

/// Column headers of the tabular row form.
pub const ROW_HEADER: [&str; 7] = [
    "Orders",
    "Trackings",
    "Expected Cost",
    "Tracked Cost",
    "Last Ship Date",
    "POs",
    "Group",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub orders: BTreeSet<String>,
    pub trackings: BTreeSet<String>,
    pub purchase_orders: BTreeSet<String>,
    pub group: Option<String>,
    pub expected_cost: f64,
    pub tracked_cost: f64,
    /// Latest ship date across the cluster's trackings (lexical `YYYY-MM-DD`).
    pub last_ship_date: String,

    // Derived per run; never part of the row form.
    #[serde(default)]
    pub non_reimbursed_trackings: BTreeSet<String>,
    #[serde(default)]
    pub cancelled_items: Vec<String>,
    #[serde(default)]
    pub email_ids: BTreeSet<String>,
}

impl Cluster {
    pub fn new(group: Option<String>) -> Self {
        Self {
            group,
            ..Self::default()
        }
    }

    /// Absorb `other` into `self`. Sets are unioned, costs summed, ship date maxed.
    pub fn merge_with(&mut self, other: Cluster) {
        log::debug!("merging cluster [{other}] into [{self}]");
        self.orders.extend(other.orders);
        self.trackings.extend(other.trackings);
        self.purchase_orders.extend(other.purchase_orders);
        self.expected_cost += other.expected_cost;
        self.tracked_cost += other.tracked_cost;
        self.bump_ship_date(&other.last_ship_date);
        self.non_reimbursed_trackings.extend(other.non_reimbursed_trackings);
        self.email_ids.extend(other.email_ids);
    }

    pub fn bump_ship_date(&mut self, date: &str) {
        if date > self.last_ship_date.as_str() {
            self.last_ship_date = date.to_string();
        }
    }

    /// True when every tracking and order of `other` is already held here.
    pub fn contains(&self, other: &Cluster) -> bool {
        other.trackings.is_subset(&self.trackings) && other.orders.is_subset(&self.orders)
    }

    pub fn in_scope(&self, groups: Option<&[String]>) -> bool {
        match (groups, &self.group) {
            (None, _) => true,
            (Some(scope), Some(group)) => scope.iter().any(|g| g == group),
            (Some(_), None) => false,
        }
    }

    pub fn to_row(&self) -> [String; 7] {
        [
            join(&self.orders),
            join(&self.trackings),
            self.expected_cost.to_string(),
            self.tracked_cost.to_string(),
            self.last_ship_date.clone(),
            join(&self.purchase_orders),
            self.group.clone().unwrap_or_default(),
        ]
    }

    /// Parse the tabular row form. A six-column row has no group.
    pub fn from_row(row: &[&str]) -> std::result::Result<Self, String> {
        if row.len() < 6 {
            return Err(format!("expected at least 6 columns, found {}", row.len()));
        }
        let cost = |idx: usize, name: &str| -> std::result::Result<f64, String> {
            let cell = row[idx].trim();
            if cell.is_empty() {
                return Ok(0.0);
            }
            cell.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| format!("{name} must be a non-negative number, got '{cell}'"))
        };
        let group = row
            .get(6)
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_string);

        Ok(Self {
            orders: split(row[0]),
            trackings: split(row[1]),
            expected_cost: cost(2, "expected cost")?,
            tracked_cost: cost(3, "tracked cost")?,
            last_ship_date: row[4].trim().to_string(),
            purchase_orders: split(row[5]),
            group,
            ..Self::default()
        })
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "orders: {}, trackings: {}, group: {}, expected: {:.2}, tracked: {:.2}, last ship: {}, POs: {}",
            join(&self.orders),
            join(&self.trackings),
            self.group.as_deref().unwrap_or("-"),
            self.expected_cost,
            self.tracked_cost,
            self.last_ship_date,
            join(&self.purchase_orders),
        )
    }
}

pub(crate) fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

fn split(cell: &str) -> BTreeSet<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Write clusters as header + one row each.
pub fn write_rows<W: io::Write>(clusters: &[Cluster], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(ROW_HEADER)?;
    for cluster in clusters {
        wtr.write_record(cluster.to_row())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read clusters from the tabular form. The first row must be the header.
pub fn read_rows<R: io::Read>(reader: R) -> Result<Vec<Cluster>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut clusters = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cells: Vec<&str> = record.iter().collect();
        let cluster = Cluster::from_row(&cells)
            .map_err(|message| ReconError::MalformedRow { line, message })?;
        clusters.push(cluster);
    }
    Ok(clusters)
}
