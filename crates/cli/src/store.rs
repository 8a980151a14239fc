//! `shipledger export`, `import` and `show`: direct access to the cluster store.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use serde::Serialize;
use shipledger_recon::cluster::{read_rows, write_rows};
use shipledger_recon::costs::find_discrepancies;
use shipledger_recon::Cluster;

use crate::recon::load_config;
use crate::CliError;

pub fn cmd_export(config: Option<PathBuf>, output: Option<PathBuf>) -> Result<(), CliError> {
    let loaded = load_config(config)?;
    let clusters = loaded.store().load()?;

    match output {
        Some(path) => {
            let file = File::create(&path)
                .map_err(|e| CliError::runtime(format!("cannot write {}: {e}", path.display())))?;
            write_rows(&clusters, BufWriter::new(file))?;
            eprintln!("exported {} clusters to {}", clusters.len(), path.display());
        }
        None => write_rows(&clusters, io::stdout().lock())?,
    }
    Ok(())
}

pub fn cmd_import(config: Option<PathBuf>, rows: PathBuf) -> Result<(), CliError> {
    let loaded = load_config(config)?;
    let store = loaded.store();

    let file = File::open(&rows)
        .map_err(|e| CliError::usage(format!("cannot open {}: {e}", rows.display())))?;
    let imported = read_rows(BufReader::new(file))?;
    let imported_count = imported.len();

    let mut clusters = store.load()?;
    let existing = clusters.len();
    clusters.extend(imported);
    let saved = store.save(clusters)?;

    let added = saved - existing;
    eprintln!(
        "imported {added} of {imported_count} rows ({} overlapped existing clusters); store holds {saved}",
        imported_count - added,
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct GroupStats {
    clusters: usize,
    trackings: usize,
    expected_cost: f64,
    tracked_cost: f64,
}

#[derive(Debug, Serialize)]
struct StoreSummary {
    path: String,
    clusters: usize,
    trackings: usize,
    discrepancies: usize,
    total_expected: f64,
    total_tracked: f64,
    last_ship_date: Option<String>,
    groups: BTreeMap<String, GroupStats>,
}

fn summarize(path: String, clusters: &[Cluster], tolerance: f64) -> StoreSummary {
    let mut groups: BTreeMap<String, GroupStats> = BTreeMap::new();
    for cluster in clusters {
        let stats = groups
            .entry(cluster.group.clone().unwrap_or_else(|| "-".into()))
            .or_insert(GroupStats {
                clusters: 0,
                trackings: 0,
                expected_cost: 0.0,
                tracked_cost: 0.0,
            });
        stats.clusters += 1;
        stats.trackings += cluster.trackings.len();
        stats.expected_cost += cluster.expected_cost;
        stats.tracked_cost += cluster.tracked_cost;
    }

    StoreSummary {
        path,
        clusters: clusters.len(),
        trackings: clusters.iter().map(|c| c.trackings.len()).sum(),
        discrepancies: find_discrepancies(clusters, tolerance).len(),
        total_expected: clusters.iter().map(|c| c.expected_cost).sum(),
        total_tracked: clusters.iter().map(|c| c.tracked_cost).sum(),
        last_ship_date: clusters
            .iter()
            .map(|c| c.last_ship_date.as_str())
            .filter(|d| !d.is_empty())
            .max()
            .map(str::to_string),
        groups,
    }
}

pub fn cmd_show(config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let loaded = load_config(config)?;
    let store = loaded.store();
    let clusters = store.load()?;
    let summary = summarize(
        store.path().display().to_string(),
        &clusters,
        loaded.config.reconcile.tolerance,
    );

    if json {
        let json_str = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    println!("store:         {}", summary.path);
    println!("clusters:      {}", summary.clusters);
    println!("trackings:     {}", summary.trackings);
    println!("discrepancies: {}", summary.discrepancies);
    println!("expected:      {:.2}", summary.total_expected);
    println!("tracked:       {:.2}", summary.total_tracked);
    if let Some(ref date) = summary.last_ship_date {
        println!("last shipped:  {date}");
    }
    for (group, stats) in &summary.groups {
        println!(
            "  {group:<10} {:>5} clusters {:>5} trackings  expected {:>10.2}  tracked {:>10.2}",
            stats.clusters, stats.trackings, stats.expected_cost, stats.tracked_cost,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(group: Option<&str>, trackings: &[&str], expected: f64, tracked: f64, date: &str) -> Cluster {
        Cluster {
            group: group.map(str::to_string),
            trackings: trackings.iter().map(|t| t.to_string()).collect(),
            expected_cost: expected,
            tracked_cost: tracked,
            last_ship_date: date.into(),
            ..Cluster::default()
        }
    }

    #[test]
    fn summary_groups_and_totals() {
        let clusters = vec![
            cluster(Some("usa"), &["a", "b"], 10.0, 10.0, "2024-03-01"),
            cluster(Some("usa"), &["c"], 5.0, 0.0, "2024-03-09"),
            cluster(None, &["d"], 1.0, 1.0, ""),
        ];
        let s = summarize("c.json".into(), &clusters, 0.0);
        assert_eq!(s.clusters, 3);
        assert_eq!(s.trackings, 4);
        assert_eq!(s.discrepancies, 1);
        assert_eq!(s.total_expected, 16.0);
        assert_eq!(s.last_ship_date.as_deref(), Some("2024-03-09"));
        assert_eq!(s.groups["usa"].clusters, 2);
        assert_eq!(s.groups["-"].trackings, 1);
    }

    #[test]
    fn tolerance_applies_to_discrepancy_count() {
        let clusters = vec![cluster(Some("usa"), &["c"], 5.0, 0.0, "2024-03-09")];
        assert_eq!(summarize("c.json".into(), &clusters, 5.0).discrepancies, 0);
    }
}
