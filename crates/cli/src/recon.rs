//! `shipledger run` and `shipledger validate`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use shipledger_recon::config::resolve;
use shipledger_recon::report::write_report;
use shipledger_recon::{ClusterStore, CsvSources, ReconConfig, ReconResult};

use crate::exit_codes::{EXIT_DISCREPANCIES, EXIT_INVALID_CONFIG};
use crate::progress::BarProgress;
use crate::CliError;

/// A parsed config and the directory its relative paths resolve against.
pub struct LoadedConfig {
    pub config: ReconConfig,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    pub fn store(&self) -> ClusterStore {
        ClusterStore::new(resolve(&self.base_dir, &self.config.output.clusters))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shipledger").join("recon.toml"))
}

pub fn load_config(path: Option<PathBuf>) -> Result<LoadedConfig, CliError> {
    let path = match path.or_else(default_config_path) {
        Some(path) => path,
        None => {
            return Err(CliError::usage("no config given and no config directory on this system")
                .with_hint("pass --config FILE"))
        }
    };

    let text = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CliError::usage(format!("config not found: {}", path.display()))
                .with_hint("pass --config FILE or set SHIPLEDGER_CONFIG")
        } else {
            CliError::runtime(format!("cannot read config {}: {e}", path.display()))
        }
    })?;

    let config = ReconConfig::from_toml(&text)
        .map_err(|e| CliError::new(EXIT_INVALID_CONFIG, format!("{}: {e}", path.display())))?;

    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    Ok(LoadedConfig { config, base_dir })
}

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub groups: Vec<String>,
    pub print_unknowns: bool,
    pub resume: bool,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub no_save: bool,
    pub fail_on_discrepancy: bool,
    pub show_progress: bool,
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let LoadedConfig { mut config, base_dir } = load_config(args.config)?;

    if !args.groups.is_empty() {
        config = config.with_scope(args.groups)?;
    }
    config.reconcile.print_unknowns |= args.print_unknowns;
    config.reconcile.resume |= args.resume;

    let loaded = LoadedConfig { config, base_dir };
    let config = &loaded.config;
    let store = loaded.store();

    let existing = if config.reconcile.resume {
        let clusters = store.load()?;
        log::info!("resuming from {} ({} clusters)", store.path().display(), clusters.len());
        clusters
    } else {
        Vec::new()
    };

    let mut sources = CsvSources::open(&loaded.base_dir, &config.data)?;
    let mut progress = BarProgress::new(args.show_progress);
    let result = shipledger_recon::run(config, existing, sources.sources(), &mut progress)?;

    // The store is written once, after a successful run.
    if args.no_save {
        log::info!("--no-save: store left untouched");
    } else {
        store.save(result.clusters.clone())?;
    }

    if let Some(ref report) = config.output.report {
        let path = resolve(&loaded.base_dir, report);
        write_report_file(&path, &result)?;
        log::info!("wrote discrepancy report {}", path.display());
    }

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        println!("{json_str}");
    } else {
        print_human(&result);
    }

    if args.fail_on_discrepancy && result.summary.discrepancies > 0 {
        return Err(CliError::new(
            EXIT_DISCREPANCIES,
            format!("{} cluster(s) short of expected cost", result.summary.discrepancies),
        ));
    }

    Ok(())
}

fn write_report_file(path: &Path, result: &ReconResult) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::runtime(format!("cannot create {}: {e}", parent.display())))?;
    }
    let file = File::create(path)
        .map_err(|e| CliError::runtime(format!("cannot write report {}: {e}", path.display())))?;
    write_report(&result.discrepancies, BufWriter::new(file))?;
    Ok(())
}

fn print_human(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "{}: {} clusters from {} trackings ({} PO merges, {} tuple merges, {} duplicates dropped)",
        result.meta.config_name, s.clusters, s.trackings_ingested, s.po_merges, s.tuple_merges, s.duplicates_dropped,
    );
    eprintln!(
        "expected {:.2}, tracked {:.2}, {} discrepancies",
        s.total_expected, s.total_tracked, s.discrepancies,
    );
    if !s.order_failures.is_empty() {
        eprintln!("{} order(s) could not be priced", s.order_failures.len());
    }
    let unknowns = &result.unknowns;
    if !unknowns.is_empty() {
        eprintln!(
            "unknown references: {} tuples, {} purchase orders, {} trackings",
            unknowns.tuples.len(),
            unknowns.purchase_orders.len(),
            unknowns.po_trackings.len(),
        );
    }

    for d in &result.discrepancies {
        let trackings: Vec<&str> = d.trackings.iter().map(String::as_str).collect();
        println!(
            "{:<10} short {:>10.2}  (expected {:.2}, tracked {:.2})  last ship {}  {}",
            d.group.as_deref().unwrap_or("-"),
            d.shortfall,
            d.expected_cost,
            d.tracked_cost,
            d.last_ship_date,
            trackings.join(","),
        );
    }
}

pub fn cmd_validate(config: Option<PathBuf>) -> Result<(), CliError> {
    let loaded = load_config(config)?;
    let config = &loaded.config;

    let mut missing = Vec::new();
    for path in config.data.paths() {
        let full = resolve(&loaded.base_dir, path);
        if !full.is_file() {
            missing.push(full.display().to_string());
        }
    }
    if !missing.is_empty() {
        return Err(CliError::runtime(format!("missing data file(s): {}", missing.join(", "))));
    }

    let scope = config.scoped_groups();
    eprintln!(
        "{}: valid ({} groups, {} in scope, store {})",
        config.name,
        config.groups.len(),
        scope.len(),
        loaded.store().path().display(),
    );
    Ok(())
}
