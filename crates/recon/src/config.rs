use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    pub name: String,
    pub groups: BTreeMap<String, GroupConfig>,
    pub data: DataConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Trackings of a group with `reconcile = false` never enter clustering.
    #[serde(default = "default_true")]
    pub reconcile: bool,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self { reconcile: true }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Data files
// ---------------------------------------------------------------------------

/// Input CSV locations, relative to the config file's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub trackings: PathBuf,
    pub order_prices: PathBuf,
    #[serde(default)]
    pub cancellations: Option<PathBuf>,
    #[serde(default)]
    pub portal_tuple_costs: Option<PathBuf>,
    #[serde(default)]
    pub portal_po_costs: Option<PathBuf>,
    #[serde(default)]
    pub portal_tracking_pos: Option<PathBuf>,
    #[serde(default)]
    pub non_portal_tuple_costs: Option<PathBuf>,
    #[serde(default)]
    pub non_portal_po_costs: Option<PathBuf>,
    #[serde(default)]
    pub po_overrides: Option<PathBuf>,
}

impl DataConfig {
    /// Every configured file, required ones first.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.trackings, &self.order_prices].into_iter().chain(
            [
                &self.cancellations,
                &self.portal_tuple_costs,
                &self.portal_po_costs,
                &self.portal_tracking_pos,
                &self.non_portal_tuple_costs,
                &self.non_portal_po_costs,
                &self.po_overrides,
            ]
            .into_iter()
            .flatten(),
        )
    }
}

// ---------------------------------------------------------------------------
// Reconcile + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Restrict portal fetches and cost resets to these groups.
    #[serde(default)]
    pub groups: Option<Vec<String>>,
    #[serde(default)]
    pub print_unknowns: bool,
    /// Shortfall a cluster may carry before it is reported.
    #[serde(default)]
    pub tolerance: f64,
    /// Seed the run from the persisted store instead of starting empty.
    #[serde(default)]
    pub resume: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_clusters_path")]
    pub clusters: PathBuf,
    #[serde(default)]
    pub report: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            clusters: default_clusters_path(),
            report: None,
        }
    }
}

fn default_clusters_path() -> PathBuf {
    PathBuf::from("output/clusters.json")
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.groups.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one buying group is required".into(),
            ));
        }

        if let Some(ref scope) = self.reconcile.groups {
            if scope.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "reconcile.groups must not be empty when given".into(),
                ));
            }
            for group in scope {
                if !self.groups.contains_key(group) {
                    return Err(ReconError::ConfigValidation(format!(
                        "reconcile.groups: unknown group '{group}'"
                    )));
                }
            }
        }

        let tolerance = self.reconcile.tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "reconcile.tolerance must be a non-negative number, got {tolerance}"
            )));
        }

        if self.data.trackings.as_os_str().is_empty() || self.data.order_prices.as_os_str().is_empty() {
            return Err(ReconError::ConfigValidation(
                "data.trackings and data.order_prices are required".into(),
            ));
        }

        Ok(())
    }

    /// Replace the group scope, e.g. from a command-line flag. Re-validates.
    pub fn with_scope(mut self, groups: Vec<String>) -> Result<Self, ReconError> {
        self.reconcile.groups = Some(groups);
        self.validate()?;
        Ok(self)
    }

    pub fn scope(&self) -> Option<&[String]> {
        self.reconcile.groups.as_deref()
    }

    /// Groups whose portals are consulted this run.
    pub fn scoped_groups(&self) -> Vec<String> {
        match self.scope() {
            Some(scope) => scope.to_vec(),
            None => self.groups.keys().cloned().collect(),
        }
    }

    /// Whether trackings of `group` take part in reconciliation. Unknown groups do not.
    pub fn group_reconciles(&self, group: &str) -> bool {
        self.groups.get(group).map(|g| g.reconcile).unwrap_or(false)
    }
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
