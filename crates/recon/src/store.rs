//! Durable cluster storage.
//!
//! The store is a single JSON document. Writes dedupe first and land via a
//! sibling temp file plus rename, so an interrupted write leaves the previous
//! store intact.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::dedupe::dedupe_clusters;
use crate::error::{ReconError, Result};

pub const STORE_FORMAT: &str = "shipledger.clusters";
pub const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    format: String,
    version: u32,
    clusters: Vec<Cluster>,
}

#[derive(Debug, Clone)]
pub struct ClusterStore {
    path: PathBuf,
}

impl ClusterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and dedupe. A missing store is an empty collection.
    pub fn load(&self) -> Result<Vec<Cluster>> {
        if !self.path.exists() {
            log::debug!("no cluster store at {}", self.path.display());
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|source| ReconError::ReadFile {
            path: self.path.display().to_string(),
            source,
        })?;
        let file: StoreFile = serde_json::from_str(&text)?;
        if file.format != STORE_FORMAT {
            return Err(ReconError::StoreFormat(format!(
                "{}: format '{}' is not '{STORE_FORMAT}'",
                self.path.display(),
                file.format
            )));
        }
        if file.version != STORE_VERSION {
            return Err(ReconError::StoreFormat(format!(
                "{}: version {} is not supported (expected {STORE_VERSION})",
                self.path.display(),
                file.version
            )));
        }
        Ok(dedupe_clusters(file.clusters))
    }

    /// Dedupe and persist. Returns the number of clusters written.
    pub fn save(&self, clusters: Vec<Cluster>) -> Result<usize> {
        let clusters = dedupe_clusters(clusters);
        let count = clusters.len();
        let file = StoreFile {
            format: STORE_FORMAT.into(),
            version: STORE_VERSION,
            clusters,
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        {
            let mut out = fs::File::create(&tmp)?;
            out.write_all(json.as_bytes())?;
            out.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        log::info!("wrote {count} clusters to {}", self.path.display());
        Ok(count)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
