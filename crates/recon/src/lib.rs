//! `shipledger-recon`: shipment cluster consolidation and cost reconciliation.
//!
//! Pure engine crate: receives tracking, price and portal data through the
//! [`sources`] seams, merges shipments into clusters and reports clusters whose
//! reimbursements fall short of what was paid. File loading and the cluster store
//! live in [`loader`] and [`store`]; nothing here talks to a terminal.

pub mod cluster;
pub mod config;
pub mod costs;
pub mod dedupe;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod po_merge;
pub mod progress;
pub mod report;
pub mod sources;
pub mod store;
pub mod summary;
pub mod tracking_merge;
pub mod tuple_merge;

pub use cluster::Cluster;
pub use config::ReconConfig;
pub use engine::run;
pub use error::{ReconError, Result, SourceError};
pub use loader::CsvSources;
pub use model::{Discrepancy, ReconResult, ReconSummary, Tracking, TrackingTuple, Unknowns};
pub use progress::{NoProgress, Progress};
pub use sources::Sources;
pub use store::ClusterStore;
