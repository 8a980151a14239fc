use thiserror::Error;

use crate::model::TrackingTuple;

pub type Result<T> = std::result::Result<T, ReconError>;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (unknown group in scope, bad tolerance, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// A key appears both in non-portal reimbursements and in portal data.
    /// Fatal: the run stops before anything is persisted.
    #[error("{}", collision_message(.tuples, .purchase_orders))]
    ReimbursementCollision {
        tuples: Vec<(TrackingTuple, String)>,
        purchase_orders: Vec<String>,
    },

    /// A tabular cluster row could not be parsed.
    #[error("row {line}: {message}")]
    MalformedRow { line: u64, message: String },

    /// Missing required column in an input CSV.
    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: String, column: String },

    /// Amount parse error in an input CSV.
    #[error("{file}: cannot parse amount '{value}' for '{key}'")]
    AmountParse { file: String, key: String, value: String },

    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported cluster store: {0}")]
    StoreFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An upstream collaborator (tracking feed, portal) failed. Propagated as-is.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Failure reported by an external collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name}: {message}")]
    Unavailable { source_name: String, message: String },

    #[error("no price known for order {0}")]
    UnknownOrder(String),
}

impl SourceError {
    pub fn unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

fn collision_message(tuples: &[(TrackingTuple, String)], purchase_orders: &[String]) -> String {
    let mut parts = Vec::new();
    for (tuple, group) in tuples {
        parts.push(format!("tracking {tuple} (portal group {group})"));
    }
    for po in purchase_orders {
        parts.push(format!("PO {po}"));
    }
    format!(
        "non-portal reimbursements overlap portal data: {}",
        parts.join(", ")
    )
}
