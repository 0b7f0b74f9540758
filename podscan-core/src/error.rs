use podscan_model::ScanId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to initiate scan: {0}")]
    Initialization(String),

    #[error("no scan data for image '{0}'")]
    UnknownImage(String),

    #[error(
        "scan id mismatch for image '{image}': received {received}, expected {expected}"
    )]
    StaleResult {
        image: String,
        received: String,
        expected: ScanId,
    },

    #[error("duplicate result for image '{image}' (scan id {scan_id})")]
    DuplicateResult { image: String, scan_id: ScanId },

    #[error("failed to launch scan for image '{image}': {reason}")]
    Launch { image: String, reason: String },

    #[error("failed to decode result: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cluster error: {0}")]
    Cluster(String),

    #[error("result endpoint error: {0}")]
    Endpoint(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Result anomalies that are expected during normal operation and are
    /// dropped rather than reported back to the scanner as failures.
    pub fn is_discarded_result(&self) -> bool {
        matches!(
            self,
            ScanError::StaleResult { .. } | ScanError::DuplicateResult { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
