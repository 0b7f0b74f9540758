//! Core data model definitions shared across podscan crates.
#![allow(missing_docs)]

pub mod error;
pub mod ids;
pub mod report;
pub mod results;
pub mod session;
pub mod vulnerability;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use ids::{ScanId, SessionId};
pub use report::ImageVulnerabilities;
pub use results::{ImageScanResult, ScanResults};
pub use session::{ScanProgress, SessionStatus};
pub use vulnerability::{Severity, Vulnerability};
