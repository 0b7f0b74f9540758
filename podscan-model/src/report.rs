use serde::{Deserialize, Serialize};

use crate::vulnerability::Vulnerability;

/// Body a scan job posts back to `/result/*` once it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVulnerabilities {
    pub image: String,
    #[serde(rename = "scanUUID", alias = "scanuuid")]
    pub scan_uuid: String,
    pub success: bool,
    /// Scanners send `null` for a clean image.
    #[serde(default)]
    pub vulnerabilities: Option<Vec<Vulnerability>>,
}

impl ImageVulnerabilities {
    pub fn findings(&self) -> &[Vulnerability] {
        self.vulnerabilities.as_deref().unwrap_or_default()
    }
}
