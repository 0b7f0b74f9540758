use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    session::ScanProgress,
    vulnerability::{Severity, Vulnerability},
};

/// One row per container occurrence of a scanned image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageScanResult {
    pub pod_name: String,
    pub pod_namespace: String,
    pub pod_uid: String,
    pub image_name: String,
    pub container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub success: bool,
}

impl ImageScanResult {
    pub fn highest_severity(&self) -> Option<Severity> {
        self.vulnerabilities.iter().map(Vulnerability::severity).max()
    }

    /// Findings at or above `threshold`.
    pub fn at_least(
        &self,
        threshold: Severity,
    ) -> impl Iterator<Item = &Vulnerability> {
        self.vulnerabilities
            .iter()
            .filter(move |vuln| vuln.severity() >= threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResults {
    pub image_scan_results: Vec<ImageScanResult>,
    pub progress: ScanProgress,
    pub generated_at: DateTime<Utc>,
}

impl ScanResults {
    pub fn failed(&self) -> impl Iterator<Item = &ImageScanResult> {
        self.image_scan_results.iter().filter(|row| !row.success)
    }
}
