//! Correlates scanner reports with their scan records.

use podscan_model::ImageVulnerabilities;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, ScanError},
    session::SessionState,
};

pub fn decode_report(body: &[u8]) -> Result<ImageVulnerabilities> {
    Ok(serde_json::from_slice(body)?)
}

/// Apply `report` to the record for its image.
///
/// Reports for images the session does not know about are errors. Reports
/// carrying another scan id, or arriving for a record that already resolved,
/// come back as [`ScanError::StaleResult`] / [`ScanError::DuplicateResult`]
/// and leave the record untouched.
pub(crate) fn apply_report(
    state: &mut SessionState,
    report: ImageVulnerabilities,
) -> Result<()> {
    let Some(record) = state.registry_mut().get_mut(&report.image) else {
        return Err(ScanError::UnknownImage(report.image));
    };

    if !record.scan_id().matches(&report.scan_uuid) {
        return Err(ScanError::StaleResult {
            expected: record.scan_id(),
            image: report.image,
            received: report.scan_uuid,
        });
    }

    if record.is_completed() {
        return Err(ScanError::DuplicateResult {
            scan_id: record.scan_id(),
            image: report.image,
        });
    }

    if !report.success {
        warn!(image = %report.image, scan_id = %record.scan_id(), "scanner reported a failed scan");
    }

    if report.success && report.vulnerabilities.is_none() {
        info!(image = %report.image, "no vulnerabilities found");
    }

    let findings = report.vulnerabilities.unwrap_or_default();
    let count = findings.len();
    if record.complete(report.success, findings) {
        debug!(image = %report.image, vulnerabilities = count, "scan result recorded");
    } else {
        warn!(
            image = %report.image,
            scan_id = %record.scan_id(),
            "scan result recorded but nobody was waiting for it"
        );
    }
    Ok(())
}
