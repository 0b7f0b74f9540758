use axum::{body::Bytes, extract::State, http::StatusCode};
use podscan_core::collector::decode_report;
use tracing::{debug, error};

use crate::infra::{app_state::AppState, errors::AppResult};

/// Receives a scanner's report for one image.
///
/// Undecodable bodies and reports for images outside the session are
/// rejected with 400. Reports that no longer match their record (another
/// session's scan id, or a second report for a resolved record) are
/// acknowledged and dropped.
pub async fn receive_result_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<StatusCode> {
    let report = decode_report(&body).inspect_err(|err| {
        error!(error = %err, "invalid scan result");
    })?;
    debug!(
        image = %report.image,
        success = report.success,
        scan_id = %report.scan_uuid,
        "scan result received"
    );

    let image = report.image.clone();
    match state.controller.submit_result(report).await {
        Ok(()) => {
            debug!(image = %image, "scan result added");
            Ok(StatusCode::ACCEPTED)
        }
        Err(err) if err.is_discarded_result() => Ok(StatusCode::ACCEPTED),
        Err(err) => {
            error!(image = %image, error = %err, "failed to handle scan result");
            Err(err.into())
        }
    }
}
