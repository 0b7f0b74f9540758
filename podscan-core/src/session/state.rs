use std::sync::Arc;

use chrono::{DateTime, Utc};
use podscan_model::{ImageScanResult, ScanId, ScanProgress, SessionId, SessionStatus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{record::RecordOutcome, registry::ImageRegistry};

pub type SharedState = Arc<Mutex<SessionState>>;

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    started_at: DateTime<Utc>,
    /// Cancelled when the session is cleared or superseded; the dispatcher
    /// stops admitting new images once it fires.
    detach: CancellationToken,
}

/// Everything the controller guards behind its single lock.
#[derive(Debug, Default)]
pub struct SessionState {
    status: SessionStatus,
    session: Option<ActiveSession>,
    registry: ImageRegistry,
    progress: ScanProgress,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedState {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn progress(&self) -> ScanProgress {
        self.progress
    }

    pub fn registry(&self) -> &ImageRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut ImageRegistry {
        &mut self.registry
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.session.as_ref().map(|session| session.started_at)
    }

    pub fn is_current(&self, session: SessionId) -> bool {
        self.session_id() == Some(session)
    }

    fn transition(&mut self, next: SessionStatus) {
        if !self.status.can_transition_to(next) {
            warn!(from = %self.status, to = %next, "unexpected session status transition");
        }
        debug!(from = %self.status, to = %next, "session status transition");
        self.status = next;
    }

    /// Open a new session, discarding whatever the previous one held.
    pub(crate) fn begin(&mut self, id: SessionId) -> CancellationToken {
        self.detach_current();
        let detach = CancellationToken::new();
        self.session = Some(ActiveSession {
            id,
            started_at: Utc::now(),
            detach: detach.clone(),
        });
        self.registry = ImageRegistry::new();
        self.progress = ScanProgress::default();
        self.transition(SessionStatus::Initializing);
        detach
    }

    pub(crate) fn install(&mut self, registry: ImageRegistry) {
        self.progress = ScanProgress::new(registry.len() as u32);
        self.registry = registry;
        self.transition(SessionStatus::Scanning);
    }

    pub(crate) fn fail_initialization(&mut self) {
        self.transition(SessionStatus::InitializationFailed);
    }

    /// Drop the registry and counters and go back to `Idle`.
    pub(crate) fn clear(&mut self) {
        self.detach_current();
        self.session = None;
        self.registry = ImageRegistry::new();
        self.progress = ScanProgress::default();
        self.transition(SessionStatus::Idle);
    }

    fn detach_current(&mut self) {
        if let Some(previous) = self.session.take() {
            previous.detach.cancel();
        }
    }

    /// Count an admission. Returns `false` if `session` is no longer the
    /// active one, in which case nothing changes.
    pub(crate) fn record_started(&mut self, session: SessionId) -> bool {
        if !self.is_current(session) {
            return false;
        }
        if self.progress.images_started_to_scan < self.progress.images_to_scan {
            self.progress.images_started_to_scan += 1;
        } else {
            warn!(%session, "started counter already at images to scan");
        }
        true
    }

    pub(crate) fn record_completed(&mut self, session: SessionId) -> bool {
        if !self.is_current(session) {
            return false;
        }
        if self.progress.images_completed_to_scan
            < self.progress.images_started_to_scan
        {
            self.progress.images_completed_to_scan += 1;
        } else {
            warn!(%session, "completed counter already at started count");
        }
        true
    }

    /// Mark a record failed because its scan never started.
    pub(crate) fn record_launch_failure(&mut self, image: &str, scan_id: ScanId) {
        match self.registry.get_mut(image) {
            Some(record) if record.scan_id() == scan_id && !record.is_completed() => {
                record.complete(false, Vec::new());
            }
            _ => debug!(image, %scan_id, "launch failure for a record no longer tracked"),
        }
    }

    /// Outcome of the record for `image` if it still belongs to `scan_id`.
    pub fn outcome_of(&self, image: &str, scan_id: ScanId) -> RecordOutcome {
        self.registry
            .get(image)
            .filter(|record| record.scan_id() == scan_id)
            .map(|record| record.outcome())
            .unwrap_or_default()
    }

    pub fn result_rows(&self) -> Vec<ImageScanResult> {
        self.registry
            .records()
            .flat_map(|record| record.result_rows())
            .collect()
    }
}
