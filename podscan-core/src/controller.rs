//! The session surface: Scan, Progress, Status, Results and Clear.
//!
//! One [`SessionController`] owns the session state. Every read and write of
//! the registry, counters and status goes through its lock, including the
//! result reports the endpoint feeds back in.

use std::{fmt, sync::Arc};

use chrono::Utc;
use podscan_model::{
    ImageVulnerabilities, ScanProgress, ScanResults, SessionId, SessionStatus,
};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::{
    collector::{apply_report, decode_report},
    dispatch::{BatchDispatcher, BatchSummary, DispatchPolicy},
    error::{Result, ScanError},
    ports::{CallbackAddress, ClusterReader, ScanLauncher},
    resolver::{ScanScope, TargetResolver},
    session::{ImageRegistry, SessionState, SharedState},
};

/// Per-session inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanConfig {
    pub scope: ScanScope,
    pub policy: DispatchPolicy,
}

/// Returned by [`SessionController::scan`] once initialization succeeded.
#[derive(Debug)]
pub struct SessionHandle {
    pub session: SessionId,
    pub images_to_scan: u32,
    dispatch: JoinHandle<BatchSummary>,
}

impl SessionHandle {
    /// Wait for the dispatcher to admit and wait on every image.
    pub async fn join(self) -> Result<BatchSummary> {
        self.dispatch
            .await
            .map_err(|err| ScanError::Internal(format!("dispatcher task failed: {err}")))
    }
}

#[derive(Clone)]
pub struct SessionController {
    state: SharedState,
    resolver: Arc<TargetResolver>,
    launcher: Arc<dyn ScanLauncher>,
    callback: CallbackAddress,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self
            .state
            .try_lock()
            .map(|state| state.status().to_string())
            .unwrap_or_else(|_| "<locked>".to_string());
        f.debug_struct("SessionController")
            .field("status", &status)
            .field("callback", &self.callback)
            .field("resolver", &self.resolver)
            .field("launcher", &std::any::type_name::<dyn ScanLauncher>())
            .finish()
    }
}

impl SessionController {
    pub fn new(
        cluster: Arc<dyn ClusterReader>,
        launcher: Arc<dyn ScanLauncher>,
        callback: CallbackAddress,
    ) -> Self {
        Self {
            state: SessionState::shared(),
            resolver: Arc::new(TargetResolver::new(cluster)),
            launcher,
            callback,
        }
    }

    pub fn callback(&self) -> &CallbackAddress {
        &self.callback
    }

    /// Start a new session over `config.scope`.
    ///
    /// Resolution and registry construction run while holding the session
    /// lock, so progress and result calls made meanwhile observe the
    /// `Initializing` state. Dispatch runs on its own task; this returns as
    /// soon as the registry is installed.
    pub async fn scan(&self, config: &ScanConfig) -> Result<SessionHandle> {
        let mut state = self.state.lock().await;
        let session = SessionId::new();
        let detach = state.begin(session);
        info!(%session, scope = %config.scope.target, "initializing scan session");

        let occurrences = match self.resolver.resolve(&config.scope).await {
            Ok(occurrences) => occurrences,
            Err(err) => {
                error!(%session, error = %err, "scan session initialization failed");
                state.fail_initialization();
                return Err(err);
            }
        };

        state.install(ImageRegistry::from_occurrences(occurrences));
        let tickets = state.registry_mut().claim_tickets();
        let images_to_scan = state.progress().images_to_scan;
        drop(state);

        info!(%session, images = images_to_scan, "scan session initialized");

        let dispatcher = BatchDispatcher::new(
            session,
            Arc::clone(&self.state),
            Arc::clone(&self.launcher),
            config.policy.clone(),
            self.callback.clone(),
            detach,
        );
        let dispatch = tokio::spawn(
            dispatcher
                .run(tickets)
                .instrument(info_span!("scan_session", %session)),
        );

        Ok(SessionHandle {
            session,
            images_to_scan,
            dispatch,
        })
    }

    pub async fn progress(&self) -> ScanProgress {
        self.state.lock().await.progress()
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status()
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.state.lock().await.session_id()
    }

    /// One row per owning container of every completed record.
    pub async fn results(&self) -> ScanResults {
        let state = self.state.lock().await;
        ScanResults {
            image_scan_results: state.result_rows(),
            progress: state.progress(),
            generated_at: Utc::now(),
        }
    }

    /// Forget the current session. Scans already launched keep running; their
    /// results no longer match any record and are dropped on arrival.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let previous = state.session_id();
        state.clear();
        info!(session = ?previous, "scan session cleared");
    }

    /// Record a scanner report.
    pub async fn submit_result(&self, report: ImageVulnerabilities) -> Result<()> {
        let image = report.image.clone();
        let mut state = self.state.lock().await;
        match apply_report(&mut state, report) {
            Err(err) if err.is_discarded_result() => {
                warn!(image = %image, error = %err, "discarding scan result");
                Err(err)
            }
            Err(err) => {
                warn!(image = %image, error = %err, "rejecting scan result");
                Err(err)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Decode and record a raw report body.
    pub async fn submit_raw(&self, body: &[u8]) -> Result<()> {
        let report = decode_report(body)?;
        self.submit_result(report).await
    }
}
