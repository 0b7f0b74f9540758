use std::{fmt, sync::Arc, time::Duration};

use podscan_model::{ScanId, SessionId, Severity};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    ports::{CallbackAddress, LaunchRequest, ScanLauncher},
    session::{CompletionWaiter, SharedState, WaitOutcome},
};

use super::{
    admission::{AdmissionPermit, AdmissionPool},
    retention::DeleteJobPolicy,
};

pub const DEFAULT_MAX_PARALLELISM: usize = 10;
pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Tunables for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPolicy {
    pub max_parallelism: usize,
    pub result_timeout: Duration,
    pub delete_job_policy: DeleteJobPolicy,
    pub severity_threshold: Severity,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            result_timeout: DEFAULT_RESULT_TIMEOUT,
            delete_job_policy: DeleteJobPolicy::default(),
            severity_threshold: Severity::default(),
        }
    }
}

/// A record ready to be dispatched, carrying the waiter for its result.
#[derive(Debug)]
pub struct DispatchTicket {
    pub image: String,
    pub scan_id: ScanId,
    pub namespace: String,
    pub pull_secret: Option<String>,
    pub waiter: CompletionWaiter,
}

/// How one image's dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDispatchOutcome {
    LaunchFailed,
    Waited(WaitOutcome),
}

/// Tally of a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub admitted: usize,
    pub completed: usize,
    pub launch_failures: usize,
    pub timed_out: usize,
    pub abandoned: usize,
    /// The session was cleared or replaced before every image was admitted.
    pub detached: bool,
}

impl BatchSummary {
    fn absorb(&mut self, outcome: ImageDispatchOutcome) {
        match outcome {
            ImageDispatchOutcome::LaunchFailed => self.launch_failures += 1,
            ImageDispatchOutcome::Waited(WaitOutcome::Completed) => {
                self.completed += 1
            }
            ImageDispatchOutcome::Waited(WaitOutcome::TimedOut) => {
                self.timed_out += 1
            }
            ImageDispatchOutcome::Waited(WaitOutcome::Abandoned) => {
                self.abandoned += 1
            }
        }
    }
}

/// Runs one scan per record with at most `max_parallelism` in flight.
///
/// Admission and counter updates go through the shared session lock; the
/// per-image wait does not, so results and progress queries are never
/// blocked behind an in-flight scan.
pub struct BatchDispatcher {
    inner: Arc<DispatcherInner>,
    pool: AdmissionPool,
    detach: CancellationToken,
}

struct DispatcherInner {
    session: SessionId,
    state: SharedState,
    launcher: Arc<dyn ScanLauncher>,
    policy: DispatchPolicy,
    callback: CallbackAddress,
}

impl fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("session", &self.inner.session)
            .field("policy", &self.inner.policy)
            .field("callback", &self.inner.callback)
            .field("launcher", &"ScanLauncher")
            .field("pool", &self.pool)
            .field("detached", &self.detach.is_cancelled())
            .finish()
    }
}

impl BatchDispatcher {
    pub fn new(
        session: SessionId,
        state: SharedState,
        launcher: Arc<dyn ScanLauncher>,
        policy: DispatchPolicy,
        callback: CallbackAddress,
        detach: CancellationToken,
    ) -> Self {
        let pool = AdmissionPool::new(policy.max_parallelism);
        Self {
            inner: Arc::new(DispatcherInner {
                session,
                state,
                launcher,
                policy,
                callback,
            }),
            pool,
            detach,
        }
    }

    pub async fn run(self, tickets: Vec<DispatchTicket>) -> BatchSummary {
        let session = self.inner.session;
        let total = tickets.len();
        let mut summary = BatchSummary::default();
        let mut workers = JoinSet::new();

        info!(%session, images = total, limit = self.pool.limit(), "starting scan batch");

        for ticket in tickets {
            let permit = tokio::select! {
                biased;
                _ = self.detach.cancelled() => {
                    summary.detached = true;
                    break;
                }
                permit = self.pool.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(err) => {
                        warn!(%session, error = %err, "admission failed, stopping batch");
                        break;
                    }
                },
            };

            if !self.inner.state.lock().await.record_started(session) {
                summary.detached = true;
                break;
            }
            summary.admitted += 1;

            let span = info_span!(
                "scan_image",
                image = %ticket.image,
                scan_id = %ticket.scan_id
            );
            let inner = Arc::clone(&self.inner);
            workers.spawn(inner.scan_one(ticket, permit).instrument(span));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => summary.absorb(outcome),
                Err(err) => warn!(%session, error = %err, "scan worker panicked"),
            }
        }

        if summary.detached {
            info!(%session, admitted = summary.admitted, images = total, "scan batch detached from session");
        } else {
            info!(
                %session,
                images = total,
                completed = summary.completed,
                timed_out = summary.timed_out,
                launch_failures = summary.launch_failures,
                "scan batch finished"
            );
        }
        summary
    }
}

impl DispatcherInner {
    async fn scan_one(
        self: Arc<Self>,
        ticket: DispatchTicket,
        _permit: AdmissionPermit,
    ) -> ImageDispatchOutcome {
        let request = LaunchRequest {
            image: ticket.image.clone(),
            scan_id: ticket.scan_id,
            namespace: ticket.namespace.clone(),
            pull_secret: ticket.pull_secret.clone(),
            callback: self.callback.clone(),
            severity_threshold: self.policy.severity_threshold,
        };

        let handle = match self.launcher.launch(&request).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(error = %err, "failed to launch scan");
                let mut state = self.state.lock().await;
                if state.is_current(self.session) {
                    state.record_launch_failure(&ticket.image, ticket.scan_id);
                    state.record_completed(self.session);
                }
                return ImageDispatchOutcome::LaunchFailed;
            }
        };
        debug!(job = %handle.name, namespace = %handle.namespace, "scan launched");

        let waited = ticket.waiter.wait(self.policy.result_timeout).await;
        match waited {
            WaitOutcome::Completed => debug!("scan result received"),
            WaitOutcome::TimedOut => warn!(
                timeout = ?self.policy.result_timeout,
                "timed out waiting for scan result"
            ),
            WaitOutcome::Abandoned => {
                debug!("scan record discarded before its result arrived")
            }
        }

        // A detached session leaves its launched jobs alone.
        let outcome = {
            let mut state = self.state.lock().await;
            state
                .record_completed(self.session)
                .then(|| state.outcome_of(&ticket.image, ticket.scan_id))
        };

        match outcome {
            Some(outcome)
                if waited != WaitOutcome::Abandoned
                    && self.policy.delete_job_policy.should_delete(outcome) =>
            {
                if let Err(err) = self.launcher.remove(&handle).await {
                    warn!(job = %handle.name, error = %err, "failed to delete scan job");
                }
            }
            Some(_) => {}
            None => debug!(job = %handle.name, "session detached, keeping scan job"),
        }

        ImageDispatchOutcome::Waited(waited)
    }
}
