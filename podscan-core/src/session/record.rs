use chrono::{DateTime, Utc};
use podscan_model::{ImageScanResult, ScanId, Vulnerability};

use super::completion::{CompletionNotifier, CompletionWaiter, completion_channel};

/// One container occurrence of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodContext {
    pub container_name: String,
    pub pod_name: String,
    pub namespace: String,
    pub pod_uid: String,
    pub image_pull_secret: Option<String>,
    pub image_hash: Option<String>,
}

/// Snapshot of a record's resolution, used for job retention decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    pub completed: bool,
    pub success: bool,
}

/// Per-image bookkeeping for one session.
#[derive(Debug)]
pub struct ScanRecord {
    image: String,
    contexts: Vec<PodContext>,
    scan_id: ScanId,
    completed: bool,
    success: bool,
    vulnerabilities: Vec<Vulnerability>,
    completed_at: Option<DateTime<Utc>>,
    notifier: CompletionNotifier,
    /// Held until the dispatcher claims it.
    waiter: Option<CompletionWaiter>,
}

impl ScanRecord {
    pub fn new(image: impl Into<String>, first: PodContext) -> Self {
        let (notifier, waiter) = completion_channel();
        Self {
            image: image.into(),
            contexts: vec![first],
            scan_id: ScanId::new(),
            completed: false,
            success: false,
            vulnerabilities: Vec::new(),
            completed_at: None,
            notifier,
            waiter: Some(waiter),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    pub fn contexts(&self) -> &[PodContext] {
        &self.contexts
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn vulnerabilities(&self) -> &[Vulnerability] {
        &self.vulnerabilities
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn outcome(&self) -> RecordOutcome {
        RecordOutcome {
            completed: self.completed,
            success: self.success,
        }
    }

    pub(crate) fn push_context(&mut self, context: PodContext) {
        self.contexts.push(context);
    }

    pub(crate) fn take_waiter(&mut self) -> Option<CompletionWaiter> {
        self.waiter.take()
    }

    /// Records the outcome and wakes the dispatcher if it is still waiting.
    ///
    /// Callers check `is_completed` first; a record resolves once.
    /// Returns whether a waiter received the signal.
    pub(crate) fn complete(
        &mut self,
        success: bool,
        vulnerabilities: Vec<Vulnerability>,
    ) -> bool {
        debug_assert!(!self.completed, "scan record completed twice");
        self.completed = true;
        self.success = success;
        self.vulnerabilities = vulnerabilities;
        self.completed_at = Some(Utc::now());
        self.notifier.notify()
    }

    /// Result rows, one per owning container. Empty until completed.
    pub fn result_rows(&self) -> Vec<ImageScanResult> {
        if !self.completed {
            return Vec::new();
        }
        self.contexts
            .iter()
            .map(|context| ImageScanResult {
                pod_name: context.pod_name.clone(),
                pod_namespace: context.namespace.clone(),
                pod_uid: context.pod_uid.clone(),
                image_name: self.image.clone(),
                container_name: context.container_name.clone(),
                image_hash: context.image_hash.clone(),
                vulnerabilities: self.vulnerabilities.clone(),
                success: self.success,
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn context(pod: &str, container: &str) -> PodContext {
    PodContext {
        container_name: container.to_string(),
        pod_name: pod.to_string(),
        namespace: "default".to_string(),
        pod_uid: format!("{pod}-uid"),
        image_pull_secret: None,
        image_hash: None,
    }
}
