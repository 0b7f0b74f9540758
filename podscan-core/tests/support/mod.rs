//! Fakes for the cluster and job runtime used by the session tests.
#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use podscan_core::{
    CallbackAddress, ClusterReader, LaunchHandle, LaunchRequest, NamespaceScope,
    PodSnapshot, PullCredential, Result, ScanError, ScanLauncher, SessionController,
    model::{ImageVulnerabilities, ScanProgress},
    ports::{ContainerSpec, ContainerStatusSnapshot},
};
use tokio::sync::mpsc;

pub const DIGEST_A: &str =
    "0c5e4d0b5e5dfa4a6ab1ce8ae4c0ed0a9f8e1b5a0c6a4d2b1e3f5a7c9d1e3f5a";

pub fn pod(name: &str, namespace: &str, containers: &[(&str, &str)]) -> PodSnapshot {
    PodSnapshot {
        name: name.to_string(),
        namespace: namespace.to_string(),
        uid: format!("{name}-uid"),
        labels: BTreeMap::new(),
        containers: containers
            .iter()
            .map(|(container, image)| ContainerSpec {
                name: container.to_string(),
                image: image.to_string(),
            })
            .collect(),
        container_statuses: containers
            .iter()
            .map(|(container, image)| ContainerStatusSnapshot {
                name: container.to_string(),
                image_id: format!("{image}@sha256:{DIGEST_A}"),
            })
            .collect(),
        image_pull_secrets: Vec::new(),
    }
}

/// Serves a fixed pod list, filtered by namespace scope.
#[derive(Debug, Default)]
pub struct FakeCluster {
    pods: Vec<PodSnapshot>,
    fail_listing: bool,
}

impl FakeCluster {
    pub fn with_pods(pods: Vec<PodSnapshot>) -> Self {
        Self {
            pods,
            fail_listing: false,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            pods: Vec::new(),
            fail_listing: true,
        }
    }
}

#[async_trait]
impl ClusterReader for FakeCluster {
    async fn list_pods(&self, scope: &NamespaceScope) -> Result<Vec<PodSnapshot>> {
        if self.fail_listing {
            return Err(ScanError::Cluster("connection refused".into()));
        }
        Ok(self
            .pods
            .iter()
            .filter(|pod| match scope {
                NamespaceScope::All => true,
                NamespaceScope::Namespace(ns) => &pod.namespace == ns,
            })
            .cloned()
            .collect())
    }

    async fn pull_credentials(&self, _pod: &PodSnapshot) -> Result<Vec<PullCredential>> {
        Ok(Vec::new())
    }
}

/// Records every launch and removal; launches are also streamed to the test.
#[derive(Debug)]
pub struct FakeLauncher {
    failing: HashSet<String>,
    launches: mpsc::UnboundedSender<LaunchRequest>,
    removed: Mutex<Vec<LaunchHandle>>,
}

impl FakeLauncher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<LaunchRequest>) {
        Self::failing(&[])
    }

    pub fn failing(
        images: &[&str],
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<LaunchRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let launcher = Arc::new(Self {
            failing: images.iter().map(|image| image.to_string()).collect(),
            launches: tx,
            removed: Mutex::new(Vec::new()),
        });
        (launcher, rx)
    }

    pub fn removed(&self) -> Vec<LaunchHandle> {
        self.removed.lock().expect("removed lock").clone()
    }
}

#[async_trait]
impl ScanLauncher for FakeLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchHandle> {
        if self.failing.contains(&request.image) {
            return Err(ScanError::Launch {
                image: request.image.clone(),
                reason: "admission webhook denied the request".into(),
            });
        }
        let _ = self.launches.send(request.clone());
        Ok(LaunchHandle {
            name: format!("podscan-{}", request.scan_id.simple()),
            namespace: request.namespace.clone(),
        })
    }

    async fn remove(&self, handle: &LaunchHandle) -> Result<()> {
        self.removed.lock().expect("removed lock").push(handle.clone());
        Ok(())
    }
}

pub fn controller(
    cluster: FakeCluster,
    launcher: Arc<FakeLauncher>,
) -> SessionController {
    SessionController::new(
        Arc::new(cluster),
        launcher,
        CallbackAddress::new("podscan.podscan", 8081),
    )
}

pub fn report_for(request: &LaunchRequest, success: bool) -> ImageVulnerabilities {
    ImageVulnerabilities {
        image: request.image.clone(),
        scan_uuid: request.scan_id.to_string(),
        success,
        vulnerabilities: None,
    }
}

pub async fn next_launch(
    rx: &mut mpsc::UnboundedReceiver<LaunchRequest>,
) -> LaunchRequest {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("launch within timeout")
        .expect("launcher still alive")
}

/// Poll progress until every image has been waited on.
pub async fn wait_until_finished(controller: &SessionController) -> ScanProgress {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let progress = controller.progress().await;
            assert!(progress.images_completed_to_scan <= progress.images_started_to_scan);
            assert!(progress.images_started_to_scan <= progress.images_to_scan);
            if progress.is_finished() {
                return progress;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session finished within timeout")
}
