#![allow(dead_code)]

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use podscan_core::{
    CallbackAddress, ClusterReader, LaunchHandle, LaunchRequest, NamespaceScope,
    PodSnapshot, PullCredential, Result, ScanConfig, ScanLauncher, SessionController,
    ports::ContainerSpec,
};
use podscan_server::AppState;
use tokio::sync::mpsc;

#[derive(Debug)]
pub struct StaticCluster {
    pods: Vec<PodSnapshot>,
}

#[async_trait]
impl ClusterReader for StaticCluster {
    async fn list_pods(&self, _scope: &NamespaceScope) -> Result<Vec<PodSnapshot>> {
        Ok(self.pods.clone())
    }

    async fn pull_credentials(&self, _pod: &PodSnapshot) -> Result<Vec<PullCredential>> {
        Ok(Vec::new())
    }
}

#[derive(Debug)]
pub struct ChannelLauncher {
    launches: mpsc::UnboundedSender<LaunchRequest>,
}

#[async_trait]
impl ScanLauncher for ChannelLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchHandle> {
        let _ = self.launches.send(request.clone());
        Ok(LaunchHandle {
            name: request.scan_id.simple(),
            namespace: request.namespace.clone(),
        })
    }

    async fn remove(&self, _handle: &LaunchHandle) -> Result<()> {
        Ok(())
    }
}

pub fn pod(name: &str, image: &str) -> PodSnapshot {
    PodSnapshot {
        name: name.to_string(),
        namespace: "default".to_string(),
        uid: format!("{name}-uid"),
        labels: BTreeMap::new(),
        containers: vec![ContainerSpec {
            name: "main".to_string(),
            image: image.to_string(),
        }],
        container_statuses: Vec::new(),
        image_pull_secrets: Vec::new(),
    }
}

pub fn controller(
    pods: Vec<PodSnapshot>,
) -> (SessionController, mpsc::UnboundedReceiver<LaunchRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(
        Arc::new(StaticCluster { pods }),
        Arc::new(ChannelLauncher { launches: tx }),
        CallbackAddress::new("127.0.0.1", 8081),
    );
    (controller, rx)
}

/// A controller with one running session over `pods`, plus the first launch.
pub async fn scanning_state(
    pods: Vec<PodSnapshot>,
) -> (AppState, mpsc::UnboundedReceiver<LaunchRequest>) {
    let (controller, rx) = controller(pods);
    controller
        .scan(&ScanConfig::default())
        .await
        .expect("scan starts");
    (AppState::new(controller), rx)
}

pub async fn next_launch(rx: &mut mpsc::UnboundedReceiver<LaunchRequest>) -> LaunchRequest {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("launch within timeout")
        .expect("launcher alive")
}
