//! Contracts for the collaborators the session drives but does not own: the
//! cluster API (pods and pull secrets) and the job runtime that hosts the
//! out-of-process scanner.

use std::{collections::BTreeMap, fmt};

use async_trait::async_trait;
use podscan_model::{ScanId, Severity};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which namespaces a pod listing covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespaceScope {
    #[default]
    All,
    Namespace(String),
}

impl NamespaceScope {
    /// Empty or missing names select every namespace.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(ns) if !ns.is_empty() => NamespaceScope::Namespace(ns.to_string()),
            _ => NamespaceScope::All,
        }
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceScope::All => f.write_str("<all>"),
            NamespaceScope::Namespace(ns) => f.write_str(ns),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
}

/// Runtime view of a container as reported in the pod status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatusSnapshot {
    pub name: String,
    pub image_id: String,
}

/// The parts of a pod the resolver needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerSpec>,
    pub container_statuses: Vec<ContainerStatusSnapshot>,
    /// Names of the pull secrets attached to the pod spec.
    pub image_pull_secrets: Vec<String>,
}

/// A pull secret together with the registries its docker config covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullCredential {
    pub secret_name: String,
    pub registries: Vec<String>,
}

/// Read access to the cluster.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterReader: Send + Sync {
    async fn list_pods(&self, scope: &NamespaceScope) -> Result<Vec<PodSnapshot>>;

    /// Resolve the pod's attached pull secrets. Secrets that cannot be read
    /// are the implementation's to skip or report.
    async fn pull_credentials(
        &self,
        pod: &PodSnapshot,
    ) -> Result<Vec<PullCredential>>;
}

/// Where scan jobs post their results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAddress {
    pub host: String,
    pub port: u16,
}

impl CallbackAddress {
    pub const RESULT_PATH: &'static str = "/result/";

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, Self::RESULT_PATH)
    }
}

/// Everything a job runtime needs to start one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub image: String,
    pub scan_id: ScanId,
    /// Namespace of the first owning pod with a matching pull secret (or of
    /// the first owning pod); the scan unit runs there so it can mount that
    /// secret.
    pub namespace: String,
    pub pull_secret: Option<String>,
    pub callback: CallbackAddress,
    pub severity_threshold: Severity,
}

/// Reference to a launched scan unit, used for cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchHandle {
    pub name: String,
    pub namespace: String,
}

/// Starts and removes out-of-process scans.
#[async_trait]
pub trait ScanLauncher: Send + Sync {
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchHandle>;

    async fn remove(&self, handle: &LaunchHandle) -> Result<()>;
}
