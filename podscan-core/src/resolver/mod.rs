//! Turns the pods in a scan scope into container occurrences.

pub mod image_ref;

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, ScanError},
    ports::{ClusterReader, ContainerSpec, NamespaceScope, PodSnapshot},
    session::PodContext,
};

pub use image_ref::{matching_secret, parse_image_hash, registry_host};

/// Pods labelled `kubeiShouldScan=false` are skipped.
pub const IGNORE_POD_SCAN_LABEL_KEY: &str = "kubeiShouldScan";
pub const IGNORE_POD_SCAN_LABEL_VALUE: &str = "false";

/// What to scan: a namespace (or all of them) minus an ignore list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanScope {
    pub target: NamespaceScope,
    #[serde(default)]
    pub ignored_namespaces: BTreeSet<String>,
}

impl ScanScope {
    pub fn new(target: NamespaceScope) -> Self {
        Self {
            target,
            ignored_namespaces: BTreeSet::new(),
        }
    }

    pub fn ignoring<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_namespaces
            .extend(namespaces.into_iter().map(Into::into));
        self
    }
}

/// A container and the image it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOccurrence {
    pub image: String,
    pub context: PodContext,
}

pub fn should_ignore_pod(
    pod: &PodSnapshot,
    ignored_namespaces: &BTreeSet<String>,
) -> bool {
    if ignored_namespaces.contains(&pod.namespace) {
        info!(
            pod = %pod.name,
            namespace = %pod.namespace,
            "skipping pod scan, namespace is in the ignored namespaces list"
        );
        return true;
    }
    if pod.labels.get(IGNORE_POD_SCAN_LABEL_KEY).map(String::as_str)
        == Some(IGNORE_POD_SCAN_LABEL_VALUE)
    {
        info!(
            pod = %pod.name,
            namespace = %pod.namespace,
            "skipping pod scan, pod has an ignore label"
        );
        return true;
    }
    false
}

/// Content hash for `container`, taken from the observed container status
/// with the same name. The spec image and the status image may be spelled
/// differently, so only the status is trusted.
fn image_hash(
    observed: &HashMap<&str, &str>,
    container: &ContainerSpec,
) -> Option<String> {
    let Some(image_id) = observed.get(container.name.as_str()) else {
        warn!(
            container = %container.name,
            image = %container.image,
            "image id is missing"
        );
        return None;
    };

    let hash = parse_image_hash(image_id);
    if hash.is_none() {
        warn!(
            container = %container.name,
            image = %container.image,
            image_id = %image_id,
            "failed to parse image hash"
        );
    }
    hash
}

pub struct TargetResolver {
    cluster: Arc<dyn ClusterReader>,
}

impl fmt::Debug for TargetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetResolver")
            .field("cluster", &"ClusterReader")
            .finish()
    }
}

impl TargetResolver {
    pub fn new(cluster: Arc<dyn ClusterReader>) -> Self {
        Self { cluster }
    }

    /// Every container occurrence of every eligible pod in `scope`.
    ///
    /// Failing to list pods is the only error; missing hashes or unreadable
    /// pull secrets degrade the context instead.
    pub async fn resolve(
        &self,
        scope: &ScanScope,
    ) -> Result<Vec<ContainerOccurrence>> {
        let pods = self.cluster.list_pods(&scope.target).await.map_err(|err| {
            ScanError::Initialization(format!(
                "failed to list pods. namespace={}: {err}",
                scope.target
            ))
        })?;

        let mut occurrences = Vec::new();
        for pod in &pods {
            if should_ignore_pod(pod, &scope.ignored_namespaces) {
                continue;
            }
            occurrences.extend(self.resolve_pod(pod).await);
        }

        debug!(
            pods = pods.len(),
            containers = occurrences.len(),
            scope = %scope.target,
            "resolved scan targets"
        );
        Ok(occurrences)
    }

    async fn resolve_pod(&self, pod: &PodSnapshot) -> Vec<ContainerOccurrence> {
        let credentials = if pod.image_pull_secrets.is_empty() {
            Vec::new()
        } else {
            match self.cluster.pull_credentials(pod).await {
                Ok(credentials) => credentials,
                Err(err) => {
                    warn!(
                        pod = %pod.name,
                        namespace = %pod.namespace,
                        error = %err,
                        "failed to read image pull secrets"
                    );
                    Vec::new()
                }
            }
        };

        let observed: HashMap<&str, &str> = pod
            .container_statuses
            .iter()
            .map(|status| (status.name.as_str(), status.image_id.as_str()))
            .collect();

        pod.containers
            .iter()
            .map(|container| ContainerOccurrence {
                image: container.image.clone(),
                context: PodContext {
                    container_name: container.name.clone(),
                    pod_name: pod.name.clone(),
                    namespace: pod.namespace.clone(),
                    pod_uid: pod.uid.clone(),
                    image_pull_secret: matching_secret(
                        &credentials,
                        &container.image,
                    ),
                    image_hash: image_hash(&observed, container),
                },
            })
            .collect()
    }
}
