use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::{Api, Client, api::ListParams};
use podscan_core::{
    ClusterReader, NamespaceScope, PodSnapshot, PullCredential, Result, ScanError,
    ports::{ContainerSpec, ContainerStatusSnapshot},
};
use tracing::{debug, warn};

use super::docker_config::{self, DOCKER_CONFIG_JSON_KEY};

/// Reads pods and pull secrets through the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterReader {
    client: Client,
}

impl std::fmt::Debug for KubeClusterReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterReader").finish_non_exhaustive()
    }
}

impl KubeClusterReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, scope: &NamespaceScope) -> Api<Pod> {
        match scope {
            NamespaceScope::All => Api::all(self.client.clone()),
            NamespaceScope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
        }
    }
}

pub fn pod_snapshot(pod: Pod) -> PodSnapshot {
    let meta = pod.metadata;
    let spec = pod.spec.unwrap_or_default();
    let statuses = pod
        .status
        .and_then(|status| status.container_statuses)
        .unwrap_or_default();

    PodSnapshot {
        name: meta.name.unwrap_or_default(),
        namespace: meta.namespace.unwrap_or_default(),
        uid: meta.uid.unwrap_or_default(),
        labels: meta.labels.unwrap_or_default(),
        containers: spec
            .containers
            .into_iter()
            .map(|container| ContainerSpec {
                name: container.name,
                image: container.image.unwrap_or_default(),
            })
            .collect(),
        container_statuses: statuses
            .into_iter()
            .map(|status| ContainerStatusSnapshot {
                name: status.name,
                image_id: status.image_id,
            })
            .collect(),
        image_pull_secrets: spec
            .image_pull_secrets
            .unwrap_or_default()
            .into_iter()
            .map(|reference| reference.name)
            .filter(|name| !name.is_empty())
            .collect(),
    }
}

fn credential_from_secret(name: &str, secret: &Secret) -> Option<PullCredential> {
    let data = secret.data.as_ref()?;
    let value = data.get(DOCKER_CONFIG_JSON_KEY)?;

    match docker_config::registries(&value.0) {
        Ok(registries) => Some(PullCredential {
            secret_name: name.to_string(),
            registries,
        }),
        Err(err) => {
            warn!(secret = %name, error = %err, "failed to parse docker config in pull secret");
            None
        }
    }
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn list_pods(&self, scope: &NamespaceScope) -> Result<Vec<PodSnapshot>> {
        let pods = self
            .pods(scope)
            .list(&ListParams::default())
            .await
            .map_err(|err| ScanError::Cluster(err.to_string()))?;
        debug!(scope = %scope, pods = pods.items.len(), "listed pods");
        Ok(pods.items.into_iter().map(pod_snapshot).collect())
    }

    /// Secrets that cannot be fetched or parsed are skipped with a warning.
    async fn pull_credentials(&self, pod: &PodSnapshot) -> Result<Vec<PullCredential>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &pod.namespace);
        let mut credentials = Vec::with_capacity(pod.image_pull_secrets.len());

        for name in &pod.image_pull_secrets {
            match secrets.get(name).await {
                Ok(secret) => credentials.extend(credential_from_secret(name, &secret)),
                Err(err) => warn!(
                    pod = %pod.name,
                    namespace = %pod.namespace,
                    secret = %name,
                    error = %err,
                    "failed to get image pull secret"
                ),
            }
        }
        Ok(credentials)
    }
}
