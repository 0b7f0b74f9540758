use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::{
    api::{
        batch::v1::{Job, JobSpec},
        core::v1::{
            Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec,
            SecretKeySelector,
        },
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::{
    Api, Client,
    api::{DeleteParams, PostParams},
};
use podscan_core::{
    LaunchHandle, LaunchRequest, Result, ScanError, ScanLauncher,
};
use tracing::{debug, info};

use super::docker_config::DOCKER_CONFIG_JSON_KEY;
use crate::infra::config::ScannerJobConfig;

pub const SCANNER_CONTAINER_NAME: &str = "scanner";
pub const JOB_NAME_PREFIX: &str = "podscan-";
const APP_LABEL: (&str, &str) = ("app", "podscan-scanner");
const ISTIO_INJECT_ANNOTATION: (&str, &str) = ("sidecar.istio.io/inject", "false");

/// Runs each scan as a batch/v1 Job in the namespace of the image's first pod.
#[derive(Clone)]
pub struct KubeJobLauncher {
    client: Client,
    scanner: ScannerJobConfig,
}

impl std::fmt::Debug for KubeJobLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeJobLauncher")
            .field("scanner", &self.scanner)
            .finish_non_exhaustive()
    }
}

impl KubeJobLauncher {
    pub fn new(client: Client, scanner: ScannerJobConfig) -> Self {
        Self { client, scanner }
    }
}

pub fn job_name(request: &LaunchRequest) -> String {
    format!("{JOB_NAME_PREFIX}{}", request.scan_id.simple())
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

fn scanner_env(scanner: &ScannerJobConfig, request: &LaunchRequest) -> Vec<EnvVar> {
    let mut env = vec![
        env_var("CLAIR_ADDR", scanner.db_address.clone()),
        env_var("CLAIR_OUTPUT", request.severity_threshold.as_str()),
        env_var("KLAR_TRACE", scanner.trace.to_string()),
        env_var("RESULT_SERVICE_PATH", request.callback.url()),
        env_var("SCAN_UUID", request.scan_id.to_string()),
    ];

    if let Some(secret) = &request.pull_secret {
        env.push(EnvVar {
            name: "K8S_IMAGE_PULL_SECRET".to_string(),
            value: None,
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.clone(),
                    key: DOCKER_CONFIG_JSON_KEY.to_string(),
                    optional: None,
                }),
                ..Default::default()
            }),
        });
    }
    env
}

/// The Job manifest for one scan: no retries, never restarted.
pub fn build_job(scanner: &ScannerJobConfig, request: &LaunchRequest) -> Job {
    let labels = BTreeMap::from([(APP_LABEL.0.to_string(), APP_LABEL.1.to_string())]);
    let annotations = BTreeMap::from([(
        ISTIO_INJECT_ANNOTATION.0.to_string(),
        ISTIO_INJECT_ANNOTATION.1.to_string(),
    )]);

    Job {
        metadata: ObjectMeta {
            name: Some(job_name(request)),
            namespace: Some(request.namespace.clone()),
            labels: Some(labels.clone()),
            annotations: Some(annotations.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    containers: vec![Container {
                        name: SCANNER_CONTAINER_NAME.to_string(),
                        image: Some(scanner.image.clone()),
                        args: Some(vec![request.image.clone()]),
                        env: Some(scanner_env(scanner, request)),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ScanLauncher for KubeJobLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchHandle> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), &request.namespace);
        let job = build_job(&self.scanner, request);

        let created = jobs
            .create(&PostParams::default(), &job)
            .await
            .map_err(|err| ScanError::Launch {
                image: request.image.clone(),
                reason: err.to_string(),
            })?;

        let name = created.metadata.name.unwrap_or_else(|| job_name(request));
        info!(
            job = %name,
            namespace = %request.namespace,
            image = %request.image,
            "scan job created"
        );
        Ok(LaunchHandle {
            name,
            namespace: request.namespace.clone(),
        })
    }

    async fn remove(&self, handle: &LaunchHandle) -> Result<()> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), &handle.namespace);
        jobs.delete(&handle.name, &DeleteParams::background())
            .await
            .map_err(|err| {
                ScanError::Cluster(format!("failed to delete job {}: {err}", handle.name))
            })?;
        debug!(job = %handle.name, namespace = %handle.namespace, "scan job deleted");
        Ok(())
    }
}
