//! Kubernetes implementations of the cluster and job-launch ports.

pub mod cluster;
pub mod docker_config;
pub mod jobs;

pub use cluster::KubeClusterReader;
pub use jobs::KubeJobLauncher;
