use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use podscan_core::{
    CallbackAddress, DeleteJobPolicy, DispatchPolicy, NamespaceScope, ScanConfig,
    ScanScope,
    dispatch::{DEFAULT_MAX_PARALLELISM, DEFAULT_RESULT_TIMEOUT},
    model::Severity,
};

pub const DEFAULT_LISTEN_PORT: u16 = 8081;
pub const DEFAULT_SERVICE_HOST: &str = "podscan.podscan";
pub const DEFAULT_SCANNER_IMAGE: &str = "ghcr.io/podscan/klar:latest";
pub const DEFAULT_SCANNER_DB_ADDRESS: &str = "clair.podscan";

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub scan: ScanSettings,
    pub endpoint: EndpointConfig,
    pub scanner: ScannerJobConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    /// `None` scans every namespace.
    pub target_namespace: Option<String>,
    pub ignored_namespaces: Vec<String>,
    pub max_parallelism: usize,
    pub result_timeout: Duration,
    pub severity_threshold: Severity,
    pub delete_job_policy: DeleteJobPolicy,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            target_namespace: None,
            ignored_namespaces: Vec::new(),
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            result_timeout: DEFAULT_RESULT_TIMEOUT,
            severity_threshold: Severity::default(),
            delete_job_policy: DeleteJobPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub listen_host: IpAddr,
    pub listen_port: u16,
    /// Host scan jobs use to reach the endpoint, usually the service DNS name.
    pub service_host: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            listen_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            listen_port: DEFAULT_LISTEN_PORT,
            service_host: DEFAULT_SERVICE_HOST.to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_host, self.listen_port)
    }

    pub fn callback(&self) -> CallbackAddress {
        CallbackAddress::new(self.service_host.clone(), self.listen_port)
    }
}

/// Settings for the scan job container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerJobConfig {
    pub image: String,
    pub db_address: String,
    pub trace: bool,
}

impl Default for ScannerJobConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_SCANNER_IMAGE.to_string(),
            db_address: DEFAULT_SCANNER_DB_ADDRESS.to_string(),
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

impl Config {
    pub fn scan_config(&self) -> ScanConfig {
        let scope = ScanScope::new(NamespaceScope::from_name(
            self.scan.target_namespace.as_deref(),
        ))
        .ignoring(self.scan.ignored_namespaces.iter().cloned());

        ScanConfig {
            scope,
            policy: DispatchPolicy {
                max_parallelism: self.scan.max_parallelism,
                result_timeout: self.scan.result_timeout,
                delete_job_policy: self.scan.delete_job_policy,
                severity_threshold: self.scan.severity_threshold,
            },
        }
    }
}
