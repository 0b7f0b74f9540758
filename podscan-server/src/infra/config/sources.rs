use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub scan: FileScanConfig,
    #[serde(default)]
    pub endpoint: FileEndpointConfig,
    #[serde(default)]
    pub scanner: FileScannerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_namespaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallelism: Option<usize>,
    /// Human readable duration, e.g. `10m` or `90s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_threshold: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_job_policy: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileEndpointConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_host: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScannerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub target_namespace: Option<String>,
    pub ignored_namespaces: Option<Vec<String>>,
    pub max_parallelism: Option<String>,
    pub result_timeout: Option<String>,
    pub severity_threshold: Option<String>,
    pub delete_job_policy: Option<String>,
    pub listen_host: Option<String>,
    pub listen_port: Option<u16>,
    pub service_host: Option<String>,
    pub scanner_image: Option<String>,
    pub scanner_db_address: Option<String>,
    pub scanner_trace: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut env_config = Self::default();

        env_config.config_path =
            std::env::var("PODSCAN_CONFIG").ok().map(PathBuf::from);
        env_config.target_namespace = std::env::var("TARGET_NAMESPACE").ok();
        env_config.ignored_namespaces = parse_csv_var("IGNORED_NAMESPACES");
        env_config.max_parallelism = std::env::var("MAX_PARALLELISM").ok();
        env_config.result_timeout = std::env::var("JOB_RESULT_TIMEOUT").ok();
        env_config.severity_threshold = std::env::var("SEVERITY_THRESHOLD").ok();
        env_config.delete_job_policy = std::env::var("DELETE_JOB_POLICY").ok();

        env_config.listen_host = std::env::var("RESULT_LISTEN_HOST").ok();
        env_config.listen_port = std::env::var("RESULT_LISTEN_PORT")
            .ok()
            .and_then(|s| s.parse().ok());
        env_config.service_host = std::env::var("RESULT_SERVICE_HOST").ok();

        env_config.scanner_image = std::env::var("SCANNER_IMAGE").ok();
        env_config.scanner_db_address = std::env::var("SCANNER_DB_ADDRESS").ok();
        env_config.scanner_trace = parse_bool_var("SCANNER_TRACE");

        env_config
    }
}

pub(crate) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| split_csv(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_var(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|raw| parse_bool(&raw))
}
