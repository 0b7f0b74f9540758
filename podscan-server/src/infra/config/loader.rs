use std::{
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;

use podscan_core::{DeleteJobPolicy, model::Severity};

use super::{
    models::{
        Config, ConfigMetadata, EndpointConfig, ScanSettings, ScannerJobConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["podscan.toml", "config/podscan.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Command line values layered over a loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// A blank name selects every namespace.
    pub target_namespace: Option<String>,
    pub max_parallelism: Option<usize>,
    pub result_timeout: Option<Duration>,
    pub listen_port: Option<u16>,
}

impl ConfigLoad {
    /// Apply `overrides` and run the guard rails again on the result.
    pub fn with_overrides(
        self,
        overrides: ConfigOverrides,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let ConfigLoad {
            mut config,
            mut warnings,
        } = self;

        if let Some(namespace) = overrides.target_namespace {
            let namespace = namespace.trim();
            config.scan.target_namespace =
                (!namespace.is_empty()).then(|| namespace.to_string());
        }
        if let Some(max_parallelism) = overrides.max_parallelism {
            config.scan.max_parallelism = max_parallelism;
        }
        if let Some(timeout) = overrides.result_timeout {
            config.scan.result_timeout = timeout;
        }
        if let Some(port) = overrides.listen_port {
            config.endpoint.listen_port = port;
        }

        for warning in validation::apply_guard_rails(&config)?.items {
            if !warnings.items.iter().any(|seen| seen.message == warning.message) {
                warnings.items.push(warning);
            }
        }
        Ok(ConfigLoad { config, warnings })
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, read the process environment, then layer
    /// defaults ← file ← environment.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same layering as [`ConfigLoader::load`] with an explicit environment.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "No podscan.toml detected; using environment variables and defaults",
                "Pass --config to point at a configuration file",
            );
        }

        let config = compose_config(file_config.unwrap_or_default(), env, config_path)?;
        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = if let Some(path) = &self.options.config_path {
            (path.clone(), true)
        } else if let Some(path) = &env_config.config_path {
            (path.clone(), true)
        } else {
            match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(Path::new)
                .find(|candidate| candidate.exists())
            {
                Some(found) => (found.to_path_buf(), false),
                None => return Ok((None, None)),
            }
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<Config, ConfigLoadError> {
    let FileConfig {
        scan: file_scan,
        endpoint: file_endpoint,
        scanner: file_scanner,
    } = file;
    let defaults = ScanSettings::default();

    let max_parallelism = match env.max_parallelism {
        Some(raw) => raw.trim().parse::<usize>().map_err(|err| {
            ConfigLoadError::invalid("max_parallelism", &raw, err.to_string())
        })?,
        None => file_scan.max_parallelism.unwrap_or(defaults.max_parallelism),
    };

    let result_timeout = match env.result_timeout.or(file_scan.result_timeout) {
        Some(raw) => parse_duration("result_timeout", &raw)?,
        None => defaults.result_timeout,
    };

    let severity_threshold =
        match env.severity_threshold.or(file_scan.severity_threshold) {
            Some(raw) => Severity::from_str(&raw).map_err(|err| {
                ConfigLoadError::invalid("severity_threshold", &raw, err.to_string())
            })?,
            None => defaults.severity_threshold,
        };

    let delete_job_policy =
        match env.delete_job_policy.or(file_scan.delete_job_policy) {
            Some(raw) => DeleteJobPolicy::from_str(&raw).map_err(|reason| {
                ConfigLoadError::invalid("delete_job_policy", &raw, reason)
            })?,
            None => defaults.delete_job_policy,
        };

    let scan = ScanSettings {
        target_namespace: env
            .target_namespace
            .or(file_scan.target_namespace)
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty()),
        ignored_namespaces: env
            .ignored_namespaces
            .or(file_scan.ignored_namespaces)
            .unwrap_or_default(),
        max_parallelism,
        result_timeout,
        severity_threshold,
        delete_job_policy,
    };

    let endpoint_defaults = EndpointConfig::default();
    let listen_host = match env.listen_host.or(file_endpoint.listen_host) {
        Some(raw) => raw.trim().parse::<IpAddr>().map_err(|err| {
            ConfigLoadError::invalid("listen_host", &raw, err.to_string())
        })?,
        None => endpoint_defaults.listen_host,
    };
    let endpoint = EndpointConfig {
        listen_host,
        listen_port: env
            .listen_port
            .or(file_endpoint.listen_port)
            .unwrap_or(endpoint_defaults.listen_port),
        service_host: env
            .service_host
            .or(file_endpoint.service_host)
            .unwrap_or(endpoint_defaults.service_host),
    };

    let scanner_defaults = ScannerJobConfig::default();
    let scanner = ScannerJobConfig {
        image: env
            .scanner_image
            .or(file_scanner.image)
            .unwrap_or(scanner_defaults.image),
        db_address: env
            .scanner_db_address
            .or(file_scanner.db_address)
            .unwrap_or(scanner_defaults.db_address),
        trace: env
            .scanner_trace
            .or(file_scanner.trace)
            .unwrap_or(scanner_defaults.trace),
    };

    Ok(Config {
        scan,
        endpoint,
        scanner,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    })
}

fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim())
        .map_err(|err| ConfigLoadError::invalid(field, raw, err.to_string()))
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoadError {
    fn invalid(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigLoadError::InvalidValue {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
