use thiserror::Error;

use super::models::Config;

/// Parallelism above this is allowed but rarely what anyone wants.
const PARALLELISM_WARN_THRESHOLD: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("max parallelism must be at least 1")]
    ZeroParallelism,
    #[error("result timeout must be greater than zero")]
    ZeroResultTimeout,
    #[error("scanner image must not be empty")]
    EmptyScannerImage,
    #[error("result service host must not be empty")]
    EmptyServiceHost,
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.scan.max_parallelism == 0 {
        return Err(ConfigGuardRailError::ZeroParallelism);
    }
    if config.scan.result_timeout.is_zero() {
        return Err(ConfigGuardRailError::ZeroResultTimeout);
    }
    if config.scanner.image.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptyScannerImage);
    }
    if config.endpoint.service_host.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptyServiceHost);
    }

    if config.scan.max_parallelism > PARALLELISM_WARN_THRESHOLD {
        warnings.push_with_hint(
            format!(
                "max parallelism {} launches many scan jobs at once",
                config.scan.max_parallelism
            ),
            "Lower MAX_PARALLELISM if the scanner database struggles",
        );
    }

    if let Some(target) = config.scan.target_namespace.as_deref()
        && config.scan.ignored_namespaces.iter().any(|ns| ns == target)
    {
        warnings.push_with_hint(
            format!("target namespace '{target}' is also ignored; nothing will be scanned"),
            "Remove it from IGNORED_NAMESPACES",
        );
    }

    Ok(warnings)
}
