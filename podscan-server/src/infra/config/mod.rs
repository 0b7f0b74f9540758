//! Layered configuration: defaults, then `podscan.toml`, then the
//! environment (including `.env`). Command line flags are applied on top by
//! the binary.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions, ConfigOverrides,
};
pub use models::{
    Config, ConfigMetadata, EndpointConfig, ScanSettings, ScannerJobConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
