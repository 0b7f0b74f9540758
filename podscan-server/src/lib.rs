//! # podscan server
//!
//! Hosts the scan-result endpoint, wires the session controller to the
//! Kubernetes API, and drives one scan session from the command line.
//!
//! - [`orchestrator`]: Start/Stop of the result endpoint plus the session
//!   operations
//! - [`routes`] and [`handlers`]: the `/result/*` callback surface
//! - [`infra::config`]: layered configuration (TOML, environment, flags)
//! - [`infra::kube`]: cluster reader and job launcher backed by `kube`

pub mod handlers;
pub mod infra;
pub mod orchestrator;
pub mod routes;

pub use infra::app_state::AppState;
pub use orchestrator::Orchestrator;
