//! # podscan core
//!
//! Session domain for the podscan image scan orchestrator.
//!
//! A scan session resolves every container running in a cluster scope,
//! folds the containers into one [`ScanRecord`](session::ScanRecord) per
//! distinct image, and drives one out-of-process scan per record through a
//! bounded admission pool. Scanners report back asynchronously; reports are
//! correlated to their record by scan id and expanded into one result row per
//! owning container.
//!
//! ## Architecture
//!
//! - [`resolver`]: pod listing, ignore rules, content hash and pull secret
//!   resolution
//! - [`session`]: pod contexts, scan records, the dedup registry and the
//!   shared session state
//! - [`dispatch`]: admission pool, retention policy and the batch dispatcher
//! - [`collector`]: decoding and applying scanner reports
//! - [`controller`]: the public Scan/Progress/Status/Results/Clear surface
//! - [`ports`]: traits for the cluster and job-launch collaborators

pub mod collector;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod ports;
pub mod resolver;
pub mod session;

pub use controller::{ScanConfig, SessionController, SessionHandle};
pub use dispatch::{BatchSummary, DeleteJobPolicy, DispatchPolicy};
pub use error::{Result, ScanError};
pub use ports::{
    CallbackAddress, ClusterReader, LaunchHandle, LaunchRequest,
    NamespaceScope, PodSnapshot, PullCredential, ScanLauncher,
};
pub use resolver::{ScanScope, TargetResolver};

pub use podscan_model as model;
