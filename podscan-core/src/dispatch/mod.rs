//! Bounded execution of one scan per image record.

pub mod admission;
pub mod dispatcher;
pub mod retention;

pub use admission::{AdmissionPermit, AdmissionPool};
pub use dispatcher::{
    BatchDispatcher, BatchSummary, DEFAULT_MAX_PARALLELISM, DEFAULT_RESULT_TIMEOUT,
    DispatchPolicy, DispatchTicket, ImageDispatchOutcome,
};
pub use retention::DeleteJobPolicy;
