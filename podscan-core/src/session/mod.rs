//! Session data: pod contexts, per-image scan records, the dedup registry,
//! and the state object the controller keeps behind its lock.

pub mod completion;
pub mod record;
pub mod registry;
pub mod state;

pub use completion::{CompletionNotifier, CompletionWaiter, WaitOutcome, completion_channel};
pub use record::{PodContext, RecordOutcome, ScanRecord};
pub use registry::ImageRegistry;
pub use state::{SessionState, SharedState};
