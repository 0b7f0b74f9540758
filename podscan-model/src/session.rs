use serde::{Deserialize, Serialize};

/// Lifecycle of the single scan session held by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Idle,
    Initializing,
    InitializationFailed,
    Scanning,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Initializing => "Initializing",
            SessionStatus::InitializationFailed => "InitializationFailed",
            SessionStatus::Scanning => "Scanning",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// `Idle` is reachable from anywhere (Clear). A new session may start
    /// from any state, which discards the previous one.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (*self, next) {
            (_, Idle) => true,
            (_, Initializing) => true,
            (Initializing, InitializationFailed) => true,
            (Initializing, Scanning) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for the current session.
///
/// `images_completed <= images_started <= images_to_scan` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub images_to_scan: u32,
    pub images_started_to_scan: u32,
    pub images_completed_to_scan: u32,
}

impl ScanProgress {
    pub fn new(images_to_scan: u32) -> Self {
        Self {
            images_to_scan,
            ..Self::default()
        }
    }

    /// True once every image has been admitted and waited on.
    ///
    /// An empty session (nothing to scan) is trivially finished.
    pub fn is_finished(&self) -> bool {
        self.images_completed_to_scan == self.images_to_scan
    }

    pub fn in_flight(&self) -> u32 {
        self.images_started_to_scan
            .saturating_sub(self.images_completed_to_scan)
    }
}
