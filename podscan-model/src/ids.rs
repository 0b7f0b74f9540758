use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ModelError, Result};

/// Opaque per-record token handed to the scanner and echoed back with its
/// result. A fresh one is minted for every record of every session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScanId(pub Uuid);

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanId {
    pub fn new() -> Self {
        ScanId(Uuid::new_v4())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw.trim())
            .map(ScanId)
            .map_err(|_| ModelError::InvalidId(raw.to_string()))
    }

    /// Compares against the textual form a scanner reported.
    pub fn matches(&self, raw: &str) -> bool {
        Self::parse(raw).is_ok_and(|other| other == *self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Hex form without hyphens, usable inside DNS-1123 names.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one scan session (Scan() .. Clear()).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
