use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::session::RecordOutcome;

/// What happens to a scan job once its record's wait is over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteJobPolicy {
    All,
    #[default]
    Successful,
    Never,
}

impl DeleteJobPolicy {
    pub fn should_delete(&self, outcome: RecordOutcome) -> bool {
        match self {
            DeleteJobPolicy::All => true,
            DeleteJobPolicy::Successful => outcome.completed && outcome.success,
            DeleteJobPolicy::Never => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteJobPolicy::All => "All",
            DeleteJobPolicy::Successful => "Successful",
            DeleteJobPolicy::Never => "Never",
        }
    }
}

impl fmt::Display for DeleteJobPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeleteJobPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(DeleteJobPolicy::All),
            "successful" => Ok(DeleteJobPolicy::Successful),
            "never" => Ok(DeleteJobPolicy::Never),
            other => Err(format!("unknown delete job policy: {other}")),
        }
    }
}
