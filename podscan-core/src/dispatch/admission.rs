//! Admission control for concurrent external scans.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Result, ScanError};

/// A slot in the admission pool. The slot is released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    pub acquired_at: DateTime<Utc>,
    _permit: OwnedSemaphorePermit,
}

/// Caps how many scans may be in flight at once.
#[derive(Clone)]
pub struct AdmissionPool {
    limit: usize,
    permits: Arc<Semaphore>,
}

impl fmt::Debug for AdmissionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (in_use, limit) = self.utilization();
        f.debug_struct("AdmissionPool")
            .field("limit", &limit)
            .field("in_use", &in_use)
            .finish()
    }
}

impl AdmissionPool {
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Take a slot, waiting while the pool is saturated.
    pub async fn acquire(&self) -> Result<AdmissionPermit> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ScanError::Internal("admission pool closed".into()))?;
        Ok(AdmissionPermit {
            acquired_at: Utc::now(),
            _permit: permit,
        })
    }

    /// `(in_use, limit)`.
    pub fn utilization(&self) -> (usize, usize) {
        let available = self.permits.available_permits();
        (self.limit.saturating_sub(available), self.limit)
    }
}
