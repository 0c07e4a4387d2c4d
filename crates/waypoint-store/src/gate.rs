//! # Connection Gate
//!
//! Bounds concurrent access to a backend that has no pool of its own.
//! Callers beyond the bound queue in FIFO order; a caller still queued when
//! the wait timeout elapses gets [`StoreError::ResourceExhausted`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct ConnectionGate {
    permits: Arc<Semaphore>,
    max: usize,
    wait_timeout: Duration,
}

/// A borrowed connection slot. Released on drop.
#[derive(Debug)]
pub struct GateLease {
    _permit: OwnedSemaphorePermit,
}

impl ConnectionGate {
    /// A gate admitting `max` concurrent holders (at least one).
    pub fn new(max: usize, wait_timeout: Duration) -> Self {
        let max = max.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
            wait_timeout,
        }
    }

    pub async fn acquire(&self) -> Result<GateLease, StoreError> {
        let waiting = self.permits.clone().acquire_owned();
        match tokio::time::timeout(self.wait_timeout, waiting).await {
            Ok(Ok(permit)) => Ok(GateLease { _permit: permit }),
            Ok(Err(_)) => Err(StoreError::Unavailable(
                "connection pool closed".to_string(),
            )),
            Err(_) => {
                tracing::warn!(
                    max = self.max,
                    wait_ms = self.wait_timeout.as_millis() as u64,
                    "connection wait timed out"
                );
                Err(StoreError::ResourceExhausted {
                    retry_after: self.wait_timeout,
                })
            }
        }
    }

    /// Refuse new acquisitions. Leases already handed out stay valid.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
}
