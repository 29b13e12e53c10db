//! Connection lifecycle guard.
//!
//! [`with_handle`] owns a handle for the duration of a unit of work and
//! disposes it exactly once afterwards, whether the work returned `Ok`,
//! returned `Err`, or panicked.

use crate::db::DbHandle;
use crate::error::ExportResult;
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

/// A resource that must be released asynchronously.
pub trait Dispose {
    /// Release the resource. Failures are logged, not returned.
    fn dispose(self) -> impl Future<Output = ()>;
}

impl Dispose for DbHandle {
    async fn dispose(self) {
        let db_type = self.db_type();
        if let Err(e) = self.close().await {
            warn!(db_type = %db_type, error = %e, "Connection did not close cleanly");
        }
        info!("Connection disposed");
    }
}

/// Run `body` with the handle, then dispose it.
///
/// Errors from `body` are returned after disposal. A panic in `body` is
/// caught, the handle disposed, and the panic resumed.
pub async fn with_handle<H, T, F>(mut handle: H, body: F) -> ExportResult<T>
where
    H: Dispose,
    F: AsyncFnOnce(&mut H) -> ExportResult<T>,
{
    let outcome = AssertUnwindSafe(body(&mut handle)).catch_unwind().await;
    handle.dispose().await;
    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Unconfigured,
    Connected,
    Querying,
    Writing,
    Closed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Connected => "connected",
            Self::Querying => "querying",
            Self::Writing => "writing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records phase transitions. After a failure, `current()` is the phase that failed.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    current: RunPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    pub fn advance(&mut self, next: RunPhase) {
        debug!(from = %self.current, to = %next, "Run phase changed");
        self.current = next;
    }
}
