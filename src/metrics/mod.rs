//! Per-operation metrics.
//!
//! Repository calls report to a [`Metrics`] aggregator, which fans each
//! record out to every registered [`MetricsRecorder`]. With no recorders
//! registered, recording is a no-op.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::context::Context;
use crate::error::Error;
use crate::key::Key;

/// Prometheus recorder
pub mod prometheus;

/// Label value of a successful operation
pub const STATUS_SUCCESS: &str = "success";
/// Label value of a failed operation
pub const STATUS_FAILURE: &str = "failure";

/// Kind of repository operation being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Full-item writes
    Commit,
    /// Attribute updates and conditional writes
    Update,
    /// Gets, queries and scans
    Read,
    /// Deletes
    Delete,
}

impl Operation {
    /// Every operation kind
    pub const ALL: [Operation; 4] = [
        Operation::Commit,
        Operation::Update,
        Operation::Read,
        Operation::Delete,
    ];

    /// Metric name of the operation
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Commit => "commit",
            Operation::Update => "update",
            Operation::Read => "read",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metrics sink
///
/// Labels set on `ctx` are available through [`Context::labels`].
pub trait MetricsRecorder: Send + Sync {
    /// Record one finished operation on `key`
    fn record(&self, ctx: &Context, operation: Operation, key: &Key, duration: Duration, success: bool);
}

/// Fan-out over registered recorders
#[derive(Default)]
pub struct Metrics {
    recorders: Mutex<Vec<Arc<dyn MetricsRecorder>>>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("recorders", &self.snapshot().len())
            .finish()
    }
}

impl Metrics {
    /// Aggregator without recorders
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recorder
    pub fn add(&self, recorder: Arc<dyn MetricsRecorder>) {
        let mut recorders = match self.recorders.lock() {
            Ok(recorders) => recorders,
            Err(poisoned) => poisoned.into_inner(),
        };
        recorders.push(recorder);
    }

    fn snapshot(&self) -> Vec<Arc<dyn MetricsRecorder>> {
        match self.recorders.lock() {
            Ok(recorders) => recorders.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Record one operation on every recorder
    ///
    /// Recorders are called on a snapshot, outside the registration lock.
    pub fn record(&self, ctx: &Context, operation: Operation, key: &Key, duration: Duration, success: bool) {
        for recorder in self.snapshot() {
            recorder.record(ctx, operation, key, duration, success);
        }
    }

    /// Record the same outcome once per key
    pub fn record_multiple(
        &self,
        ctx: &Context,
        operation: Operation,
        keys: &[Key],
        duration: Duration,
        success: bool,
    ) {
        let recorders = self.snapshot();
        for key in keys {
            for recorder in &recorders {
                recorder.record(ctx, operation, key, duration, success);
            }
        }
    }

    /// Start timing an operation on one key
    pub(crate) fn timer(self: &Arc<Self>, ctx: &Context, operation: Operation, key: &Key) -> Timer {
        self.timer_multiple(ctx, operation, vec![key.clone()])
    }

    /// Start timing an operation touching several keys
    pub(crate) fn timer_multiple(self: &Arc<Self>, ctx: &Context, operation: Operation, keys: Vec<Key>) -> Timer {
        Timer {
            metrics: Arc::clone(self),
            ctx: ctx.clone(),
            operation,
            keys,
            start: Instant::now(),
            success: false,
        }
    }
}

/// Records its operation when dropped
///
/// The outcome defaults to failure until [`Timer::observe`] sees a result, so
/// early returns and dropped futures still produce exactly one record per key.
#[derive(Debug)]
pub(crate) struct Timer {
    metrics: Arc<Metrics>,
    ctx: Context,
    operation: Operation,
    keys: Vec<Key>,
    start: Instant,
    success: bool,
}

impl Timer {
    /// Take the outcome from `result`; a not-found error still counts as success
    pub(crate) fn observe<T>(&mut self, result: &Result<T, Error>) {
        self.success = match result {
            Ok(_) => true,
            Err(e) => e.is_not_found(),
        };
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.metrics.record_multiple(
            &self.ctx,
            self.operation,
            &self.keys,
            self.start.elapsed(),
            self.success,
        );
    }
}
