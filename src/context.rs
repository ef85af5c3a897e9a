//! Request-scoped execution context.
//!
//! A [`Context`] carries cancellation, an optional deadline and a shared map
//! of metric labels. Clones share the same labels and cancellation token, so
//! a label added anywhere along a call chain is visible to every metrics
//! record made with that context.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Label naming the calling subsystem
pub const SOURCE_LABEL: &str = "source";

/// Execution context passed to every repository call
#[derive(Debug, Clone, Default)]
pub struct Context {
    labels: Arc<RwLock<HashMap<String, String>>>,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Context with no labels, no deadline and no cancellation
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context that is cancelled with `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Derive a context whose operations fail after `timeout`
    ///
    /// An earlier deadline already on the context is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Cancellation token of this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Deadline of this context, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Set a metric label on the shared label map
    pub fn add_label(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut labels = match self.labels.write() {
            Ok(labels) => labels,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = labels.insert(key.into(), value.into());
    }

    /// Builder form of [`Context::add_label`]
    pub fn with_label(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_label(key, value);
        self
    }

    /// Tag the calling subsystem with the `source` label
    pub fn with_source_label(self, value: impl Into<String>) -> Self {
        self.with_label(SOURCE_LABEL, value)
    }

    /// Snapshot of the labels
    pub fn labels(&self) -> HashMap<String, String> {
        match self.labels.read() {
            Ok(labels) => labels.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Run `future` unless the context is cancelled or its deadline passes first
    pub(crate) async fn run<F, T>(&self, future: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        if self.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(Error::DeadlineExceeded);
        }

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, future)
                    .await
                    .map_err(|_| Error::DeadlineExceeded)?,
                None => future.await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Error::Cancelled),
            result = bounded => result,
        }
    }
}
