//! Repository over a DynamoDB driver.
//!
//! A [`Repository`] validates keys, renders driver requests, and instruments
//! every call: one metrics record per touched key and a log line for
//! translated not-found and condition-failed outcomes and for errors.

use ::prometheus::Registry;
use serde::de::DeserializeOwned;
use serde_dynamo::{from_item, from_items};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::driver::{Driver, Item};
use crate::error::Error;
use crate::key::Key;
use crate::log::{Logger, NopLog, TABLE_NAME_FIELD};
use crate::metrics::prometheus::PrometheusMetrics;
use crate::metrics::{Metrics, MetricsRecorder, Operation, Timer};

mod batch;
/// Global secondary index access
pub mod gsi;
mod operations;
/// Table scans
pub mod scan;

pub use gsi::GlobalIndex;
pub use scan::ScanIterator;

/// Logger and metrics shared by a repository and its index handles
#[derive(Clone)]
pub(crate) struct Instrumentation {
    pub(crate) log: Arc<dyn Logger>,
    pub(crate) metrics: Arc<Metrics>,
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self {
            log: Arc::new(NopLog),
            metrics: Arc::new(Metrics::new()),
        }
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("log", &self.log)
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl Instrumentation {
    pub(crate) fn start(&self, ctx: &Context, operation: Operation, key: &Key) -> Timer {
        self.metrics.timer(ctx, operation, key)
    }

    pub(crate) fn start_many(&self, ctx: &Context, operation: Operation, keys: Vec<Key>) -> Timer {
        self.metrics.timer_multiple(ctx, operation, keys)
    }

    fn table_log(&self, ctx: &Context, table_name: &str) -> Arc<dyn Logger> {
        Arc::clone(&self.log)
            .with_context(ctx)
            .with_field(TABLE_NAME_FIELD, Value::from(table_name))
    }

    pub(crate) fn not_found(&self, ctx: &Context, table_name: &str) {
        self.table_log(ctx, table_name)
            .info(&Error::NoItemFound.to_string());
    }

    pub(crate) fn condition_failed(&self, ctx: &Context, table_name: &str) {
        self.table_log(ctx, table_name)
            .info("ConditionalCheckFailedException");
    }

    pub(crate) fn failed(&self, ctx: &Context, table_name: &str, error: &Error) {
        if error.is_validation_error() || error.is_not_found() {
            return;
        }
        self.table_log(ctx, table_name).error(&error.to_string());
    }

    /// Finish a timed call: record the outcome and log errors
    pub(crate) fn finish<T>(
        &self,
        ctx: &Context,
        table_name: &str,
        mut timer: Timer,
        result: Result<T, Error>,
    ) -> Result<T, Error> {
        timer.observe(&result);
        if let Err(e) = &result {
            self.failed(ctx, table_name, e);
        }
        result
    }

    /// Finish a conditional write, demoting a rejected condition to `Ok(None)`
    pub(crate) fn finish_conditional<T>(
        &self,
        ctx: &Context,
        table_name: &str,
        mut timer: Timer,
        result: Result<T, Error>,
    ) -> Result<Option<T>, Error> {
        timer.observe(&result);
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_conditional_check_failed() => {
                self.condition_failed(ctx, table_name);
                Ok(None)
            }
            Err(e) => {
                self.failed(ctx, table_name, &e);
                Err(e)
            }
        }
    }

    /// Finish a multi-item read, demoting not-found and empty results to `Ok(None)`
    pub(crate) fn finish_many<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        table_name: &str,
        timer: Timer,
        result: Result<Vec<Item>, Error>,
    ) -> Result<Option<Vec<T>>, Error> {
        let result = result.and_then(|items| {
            if items.is_empty() {
                return Err(Error::NoItemFound);
            }
            Ok(from_items::<_, T>(items)?)
        });

        match self.finish(ctx, table_name, timer, result) {
            Ok(items) => Ok(Some(items)),
            Err(Error::NoItemFound) => {
                self.not_found(ctx, table_name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Finish a single-item read, demoting not-found to `Ok(None)`
    pub(crate) fn finish_one<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        table_name: &str,
        timer: Timer,
        result: Result<Option<Item>, Error>,
    ) -> Result<Option<T>, Error> {
        let result = result.and_then(|item| match item {
            Some(item) => Ok(from_item::<_, T>(item)?),
            None => Err(Error::NoItemFound),
        });

        match self.finish(ctx, table_name, timer, result) {
            Ok(item) => Ok(Some(item)),
            Err(Error::NoItemFound) => {
                self.not_found(ctx, table_name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Access layer over one DynamoDB connection
///
/// Cloning is cheap; clones share the driver, logger and metrics.
///
/// ```no_run
/// use dynamo_repository::{Context, DynamoDbDriver, Key, Repository};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     #[serde(rename = "UUID")]
///     uuid: String,
/// }
///
/// # async fn example() -> Result<(), dynamo_repository::Error> {
/// let repository = Repository::new(DynamoDbDriver::shared().await);
/// let key = Key::new()
///     .with_table_name("UserTable")
///     .with_hash_key_name("UUID")
///     .with_hash_key("uuid");
///
/// match repository.get_item::<User>(&Context::background(), &key).await? {
///     Some(user) => println!("found {}", user.uuid),
///     None => println!("no user"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Repository {
    driver: Arc<dyn Driver>,
    instrumentation: Instrumentation,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("instrumentation", &self.instrumentation)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Repository over `driver` with no logging and no metrics recorders
    pub fn new<D: Driver + 'static>(driver: D) -> Self {
        Self::with_driver(Arc::new(driver))
    }

    /// Repository over a shared driver
    pub fn with_driver(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            instrumentation: Instrumentation::default(),
        }
    }

    /// Replace the logger
    ///
    /// Index handles created afterwards use the new logger.
    pub fn with_log(mut self, log: Arc<dyn Logger>) -> Self {
        self.instrumentation.log = log;
        self
    }

    /// Register a metrics recorder
    ///
    /// Recorders are shared with every clone and index handle of this
    /// repository, including ones created earlier.
    pub fn with_metrics(&self, recorder: Arc<dyn MetricsRecorder>) -> &Self {
        self.instrumentation.metrics.add(recorder);
        self
    }

    /// Register a [`PrometheusMetrics`] recorder on `registry`
    pub fn with_prometheus_metrics(&self, registry: &Registry) -> Result<&Self, Error> {
        let recorder = PrometheusMetrics::new(registry)?;
        Ok(self.with_metrics(Arc::new(recorder)))
    }

    /// Metrics aggregator of this repository
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.instrumentation.metrics
    }

    /// Read-only handle on the global secondary index `name`
    pub fn g_index(&self, name: impl Into<String>) -> GlobalIndex {
        GlobalIndex::new(
            name.into(),
            Arc::clone(&self.driver),
            self.instrumentation.clone(),
        )
    }
}
