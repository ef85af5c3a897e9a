use ::prometheus::Registry;
use serde::de::DeserializeOwned;
use serde_dynamo::from_items;
use std::fmt;
use std::sync::Arc;

use super::Instrumentation;
use super::operations::{hash_query_request, query_all, query_request};
use crate::context::Context;
use crate::driver::Driver;
use crate::error::Error;
use crate::key::{Key, Query};
use crate::log::Logger;
use crate::metrics::prometheus::PrometheusMetrics;
use crate::metrics::{MetricsRecorder, Operation};
use crate::validation::is_valid_key;

/// Read-only access through one global secondary index
///
/// Obtained from [`Repository::g_index`](super::Repository::g_index); shares
/// the driver, logger and metrics aggregator of its repository. Key names
/// refer to the index's hash and range attributes.
#[derive(Clone)]
pub struct GlobalIndex {
    name: String,
    driver: Arc<dyn Driver>,
    instrumentation: Instrumentation,
}

impl fmt::Debug for GlobalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalIndex")
            .field("name", &self.name)
            .field("instrumentation", &self.instrumentation)
            .finish_non_exhaustive()
    }
}

impl GlobalIndex {
    pub(crate) fn new(name: String, driver: Arc<dyn Driver>, instrumentation: Instrumentation) -> Self {
        Self {
            name,
            driver,
            instrumentation,
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the logger of this handle only
    pub fn with_log(mut self, log: Arc<dyn Logger>) -> Self {
        self.instrumentation.log = log;
        self
    }

    /// Register a recorder on the aggregator shared with the repository
    pub fn with_metrics(&self, recorder: Arc<dyn MetricsRecorder>) -> &Self {
        self.instrumentation.metrics.add(recorder);
        self
    }

    /// Register a [`PrometheusMetrics`] recorder on `registry`
    pub fn with_prometheus_metrics(&self, registry: &Registry) -> Result<&Self, Error> {
        let recorder = PrometheusMetrics::new(registry)?;
        Ok(self.with_metrics(Arc::new(recorder)))
    }

    fn index_name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    /// First item matching the hash key and, when set, range key equality
    ///
    /// Returns `Ok(None)` when nothing matched.
    pub async fn get_item<T>(&self, ctx: &Context, key: &Key) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = async {
            is_valid_key(key)?;
            let mut request = query_request(&Query::from(key.clone()), self.index_name())?;
            request.limit = Some(1);
            let page = ctx.run(self.driver.query(request)).await?;
            Ok::<_, Error>(page.items.into_iter().next())
        }
        .await;

        self.instrumentation
            .finish_one(ctx, key.table_name(), timer, result)
    }

    /// Every item sharing the hash key; a range key on `key` is ignored
    pub async fn get_items<T>(&self, ctx: &Context, key: &Key) -> Result<Option<Vec<T>>, Error>
    where
        T: DeserializeOwned,
    {
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = async {
            is_valid_key(key)?;
            let request = hash_query_request(key, self.index_name());
            query_all(self.driver.as_ref(), ctx, request, None).await
        }
        .await;

        self.instrumentation
            .finish_many(ctx, key.table_name(), timer, result)
    }

    /// Every item matching the hash key and, when set, range key equality
    pub async fn get_items_with_range<T>(&self, ctx: &Context, key: &Key) -> Result<Option<Vec<T>>, Error>
    where
        T: DeserializeOwned,
    {
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = async {
            is_valid_key(key)?;
            let request = query_request(&Query::from(key.clone()), self.index_name())?;
            query_all(self.driver.as_ref(), ctx, request, None).await
        }
        .await;

        self.instrumentation
            .finish_many(ctx, key.table_name(), timer, result)
    }

    /// Query the index with the range operator, limit and order of `query`
    pub async fn query<T>(&self, ctx: &Context, query: &Query) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
    {
        let key = query.key();
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = async {
            is_valid_key(key)?;
            let request = query_request(query, self.index_name())?;
            let items = query_all(self.driver.as_ref(), ctx, request, query.effective_limit()).await?;
            Ok::<Vec<T>, Error>(from_items(items)?)
        }
        .await;

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }
}
