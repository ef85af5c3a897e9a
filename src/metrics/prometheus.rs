use ::prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::{MetricsRecorder, Operation, STATUS_FAILURE, STATUS_SUCCESS};
use crate::context::{Context, SOURCE_LABEL};
use crate::error::Error;
use crate::key::Key;

const DEFAULT_NAMESPACE: &str = "dynamo";
const STATUS_LABEL: &str = "status";
const TABLE_LABEL: &str = "table";

/// Histogram buckets in milliseconds
const DURATION_BUCKETS: [f64; 14] = [
    4.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 120.0,
];

/// Counter and duration histogram per operation
///
/// For each [`Operation`] this registers `{namespace}_{op}_total` and
/// `{namespace}_{op}_duration_ms`, labelled by `status`, `table`, `source`
/// and any extra context labels declared at construction. A declared label
/// missing from the context is recorded as an empty string; context labels
/// that were not declared are ignored.
pub struct PrometheusMetrics {
    label_names: Vec<String>,
    counters: HashMap<Operation, CounterVec>,
    durations: HashMap<Operation, HistogramVec>,
}

impl fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("label_names", &self.label_names)
            .finish()
    }
}

impl PrometheusMetrics {
    /// Register the metrics on `registry` under the `dynamo` namespace
    pub fn new(registry: &Registry) -> Result<Self, Error> {
        Self::with_labels(registry, DEFAULT_NAMESPACE, &[])
    }

    /// Register the metrics with a custom namespace and extra context labels
    pub fn with_labels(
        registry: &Registry,
        namespace: &str,
        context_labels: &[&str],
    ) -> Result<Self, Error> {
        let mut label_names = vec![
            STATUS_LABEL.to_string(),
            TABLE_LABEL.to_string(),
            SOURCE_LABEL.to_string(),
        ];
        for label in context_labels {
            if !label_names.iter().any(|name| name == label) {
                label_names.push(label.to_string());
            }
        }
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();

        let mut counters = HashMap::new();
        let mut durations = HashMap::new();

        for operation in Operation::ALL {
            let counter = CounterVec::new(
                Opts::new(
                    format!("{}_total", operation),
                    format!("counter for {} operations", operation),
                )
                .namespace(namespace),
                &names,
            )?;
            registry.register(Box::new(counter.clone()))?;

            let histogram = HistogramVec::new(
                HistogramOpts::new(
                    format!("{}_duration_ms", operation),
                    format!("duration of {} operations in milliseconds", operation),
                )
                .namespace(namespace)
                .buckets(DURATION_BUCKETS.to_vec()),
                &names,
            )?;
            registry.register(Box::new(histogram.clone()))?;

            let _ = counters.insert(operation, counter);
            let _ = durations.insert(operation, histogram);
        }

        Ok(Self {
            label_names,
            counters,
            durations,
        })
    }

    fn label_values(&self, ctx: &Context, key: &Key, success: bool) -> Vec<String> {
        let context_labels = ctx.labels();
        let status = if success { STATUS_SUCCESS } else { STATUS_FAILURE };

        self.label_names
            .iter()
            .map(|name| match name.as_str() {
                STATUS_LABEL => status.to_string(),
                TABLE_LABEL => key.table_name().to_lowercase(),
                other => context_labels.get(other).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

impl MetricsRecorder for PrometheusMetrics {
    fn record(&self, ctx: &Context, operation: Operation, key: &Key, duration: Duration, success: bool) {
        let values = self.label_values(ctx, key, success);
        let values: Vec<&str> = values.iter().map(String::as_str).collect();

        if let Some(counter) = self.counters.get(&operation) {
            counter.with_label_values(&values).inc();
        }
        if let Some(histogram) = self.durations.get(&operation) {
            histogram
                .with_label_values(&values)
                .observe(duration.as_secs_f64() * 1000.0);
        }
    }
}
