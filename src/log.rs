//! Structured logging used by the repository.
//!
//! The repository logs through the [`Logger`] trait. The default [`NopLog`]
//! discards everything; [`TracingLogger`] forwards to `tracing`.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;

/// Field carrying the table name on repository log lines
pub const TABLE_NAME_FIELD: &str = "TableName";

/// Logger capability consumed by the repository
///
/// The `with_*` methods return a logger carrying the extra fields. They may
/// return the same logger.
pub trait Logger: Send + Sync + fmt::Debug {
    /// Attach context-derived fields
    fn with_context(self: Arc<Self>, ctx: &Context) -> Arc<dyn Logger>;
    /// Attach one field
    fn with_field(self: Arc<Self>, key: &str, value: Value) -> Arc<dyn Logger>;
    /// Attach several fields
    fn with_fields(self: Arc<Self>, fields: HashMap<String, Value>) -> Arc<dyn Logger>;
    /// Log at info level
    fn info(&self, message: &str);
    /// Log at warn level
    fn warn(&self, message: &str);
    /// Log at error level
    fn error(&self, message: &str);
}

/// Logger ignoring all input
#[derive(Debug, Default, Clone, Copy)]
pub struct NopLog;

impl Logger for NopLog {
    fn with_context(self: Arc<Self>, _ctx: &Context) -> Arc<dyn Logger> {
        self
    }

    fn with_field(self: Arc<Self>, _key: &str, _value: Value) -> Arc<dyn Logger> {
        self
    }

    fn with_fields(self: Arc<Self>, _fields: HashMap<String, Value>) -> Arc<dyn Logger> {
        self
    }

    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Logger emitting `tracing` events under the `dynamo_repository` target
///
/// Accumulated fields are rendered as one JSON object in the `fields` field.
#[derive(Debug, Default, Clone)]
pub struct TracingLogger {
    fields: Map<String, Value>,
}

impl TracingLogger {
    /// Logger without fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields attached so far
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn extended<I>(&self, fields: I) -> Arc<dyn Logger>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut logger = self.clone();
        logger.fields.extend(fields);
        Arc::new(logger)
    }

    fn rendered(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

impl Logger for TracingLogger {
    fn with_context(self: Arc<Self>, ctx: &Context) -> Arc<dyn Logger> {
        self.extended(
            ctx.labels()
                .into_iter()
                .map(|(key, value)| (key, Value::String(value))),
        )
    }

    fn with_field(self: Arc<Self>, key: &str, value: Value) -> Arc<dyn Logger> {
        self.extended([(key.to_string(), value)])
    }

    fn with_fields(self: Arc<Self>, fields: HashMap<String, Value>) -> Arc<dyn Logger> {
        self.extended(fields)
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "dynamo_repository", fields = %self.rendered(), "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "dynamo_repository", fields = %self.rendered(), "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "dynamo_repository", fields = %self.rendered(), "{}", message);
    }
}
