//! Test helpers and fixtures for repository tests
//!
//! Provides an in-memory [`Driver`] that records every request and replays
//! queued responses, plus recording metrics and log sinks.
#![allow(dead_code)]

pub mod fixtures;

#[allow(unused_imports)]
pub use dynamo_repository::driver::{
    BatchGetRequest, BatchWriteRequest, DeleteItemRequest, GetItemRequest, Item, Page,
    PutItemRequest, QueryRequest, ScanRequest, UpdateItemRequest,
};
#[allow(unused_imports)]
pub use dynamo_repository::{
    Context, Driver, Error, Key, Logger, MetricsRecorder, Operation, Query, Repository,
};
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use serde::{Deserialize, Serialize};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One request received by [`MockDriver`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetItem(GetItemRequest),
    PutItem(PutItemRequest),
    UpdateItem(UpdateItemRequest),
    DeleteItem(DeleteItemRequest),
    BatchWrite(BatchWriteRequest),
    BatchGet(BatchGetRequest),
    Query(QueryRequest),
    Scan(ScanRequest),
}

/// In-memory driver
///
/// Each operation pops its next queued response; with nothing queued it
/// succeeds with an empty result.
#[derive(Default)]
pub struct MockDriver {
    calls: Mutex<Vec<Call>>,
    get_item: Mutex<VecDeque<Result<Option<Item>, Error>>>,
    put_item: Mutex<VecDeque<Result<(), Error>>>,
    update_item: Mutex<VecDeque<Result<Option<Item>, Error>>>,
    delete_item: Mutex<VecDeque<Result<(), Error>>>,
    batch_write: Mutex<VecDeque<Result<(), Error>>>,
    batch_get: Mutex<VecDeque<Result<Vec<Item>, Error>>>,
    query: Mutex<VecDeque<Result<Page, Error>>>,
    scan: Mutex<VecDeque<Result<Page, Error>>>,
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T, Error>>>, default: T) -> Result<T, Error> {
    queue.lock().unwrap().pop_front().unwrap_or(Ok(default))
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn push_get_item(&self, response: Result<Option<Item>, Error>) {
        self.get_item.lock().unwrap().push_back(response);
    }

    pub fn push_put_item(&self, response: Result<(), Error>) {
        self.put_item.lock().unwrap().push_back(response);
    }

    pub fn push_update_item(&self, response: Result<Option<Item>, Error>) {
        self.update_item.lock().unwrap().push_back(response);
    }

    pub fn push_delete_item(&self, response: Result<(), Error>) {
        self.delete_item.lock().unwrap().push_back(response);
    }

    pub fn push_batch_write(&self, response: Result<(), Error>) {
        self.batch_write.lock().unwrap().push_back(response);
    }

    pub fn push_batch_get(&self, response: Result<Vec<Item>, Error>) {
        self.batch_get.lock().unwrap().push_back(response);
    }

    pub fn push_query(&self, response: Result<Page, Error>) {
        self.query.lock().unwrap().push_back(response);
    }

    pub fn push_scan(&self, response: Result<Page, Error>) {
        self.scan.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn get_item(&self, request: GetItemRequest) -> Result<Option<Item>, Error> {
        self.log(Call::GetItem(request));
        pop(&self.get_item, None)
    }

    async fn put_item(&self, request: PutItemRequest) -> Result<(), Error> {
        self.log(Call::PutItem(request));
        pop(&self.put_item, ())
    }

    async fn update_item(&self, request: UpdateItemRequest) -> Result<Option<Item>, Error> {
        self.log(Call::UpdateItem(request));
        pop(&self.update_item, None)
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> Result<(), Error> {
        self.log(Call::DeleteItem(request));
        pop(&self.delete_item, ())
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> Result<(), Error> {
        self.log(Call::BatchWrite(request));
        pop(&self.batch_write, ())
    }

    async fn batch_get(&self, request: BatchGetRequest) -> Result<Vec<Item>, Error> {
        self.log(Call::BatchGet(request));
        pop(&self.batch_get, Vec::new())
    }

    async fn query(&self, request: QueryRequest) -> Result<Page, Error> {
        self.log(Call::Query(request));
        pop(&self.query, Page::default())
    }

    async fn scan(&self, request: ScanRequest) -> Result<Page, Error> {
        self.log(Call::Scan(request));
        pop(&self.scan, Page::default())
    }
}

/// One metrics record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub operation: Operation,
    pub table: String,
    pub success: bool,
    pub labels: HashMap<String, String>,
}

/// Metrics recorder keeping every record in memory
#[derive(Default)]
pub struct RecordingMetrics {
    records: Mutex<Vec<Record>>,
}

impl RecordingMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

impl MetricsRecorder for RecordingMetrics {
    fn record(&self, ctx: &Context, operation: Operation, key: &Key, _duration: Duration, success: bool) {
        self.records.lock().unwrap().push(Record {
            operation,
            table: key.table_name().to_string(),
            success,
            labels: ctx.labels(),
        });
    }
}

/// One emitted log line
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub level: &'static str,
    pub message: String,
    pub fields: HashMap<String, Value>,
}

/// Logger keeping every line in memory; derived loggers share the lines
#[derive(Default)]
pub struct RecordingLogger {
    lines: Arc<Mutex<Vec<Line>>>,
    fields: HashMap<String, Value>,
}

impl fmt::Debug for RecordingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingLogger")
            .field("fields", &self.fields)
            .finish()
    }
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().unwrap().clone()
    }

    fn derive(&self, fields: HashMap<String, Value>) -> Arc<dyn Logger> {
        let mut merged = self.fields.clone();
        merged.extend(fields);
        Arc::new(Self {
            lines: Arc::clone(&self.lines),
            fields: merged,
        })
    }

    fn emit(&self, level: &'static str, message: &str) {
        self.lines.lock().unwrap().push(Line {
            level,
            message: message.to_string(),
            fields: self.fields.clone(),
        });
    }
}

impl Logger for RecordingLogger {
    fn with_context(self: Arc<Self>, ctx: &Context) -> Arc<dyn Logger> {
        self.derive(
            ctx.labels()
                .into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect(),
        )
    }

    fn with_field(self: Arc<Self>, key: &str, value: Value) -> Arc<dyn Logger> {
        self.derive(HashMap::from([(key.to_string(), value)]))
    }

    fn with_fields(self: Arc<Self>, fields: HashMap<String, Value>) -> Arc<dyn Logger> {
        self.derive(fields)
    }

    fn info(&self, message: &str) {
        self.emit("info", message);
    }

    fn warn(&self, message: &str) {
        self.emit("warn", message);
    }

    fn error(&self, message: &str) {
        self.emit("error", message);
    }
}

/// Repository over a fresh mock driver with recording metrics and logs
pub struct Harness {
    pub driver: Arc<MockDriver>,
    pub metrics: Arc<RecordingMetrics>,
    pub log: Arc<RecordingLogger>,
    pub repository: Repository,
}

impl Harness {
    pub fn new() -> Self {
        let driver = MockDriver::new();
        let metrics = RecordingMetrics::new();
        let log = RecordingLogger::new();
        let repository = Repository::with_driver(driver.clone()).with_log(log.clone());
        let _ = repository.with_metrics(metrics.clone());

        Self {
            driver,
            metrics,
            log,
            repository,
        }
    }
}

/// Driver-level failure unrelated to conditions or batches
pub fn driver_error() -> Error {
    Error::Driver(Box::new(std::io::Error::other("connection reset")))
}
