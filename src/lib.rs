//! # DynamoDB Repository
//!
//! A repository-pattern access layer over DynamoDB with:
//! - Single-item and batch get, save, update and delete
//! - Range queries on tables and global secondary indexes
//! - Attribute-level update expressions, including templated ones
//! - Conditional writes and optimistic locking
//! - Lazily paged table scans
//! - One metrics record per touched key and structured logs for every call
//!
//! "Not found" and "condition rejected" are not errors: reads return
//! `Ok(None)` and conditional writes return `Ok(false)`. Everything else,
//! including key validation failures, comes back as an [`Error`]. Nothing is
//! retried; retry policy belongs to the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamo_repository::{Context, DynamoDbDriver, Error, Key, Repository, UpdateExpressions};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     #[serde(rename = "UUID")]
//!     uuid: String,
//!     #[serde(rename = "UserName")]
//!     user_name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let repository = Repository::new(DynamoDbDriver::shared().await);
//!     let ctx = Context::background().with_source_label("signup");
//!
//!     let key = Key::new()
//!         .with_table_name("UserTable")
//!         .with_hash_key_name("UUID")
//!         .with_hash_key("uuid");
//!
//!     let user = User {
//!         uuid: "uuid".to_string(),
//!         user_name: "name".to_string(),
//!     };
//!     repository.save_item(&ctx, &key, &user).await?;
//!
//!     let updates = UpdateExpressions::new().set("UserName", "new name");
//!     repository.update_with_update_expressions(&ctx, &key, &updates).await?;
//!
//!     if let Some(user) = repository.get_item::<User>(&ctx, &key).await? {
//!         println!("{:?}", user);
//!     }
//!
//!     Ok(())
//! }
//! ```
#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::Error;

/// Execution context: cancellation, deadline and metric labels
pub mod context;

/// Database driver boundary
pub mod driver;

/// Update and condition expressions
pub mod expression;

/// Key and query model
pub mod key;

/// Logging capability
pub mod log;

/// Metrics aggregator and recorders
pub mod metrics;

/// Versioned items
pub mod model;

/// Primary table, index and scan access
pub mod repository;

/// Table setup utilities for testing
pub mod setup;

/// Key validation
pub mod validation;

// Re-export main types for convenience
pub use context::Context;
pub use driver::{Driver, DynamoDbDriver};
pub use expression::{UpdateExpression, UpdateExpressions};
pub use key::{Key, Query, RangeOperator};
pub use log::{Logger, NopLog, TracingLogger};
pub use metrics::prometheus::PrometheusMetrics;
pub use metrics::{Metrics, MetricsRecorder, Operation};
pub use model::{Model, ModelMeta};
pub use repository::{GlobalIndex, Repository, ScanIterator};

// Re-export aws-config types for configuration
pub use aws_config::{
    BehaviorVersion, Region, SdkConfig, defaults,
    meta::region::{ProvideRegion, RegionProviderChain},
    retry::{RetryConfig, RetryMode},
    timeout::TimeoutConfig,
};

// Re-export aws-types for advanced configuration
pub use aws_types::sdk_config::Builder as SdkConfigBuilder;

use aws_sdk_dynamodb::Client as DynamoDbClient;
use tokio::sync::OnceCell;

/// Global DynamoDB client instance
static GLOBAL_CLIENT: OnceCell<DynamoDbClient> = OnceCell::const_new();

/// Default SDK configuration
///
/// - SDK retries disabled; this layer never retries
/// - Connect timeout: 3 seconds
/// - Read timeout: 20 seconds
/// - Operation timeout: 60 seconds
/// - LocalStack support via AWS_PROFILE=localstack
async fn aws_config_defaults() -> SdkConfig {
    use std::time::Duration;

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(3))
        .read_timeout(Duration::from_secs(20))
        .operation_timeout(Duration::from_secs(60))
        .build();

    let mut loader = defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::disabled())
        .timeout_config(timeout_config);

    if std::env::var("AWS_PROFILE").unwrap_or_default() == "localstack" {
        loader = loader.endpoint_url("http://127.0.0.1:4566");
    }

    loader.load().await
}

/// Initialize the global DynamoDB client with a custom AWS config
///
/// Pass a config with a retry policy here if SDK-level retries are wanted.
///
/// ```rust,no_run
/// #[tokio::main]
/// async fn main() {
///     let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
///         .region(aws_config::Region::new("eu-west-1"))
///         .load()
///         .await;
///     dynamo_repository::init(&config).await;
/// }
/// ```
pub async fn init(config: &SdkConfig) {
    let _ = GLOBAL_CLIENT
        .get_or_init(|| async { DynamoDbClient::new(config) })
        .await;
}

/// Initialize the global DynamoDB client with a custom client instance
pub async fn init_with_client(client: DynamoDbClient) {
    let _ = GLOBAL_CLIENT.get_or_init(|| async { client }).await;
}

/// Global DynamoDB client
///
/// Initialised with the default configuration on first use unless [`init`]
/// or [`init_with_client`] ran before: SDK retries disabled, 3s connect,
/// 20s read and 60s operation timeouts, and the LocalStack endpoint when
/// `AWS_PROFILE=localstack`.
pub async fn dynamodb_client() -> &'static DynamoDbClient {
    GLOBAL_CLIENT
        .get_or_init(|| async {
            let config = aws_config_defaults().await;
            DynamoDbClient::new(&config)
        })
        .await
}
