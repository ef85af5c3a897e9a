use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::batch_get_item::BatchGetItemError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use prometheus::Error as PrometheusError;
use serde_dynamo::Error as SerdeDynamoError;
use std::error::Error as StdError;
use std::fmt;

type DynamoPutError = SdkError<PutItemError, Response>;
type DynamoUpdateError = SdkError<UpdateItemError, Response>;
type DynamoGetError = SdkError<GetItemError, Response>;
type DynamoQueryError = SdkError<QueryError, Response>;
type DynamoScanError = SdkError<ScanError, Response>;
type DynamoDeleteItemError = SdkError<DeleteItemError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;
type DynamoBatchGetItemError = SdkError<BatchGetItemError, Response>;

/// Repository operation error
///
/// Validation variants are produced before any request reaches the driver.
/// `NoItemFound` and `ConditionalCheckFailed` are the two outcomes the
/// repository demotes to a negative result instead of returning them.
#[derive(Debug)]
pub enum Error {
    /// Key has an empty table name
    InvalidTableName,
    /// Key has an empty hash key name
    InvalidHashKeyName,
    /// Key has no hash key value
    InvalidHashKeyValue,
    /// A key value could not be converted to an attribute value
    InvalidKeyValue(String),
    /// A value that must be a sequence is not one
    InvalidSliceType,
    /// Batch keys reference more than one table
    InvalidBatchRequest,
    /// Range operator is missing the operand it needs
    InvalidRangeValue,
    /// A set update received a value that is not a homogeneous set
    InvalidSetValue(String),
    /// An expression template does not match its arguments
    InvalidExpression(String),
    /// The requested item does not exist
    NoItemFound,
    /// A conditional write was rejected by its precondition
    ConditionalCheckFailed(String),
    /// A batch request came back with unprocessed entries
    UnprocessedItems(usize),
    /// The operation context was cancelled
    Cancelled,
    /// The operation context deadline elapsed
    DeadlineExceeded,
    /// Error raised by a custom driver implementation
    Driver(Box<dyn StdError + Send + Sync>),
    /// Serde DynamoDB serialization/deserialization error
    SerdeDynamo(SerdeDynamoError),
    /// Metric registration error
    Prometheus(PrometheusError),
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB PutItem operation error
    DynamoPutError(DynamoPutError),
    /// DynamoDB GetItem operation error
    DynamoGetError(DynamoGetError),
    /// DynamoDB Query operation error
    DynamoQueryError(DynamoQueryError),
    /// DynamoDB Scan operation error
    DynamoScanError(DynamoScanError),
    /// DynamoDB UpdateItem operation error
    DynamoUpdateError(DynamoUpdateError),
    /// DynamoDB DeleteItem operation error
    DynamoDeleteItemError(DynamoDeleteItemError),
    /// DynamoDB CreateTable operation error
    DynamoCreateTableError(DynamoCreateTableError),
    /// DynamoDB BatchWriteItem operation error
    DynamoBatchWriteItemError(DynamoBatchWriteItemError),
    /// DynamoDB BatchGetItem operation error
    DynamoBatchGetItemError(DynamoBatchGetItemError),
}

impl Error {
    /// Check if the error is a rejected conditional write
    ///
    /// Covers both the translated [`Error::ConditionalCheckFailed`] and a raw
    /// `ConditionalCheckFailedException` still wrapped in an SDK error.
    ///
    /// # Example
    /// ```no_run
    /// # use dynamo_repository::Error;
    /// # fn example(error: Error) {
    /// if error.is_conditional_check_failed() {
    ///     println!("Item was modified by another process");
    /// }
    /// # }
    /// ```
    pub fn is_conditional_check_failed(&self) -> bool {
        match self {
            Error::ConditionalCheckFailed(_) => true,
            Error::DynamoUpdateError(e) => matches!(
                e.as_service_error(),
                Some(UpdateItemError::ConditionalCheckFailedException(_))
            ),
            Error::DynamoPutError(e) => matches!(
                e.as_service_error(),
                Some(PutItemError::ConditionalCheckFailedException(_))
            ),
            _ => false,
        }
    }

    /// Check if the error is the "item not found" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoItemFound)
    }

    /// Check if the error was raised by key or argument validation
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidTableName
                | Error::InvalidHashKeyName
                | Error::InvalidHashKeyValue
                | Error::InvalidKeyValue(_)
                | Error::InvalidSliceType
                | Error::InvalidBatchRequest
                | Error::InvalidRangeValue
                | Error::InvalidSetValue(_)
                | Error::InvalidExpression(_)
        )
    }

    /// Check if the error is a serialization/deserialization error
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::SerdeDynamo(_))
    }

    /// Check if the error came back from DynamoDB
    ///
    /// Returns `true` for any SDK operation error, builder error or
    /// unprocessed batch entries.
    pub fn is_dynamodb_error(&self) -> bool {
        matches!(
            self,
            Error::BuildError(_)
                | Error::UnprocessedItems(_)
                | Error::ConditionalCheckFailed(_)
                | Error::DynamoPutError(_)
                | Error::DynamoGetError(_)
                | Error::DynamoQueryError(_)
                | Error::DynamoScanError(_)
                | Error::DynamoUpdateError(_)
                | Error::DynamoDeleteItemError(_)
                | Error::DynamoCreateTableError(_)
                | Error::DynamoBatchWriteItemError(_)
                | Error::DynamoBatchGetItemError(_)
        )
    }
}

macro_rules! impl_from_error {
    ($name:ident, $variant:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
    ($name:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

impl_from_error!(SerdeDynamoError, SerdeDynamo);
impl_from_error!(PrometheusError, Prometheus);
impl_from_error!(BuildError);
impl_from_error!(DynamoPutError);
impl_from_error!(DynamoGetError);
impl_from_error!(DynamoUpdateError);
impl_from_error!(DynamoQueryError);
impl_from_error!(DynamoScanError);
impl_from_error!(DynamoDeleteItemError);
impl_from_error!(DynamoCreateTableError);
impl_from_error!(DynamoBatchWriteItemError);
impl_from_error!(DynamoBatchGetItemError);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidTableName => write!(f, "invalid table name"),
            Error::InvalidHashKeyName => write!(f, "invalid hash key name"),
            Error::InvalidHashKeyValue => write!(f, "invalid hash key value"),
            Error::InvalidKeyValue(e) => write!(f, "invalid key value: {}", e),
            Error::InvalidSliceType => write!(f, "invalid slice type"),
            Error::InvalidBatchRequest => {
                write!(f, "batch request keys must reference a single table")
            }
            Error::InvalidRangeValue => write!(f, "range operator is missing its operand"),
            Error::InvalidSetValue(attr) => {
                write!(f, "attribute {} requires a set of strings or numbers", attr)
            }
            Error::InvalidExpression(e) => write!(f, "invalid expression: {}", e),
            Error::NoItemFound => write!(f, "no item found"),
            Error::ConditionalCheckFailed(e) => {
                write!(f, "conditional check failed: {}", e)
            }
            Error::UnprocessedItems(count) => {
                write!(f, "batch request left {} items unprocessed", count)
            }
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::DeadlineExceeded => write!(f, "operation deadline exceeded"),
            Error::Driver(e) => write!(f, "driver error: {}", e),
            Error::SerdeDynamo(e) => write!(f, "DynamoDB serialization error: {}", e),
            Error::Prometheus(e) => write!(f, "metrics registration error: {}", e),
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            Error::DynamoPutError(e) => {
                write!(f, "DynamoDB PutItem operation failed: {}", e)
            }
            Error::DynamoGetError(e) => {
                write!(f, "DynamoDB GetItem operation failed: {}", e)
            }
            Error::DynamoQueryError(e) => {
                write!(f, "DynamoDB Query operation failed: {}", e)
            }
            Error::DynamoScanError(e) => {
                write!(f, "DynamoDB Scan operation failed: {}", e)
            }
            Error::DynamoUpdateError(e) => {
                write!(f, "DynamoDB UpdateItem operation failed: {}", e)
            }
            Error::DynamoDeleteItemError(e) => {
                write!(f, "DynamoDB DeleteItem operation failed: {}", e)
            }
            Error::DynamoCreateTableError(e) => {
                write!(f, "DynamoDB CreateTable operation failed: {}", e)
            }
            Error::DynamoBatchWriteItemError(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            Error::DynamoBatchGetItemError(e) => {
                write!(f, "DynamoDB BatchGetItem operation failed: {}", e)
            }
        }
    }
}

impl StdError for Error {}
