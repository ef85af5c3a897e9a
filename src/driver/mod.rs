//! Database driver boundary.
//!
//! The repository speaks to DynamoDB only through [`Driver`]. Requests carry
//! fully rendered expressions and raw attribute maps; the driver neither
//! validates keys nor retries.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

use crate::error::Error;
use crate::expression::ExpressionAttributes;

/// DynamoDB implementation
pub mod dynamodb;

pub use dynamodb::DynamoDbDriver;

/// A raw DynamoDB item or key
pub type Item = HashMap<String, AttributeValue>;

/// Fetch one item by primary key
#[derive(Debug, Clone, PartialEq)]
pub struct GetItemRequest {
    /// Table to read
    pub table_name: String,
    /// Primary key
    pub key: Item,
}

/// Replace one item, optionally under a condition
#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    /// Table to write
    pub table_name: String,
    /// Full item
    pub item: Item,
    /// Condition the stored item must satisfy
    pub condition_expression: Option<String>,
    /// Placeholders of the condition
    pub attributes: ExpressionAttributes,
}

/// Update attributes of one item
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemRequest {
    /// Table to write
    pub table_name: String,
    /// Primary key
    pub key: Item,
    /// Rendered update expression
    pub update_expression: String,
    /// Condition the stored item must satisfy
    pub condition_expression: Option<String>,
    /// Placeholders of both expressions
    pub attributes: ExpressionAttributes,
    /// Return the item as it appears after the update
    pub return_new: bool,
}

/// Delete one item
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    /// Table to write
    pub table_name: String,
    /// Primary key
    pub key: Item,
}

/// Put and delete several items of one table
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteRequest {
    /// Table to write
    pub table_name: String,
    /// Items to put
    pub puts: Vec<Item>,
    /// Keys to delete
    pub deletes: Vec<Item>,
}

/// Fetch several items of one table by primary key
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetRequest {
    /// Table to read
    pub table_name: String,
    /// Primary keys
    pub keys: Vec<Item>,
}

/// Query a table or index by key condition
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Table to read
    pub table_name: String,
    /// Secondary index, if any
    pub index_name: Option<String>,
    /// Rendered key condition
    pub key_condition: String,
    /// Placeholders of the key condition
    pub attributes: ExpressionAttributes,
    /// Maximum number of items evaluated
    pub limit: Option<i32>,
    /// Ascending range key order when true
    pub scan_forward: bool,
    /// Cursor of the previous page
    pub exclusive_start_key: Option<Item>,
}

/// Scan one page of a table
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Table to read
    pub table_name: String,
    /// Page size
    pub limit: Option<i32>,
    /// Cursor of the previous page
    pub exclusive_start_key: Option<Item>,
}

/// One page of a query or scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items of the page
    pub items: Vec<Item>,
    /// Cursor of the next page; `None` on the last page
    pub last_evaluated_key: Option<Item>,
}

/// Primitive operations consumed by the repository
///
/// Implementations report a rejected condition as
/// [`Error::ConditionalCheckFailed`] and a partially processed batch as
/// [`Error::UnprocessedItems`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Fetch one item; `None` when it does not exist
    async fn get_item(&self, request: GetItemRequest) -> Result<Option<Item>, Error>;

    /// Replace one item
    async fn put_item(&self, request: PutItemRequest) -> Result<(), Error>;

    /// Update one item; returns the new item when requested
    async fn update_item(&self, request: UpdateItemRequest) -> Result<Option<Item>, Error>;

    /// Delete one item
    async fn delete_item(&self, request: DeleteItemRequest) -> Result<(), Error>;

    /// Put and delete several items
    async fn batch_write(&self, request: BatchWriteRequest) -> Result<(), Error>;

    /// Fetch several items; missing items are absent from the result
    async fn batch_get(&self, request: BatchGetRequest) -> Result<Vec<Item>, Error>;

    /// Fetch one page of a query
    async fn query(&self, request: QueryRequest) -> Result<Page, Error>;

    /// Fetch one page of a scan
    async fn scan(&self, request: ScanRequest) -> Result<Page, Error>;
}
