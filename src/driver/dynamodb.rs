use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{
    DeleteRequest, KeysAndAttributes, PutRequest, ReturnConsumedCapacity, ReturnValue, Select,
    WriteRequest,
};
use futures_util::{StreamExt, TryStreamExt};
use tokio_stream::{self as stream};

use super::{
    BatchGetRequest, BatchWriteRequest, DeleteItemRequest, Driver, GetItemRequest, Item, Page,
    PutItemRequest, QueryRequest, ScanRequest, UpdateItemRequest,
};
use crate::error::Error;

/// Maximum number of write requests per BatchWriteItem call
pub const BATCH_WRITE_SIZE: usize = 25;
/// Maximum number of keys per BatchGetItem call
pub const BATCH_READ_SIZE: usize = 100;
/// Batch calls in flight at once
pub const DEFAULT_CONCURRENCY: usize = 10;

/// [`Driver`] backed by `aws-sdk-dynamodb`
///
/// Batch requests larger than DynamoDB allows are split and sent
/// concurrently. Unprocessed entries are reported, never retried.
#[derive(Debug, Clone)]
pub struct DynamoDbDriver {
    client: Client,
}

impl DynamoDbDriver {
    /// Driver using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Driver using the global client, initialising it with defaults if needed
    pub async fn shared() -> Self {
        Self::new(crate::dynamodb_client().await.clone())
    }

    /// Underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn non_empty(key: Option<Item>) -> Option<Item> {
    key.filter(|key| !key.is_empty())
}

#[async_trait]
impl Driver for DynamoDbDriver {
    async fn get_item(&self, request: GetItemRequest) -> Result<Option<Item>, Error> {
        let result = self
            .client
            .get_item()
            .table_name(request.table_name)
            .set_key(Some(request.key))
            .set_return_consumed_capacity(None)
            .send()
            .await?;

        Ok(result.item)
    }

    async fn put_item(&self, request: PutItemRequest) -> Result<(), Error> {
        let result = self
            .client
            .put_item()
            .table_name(request.table_name)
            .set_item(Some(request.item))
            .set_condition_expression(request.condition_expression)
            .set_expression_attribute_names(request.attributes.names_or_none())
            .set_expression_attribute_values(request.attributes.values_or_none())
            .return_values(ReturnValue::None)
            .return_consumed_capacity(ReturnConsumedCapacity::None)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match e.as_service_error() {
                Some(PutItemError::ConditionalCheckFailedException(rejected)) => {
                    Err(Error::ConditionalCheckFailed(rejected.to_string()))
                }
                _ => Err(e.into()),
            },
        }
    }

    async fn update_item(&self, request: UpdateItemRequest) -> Result<Option<Item>, Error> {
        let return_values = if request.return_new {
            ReturnValue::AllNew
        } else {
            ReturnValue::None
        };

        let result = self
            .client
            .update_item()
            .table_name(request.table_name)
            .set_key(Some(request.key))
            .update_expression(request.update_expression)
            .set_condition_expression(request.condition_expression)
            .set_expression_attribute_names(request.attributes.names_or_none())
            .set_expression_attribute_values(request.attributes.values_or_none())
            .return_values(return_values)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.attributes),
            Err(e) => match e.as_service_error() {
                Some(UpdateItemError::ConditionalCheckFailedException(rejected)) => {
                    Err(Error::ConditionalCheckFailed(rejected.to_string()))
                }
                _ => Err(e.into()),
            },
        }
    }

    async fn delete_item(&self, request: DeleteItemRequest) -> Result<(), Error> {
        let _ = self
            .client
            .delete_item()
            .table_name(request.table_name)
            .set_key(Some(request.key))
            .send()
            .await?;

        Ok(())
    }

    async fn batch_write(&self, request: BatchWriteRequest) -> Result<(), Error> {
        if request.puts.is_empty() && request.deletes.is_empty() {
            return Ok(());
        }

        let mut write_ops: Vec<WriteRequest> =
            Vec::with_capacity(request.puts.len() + request.deletes.len());

        for item in request.puts {
            let put_request = PutRequest::builder().set_item(Some(item)).build()?;
            write_ops.push(
                WriteRequest::builder()
                    .set_put_request(Some(put_request))
                    .build(),
            );
        }

        for key in request.deletes {
            let delete_request = DeleteRequest::builder().set_key(Some(key)).build()?;
            write_ops.push(
                WriteRequest::builder()
                    .set_delete_request(Some(delete_request))
                    .build(),
            );
        }

        let batches: Vec<Vec<WriteRequest>> = write_ops
            .chunks(BATCH_WRITE_SIZE)
            .map(|data| data.to_vec())
            .collect();

        let concurrency = batches.len().min(DEFAULT_CONCURRENCY);
        let client = &self.client;
        let table_name = &request.table_name;

        let unprocessed = stream::iter(batches.into_iter().map(|batch| {
            client
                .batch_write_item()
                .request_items(table_name.clone(), batch)
                .send()
        }))
        .buffer_unordered(concurrency)
        .map_err(Into::<Error>::into)
        .try_fold(0usize, |unprocessed, result| async move {
            let count: usize = result
                .unprocessed_items
                .map(|items| items.values().map(Vec::len).sum())
                .unwrap_or_default();
            Ok(unprocessed + count)
        })
        .await?;

        if unprocessed > 0 {
            return Err(Error::UnprocessedItems(unprocessed));
        }

        Ok(())
    }

    async fn batch_get(&self, request: BatchGetRequest) -> Result<Vec<Item>, Error> {
        if request.keys.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<KeysAndAttributes> = request
            .keys
            .chunks(BATCH_READ_SIZE)
            .map(|data| {
                KeysAndAttributes::builder()
                    .set_keys(Some(data.to_vec()))
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let concurrency = batches.len().min(DEFAULT_CONCURRENCY);
        let client = &self.client;
        let table_name = &request.table_name;

        let (items, unprocessed) = stream::iter(batches.into_iter().map(|batch| {
            client
                .batch_get_item()
                .request_items(table_name.clone(), batch)
                .send()
        }))
        .buffer_unordered(concurrency)
        .map_err(Into::<Error>::into)
        .try_fold(
            (Vec::new(), 0usize),
            |(mut items, unprocessed), result| async move {
                if let Some(responses) = result.responses {
                    for found in responses.into_values() {
                        items.extend(found);
                    }
                }

                let count: usize = result
                    .unprocessed_keys
                    .map(|keys| keys.values().map(|k| k.keys.len()).sum())
                    .unwrap_or_default();

                Ok((items, unprocessed + count))
            },
        )
        .await?;

        if unprocessed > 0 {
            return Err(Error::UnprocessedItems(unprocessed));
        }

        Ok(items)
    }

    async fn query(&self, request: QueryRequest) -> Result<Page, Error> {
        let mut builder = self
            .client
            .query()
            .table_name(request.table_name)
            .key_condition_expression(request.key_condition)
            .set_expression_attribute_names(request.attributes.names_or_none())
            .set_expression_attribute_values(request.attributes.values_or_none())
            .set_limit(request.limit)
            .scan_index_forward(request.scan_forward)
            .set_exclusive_start_key(request.exclusive_start_key);

        if let Some(index_name) = request.index_name {
            builder = builder
                .index_name(index_name)
                .select(Select::AllProjectedAttributes);
        }

        let result = builder.send().await?;

        Ok(Page {
            items: result.items.unwrap_or_default(),
            last_evaluated_key: non_empty(result.last_evaluated_key),
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<Page, Error> {
        let result = self
            .client
            .scan()
            .table_name(request.table_name)
            .set_limit(request.limit)
            .set_exclusive_start_key(request.exclusive_start_key)
            .send()
            .await?;

        Ok(Page {
            items: result.items.unwrap_or_default(),
            last_evaluated_key: non_empty(result.last_evaluated_key),
        })
    }
}
