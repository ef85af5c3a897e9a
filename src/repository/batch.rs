use serde::{Serialize, de::DeserializeOwned};
use serde_dynamo::to_item;

use super::Repository;
use crate::context::Context;
use crate::driver::{BatchGetRequest, BatchWriteRequest, Item};
use crate::error::Error;
use crate::key::Key;
use crate::metrics::Operation;
use crate::validation::is_valid_key;

/// Validate every key and require a single table; returns that table name
fn single_table(keys: &[Key]) -> Result<&str, Error> {
    let table_name = keys.first().map(Key::table_name).unwrap_or_default();

    for key in keys {
        is_valid_key(key)?;
        if key.table_name() != table_name {
            return Err(Error::InvalidBatchRequest);
        }
    }

    Ok(table_name)
}

impl Repository {
    /// Put every item into the table named by `key` with batched writes
    ///
    /// Requests above the per-call DynamoDB limit are split. An empty slice
    /// succeeds without a request.
    pub async fn save_items<T>(&self, ctx: &Context, key: &Key, items: &[T]) -> Result<(), Error>
    where
        T: Serialize,
    {
        let timer = self.instrumentation.start(ctx, Operation::Commit, key);

        let result = async {
            is_valid_key(key)?;
            if items.is_empty() {
                return Ok(());
            }

            let puts = items
                .iter()
                .map(to_item)
                .collect::<Result<Vec<Item>, _>>()?;
            let request = BatchWriteRequest {
                table_name: key.table_name().to_string(),
                puts,
                deletes: Vec::new(),
            };
            ctx.run(self.driver.batch_write(request)).await
        }
        .await;

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }

    /// Delete the items addressed by `keys` with batched writes
    ///
    /// All keys are validated before any request and must share one table.
    /// Records one metrics entry per key; an empty slice records none.
    pub async fn delete_items(&self, ctx: &Context, keys: &[Key]) -> Result<(), Error> {
        let timer = self
            .instrumentation
            .start_many(ctx, Operation::Delete, keys.to_vec());
        let table_name = keys.first().map(Key::table_name).unwrap_or_default();

        let result = async {
            if keys.is_empty() {
                return Ok(());
            }

            let table_name = single_table(keys)?;
            let request = BatchWriteRequest {
                table_name: table_name.to_string(),
                puts: Vec::new(),
                deletes: keys.iter().map(Key::item_key).collect(),
            };
            ctx.run(self.driver.batch_write(request)).await
        }
        .await;

        self.instrumentation.finish(ctx, table_name, timer, result)
    }

    /// Get the items addressed by `keys` in batched reads
    ///
    /// Keys must share one table. Returns `Ok(None)` when no key matched.
    /// An empty `keys` returns `Ok(None)` with no request, record or log.
    pub async fn batch_get_items<T>(&self, ctx: &Context, keys: &[Key]) -> Result<Option<Vec<T>>, Error>
    where
        T: DeserializeOwned,
    {
        if keys.is_empty() {
            return Ok(None);
        }

        let timer = self
            .instrumentation
            .start_many(ctx, Operation::Read, keys.to_vec());
        let table_name = keys.first().map(Key::table_name).unwrap_or_default();

        let result = async {
            let table_name = single_table(keys)?;
            let request = BatchGetRequest {
                table_name: table_name.to_string(),
                keys: keys.iter().map(Key::item_key).collect(),
            };
            ctx.run(self.driver.batch_get(request)).await
        }
        .await;

        self.instrumentation
            .finish_many(ctx, table_name, timer, result)
    }
}
