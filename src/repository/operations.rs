use serde::{Serialize, de::DeserializeOwned};
use serde_dynamo::{from_item, from_items, to_item};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::Repository;
use super::scan::ScanIterator;
use crate::context::Context;
use crate::driver::{
    DeleteItemRequest, Driver, GetItemRequest, Item, PutItemRequest, QueryRequest,
    UpdateItemRequest,
};
use crate::error::Error;
use crate::expression::{self, ExpressionBuilder, UpdateExpression, UpdateExpressions};
use crate::key::{Key, Query};
use crate::metrics::Operation;
use crate::model::{Model, VERSION_ATTRIBUTE};
use crate::validation::{is_valid_key, is_valid_table_name};

const OPTIMISTIC_LOCK_CONDITION: &str = "attribute_not_exists($) OR $ = ?";

/// Run a query page by page until the cursor runs out or `limit` items
/// have been collected
pub(crate) async fn query_all(
    driver: &dyn Driver,
    ctx: &Context,
    mut request: QueryRequest,
    limit: Option<i32>,
) -> Result<Vec<Item>, Error> {
    let limit = limit.and_then(|limit| usize::try_from(limit).ok());
    let mut items = Vec::new();

    loop {
        if let Some(limit) = limit {
            let remaining = limit.saturating_sub(items.len());
            request.limit = i32::try_from(remaining).ok();
        }

        let page = ctx.run(driver.query(request.clone())).await?;
        items.extend(page.items);

        if let Some(limit) = limit {
            if items.len() >= limit {
                items.truncate(limit);
                break;
            }
        }

        match page.last_evaluated_key {
            Some(cursor) => request.exclusive_start_key = Some(cursor),
            None => break,
        }
    }

    Ok(items)
}

/// Query request for every item under the hash key of `key`
pub(crate) fn hash_query_request(key: &Key, index_name: Option<String>) -> QueryRequest {
    let (key_condition, attributes) = key.hash_condition();
    QueryRequest {
        table_name: key.table_name().to_string(),
        index_name,
        key_condition,
        attributes,
        limit: None,
        scan_forward: true,
        exclusive_start_key: None,
    }
}

/// Query request honouring the range operator, limit and order of `query`
pub(crate) fn query_request(query: &Query, index_name: Option<String>) -> Result<QueryRequest, Error> {
    let (key_condition, attributes) = query.key_condition()?;
    Ok(QueryRequest {
        table_name: query.key().table_name().to_string(),
        index_name,
        key_condition,
        attributes,
        limit: query.effective_limit(),
        scan_forward: !query.descending(),
        exclusive_start_key: None,
    })
}

fn update_request(
    key: &Key,
    updates: &UpdateExpressions,
    condition: Option<(&str, &[Value])>,
    return_new: bool,
) -> Result<UpdateItemRequest, Error> {
    let mut builder = ExpressionBuilder::new();
    let update_expression = builder.update(updates)?;
    let condition_expression = condition
        .map(|(template, args)| builder.template(template, args))
        .transpose()?;

    Ok(UpdateItemRequest {
        table_name: key.table_name().to_string(),
        key: key.item_key(),
        update_expression,
        condition_expression,
        attributes: builder.into_attributes(),
        return_new,
    })
}

fn returned_item<T: DeserializeOwned>(item: Option<Item>) -> Result<T, Error> {
    match item {
        Some(item) => Ok(from_item(item)?),
        None => Err(Error::NoItemFound),
    }
}

impl Repository {
    /// Get one item by hash key and, when set, range key
    ///
    /// Returns `Ok(None)` when the item does not exist.
    pub async fn get_item<T>(&self, ctx: &Context, key: &Key) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = async {
            is_valid_key(key)?;
            let request = GetItemRequest {
                table_name: key.table_name().to_string(),
                key: key.item_key(),
            };
            ctx.run(self.driver.get_item(request)).await
        }
        .await;

        self.instrumentation
            .finish_one(ctx, key.table_name(), timer, result)
    }

    /// Get every item sharing the hash key
    ///
    /// A range key on `key` is ignored. Returns `Ok(None)` when nothing matched.
    pub async fn get_items<T>(&self, ctx: &Context, key: &Key) -> Result<Option<Vec<T>>, Error>
    where
        T: DeserializeOwned,
    {
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = async {
            is_valid_key(key)?;
            query_all(self.driver.as_ref(), ctx, hash_query_request(key, None), None).await
        }
        .await;

        self.instrumentation
            .finish_many(ctx, key.table_name(), timer, result)
    }

    /// Query items by hash key and optional range comparison
    ///
    /// No matching items is an empty vector, not an error.
    pub async fn query<T>(&self, ctx: &Context, query: &Query) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
    {
        let key = query.key();
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = async {
            is_valid_key(key)?;
            let request = query_request(query, None)?;
            let items = query_all(self.driver.as_ref(), ctx, request, query.effective_limit()).await?;
            Ok::<Vec<T>, Error>(from_items(items)?)
        }
        .await;

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }

    /// Replace the item in the table named by `key`
    pub async fn save_item<T>(&self, ctx: &Context, key: &Key, item: &T) -> Result<(), Error>
    where
        T: Serialize,
    {
        let timer = self.instrumentation.start(ctx, Operation::Commit, key);

        let result = async {
            is_valid_key(key)?;
            let request = PutItemRequest {
                table_name: key.table_name().to_string(),
                item: to_item(item)?,
                condition_expression: None,
                attributes: Default::default(),
            };
            ctx.run(self.driver.put_item(request)).await
        }
        .await;

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }

    /// Apply one kind of update to every attribute in `values`
    ///
    /// For [`UpdateExpression::SetExpr`] the keys are templates and each value
    /// must be the sequence of template arguments.
    pub async fn update(
        &self,
        ctx: &Context,
        expression: UpdateExpression,
        key: &Key,
        values: HashMap<String, Value>,
    ) -> Result<(), Error> {
        let updates = UpdateExpressions::from_values(expression, values);
        self.update_with_update_expressions(ctx, key, &updates).await
    }

    /// Apply a mix of update kinds to one item in a single request
    pub async fn update_with_update_expressions(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &UpdateExpressions,
    ) -> Result<(), Error> {
        let timer = self.instrumentation.start(ctx, Operation::Update, key);

        let result = async {
            is_valid_key(key)?;
            let request = update_request(key, updates, None, false)?;
            let _ = ctx.run(self.driver.update_item(request)).await?;
            Ok::<(), Error>(())
        }
        .await;

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }

    /// Like [`Repository::update_with_update_expressions`], returning the
    /// item as it appears after the update
    pub async fn update_with_update_expressions_and_return_value<T>(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &UpdateExpressions,
    ) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let timer = self.instrumentation.start(ctx, Operation::Update, key);

        let result = async {
            is_valid_key(key)?;
            let request = update_request(key, updates, None, true)?;
            returned_item::<T>(ctx.run(self.driver.update_item(request)).await?)
        }
        .await;

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }

    /// Update under a condition, returning the updated item
    ///
    /// `condition` is a template where `$` takes an attribute name and `?` a
    /// value from `args`. A rejected condition returns `Ok(None)` and leaves
    /// the item untouched.
    pub async fn conditional_update_with_update_expressions_and_return_value<T>(
        &self,
        ctx: &Context,
        key: &Key,
        updates: &UpdateExpressions,
        condition: &str,
        args: &[Value],
    ) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let timer = self.instrumentation.start(ctx, Operation::Update, key);

        let result = async {
            is_valid_key(key)?;
            let request = update_request(key, updates, Some((condition, args)), true)?;
            returned_item::<T>(ctx.run(self.driver.update_item(request)).await?)
        }
        .await;

        self.instrumentation
            .finish_conditional(ctx, key.table_name(), timer, result)
    }

    /// Replace the item only if `condition` holds on the stored item
    ///
    /// Returns `Ok(false)` when the condition is rejected.
    pub async fn conditional_update<T>(
        &self,
        ctx: &Context,
        key: &Key,
        item: &T,
        condition: &str,
        args: &[Value],
    ) -> Result<bool, Error>
    where
        T: Serialize,
    {
        let timer = self.instrumentation.start(ctx, Operation::Update, key);

        let result = async {
            is_valid_key(key)?;
            self.conditional_put(ctx, key, to_item(item)?, condition, args)
                .await
        }
        .await;

        self.instrumentation
            .finish_conditional(ctx, key.table_name(), timer, result)
            .map(|written| written.is_some())
    }

    /// Save a versioned item with optimistic concurrency control
    ///
    /// The in-memory version is incremented and the timestamps are stamped
    /// before writing; the write succeeds only if the stored version is absent
    /// or equal to the version held before the increment. Returns `Ok(false)`
    /// when another writer got there first. The item keeps its advanced
    /// version in either case.
    pub async fn optimistic_lock_save<T>(&self, ctx: &Context, key: &Key, item: &mut T) -> Result<bool, Error>
    where
        T: Model + Serialize,
    {
        let timer = self.instrumentation.start(ctx, Operation::Commit, key);

        let result = async {
            is_valid_key(key)?;
            let expected = item.meta_mut().advance();
            let args = [
                Value::from(VERSION_ATTRIBUTE),
                Value::from(VERSION_ATTRIBUTE),
                Value::from(expected),
            ];
            self.conditional_put(ctx, key, to_item(&*item)?, OPTIMISTIC_LOCK_CONDITION, &args)
                .await
        }
        .await;

        self.instrumentation
            .finish_conditional(ctx, key.table_name(), timer, result)
            .map(|written| written.is_some())
    }

    async fn conditional_put(
        &self,
        ctx: &Context,
        key: &Key,
        item: Item,
        condition: &str,
        args: &[Value],
    ) -> Result<(), Error> {
        let (condition_expression, attributes) = expression::condition(condition, args)?;
        let request = PutItemRequest {
            table_name: key.table_name().to_string(),
            item,
            condition_expression: Some(condition_expression),
            attributes,
        };
        ctx.run(self.driver.put_item(request)).await
    }

    /// Delete one item
    pub async fn delete_item(&self, ctx: &Context, key: &Key) -> Result<(), Error> {
        let timer = self.instrumentation.start(ctx, Operation::Delete, key);

        let result = async {
            is_valid_key(key)?;
            let request = DeleteItemRequest {
                table_name: key.table_name().to_string(),
                key: key.item_key(),
            };
            ctx.run(self.driver.delete_item(request)).await
        }
        .await;

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }

    /// Lazily scan the table named by `key`, fetching `page_size` items per request
    ///
    /// Only the table name is validated; no request is made until the
    /// iterator is advanced. Values below one mean no page size.
    pub fn scan_iterator(&self, ctx: &Context, key: &Key, page_size: i32) -> Result<ScanIterator, Error> {
        let timer = self.instrumentation.start(ctx, Operation::Read, key);

        let result = is_valid_table_name(key).map(|()| {
            ScanIterator::new(
                ctx.clone(),
                Arc::clone(&self.driver),
                key.table_name().to_string(),
                (page_size > 0).then_some(page_size),
            )
        });

        self.instrumentation
            .finish(ctx, key.table_name(), timer, result)
    }
}
