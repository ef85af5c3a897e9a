use futures_util::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde_dynamo::from_item;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::driver::{Driver, Item, ScanRequest};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Exhausted,
}

/// Cursor over a full-table scan
///
/// Pages are fetched lazily as items are consumed. A driver or decoding
/// error ends the iteration; read it with [`ScanIterator::take_error`]
/// after the loop.
///
/// ```no_run
/// # use dynamo_repository::{Context, Key, Repository};
/// # use serde::Deserialize;
/// # #[derive(Deserialize)] struct User {}
/// # async fn example(repository: Repository) -> Result<(), dynamo_repository::Error> {
/// let key = Key::new().with_table_name("UserTable");
/// let mut users = repository.scan_iterator(&Context::background(), &key, 100)?;
///
/// while let Some(_user) = users.next_item::<User>().await {
///     // ...
/// }
///
/// if let Some(e) = users.take_error() {
///     return Err(e);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ScanIterator {
    ctx: Context,
    driver: Arc<dyn Driver>,
    table_name: String,
    page_size: Option<i32>,
    state: State,
    page: VecDeque<Item>,
    cursor: Option<Item>,
    error: Option<Error>,
}

impl fmt::Debug for ScanIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanIterator")
            .field("table_name", &self.table_name)
            .field("page_size", &self.page_size)
            .field("state", &self.state)
            .field("buffered", &self.page.len())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl ScanIterator {
    pub(crate) fn new(ctx: Context, driver: Arc<dyn Driver>, table_name: String, page_size: Option<i32>) -> Self {
        Self {
            ctx,
            driver,
            table_name,
            page_size,
            state: State::Ready,
            page: VecDeque::new(),
            cursor: None,
            error: None,
        }
    }

    /// Next item, or `None` once the scan is exhausted or failed
    pub async fn next_item<T>(&mut self) -> Option<T>
    where
        T: DeserializeOwned,
    {
        loop {
            if let Some(item) = self.page.pop_front() {
                return match from_item(item) {
                    Ok(item) => Some(item),
                    Err(e) => {
                        self.fail(e.into());
                        None
                    }
                };
            }

            if self.state == State::Exhausted {
                return None;
            }

            let request = ScanRequest {
                table_name: self.table_name.clone(),
                limit: self.page_size,
                exclusive_start_key: self.cursor.take(),
            };

            let result = self.ctx.run(self.driver.scan(request)).await;
            match result {
                Ok(page) => {
                    self.page.extend(page.items);
                    match page.last_evaluated_key {
                        Some(cursor) => self.cursor = Some(cursor),
                        None => self.state = State::Exhausted,
                    }
                }
                Err(e) => {
                    self.fail(e);
                    return None;
                }
            }
        }
    }

    fn fail(&mut self, error: Error) {
        self.state = State::Exhausted;
        self.page.clear();
        self.cursor = None;
        self.error = Some(error);
    }

    /// Error that ended the iteration, if any
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Take the error that ended the iteration
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Whether no further items will be produced
    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted && self.page.is_empty()
    }

    /// Consume the iterator as a stream; an error is yielded once as the
    /// last element
    pub fn into_stream<T>(self) -> impl Stream<Item = Result<T, Error>>
    where
        T: DeserializeOwned,
    {
        stream::unfold(self, |mut scan| async move {
            match scan.next_item::<T>().await {
                Some(item) => Some((Ok(item), scan)),
                None => scan.take_error().map(|e| (Err(e), scan)),
            }
        })
    }
}
