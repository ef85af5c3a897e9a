use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections::HashMap;

use crate::error::Error;
use crate::expression::ExpressionAttributes;

const HASH_NAME: &str = "#hk";
const HASH_VALUE: &str = ":hk";
const RANGE_NAME: &str = "#rk";
const RANGE_VALUE: &str = ":rk";
const RANGE_UPPER_VALUE: &str = ":rku";

/// Converts a key value; null is absent, a failed conversion keeps its message.
fn key_value<V: Serialize>(value: V) -> Result<Option<AttributeValue>, String> {
    match to_attribute_value::<_, AttributeValue>(value) {
        Ok(AttributeValue::Null(_)) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(err) => Err(err.to_string()),
    }
}

/// Location of a single item: table, hash key and optional range key
///
/// Built fluently and then only read by the repository:
///
/// ```
/// use dynamo_repository::Key;
///
/// let key = Key::new()
///     .with_table_name("UserTable")
///     .with_hash_key_name("UUID")
///     .with_hash_key("uuid");
///
/// assert_eq!(key.table_name(), "UserTable");
/// assert!(key.range().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Key {
    table_name: String,
    hash_key_name: String,
    hash_key: Option<AttributeValue>,
    range_key_name: Option<String>,
    range_key: Option<AttributeValue>,
    value_error: Option<String>,
}

impl Key {
    /// Empty key; it is invalid until table and hash key are set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Set the hash key attribute name
    pub fn with_hash_key_name(mut self, name: impl Into<String>) -> Self {
        self.hash_key_name = name.into();
        self
    }

    /// Set the hash key value
    ///
    /// A value serializing to null (such as `None`) leaves the key without a
    /// hash key value. A value that cannot be converted at all fails
    /// validation with [`Error::InvalidKeyValue`].
    pub fn with_hash_key<V: Serialize>(mut self, value: V) -> Self {
        self.hash_key = self.convert(value);
        self
    }

    /// Set the range key attribute name
    pub fn with_range_key_name(mut self, name: impl Into<String>) -> Self {
        self.range_key_name = Some(name.into());
        self
    }

    /// Set the range key value
    pub fn with_range_key<V: Serialize>(mut self, value: V) -> Self {
        self.range_key = self.convert(value);
        self
    }

    /// Conversion failure of any value set on this key, reported by validation
    pub fn value_error(&self) -> Option<&str> {
        self.value_error.as_deref()
    }

    pub(crate) fn convert<V: Serialize>(&mut self, value: V) -> Option<AttributeValue> {
        key_value(value).unwrap_or_else(|err| {
            self.value_error = Some(err);
            None
        })
    }

    /// Table name
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Hash key attribute name
    pub fn hash_key_name(&self) -> &str {
        &self.hash_key_name
    }

    /// Hash key value, if any
    pub fn hash_key(&self) -> Option<&AttributeValue> {
        self.hash_key.as_ref()
    }

    /// Range key attribute name, if any
    pub fn range_key_name(&self) -> Option<&str> {
        self.range_key_name.as_deref()
    }

    /// Range key value, if any
    pub fn range_key(&self) -> Option<&AttributeValue> {
        self.range_key.as_ref()
    }

    /// Range key name and value, only when both are set
    pub fn range(&self) -> Option<(&str, &AttributeValue)> {
        match (&self.range_key_name, &self.range_key) {
            (Some(name), Some(value)) => Some((name.as_str(), value)),
            _ => None,
        }
    }

    /// Primary key map addressing exactly one item
    pub(crate) fn item_key(&self) -> HashMap<String, AttributeValue> {
        let mut key = self.hash_only_key();
        if let Some((name, value)) = self.range() {
            let _ = key.insert(name.to_string(), value.clone());
        }
        key
    }

    fn hash_only_key(&self) -> HashMap<String, AttributeValue> {
        let mut key = HashMap::new();
        if let Some(value) = &self.hash_key {
            let _ = key.insert(self.hash_key_name.clone(), value.clone());
        }
        key
    }

    /// Key condition matching every item under the hash key
    pub(crate) fn hash_condition(&self) -> (String, ExpressionAttributes) {
        let mut attributes = ExpressionAttributes::default();
        let _ = attributes
            .names
            .insert(HASH_NAME.to_string(), self.hash_key_name.clone());
        if let Some(value) = &self.hash_key {
            let _ = attributes
                .values
                .insert(HASH_VALUE.to_string(), value.clone());
        }
        (format!("{HASH_NAME} = {HASH_VALUE}"), attributes)
    }
}

/// Comparison applied to the range key of a [`Query`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RangeOperator {
    /// `range = value`
    #[default]
    Equal,
    /// `range < value`
    LessThan,
    /// `range <= value`
    LessOrEqual,
    /// `range > value`
    GreaterThan,
    /// `range >= value`
    GreaterOrEqual,
    /// `begins_with(range, value)`
    BeginsWith,
    /// `range BETWEEN value AND upper`
    Between,
}

impl RangeOperator {
    fn condition(self) -> String {
        match self {
            RangeOperator::Equal => format!("{RANGE_NAME} = {RANGE_VALUE}"),
            RangeOperator::LessThan => format!("{RANGE_NAME} < {RANGE_VALUE}"),
            RangeOperator::LessOrEqual => format!("{RANGE_NAME} <= {RANGE_VALUE}"),
            RangeOperator::GreaterThan => format!("{RANGE_NAME} > {RANGE_VALUE}"),
            RangeOperator::GreaterOrEqual => format!("{RANGE_NAME} >= {RANGE_VALUE}"),
            RangeOperator::BeginsWith => format!("begins_with({RANGE_NAME}, {RANGE_VALUE})"),
            RangeOperator::Between => {
                format!("{RANGE_NAME} BETWEEN {RANGE_VALUE} AND {RANGE_UPPER_VALUE}")
            }
        }
    }
}

/// A [`Key`] extended with range comparison, limit and ordering
///
/// ```
/// use dynamo_repository::{Query, RangeOperator};
///
/// let query = Query::new()
///     .with_table_name("Orders")
///     .with_hash_key_name("UserId")
///     .with_hash_key("user-1")
///     .with_range_key_name("CreatedAt")
///     .with_range_key("2024-01-01")
///     .with_range_op(RangeOperator::GreaterOrEqual)
///     .with_limit(10)
///     .with_descending();
///
/// assert_eq!(query.limit(), Some(10));
/// assert!(query.descending());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    key: Key,
    range_operator: RangeOperator,
    range_key_upper: Option<AttributeValue>,
    limit: Option<i32>,
    descending: bool,
}

impl Query {
    /// Empty query; it is invalid until table and hash key are set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.key = self.key.with_table_name(table_name);
        self
    }

    /// Set the hash key attribute name
    pub fn with_hash_key_name(mut self, name: impl Into<String>) -> Self {
        self.key = self.key.with_hash_key_name(name);
        self
    }

    /// Set the hash key value
    pub fn with_hash_key<V: Serialize>(mut self, value: V) -> Self {
        self.key = self.key.with_hash_key(value);
        self
    }

    /// Set the range key attribute name
    pub fn with_range_key_name(mut self, name: impl Into<String>) -> Self {
        self.key = self.key.with_range_key_name(name);
        self
    }

    /// Set the range key value compared by the range operator
    pub fn with_range_key<V: Serialize>(mut self, value: V) -> Self {
        self.key = self.key.with_range_key(value);
        self
    }

    /// Set the range operator
    pub fn with_range_op(mut self, operator: RangeOperator) -> Self {
        self.range_operator = operator;
        self
    }

    /// Match range keys between `lower` and `upper`, inclusive
    pub fn with_range_between<L: Serialize, U: Serialize>(mut self, lower: L, upper: U) -> Self {
        self.key = self.key.with_range_key(lower);
        self.range_key_upper = self.key.convert(upper);
        self.range_operator = RangeOperator::Between;
        self
    }

    /// Limit the number of returned items; values below one mean no limit
    pub fn with_limit(mut self, limit: i32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return items in descending range key order
    pub fn with_descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Underlying key
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Range operator
    pub fn range_op(&self) -> RangeOperator {
        self.range_operator
    }

    /// Upper bound of a [`RangeOperator::Between`] query
    pub fn range_key_upper(&self) -> Option<&AttributeValue> {
        self.range_key_upper.as_ref()
    }

    /// Limit, if set
    pub fn limit(&self) -> Option<i32> {
        self.limit
    }

    /// Whether results come back in descending order
    pub fn descending(&self) -> bool {
        self.descending
    }

    /// Limit actually sent to DynamoDB
    pub(crate) fn effective_limit(&self) -> Option<i32> {
        self.limit.filter(|limit| *limit > 0)
    }

    /// Key condition for the hash key plus the range comparison when a range
    /// key name and value are both set
    pub(crate) fn key_condition(&self) -> Result<(String, ExpressionAttributes), Error> {
        let (mut expression, mut attributes) = self.key.hash_condition();

        if let Some((name, value)) = self.key.range() {
            let _ = attributes
                .names
                .insert(RANGE_NAME.to_string(), name.to_string());
            let _ = attributes
                .values
                .insert(RANGE_VALUE.to_string(), value.clone());

            if self.range_operator == RangeOperator::Between {
                let upper = self
                    .range_key_upper
                    .clone()
                    .ok_or(Error::InvalidRangeValue)?;
                let _ = attributes
                    .values
                    .insert(RANGE_UPPER_VALUE.to_string(), upper);
            }

            expression.push_str(" AND ");
            expression.push_str(&self.range_operator.condition());
        }

        Ok((expression, attributes))
    }
}

impl From<Key> for Query {
    fn from(key: Key) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }
}

impl AsRef<Key> for Query {
    fn as_ref(&self) -> &Key {
        &self.key
    }
}

impl AsRef<Key> for Key {
    fn as_ref(&self) -> &Key {
        self
    }
}
