/// Common test fixtures
///
/// Items and keys shared by the repository, index and scan tests.
use super::{Deserialize, Serialize};
use aws_sdk_dynamodb::types::AttributeValue;
use dynamo_repository::driver::Item;
use dynamo_repository::{Key, Model, ModelMeta, Query};
use serde_dynamo::to_item;

pub const USER_TABLE: &str = "UserTable";
pub const ORDER_TABLE: &str = "OrderTable";

/// Hash-key-only item
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct User {
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "UserName")]
    pub user_name: String,
}

impl User {
    pub fn new(uuid: &str, user_name: &str) -> Self {
        Self {
            uuid: uuid.into(),
            user_name: user_name.into(),
        }
    }

    pub fn item(&self) -> Item {
        to_item(self).unwrap()
    }
}

/// Item with a range key
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Order {
    #[serde(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "CreatedAt")]
    pub created_at: String,
    #[serde(rename = "Total")]
    pub total: u32,
}

impl Order {
    pub fn new(user_id: &str, created_at: &str, total: u32) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: created_at.into(),
            total,
        }
    }

    pub fn item(&self) -> Item {
        to_item(self).unwrap()
    }
}

/// Item versioned for optimistic locking
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Account {
    #[serde(rename = "UUID")]
    pub uuid: String,
    #[serde(rename = "Balance")]
    pub balance: i64,
    #[serde(flatten)]
    pub meta: ModelMeta,
}

impl Model for Account {
    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ModelMeta {
        &mut self.meta
    }
}

pub fn user_key(uuid: &str) -> Key {
    Key::new()
        .with_table_name(USER_TABLE)
        .with_hash_key_name("UUID")
        .with_hash_key(uuid)
}

pub fn order_key(user_id: &str) -> Key {
    Key::new()
        .with_table_name(ORDER_TABLE)
        .with_hash_key_name("UserId")
        .with_hash_key(user_id)
}

pub fn order_query(user_id: &str) -> Query {
    Query::from(order_key(user_id))
}

pub fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub fn n(value: &str) -> AttributeValue {
    AttributeValue::N(value.into())
}

/// Cursor item as returned in `LastEvaluatedKey`
pub fn cursor(name: &str, value: &str) -> Item {
    Item::from([(name.to_string(), s(value))])
}
