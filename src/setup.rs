use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, GlobalSecondaryIndex, KeySchemaElement, KeyType, Projection,
    ProjectionType, ProvisionedThroughput, ScalarAttributeType,
};

use crate::dynamodb_client;
use crate::error::Error;

/// Secondary index to create with a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name
    pub name: String,
    /// Index hash key attribute
    pub hash_key: String,
    /// Index range key attribute
    pub range_key: Option<String>,
}

/// Table layout with string key attributes
///
/// ```
/// use dynamo_repository::setup::TableDefinition;
///
/// let users = TableDefinition::new("UserTable", "UUID")
///     .with_index("email-index", "Email", None::<String>);
/// assert_eq!(users.indexes.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name
    pub table_name: String,
    /// Hash key attribute
    pub hash_key: String,
    /// Range key attribute
    pub range_key: Option<String>,
    /// Global secondary indexes
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    /// Table keyed by `hash_key` only
    pub fn new(table_name: impl Into<String>, hash_key: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            hash_key: hash_key.into(),
            range_key: None,
            indexes: Vec::new(),
        }
    }

    /// Add a range key
    pub fn with_range_key(mut self, range_key: impl Into<String>) -> Self {
        self.range_key = Some(range_key.into());
        self
    }

    /// Add a global secondary index projecting all attributes
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        hash_key: impl Into<String>,
        range_key: Option<impl Into<String>>,
    ) -> Self {
        self.indexes.push(IndexDefinition {
            name: name.into(),
            hash_key: hash_key.into(),
            range_key: range_key.map(Into::into),
        });
        self
    }

    /// Every key attribute, each listed once
    fn key_attributes(&self) -> Vec<&str> {
        let mut attributes: Vec<&str> = Vec::new();
        let names = std::iter::once(self.hash_key.as_str())
            .chain(self.range_key.as_deref())
            .chain(self.indexes.iter().flat_map(|index| {
                std::iter::once(index.hash_key.as_str()).chain(index.range_key.as_deref())
            }));
        for name in names {
            if !attributes.contains(&name) {
                attributes.push(name);
            }
        }
        attributes
    }
}

fn key_schema(hash_key: &str, range_key: Option<&str>) -> Result<Vec<KeySchemaElement>, Error> {
    let mut schema = vec![
        KeySchemaElement::builder()
            .attribute_name(hash_key)
            .key_type(KeyType::Hash)
            .build()?,
    ];
    if let Some(range_key) = range_key {
        schema.push(
            KeySchemaElement::builder()
                .attribute_name(range_key)
                .key_type(KeyType::Range)
                .build()?,
        );
    }
    Ok(schema)
}

fn throughput() -> Result<ProvisionedThroughput, Error> {
    Ok(ProvisionedThroughput::builder()
        .read_capacity_units(10)
        .write_capacity_units(10)
        .build()?)
}

/// Create the table on the global client
///
/// Initialises the client with defaults if needed, which makes it convenient
/// for LocalStack-backed tests.
pub async fn table(definition: &TableDefinition) -> Result<(), Error> {
    create_table(dynamodb_client().await, definition).await
}

/// Create the table; an existing table is left as is
pub async fn create_table(client: &Client, definition: &TableDefinition) -> Result<(), Error> {
    let mut builder = client
        .create_table()
        .table_name(&definition.table_name)
        .set_key_schema(Some(key_schema(
            &definition.hash_key,
            definition.range_key.as_deref(),
        )?))
        .provisioned_throughput(throughput()?);

    for attribute in definition.key_attributes() {
        builder = builder.attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(attribute)
                .attribute_type(ScalarAttributeType::S)
                .build()?,
        );
    }

    for index in &definition.indexes {
        builder = builder.global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name(&index.name)
                .set_key_schema(Some(key_schema(
                    &index.hash_key,
                    index.range_key.as_deref(),
                )?))
                .projection(
                    Projection::builder()
                        .projection_type(ProjectionType::All)
                        .build(),
                )
                .provisioned_throughput(throughput()?)
                .build()?,
        );
    }

    match builder.send().await {
        Ok(_) => Ok(()),
        Err(e) => match e.as_service_error() {
            Some(CreateTableError::ResourceInUseException(_)) => Ok(()),
            _ => Err(e.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_attributes_are_unique() {
        let definition = TableDefinition::new("Orders", "UserId")
            .with_range_key("CreatedAt")
            .with_index("status-index", "Status", Some("CreatedAt"))
            .with_index("user-index", "UserId", None::<String>);

        assert_eq!(
            definition.key_attributes(),
            vec!["UserId", "CreatedAt", "Status"]
        );
    }
}
