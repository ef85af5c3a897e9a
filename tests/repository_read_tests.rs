/// Repository read tests
///
/// Single-item gets, hash-key reads and batch gets against the mock driver,
/// including key validation and not-found normalization.
use serde_json::Value;

mod helpers;
use helpers::*;

/// Test that a stored item comes back decoded
#[tokio::test]
async fn test_get_item() {
    let h = Harness::new();
    h.driver
        .push_get_item(Ok(Some(User::new("uuid", "name").item())));

    let user = h
        .repository
        .get_item::<User>(&Context::background(), &user_key("uuid"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.uuid, "uuid");
    assert_eq!(user.user_name, "name");
    assert_eq!(
        h.driver.calls(),
        vec![Call::GetItem(GetItemRequest {
            table_name: USER_TABLE.into(),
            key: Item::from([("UUID".to_string(), s("uuid"))]),
        })]
    );

    let records = h.metrics.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, Operation::Read);
    assert_eq!(records[0].table, USER_TABLE);
    assert!(records[0].success);
}

/// Test that the range key is part of the primary key when both name and value are set
#[tokio::test]
async fn test_get_item_with_range_key() {
    let h = Harness::new();
    let key = order_key("user-1")
        .with_range_key_name("CreatedAt")
        .with_range_key("2024-01-01");

    let _ = h
        .repository
        .get_item::<Order>(&Context::background(), &key)
        .await
        .unwrap();

    match &h.driver.calls()[0] {
        Call::GetItem(request) => {
            assert_eq!(request.key.len(), 2);
            assert_eq!(request.key.get("CreatedAt"), Some(&s("2024-01-01")));
        }
        call => panic!("unexpected call {:?}", call),
    }
}

/// Test that a missing item is `Ok(None)`, a successful metric and an info log
#[tokio::test]
async fn test_get_item_not_found() {
    let h = Harness::new();
    let ctx = Context::background().with_source_label("signup");

    let user = h
        .repository
        .get_item::<User>(&ctx, &user_key("missing"))
        .await
        .unwrap();

    assert!(user.is_none());

    let records = h.metrics.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);

    let lines = h.log.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].level, "info");
    assert_eq!(lines[0].message, "no item found");
    assert_eq!(lines[0].fields.get("TableName"), Some(&Value::from(USER_TABLE)));
    assert_eq!(lines[0].fields.get("source"), Some(&Value::from("signup")));
}

/// Test that every invalid key is rejected before reaching the driver
#[tokio::test]
async fn test_get_item_invalid_keys() {
    let cases = [
        (
            Key::new().with_hash_key_name("UUID").with_hash_key("uuid"),
            "invalid table name",
        ),
        (
            Key::new().with_table_name(USER_TABLE).with_hash_key("uuid"),
            "invalid hash key name",
        ),
        (
            Key::new()
                .with_table_name(USER_TABLE)
                .with_hash_key_name("UUID"),
            "invalid hash key value",
        ),
    ];

    for (key, expected) in cases {
        let h = Harness::new();
        let err = h
            .repository
            .get_item::<User>(&Context::background(), &key)
            .await
            .unwrap_err();

        assert!(err.is_validation_error());
        assert_eq!(err.to_string(), expected);
        assert_eq!(h.driver.call_count(), 0);

        let records = h.metrics.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);

        // validation failures are returned, not logged
        assert!(h.log.lines().is_empty());
    }
}

/// Test that a driver error propagates and is logged
#[tokio::test]
async fn test_get_item_driver_error() {
    let h = Harness::new();
    h.driver.push_get_item(Err(driver_error()));

    let err = h
        .repository
        .get_item::<User>(&Context::background(), &user_key("uuid"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Driver(_)));
    assert!(!h.metrics.records()[0].success);

    let lines = h.log.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].level, "error");
    assert_eq!(lines[0].fields.get("TableName"), Some(&Value::from(USER_TABLE)));
}

/// Test that an item that cannot be decoded is a serialization error
#[tokio::test]
async fn test_get_item_decode_error() {
    let h = Harness::new();
    h.driver
        .push_get_item(Ok(Some(Item::from([("UUID".to_string(), n("12"))]))));

    let err = h
        .repository
        .get_item::<User>(&Context::background(), &user_key("uuid"))
        .await
        .unwrap_err();

    assert!(err.is_serialization_error());
    assert!(!h.metrics.records()[0].success);
}

/// Test reading every item under a hash key across pages
#[tokio::test]
async fn test_get_items_follows_pages() {
    let h = Harness::new();
    h.driver.push_query(Ok(Page {
        items: vec![Order::new("user-1", "2024-01-01", 10).item()],
        last_evaluated_key: Some(cursor("CreatedAt", "2024-01-01")),
    }));
    h.driver.push_query(Ok(Page {
        items: vec![Order::new("user-1", "2024-01-02", 20).item()],
        last_evaluated_key: None,
    }));

    let key = order_key("user-1")
        .with_range_key_name("CreatedAt")
        .with_range_key("ignored");
    let orders = h
        .repository
        .get_items::<Order>(&Context::background(), &key)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].total, 20);

    let calls = h.driver.calls();
    assert_eq!(calls.len(), 2);
    match (&calls[0], &calls[1]) {
        (Call::Query(first), Call::Query(second)) => {
            // the range key plays no part in a hash-key read
            assert_eq!(first.key_condition, "#hk = :hk");
            assert_eq!(first.attributes.names.len(), 1);
            assert_eq!(first.index_name, None);
            assert_eq!(first.exclusive_start_key, None);
            assert_eq!(
                second.exclusive_start_key,
                Some(cursor("CreatedAt", "2024-01-01"))
            );
        }
        calls => panic!("unexpected calls {:?}", calls),
    }

    assert_eq!(h.metrics.records().len(), 1);
}

/// Test that an empty hash-key read is `Ok(None)`
#[tokio::test]
async fn test_get_items_empty() {
    let h = Harness::new();

    let orders = h
        .repository
        .get_items::<Order>(&Context::background(), &order_key("nobody"))
        .await
        .unwrap();

    assert!(orders.is_none());
    assert!(h.metrics.records()[0].success);
    assert_eq!(h.log.lines()[0].message, "no item found");
}

/// Test batch get over one table
#[tokio::test]
async fn test_batch_get_items() {
    let h = Harness::new();
    h.driver.push_batch_get(Ok(vec![
        User::new("a", "Ann").item(),
        User::new("b", "Bob").item(),
    ]));

    let keys = [user_key("a"), user_key("b"), user_key("c")];
    let users = h
        .repository
        .batch_get_items::<User>(&Context::background(), &keys)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(
        h.driver.calls(),
        vec![Call::BatchGet(BatchGetRequest {
            table_name: USER_TABLE.into(),
            keys: vec![
                Item::from([("UUID".to_string(), s("a"))]),
                Item::from([("UUID".to_string(), s("b"))]),
                Item::from([("UUID".to_string(), s("c"))]),
            ],
        })]
    );

    // one record per key
    let records = h.metrics.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.success && r.operation == Operation::Read));
}

/// Test that batch get across tables is rejected without a request
#[tokio::test]
async fn test_batch_get_items_mixed_tables() {
    let h = Harness::new();

    let err = h
        .repository
        .batch_get_items::<User>(&Context::background(), &[user_key("a"), order_key("a")])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidBatchRequest));
    assert_eq!(h.driver.call_count(), 0);
    assert!(h.metrics.records().iter().all(|r| !r.success));
}

/// Test that a batch get matching nothing is `Ok(None)`
#[tokio::test]
async fn test_batch_get_items_none_found() {
    let h = Harness::new();

    let users = h
        .repository
        .batch_get_items::<User>(&Context::background(), &[user_key("a")])
        .await
        .unwrap();

    assert!(users.is_none());
}

/// Test that a hash-key read surfaces a driver error with a failed record
#[tokio::test]
async fn test_get_items_driver_error() {
    let h = Harness::new();
    h.driver.push_query(Err(driver_error()));

    let err = h
        .repository
        .get_items::<Order>(&Context::background(), &order_key("user-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Driver(_)));
    assert!(!h.metrics.records()[0].success);
    assert_eq!(h.log.lines()[0].level, "error");
}

/// Test that a batch get surfaces a driver error with one failed record per key
#[tokio::test]
async fn test_batch_get_items_driver_error() {
    let h = Harness::new();
    h.driver.push_batch_get(Err(driver_error()));

    let err = h
        .repository
        .batch_get_items::<User>(&Context::background(), &[user_key("a"), user_key("b")])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Driver(_)));

    let records = h.metrics.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.success));
}

/// Test that a batch get with an invalid key makes no request
#[tokio::test]
async fn test_batch_get_items_invalid_key() {
    let h = Harness::new();
    let keys = [user_key("a"), Key::new().with_table_name(USER_TABLE).with_hash_key_name("UUID")];

    let err = h
        .repository
        .batch_get_items::<User>(&Context::background(), &keys)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidHashKeyValue));
    assert_eq!(h.driver.call_count(), 0);
    assert!(h.metrics.records().iter().all(|r| !r.success));
    assert!(h.log.lines().is_empty());
}

/// Test that a batch get with no keys makes no request and logs nothing
#[tokio::test]
async fn test_batch_get_items_no_keys() {
    let h = Harness::new();

    let users = h
        .repository
        .batch_get_items::<User>(&Context::background(), &[])
        .await
        .unwrap();

    assert!(users.is_none());
    assert_eq!(h.driver.call_count(), 0);
    assert!(h.metrics.records().is_empty());
    assert!(h.log.lines().is_empty());
}

/// Test that a hash-key read with an invalid key makes no request
#[tokio::test]
async fn test_get_items_invalid_key() {
    let h = Harness::new();

    let err = h
        .repository
        .get_items::<Order>(&Context::background(), &Key::new().with_hash_key("user-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidTableName));
    assert_eq!(h.driver.call_count(), 0);

    let records = h.metrics.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
}

/// Test that a hash key value with no attribute value form keeps its conversion error
#[tokio::test]
async fn test_get_item_unconvertible_hash_key() {
    let h = Harness::new();
    let key = Key::new()
        .with_table_name(USER_TABLE)
        .with_hash_key_name("UUID")
        .with_hash_key(std::collections::HashMap::from([((1, 2), "uuid")]));

    let err = h
        .repository
        .get_item::<User>(&Context::background(), &key)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidKeyValue(_)));
    assert!(err.is_validation_error());
    assert_eq!(h.driver.call_count(), 0);
    assert!(!h.metrics.records()[0].success);
}
