//! Structural checks run before any request reaches the driver.

use crate::error::Error;
use crate::key::Key;

/// Check that a key names a table and a hash key with a value
///
/// Errors are reported in order: table name, hash key name, unconvertible
/// key value, hash key value.
pub fn is_valid_key(key: &Key) -> Result<(), Error> {
    is_valid_table_name(key)?;

    if key.hash_key_name().is_empty() {
        return Err(Error::InvalidHashKeyName);
    }

    if let Some(err) = key.value_error() {
        return Err(Error::InvalidKeyValue(err.to_string()));
    }

    if key.hash_key().is_none() {
        return Err(Error::InvalidHashKeyValue);
    }

    Ok(())
}

/// Check only the table name, as needed by scans
pub fn is_valid_table_name(key: &Key) -> Result<(), Error> {
    if key.table_name().is_empty() {
        return Err(Error::InvalidTableName);
    }

    Ok(())
}
