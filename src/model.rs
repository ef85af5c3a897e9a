//! Versioned items for optimistic locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute holding the item version
pub const VERSION_ATTRIBUTE: &str = "Version";

/// Version and timestamps stored alongside an item
///
/// Flatten it into an item to make the item a [`Model`]:
///
/// ```
/// use dynamo_repository::{Model, ModelMeta};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct User {
///     #[serde(rename = "UUID")]
///     uuid: String,
///     #[serde(flatten)]
///     meta: ModelMeta,
/// }
///
/// impl Model for User {
///     fn meta(&self) -> &ModelMeta {
///         &self.meta
///     }
///
///     fn meta_mut(&mut self) -> &mut ModelMeta {
///         &mut self.meta
///     }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Version checked by optimistic-lock saves
    #[serde(rename = "Version", default)]
    pub version: u64,
    /// Set on the first successful optimistic-lock save
    #[serde(rename = "CreatedAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Set on every optimistic-lock save
    #[serde(rename = "UpdatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModelMeta {
    /// Advance to the next version and stamp timestamps, returning the
    /// version the stored item is expected to have
    pub(crate) fn advance(&mut self) -> u64 {
        let current = self.version;
        let now = Utc::now();
        self.version += 1;
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.updated_at = Some(now);
        current
    }
}

/// An item participating in optimistic locking
pub trait Model {
    /// Version and timestamps
    fn meta(&self) -> &ModelMeta;
    /// Mutable version and timestamps
    fn meta_mut(&mut self) -> &mut ModelMeta;
}
