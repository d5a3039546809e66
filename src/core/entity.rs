//! Record trait shared by every persisted resource

use crate::core::field::{FieldSet, FieldValue};

/// Base trait for all persisted records.
///
/// A record has an integer primary key assigned by its store and exposes
/// the attributes listed in its static [`FieldSet`] for filtering and
/// sorting. Attributes outside the field set (secrets, nested blobs) are
/// invisible to queries.
pub trait Record: Clone + Send + Sync + 'static {
    /// Resource name used in routes and error messages (e.g. "server_config")
    fn resource_name() -> &'static str;

    /// Queryable attributes of this resource
    fn fields() -> &'static FieldSet;

    /// Primary key
    fn id(&self) -> i64;

    /// Set the primary key (called by the store on insert)
    fn set_id(&mut self, id: i64);

    /// Value of a queryable attribute, `None` for unknown names
    fn field_value(&self, field: &str) -> Option<FieldValue>;
}
