use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Identity contract for records managed by a [`Store`](crate::store::Store).
///
/// Every stored type must carry a signed integer id with a getter and a
/// setter. The store allocates ids itself via `create()`; identity is
/// defined solely by the id.
///
/// `Default` is required because `create()` hands back a zero-valued record
/// (with a fresh id) for the caller to populate.
pub trait Entity: Serialize + DeserializeOwned + Default {
    /// Unique identifier of this record
    fn id(&self) -> i64;

    /// Set the identifier (used by the store when allocating)
    fn set_id(&mut self, id: i64);
}

/// Ordering policy shared by sort and binary search: ascending by id.
pub fn cmp_by_id<T: Entity>(a: &T, b: &T) -> Ordering {
    a.id().cmp(&b.id())
}
