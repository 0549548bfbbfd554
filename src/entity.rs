//! Domain entities and what the store needs to know about them.
pub mod category;
pub mod message;
pub mod order;
pub mod product;

pub use category::Entity as Categories;
pub use category::Model as Category;
pub use message::Entity as Messages;
pub use message::Model as Message;
pub use order::Entity as Orders;
pub use order::Model as Order;
pub use order::OrderStatus;
pub use product::Entity as Products;
pub use product::Model as Product;

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreResult;

const ID_ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// Length of every id produced by [`new_id()`].
pub const ID_LEN: usize = 26;

/// Version component mixed into every ETag so that tags change when the wire format does.
pub const ETAG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A fresh 26-character identifier: a random UUID encoded with a lowercase base32 alphabet.
pub fn new_id() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let mut out = String::with_capacity(ID_LEN);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for b in bytes {
        acc = (acc << 8) | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ID_ALPHABET[((acc >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ID_ALPHABET[((acc << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Common contract of everything the store persists.
pub trait StoreEntity: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Singular name used in error codes, e.g. `product`.
    const ENTITY: &'static str;
    /// Key under which lists of this entity are serialized, e.g. `products`.
    const PLURAL: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn create_at(&self) -> i64;
    fn update_at(&self) -> i64;
    fn set_timestamps(&mut self, create_at: i64, update_at: i64);

    fn delete_at(&self) -> i64 {
        0
    }

    fn set_delete_at(&mut self, _delete_at: i64) {}

    /// Field-level checks performed before every write.
    fn is_valid(&self) -> StoreResult<()>;

    /// Replace absent optional collections with empty ones.
    fn make_non_nil(&mut self) {}

    fn is_deleted(&self) -> bool {
        self.delete_at() != 0
    }

    fn etag(&self) -> String {
        format!("{ETAG_VERSION}.{}.{}", self.id(), self.update_at())
    }

    /// Assign identity and timestamps to an entity that is about to be inserted.
    fn pre_save(&mut self) {
        if self.id().is_empty() {
            self.set_id(new_id());
        }
        let create_at = if self.create_at() == 0 { now_millis() } else { self.create_at() };
        self.set_timestamps(create_at, create_at);
    }

    /// Refresh `update_at` of an entity replacing `previous`. Keeps `create_at` and the deletion mark, and never
    /// moves time backwards.
    fn pre_update(&mut self, previous: &Self) {
        let update_at = now_millis().max(previous.update_at()).max(previous.create_at());
        self.set_timestamps(previous.create_at(), update_at);
        self.set_delete_at(previous.delete_at());
    }
}

pub(crate) fn check_id(entity: &'static str, id: &str) -> StoreResult<()> {
    if is_valid_id(id) {
        Ok(())
    }
    else {
        Err(crate::error::StoreError::validation(entity, format!("malformed id '{id}'")))
    }
}

pub(crate) fn check_len(entity: &'static str, field: &str, value: &str, min: usize, max: usize) -> StoreResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        Err(crate::error::StoreError::validation(
            entity,
            format!("{field} must be {min}..={max} characters long, got {len}"),
        ))
    }
    else {
        Ok(())
    }
}

// Common accessors for models following the id/create_at/update_at(/delete_at) column convention.
macro_rules! store_entity_basics {
    () => {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn create_at(&self) -> i64 {
            self.create_at
        }

        fn update_at(&self) -> i64 {
            self.update_at
        }

        fn set_timestamps(&mut self, create_at: i64, update_at: i64) {
            self.create_at = create_at;
            self.update_at = update_at;
        }
    };
    (soft_delete) => {
        store_entity_basics!();

        fn delete_at(&self) -> i64 {
            self.delete_at
        }

        fn set_delete_at(&mut self, delete_at: i64) {
            self.delete_at = delete_at;
        }
    };
}

pub(crate) use store_entity_basics;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_well_formed_and_unique() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), ID_LEN);
        assert!(is_valid_id(&a), "{a}");
        assert_ne!(a, b);
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
    }

    #[test]
    fn pre_update_never_goes_backwards() {
        let mut previous = Product::new("Widget", 1.0);
        previous.pre_save();
        previous.update_at = now_millis() + 60_000;

        let mut next = previous.clone();
        next.pre_update(&previous);
        assert_eq!(next.create_at, previous.create_at);
        assert!(next.update_at >= previous.update_at);
    }

    #[test]
    fn pre_update_keeps_deletion_mark() {
        let mut previous = Product::new("Widget", 1.0);
        previous.pre_save();

        let mut next = previous.clone();
        next.delete_at = 7;
        next.pre_update(&previous);
        assert_eq!(next.delete_at, 0);
        assert!(!next.is_deleted());
    }

    #[test]
    fn pre_save_keeps_explicit_create_at() {
        let mut product = Product::new("Widget", 1.0);
        product.create_at = 1234;
        product.pre_save();
        assert_eq!(product.create_at, 1234);
        assert_eq!(product.update_at, 1234);
        assert!(is_valid_id(&product.id));
    }
}
