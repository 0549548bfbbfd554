//! The container every "get many" operation returns.
//!
//! An [`EntityList`] is an ordered sequence of ids plus a map from id to entity. The order carries whatever meaning
//! the producing call gives it (newest first, chronological, tree order); the map may hold extra context entities
//! that are not part of the order.
//!
//! Serialized form:
//!
//! ```json
//! { "order": ["id1", "id2"], "products": { "id1": { ... }, "id2": { ... } } }
//! ```

use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::entity::StoreEntity;
use crate::entity::ETAG_VERSION;

#[derive(Clone, Debug, PartialEq)]
pub struct EntityList<T: StoreEntity> {
    order: Vec<String>,
    items: HashMap<String, T>,
}

impl<T: StoreEntity> Default for EntityList<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }
}

impl<T: StoreEntity> EntityList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list whose order follows `entities`.
    pub fn from_ordered(entities: impl IntoIterator<Item = T>) -> Self {
        let mut list = Self::new();
        for entity in entities {
            list.add_order(entity.id().to_string());
            list.add_item(entity);
        }
        list
    }

    /// Append an id to the order. Duplicates are not checked.
    pub fn add_order(&mut self, id: impl Into<String>) {
        self.order.push(id.into());
    }

    pub fn add_item(&mut self, entity: T) {
        self.items.insert(entity.id().to_string(), entity);
    }

    /// Append the ids of `other` missing from this list, keeping their relative order, and merge their items.
    pub fn extend(&mut self, other: EntityList<T>) {
        let mut present: HashSet<String> = self.order.iter().cloned().collect();
        let EntityList { order, items } = other;
        for id in order {
            if present.insert(id.clone()) {
                self.order.push(id);
            }
        }
        for (id, item) in items {
            self.items.entry(id).or_insert(item);
        }
    }

    /// Fingerprint of the list.
    ///
    /// All items are scanned, including those not referenced by the order. The item with the greatest `update_at`
    /// wins; ties go to the lexicographically greatest id. The result does not depend on iteration order.
    pub fn etag(&self) -> String {
        let mut winner_id = "0";
        let mut winner_at = 0i64;
        for item in self.items.values() {
            let at = item.update_at();
            if at > winner_at || (at == winner_at && item.id() > winner_id) {
                winner_at = at;
                winner_id = item.id();
            }
        }
        let first = self.order.first().map(String::as_str).unwrap_or("");
        format!("{ETAG_VERSION}.{first}.{winner_id}.{winner_at}")
    }

    /// Normalize every item so that serialization never yields `null` where a collection is expected.
    pub fn make_non_nil(&mut self) {
        for item in self.items.values_mut() {
            item.make_non_nil();
        }
    }

    /// Re-order by `create_at`, newest first, ids breaking ties.
    pub fn sort_by_create_at_desc(&mut self) {
        let items = &self.items;
        self.order.sort_by(|a, b| {
            let ka = items.get(a).map(|e| e.create_at()).unwrap_or(0);
            let kb = items.get(b).map(|e| e.create_at()).unwrap_or(0);
            kb.cmp(&ka).then_with(|| b.cmp(a))
        });
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn items(&self) -> &HashMap<String, T> {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.get(id)
    }

    /// Ordered entities. Ids without a matching item are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Consume the list into its ordered entities.
    pub fn into_ordered(mut self) -> Vec<T> {
        self.order.iter().filter_map(|id| self.items.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether every ordered id has an item.
    pub fn is_consistent(&self) -> bool {
        self.order.iter().all(|id| self.items.contains_key(id))
    }
}

impl<T: StoreEntity> Serialize for EntityList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("order", &self.order)?;
        map.serialize_entry(T::PLURAL, &self.items)?;
        map.end()
    }
}

struct EntityListVisitor<T>(PhantomData<T>);

impl<'de, T: StoreEntity> Visitor<'de> for EntityListVisitor<T> {
    type Value = EntityList<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a map with 'order' and '{}' keys", T::PLURAL)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut list = EntityList::new();
        while let Some(key) = access.next_key::<String>()? {
            if key == "order" {
                list.order = access.next_value::<Option<Vec<String>>>()?.unwrap_or_default();
            }
            else if key == T::PLURAL {
                list.items = access.next_value::<Option<HashMap<String, T>>>()?.unwrap_or_default();
            }
            else {
                access.next_value::<serde::de::IgnoredAny>()?;
            }
        }
        Ok(list)
    }
}

impl<'de, T: StoreEntity> Deserialize<'de> for EntityList<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(EntityListVisitor(PhantomData))
    }
}
