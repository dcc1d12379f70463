//! Thread-safe value bag.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A thread-safe bag of named JSON values.
///
/// Every executor of every thread handling one dispatch sees the same bag.
/// Writes overwrite (last writer wins); concurrent threads are expected to
/// use disjoint keys.
#[derive(Debug, Default)]
pub struct ValueBag {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl ValueBag {
    /// Creates a new empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag from existing data.
    #[must_use]
    pub fn from_data(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Gets a value and deserializes it.
    ///
    /// Returns `None` if the key is absent or the value has a different shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) -> Option<serde_json::Value> {
        self.data.write().insert(key.into(), value)
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Copies every entry of `other` into this bag, overwriting.
    pub fn merge(&self, other: &Self) {
        let incoming = other.to_dict();
        self.data.write().extend(incoming);
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }
}

impl Clone for ValueBag {
    fn clone(&self) -> Self {
        Self {
            data: RwLock::new(self.data.read().clone()),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, serde_json::Value)> for ValueBag {
    fn from_iter<I: IntoIterator<Item = (K, serde_json::Value)>>(iter: I) -> Self {
        Self::from_data(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
