//! Unique-key indexing shared by registers and maps.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use crate::error::{RegmapError, Result};

/// Builds a `key -> position` index over `items`.
///
/// # Errors
///
/// Returns [`RegmapError::DuplicateKey`] naming `field` on the first repeated key.
pub fn unique_index_by<T, K, F>(items: &[T], field: &'static str, key: F) -> Result<HashMap<K, usize>>
where
    K: Eq + Hash + Display,
    F: Fn(&T) -> K,
{
    let mut index = HashMap::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        match index.entry(key(item)) {
            Entry::Occupied(entry) => {
                return Err(RegmapError::DuplicateKey {
                    field,
                    key: entry.key().to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(position);
            }
        }
    }
    Ok(index)
}
