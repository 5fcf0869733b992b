use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Plain key/value view of extracted data.
pub type ExtractedData = BTreeMap<String, String>;

/// A key worth keeping: not blank, not a stringified null and not a bare index.
pub fn is_meaningful_key(key: &str) -> bool {
    let key = key.trim();
    if key.is_empty() {
        return false;
    }
    let lower = key.to_ascii_lowercase();
    if lower == "null" || lower == "undefined" {
        return false;
    }
    !key.chars().all(|c| c.is_ascii_digit())
}

fn normalise(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Two-layer extracted data store.
///
/// Writes go to the volatile layer during an attempt and to the persistent layer when
/// merged. Reads union both layers with volatile values winning on conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDataStore {
    persistent: ExtractedData,
    volatile: ExtractedData,
}

impl ExtractedDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge into the persistent layer, skipping missing and empty values.
    ///
    /// Returns the number of keys whose stored value changed. Last write wins per key.
    pub fn merge<I, K, V>(&mut self, data: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Option<String>>,
    {
        let mut changed = 0;
        for (key, value) in data {
            let key = key.into();
            let Some(value) = normalise(value.into()) else {
                continue;
            };
            if key.trim().is_empty() {
                continue;
            }
            if self.persistent.get(&key) != Some(&value) {
                self.persistent.insert(key, value);
                changed += 1;
            }
        }
        changed
    }

    /// Record a value for the current attempt. Empty values are ignored.
    pub fn set_volatile(&mut self, key: impl Into<String>, value: impl Into<Option<String>>) -> bool {
        let key = key.into();
        match normalise(value.into()) {
            Some(value) if !key.trim().is_empty() => {
                self.volatile.insert(key, value);
                true
            }
            _ => false,
        }
    }

    pub fn clear_volatile(&mut self) {
        self.volatile.clear();
    }

    /// Move the volatile layer into the persistent one.
    pub fn commit_volatile(&mut self) -> usize {
        let volatile = std::mem::take(&mut self.volatile);
        self.merge(volatile)
    }

    /// Persistent ∪ volatile, volatile taking precedence.
    pub fn all(&self) -> ExtractedData {
        let mut merged = self.persistent.clone();
        merged.extend(self.volatile.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.volatile
            .get(key)
            .or_else(|| self.persistent.get(key))
            .map(String::as_str)
    }

    pub fn persistent(&self) -> &ExtractedData {
        &self.persistent
    }

    pub fn volatile(&self) -> &ExtractedData {
        &self.volatile
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.persistent.is_empty() && self.volatile.is_empty()
    }
}
