use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::WalletError;

struct Record {
    value: serde_json::Value,
    tags: HashMap<String, String>,
}

/// Typed JSON records addressed by (type, id), searchable by tag equality.
pub struct RecordStore {
    records: DashMap<(String, String), Record>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    fn key(record_type: &str, id: &str) -> (String, String) {
        (record_type.to_string(), id.to_string())
    }

    pub fn add<T: Serialize>(
        &self,
        record_type: &str,
        id: &str,
        value: &T,
        tags: HashMap<String, String>,
    ) -> Result<(), WalletError> {
        let value = serde_json::to_value(value)?;
        match self.records.entry(Self::key(record_type, id)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(WalletError::DuplicateRecord {
                record_type: record_type.to_string(),
                id: id.to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Record { value, tags });
                tracing::debug!(record_type, id, "record added");
                Ok(())
            }
        }
    }

    pub fn get<T: DeserializeOwned>(&self, record_type: &str, id: &str) -> Result<T, WalletError> {
        let record = self
            .records
            .get(&Self::key(record_type, id))
            .ok_or_else(|| WalletError::RecordNotFound {
                record_type: record_type.to_string(),
                id: id.to_string(),
            })?;
        Ok(serde_json::from_value(record.value.clone())?)
    }

    pub fn tags(&self, record_type: &str, id: &str) -> Result<HashMap<String, String>, WalletError> {
        self.records
            .get(&Self::key(record_type, id))
            .map(|record| record.tags.clone())
            .ok_or_else(|| WalletError::RecordNotFound {
                record_type: record_type.to_string(),
                id: id.to_string(),
            })
    }

    pub fn delete(&self, record_type: &str, id: &str) -> Result<(), WalletError> {
        self.records
            .remove(&Self::key(record_type, id))
            .map(|_| ())
            .ok_or_else(|| WalletError::RecordNotFound {
                record_type: record_type.to_string(),
                id: id.to_string(),
            })
    }

    /// Records of `record_type` whose tags contain every `(name, value)` pair.
    pub fn search<T: DeserializeOwned>(
        &self,
        record_type: &str,
        filter: &[(&str, &str)],
    ) -> Result<Vec<(String, T)>, WalletError> {
        let matches: Vec<(String, serde_json::Value)> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == record_type)
            .filter(|entry| {
                filter
                    .iter()
                    .all(|(name, value)| entry.tags.get(*name).map(String::as_str) == Some(*value))
            })
            .map(|entry| (entry.key().1.clone(), entry.value.clone()))
            .collect();

        let mut out = matches
            .into_iter()
            .map(|(id, value)| Ok((id, serde_json::from_value(value)?)))
            .collect::<Result<Vec<_>, WalletError>>()?;
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    pub fn count(&self, record_type: &str) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.key().0 == record_type)
            .count()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_add_get_delete() {
        let store = RecordStore::new();
        let note = Note { text: "hello".into() };
        store.add("note", "1", &note, HashMap::new()).unwrap();
        assert_eq!(store.get::<Note>("note", "1").unwrap(), note);
        store.delete("note", "1").unwrap();
        assert!(matches!(
            store.get::<Note>("note", "1"),
            Err(WalletError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_record() {
        let store = RecordStore::new();
        let note = Note { text: "a".into() };
        store.add("note", "1", &note, HashMap::new()).unwrap();
        assert!(matches!(
            store.add("note", "1", &note, HashMap::new()),
            Err(WalletError::DuplicateRecord { .. })
        ));
        store.add("other", "1", &note, HashMap::new()).unwrap();
    }

    #[test]
    fn test_search_by_tags() {
        let store = RecordStore::new();
        store
            .add("note", "a", &Note { text: "x".into() }, tags(&[("color", "red"), ("size", "s")]))
            .unwrap();
        store
            .add("note", "b", &Note { text: "y".into() }, tags(&[("color", "red"), ("size", "l")]))
            .unwrap();
        store
            .add("note", "c", &Note { text: "z".into() }, tags(&[("color", "blue")]))
            .unwrap();

        let red: Vec<(String, Note)> = store.search("note", &[("color", "red")]).unwrap();
        assert_eq!(red.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        let red_large: Vec<(String, Note)> =
            store.search("note", &[("color", "red"), ("size", "l")]).unwrap();
        assert_eq!(red_large.len(), 1);
        assert_eq!(red_large[0].1.text, "y");

        let all: Vec<(String, Note)> = store.search("note", &[]).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(store.count("note"), 3);
    }
}
