//! In-memory backend, the default for tests and single-run batch jobs.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::store::{DocumentStore, Filter, StoreError, Versioned};

#[derive(Default)]
struct CollectionState {
    /// Ids in insertion order, so scans are deterministic.
    order: Vec<String>,
    docs: HashMap<String, (u64, Value)>,
}

/// Thread-safe in-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, CollectionState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_id(doc: &Value) -> Result<String, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Serialization("document has no string \"id\" field".into()))
}

impl DocumentStore for MemoryStore {
    fn insert(&self, collection: &str, doc: Value) -> Result<String, StoreError> {
        let id = doc_id(&doc)?;
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".into()))?;
        let state = collections.entry(collection.to_string()).or_default();
        if state.docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }
        state.order.push(id.clone());
        state.docs.insert(id.clone(), (1, doc));
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Versioned<Value>>, StoreError> {
        let collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".into()))?;
        Ok(collections.get(collection).and_then(|state| {
            state.docs.get(id).map(|(version, doc)| Versioned {
                id: id.to_string(),
                version: *version,
                doc: doc.clone(),
            })
        }))
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        Ok(self.find(collection, filter, 1)?.into_iter().next())
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<Versioned<Value>>, StoreError> {
        let collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".into()))?;
        let Some(state) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for id in &state.order {
            if let Some((version, doc)) = state.docs.get(id) {
                if filter.matches(doc) {
                    out.push(Versioned {
                        id: id.clone(),
                        version: *version,
                        doc: doc.clone(),
                    });
                    if limit > 0 && out.len() == limit {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }

    fn replace(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: Value,
    ) -> Result<u64, StoreError> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".into()))?;
        let state = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let entry = state.docs.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        if entry.0 != expected_version {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id: id.to_string(),
                expected: expected_version,
                found: entry.0,
            });
        }
        entry.0 += 1;
        entry.1 = doc;
        Ok(entry.0)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".into()))?;
        let state = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        if state.docs.remove(id).is_none() {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        state.order.retain(|x| x != id);
        Ok(())
    }

    fn scan(&self, collection: &str) -> Result<Vec<Versioned<Value>>, StoreError> {
        let collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".into()))?;
        let Some(state) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(state
            .order
            .iter()
            .filter_map(|id| {
                state.docs.get(id).map(|(version, doc)| Versioned {
                    id: id.clone(),
                    version: *version,
                    doc: doc.clone(),
                })
            })
            .collect())
    }

    fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self
            .collections
            .lock()
            .map_err(|_| StoreError::Storage("store lock poisoned".into()))?;
        Ok(collections.get(collection).map(|s| s.docs.len()).unwrap_or(0))
    }
}
