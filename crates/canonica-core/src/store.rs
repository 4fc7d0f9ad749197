//! Document store abstraction for the canonical collections.
//!
//! Backends keep documents as JSON payloads keyed by id within named
//! collections, and expose optimistic concurrency: every document carries
//! a version counter, and `replace` fails with [`StoreError::Conflict`]
//! when the caller's snapshot is stale. The typed [`Collection`] wrapper
//! handles (de)serialization of the domain structs.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::text;

/// A domain type persisted in its own collection.
pub trait CanonicalEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the entity lives in ("works", "person", ...).
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

impl CanonicalEntity for canonica_domain::Work {
    const COLLECTION: &'static str = "works";
    fn id(&self) -> &str {
        &self.id
    }
}

impl CanonicalEntity for canonica_domain::Person {
    const COLLECTION: &'static str = "person";
    fn id(&self) -> &str {
        &self.id
    }
}

impl CanonicalEntity for canonica_domain::Affiliation {
    const COLLECTION: &'static str = "affiliations";
    fn id(&self) -> &str {
        &self.id
    }
}

impl CanonicalEntity for canonica_domain::Source {
    const COLLECTION: &'static str = "sources";
    fn id(&self) -> &str {
        &self.id
    }
}

/// A document together with its concurrency version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub id: String,
    pub version: u64,
    pub doc: T,
}

impl Versioned<Value> {
    /// Deserialize the payload into a typed snapshot.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Versioned<T>, StoreError> {
        let doc = serde_json::from_value(self.doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Versioned {
            id: self.id,
            version: self.version,
            doc,
        })
    }
}

/// Predicates the backends evaluate against JSON payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Any external id entry with this value, regardless of provider.
    ExternalId(String),
    /// An external id entry from a specific provider.
    ExternalIdFromProvider { source: String, id: String },
    /// Exact full name after text normalization.
    FullName(String),
}

impl Filter {
    /// Evaluate the predicate against a serialized document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::ExternalId(id) => external_ids(doc).any(|(_, v)| v == id),
            Filter::ExternalIdFromProvider { source, id } => {
                external_ids(doc).any(|(s, v)| s == source && v == id)
            }
            Filter::FullName(name) => {
                let wanted = text::normalize(name);
                doc.get("full_name")
                    .and_then(Value::as_str)
                    .map(|f| text::normalize(f) == wanted)
                    .unwrap_or(false)
            }
        }
    }
}

fn external_ids(doc: &Value) -> impl Iterator<Item = (&str, &str)> {
    doc.get("external_ids")
        .and_then(Value::as_array)
        .map(|a| a.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(|e| {
            let source = e.get("source").and_then(Value::as_str)?;
            let id = e.get("id").and_then(Value::as_str)?;
            Some((source, id))
        })
}

/// The trait all storage backends implement.
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. The payload must carry its id under `"id"`.
    fn insert(&self, collection: &str, doc: Value) -> Result<String, StoreError>;

    /// Fetch a document by id.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Versioned<Value>>, StoreError>;

    /// First document matching the filter, in insertion order.
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Versioned<Value>>, StoreError>;

    /// All documents matching the filter, up to `limit` (0 = no limit).
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<Versioned<Value>>, StoreError>;

    /// Replace a document if the caller's version is still current.
    /// Returns the new version.
    fn replace(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        doc: Value,
    ) -> Result<u64, StoreError>;

    /// Remove a document by id.
    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Every document in the collection, in insertion order.
    fn scan(&self, collection: &str) -> Result<Vec<Versioned<Value>>, StoreError>;

    fn count(&self, collection: &str) -> Result<usize, StoreError>;
}

/// Errors from the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("stale write on {collection}/{id}: expected version {expected}, found {found}")]
    Conflict {
        collection: String,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Conflicts are retried by the callers that hold the loop.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Typed view over one entity's collection.
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<T: CanonicalEntity> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn insert(&self, entity: &T) -> Result<String, StoreError> {
        let doc =
            serde_json::to_value(entity).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.insert(T::COLLECTION, doc)
    }

    pub fn get(&self, id: &str) -> Result<Option<Versioned<T>>, StoreError> {
        self.store
            .get(T::COLLECTION, id)?
            .map(Versioned::into_typed)
            .transpose()
    }

    pub fn find_one(&self, filter: &Filter) -> Result<Option<Versioned<T>>, StoreError> {
        self.store
            .find_one(T::COLLECTION, filter)?
            .map(Versioned::into_typed)
            .transpose()
    }

    pub fn find(&self, filter: &Filter, limit: usize) -> Result<Vec<Versioned<T>>, StoreError> {
        self.store
            .find(T::COLLECTION, filter, limit)?
            .into_iter()
            .map(Versioned::into_typed)
            .collect()
    }

    pub fn replace(&self, id: &str, expected_version: u64, entity: &T) -> Result<u64, StoreError> {
        let doc =
            serde_json::to_value(entity).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.store.replace(T::COLLECTION, id, expected_version, doc)
    }

    pub fn scan(&self) -> Result<Vec<Versioned<T>>, StoreError> {
        self.store
            .scan(T::COLLECTION)?
            .into_iter()
            .map(Versioned::into_typed)
            .collect()
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        self.store.count(T::COLLECTION)
    }

    /// Move a folded duplicate into the collection's `_merged` archive and
    /// drop it from the live collection.
    pub fn archive(&self, merged: &Versioned<T>) -> Result<(), StoreError> {
        let doc = serde_json::to_value(&merged.doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let archive = format!("{}_merged", T::COLLECTION);
        self.store.insert(&archive, doc)?;
        self.store.delete(T::COLLECTION, &merged.id)
    }

    pub fn archive_count(&self) -> Result<usize, StoreError> {
        self.store.count(&format!("{}_merged", T::COLLECTION))
    }

    /// Untyped handle, for callers that mix collections.
    pub fn raw(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }
}

/// Identity key used to group candidate duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrongKey {
    /// A shared external id from the given provider (e.g. "orcid").
    ExternalId { source: String },
    /// A shared related-work id from the given provider (e.g. "doi").
    RelatedWork { source: String },
}

impl StrongKey {
    /// All key values the document carries for this key kind.
    pub fn extract(&self, doc: &Value) -> Vec<String> {
        match self {
            StrongKey::ExternalId { source } => external_ids(doc)
                .filter(|(s, _)| s == source)
                .map(|(_, v)| v.to_string())
                .collect(),
            StrongKey::RelatedWork { source } => doc
                .get("related_works")
                .and_then(Value::as_array)
                .map(|a| a.as_slice())
                .unwrap_or(&[])
                .iter()
                .filter_map(|e| {
                    let s = e.get("source").and_then(Value::as_str)?;
                    if s != source {
                        return None;
                    }
                    e.get("id").and_then(Value::as_str).map(str::to_string)
                })
                .collect(),
        }
    }
}

/// Documents sharing one key value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGroup {
    pub key: String,
    pub ids: Vec<String>,
}

/// Partition documents by the values of a strong key, keeping only groups
/// with at least two members. Groups come back ordered by first appearance
/// so runs are deterministic.
pub fn group_by_key(docs: &[Versioned<Value>], key: &StrongKey) -> Vec<KeyGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<String>> =
        std::collections::HashMap::new();
    for v in docs {
        for value in key.extract(&v.doc) {
            let members = groups.entry(value.clone()).or_insert_with(|| {
                order.push(value.clone());
                Vec::new()
            });
            if !members.contains(&v.id) {
                members.push(v.id.clone());
            }
        }
    }
    order
        .into_iter()
        .filter_map(|key| {
            let ids = groups.remove(&key)?;
            (ids.len() > 1).then_some(KeyGroup { key, ids })
        })
        .collect()
}
