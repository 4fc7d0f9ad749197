//! SQLite-backed document store.
//!
//! Documents are JSON payloads in a single table keyed by (collection, id);
//! an external-id side table makes the identifier lookups on the hot path
//! indexed instead of full scans. Enabled with the `sqlite` feature.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::store::{DocumentStore, Filter, StoreError, Versioned};
use crate::text;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn =
            Connection::open(path).map_err(|e| StoreError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                version INTEGER NOT NULL,
                payload TEXT NOT NULL,
                seq INTEGER,
                PRIMARY KEY (collection, id)
            );

            CREATE TABLE IF NOT EXISTS external_ids (
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                source TEXT NOT NULL,
                ext_id TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS full_names (
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                normalized TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ext_ids ON external_ids(collection, ext_id);
            CREATE INDEX IF NOT EXISTS idx_ext_ids_source ON external_ids(collection, source, ext_id);
            CREATE INDEX IF NOT EXISTS idx_full_names ON full_names(collection, normalized);
            ",
        )
        .map_err(|e| StoreError::Storage(format!("init_schema: {}", e)))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Storage("connection lock poisoned".into()))
    }

    fn index_doc(
        conn: &Connection,
        collection: &str,
        id: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        conn.execute(
            "DELETE FROM external_ids WHERE collection = ?1 AND doc_id = ?2",
            params![collection, id],
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        conn.execute(
            "DELETE FROM full_names WHERE collection = ?1 AND doc_id = ?2",
            params![collection, id],
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        if let Some(entries) = doc.get("external_ids").and_then(Value::as_array) {
            for entry in entries {
                let (Some(source), Some(ext_id)) = (
                    entry.get("source").and_then(Value::as_str),
                    entry.get("id").and_then(Value::as_str),
                ) else {
                    continue;
                };
                conn.execute(
                    "INSERT INTO external_ids (collection, doc_id, source, ext_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![collection, id, source, ext_id],
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            }
        }
        if let Some(full_name) = doc.get("full_name").and_then(Value::as_str) {
            conn.execute(
                "INSERT INTO full_names (collection, doc_id, normalized) VALUES (?1, ?2, ?3)",
                params![collection, id, text::normalize(full_name)],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn fetch(
        conn: &Connection,
        collection: &str,
        id: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT version, payload FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        row.map(|(version, payload)| {
            let doc = serde_json::from_str(&payload)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            Ok(Versioned {
                id: id.to_string(),
                version: version as u64,
                doc,
            })
        })
        .transpose()
    }

    /// Ids matching a filter via the side tables, in insertion order.
    fn matching_ids(
        conn: &Connection,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<String>, StoreError> {
        let (sql, a, b): (&str, String, Option<String>) = match filter {
            Filter::ExternalId(id) => (
                "SELECT DISTINCT e.doc_id FROM external_ids e
                 JOIN documents d ON d.collection = e.collection AND d.id = e.doc_id
                 WHERE e.collection = ?1 AND e.ext_id = ?2 ORDER BY d.seq",
                id.clone(),
                None,
            ),
            Filter::ExternalIdFromProvider { source, id } => (
                "SELECT DISTINCT e.doc_id FROM external_ids e
                 JOIN documents d ON d.collection = e.collection AND d.id = e.doc_id
                 WHERE e.collection = ?1 AND e.source = ?2 AND e.ext_id = ?3 ORDER BY d.seq",
                source.clone(),
                Some(id.clone()),
            ),
            Filter::FullName(name) => (
                "SELECT DISTINCT f.doc_id FROM full_names f
                 JOIN documents d ON d.collection = f.collection AND d.id = f.doc_id
                 WHERE f.collection = ?1 AND f.normalized = ?2 ORDER BY d.seq",
                text::normalize(name),
                None,
            ),
        };
        fn first_column(row: &rusqlite::Row<'_>) -> rusqlite::Result<String> {
            row.get(0)
        }
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let rows = match b {
            Some(b) => stmt.query_map(params![collection, a, b], first_column),
            None => stmt.query_map(params![collection, a], first_column),
        }
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Storage(e.to_string()))
    }
}

impl DocumentStore for SqliteStore {
    fn insert(&self, collection: &str, doc: Value) -> Result<String, StoreError> {
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::Serialization("document has no string \"id\" field".into())
            })?;
        let payload =
            serde_json::to_string(&doc).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO documents (collection, id, version, payload, seq)
                 VALUES (?1, ?2, 1, ?3,
                         (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents WHERE collection = ?1))",
                params![collection, id, payload],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }
        Self::index_doc(&conn, collection, &id, &doc)?;
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Versioned<Value>>, StoreError> {
        let conn = self.lock()?;
        Self::fetch(&conn, collection, id)
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
        let conn = self.lock()?;
        let ids = Self::matching_ids(&conn, collection, filter)?;
        let mut out = Vec::new();
        for id in ids {
            if let Some(v) = Self::fetch(&conn, collection, &id)? {
                out.push(v);
                if limit > 0 && out.len() == limit {
                    break;
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
        let payload =
            serde_json::to_string(&doc).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE documents SET version = version + 1, payload = ?4
                 WHERE collection = ?1 AND id = ?2 AND version = ?3",
                params![collection, id, expected_version as i64, payload],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        if changed == 0 {
            let current: Option<i64> = conn
                .query_row(
                    "SELECT version FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            return Err(match current {
                Some(found) => StoreError::Conflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected: expected_version,
                    found: found as u64,
                },
                None => StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                },
            });
        }
        Self::index_doc(&conn, collection, id, &doc)?;
        Ok(expected_version + 1)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        if removed == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        conn.execute(
            "DELETE FROM external_ids WHERE collection = ?1 AND doc_id = ?2",
            params![collection, id],
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        conn.execute(
            "DELETE FROM full_names WHERE collection = ?1 AND doc_id = ?2",
            params![collection, id],
        )
        .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(())
    }

    fn scan(&self, collection: &str) -> Result<Vec<Versioned<Value>>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, version, payload FROM documents
                 WHERE collection = ?1 ORDER BY seq",
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, version, payload) = row.map_err(|e| StoreError::Storage(e.to_string()))?;
            let doc = serde_json::from_str(&payload)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            out.push(Versioned {
                id,
                version: version as u64,
                doc,
            });
        }
        Ok(out)
    }

    fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(n as usize)
    }
}
