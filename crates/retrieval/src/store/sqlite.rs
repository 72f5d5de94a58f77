//! SQLite-backed document store.
//!
//! One `passages` table shared by all collections; embeddings are stored as
//! little-endian f32 BLOBs and ranked by brute-force cosine distance.

use super::{cosine_distance, rank_by_distance, DocumentStore, MetadataField};
use crate::embeddings::EmbeddingProvider;
use crate::types::{Passage, PassageMetadata, ScoredPassage};
use rusqlite::{params, Connection, Row};
use sensai_core::{AppError, AppResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS passages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    collection TEXT NOT NULL,
    text TEXT NOT NULL,
    source TEXT NOT NULL,
    page INTEGER,
    subject TEXT,
    level TEXT,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_passages_collection ON passages(collection);
"#;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("collection", &self.collection)
            .field("embedder", &self.embedder)
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) the store at `db_path`, scoped to `collection`.
    pub fn open(
        db_path: &Path,
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Store(format!("Failed to create index directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Store(format!("Failed to open SQLite index: {}", e)))?;
        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Self::with_connection(conn, collection, embedder)
    }

    /// Store backed by a private in-memory database.
    pub fn open_in_memory(
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Store(format!("Failed to open SQLite index: {}", e)))?;
        Self::with_connection(conn, collection, embedder)
    }

    fn with_connection(
        conn: Connection,
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Store(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            embedder,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Store("SQLite connection lock poisoned".to_string()))
    }

    /// Insert a passage, embedding its text unless a vector is supplied.
    /// Returns the generated passage id.
    pub async fn insert(&self, passage: &Passage, embedding: Option<Vec<f32>>) -> AppResult<String> {
        let embedding = match embedding {
            Some(embedding) => embedding,
            None => self.embedder.embed(&passage.text).await?,
        };

        if embedding.len() != self.embedder.dimensions() {
            return Err(AppError::Store(format!(
                "Embedding for {} has {} dimensions, expected {}",
                passage.metadata.source,
                embedding.len(),
                self.embedder.dimensions()
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO passages (id, collection, text, source, page, subject, level, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                self.collection,
                passage.text,
                passage.metadata.source,
                passage.metadata.page.map(i64::from),
                passage.metadata.subject,
                passage.metadata.level,
                embedding_to_bytes(&embedding),
            ],
        )
        .map_err(|e| AppError::Store(format!("Failed to insert passage: {}", e)))?;

        Ok(id)
    }

    /// Delete every passage of this collection; returns how many were removed.
    pub fn reset(&self) -> AppResult<usize> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM passages WHERE collection = ?1",
                params![self.collection],
            )
            .map_err(|e| AppError::Store(format!("Failed to delete passages: {}", e)))?;
        tracing::info!("Reset collection '{}' ({} passages)", self.collection, removed);
        Ok(removed)
    }

    fn load_passages(&self) -> AppResult<Vec<Passage>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT text, source, page, subject, level FROM passages
                 WHERE collection = ?1 ORDER BY seq",
            )
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![self.collection], passage_from_row)
            .map_err(|e| AppError::Store(format!("Failed to query passages: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("Failed to read passage: {}", e)))
    }

    fn load_embedded_passages(&self) -> AppResult<Vec<(Passage, Vec<f32>)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT text, source, page, subject, level, embedding FROM passages
                 WHERE collection = ?1 ORDER BY seq",
            )
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![self.collection], |row| {
                let passage = passage_from_row(row)?;
                let bytes: Vec<u8> = row.get(5)?;
                Ok((passage, bytes))
            })
            .map_err(|e| AppError::Store(format!("Failed to query passages: {}", e)))?;

        let mut passages = Vec::new();
        for row in rows {
            let (passage, bytes) =
                row.map_err(|e| AppError::Store(format!("Failed to read passage: {}", e)))?;
            passages.push((passage, bytes_to_embedding(&bytes)?));
        }
        Ok(passages)
    }
}

fn passage_from_row(row: &Row<'_>) -> rusqlite::Result<Passage> {
    Ok(Passage {
        text: row.get(0)?,
        metadata: PassageMetadata {
            source: row.get(1)?,
            page: row.get::<_, Option<i64>>(2)?.and_then(|p| u32::try_from(p).ok()),
            subject: row.get(3)?,
            level: row.get(4)?,
        },
    })
}

#[async_trait::async_trait]
impl DocumentStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find_by_metadata_substring(
        &self,
        field: MetadataField,
        needle: &str,
        limit: usize,
    ) -> AppResult<Vec<Passage>> {
        // SQLite's LOWER() only folds ASCII, so filtering happens here
        let needle = needle.to_lowercase();
        Ok(self
            .load_passages()?
            .into_iter()
            .filter(|passage| field.matches(passage, &needle))
            .take(limit)
            .collect())
    }

    async fn semantic_search(&self, query: &str, k: usize) -> AppResult<Vec<ScoredPassage>> {
        let query_embedding = self.embedder.embed(query).await?;
        let scored = self
            .load_embedded_passages()?
            .into_iter()
            .map(|(passage, embedding)| {
                let distance = cosine_distance(&query_embedding, &embedding);
                (passage, distance)
            })
            .collect();

        let results = rank_by_distance(scored, k);
        tracing::debug!(
            "Semantic search returned {} passages (requested top-{})",
            results.len(),
            k
        );
        Ok(results)
    }

    async fn count(&self) -> AppResult<usize> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*) FROM passages WHERE collection = ?1",
            params![self.collection],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count as usize)
        .map_err(|e| AppError::Store(format!("Failed to count passages: {}", e)))
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Store("Invalid embedding bytes length".to_string()));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
