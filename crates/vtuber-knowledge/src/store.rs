//! File-backed vector store.
//!
//! Storage: `<db_dir>/<collection>.jsonl`, one [`ChunkRecord`] per line.
//! Records are loaded into memory on open and appended to disk on every
//! [`VectorStore::add`]. Search is a brute-force cosine similarity scan.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;

/// An embedded chunk as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub source: String,
    pub chunk: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A record with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub record: ChunkRecord,
}

pub struct VectorStore {
    path: PathBuf,
    records: RwLock<Vec<ChunkRecord>>,
}

impl VectorStore {
    /// Open `collection` under `dir`. A missing file is an empty collection.
    pub fn open(dir: &Path, collection: &str) -> Result<Self> {
        let path = collection_path(dir, collection);
        let records = load_records(&path)?;
        debug!(path = %path.display(), count = records.len(), "Vector store opened");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Append records to the collection file and the in-memory index.
    pub async fn add(&self, new_records: Vec<ChunkRecord>) -> Result<()> {
        if new_records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut lines = String::new();
        for record in &new_records {
            lines.push_str(&serde_json::to_string(record)?);
            lines.push('\n');
        }

        let mut records = self.records.write().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        records.extend(new_records);
        Ok(())
    }

    /// The `k` records most similar to `query`, best first.
    pub async fn similarity_search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let records = self.records.read().await;
        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .map(|record| ScoredChunk {
                score: cosine_similarity(&record.embedding, query),
                record: record.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

fn collection_path(dir: &Path, collection: &str) -> PathBuf {
    // Sanitize collection name to prevent path traversal
    let safe_name: String = collection
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("{safe_name}.jsonl"))
}

fn load_records(path: &Path) -> Result<Vec<ChunkRecord>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<ChunkRecord>(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Skipping corrupted chunk record");
                None
            }
        })
        .collect())
}

/// Cosine similarity in [-1, 1]; 0.0 for empty, mismatched, or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    (dot / denom) as f32
}
