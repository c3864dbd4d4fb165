//! Builds the knowledge base from scratch: load, split, embed, store.

use std::path::Path;

use tracing::{info, warn};

use vtuber_core::config::KnowledgeConfig;

use crate::embedder::Embedder;
use crate::error::{KnowledgeError, Result};
use crate::loader::load_documents;
use crate::splitter::RecursiveSplitter;
use crate::store::{ChunkRecord, VectorStore};

/// What a build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
}

/// Rebuild the configured collection.
///
/// Any existing `db_dir` is deleted first. When the source directory holds
/// no documents nothing is written and an empty report is returned.
pub async fn build_knowledge_base(
    config: &KnowledgeConfig,
    embedder: &dyn Embedder,
) -> Result<BuildReport> {
    let db_dir = Path::new(&config.db_dir);
    if db_dir.exists() {
        info!(path = %db_dir.display(), "Removing existing knowledge base");
        tokio::fs::remove_dir_all(db_dir).await?;
    }

    let documents = load_documents(Path::new(&config.source_dir))?;
    if documents.is_empty() {
        warn!(source = %config.source_dir, "No documents found, knowledge base not built");
        return Ok(BuildReport::default());
    }

    let splitter = RecursiveSplitter::new(config.chunk_size, config.chunk_overlap);
    let chunks = splitter.split_documents(&documents);
    info!(documents = documents.len(), chunks = chunks.len(), "Documents split");

    let store = VectorStore::open(db_dir, &config.collection)?;
    let total = chunks.len();
    let mut processed = 0;

    for batch in chunks.chunks(config.batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;
        if embeddings.len() != batch.len() {
            return Err(KnowledgeError::EmbeddingCount {
                expected: batch.len(),
                got: embeddings.len(),
            });
        }

        let records = batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRecord {
                id: uuid::Uuid::new_v4().to_string(),
                source: chunk.source.display().to_string(),
                chunk: chunk.index,
                text: chunk.text.clone(),
                embedding,
            })
            .collect();
        store.add(records).await?;

        processed += batch.len();
        info!("Processed {processed}/{total} chunks");
    }

    info!(
        path = %store.path().display(),
        documents = documents.len(),
        chunks = total,
        "Knowledge base built"
    );
    Ok(BuildReport {
        documents: documents.len(),
        chunks: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records batch sizes and embeds every text as its length.
    #[derive(Default)]
    struct LengthEmbedder {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn config(root: &Path) -> KnowledgeConfig {
        KnowledgeConfig {
            source_dir: root.join("data").to_string_lossy().into_owned(),
            db_dir: root.join("db").to_string_lossy().into_owned(),
            chunk_size: 20,
            chunk_overlap: 0,
            batch_size: 2,
            ..KnowledgeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_build_batches_and_persists() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("schedule.md"), "# Mon\nsinging stream\n# Tue\nchat stream").unwrap();
        std::fs::write(data.join("profile.txt"), "likes tea").unwrap();

        let config = config(root.path());
        let embedder = LengthEmbedder::default();
        let report = build_knowledge_base(&config, &embedder).await.unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 3);
        assert_eq!(*embedder.batches.lock().unwrap(), vec![2, 1]);

        let store = VectorStore::open(Path::new(&config.db_dir), &config.collection).unwrap();
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_collection() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("a.txt"), "only one chunk").unwrap();

        let config = config(root.path());
        let embedder = LengthEmbedder::default();
        build_knowledge_base(&config, &embedder).await.unwrap();
        build_knowledge_base(&config, &embedder).await.unwrap();

        let store = VectorStore::open(Path::new(&config.db_dir), &config.collection).unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_no_documents_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();

        let config = config(root.path());
        let embedder = LengthEmbedder::default();
        let report = build_knowledge_base(&config, &embedder).await.unwrap();

        assert_eq!(report, BuildReport::default());
        assert!(embedder.batches.lock().unwrap().is_empty());
        assert!(!root.path().join("db").exists());
    }

    #[tokio::test]
    async fn test_missing_source_dir_errors() {
        let root = tempfile::tempdir().unwrap();
        let embedder = LengthEmbedder::default();
        let err = build_knowledge_base(&config(root.path()), &embedder)
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::SourceMissing(_)));
    }
}
