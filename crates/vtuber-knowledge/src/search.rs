use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vtuber_core::config::KnowledgeConfig;

use crate::embedder::Embedder;
use crate::error::Result;
use crate::store::VectorStore;

/// Similarity search over a knowledge base.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    /// Up to `k` snippets relevant to `query`, most relevant first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>>;
}

/// A vector store paired with the embedder it was built with.
pub struct KnowledgeBase {
    store: VectorStore,
    embedder: Arc<dyn Embedder>,
}

impl KnowledgeBase {
    pub fn new(store: VectorStore, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Open the configured collection.
    pub fn open(config: &KnowledgeConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let store = VectorStore::open(Path::new(&config.db_dir), &config.collection)?;
        Ok(Self::new(store, embedder))
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }
}

#[async_trait]
impl KnowledgeSearch for KnowledgeBase {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        if k == 0 || self.store.is_empty().await {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let Some(query_embedding) = vectors.pop() else {
            return Ok(Vec::new());
        };

        let hits = self.store.similarity_search(&query_embedding, k).await;
        debug!(hits = hits.len(), k, "Knowledge search complete");
        Ok(hits.into_iter().map(|hit| hit.record.text).collect())
    }
}
