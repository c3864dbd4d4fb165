//! Knowledge base: load text/markdown files, split them into chunks, embed
//! them, and search the resulting vector store.

pub mod builder;
pub mod embedder;
pub mod error;
pub mod loader;
pub mod search;
pub mod splitter;
pub mod store;

pub use builder::{BuildReport, build_knowledge_base};
pub use embedder::{Embedder, HttpEmbedder};
pub use error::{KnowledgeError, Result};
pub use search::{KnowledgeBase, KnowledgeSearch};
pub use splitter::RecursiveSplitter;
pub use store::{ChunkRecord, VectorStore};
