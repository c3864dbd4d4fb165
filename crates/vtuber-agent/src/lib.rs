//! Agent-side knowledge retrieval.
//!
//! Wraps a [`KnowledgeSearch`](vtuber_knowledge::KnowledgeSearch) so each
//! user turn can be augmented with retrieved reference material and the
//! current date before it is sent to the LLM.

pub mod message;
pub mod retrieval;

pub use message::{ChatMessage, ContentPart, ImageUrl, MessageContent};
pub use retrieval::{ContextRetriever, RetrievalAugmenter};
