//! Knowledge retrieval and prompt augmentation.
//!
//! Before a turn is sent to the LLM, the last user message is looked up in
//! the knowledge base and, when anything relevant turns up, rewritten to
//! carry the current date, the retrieved material, and the original question.
//! Retrieval never fails the turn: an unavailable or failing knowledge base
//! simply means the message goes out unchanged.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, TimeZone};
use tracing::{error, info, warn};

use vtuber_core::config::KnowledgeConfig;
use vtuber_knowledge::KnowledgeSearch;

use crate::message::ChatMessage;

/// Characters of the query shown in logs.
const LOG_PREVIEW_CHARS: usize = 20;

pub struct ContextRetriever {
    search: Option<Arc<dyn KnowledgeSearch>>,
    top_k: usize,
    warned_unavailable: AtomicBool,
}

impl ContextRetriever {
    pub fn new(search: Option<Arc<dyn KnowledgeSearch>>, top_k: usize) -> Self {
        Self {
            search,
            top_k,
            warned_unavailable: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &KnowledgeConfig, search: Option<Arc<dyn KnowledgeSearch>>) -> Self {
        Self::new(search, config.top_k)
    }

    pub fn is_available(&self) -> bool {
        self.search.is_some()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Formatted snippets for `query`, or an empty string when there is no
    /// context to add.
    pub async fn retrieve(&self, query: &str) -> String {
        let Some(search) = &self.search else {
            if !self.warned_unavailable.swap(true, Ordering::Relaxed) {
                warn!("Knowledge base unavailable, answering without retrieved context");
            }
            return String::new();
        };

        match search.search(query, self.top_k).await {
            Ok(snippets) => format_snippets(&snippets),
            Err(e) => {
                error!(error = %e, "Knowledge search failed");
                String::new()
            }
        }
    }
}

fn format_snippets(snippets: &[String]) -> String {
    snippets
        .iter()
        .enumerate()
        .map(|(i, text)| format!("Source {}: {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct RetrievalAugmenter {
    retriever: ContextRetriever,
}

impl RetrievalAugmenter {
    pub fn new(retriever: ContextRetriever) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.retriever
    }

    /// [`augment`](Self::augment) with the local wall clock.
    pub async fn augment_now(&self, messages: &mut [ChatMessage]) -> bool {
        self.augment(messages, &Local::now()).await
    }

    /// Rewrite the last message with retrieved context.
    ///
    /// Only a trailing `user` message is rewritten. Returns `true` when it was.
    pub async fn augment<Tz>(&self, messages: &mut [ChatMessage], now: &DateTime<Tz>) -> bool
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let Some(last) = messages.last_mut() else {
            return false;
        };

        if !last.is_user() {
            return false;
        }

        let question = last.content.text();
        if question.trim().is_empty() {
            return false;
        }

        if self.retriever.is_available() {
            info!(query = %preview(&question), "Searching knowledge base");
        }
        let context = self.retriever.retrieve(&question).await;
        if context.is_empty() {
            return false;
        }
        info!(chars = context.chars().count(), "Retrieved context");

        let date = now.format("%Y-%m-%d %A").to_string();
        last.content.replace_text(augmented_prompt(&date, &context, &question))
    }
}

fn augmented_prompt(date: &str, context: &str, question: &str) -> String {
    format!(
        "[System time]\nIt is now {date}\n\n\
         [Reference material]\n{context}\n\n\
         [User question]\n{question}\n\n\
         Answer the user's question using the reference material above first. \
         If the material is not enough, fall back on your general knowledge. \
         For questions about relative dates (such as \"tomorrow\"), work the date out from [System time]."
    )
}

fn preview(text: &str) -> String {
    text.chars().take(LOG_PREVIEW_CHARS).collect()
}
