//! Build a knowledge base against a mock embedding server, then search it.

use std::path::Path;
use std::sync::Arc;

use vtuber_core::config::{EmbeddingConfig, KnowledgeConfig};
use vtuber_knowledge::{HttpEmbedder, KnowledgeBase, KnowledgeSearch, build_knowledge_base};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Embeds each input on three topic axes: singing, games, cooking.
struct TopicEmbeddings;

impl Respond for TopicEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let data: Vec<serde_json::Value> = body["input"]
            .as_array()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let text = text.as_str().unwrap().to_lowercase();
                let axis = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
                serde_json::json!({
                    "index": index,
                    "embedding": [axis("sing"), axis("game"), axis("cook")],
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data }))
    }
}

#[tokio::test]
async fn build_then_search_returns_relevant_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(TopicEmbeddings)
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("knowledge_data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("schedule.md"),
        "# Weekly schedule\n\n【Monday】 Singing stream at 20:00\n【Wednesday】 Game night with viewers\n【Friday】 Cooking stream",
    )
    .unwrap();

    let config = KnowledgeConfig {
        source_dir: data.to_string_lossy().into_owned(),
        db_dir: root.path().join("knowledge_db").to_string_lossy().into_owned(),
        embedding: EmbeddingConfig {
            api_url: format!("{}/v1/embeddings", server.uri()),
            api_key: None,
            api_key_env: None,
            model: "test-model".into(),
        },
        ..KnowledgeConfig::default()
    };

    let embedder = Arc::new(HttpEmbedder::from_config(&config.embedding));
    let report = build_knowledge_base(&config, embedder.as_ref()).await.unwrap();
    assert_eq!(report.documents, 1);
    assert!(report.chunks >= 1);
    assert!(Path::new(&config.db_dir).join("vtuber_knowledge.jsonl").is_file());

    let kb = KnowledgeBase::open(&config, embedder).unwrap();
    let hits = kb.search("what game do you play?", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].contains("Game night"));
}
