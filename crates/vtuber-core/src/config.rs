//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level vtuber-voice configuration, loaded from a JSON5 file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<KnowledgeConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Text-to-speech (TTS) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// TTS provider (default: "siliconflow").
    #[serde(default = "default_tts_provider")]
    pub provider: String,

    /// Speech endpoint the synthesis request is POSTed to.
    #[serde(default = "default_tts_api_url")]
    pub api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_tts_model")]
    pub model: String,

    #[serde(default = "default_tts_voice")]
    pub voice: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Audio format requested from the provider; also the cache file extension.
    #[serde(default = "default_response_format")]
    pub response_format: String,

    #[serde(default)]
    pub stream: bool,

    #[serde(default = "default_speed")]
    pub speed: f32,

    #[serde(default)]
    pub gain: f32,

    /// Directory generated audio is written to (default: "cache").
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Upper bound on synthesis calls running at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: default_tts_provider(),
            api_url: default_tts_api_url(),
            api_key: None,
            api_key_env: None,
            model: default_tts_model(),
            voice: default_tts_voice(),
            sample_rate: default_sample_rate(),
            response_format: default_response_format(),
            stream: false,
            speed: default_speed(),
            gain: 0.0,
            cache_dir: default_cache_dir(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

fn default_tts_provider() -> String {
    "siliconflow".into()
}

fn default_tts_api_url() -> Option<String> {
    Some("https://api.siliconflow.cn/v1/audio/speech".into())
}

fn default_tts_model() -> String {
    "FunAudioLLM/CosyVoice2-0.5B".into()
}

fn default_tts_voice() -> String {
    "FunAudioLLM/CosyVoice2-0.5B:anna".into()
}

fn default_sample_rate() -> u32 {
    32000
}

fn default_response_format() -> String {
    "mp3".into()
}

fn default_speed() -> f32 {
    1.0
}

fn default_cache_dir() -> String {
    "cache".into()
}

fn default_max_in_flight() -> usize {
    4
}

impl TtsConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Knowledge base (build + retrieval) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory scanned for `.txt` and `.md` files.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Directory the vector store is persisted to. Wiped on every build.
    #[serde(default = "default_db_dir")]
    pub db_dir: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks embedded and written per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Snippets retrieved per question.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            db_dir: default_db_dir(),
            collection: default_collection(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            batch_size: default_batch_size(),
            top_k: default_top_k(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

fn default_source_dir() -> String {
    "./knowledge_data".into()
}

fn default_db_dir() -> String {
    "./knowledge_db".into()
}

fn default_collection() -> String {
    "vtuber_knowledge".into()
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    150
}

fn default_batch_size() -> usize {
    100
}

fn default_top_k() -> usize {
    3
}

/// Embedding endpoint (OpenAI-compatible `/v1/embeddings`).
///
/// Building and querying must use the same model, or similarity scores are meaningless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: default_embedding_url(),
            api_key: None,
            api_key_env: None,
            model: default_embedding_model(),
        }
    }
}

fn default_embedding_url() -> String {
    "http://localhost:8080/v1/embeddings".into()
}

fn default_embedding_model() -> String {
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".into()
}

impl EmbeddingConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "vtuber_tts=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::VtuberError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::VtuberError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// TTS settings, falling back to defaults when the section is absent.
    pub fn tts(&self) -> TtsConfig {
        self.tts.clone().unwrap_or_default()
    }

    /// Knowledge base settings, falling back to defaults when the section is absent.
    pub fn knowledge(&self) -> KnowledgeConfig {
        self.knowledge.clone().unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "tts.voice").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let tts = self.tts();
        if tts.resolve_api_key().is_none() {
            warnings.push(format!(
                "TTS provider '{}' has no API key configured",
                tts.provider
            ));
        }
        if tts.api_url.as_deref().is_none_or(str::is_empty) {
            warnings.push("TTS api_url is not set; synthesis will be skipped".to_string());
        }
        if tts.max_in_flight == 0 {
            errors.push("tts.max_in_flight must be at least 1".to_string());
        }

        let kb = self.knowledge();
        if kb.chunk_size == 0 {
            errors.push("knowledge.chunk_size must be at least 1".to_string());
        }
        if kb.chunk_overlap >= kb.chunk_size {
            errors.push(format!(
                "knowledge.chunk_overlap ({}) must be smaller than chunk_size ({})",
                kb.chunk_overlap, kb.chunk_size
            ));
        }
        if kb.batch_size == 0 {
            errors.push("knowledge.batch_size must be at least 1".to_string());
        }
        if kb.top_k == 0 {
            errors.push("knowledge.top_k must be at least 1".to_string());
        }

        (warnings, errors)
    }
}

/// Base directory for vtuber-voice data: `~/.vtuber_voice/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".vtuber_voice")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: tests run on parallel threads, but each variable name is
        // touched by exactly one test and nothing else reads the environment
        // while it is being set.
        unsafe { std::env::set_var("TEST_VT_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_VT_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_VT_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_VT_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#)); // empty string
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        let tts = config.tts();
        assert_eq!(tts.provider, "siliconflow");
        assert_eq!(tts.response_format, "mp3");
        assert_eq!(tts.cache_dir, "cache");
        let kb = config.knowledge();
        assert_eq!(kb.chunk_size, 800);
        assert_eq!(kb.chunk_overlap, 150);
        assert_eq!(kb.batch_size, 100);
        assert_eq!(kb.top_k, 3);
        assert_eq!(kb.collection, "vtuber_knowledge");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let json_str = r#"{
            // JSON5 allows comments
            tts: { voice: "custom:voice", response_format: "wav" },
            knowledge: { chunk_size: 400 },
        }"#;
        let config: Config = json5::from_str(json_str).unwrap();
        let tts = config.tts();
        assert_eq!(tts.voice, "custom:voice");
        assert_eq!(tts.response_format, "wav");
        assert_eq!(tts.sample_rate, 32000);
        assert!(!tts.stream);
        let kb = config.knowledge();
        assert_eq!(kb.chunk_size, 400);
        assert_eq!(kb.chunk_overlap, 150);
    }

    #[test]
    fn test_tts_resolve_api_key() {
        // SAFETY: tests run on parallel threads, but each variable name is
        // touched by exactly one test and nothing else reads the environment
        // while it is being set.
        unsafe { std::env::set_var("TEST_VT_TTS_KEY", "from-env") };
        let tts = TtsConfig {
            api_key_env: Some("TEST_VT_TTS_KEY".into()),
            ..TtsConfig::default()
        };
        assert_eq!(tts.resolve_api_key(), Some("from-env".into()));

        let tts2 = TtsConfig {
            api_key: Some("direct-key".into()),
            api_key_env: Some("TEST_VT_TTS_KEY".into()),
            ..TtsConfig::default()
        };
        // Direct key takes priority
        assert_eq!(tts2.resolve_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_VT_TTS_KEY") };
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/vtuber/config.json")).unwrap();
        assert!(config.tts.is_none());
        assert!(config.knowledge.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ knowledge: { source_dir: "/data/kb", top_k: 5 } }"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        let kb = config.knowledge();
        assert_eq!(kb.source_dir, "/data/kb");
        assert_eq!(kb.top_k, 5);
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::VtuberError::Config(_)));
    }

    #[test]
    fn test_load_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, crate::error::VtuberError::Io(_)));
    }

    #[test]
    fn test_get_path() {
        let config = Config {
            tts: Some(TtsConfig::default()),
            ..Config::default()
        };
        assert_eq!(
            config.get_path("tts.response_format"),
            Some(serde_json::json!("mp3"))
        );
        assert!(config.get_path("tts.nope").is_none());
    }

    #[test]
    fn test_logging_config_defaults() {
        let json_str = r#"{ "logging": {} }"#;
        let config: Config = json5::from_str(json_str).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_missing_api_key_warns() {
        let config = Config::default();
        let (warnings, errors) = config.validate();
        assert!(
            warnings.iter().any(|w| w.contains("siliconflow") && w.contains("API key")),
            "Expected a warning about missing API key, got: {warnings:?}"
        );
        assert!(errors.is_empty(), "Default config should be valid: {errors:?}");
    }

    #[test]
    fn test_validate_overlap_errors() {
        let config = Config {
            knowledge: Some(KnowledgeConfig {
                chunk_size: 100,
                chunk_overlap: 100,
                ..KnowledgeConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("chunk_overlap")),
            "Expected an error about chunk overlap, got: {errors:?}"
        );
    }
}
