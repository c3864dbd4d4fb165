//! Synthesis backends: HTTP text-to-speech providers.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use vtuber_core::config::TtsConfig;
use vtuber_core::error::VtuberError;

use crate::error::{Result, TtsError};

static HTTP_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

/// Bracket pairs left empty once their contents were removed.
const EMPTY_PAIRS: [&str; 4] = ["()", "（）", "[]", "【】"];

/// A text-to-speech provider.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Extension of the audio this backend returns (e.g. "mp3").
    fn file_extension(&self) -> &str;

    /// Synthesize `text`, returning the encoded audio.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Build the backend named by `config.provider`.
pub fn backend_from_config(
    config: &TtsConfig,
) -> std::result::Result<Box<dyn SynthesisBackend>, VtuberError> {
    match config.provider.as_str() {
        "siliconflow" => Ok(Box::new(SiliconFlowBackend::from_config(config))),
        other => Err(VtuberError::Config(format!("Unknown TTS provider '{other}'"))),
    }
}

/// Last-line cleanup before a provider sees the text: drop links and the
/// empty bracket pairs they leave behind.
pub fn sanitize_for_speech(text: &str) -> String {
    let mut cleaned = HTTP_URL.replace_all(text, "").into_owned();
    for pair in EMPTY_PAIRS {
        cleaned = cleaned.replace(pair, "");
    }
    cleaned
}

/// SiliconFlow speech API (`/v1/audio/speech`).
pub struct SiliconFlowBackend {
    client: reqwest::Client,
    api_url: Option<String>,
    api_key: Option<String>,
    model: String,
    voice: String,
    sample_rate: u32,
    response_format: String,
    stream: bool,
    speed: f32,
    gain: f32,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    input: &'a str,
    response_format: &'a str,
    sample_rate: u32,
    stream: bool,
    speed: f32,
    gain: f32,
    model: &'a str,
    voice: &'a str,
}

impl SiliconFlowBackend {
    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone().filter(|u| !u.is_empty()),
            api_key: config.resolve_api_key(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            sample_rate: config.sample_rate,
            response_format: config.response_format.clone(),
            stream: config.stream,
            speed: config.speed,
            gain: config.gain,
        }
    }
}

#[async_trait]
impl SynthesisBackend for SiliconFlowBackend {
    fn name(&self) -> &str {
        "siliconflow"
    }

    fn file_extension(&self) -> &str {
        &self.response_format
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let input = sanitize_for_speech(text);
        if input.trim() != text.trim() {
            info!(original = text, cleaned = %input, "Links removed before synthesis");
        }
        if input.trim().is_empty() {
            return Err(TtsError::Empty);
        }

        let url = self
            .api_url
            .as_deref()
            .ok_or_else(|| TtsError::NotConfigured("tts.api_url is not set".into()))?;

        let request = SpeechRequest {
            input: &input,
            response_format: &self.response_format,
            sample_rate: self.sample_rate,
            stream: self.stream,
            speed: self.speed,
            gain: self.gain,
            model: &self.model,
            voice: &self.voice,
        };

        debug!(url, voice = %self.voice, text_len = input.len(), "Sending TTS request");

        let response = self
            .client
            .post(url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.as_deref().unwrap_or_default()),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api { status, body });
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}
