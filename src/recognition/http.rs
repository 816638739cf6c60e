//! Recognition over a JSON HTTP service.
//!
//! Request body:
//! `{"audio": "<base64 wav>", "sample_rate": 16000, "channels": 1, "language": "zh"}`
//!
//! Response body:
//! `{"words": [{"word": "ni", "start_ms": 0, "end_ms": 180}, ...]}`

use crate::config::RecognitionConfig;
use crate::error::{AlignError, Result};
use crate::recognition::recognizer::{RecognitionRequest, Recognizer};
use crate::recognition::transcript::Word;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct RequestBody<'a> {
    audio: String,
    sample_rate: u32,
    channels: u16,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    words: Vec<ResponseWord>,
}

#[derive(Debug, Deserialize)]
struct ResponseWord {
    word: String,
    start_ms: u64,
    end_ms: u64,
}

/// Recognizer backed by a remote HTTP endpoint.
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpRecognizer {
    /// Build a recognizer from configuration.
    ///
    /// # Errors
    /// Returns `BackendConfig` when the endpoint is missing or not an
    /// http(s) URL, or the token is empty.
    pub fn new(config: &RecognitionConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AlignError::BackendConfig {
                message: "recognition.endpoint is not set".to_string(),
            })?;
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AlignError::BackendConfig {
                message: format!("endpoint must be an http(s) URL: {endpoint}"),
            });
        }
        let token = config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AlignError::BackendConfig {
                message: "recognition.token is not set".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AlignError::BackendConfig {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn encode_body(request: &RecognitionRequest) -> Result<String> {
    let body = RequestBody {
        audio: STANDARD.encode(&request.audio),
        sample_rate: request.sample_rate,
        channels: request.channels,
        language: &request.language,
    };
    Ok(serde_json::to_string(&body)?)
}

fn decode_words(segment: usize, text: &str) -> Result<Vec<Word>> {
    let body: ResponseBody = serde_json::from_str(text).map_err(|e| AlignError::Recognition {
        segment,
        message: format!("malformed response: {e}"),
    })?;
    Ok(body
        .words
        .into_iter()
        .filter(|w| !w.word.trim().is_empty())
        .map(|w| Word::new(w.word.trim(), w.start_ms, w.end_ms))
        .collect())
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Vec<Word>> {
        let segment = request.segment;
        let failed = |message: String| AlignError::Recognition { segment, message };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(encode_body(request)?)
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(failed(format!("service returned status {}", response.status())));
        }

        let text = response
            .text()
            .await
            .map_err(|e| failed(format!("failed to read response: {e}")))?;

        decode_words(segment, &text)
    }

    fn name(&self) -> &str {
        "http"
    }

    fn is_ready(&self) -> bool {
        true
    }
}
