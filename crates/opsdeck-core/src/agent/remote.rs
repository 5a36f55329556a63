//! Streaming conversation service.
//!
//! The orchestrator only depends on [`ConversationService`]. The HTTP
//! implementation, [`GenerativeClient`], speaks the `streamGenerateContent`
//! server-sent-events protocol and yields one text fragment per event.

use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Lazy, finite, non-restartable sequence of reply fragments.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Whether a credential is configured. When false the orchestrator never
    /// calls [`ConversationService::stream_reply`].
    fn has_credential(&self) -> bool;

    /// Open a streamed reply to `message` under `system_instruction`.
    async fn stream_reply(&self, system_instruction: &str, message: &str) -> Result<ChunkStream>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<OutPart<'a>>,
}

#[derive(Debug, Serialize)]
struct OutPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<InPart>,
}

#[derive(Debug, Deserialize)]
struct InPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Incremental decoder for `data:` lines of a server-sent-events body.
///
/// Bytes are buffered until a newline so multi-byte characters split across
/// network reads are reassembled before decoding.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the text fragments completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(bytes);
        let mut fragments = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(text) = Self::decode_line(&line)? {
                fragments.push(text);
            }
        }
        Ok(fragments)
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Vec<String>> {
        let line = std::mem::take(&mut self.buffer);
        Ok(Self::decode_line(&line)?.into_iter().collect())
    }

    fn decode_line(line: &[u8]) -> Result<Option<String>> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(payload) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            return Ok(None);
        }

        let event: StreamEvent = serde_json::from_str(payload)?;
        if let Some(err) = event.error {
            return Err(Error::Remote(err.message));
        }

        let text: String = event
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        Ok((!text.is_empty()).then_some(text))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP client
// ─────────────────────────────────────────────────────────────────────────────

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// HTTP client for a `streamGenerateContent` endpoint.
#[cfg(feature = "client")]
#[derive(Clone)]
pub struct GenerativeClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[cfg(feature = "client")]
impl GenerativeClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Client for the default endpoint and model.
    pub fn with_key(api_key: Option<String>) -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL, api_key)
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[cfg(feature = "client")]
#[async_trait]
impl ConversationService for GenerativeClient {
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn stream_reply(&self, system_instruction: &str, message: &str) -> Result<ChunkStream> {
        use futures::StreamExt;

        let api_key = self.api_key.as_deref().ok_or(Error::MissingCredential)?;
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![OutPart {
                    text: system_instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![OutPart { text: message }],
            }],
        };

        tracing::debug!(model = %self.model, "Opening conversation stream");
        let response = self
            .http
            .post(self.stream_url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::remote_status(status.as_u16(), body));
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(Error::from)?;
                for text in decoder.feed(&chunk)? {
                    yield text;
                }
            }
            for text in decoder.finish()? {
                yield text;
            }
        };

        Ok(Box::pin(stream))
    }
}
