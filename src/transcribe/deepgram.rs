use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::TranscribeService;
use crate::config::{DeepgramConfig, RequestConfig};
use crate::error::{TranscribeError, TranscribeResult};
use crate::telephony::AudioRecording;

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
}

/// Deepgram prerecorded-audio transcription client.
#[derive(Clone)]
pub struct DeepgramTranscriber {
    client: Client,
    base_url: String,
    api_key: String,
}

impl DeepgramTranscriber {
    /// Create a new transcriber client.
    pub fn new(config: &DeepgramConfig, request_config: &RequestConfig) -> TranscribeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(TranscribeError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TranscribeService for DeepgramTranscriber {
    async fn transcribe(&self, recording: &AudioRecording) -> TranscribeResult<String> {
        debug!(bytes = recording.bytes.len(), "Transcribing recording");

        let response = self
            .client
            .post(format!("{}/v1/listen", self.base_url))
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", recording.mime_type.clone())
            .query(&[
                ("punctuate", "false"),
                ("model", "general"),
                ("tier", "enhanced"),
            ])
            .body(recording.bytes.clone())
            .send()
            .await
            .map_err(TranscribeError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let listen: ListenResponse =
            response.json().await.map_err(|e| TranscribeError::Decode {
                message: format!("unexpected response shape: {}", e),
            })?;

        let transcript = listen
            .results
            .channels
            .first()
            .and_then(|channel| channel.alternatives.first())
            .map(|alternative| alternative.transcript.clone())
            .ok_or_else(|| TranscribeError::Decode {
                message: "response contained no alternatives".to_string(),
            })?;

        if transcript.trim().is_empty() {
            return Err(TranscribeError::EmptyTranscript);
        }

        Ok(transcript)
    }
}
