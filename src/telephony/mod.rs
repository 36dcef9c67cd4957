//! Telephony client abstraction.
//!
//! The discovery engine drives calls through the [`VoiceClient`] trait:
//! place a call with a customer utterance as context, then wait for the
//! recorded audio of the finished conversation. [`HammingVoiceClient`] is
//! the production implementation.

mod hamming;

pub use hamming::{HammingVoiceClient, WebhookListener};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CallResult;

/// Identifier of a placed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle {
    /// Provider-assigned call id.
    pub id: String,
}

/// Recorded audio returned for a finished call.
#[derive(Debug, Clone)]
pub struct AudioRecording {
    /// Raw audio bytes.
    pub bytes: Vec<u8>,
    /// MIME type of the audio payload.
    pub mime_type: String,
}

/// Places calls against a voice agent and retrieves their recordings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceClient: Send + Sync {
    /// Start a call to `target`, priming the synthetic customer with
    /// `utterance`.
    async fn place_call(&self, target: &str, utterance: &str) -> CallResult<CallHandle>;

    /// Wait up to `timeout` for the call's recording to become available and
    /// download it.
    async fn fetch_recording(
        &self,
        handle: &CallHandle,
        timeout: Duration,
    ) -> CallResult<AudioRecording>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_handle_equality() {
        let a = CallHandle {
            id: "call-1".to_string(),
        };
        let b = CallHandle {
            id: "call-1".to_string(),
        };
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_mock_voice_client() {
        let mut mock = MockVoiceClient::new();
        mock.expect_place_call().returning(|_, _| {
            Ok(CallHandle {
                id: "call-9".to_string(),
            })
        });

        let handle = mock.place_call("+15551234567", "Hello").await.unwrap();
        assert_eq!(handle.id, "call-9");
    }
}
