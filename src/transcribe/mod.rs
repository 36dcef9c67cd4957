//! Speech transcription abstraction.
//!
//! Recorded call audio is turned into text through the
//! [`TranscribeService`] trait; [`DeepgramTranscriber`] is the production
//! implementation. A blank transcript is an error, never an empty success.

mod deepgram;

pub use deepgram::DeepgramTranscriber;

use async_trait::async_trait;

use crate::error::TranscribeResult;
use crate::telephony::AudioRecording;

/// Converts recorded audio into text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscribeService: Send + Sync {
    /// Transcribe a recording; fails with
    /// [`TranscribeError::EmptyTranscript`](crate::error::TranscribeError::EmptyTranscript)
    /// when the result is blank.
    async fn transcribe(&self, recording: &AudioRecording) -> TranscribeResult<String>;
}
