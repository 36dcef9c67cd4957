use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Call error: {0}")]
    Call(#[from] CallError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversation graph errors. These are invariant violations surfaced to the
/// immediate caller and never retried.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Invalid graph state: {message}")]
    InvalidState { message: String },

    #[error("Edge references missing node: {src} -> {target}")]
    DanglingReference { src: String, target: String },

    #[error("Node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("No edge between {parent_id} and {node_id}: graph corrupted")]
    MissingParentEdge { parent_id: String, node_id: String },
}

/// Telephony errors raised while placing calls or waiting for recordings
#[derive(Debug, Error)]
pub enum CallError {
    #[error("Call transport error: {message}")]
    Transport { message: String },

    #[error("Voice API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Recording for call {call_id} not ready after {timeout_s}s")]
    RecordingTimeout { call_id: String, timeout_s: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Transcription service errors
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Transcription API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Transcription response missing transcript: {message}")]
    Decode { message: String },

    #[error("Received empty transcription from agent")]
    EmptyTranscript,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Language-model oracle errors
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("Oracle API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Malformed oracle response: {message}")]
    Malformed { message: String },

    #[error("Oracle request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Worker pool errors
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for telephony operations
pub type CallResult<T> = Result<T, CallError>;

/// Result type alias for transcription operations
pub type TranscribeResult<T> = Result<T, TranscribeError>;

/// Result type alias for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

/// Result type alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;
