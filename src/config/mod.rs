use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub hamming: HammingConfig,
    pub deepgram: DeepgramConfig,
    pub openai: OpenAiConfig,
    pub exploration: ExplorationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Hamming voice API configuration
#[derive(Debug, Clone)]
pub struct HammingConfig {
    pub api_key: String,
    pub base_url: String,
    /// Public base URL webhook callbacks are delivered to
    pub webhook_url: String,
    /// Local port the webhook listener binds to
    pub webhook_port: u16,
    /// Maximum seconds to wait for a "recording ready" callback
    pub recording_timeout_s: u64,
}

/// Deepgram transcription configuration
#[derive(Debug, Clone)]
pub struct DeepgramConfig {
    pub api_key: String,
    pub base_url: String,
}

/// OpenAI oracle configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Tunables for the discovery run itself
#[derive(Debug, Clone)]
pub struct ExplorationConfig {
    /// Maximum concurrently running exploration tasks
    pub max_workers: usize,
    /// Maximum conversation depth below the root
    pub max_depth: u32,
    /// Wall-clock timeout for a single exploration task, in seconds
    pub task_timeout_s: u64,
    /// Similarity bar for merging decision points into an existing node
    pub node_similarity_threshold: f64,
    /// Similarity bar for treating a customer utterance as already explored
    pub response_similarity_threshold: f64,
}

/// Graph viewer endpoint configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration shared by the outbound clients
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let hamming = HammingConfig {
            api_key: require("HAMMING_API_KEY")?,
            base_url: env::var("HAMMING_BASE_URL")
                .unwrap_or_else(|_| "https://app.hamming.ai/api".to_string()),
            webhook_url: env::var("WEBHOOK_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            webhook_port: parse_or("WEBHOOK_PORT", 8080),
            recording_timeout_s: parse_or("RECORDING_TIMEOUT_S", 300),
        };

        let deepgram = DeepgramConfig {
            api_key: require("DEEPGRAM_API_KEY")?,
            base_url: env::var("DEEPGRAM_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepgram.com".to_string()),
        };

        let openai = OpenAiConfig {
            api_key: require("OPENAI_API_KEY")?,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        let exploration = ExplorationConfig {
            max_workers: parse_or("MAX_WORKERS", 3),
            max_depth: parse_or("MAX_DEPTH", 10),
            task_timeout_s: parse_or("TASK_TIMEOUT_S", 300),
            node_similarity_threshold: parse_or("NODE_SIMILARITY_THRESHOLD", 0.85),
            response_similarity_threshold: parse_or("RESPONSE_SIMILARITY_THRESHOLD", 0.60),
        };

        let server = ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("SERVER_PORT", 8000),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 30000),
            max_retries: parse_or("MAX_RETRIES", 3),
            retry_delay_ms: parse_or("RETRY_DELAY_MS", 1000),
        };

        Ok(Config {
            hamming,
            deepgram,
            openai,
            exploration,
            server,
            logging,
            request,
        })
    }
}

impl ExplorationConfig {
    /// Wall-clock timeout for a single exploration task
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_s)
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            max_depth: 10,
            task_timeout_s: 300,
            node_similarity_threshold: 0.85,
            response_similarity_threshold: 0.60,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

fn require(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config {
        message: format!("{} is required", key),
    })
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
