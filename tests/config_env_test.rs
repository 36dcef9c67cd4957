//! Environment-variable configuration tests.
//!
//! These tests mutate process-wide environment variables, so they are
//! serialized with `serial_test`.

use serial_test::serial;
use voicemap::config::{Config, LogFormat};
use voicemap::error::AppError;

const REQUIRED: &[(&str, &str)] = &[
    ("HAMMING_API_KEY", "test-hamming-key"),
    ("DEEPGRAM_API_KEY", "test-deepgram-key"),
    ("OPENAI_API_KEY", "test-openai-key"),
];

const OPTIONAL: &[&str] = &[
    "HAMMING_BASE_URL",
    "WEBHOOK_BASE_URL",
    "WEBHOOK_PORT",
    "RECORDING_TIMEOUT_S",
    "DEEPGRAM_BASE_URL",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "MAX_WORKERS",
    "MAX_DEPTH",
    "TASK_TIMEOUT_S",
    "NODE_SIMILARITY_THRESHOLD",
    "RESPONSE_SIMILARITY_THRESHOLD",
    "SERVER_HOST",
    "SERVER_PORT",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "REQUEST_TIMEOUT_MS",
    "MAX_RETRIES",
    "RETRY_DELAY_MS",
];

fn set_required() {
    for (key, value) in REQUIRED {
        std::env::set_var(key, value);
    }
}

fn clear_all() {
    for (key, _) in REQUIRED {
        std::env::remove_var(key);
    }
    for key in OPTIONAL {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_apply_when_only_required_keys_are_set() {
    clear_all();
    set_required();

    let config = Config::from_env().unwrap();

    assert_eq!(config.hamming.api_key, "test-hamming-key");
    assert_eq!(config.hamming.base_url, "https://app.hamming.ai/api");
    assert_eq!(config.hamming.webhook_port, 8080);
    assert_eq!(config.hamming.recording_timeout_s, 300);
    assert_eq!(config.deepgram.base_url, "https://api.deepgram.com");
    assert_eq!(config.openai.model, "gpt-4o-mini");
    assert_eq!(config.exploration.max_workers, 3);
    assert_eq!(config.exploration.max_depth, 10);
    assert_eq!(config.exploration.node_similarity_threshold, 0.85);
    assert_eq!(config.exploration.response_similarity_threshold, 0.60);
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.request.timeout_ms, 30000);

    clear_all();
}

#[test]
#[serial]
fn environment_overrides_are_honored() {
    clear_all();
    set_required();
    std::env::set_var("MAX_WORKERS", "7");
    std::env::set_var("MAX_DEPTH", "4");
    std::env::set_var("NODE_SIMILARITY_THRESHOLD", "0.92");
    std::env::set_var("OPENAI_MODEL", "gpt-4o");
    std::env::set_var("LOG_FORMAT", "json");
    std::env::set_var("SERVER_PORT", "9001");

    let config = Config::from_env().unwrap();

    assert_eq!(config.exploration.max_workers, 7);
    assert_eq!(config.exploration.max_depth, 4);
    assert_eq!(config.exploration.node_similarity_threshold, 0.92);
    assert_eq!(config.openai.model, "gpt-4o");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.server.port, 9001);

    clear_all();
}

#[test]
#[serial]
fn missing_required_key_is_a_config_error() {
    clear_all();
    set_required();
    std::env::remove_var("OPENAI_API_KEY");

    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, AppError::Config { .. }));
    assert!(err.to_string().contains("OPENAI_API_KEY"));

    clear_all();
}

#[test]
#[serial]
fn garbage_numeric_overrides_fall_back_to_defaults() {
    clear_all();
    set_required();
    std::env::set_var("MAX_WORKERS", "many");
    std::env::set_var("SERVER_PORT", "not-a-port");

    let config = Config::from_env().unwrap();
    assert_eq!(config.exploration.max_workers, 3);
    assert_eq!(config.server.port, 8000);

    clear_all();
}
