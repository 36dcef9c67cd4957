use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::prompts;
use super::{parse_analysis, parse_utterance, AnalysisContext, ConversationAnalysis, ExplorationOracle, UtteranceContext};
use crate::config::{OpenAiConfig, RequestConfig};
use crate::error::{OracleError, OracleResult};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Chat-completions implementation of the exploration oracle.
#[derive(Clone)]
pub struct OpenAiOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    request_config: RequestConfig,
}

impl OpenAiOracle {
    /// Create a new oracle client.
    pub fn new(config: &OpenAiConfig, request_config: RequestConfig) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(OracleError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one completion with the configured retry policy and return the
    /// raw assistant text.
    async fn complete(&self, system: &str, user: String) -> OracleResult<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying oracle request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, system, &user).await {
                Ok(completion) => {
                    info!(
                        latency_ms = start.elapsed().as_millis(),
                        "Oracle completion succeeded"
                    );
                    return Ok(completion);
                }
                Err(e) => {
                    error!(
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Oracle completion failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(OracleError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    async fn execute_request(
        &self,
        url: &str,
        system: &str,
        user: &str,
    ) -> OracleResult<String> {
        debug!(model = %self.model, "Calling chat completions");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        };

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    OracleError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| OracleError::Malformed {
                message: format!("failed to parse completion envelope: {}", e),
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Malformed {
                message: "completion contained no choices".to_string(),
            })
    }

}

#[async_trait]
impl ExplorationOracle for OpenAiOracle {
    async fn generate_opening(&self, business_type: &str) -> OracleResult<String> {
        let completion = self
            .complete(
                prompts::CUSTOMER_SYSTEM_PROMPT,
                prompts::initial_utterance_prompt(business_type),
            )
            .await?;
        parse_utterance(&completion)
    }

    async fn generate_utterance(&self, context: UtteranceContext<'_>) -> OracleResult<String> {
        let completion = self
            .complete(
                prompts::CUSTOMER_SYSTEM_PROMPT,
                prompts::utterance_prompt(context),
            )
            .await?;
        parse_utterance(&completion)
    }

    async fn analyze(
        &self,
        context: AnalysisContext<'_>,
        transcript: &str,
    ) -> OracleResult<ConversationAnalysis> {
        let completion = self
            .complete(
                prompts::ANALYSIS_SYSTEM_PROMPT,
                prompts::analysis_prompt(context, transcript),
            )
            .await?;
        parse_analysis(&completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConversationState;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oracle_for(mock_url: &str, max_retries: u32) -> OpenAiOracle {
        let config = OpenAiConfig {
            api_key: "test-key".to_string(),
            base_url: mock_url.to_string(),
            model: "gpt-4o-mini".to_string(),
        };
        let request_config = RequestConfig {
            timeout_ms: 5000,
            max_retries,
            retry_delay_ms: 10,
        };
        OpenAiOracle::new(&config, request_config).unwrap()
    }

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [
                {"message": {"role": "assistant", "content": content}}
            ]
        })
    }

    #[test]
    fn test_oracle_creation_trims_base_url() {
        let oracle = oracle_for("https://api.openai.com/v1/", 0);
        assert_eq!(oracle.base_url(), "https://api.openai.com/v1");
    }

    #[tokio::test]
    async fn test_generate_utterance_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body(r#"{"response": "Yes, I am."}"#)),
            )
            .mount(&server)
            .await;

        let oracle = oracle_for(&server.uri(), 0);
        let utterance = oracle
            .generate_utterance(UtteranceContext {
                business_type: "plumbing",
                agent_message: "Are you an existing customer?",
                history: &[],
                explored: &[],
            })
            .await
            .unwrap();
        assert_eq!(utterance, "Yes, I am.");
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let server = MockServer::start().await;
        let analysis = r#"{
            "terminal": true,
            "state": "TERMINAL_SUCCESS",
            "confidence": 0.9,
            "reasoning": "appointment booked",
            "response": "confirmed booking",
            "candidate_responses": []
        }"#;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(analysis)))
            .mount(&server)
            .await;

        let oracle = oracle_for(&server.uri(), 0);
        let analysis = oracle
            .analyze(
                AnalysisContext {
                    business_type: "plumbing",
                    utterance: "Tuesday",
                    history: &[],
                },
                "You are booked for Tuesday.",
            )
            .await
            .unwrap();
        assert!(analysis.terminal);
        assert_eq!(analysis.state, ConversationState::TerminalSuccess);
    }

    #[tokio::test]
    async fn test_malformed_completion_not_retried_as_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body("no json here")),
            )
            .mount(&server)
            .await;

        let oracle = oracle_for(&server.uri(), 0);
        let err = oracle
            .generate_utterance(UtteranceContext {
                business_type: "plumbing",
                agent_message: "Hello",
                history: &[],
                explored: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let oracle = oracle_for(&server.uri(), 2);
        let err = oracle.generate_opening("plumbing").await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable { retries: 3, .. }));
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let oracle = oracle_for(&server.uri(), 0);
        let err = oracle.generate_opening("plumbing").await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable { .. }));
    }
}
